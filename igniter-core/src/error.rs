use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

/// Stable error codes carried in the wire envelope.
///
/// The code determines the default HTTP status unless the error carries an
/// explicit override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    UnprocessableEntity,
    Redirect,
    ValidationError,
    BodyParseError,
    InvalidSseChannel,
    InitializationError,
    InternalServerError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "ERR_BAD_REQUEST",
            ErrorCode::Unauthorized => "ERR_UNAUTHORIZED",
            ErrorCode::Forbidden => "ERR_FORBIDDEN",
            ErrorCode::NotFound => "ERR_NOT_FOUND",
            ErrorCode::Conflict => "ERR_CONFLICT",
            ErrorCode::UnprocessableEntity => "ERR_UNPROCESSABLE_ENTITY",
            ErrorCode::Redirect => "ERR_REDIRECT",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::BodyParseError => "BODY_PARSE_ERROR",
            ErrorCode::InvalidSseChannel => "INVALID_SSE_CHANNEL",
            ErrorCode::InitializationError => "INITIALIZATION_ERROR",
            ErrorCode::InternalServerError => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn default_status(&self) -> u16 {
        match self {
            ErrorCode::BadRequest
            | ErrorCode::ValidationError
            | ErrorCode::BodyParseError
            | ErrorCode::InvalidSseChannel => 400,
            ErrorCode::Unauthorized => 401,
            ErrorCode::Forbidden => 403,
            ErrorCode::NotFound => 404,
            ErrorCode::Conflict => 409,
            ErrorCode::UnprocessableEntity => 422,
            ErrorCode::Redirect => 302,
            ErrorCode::InitializationError | ErrorCode::InternalServerError => 500,
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "ERR_BAD_REQUEST" => Some(ErrorCode::BadRequest),
            "ERR_UNAUTHORIZED" => Some(ErrorCode::Unauthorized),
            "ERR_FORBIDDEN" => Some(ErrorCode::Forbidden),
            "ERR_NOT_FOUND" => Some(ErrorCode::NotFound),
            "ERR_CONFLICT" => Some(ErrorCode::Conflict),
            "ERR_UNPROCESSABLE_ENTITY" => Some(ErrorCode::UnprocessableEntity),
            "ERR_REDIRECT" => Some(ErrorCode::Redirect),
            "VALIDATION_ERROR" => Some(ErrorCode::ValidationError),
            "BODY_PARSE_ERROR" => Some(ErrorCode::BodyParseError),
            "INVALID_SSE_CHANNEL" => Some(ErrorCode::InvalidSseChannel),
            "INITIALIZATION_ERROR" => Some(ErrorCode::InitializationError),
            "INTERNAL_SERVER_ERROR" => Some(ErrorCode::InternalServerError),
            _ => None,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single schema validation failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
    pub code: String,
}

impl ValidationIssue {
    pub fn new(
        path: impl Into<String>,
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            code: code.into(),
        }
    }
}

/// Unified request-path error for the Igniter core.
#[derive(Debug, Error)]
pub enum FrameworkError {
    /// An error with a recognized code; status derives from the code unless
    /// overridden.
    #[error("{message}")]
    Framework {
        code: ErrorCode,
        message: String,
        details: Option<Value>,
        status: Option<u16>,
    },

    /// Schema validation failed; carries the individual issues.
    #[error("Validation Error")]
    Validation { issues: Vec<ValidationIssue> },

    /// Anything else. Details are shown only outside production.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl FrameworkError {
    pub fn framework(code: ErrorCode, message: impl Into<String>) -> Self {
        FrameworkError::Framework {
            code,
            message: message.into(),
            details: None,
            status: None,
        }
    }

    pub fn with_details(self, details: Value) -> Self {
        match self {
            FrameworkError::Framework {
                code,
                message,
                status,
                ..
            } => FrameworkError::Framework {
                code,
                message,
                details: Some(details),
                status,
            },
            other => other,
        }
    }

    pub fn with_status(self, status: u16) -> Self {
        match self {
            FrameworkError::Framework {
                code,
                message,
                details,
                ..
            } => FrameworkError::Framework {
                code,
                message,
                details,
                status: Some(status),
            },
            other => other,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::framework(ErrorCode::BadRequest, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::framework(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::framework(ErrorCode::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::framework(ErrorCode::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::framework(ErrorCode::Conflict, message)
    }

    pub fn body_parse(message: impl Into<String>) -> Self {
        Self::framework(ErrorCode::BodyParseError, message)
    }

    pub fn validation(issues: Vec<ValidationIssue>) -> Self {
        FrameworkError::Validation { issues }
    }

    pub fn invalid_sse_channel(requested: &str, available: Vec<String>) -> Self {
        Self::framework(
            ErrorCode::InvalidSseChannel,
            format!("Unknown SSE channel: {requested}"),
        )
        .with_details(json!({ "requested": requested, "available": available }))
    }

    pub fn initialization(message: impl Into<String>) -> Self {
        Self::framework(ErrorCode::InitializationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        FrameworkError::Internal(anyhow::anyhow!(message.into()))
    }

    /// The code this error will surface with.
    pub fn code(&self) -> ErrorCode {
        match self {
            FrameworkError::Framework { code, .. } => *code,
            FrameworkError::Validation { .. } => ErrorCode::ValidationError,
            FrameworkError::Internal(_) => ErrorCode::InternalServerError,
        }
    }
}

/// Wire-envelope error object: `{message, code, data?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Status plus envelope body produced by classification.
#[derive(Debug, Clone)]
pub struct ClassifiedError {
    pub status: u16,
    pub body: ErrorBody,
}

/// Map a failure to its structured envelope and status code.
///
/// Generic errors expose details only when `production` is false; framework
/// errors always carry their own message and details.
pub fn classify(error: &FrameworkError, production: bool) -> ClassifiedError {
    match error {
        FrameworkError::Validation { issues } => ClassifiedError {
            status: ErrorCode::ValidationError.default_status(),
            body: ErrorBody {
                message: "Validation Error".to_string(),
                code: ErrorCode::ValidationError.as_str().to_string(),
                data: serde_json::to_value(issues).ok(),
            },
        },
        FrameworkError::Framework {
            code,
            message,
            details,
            status,
        } => ClassifiedError {
            status: status.unwrap_or_else(|| code.default_status()),
            body: ErrorBody {
                message: message.clone(),
                code: code.as_str().to_string(),
                data: details.clone(),
            },
        },
        FrameworkError::Internal(inner) => ClassifiedError {
            status: 500,
            body: ErrorBody {
                message: "Internal Server Error".to_string(),
                code: ErrorCode::InternalServerError.as_str().to_string(),
                data: if production {
                    None
                } else {
                    Some(json!({ "details": format!("{inner:#}") }))
                },
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_mapping() {
        assert_eq!(ErrorCode::BadRequest.default_status(), 400);
        assert_eq!(ErrorCode::ValidationError.default_status(), 400);
        assert_eq!(ErrorCode::Unauthorized.default_status(), 401);
        assert_eq!(ErrorCode::Forbidden.default_status(), 403);
        assert_eq!(ErrorCode::NotFound.default_status(), 404);
        assert_eq!(ErrorCode::Conflict.default_status(), 409);
        assert_eq!(ErrorCode::UnprocessableEntity.default_status(), 422);
        assert_eq!(ErrorCode::Redirect.default_status(), 302);
        assert_eq!(ErrorCode::BodyParseError.default_status(), 400);
        assert_eq!(ErrorCode::InvalidSseChannel.default_status(), 400);
        assert_eq!(ErrorCode::InitializationError.default_status(), 500);
        assert_eq!(ErrorCode::InternalServerError.default_status(), 500);
    }

    #[test]
    fn test_code_round_trip() {
        for code in [
            ErrorCode::BadRequest,
            ErrorCode::Unauthorized,
            ErrorCode::Redirect,
            ErrorCode::ValidationError,
            ErrorCode::InvalidSseChannel,
        ] {
            assert_eq!(ErrorCode::from_code(code.as_str()), Some(code));
        }
        assert_eq!(ErrorCode::from_code("ERR_TEAPOT"), None);
    }

    #[test]
    fn test_classify_validation() {
        let error = FrameworkError::validation(vec![ValidationIssue::new(
            "email",
            "not a valid email address",
            "invalid",
        )]);
        let classified = classify(&error, false);
        assert_eq!(classified.status, 400);
        assert_eq!(classified.body.code, "VALIDATION_ERROR");
        assert_eq!(classified.body.message, "Validation Error");
        let issues = classified.body.data.unwrap();
        assert_eq!(issues[0]["path"], "email");
    }

    #[test]
    fn test_classify_framework_status_override() {
        let error = FrameworkError::unauthorized("Token expired").with_status(418);
        let classified = classify(&error, false);
        assert_eq!(classified.status, 418);
        assert_eq!(classified.body.code, "ERR_UNAUTHORIZED");
        assert_eq!(classified.body.message, "Token expired");
    }

    #[test]
    fn test_classify_generic_hides_details_in_production() {
        let error = FrameworkError::Internal(anyhow::anyhow!("db connection refused"));
        let dev = classify(&error, false);
        assert_eq!(dev.status, 500);
        assert_eq!(dev.body.code, "INTERNAL_SERVER_ERROR");
        assert_eq!(dev.body.message, "Internal Server Error");
        assert!(dev.body.data.unwrap()["details"]
            .as_str()
            .unwrap()
            .contains("db connection refused"));

        let prod = classify(&error, true);
        assert!(prod.body.data.is_none());
    }

    #[test]
    fn test_invalid_sse_channel_lists_available() {
        let error = FrameworkError::invalid_sse_channel("ghost", vec!["system".into()]);
        let classified = classify(&error, false);
        assert_eq!(classified.status, 400);
        assert_eq!(classified.body.code, "INVALID_SSE_CHANNEL");
        let data = classified.body.data.unwrap();
        assert_eq!(data["requested"], "ghost");
        assert_eq!(data["available"][0], "system");
    }
}
