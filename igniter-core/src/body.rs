use crate::error::FrameworkError;
use bytes::Bytes;
use mime::Mime;
use serde_json::{Value, json};
use std::collections::HashMap;

/// A request body decoded according to its `Content-Type`.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedBody {
    /// No body was read (GET/HEAD, or a failed parse).
    Empty,
    Json(Value),
    Form(HashMap<String, String>),
    Multipart(HashMap<String, MultipartValue>),
    Text(String),
    Binary(Bytes),
    /// Opaque payload with its media type preserved (PDF, image, video).
    Blob { content_type: String, data: Bytes },
    /// Raw pass-through stream payload.
    Stream(Bytes),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MultipartValue {
    Text(String),
    File(UploadedFile),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl ParsedBody {
    /// View used by schema validation. Bodies that have no JSON shape
    /// (binary, blobs, streams, absent) validate against `null`.
    pub fn as_value(&self) -> Value {
        match self {
            ParsedBody::Json(value) => value.clone(),
            ParsedBody::Form(map) => {
                Value::Object(map.iter().map(|(k, v)| (k.clone(), json!(v))).collect())
            }
            ParsedBody::Multipart(map) => Value::Object(
                map.iter()
                    .filter_map(|(k, v)| match v {
                        MultipartValue::Text(text) => Some((k.clone(), json!(text))),
                        MultipartValue::File(_) => None,
                    })
                    .collect(),
            ),
            ParsedBody::Text(text) => json!(text),
            ParsedBody::Empty
            | ParsedBody::Binary(_)
            | ParsedBody::Blob { .. }
            | ParsedBody::Stream(_) => Value::Null,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ParsedBody::Empty)
    }
}

/// Decode a fully-buffered body by media type.
///
/// GET and HEAD never attempt a read. The buffer is consumed exactly once;
/// a failure is reported once, as `BODY_PARSE_ERROR`.
pub async fn parse_body(
    method: &str,
    content_type: Option<&str>,
    body: Option<Bytes>,
) -> Result<ParsedBody, FrameworkError> {
    if matches!(method, "GET" | "HEAD") {
        return Ok(ParsedBody::Empty);
    }

    let bytes = body.unwrap_or_default();
    let Some(raw_type) = content_type else {
        return Ok(text_body(&bytes));
    };

    let mime: Mime = raw_type
        .parse()
        .map_err(|_| FrameworkError::body_parse(format!("unparseable content type: {raw_type}")))?;
    let type_ = mime.type_();
    let subtype = mime.subtype();

    if type_ == mime::APPLICATION && (subtype == mime::JSON || mime.suffix() == Some(mime::JSON)) {
        parse_json(&bytes)
    } else if type_ == mime::APPLICATION && subtype == mime::WWW_FORM_URLENCODED {
        let map = form_urlencoded::parse(&bytes)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Ok(ParsedBody::Form(map))
    } else if type_ == mime::MULTIPART && subtype == mime::FORM_DATA {
        parse_multipart(raw_type, bytes).await
    } else if type_ == mime::TEXT {
        Ok(text_body(&bytes))
    } else if type_ == mime::APPLICATION && subtype == mime::OCTET_STREAM {
        Ok(ParsedBody::Binary(bytes))
    } else if (type_ == mime::APPLICATION && subtype == mime::PDF)
        || type_ == mime::IMAGE
        || type_ == mime::VIDEO
    {
        Ok(ParsedBody::Blob {
            content_type: mime.essence_str().to_string(),
            data: bytes,
        })
    } else if type_ == mime::APPLICATION && subtype == "stream" {
        Ok(ParsedBody::Stream(bytes))
    } else {
        Ok(text_body(&bytes))
    }
}

fn parse_json(bytes: &Bytes) -> Result<ParsedBody, FrameworkError> {
    if bytes.is_empty() {
        // An absent JSON body is an empty object, not an error.
        return Ok(ParsedBody::Json(json!({})));
    }
    serde_json::from_slice(bytes)
        .map(ParsedBody::Json)
        .map_err(|e| FrameworkError::body_parse(format!("invalid JSON body: {e}")))
}

fn text_body(bytes: &Bytes) -> ParsedBody {
    ParsedBody::Text(String::from_utf8_lossy(bytes).into_owned())
}

async fn parse_multipart(raw_type: &str, bytes: Bytes) -> Result<ParsedBody, FrameworkError> {
    let boundary = multer::parse_boundary(raw_type)
        .map_err(|e| FrameworkError::body_parse(format!("invalid multipart boundary: {e}")))?;

    let stream =
        futures_util::stream::once(async move { Ok::<Bytes, std::convert::Infallible>(bytes) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut fields = HashMap::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return Err(FrameworkError::body_parse(format!(
                    "invalid multipart body: {e}"
                )));
            }
        };

        let name = field
            .name()
            .map(str::to_owned)
            .unwrap_or_else(|| format!("field_{}", fields.len()));
        let filename = field.file_name().map(str::to_owned);
        let content_type = field.content_type().map(|m| m.to_string());

        if filename.is_some() {
            let data = field
                .bytes()
                .await
                .map_err(|e| FrameworkError::body_parse(format!("multipart read failed: {e}")))?;
            fields.insert(
                name,
                MultipartValue::File(UploadedFile {
                    filename,
                    content_type,
                    data,
                }),
            );
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| FrameworkError::body_parse(format!("multipart read failed: {e}")))?;
            fields.insert(name, MultipartValue::Text(text));
        }
    }

    Ok(ParsedBody::Multipart(fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[tokio::test]
    async fn test_get_never_reads_body() {
        let body = parse_body("GET", Some("application/json"), Some(Bytes::from("{broken")))
            .await
            .unwrap();
        assert_eq!(body, ParsedBody::Empty);

        let body = parse_body("HEAD", None, Some(Bytes::from("x")))
            .await
            .unwrap();
        assert_eq!(body, ParsedBody::Empty);
    }

    #[tokio::test]
    async fn test_json_body() {
        let body = parse_body(
            "POST",
            Some("application/json"),
            Some(Bytes::from(r#"{"name":"ada"}"#)),
        )
        .await
        .unwrap();
        assert_eq!(body.as_value()["name"], "ada");
    }

    #[tokio::test]
    async fn test_empty_json_body_is_empty_object() {
        let body = parse_body("POST", Some("application/json"), None)
            .await
            .unwrap();
        assert_eq!(body, ParsedBody::Json(json!({})));
    }

    #[tokio::test]
    async fn test_invalid_json_is_a_parse_error() {
        let error = parse_body("POST", Some("application/json"), Some(Bytes::from("{nope")))
            .await
            .unwrap_err();
        assert_eq!(error.code(), ErrorCode::BodyParseError);
    }

    #[tokio::test]
    async fn test_urlencoded_body() {
        let body = parse_body(
            "POST",
            Some("application/x-www-form-urlencoded"),
            Some(Bytes::from("a=1&b=two%20words")),
        )
        .await
        .unwrap();
        let ParsedBody::Form(map) = body else {
            panic!("expected form body");
        };
        assert_eq!(map.get("a").map(String::as_str), Some("1"));
        assert_eq!(map.get("b").map(String::as_str), Some("two words"));
    }

    #[tokio::test]
    async fn test_multipart_body() {
        let payload = concat!(
            "--BOUND\r\n",
            "Content-Disposition: form-data; name=\"title\"\r\n\r\n",
            "hello\r\n",
            "--BOUND\r\n",
            "Content-Disposition: form-data; name=\"doc\"; filename=\"a.txt\"\r\n",
            "Content-Type: text/plain\r\n\r\n",
            "file-contents\r\n",
            "--BOUND--\r\n",
        );
        let body = parse_body(
            "POST",
            Some("multipart/form-data; boundary=BOUND"),
            Some(Bytes::from(payload)),
        )
        .await
        .unwrap();

        let ParsedBody::Multipart(map) = body else {
            panic!("expected multipart body");
        };
        assert_eq!(map.get("title"), Some(&MultipartValue::Text("hello".into())));
        let MultipartValue::File(file) = map.get("doc").unwrap() else {
            panic!("expected a file field");
        };
        assert_eq!(file.filename.as_deref(), Some("a.txt"));
        assert_eq!(file.content_type.as_deref(), Some("text/plain"));
        assert_eq!(file.data, Bytes::from("file-contents"));
    }

    #[tokio::test]
    async fn test_text_body() {
        let body = parse_body("POST", Some("text/plain"), Some(Bytes::from("hi there")))
            .await
            .unwrap();
        assert_eq!(body, ParsedBody::Text("hi there".into()));
    }

    #[tokio::test]
    async fn test_octet_stream_is_binary() {
        let body = parse_body(
            "POST",
            Some("application/octet-stream"),
            Some(Bytes::from(vec![0u8, 1, 2])),
        )
        .await
        .unwrap();
        assert_eq!(body, ParsedBody::Binary(Bytes::from(vec![0u8, 1, 2])));
    }

    #[tokio::test]
    async fn test_media_blobs_preserve_content_type() {
        for ct in ["application/pdf", "image/png", "video/mp4"] {
            let body = parse_body("POST", Some(ct), Some(Bytes::from("blob")))
                .await
                .unwrap();
            let ParsedBody::Blob { content_type, data } = body else {
                panic!("expected blob for {ct}");
            };
            assert_eq!(content_type, ct);
            assert_eq!(data, Bytes::from("blob"));
        }
    }

    #[tokio::test]
    async fn test_stream_media_type() {
        let body = parse_body("POST", Some("application/stream"), Some(Bytes::from("raw")))
            .await
            .unwrap();
        assert_eq!(body, ParsedBody::Stream(Bytes::from("raw")));
    }

    #[tokio::test]
    async fn test_unknown_and_absent_types_are_text() {
        let body = parse_body("POST", Some("application/x-custom"), Some(Bytes::from("x")))
            .await
            .unwrap();
        assert_eq!(body, ParsedBody::Text("x".into()));

        let body = parse_body("POST", None, Some(Bytes::from("y"))).await.unwrap();
        assert_eq!(body, ParsedBody::Text("y".into()));
    }

    #[test]
    fn test_as_value_shapes() {
        assert_eq!(ParsedBody::Empty.as_value(), Value::Null);
        assert_eq!(ParsedBody::Text("x".into()).as_value(), json!("x"));
        assert_eq!(
            ParsedBody::Binary(Bytes::from("x")).as_value(),
            Value::Null
        );
        let form = ParsedBody::Form(HashMap::from([("a".to_string(), "1".to_string())]));
        assert_eq!(form.as_value(), json!({"a": "1"}));
    }
}
