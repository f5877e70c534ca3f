use crate::error::ValidationIssue;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

/// Validates an untyped payload and returns its normalized form.
///
/// Actions attach one of these for their body and query; plugin events may
/// attach one for their payload.
pub trait Schema: Send + Sync {
    fn validate(&self, value: &Value) -> Result<Value, Vec<ValidationIssue>>;
}

/// Schema backed by a deserializable type carrying `garde` rules.
///
/// Validation deserializes the payload into `T`, runs its rules, and
/// re-serializes the typed value so handlers see the normalized form.
pub struct TypedSchema<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedSchema<T>
where
    T: DeserializeOwned + Serialize + garde::Validate<Context = ()> + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }

    pub fn arc() -> Arc<dyn Schema> {
        Arc::new(Self::new())
    }
}

impl<T> Default for TypedSchema<T>
where
    T: DeserializeOwned + Serialize + garde::Validate<Context = ()> + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Schema for TypedSchema<T>
where
    T: DeserializeOwned + Serialize + garde::Validate<Context = ()> + Send + Sync + 'static,
{
    fn validate(&self, value: &Value) -> Result<Value, Vec<ValidationIssue>> {
        let typed: T = serde_json::from_value(value.clone()).map_err(|e| {
            vec![ValidationIssue::new("", e.to_string(), "invalid_type")]
        })?;

        if let Err(report) = typed.validate() {
            return Err(report
                .iter()
                .map(|(path, error)| {
                    ValidationIssue::new(path.to_string(), error.to_string(), "invalid")
                })
                .collect());
        }

        serde_json::to_value(&typed)
            .map_err(|e| vec![ValidationIssue::new("", e.to_string(), "serialize_failed")])
    }
}

/// Schema from a plain function, for ad-hoc rules.
pub struct FnSchema<F>(pub F);

impl<F> Schema for FnSchema<F>
where
    F: Fn(&Value) -> Result<Value, Vec<ValidationIssue>> + Send + Sync,
{
    fn validate(&self, value: &Value) -> Result<Value, Vec<ValidationIssue>> {
        (self.0)(value)
    }
}
