use serde_json::Value;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// The request never produced a response (connection refused, DNS,
    /// timeout, ...).
    #[error("Network error: {0}")]
    Network(#[source] BoxedError),
    /// The server answered with a non-2xx status code.
    #[error("HTTP error: {body} (Status {status})")]
    Http { status: u16, body: String },
    /// A form payload failed its local constraints. Nothing was sent.
    #[error("Validation error: {0}")]
    Validation(ValidationError),
    /// A 2xx body could not be decoded into the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Invariant: {0}")]
    Invariant(String),
}

impl ClientError {
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_unauthenticated(&self) -> bool {
        self.status() == Some(401)
    }

    /// Message suitable for a toast. The API reports failures as
    /// `{"error": ..}` or `{"detail": ..}`; anything else falls back to
    /// `default`.
    #[must_use]
    pub fn user_message(&self, default: &str) -> String {
        match self {
            Self::Http { body, .. } => serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|value| {
                    ["error", "detail"].iter().find_map(|key| {
                        value
                            .get(key)
                            .and_then(Value::as_str)
                            .map(ToString::to_string)
                    })
                })
                .unwrap_or_else(|| default.to_string()),
            Self::Validation(error) => error.to_string(),
            Self::Network(_) => format!("{default}: the server could not be reached"),
            Self::Decode(_) | Self::Invariant(_) => default.to_string(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(Box::new(error))
    }
}

impl From<ValidationError> for ClientError {
    fn from(error: ValidationError) -> Self {
        Self::Validation(error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Every constraint violation found on a form, keyed by field name so the
/// view can render each message next to its input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    pub fields: Vec<FieldError>,
}

impl ValidationError {
    #[must_use]
    pub fn for_field(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|error| error.field == field)
            .map(|error| error.message.as_str())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self
            .fields
            .iter()
            .map(|error| format!("{}: {}", error.field, error.message))
            .collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl From<validator::ValidationErrors> for ValidationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                let field = field.to_string();
                errors.iter().map(move |error| FieldError {
                    field: field.clone(),
                    message: error
                        .message
                        .as_ref()
                        .map_or_else(|| error.code.to_string(), ToString::to_string),
                })
            })
            .collect();
        // field_errors() is a HashMap
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        Self { fields }
    }
}

pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

pub type ClientResult<T> = Result<T, ClientError>;
