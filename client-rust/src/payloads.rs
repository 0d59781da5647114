//! One request body per mutation endpoint. Each payload carries its own form
//! constraints; [`Payload::check`] runs them before anything is sent.

use crate::{transport::MultipartField, ClientResult, Role, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

pub trait Payload: Validate {
    fn check(&self) -> ClientResult<()> {
        self.validate()
            .map_err(|errors| ValidationError::from(errors).into())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq, Eq)]
pub struct LoginRequest {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

impl Payload for LoginRequest {}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq, Eq)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 150, message = "Full name is required"))]
    pub full_name: String,
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirm_password: String,
}

impl Payload for RegisterRequest {}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct EventPayload {
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: String,
    #[validate(length(min = 1, max = 255, message = "Location is required"))]
    pub location: String,
    pub date: DateTime<Utc>,
    #[validate(range(min = 1, message = "Capacity must be at least 1"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_deadline: Option<DateTime<Utc>>,
}

impl Payload for EventPayload {
    fn check(&self) -> ClientResult<()> {
        let mut error = match self.validate() {
            Ok(()) => ValidationError::default(),
            Err(errors) => ValidationError::from(errors),
        };
        if self
            .registration_deadline
            .is_some_and(|deadline| deadline > self.date)
        {
            error.fields.push(crate::FieldError {
                field: "registration_deadline".to_string(),
                message: "Registration must close before the event starts".to_string(),
            });
        }
        if error.is_empty() {
            Ok(())
        } else {
            Err(error.into())
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq, Eq)]
pub struct ProjectPayload {
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: String,
    #[validate(range(max = 100, message = "Progress must be between 0 and 100"))]
    pub progress: u8,
}

impl Payload for ProjectPayload {}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq, Eq)]
pub struct NotificationPayload {
    #[validate(length(min = 1, max = 500, message = "Message is required"))]
    pub message: String,
}

impl Payload for NotificationPayload {}

/// Body of `PATCH /artwork/{id}/reject/`. A rejection without feedback is
/// refused locally.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq, Eq)]
pub struct RejectPayload {
    #[validate(custom(function = "not_blank", message = "Feedback is required"))]
    pub feedback: String,
}

impl Payload for RejectPayload {}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq, Eq)]
pub struct RoleUpdate {
    pub role: Role,
}

impl Payload for RoleUpdate {}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq, Eq)]
pub struct ProfileUpdate {
    #[validate(length(min = 1, max = 150, message = "Full name is required"))]
    pub name: String,
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[validate(length(max = 1000, message = "Bio must be at most 1000 characters"))]
    pub bio: String,
}

impl Payload for ProfileUpdate {}

/// Multipart submission of a new artwork.
#[derive(Debug, Clone, Validate, PartialEq, Eq)]
pub struct ArtworkUpload {
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: String,
    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,
    #[validate(length(min = 1, message = "File name is required"))]
    pub file_name: String,
    #[validate(length(min = 1, message = "An image is required"))]
    pub image: Vec<u8>,
}

impl Payload for ArtworkUpload {}

impl ArtworkUpload {
    #[must_use]
    pub fn into_fields(self) -> Vec<MultipartField> {
        let mime = mime_for(&self.file_name);
        vec![
            MultipartField::Text {
                name: "title".to_string(),
                value: self.title,
            },
            MultipartField::Text {
                name: "description".to_string(),
                value: self.description,
            },
            MultipartField::Text {
                name: "category".to_string(),
                value: self.category,
            },
            MultipartField::File {
                name: "image".to_string(),
                file_name: self.file_name,
                mime,
                bytes: self.image,
            },
        ]
    }
}

fn mime_for(file_name: &str) -> Option<String> {
    let extension = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    let mime = match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => return None,
    };
    Some(mime.to_string())
}

#[allow(clippy::ptr_arg)]
fn not_blank(value: &String) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        return Err(validator::ValidationError::new("blank"));
    }
    Ok(())
}
