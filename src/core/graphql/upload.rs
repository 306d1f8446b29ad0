//! Turning multipart `Upload` arguments into validated image uploads

use async_graphql::{Context, Upload};

use super::errors::ClientError;
use crate::core::storage::ImageUpload;
use crate::core::validation::{ValidationError, ValidationResult};

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("Unable to read upload: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError for UploadError {
    fn code(&self) -> &'static str {
        match self {
            UploadError::Invalid(_) => "BAD_USER_INPUT",
            UploadError::Io(_) => "UPLOAD_FAILED",
        }
    }

    fn is_internal(&self) -> bool {
        matches!(self, UploadError::Io(_))
    }
}

/// Check type and size of an uploaded image and hand back its content
pub fn take_image(ctx: &Context<'_>, upload: &Upload) -> Result<ImageUpload, UploadError> {
    let value = upload.value(ctx)?;
    ValidationResult::new()
        .image(&value.filename, value.size()?)
        .to_result()?;
    Ok(ImageUpload::new(value.filename, value.content))
}

pub fn take_images(ctx: &Context<'_>, uploads: &[Upload]) -> Result<Vec<ImageUpload>, UploadError> {
    uploads.iter().map(|u| take_image(ctx, u)).collect()
}
