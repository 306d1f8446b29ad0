//! Input rules applied before resolvers touch the database
//!
//! Rules collect every failure into a `ValidationResult` so a client sees all
//! problems with a request at once; the first error is what gets reported.

use std::path::Path;

/// Largest accepted image upload (3 MiB)
pub const MAX_IMAGE_BYTES: u64 = 3 * 1024 * 1024;

/// Accepted image extensions, compared case-insensitively
pub const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Validation error types
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Required field is empty or whitespace
    Required { field: &'static str },
    /// Email address is malformed
    InvalidEmail,
    /// Upload has no or an unsupported extension
    UnsupportedImage { filename: String },
    /// Upload exceeds the size limit
    ImageTooLarge { max: u64, actual: u64 },
    /// Coordinate outside its valid range
    OutOfRange { field: &'static str },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Required { field } => write!(f, "{} is required", field),
            ValidationError::InvalidEmail => write!(f, "Invalid email address"),
            ValidationError::UnsupportedImage { filename } => write!(
                f,
                "Unsupported image '{}': only png, jpg and jpeg files are accepted",
                filename
            ),
            ValidationError::ImageTooLarge { max, actual } => {
                write!(f, "Image is too large ({} bytes, max {})", actual, max)
            }
            ValidationError::OutOfRange { field } => write!(f, "{} is out of range", field),
        }
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Field must contain something other than whitespace
    pub fn require(mut self, field: &'static str, value: &str) -> Self {
        if value.trim().is_empty() {
            self.add_error(ValidationError::Required { field });
        }
        self
    }

    pub fn email(mut self, email: &str) -> Self {
        if let Err(e) = validate_email(email) {
            self.add_error(e);
        }
        self
    }

    pub fn coordinates(self, latitude: f64, longitude: f64) -> Self {
        self.optional_coordinates(Some(latitude), Some(longitude))
    }

    /// Range-check whichever of the two coordinates is present
    pub fn optional_coordinates(mut self, latitude: Option<f64>, longitude: Option<f64>) -> Self {
        if latitude.is_some_and(|lat| !(-90.0..=90.0).contains(&lat)) {
            self.add_error(ValidationError::OutOfRange { field: "lat" });
        }
        if longitude.is_some_and(|long| !(-180.0..=180.0).contains(&long)) {
            self.add_error(ValidationError::OutOfRange { field: "long" });
        }
        self
    }

    pub fn image(mut self, filename: &str, size: u64) -> Self {
        if let Err(e) = validate_image(filename, size) {
            self.add_error(e);
        }
        self
    }

    /// First error, if any
    pub fn to_result(&self) -> Result<(), ValidationError> {
        match self.errors.first() {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

/// `local@domain.tld` shape check
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ValidationError::InvalidEmail);
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ValidationError::InvalidEmail);
    }
    if email.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidEmail);
    }

    match domain.rsplit_once('.') {
        Some((host, tld)) if !host.is_empty() && !tld.is_empty() => Ok(()),
        _ => Err(ValidationError::InvalidEmail),
    }
}

/// Lowercased extension if it is an accepted image type
pub fn image_extension(filename: &str) -> Option<String> {
    let ext = Path::new(filename).extension()?.to_str()?.to_ascii_lowercase();
    IMAGE_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

pub fn validate_image(filename: &str, size: u64) -> Result<(), ValidationError> {
    if image_extension(filename).is_none() {
        return Err(ValidationError::UnsupportedImage {
            filename: filename.to_string(),
        });
    }
    if size > MAX_IMAGE_BYTES {
        return Err(ValidationError::ImageTooLarge {
            max: MAX_IMAGE_BYTES,
            actual: size,
        });
    }
    Ok(())
}
