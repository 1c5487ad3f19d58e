use thiserror::Error;

/// Extensions accepted for upload, compared case-insensitively.
pub const ALLOWED_EXTENSIONS: [&str; 6] = ["txt", "pdf", "jpg", "jpeg", "png", "json"];

const MAX_STORED_NAME_LENGTH: usize = 255;

/// Longest collision suffix `FileManager` can append.
const LONGEST_SUFFIX: &str = "(10000)";

/// Leaves room for any collision suffix within `MAX_STORED_NAME_LENGTH`.
pub const MAX_FILENAME_LENGTH: usize = MAX_STORED_NAME_LENGTH - LONGEST_SUFFIX.len();

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing filename")]
    MissingFilename,

    #[error("invalid filename: {filename}")]
    InvalidFilename { filename: String },

    #[error("type not allowed: .{extension} (allowed: {allowed})", allowed = ALLOWED_EXTENSIONS.join(", "))]
    TypeNotAllowed { extension: String },
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FileValidator;

impl FileValidator {
    pub fn new() -> Self {
        Self
    }

    /// Checks an upload name and returns it trimmed.
    pub fn validate_upload<'a>(&self, filename: Option<&'a str>) -> Result<&'a str, ValidationError> {
        let filename = filename
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or(ValidationError::MissingFilename)?;

        self.validate_filename(filename)?;
        self.validate_extension(filename)?;

        Ok(filename)
    }

    fn validate_filename(&self, filename: &str) -> Result<(), ValidationError> {
        let invalid = filename.len() > MAX_FILENAME_LENGTH
            || filename == "."
            || filename == ".."
            || filename.contains(['/', '\\'])
            || filename.chars().any(char::is_control);

        if invalid {
            return Err(ValidationError::InvalidFilename {
                filename: filename.to_string(),
            });
        }

        Ok(())
    }

    fn validate_extension(&self, filename: &str) -> Result<(), ValidationError> {
        let extension = extension_of(filename);
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(ValidationError::TypeNotAllowed { extension });
        }
        Ok(())
    }
}

/// Lowercased text after the last `.`, or empty when there is none.
pub fn extension_of(filename: &str) -> String {
    filename
        .rfind('.')
        .map(|idx| filename[idx + 1..].to_ascii_lowercase())
        .unwrap_or_default()
}
