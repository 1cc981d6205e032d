use serde::Deserialize;
use validator::Validate;

/// Landing page form asking for a file's details
#[derive(Debug, Default, Deserialize, Validate)]
pub struct CheckFileForm {
    #[validate(length(min = 1, max = 128, message = "Please enter a file ID"))]
    pub uuid: Option<String>,
}

impl CheckFileForm {
    /// Trimmed token, if one was entered
    pub fn token(&self) -> Option<&str> {
        self.uuid.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}
