//! The single status line shown after a batch or import goes wrong.

use muse_gen::GenerationError;
use std::fmt;

pub const CANCELLED_TEXT: &str = ">> OP_CANCELLED_BY_USER";
pub const MISSING_KEY_TEXT: &str = ">> SYSTEM ERROR: MISSING API KEY. PLEASE CONFIGURE SETTINGS.";
pub const IMPORT_FAILED_TEXT: &str = "Failed to process image.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Banner {
    Cancelled,
    MissingCredentials,
    RegionRestricted(String),
    ApiFailure(String),
    ImportFailed,
}

impl Banner {
    pub fn from_error(err: &GenerationError) -> Self {
        match err {
            GenerationError::Cancelled => Banner::Cancelled,
            GenerationError::MissingCredentials => Banner::MissingCredentials,
            GenerationError::RegionRestricted(msg) => Banner::RegionRestricted(msg.clone()),
            other => Banner::ApiFailure(other.to_string()),
        }
    }

    /// Whether the host should open the settings dialog.
    pub fn requests_settings(&self) -> bool {
        matches!(self, Banner::MissingCredentials)
    }
}

impl fmt::Display for Banner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Banner::Cancelled => f.write_str(CANCELLED_TEXT),
            Banner::MissingCredentials => f.write_str(MISSING_KEY_TEXT),
            Banner::RegionRestricted(msg) => write!(f, ">> REGION_LOCKED: {msg}"),
            Banner::ApiFailure(msg) => write!(f, ">> API_FAIL: {msg}"),
            Banner::ImportFailed => f.write_str(IMPORT_FAILED_TEXT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texts() {
        assert_eq!(Banner::Cancelled.to_string(), ">> OP_CANCELLED_BY_USER");
        assert_eq!(
            Banner::from_error(&GenerationError::RateLimited("quota".into())).to_string(),
            ">> API_FAIL: rate limited: quota"
        );
        assert!(Banner::from_error(&GenerationError::MissingCredentials).requests_settings());
        assert!(!Banner::from_error(&GenerationError::Unknown("x".into())).requests_settings());
    }

    #[test]
    fn region_is_distinct() {
        let banner = Banner::from_error(&GenerationError::RegionRestricted("EU".into()));
        assert_eq!(banner, Banner::RegionRestricted("EU".into()));
        assert!(banner.to_string().starts_with(">> REGION_LOCKED"));
    }
}
