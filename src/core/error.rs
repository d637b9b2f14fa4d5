//! Error types shared by the engine and both front ends

use thiserror::Error;

/// Why a single image in a scene set could not be made ready.
///
/// Load failures are never fatal: the engine logs them and excludes the
/// image from the ready count.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {src}: {reason}")]
    Io { src: String, reason: String },

    #[error("failed to decode {src}: {reason}")]
    Decode { src: String, reason: String },

    #[error("image {src} has zero size")]
    Empty { src: String },

    #[error("browser failed to load {src}: {reason}")]
    Dom { src: String, reason: String },
}

impl LoadError {
    /// Source reference the failure belongs to
    pub fn src(&self) -> &str {
        match self {
            Self::Io { src, .. }
            | Self::Decode { src, .. }
            | Self::Empty { src }
            | Self::Dom { src, .. } => src,
        }
    }
}

/// Site configuration could not be parsed or is inconsistent.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_exposes_source() {
        let err = LoadError::Empty {
            src: "assets/nyc-liberty.jpg".into(),
        };
        assert_eq!(err.src(), "assets/nyc-liberty.jpg");
        assert_eq!(err.to_string(), "image assets/nyc-liberty.jpg has zero size");
    }

    #[test]
    fn json_errors_convert() {
        let err: ConfigError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, ConfigError::Json(_)));
    }
}
