use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AmplifierError>;

#[derive(Debug, Error)]
pub enum AmplifierError {
    #[error("I/O error on {path}: {source}")]
    EmissionIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no duplication budget entry for admitted test {test}")]
    Configuration { test: String },

    #[error("unresolved reference in {type_name}: {reference}")]
    UnresolvedReference { type_name: String, reference: String },

    #[error("isolated type {qualified_name} collides with an existing type")]
    NameCollision { qualified_name: String },

    #[error("emitted file {path} violates its tail layout: {message}")]
    EmissionContract { path: PathBuf, message: String },

    #[error("cannot model {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("required path does not exist: {path}")]
    MissingPath { path: PathBuf },
}

impl AmplifierError {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration { .. } | Self::InvalidArgument { .. } => 2,
            _ => 1,
        }
    }

    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn io_at(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::EmissionIo {
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::AmplifierError;

    #[test]
    fn configuration_error_names_the_test_and_exits_with_two() {
        let error = AmplifierError::Configuration {
            test: "fr.example.T#testX".to_string(),
        };
        assert_eq!(error.exit_code(), 2);
        assert!(error.to_string().contains("fr.example.T#testX"));
    }

    #[test]
    fn emission_io_error_carries_destination_path() {
        let error = AmplifierError::io_at(
            "/tmp/out/T_testX.java",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(error.exit_code(), 1);
        assert!(matches!(
            &error,
            AmplifierError::EmissionIo { path, .. } if path == Path::new("/tmp/out/T_testX.java")
        ));
        assert!(error.to_string().contains("/tmp/out/T_testX.java"));
    }
}
