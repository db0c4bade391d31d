//! Flat-file secret loading.
//!
//! Each credential lives in its own text file holding a single token with no
//! surrounding structure.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("token file not found or unreadable: {path}")]
    Missing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("token file is empty: {path}")]
    Empty { path: PathBuf },
}

/// Reads a token file and returns its contents with surrounding whitespace trimmed.
pub fn read_token(path: impl AsRef<Path>) -> Result<String, CredentialError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| {
        error!(path = %path.display(), error = %source, "Token file not found");
        CredentialError::Missing {
            path: path.to_path_buf(),
            source,
        }
    })?;

    let token = content.trim();
    if token.is_empty() {
        return Err(CredentialError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(name)
    }

    #[test]
    fn test_read_token_trims_whitespace() {
        let path = temp_path("parking_health_token_trim.txt");
        fs::write(&path, "  abc123\n\n").unwrap();

        assert_eq!(read_token(&path).unwrap(), "abc123");

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_read_token_missing_file() {
        let path = temp_path("parking_health_token_does_not_exist.txt");
        let _ = fs::remove_file(&path);

        let err = read_token(&path).unwrap_err();
        assert!(matches!(err, CredentialError::Missing { .. }));
    }

    #[test]
    fn test_read_token_empty_file() {
        let path = temp_path("parking_health_token_empty.txt");
        fs::write(&path, " \n").unwrap();

        let err = read_token(&path).unwrap_err();
        assert!(matches!(err, CredentialError::Empty { .. }));

        fs::remove_file(&path).unwrap();
    }
}
