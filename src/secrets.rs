//! # Secrets Module
//!
//! Credentials for the code-search API and the inference endpoint. They are
//! read from a YAML secrets file shaped like
//!
//! ```yaml
//! auth:
//!   GITHUB_API_TOKEN: ghp_...
//!   DB_TOKEN: dapi...
//! ```
//!
//! Environment variables (`GITHUB_TOKEN`, `DB_TOKEN`) take precedence over the
//! file so a token can be supplied without writing it to disk.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Default location of the secrets file, relative to the working directory
pub const DEFAULT_SECRETS_PATH: &str = ".secrets";

/// Environment variable holding the code-search API token
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Environment variable holding the inference endpoint token
pub const DB_TOKEN_ENV: &str = "DB_TOKEN";

/// Parsed secrets file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub auth: AuthSecrets,
}

/// The `auth` section of the secrets file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthSecrets {
    /// Token for the code-search API
    #[serde(rename = "GITHUB_API_TOKEN", default)]
    pub github_api_token: Option<String>,

    /// Token for the hosted inference endpoint
    #[serde(rename = "DB_TOKEN", default)]
    pub db_token: Option<String>,
}

impl Secrets {
    /// Parse secrets from YAML text
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Load secrets from a file that must exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&text)
    }

    /// Load secrets from a file, treating a missing file as empty secrets
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No secrets file at {}", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Token for the code-search API, environment first
    pub fn github_token(&self) -> Result<String> {
        pick_token(
            std::env::var(GITHUB_TOKEN_ENV).ok(),
            self.auth.github_api_token.as_deref(),
            GITHUB_TOKEN_ENV,
            "GITHUB_API_TOKEN",
        )
    }

    /// Token for the inference endpoint, environment first
    pub fn db_token(&self) -> Result<String> {
        pick_token(
            std::env::var(DB_TOKEN_ENV).ok(),
            self.auth.db_token.as_deref(),
            DB_TOKEN_ENV,
            "DB_TOKEN",
        )
    }
}

fn pick_token(
    from_env: Option<String>,
    from_file: Option<&str>,
    env_name: &str,
    file_key: &str,
) -> Result<String> {
    from_env
        .filter(|t| !t.trim().is_empty())
        .or_else(|| {
            from_file
                .map(str::to_string)
                .filter(|t| !t.trim().is_empty())
        })
        .ok_or_else(|| {
            Error::Auth(format!(
                "set {} or auth.{} in the secrets file",
                env_name, file_key
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_secrets_file() {
        let secrets = Secrets::from_yaml_str(
            "auth:\n  GITHUB_API_TOKEN: ghp_abc\n  DB_TOKEN: dapi123\n",
        )
        .unwrap();
        assert_eq!(secrets.auth.github_api_token.as_deref(), Some("ghp_abc"));
        assert_eq!(secrets.auth.db_token.as_deref(), Some("dapi123"));
    }

    #[test]
    fn test_parse_partial_secrets() {
        let secrets = Secrets::from_yaml_str("auth:\n  DB_TOKEN: x\n").unwrap();
        assert!(secrets.auth.github_api_token.is_none());

        let empty = Secrets::from_yaml_str("{}").unwrap();
        assert!(empty.auth.db_token.is_none());
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let secrets = Secrets::load_or_default(dir.path().join("nope")).unwrap();
        assert!(secrets.auth.github_api_token.is_none());
        assert!(Secrets::load(dir.path().join("nope")).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "auth:\n  GITHUB_API_TOKEN: from-file").unwrap();
        let secrets = Secrets::load(file.path()).unwrap();
        assert_eq!(secrets.auth.github_api_token.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_env_takes_precedence() {
        let token = pick_token(Some("env".into()), Some("file"), "A", "B").unwrap();
        assert_eq!(token, "env");

        let token = pick_token(Some("  ".into()), Some("file"), "A", "B").unwrap();
        assert_eq!(token, "file");

        let missing = pick_token(None, None, "GITHUB_TOKEN", "GITHUB_API_TOKEN");
        assert!(matches!(missing, Err(Error::Auth(msg)) if msg.contains("GITHUB_TOKEN")));
    }
}
