//! Process configuration read from the environment.

use crate::error::ClientError;
use std::path::PathBuf;

/// Port of the engine session's API.
pub const SESSION_PORT_VAR: &str = "DAGGER_SESSION_PORT";
/// Token authenticating against the session.
pub const SESSION_TOKEN_VAR: &str = "DAGGER_SESSION_TOKEN";
/// Optional doc index file.
pub const DOCS_VAR: &str = "DAGGER_MODULE_DOCS";
/// `json` switches logs to JSON lines.
pub const LOG_FORMAT_VAR: &str = "DAGGER_MODULE_LOG_FORMAT";
/// Log filter directives.
pub const LOG_FILTER_VAR: &str = "RUST_LOG";

const DEFAULT_LOG_FILTER: &str = "info";

/// Connection details of the engine session this process runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub port: u16,
    pub token: String,
}

impl SessionConfig {
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the session from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = lookup(SESSION_PORT_VAR).ok_or(ClientError::MissingSession(SESSION_PORT_VAR))?;
        let port = port
            .trim()
            .parse::<u16>()
            .map_err(|_| ClientError::InvalidSession {
                name: SESSION_PORT_VAR,
                value: port.clone(),
            })?;
        let token = lookup(SESSION_TOKEN_VAR)
            .filter(|t| !t.is_empty())
            .ok_or(ClientError::MissingSession(SESSION_TOKEN_VAR))?;

        Ok(Self { port, token })
    }

    /// The session's GraphQL endpoint.
    pub fn endpoint(&self) -> String {
        format!("http://127.0.0.1:{}/query", self.port)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Settings for the module process itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub log_filter: String,
    pub log_format: LogFormat,
    pub docs_path: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            log_format: LogFormat::Text,
            docs_path: None,
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let log_format = match lookup(LOG_FORMAT_VAR) {
            Some(format) if format.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Self {
            log_filter: lookup(LOG_FILTER_VAR)
                .filter(|f| !f.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            log_format,
            docs_path: lookup(DOCS_VAR).filter(|p| !p.is_empty()).map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_session_from_vars() {
        let env = vars(&[(SESSION_PORT_VAR, "41234"), (SESSION_TOKEN_VAR, "secret")]);
        let session = SessionConfig::from_lookup(|k| env.get(k).cloned()).unwrap();
        assert_eq!(session.port, 41234);
        assert_eq!(session.endpoint(), "http://127.0.0.1:41234/query");
    }

    #[rstest]
    #[case(&[(SESSION_TOKEN_VAR, "secret")], "Missing session variable: DAGGER_SESSION_PORT")]
    #[case(&[(SESSION_PORT_VAR, "41234")], "Missing session variable: DAGGER_SESSION_TOKEN")]
    #[case(
        &[(SESSION_PORT_VAR, "http"), (SESSION_TOKEN_VAR, "secret")],
        "Invalid session variable DAGGER_SESSION_PORT: http"
    )]
    fn test_session_errors(#[case] pairs: &[(&str, &str)], #[case] message: &str) {
        let env = vars(pairs);
        let err = SessionConfig::from_lookup(|k| env.get(k).cloned()).unwrap_err();
        assert_eq!(err.to_string(), message);
    }

    #[test]
    fn test_runtime_defaults() {
        let config = RuntimeConfig::from_lookup(|_| None);
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn test_runtime_from_vars() {
        let env = vars(&[
            (LOG_FILTER_VAR, "debug,hyper=warn"),
            (LOG_FORMAT_VAR, "JSON"),
            (DOCS_VAR, "/src/docs.json"),
        ]);
        let config = RuntimeConfig::from_lookup(|k| env.get(k).cloned());
        assert_eq!(config.log_filter, "debug,hyper=warn");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.docs_path, Some(PathBuf::from("/src/docs.json")));
    }
}
