use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::ServerError;

/// Default address the server binds to.
pub const DEFAULT_BIND: &str = "127.0.0.1:8787";

/// Default RPC endpoint path.
pub const DEFAULT_RPC_PATH: &str = "/api/rpc";

/// Default session cookie name.
pub const DEFAULT_AUTH_COOKIE: &str = "auth_token";

/// Default session lifetime (7 days).
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Prefix of variables collected into the env bindings.
const ENV_BINDING_PREFIX: &str = "TANDEM_ENV_";

/// Server configuration.
///
/// # Default Configuration
///
/// - `bind`: 127.0.0.1:8787
/// - `rpc_path`: `/api/rpc`
/// - `debug`: false (internal error details stay out of responses)
/// - `auth_secret`: a fixed development secret
/// - `auth_cookie`: `auth_token`
/// - `session_ttl`: 7 days
/// - `supported_langs`: `["en"]`
/// - `env`: empty
///
/// # Environment
///
/// [`ServerConfig::from_env`] reads `TANDEM_BIND`, `TANDEM_RPC_PATH`,
/// `TANDEM_DEBUG`, `TANDEM_AUTH_SECRET`, `TANDEM_LANGS` (comma separated)
/// and every `TANDEM_ENV_<NAME>` variable, which becomes env binding `<NAME>`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub rpc_path: String,
    pub debug: bool,
    pub auth_secret: String,
    pub auth_cookie: String,
    pub session_ttl: Duration,
    pub supported_langs: Vec<String>,
    pub env: HashMap<String, String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8787)),
            rpc_path: DEFAULT_RPC_PATH.to_string(),
            debug: false,
            auth_secret: "tandem-development-secret".to_string(),
            auth_cookie: DEFAULT_AUTH_COOKIE.to_string(),
            session_ttl: DEFAULT_SESSION_TTL,
            supported_langs: vec!["en".to_string()],
            env: HashMap::new(),
        }
    }
}

impl ServerConfig {
    /// Builds a configuration from the process environment.
    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_vars(std::env::vars())
    }

    /// Builds a configuration from `(name, value)` pairs.
    pub fn from_vars<I>(vars: I) -> Result<Self, ServerError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = Self::default();

        for (name, value) in vars {
            match name.as_str() {
                "TANDEM_BIND" => {
                    config.bind = value.parse().map_err(|e| {
                        ServerError::Config(format!("TANDEM_BIND '{}': {}", value, e))
                    })?;
                }
                "TANDEM_RPC_PATH" => config = config.with_rpc_path(value)?,
                "TANDEM_DEBUG" => config.debug = parse_flag(&value),
                "TANDEM_AUTH_SECRET" => config.auth_secret = value,
                "TANDEM_LANGS" => {
                    let langs: Vec<String> = value
                        .split(',')
                        .map(|lang| lang.trim().to_ascii_lowercase())
                        .filter(|lang| !lang.is_empty())
                        .collect();
                    if !langs.is_empty() {
                        config.supported_langs = langs;
                    }
                }
                _ => {
                    if let Some(binding) = name.strip_prefix(ENV_BINDING_PREFIX) {
                        if !binding.is_empty() {
                            config.env.insert(binding.to_string(), value);
                        }
                    }
                }
            }
        }

        Ok(config)
    }

    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.bind = bind;
        self
    }

    /// Sets the RPC path. It must start with `/`.
    pub fn with_rpc_path(mut self, rpc_path: impl Into<String>) -> Result<Self, ServerError> {
        let rpc_path = rpc_path.into();
        if !rpc_path.starts_with('/') {
            return Err(ServerError::Config(format!(
                "RPC path '{}' must start with '/'",
                rpc_path
            )));
        }
        self.rpc_path = rpc_path;
        Ok(self)
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_auth_secret(mut self, secret: impl Into<String>) -> Self {
        self.auth_secret = secret.into();
        self
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn with_supported_langs<I, S>(mut self, langs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_langs = langs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind.to_string(), DEFAULT_BIND);
        assert_eq!(config.rpc_path, "/api/rpc");
        assert!(!config.debug);
        assert_eq!(config.auth_cookie, "auth_token");
        assert_eq!(config.supported_langs, vec!["en"]);
    }

    #[test]
    fn test_from_vars() {
        let config = ServerConfig::from_vars(vars(&[
            ("TANDEM_BIND", "0.0.0.0:9000"),
            ("TANDEM_RPC_PATH", "/rpc"),
            ("TANDEM_DEBUG", "true"),
            ("TANDEM_AUTH_SECRET", "s3cret"),
            ("TANDEM_LANGS", "en, PT ,"),
            ("TANDEM_ENV_PRODUCTION", "false"),
            ("HOME", "/root"),
        ]))
        .unwrap();

        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.rpc_path, "/rpc");
        assert!(config.debug);
        assert_eq!(config.auth_secret, "s3cret");
        assert_eq!(config.supported_langs, vec!["en", "pt"]);
        assert_eq!(config.env.get("PRODUCTION").map(String::as_str), Some("false"));
        assert_eq!(config.env.len(), 1);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(ServerConfig::from_vars(vars(&[("TANDEM_BIND", "nope")])).is_err());
        assert!(ServerConfig::from_vars(vars(&[("TANDEM_RPC_PATH", "api")])).is_err());
    }

    #[test]
    fn test_debug_flag_parsing() {
        assert!(parse_flag("1"));
        assert!(parse_flag("ON"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }
}
