use std::collections::HashSet;
use std::time::Duration;

/// Path the server mounts the RPC endpoint on.
pub const DEFAULT_RPC_PATH: &str = "/api/rpc";

/// Endpoint used when no URL is configured.
pub const DEFAULT_URL: &str = "http://127.0.0.1:8787/api/rpc";

/// Settle window for argument-driven refetches.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Client configuration.
///
/// # Default Configuration
///
/// - `url`: [`DEFAULT_URL`]
/// - `abortable`: `true` (in-flight calls are tracked and superseded calls aborted)
/// - `debounce`: 300ms
/// - `timeout`: none
/// - `methods`: none (every method name is sent to the server)
///
/// # Example
///
/// ```rust
/// use tandem_client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::new("http://127.0.0.1:9000/api/rpc")
///     .with_debounce(Duration::from_millis(50))
///     .with_methods(["hello", "signin", "signout"]);
/// assert!(config.allows("hello"));
/// assert!(!config.allows("missing"));
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Full URL of the RPC endpoint
    pub url: String,
    /// Track in-flight calls so they can be aborted
    pub abortable: bool,
    /// Debounce window for `Resource::update_args`
    pub debounce: Duration,
    /// Per-call HTTP timeout
    pub timeout: Option<Duration>,
    /// Remote contract; unknown names fail before any network call
    pub methods: Option<HashSet<String>>,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_abortable(mut self, abortable: bool) -> Self {
        self.abortable = abortable;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods = Some(methods.into_iter().map(Into::into).collect());
        self
    }

    /// Whether `method` is part of the remote contract.
    pub fn allows(&self, method: &str) -> bool {
        self.methods
            .as_ref()
            .map_or(true, |methods| methods.contains(method))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            abortable: true,
            debounce: DEFAULT_DEBOUNCE,
            timeout: None,
            methods: None,
        }
    }
}
