//! Channel configuration

use std::time::Duration;

/// Options for acquiring a shared channel
#[derive(Debug, Clone)]
pub struct ChannelOptions {
    /// Explicit scheme preference: `Some(true)` forces `wss`, `Some(false)`
    /// forces `ws`, `None` infers from the base (secure when in doubt)
    pub secure: Option<bool>,

    /// Base URL that relative endpoints resolve against
    /// (e.g. `"https://api.example.com"`)
    pub base: Option<String>,

    /// Reconnect automatically after a connection loss
    pub reconnect: bool,

    /// Initial delay between reconnect attempts
    pub reconnect_delay: Duration,

    /// Upper bound for the reconnect backoff
    pub max_reconnect_delay: Duration,

    /// Connection attempt timeout
    pub connect_timeout: Duration,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            secure: None,
            base: None,
            reconnect: true,
            reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ChannelOptions {
    /// Create options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Force secure (`wss`) or insecure (`ws`) scheme resolution
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = Some(secure);
        self
    }

    /// Set the base URL for relative endpoints
    pub fn base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Enable or disable auto-reconnect
    pub fn reconnect(mut self, reconnect: bool) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Set the initial reconnect delay
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set the reconnect backoff cap
    pub fn max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.max_reconnect_delay = delay;
        self
    }

    /// Set the connection attempt timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}
