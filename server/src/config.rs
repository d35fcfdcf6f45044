//! Server configuration.

use shared::DEFAULT_PORT;
use std::time::Duration;

/// Runtime settings for a [`crate::network::Server`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the listener binds to.
    pub bind_addr: String,
    /// Sessions held at once; further connections are closed on accept.
    pub max_clients: usize,
    /// Upper bound on writing one snapshot to a client.
    pub send_timeout: Duration,
    /// Seeds every session's random source when set.
    pub rng_seed: Option<u64>,
}

impl ServerConfig {
    pub fn new(bind_addr: impl Into<String>) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            ..Self::default()
        }
    }

    pub fn with_max_clients(mut self, max_clients: usize) -> Self {
        self.max_clients = max_clients;
        self
    }

    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    pub fn with_rng_seed(mut self, seed: Option<u64>) -> Self {
        self.rng_seed = seed;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{}", DEFAULT_PORT),
            max_clients: 2,
            send_timeout: Duration::from_secs(2),
            rng_seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:8888");
        assert_eq!(config.max_clients, 2);
        assert_eq!(config.send_timeout, Duration::from_secs(2));
        assert_eq!(config.rng_seed, None);
    }

    #[test]
    fn test_builder() {
        let config = ServerConfig::new("127.0.0.1:0")
            .with_max_clients(5)
            .with_send_timeout(Duration::from_millis(250))
            .with_rng_seed(Some(42));

        assert_eq!(config.bind_addr, "127.0.0.1:0");
        assert_eq!(config.max_clients, 5);
        assert_eq!(config.send_timeout, Duration::from_millis(250));
        assert_eq!(config.rng_seed, Some(42));
    }
}
