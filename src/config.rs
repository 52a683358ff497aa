//! Configuration for the server and client binaries
//!
//! Configuration is read from the environment. Each binary uses its own
//! prefix, e.g. `CALC_RPC_PORT` for the calculator and `GREET_RPC_PORT` for
//! the greeter.
use std::{env, path::PathBuf};

use anyhow::Context;

/// Default port the servers listen on.
pub const DEFAULT_PORT: u16 = 50051;

/// Configuration for a server or client binary.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port to listen on or connect to.
    pub port: u16,
    /// Whether the client verifies the server certificate.
    ///
    /// When false, the client will accept any certificate. Useful for local
    /// development, do not use in production.
    pub tls: bool,
    /// Path where the server writes its certificate, and where the client
    /// reads it from when `tls` is enabled.
    pub cert_path: PathBuf,
}

impl Config {
    /// Read the configuration from the environment.
    ///
    /// The variables read are `{prefix}_PORT`, `{prefix}_TLS` and
    /// `{prefix}_CERT`. All of them are optional.
    pub fn from_env(prefix: &str) -> anyhow::Result<Self> {
        let port = match env::var(format!("{prefix}_PORT")) {
            Ok(text) => text
                .parse()
                .with_context(|| format!("invalid {prefix}_PORT: {text}"))?,
            Err(_) => DEFAULT_PORT,
        };
        let tls = match env::var(format!("{prefix}_TLS")) {
            Ok(text) => matches!(text.as_str(), "1" | "true" | "yes"),
            Err(_) => false,
        };
        let cert_path = env::var(format!("{prefix}_CERT"))
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("cert.der"));
        Ok(Self {
            port,
            tls,
            cert_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::from_env("CONFIG_TEST_DEFAULTS").unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(!config.tls);
        assert_eq!(config.cert_path, PathBuf::from("cert.der"));
    }

    #[test]
    fn from_env() {
        env::set_var("CONFIG_TEST_FULL_PORT", "4711");
        env::set_var("CONFIG_TEST_FULL_TLS", "true");
        env::set_var("CONFIG_TEST_FULL_CERT", "/tmp/test-cert.der");
        let config = Config::from_env("CONFIG_TEST_FULL").unwrap();
        assert_eq!(config.port, 4711);
        assert!(config.tls);
        assert_eq!(config.cert_path, PathBuf::from("/tmp/test-cert.der"));
    }

    #[test]
    fn invalid_port() {
        env::set_var("CONFIG_TEST_BAD_PORT", "not-a-port");
        assert!(Config::from_env("CONFIG_TEST_BAD").is_err());
    }
}
