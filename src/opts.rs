//! Connection options.

use std::sync::Arc;

use no_panic::no_panic;
use url::Url;

use crate::buffer_pool::{BufferPool, GLOBAL_BUFFER_POOL};
use crate::error::Error;

/// SSL connection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SslMode {
    /// Don't use SSL
    Disable,
    /// Try SSL, fall back to unencrypted if not supported
    #[default]
    Prefer,
    /// Require SSL connection
    Require,
}

/// Connection options for PostgreSQL.
#[derive(Debug, Clone)]
pub struct Opts {
    /// Hostname or IP address.
    ///
    /// Default: `""`
    pub host: String,

    /// Port number for the PostgreSQL server.
    ///
    /// Default: `5432`
    pub port: u16,

    /// Unix socket path.
    ///
    /// Default: `None`
    pub socket: Option<String>,

    /// Username for authentication.
    ///
    /// Default: `""`
    pub user: String,

    /// Database name to use.
    ///
    /// Default: `None`
    pub database: Option<String>,

    /// Password for authentication.
    ///
    /// Default: `None`
    pub password: Option<String>,

    /// Application name to report to the server.
    ///
    /// Default: `None`
    pub application_name: Option<String>,

    /// SSL connection mode.
    ///
    /// Default: `SslMode::Prefer`
    pub ssl_mode: SslMode,

    /// Additional connection parameters.
    ///
    /// Default: `[]`
    pub params: Vec<(String, String)>,

    /// When connected via TCP to loopback, upgrade to Unix socket for better performance.
    ///
    /// Default: `true`
    pub prefer_unix_socket: bool,

    /// Maximum number of idle connections in the pool.
    ///
    /// Default: `100`
    pub pool_max_idle_conn: usize,

    /// Maximum number of concurrent connections (None = unlimited).
    ///
    /// Default: `None`
    pub pool_max_concurrency: Option<usize>,

    /// Literal IP address to connect to, bypassing DNS resolution of `host`.
    ///
    /// Default: `None`
    pub hostaddr: Option<std::net::IpAddr>,

    /// Timeout applied to the TCP/TLS handshake.
    ///
    /// Default: `None` (no timeout)
    pub connect_timeout: Option<std::time::Duration>,

    /// Client-side text encoding. Only `"UTF8"` is accepted; present so
    /// connection strings can state it explicitly.
    ///
    /// Default: `"UTF8"`
    pub client_encoding: String,

    /// Extra `options` startup parameter, forwarded verbatim to the server.
    ///
    /// Default: `None`
    pub options: Option<String>,

    /// Path to a CA bundle used to validate the server certificate.
    ///
    /// Default: `None`
    pub sslrootcert: Option<String>,

    /// Default fractional-digit count used when decoding `money` without a
    /// more specific hint.
    ///
    /// Default: `2`
    pub money_frac_digits: u8,

    /// Buffer pool used to obtain the connection's [`crate::BufferSet`].
    ///
    /// Default: the process-wide [`GLOBAL_BUFFER_POOL`]
    pub buffer_pool: Arc<BufferPool>,
}

impl Default for Opts {
    #[no_panic]
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 5432,
            socket: None,
            user: String::new(),
            database: None,
            password: None,
            application_name: None,
            ssl_mode: SslMode::Prefer,
            params: Vec::new(),
            prefer_unix_socket: true,
            pool_max_idle_conn: 100,
            pool_max_concurrency: None,
            hostaddr: None,
            connect_timeout: None,
            client_encoding: String::from("UTF8"),
            options: None,
            sslrootcert: None,
            money_frac_digits: 2,
            buffer_pool: Arc::clone(&GLOBAL_BUFFER_POOL),
        }
    }
}

impl TryFrom<&Url> for Opts {
    type Error = Error;

    /// Parse a PostgreSQL connection URL.
    ///
    /// Format: `postgres://[user[:password]@]host[:port][/database][?param1=value1&param2=value2&..]`
    ///
    /// Supported query parameters:
    /// - `sslmode`: disable, prefer, require
    /// - `application_name`: application name
    /// - `prefer_unix_socket`: true/True/1/yes/on or false/False/0/no/off
    /// - `pool_max_idle_conn`: maximum idle connections (positive integer)
    /// - `pool_max_concurrency` (alias `capacity`): maximum concurrent connections (positive integer)
    /// - `hostaddr`: literal IP address
    /// - `connect_timeout`: seconds
    /// - `client_encoding`: must be `UTF8`
    /// - `options`: forwarded verbatim as a startup parameter
    /// - `sslrootcert`: path to a CA bundle
    /// - `money_frac_digits`: default fractional digits for `money` decoding
    ///
    /// Unrecognized keys are rejected rather than silently accepted.
    #[no_panic]
    fn try_from(url: &Url) -> Result<Self, Self::Error> {
        if !["postgres", "pg"].contains(&url.scheme()) {
            return Err(Error::InvalidUsage(format!(
                "Invalid scheme: expected 'postgres://' or 'pg://', got '{}://'",
                url.scheme()
            )));
        }

        let mut opts = Opts {
            host: url.host_str().unwrap_or("localhost").to_string(),
            port: url.port().unwrap_or(5432),
            user: url.username().to_string(),
            password: url.password().map(|s| s.to_string()),
            database: url.path().strip_prefix('/').and_then(|s| {
                if s.is_empty() {
                    None
                } else {
                    Some(s.to_string())
                }
            }),
            ..Opts::default()
        };

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "sslmode" => {
                    opts.ssl_mode = match value.as_ref() {
                        "disable" => SslMode::Disable,
                        "prefer" => SslMode::Prefer,
                        "require" => SslMode::Require,
                        _ => {
                            return Err(Error::InvalidUsage(format!(
                                "Invalid sslmode: expected one of ['disable', 'prefer', 'require'], got {}",
                                value
                            )));
                        }
                    };
                }
                "application_name" => {
                    opts.application_name = Some(value.to_string());
                }
                "prefer_unix_socket" => {
                    opts.prefer_unix_socket = match value.as_ref() {
                        "true" | "True" | "1" | "yes" | "on" => true,
                        "false" | "False" | "0" | "no" | "off" => false,
                        _ => {
                            return Err(Error::InvalidUsage(format!(
                                "Invalid prefer_unix_socket: {}",
                                value
                            )));
                        }
                    };
                }
                "pool_max_idle_conn" => {
                    opts.pool_max_idle_conn = value.parse().map_err(|_| {
                        Error::InvalidUsage(format!("Invalid pool_max_idle_conn: {}", value))
                    })?;
                }
                "pool_max_concurrency" | "capacity" => {
                    opts.pool_max_concurrency = Some(value.parse().map_err(|_| {
                        Error::InvalidUsage(format!("Invalid pool_max_concurrency: {}", value))
                    })?);
                }
                "hostaddr" => {
                    opts.hostaddr = Some(value.parse().map_err(|_| {
                        Error::InvalidUsage(format!("Invalid hostaddr: {}", value))
                    })?);
                }
                "connect_timeout" => {
                    let secs: u64 = value.parse().map_err(|_| {
                        Error::InvalidUsage(format!("Invalid connect_timeout: {}", value))
                    })?;
                    opts.connect_timeout = Some(std::time::Duration::from_secs(secs));
                }
                "client_encoding" => {
                    if !value.eq_ignore_ascii_case("UTF8") && !value.eq_ignore_ascii_case("UTF-8") {
                        return Err(Error::InvalidUsage(format!(
                            "Unsupported client_encoding: {} (only UTF8 is supported)",
                            value
                        )));
                    }
                    opts.client_encoding = "UTF8".to_string();
                }
                "options" => {
                    opts.options = Some(value.to_string());
                }
                "sslrootcert" => {
                    opts.sslrootcert = Some(value.to_string());
                }
                "money_frac_digits" => {
                    opts.money_frac_digits = value.parse().map_err(|_| {
                        Error::InvalidUsage(format!("Invalid money_frac_digits: {}", value))
                    })?;
                }
                other => {
                    return Err(Error::InvalidUsage(format!(
                        "Unrecognized connection parameter: {}",
                        other
                    )));
                }
            }
        }

        Ok(opts)
    }
}

impl TryFrom<&str> for Opts {
    type Error = Error;

    #[no_panic]
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let url = Url::parse(s).map_err(|e| Error::InvalidUsage(format!("Invalid URL: {}", e)))?;
        Self::try_from(&url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_keyword() {
        let err = Opts::try_from("postgres://user@host/db?bogus=1").unwrap_err();
        assert!(matches!(err, Error::InvalidUsage(_)));
    }

    #[test]
    fn accepts_known_keywords() {
        let opts = Opts::try_from(
            "postgres://user@host/db?hostaddr=127.0.0.1&connect_timeout=5&client_encoding=UTF8&sslrootcert=/tmp/ca.pem&money_frac_digits=4",
        )
        .unwrap();
        assert_eq!(opts.hostaddr, Some("127.0.0.1".parse().unwrap()));
        assert_eq!(opts.connect_timeout, Some(std::time::Duration::from_secs(5)));
        assert_eq!(opts.client_encoding, "UTF8");
        assert_eq!(opts.sslrootcert.as_deref(), Some("/tmp/ca.pem"));
        assert_eq!(opts.money_frac_digits, 4);
    }

    #[test]
    fn rejects_bad_client_encoding() {
        let err = Opts::try_from("postgres://user@host/db?client_encoding=LATIN1").unwrap_err();
        assert!(matches!(err, Error::InvalidUsage(_)));
    }
}
