// Configuration types and parsing

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::Deserialize;
use crate::common::error::{Error, Result};
use super::types::{
    DEFAULT_CHUNK_SIZE, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_CONNECTIONS, DEFAULT_PORT,
    DEFAULT_TIMEOUT, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE,
};

fn check_chunk_size(size: usize) -> Result<usize> {
    if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&size) {
        return Err(Error::ConfigError(format!(
            "Chunk size must be between {} and {}",
            MIN_CHUNK_SIZE, MAX_CHUNK_SIZE
        )));
    }
    Ok(size)
}

fn check_timeout(timeout: Duration) -> Result<Duration> {
    // A zero read timeout is rejected by the socket layer
    if timeout.is_zero() {
        return Err(Error::ConfigError("Timeout must be non-zero".to_string()));
    }
    Ok(timeout)
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `host:port`, resolved again on every connection attempt.
    pub server_addr: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub chunk_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: format!("127.0.0.1:{}", DEFAULT_PORT),
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ClientConfig {
    pub fn new(server_addr: impl Into<String>) -> Self {
        Self {
            server_addr: server_addr.into(),
            ..Default::default()
        }
    }

    pub fn with_chunk_size(mut self, size: usize) -> Result<Self> {
        self.chunk_size = check_chunk_size(size)?;
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.timeout = check_timeout(timeout)?;
        Ok(self)
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.connect_timeout = check_timeout(timeout)?;
        Ok(self)
    }

    /// Load a client config from a JSON file. Missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let file: ClientConfigFile = serde_json::from_str(&json)?;
        file.apply(Self::default())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ClientConfigFile {
    server_addr: Option<String>,
    timeout_secs: Option<u64>,
    connect_timeout_secs: Option<u64>,
    chunk_size: Option<usize>,
}

impl ClientConfigFile {
    fn apply(self, mut config: ClientConfig) -> Result<ClientConfig> {
        if let Some(addr) = self.server_addr {
            config.server_addr = addr;
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs))?;
        }
        if let Some(secs) = self.connect_timeout_secs {
            config = config.with_connect_timeout(Duration::from_secs(secs))?;
        }
        if let Some(size) = self.chunk_size {
            config = config.with_chunk_size(size)?;
        }
        Ok(config)
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Directory that request filenames are resolved against.
    pub root_dir: PathBuf,
    pub timeout: Duration,
    pub chunk_size: usize,
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            root_dir: PathBuf::from("."),
            timeout: DEFAULT_TIMEOUT,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl ServerConfig {
    pub fn new(listen_addr: SocketAddr, root_dir: PathBuf) -> Self {
        Self {
            listen_addr,
            root_dir,
            ..Default::default()
        }
    }

    pub fn with_chunk_size(mut self, size: usize) -> Result<Self> {
        self.chunk_size = check_chunk_size(size)?;
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.timeout = check_timeout(timeout)?;
        Ok(self)
    }

    pub fn with_max_connections(mut self, max: usize) -> Result<Self> {
        if max == 0 {
            return Err(Error::ConfigError(
                "max_connections must be at least 1".to_string(),
            ));
        }
        self.max_connections = max;
        Ok(self)
    }

    /// Load a server config from a JSON file. Missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let file: ServerConfigFile = serde_json::from_str(&json)?;
        file.apply(Self::default())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ServerConfigFile {
    listen_addr: Option<String>,
    root_dir: Option<PathBuf>,
    timeout_secs: Option<u64>,
    chunk_size: Option<usize>,
    max_connections: Option<usize>,
}

impl ServerConfigFile {
    fn apply(self, mut config: ServerConfig) -> Result<ServerConfig> {
        if let Some(addr) = self.listen_addr {
            config.listen_addr = addr
                .parse()
                .map_err(|e| Error::ConfigError(format!("Invalid listen_addr {:?}: {}", addr, e)))?;
        }
        if let Some(dir) = self.root_dir {
            config.root_dir = dir;
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs))?;
        }
        if let Some(size) = self.chunk_size {
            config = config.with_chunk_size(size)?;
        }
        if let Some(max) = self.max_connections {
            config = config.with_max_connections(max)?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let client = ClientConfig::default();
        assert_eq!(client.server_addr, "127.0.0.1:8000");
        assert_eq!(client.chunk_size, 8192);
        assert_eq!(client.timeout, Duration::from_secs(30));

        let server = ServerConfig::default();
        assert_eq!(server.listen_addr.port(), 8000);
        assert_eq!(server.root_dir, PathBuf::from("."));
        assert_eq!(server.chunk_size, 8192);
    }

    #[test]
    fn test_chunk_size_bounds() {
        assert!(ClientConfig::default().with_chunk_size(16).is_err());
        assert!(ClientConfig::default().with_chunk_size(MAX_CHUNK_SIZE + 1).is_err());
        let config = ServerConfig::default().with_chunk_size(4096).unwrap();
        assert_eq!(config.chunk_size, 4096);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(ClientConfig::default().with_timeout(Duration::ZERO).is_err());
        assert!(ServerConfig::default().with_timeout(Duration::ZERO).is_err());
    }

    #[test]
    fn test_server_config_from_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "listen_addr": "127.0.0.1:9100", "timeout_secs": 5, "max_connections": 2 }}"#
        )
        .unwrap();

        let config = ServerConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:9100".parse().unwrap());
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.max_connections, 2);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_client_config_rejects_unknown_field() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "server": "10.0.0.1:8000" }}"#).unwrap();

        let err = ClientConfig::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::DeserializationError(_)));
    }
}
