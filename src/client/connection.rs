// Client connection setup

use std::io::Write;
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use log::debug;
use crate::common::config::ClientConfig;
use crate::common::error::{Error, Result};
use crate::protocol::messages::Request;

/// Open a fresh connection to the configured server with receive and send
/// timeouts applied. The address is resolved on every call so a reconnect
/// picks up DNS changes.
pub fn connect(config: &ClientConfig) -> Result<TcpStream> {
    let addrs = config
        .server_addr
        .to_socket_addrs()
        .map_err(|e| Error::ConfigError(format!("Cannot resolve {}: {}", config.server_addr, e)))?;

    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, config.connect_timeout) {
            Ok(stream) => {
                stream.set_read_timeout(Some(config.timeout))?;
                stream.set_write_timeout(Some(config.timeout))?;
                stream.set_nodelay(true)?;
                debug!("Client: connected to {}", addr);
                return Ok(stream);
            }
            Err(e) => {
                debug!("Client: connect to {} failed: {}", addr, e);
                last_err = Some(e);
            }
        }
    }

    Err(match last_err {
        Some(e) => Error::from_read(e),
        None => Error::ConfigError(format!("{} resolved to no addresses", config.server_addr)),
    })
}

/// Check that the server accepts connections by sending a `ping` request.
pub fn ping(config: &ClientConfig) -> Result<()> {
    let mut stream = connect(config)?;
    Request::Ping.write_to(&mut stream)?;
    stream.flush()?;
    let _ = stream.shutdown(Shutdown::Both);
    Ok(())
}
