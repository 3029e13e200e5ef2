use std::net::ToSocketAddrs;

use tiberius::{Client, SqlBrowser};
use tokio::net::TcpStream;
use tokio_util::compat::TokioAsyncWriteCompatExt;

use super::config::{MssqlClient, MssqlOptions};
use crate::error::DriverError;

/// Open one SQL Server session.
///
/// Named instances are located through the SQL Browser service; otherwise the configured port
/// (default 1433) is dialed directly.
///
/// # Errors
///
/// Returns `DriverError::Io` if the server address cannot be resolved or reached, and
/// `DriverError::Mssql` if the TDS handshake or login fails.
pub async fn create_mssql_client(options: &MssqlOptions) -> Result<MssqlClient, DriverError> {
    let config = options.tiberius_config();

    let tcp = if options.instance_name.is_some() {
        TcpStream::connect_named(&config).await?
    } else {
        let port = options.port.unwrap_or(1433);
        let server_addr = (options.server.as_str(), port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no address found for {}", options.server),
                )
            })?;
        TcpStream::connect(server_addr).await?
    };
    tcp.set_nodelay(true)?;

    // Make compatible with Tiberius
    Ok(Client::connect(config, tcp.compat_write()).await?)
}
