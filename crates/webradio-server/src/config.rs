//! Server configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use tokio::net::{TcpListener, TcpSocket};

use webradio_audio::PoolConfig;
use webradio_core::Result;

/// Port the audio stream is served on.
pub const DEFAULT_AUDIO_PORT: u16 = 1234;
/// Port the control server is served on.
pub const DEFAULT_CONTROL_PORT: u16 = 80;
/// Pending-connection backlog for both listeners.
pub const DEFAULT_BACKLOG: u32 = 5;
/// How long a client may take to send its request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone)]
pub struct AudioServerConfig {
    pub request_timeout: Duration,
    /// Pause between FIFO polls when a listener's queue is empty.
    pub poll_interval: Duration,
}

impl Default for AudioServerConfig {
    fn default() -> Self {
        AudioServerConfig {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            poll_interval: Duration::from_millis(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ControlServerConfig {
    pub request_timeout: Duration,
}

impl Default for ControlServerConfig {
    fn default() -> Self {
        ControlServerConfig {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Everything the supervisor needs to bring the servers up.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub audio_port: u16,
    pub control_port: u16,
    pub backlog: u32,
    pub web_root: PathBuf,
    pub pool: PoolConfig,
    pub audio: AudioServerConfig,
    pub control: ControlServerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            audio_port: DEFAULT_AUDIO_PORT,
            control_port: DEFAULT_CONTROL_PORT,
            backlog: DEFAULT_BACKLOG,
            web_root: PathBuf::from("www"),
            pool: PoolConfig::default(),
            audio: AudioServerConfig::default(),
            control: ControlServerConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn audio_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.audio_port)
    }

    pub fn control_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.control_port)
    }
}

/// Bind a listener with address reuse and the given backlog.
pub fn bind_listener(addr: SocketAddr, backlog: u32) -> Result<TcpListener> {
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4()?,
        SocketAddr::V6(_) => TcpSocket::new_v6()?,
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    Ok(socket.listen(backlog)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.audio_addr().port(), 1234);
        assert_eq!(config.control_addr().port(), 80);
        assert_eq!(config.backlog, 5);
        assert_eq!(config.pool.slots, 1);
        assert_eq!(config.audio.request_timeout, Duration::from_secs(20));
    }

    #[tokio::test]
    async fn bind_ephemeral() {
        let listener = bind_listener("127.0.0.1:0".parse().unwrap(), DEFAULT_BACKLOG).unwrap();
        let addr = listener.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        let _client = tokio::net::TcpStream::connect(addr).await.unwrap();
        let (_server, _) = listener.accept().await.unwrap();
    }
}
