//! Link-layer bring-up.
//!
//! The servers only start once the board has an address. On hardware a
//! [`Link`] reports the wireless station state and [`StationConnector`]
//! polls it until an address is assigned or the link gives up. On a host
//! the link is already up and [`HostNetwork`] just checks that the bind
//! address belongs to this machine.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::time::sleep;
use tracing::{debug, info};

use webradio_core::{Error, Result};

#[async_trait]
pub trait NetworkConnector: Send {
    /// Return once the link is up with an assigned address.
    async fn connect(&mut self) -> Result<IpAddr>;
}

// ---------------------------------------------------------------------------
// Wireless station
// ---------------------------------------------------------------------------

/// Station state as reported by the wireless chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Connecting,
    GotIp(IpAddr),
    WrongPassword,
    NoApFound,
    ConnectFailed,
}

/// A wireless station interface.
pub trait Link: Send {
    /// Start joining `ssid`.
    fn join(&mut self, ssid: &str, password: &str) -> Result<()>;
    fn status(&mut self) -> LinkStatus;
}

/// Joins an access point and waits for an address.
pub struct StationConnector<L> {
    link: L,
    ssid: String,
    password: String,
    poll_interval: Duration,
}

impl<L: Link> StationConnector<L> {
    pub fn new(link: L, ssid: impl Into<String>, password: impl Into<String>) -> Self {
        StationConnector {
            link,
            ssid: ssid.into(),
            password: password.into(),
            poll_interval: Duration::from_secs(1),
        }
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn into_link(self) -> L {
        self.link
    }
}

#[async_trait]
impl<L: Link> NetworkConnector for StationConnector<L> {
    async fn connect(&mut self) -> Result<IpAddr> {
        info!(ssid = %self.ssid, "joining network");
        self.link.join(&self.ssid, &self.password)?;
        loop {
            match self.link.status() {
                LinkStatus::GotIp(addr) => {
                    info!(%addr, "network up");
                    return Ok(addr);
                }
                LinkStatus::Connecting => debug!("still connecting"),
                LinkStatus::WrongPassword => return Err(Error::WrongCredential),
                LinkStatus::NoApFound => return Err(Error::NoAccessPoint(self.ssid.clone())),
                LinkStatus::ConnectFailed => {
                    return Err(Error::ConnectFailed(format!("joining {}", self.ssid)));
                }
            }
            sleep(self.poll_interval).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

/// Network that is already configured by the operating system.
#[derive(Debug, Clone)]
pub struct HostNetwork {
    bind: IpAddr,
}

impl HostNetwork {
    pub fn new(bind: IpAddr) -> Self {
        HostNetwork { bind }
    }
}

#[async_trait]
impl NetworkConnector for HostNetwork {
    async fn connect(&mut self) -> Result<IpAddr> {
        let socket = UdpSocket::bind(SocketAddr::new(self.bind, 0))
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AddrNotAvailable => {
                    Error::NoAccessPoint(format!("no interface has address {}", self.bind))
                }
                _ => Error::ConnectFailed(e.to_string()),
            })?;
        let addr = socket.local_addr()?.ip();
        info!(%addr, "using host network");
        Ok(addr)
    }
}
