//! Startup and shutdown ordering.
//!
//! Startup: network, audio capture, radio worker, listeners, then the
//! audio server, control server and heartbeat tasks. Shutdown runs the
//! other way: cancel every task, wait for them, then recover the driver
//! from the radio worker and switch the LED off.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use webradio_audio::{AudioBuffers, Capture};
use webradio_core::{AudioBufferSource, Result};
use webradio_si4730::{RadioHandle, RadioTask, Si4730, spawn_radio_task};

use crate::audio_server::AudioServer;
use crate::config::{ServerConfig, bind_listener};
use crate::control_server::{ControlContext, ControlServer};
use crate::files::WebRoot;
use crate::heartbeat::{StatusLed, run_heartbeat};
use crate::network::NetworkConnector;

pub struct Supervisor<N, L> {
    config: ServerConfig,
    network: N,
    led: L,
}

impl<N, L> Supervisor<N, L>
where
    N: NetworkConnector,
    L: StatusLed + 'static,
{
    pub fn new(config: ServerConfig, network: N, led: L) -> Self {
        Supervisor {
            config,
            network,
            led,
        }
    }

    /// Bring everything up and return once every task is running.
    pub async fn start<C>(mut self, driver: Si4730, capture: C, cancel: CancellationToken) -> Result<Running<L>>
    where
        C: Capture + 'static,
    {
        let cancel = cancel.child_token();
        // Stops whatever was already started if startup fails part way.
        let guard = cancel.clone().drop_guard();
        let addr = self.network.connect().await?;
        info!(%addr, "network connected");

        let buffers = Arc::new(AudioBuffers::new(capture.format(), self.config.pool));
        let capture = buffers.start(capture, cancel.clone())?;

        let radio = spawn_radio_task(driver);

        let audio_listener = bind_listener(self.config.audio_addr(), self.config.backlog)?;
        let control_listener = bind_listener(self.config.control_addr(), self.config.backlog)?;

        let source: Arc<dyn AudioBufferSource> = buffers;
        let audio = AudioServer::new(audio_listener, source, self.config.audio.clone());
        let ctx = ControlContext::new(
            radio.handle(),
            WebRoot::new(&self.config.web_root),
            self.config.control.clone(),
        );
        let control = ControlServer::new(control_listener, ctx).await?;
        let audio_addr = audio.local_addr()?;
        let control_addr = control.local_addr()?;

        let audio = tokio::spawn(audio.run(cancel.clone()));
        let control = tokio::spawn(control.run(cancel.clone()));
        let heartbeat = tokio::spawn(run_heartbeat(self.led, cancel.clone()));
        info!(%audio_addr, %control_addr, "web radio running");
        guard.disarm();

        Ok(Running {
            audio_addr,
            control_addr,
            cancel,
            radio,
            capture,
            audio,
            control,
            heartbeat,
        })
    }

    /// Run until ctrl-c or `cancel`, then shut down in order.
    pub async fn run<C>(self, driver: Si4730, capture: C, cancel: CancellationToken) -> Result<(Si4730, L)>
    where
        C: Capture + 'static,
    {
        let running = self.start(driver, capture, cancel.clone()).await?;
        tokio::select! {
            _ = cancel.cancelled() => {}
            signal = tokio::signal::ctrl_c() => match signal {
                Ok(()) => info!("interrupted"),
                Err(e) => {
                    warn!(error = %e, "cannot listen for ctrl-c");
                    cancel.cancelled().await;
                }
            },
        }
        running.shutdown().await
    }
}

/// Handles to a started appliance.
pub struct Running<L> {
    audio_addr: SocketAddr,
    control_addr: SocketAddr,
    cancel: CancellationToken,
    radio: RadioTask,
    capture: JoinHandle<()>,
    audio: JoinHandle<Result<()>>,
    control: JoinHandle<Result<()>>,
    heartbeat: JoinHandle<L>,
}

impl<L: StatusLed> Running<L> {
    pub fn audio_addr(&self) -> SocketAddr {
        self.audio_addr
    }

    pub fn control_addr(&self) -> SocketAddr {
        self.control_addr
    }

    pub fn radio(&self) -> RadioHandle {
        self.radio.handle()
    }

    /// Stop every task and recover the driver and the LED.
    pub async fn shutdown(self) -> Result<(Si4730, L)> {
        info!("shutting down");
        self.cancel.cancel();
        log_join("audio server", self.audio.await);
        log_join("control server", self.control.await);
        if let Err(e) = self.capture.await {
            error!(error = %e, "audio capture task failed");
        }
        let driver = self.radio.shutdown().await?;
        let mut led = match self.heartbeat.await {
            Ok(led) => led,
            Err(e) => {
                error!(error = %e, "heartbeat task failed");
                return Err(webradio_core::Error::HardwareFault("status LED lost".into()));
            }
        };
        led.set(false);
        info!("shutdown complete");
        Ok((driver, led))
    }
}

fn log_join(name: &str, joined: std::result::Result<Result<()>, JoinError>) {
    match joined {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(task = name, error = %e, "task failed"),
        Err(e) => error!(task = name, error = %e, "task panicked"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use webradio_audio::ToneCapture;
    use webradio_core::Band;
    use webradio_si4730::Si4730Builder;
    use webradio_test_harness::SimulatedTuner;

    use crate::heartbeat::TracingLed;
    use crate::network::HostNetwork;

    fn config(root: &std::path::Path) -> ServerConfig {
        ServerConfig {
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            audio_port: 0,
            control_port: 0,
            web_root: root.to_path_buf(),
            ..ServerConfig::default()
        }
    }

    async fn driver(sim: &SimulatedTuner) -> Si4730 {
        Si4730Builder::new()
            .stc_poll_interval(std::time::Duration::from_micros(100))
            .build(sim.clone())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn start_serves_and_shuts_down() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "hi").unwrap();
        let sim = SimulatedTuner::new().with_station(Band::Fm, 9990, 40, 20);
        let host = HostNetwork::new(IpAddr::V4(Ipv4Addr::LOCALHOST));
        let supervisor = Supervisor::new(config(dir.path()), host, TracingLed::default());

        let running = supervisor
            .start(driver(&sim).await, ToneCapture::default(), CancellationToken::new())
            .await
            .unwrap();
        // The station list was generated on startup.
        assert!(dir.path().join("stations.xml").exists());

        let mut client = TcpStream::connect(running.control_addr()).await.unwrap();
        client.write_all(b"PATCH /tune/fm/9990 HTTP/1.0\r\n\r\n").await.unwrap();
        let mut out = String::new();
        client.read_to_string(&mut out).await.unwrap();
        assert!(out.starts_with("HTTP/1.0 204 No Content\r\n"));

        let (driver, led) = running.shutdown().await.unwrap();
        assert_eq!(driver.frequency(), Some((Band::Fm, 9990)));
        assert!(!led.is_on());
    }

    #[tokio::test]
    async fn run_returns_when_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("stations.xml"), "<station-list/>").unwrap();
        let sim = SimulatedTuner::new();
        let host = HostNetwork::new(IpAddr::V4(Ipv4Addr::LOCALHOST));
        let supervisor = Supervisor::new(config(dir.path()), host, TracingLed::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (_driver, led) = supervisor
            .run(driver(&sim).await, ToneCapture::default(), cancel)
            .await
            .unwrap();
        assert!(!led.is_on());
    }

    #[tokio::test]
    async fn network_failure_stops_startup() {
        let dir = tempfile::tempdir().unwrap();
        let sim = SimulatedTuner::new();
        let host = HostNetwork::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)));
        let supervisor = Supervisor::new(config(dir.path()), host, TracingLed::default());
        let driver = driver(&sim).await;
        sim.clear_log();
        let result = supervisor
            .start(driver, ToneCapture::default(), CancellationToken::new())
            .await;
        assert!(result.is_err());
        assert_eq!(sim.power_ups(), 0);
    }
}
