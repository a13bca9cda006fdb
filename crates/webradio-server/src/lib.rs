//! webradio-server: the appliance's network side.
//!
//! Two listeners share one cooperative runtime with the radio worker and
//! the heartbeat:
//!
//! - [`AudioServer`] streams `GET /audio.wav` to up to one listener per
//!   audio slot.
//! - [`ControlServer`] serves the web app, regenerates the station list on
//!   `GET /scan.xml`, and tunes on `PATCH /tune/{am,fm}/<freq>`.
//!
//! [`Supervisor`] brings both up after the network and tears them down
//! again in order.

pub mod audio_server;
pub mod config;
pub mod control_server;
pub mod files;
pub mod heartbeat;
pub mod http;
pub mod network;
pub mod stations;
pub mod supervisor;

pub use audio_server::{AudioServer, STREAM_PATH};
pub use config::{AudioServerConfig, ControlServerConfig, ServerConfig, bind_listener};
pub use control_server::{ControlContext, ControlServer};
pub use files::WebRoot;
pub use heartbeat::{StatusLed, TracingLed, run_heartbeat};
pub use network::{HostNetwork, Link, LinkStatus, NetworkConnector, StationConnector};
pub use stations::{STATIONS_FILE, StationList};
pub use supervisor::{Running, Supervisor};
