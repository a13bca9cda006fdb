//! Persisted station list.
//!
//! The web app builds its preset buttons from `stations.xml` in the web
//! root. Each entry names a station and carries the relative URL the app
//! PATCHes to tune it:
//!
//! ```text
//! <station-list>
//! <station>
//! <name>99.9 FM</name>
//! <url>tune/fm/9990</url>
//! </station>
//! </station-list>
//! ```
//!
//! FM stations come first, then AM, each in scan order. Lines end in CRLF.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use webradio_core::{Band, Result, Station, station_name};
use webradio_si4730::RadioHandle;

use crate::files::WebRoot;

pub const STATIONS_FILE: &str = "stations.xml";

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\r\n";

/// Render the station list document.
pub fn render_station_list(stations: &[Station]) -> String {
    let mut xml = String::from(XML_DECLARATION);
    xml.push_str("<station-list>\r\n");
    for station in stations {
        xml.push_str("<station>\r\n");
        xml.push_str(&format!(
            "<name>{}</name>\r\n",
            station_name(station.band, station.freq)
        ));
        xml.push_str(&format!(
            "<url>tune/{}/{}</url>\r\n",
            station.band.path_segment(),
            station.freq
        ));
        xml.push_str("</station>\r\n");
    }
    xml.push_str("</station-list>\r\n");
    xml
}

/// `stations.xml` inside a web root.
///
/// Clones share one lock, so scans and writes through any clone run one
/// at a time.
#[derive(Debug, Clone)]
pub struct StationList {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl StationList {
    pub fn in_root(root: &WebRoot) -> Self {
        StationList {
            path: root.path().join(STATIONS_FILE),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> Result<bool> {
        Ok(tokio::fs::try_exists(&self.path).await?)
    }

    /// Scan both bands, AM first, persist what was found and return the
    /// document that was written.
    pub async fn refresh(&self, radio: &RadioHandle) -> Result<String> {
        let _held = self.lock.lock().await;
        self.scan_and_persist(radio).await
    }

    /// Refresh only if the file does not exist yet.
    pub async fn ensure(&self, radio: &RadioHandle) -> Result<()> {
        let _held = self.lock.lock().await;
        if !self.exists().await? {
            self.scan_and_persist(radio).await?;
        }
        Ok(())
    }

    // Written to a sibling file first and renamed into place, so readers
    // never see a partial document. Caller holds `lock`.
    async fn persist(&self, xml: &str) -> Result<()> {
        let tmp = self.path.with_extension("xml.tmp");
        tokio::fs::write(&tmp, xml).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    // Caller holds `lock`.
    async fn scan_and_persist(&self, radio: &RadioHandle) -> Result<String> {
        info!("scanning for stations");
        radio.scan(Band::Am).await?;
        radio.scan(Band::Fm).await?;
        let stations = radio.status().await?.stations();
        let xml = render_station_list(&stations);
        self.persist(&xml).await?;
        info!(count = stations.len(), path = %self.path.display(), "station list written");
        Ok(xml)
    }
}
