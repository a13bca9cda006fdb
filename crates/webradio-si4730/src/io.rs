//! Radio worker task.
//!
//! The driver is moved into a single task that owns it exclusively. Servers
//! talk to the task through a cloneable [`RadioHandle`]: each call is a
//! [`Request`] on an mpsc queue carrying a oneshot reply. Requests are
//! served strictly one at a time, so bus transactions never overlap, and a
//! long scan only occupies the worker, not the tasks serving audio.
//!
//! Once a request is picked up it runs to completion or to its own bus
//! timeout. A caller that gives up (client disconnect, dropped future) only
//! loses the reply.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use webradio_core::{Band, Error, RadioStatus, Result, TuneStatus};

use crate::driver::Si4730;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A request from a [`RadioHandle`] to the worker.
pub(crate) enum Request {
    Reset {
        reply: oneshot::Sender<Result<()>>,
    },
    SetBand {
        band: Band,
        reply: oneshot::Sender<Result<()>>,
    },
    Tune {
        band: Band,
        freq: u32,
        reply: oneshot::Sender<Result<TuneStatus>>,
    },
    Scan {
        band: Band,
        reply: oneshot::Sender<Result<Vec<u16>>>,
    },
    GetProperty {
        id: u16,
        reply: oneshot::Sender<Result<u16>>,
    },
    SetProperty {
        id: u16,
        value: u16,
        reply: oneshot::Sender<Result<()>>,
    },
    Status {
        reply: oneshot::Sender<RadioStatus>,
    },
    /// Stop serving and hand the driver back.
    Shutdown {
        reply: oneshot::Sender<Si4730>,
    },
}

/// Cloneable handle for issuing radio operations.
#[derive(Clone)]
pub struct RadioHandle {
    tx: mpsc::Sender<Request>,
}

/// The running worker. Dropping it leaves the task running until every
/// handle is gone.
pub struct RadioTask {
    handle: RadioHandle,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RadioHandle {
    async fn call<T>(&self, make: impl FnOnce(oneshot::Sender<Result<T>>) -> Request) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| Error::NotConnected)?;
        reply_rx.await.map_err(|_| Error::NotConnected)?
    }

    pub async fn reset(&self) -> Result<()> {
        self.call(|reply| Request::Reset { reply }).await
    }

    pub async fn set_band(&self, band: Band) -> Result<()> {
        self.call(|reply| Request::SetBand { band, reply }).await
    }

    pub async fn tune(&self, band: Band, freq: u32) -> Result<TuneStatus> {
        self.call(|reply| Request::Tune { band, freq, reply }).await
    }

    pub async fn scan(&self, band: Band) -> Result<Vec<u16>> {
        self.call(|reply| Request::Scan { band, reply }).await
    }

    pub async fn get_property(&self, id: u16) -> Result<u16> {
        self.call(|reply| Request::GetProperty { id, reply }).await
    }

    pub async fn set_property(&self, id: u16, value: u16) -> Result<()> {
        self.call(|reply| Request::SetProperty { id, value, reply })
            .await
    }

    /// Snapshot of the driver state. Queued behind any running operation.
    pub async fn status(&self) -> Result<RadioStatus> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Request::Status { reply: reply_tx })
            .await
            .map_err(|_| Error::NotConnected)?;
        reply_rx.await.map_err(|_| Error::NotConnected)
    }

    pub async fn channels(&self, band: Band) -> Result<Vec<u16>> {
        Ok(self.status().await?.channels(band).to_vec())
    }
}

impl RadioTask {
    pub fn handle(&self) -> RadioHandle {
        self.handle.clone()
    }

    /// Stop the worker without recovering the driver.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Stop the worker after the queue ahead of it drains and recover the
    /// driver.
    pub async fn shutdown(self) -> Result<Si4730> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let _ = self
            .handle
            .tx
            .send(Request::Shutdown { reply: reply_tx })
            .await;
        let driver = reply_rx.await.map_err(|_| Error::NotConnected)?;
        let _ = self.task.await;
        Ok(driver)
    }

    /// Wait for a cancelled worker to exit.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

// ---------------------------------------------------------------------------
// Spawn
// ---------------------------------------------------------------------------

/// Move `driver` into a new worker task.
pub fn spawn_radio_task(driver: Si4730) -> RadioTask {
    let (tx, rx) = mpsc::channel::<Request>(16);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(radio_loop(driver, rx, cancel.clone()));
    RadioTask {
        handle: RadioHandle { tx },
        cancel,
        task,
    }
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

async fn radio_loop(
    mut driver: Si4730,
    mut rx: mpsc::Receiver<Request>,
    cancel: CancellationToken,
) {
    info!("radio worker started");
    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("radio worker cancelled");
                break;
            }

            req = rx.recv() => match req {
                Some(Request::Shutdown { reply }) => {
                    info!("radio worker shutting down");
                    let _ = reply.send(driver);
                    return;
                }
                Some(req) => dispatch(&mut driver, req).await,
                None => {
                    debug!("all radio handles dropped");
                    break;
                }
            },
        }
    }
    info!("radio worker stopped");
}

async fn dispatch(driver: &mut Si4730, req: Request) {
    let delivered = match req {
        Request::Reset { reply } => reply.send(driver.reset().await).is_ok(),
        Request::SetBand { band, reply } => reply.send(driver.set_band(band).await).is_ok(),
        Request::Tune { band, freq, reply } => reply.send(driver.tune(band, freq).await).is_ok(),
        Request::Scan { band, reply } => reply.send(driver.scan(band).await).is_ok(),
        Request::GetProperty { id, reply } => reply.send(driver.get_property(id).await).is_ok(),
        Request::SetProperty { id, value, reply } => {
            reply.send(driver.set_property(id, value).await).is_ok()
        }
        Request::Status { reply } => reply.send(driver.status()).is_ok(),
        Request::Shutdown { .. } => true,
    };
    if !delivered {
        debug!("radio caller went away before the reply");
    }
}
