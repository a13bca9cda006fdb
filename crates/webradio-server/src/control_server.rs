//! Control server: the web app, the station list, and tuning.
//!
//! | Request                     | Response                                   |
//! |-----------------------------|--------------------------------------------|
//! | `GET /`                     | `index.html`                               |
//! | `GET /<file>`               | the file, typed by extension, or `400`     |
//! | `GET /scan.xml`             | rescan both bands, then the station list   |
//! | `PATCH /tune/{am,fm}/<freq>`| tune; `204` with `Content-Location`        |
//! | anything else               | `400`                                      |
//!
//! Radio operations go through the [`RadioHandle`], so a scan occupies the
//! radio worker and this one connection, not the audio streams.

use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use webradio_core::{Band, Error, Result};
use webradio_si4730::RadioHandle;

use crate::config::ControlServerConfig;
use crate::files::WebRoot;
use crate::http::{self, Request, Response, Status};
use crate::stations::StationList;

/// Path that triggers a rescan.
pub const SCAN_PATH: &str = "scan.xml";

/// Everything a control connection needs.
#[derive(Clone)]
pub struct ControlContext {
    pub radio: RadioHandle,
    pub root: WebRoot,
    pub stations: StationList,
    pub config: ControlServerConfig,
}

impl ControlContext {
    pub fn new(radio: RadioHandle, root: WebRoot, config: ControlServerConfig) -> Self {
        let stations = StationList::in_root(&root);
        ControlContext {
            radio,
            root,
            stations,
            config,
        }
    }
}

/// Accepts control connections.
pub struct ControlServer {
    listener: TcpListener,
    ctx: ControlContext,
}

impl ControlServer {
    /// Create the server, generating the station list first if the web
    /// root has none.
    pub async fn new(listener: TcpListener, ctx: ControlContext) -> Result<Self> {
        ctx.stations.ensure(&ctx.radio).await?;
        Ok(ControlServer { listener, ctx })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        info!(addr = %self.local_addr()?, root = %self.ctx.root.path().display(), "control server listening");
        let mut conns = JoinSet::new();
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                Some(_) = conns.join_next(), if !conns.is_empty() => {}

                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!(error = %e, "control accept failed");
                            continue;
                        }
                    };
                    let ctx = self.ctx.clone();
                    conns.spawn(async move {
                        match serve_control(stream, &ctx).await {
                            Ok(()) => {}
                            Err(e) if e.is_disconnect() => debug!(%peer, "control client went away"),
                            Err(e) => warn!(%peer, error = %e, "control connection failed"),
                        }
                    });
                }
            }
        }
        conns.shutdown().await;
        info!("control server stopped");
        Ok(())
    }
}

/// Handle one control connection.
pub async fn serve_control<S>(mut stream: S, ctx: &ControlContext) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let response = match http::read_request(&mut stream, ctx.config.request_timeout).await {
        Ok(request) => route(&request, ctx).await,
        Err(e) if e.is_disconnect() => return Err(e),
        Err(e) => {
            debug!(error = %e, "rejecting control request");
            Response::bad_request()
        }
    };
    response.write_to(&mut stream).await
}

async fn route(request: &Request, ctx: &ControlContext) -> Response {
    match request.method.as_str() {
        "GET" => get(&request.path, ctx).await,
        "PATCH" => patch(&request.path, ctx).await,
        other => {
            debug!(method = other, "unsupported method");
            Response::bad_request()
        }
    }
}

async fn get(path: &str, ctx: &ControlContext) -> Response {
    if path == SCAN_PATH {
        return scan(ctx).await;
    }
    match ctx.root.read(path).await {
        Ok((body, content_type)) => Response::new(Status::Ok)
            .content_type(content_type)
            .body(body),
        Err(e) => {
            debug!(path, error = %e, "cannot serve file");
            Response::bad_request()
        }
    }
}

async fn scan(ctx: &ControlContext) -> Response {
    match ctx.stations.refresh(&ctx.radio).await {
        Ok(xml) => Response::new(Status::Ok)
            .allow_any_origin()
            .content_type("text/xml")
            .body(xml),
        Err(e) => {
            warn!(error = %e, "station scan failed");
            Response::bad_request()
        }
    }
}

/// Parse `tune/<band>/<freq>`.
pub fn parse_tune_path(path: &str) -> Result<(Band, u32)> {
    let parts: Vec<&str> = path.split('/').collect();
    let ["tune", band, freq] = parts.as_slice() else {
        return Err(Error::BadRequest(format!("not a tune path: {path:?}")));
    };
    // Lowercase only: these are the URLs the station list hands out.
    let band = match *band {
        "am" => Band::Am,
        "fm" => Band::Fm,
        other => return Err(Error::InvalidBand(other.to_string())),
    };
    let freq = freq
        .parse::<u32>()
        .map_err(|_| Error::BadRequest(format!("bad frequency {freq:?}")))?;
    Ok((band, freq))
}

async fn patch(path: &str, ctx: &ControlContext) -> Response {
    let (band, freq) = match parse_tune_path(path) {
        Ok(target) => target,
        Err(e) => {
            debug!(path, error = %e, "bad PATCH");
            return Response::bad_request();
        }
    };
    match ctx.radio.tune(band, freq).await {
        Ok(status) => {
            debug!(%band, freq, valid = status.valid, "tune request done");
            Response::new(Status::NoContent).header("Content-Location", format!("/{path}"))
        }
        Err(e) => {
            warn!(%band, freq, error = %e, "tune request failed");
            Response::bad_request()
        }
    }
}
