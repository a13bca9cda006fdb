//! Audio stream server.
//!
//! Each listener connects with `GET /audio.wav`, takes a slot from the
//! [`AudioBufferSource`], and receives the stream header followed by every
//! chunk queued for its slot until it disconnects. When every slot is taken
//! the listener gets `503` and the connection is closed.
//!
//! Connections are independent tasks. A slow listener only fills its own
//! FIFO; its slot is released when its task ends, however it ends.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use webradio_core::{AudioBufferSource, Error, Result, StreamSlot};

use crate::config::AudioServerConfig;
use crate::http::{self, Response, Status};

/// Path of the stream.
pub const STREAM_PATH: &str = "audio.wav";

/// Accepts audio listeners and streams to them.
pub struct AudioServer {
    listener: TcpListener,
    source: Arc<dyn AudioBufferSource>,
    config: AudioServerConfig,
}

impl AudioServer {
    pub fn new(
        listener: TcpListener,
        source: Arc<dyn AudioBufferSource>,
        config: AudioServerConfig,
    ) -> Self {
        AudioServer {
            listener,
            source,
            config,
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `cancel` fires, then drop every stream.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        info!(addr = %self.local_addr()?, "audio server listening");
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
                            warn!(error = %e, "audio accept failed");
                            continue;
                        }
                    };
                    let source = Arc::clone(&self.source);
                    let config = self.config.clone();
                    let cancel = cancel.child_token();
                    conns.spawn(async move {
                        tokio::select! {
                            _ = cancel.cancelled() => debug!(%peer, "audio stream cancelled"),
                            result = serve_listener(stream, source, &config) => log_outcome(peer, result),
                        }
                    });
                }
            }
        }
        conns.shutdown().await;
        info!("audio server stopped");
        Ok(())
    }
}

fn log_outcome(peer: SocketAddr, result: Result<()>) {
    match result {
        Ok(()) => debug!(%peer, "audio connection closed"),
        Err(e) if e.is_disconnect() => debug!(%peer, "audio listener disconnected"),
        Err(e) => warn!(%peer, error = %e, "audio connection failed"),
    }
}

/// Handle one audio connection to completion.
pub async fn serve_listener<S>(
    mut stream: S,
    source: Arc<dyn AudioBufferSource>,
    config: &AudioServerConfig,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = match http::read_request(&mut stream, config.request_timeout).await {
        Ok(request) => request,
        Err(e) if e.is_disconnect() => return Err(e),
        Err(e) => {
            debug!(error = %e, "rejecting audio request");
            return Response::bad_request().write_to(&mut stream).await;
        }
    };
    if request.method != "GET" || request.path != STREAM_PATH {
        debug!(method = %request.method, path = %request.path, "not an audio request");
        return Response::bad_request().write_to(&mut stream).await;
    }

    let slot = match StreamSlot::acquire(source) {
        Ok(slot) => slot,
        Err(Error::NoSlot) => {
            info!("no free audio slot, refusing listener");
            return Response::new(Status::ServiceUnavailable)
                .allow_any_origin()
                .write_to(&mut stream)
                .await;
        }
        Err(e) => return Err(e),
    };
    info!(slot = %slot.id(), "audio listener connected");

    Response::new(Status::Ok)
        .allow_any_origin()
        .content_type("audio/wav")
        .write_to(&mut stream)
        .await?;
    stream.write_all(&slot.header()).await?;
    stream.flush().await?;

    loop {
        let chunk = slot.fetch()?;
        if chunk.is_empty() {
            sleep(config.poll_interval).await;
            continue;
        }
        stream.write_all(&chunk).await?;
        stream.flush().await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, DuplexStream};
    use webradio_audio::{AudioBuffers, PoolConfig, WavFormat};

    const OK_HEAD: &[u8] =
        b"HTTP/1.0 200 OK\r\nAccess-Control-Allow-Origin: *\r\nContent-type: audio/wav\r\n\r\n";

    fn buffers(slots: usize) -> Arc<AudioBuffers> {
        Arc::new(AudioBuffers::new(
            WavFormat::default(),
            PoolConfig { slots, depth: 8 },
        ))
    }

    fn spawn_listener(bufs: &Arc<AudioBuffers>) -> (DuplexStream, tokio::task::JoinHandle<Result<()>>) {
        let (client, server) = tokio::io::duplex(4096);
        let source: Arc<dyn AudioBufferSource> = bufs.clone();
        let task = tokio::spawn(async move {
            serve_listener(server, source, &AudioServerConfig::default()).await
        });
        (client, task)
    }

    async fn read_exact(client: &mut DuplexStream, n: usize) -> Vec<u8> {
        let mut buf = vec![0u8; n];
        client.read_exact(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test(start_paused = true)]
    async fn streams_header_then_chunks() {
        let bufs = buffers(1);
        let (mut client, task) = spawn_listener(&bufs);
        client.write_all(b"GET /audio.wav HTTP/1.1\r\n\r\n").await.unwrap();

        assert_eq!(read_exact(&mut client, OK_HEAD.len()).await, OK_HEAD);
        assert_eq!(read_exact(&mut client, 44).await, &bufs.header()[..]);

        bufs.publish(bytes::Bytes::from_static(b"abc"));
        bufs.publish(bytes::Bytes::from_static(b"def"));
        assert_eq!(read_exact(&mut client, 6).await, b"abcdef");

        drop(client);
        bufs.publish(bytes::Bytes::from_static(b"ghi"));
        let err = task.await.unwrap().unwrap_err();
        assert!(err.is_disconnect());
        assert_eq!(bufs.live(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn full_pool_gets_503_without_header() {
        let bufs = buffers(1);
        let (mut first, _first_task) = spawn_listener(&bufs);
        first.write_all(b"GET /audio.wav HTTP/1.0\r\n\r\n").await.unwrap();
        read_exact(&mut first, OK_HEAD.len()).await;

        let (mut second, task) = spawn_listener(&bufs);
        second.write_all(b"GET /audio.wav HTTP/1.0\r\n\r\n").await.unwrap();
        task.await.unwrap().unwrap();
        let mut rest = Vec::new();
        second.read_to_end(&mut rest).await.unwrap();
        assert_eq!(
            rest,
            b"HTTP/1.0 503 Service Unavailable\r\nAccess-Control-Allow-Origin: *\r\n\r\n"
        );
        assert_eq!(bufs.live(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_path_is_400_and_takes_no_slot() {
        let bufs = buffers(1);
        for request in [&b"GET /index.html HTTP/1.0\r\n\r\n"[..], b"POST /audio.wav HTTP/1.0\r\n\r\n"] {
            let (mut client, task) = spawn_listener(&bufs);
            client.write_all(request).await.unwrap();
            task.await.unwrap().unwrap();
            let mut rest = Vec::new();
            client.read_to_end(&mut rest).await.unwrap();
            assert_eq!(rest, b"HTTP/1.0 400 Bad Request\r\n\r\n");
        }
        assert_eq!(bufs.live(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_client_times_out_with_400() {
        let bufs = buffers(1);
        let (mut client, task) = spawn_listener(&bufs);
        tokio::time::sleep(Duration::from_secs(21)).await;
        task.await.unwrap().unwrap();
        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"HTTP/1.0 400 Bad Request\r\n\r\n");
        assert_eq!(bufs.live(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_listener_does_not_block_another() {
        let bufs = buffers(2);
        let (mut slow, _slow_task) = spawn_listener(&bufs);
        let (mut fast, _fast_task) = spawn_listener(&bufs);
        slow.write_all(b"GET /audio.wav HTTP/1.0\r\n\r\n").await.unwrap();
        fast.write_all(b"GET /audio.wav HTTP/1.0\r\n\r\n").await.unwrap();
        read_exact(&mut slow, OK_HEAD.len() + 44).await;
        read_exact(&mut fast, OK_HEAD.len() + 44).await;

        // 20 chunks of 1 KiB overflow the slow side's 4 KiB pipe.
        for i in 0..20u8 {
            bufs.publish(bytes::Bytes::from(vec![i; 1024]));
            let chunk = read_exact(&mut fast, 1024).await;
            assert_eq!(chunk, vec![i; 1024]);
        }
        assert_eq!(bufs.live(), 2);
    }
}
