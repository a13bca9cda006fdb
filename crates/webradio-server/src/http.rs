//! Request-line HTTP framing.
//!
//! Both servers speak just enough HTTP/1.0 for browsers and media players:
//! one read of at most [`MAX_REQUEST`] bytes, of which only the request line
//! (`METHOD path VERSION`) is looked at. Headers and bodies are ignored,
//! there is no keep-alive, and every response closes the connection.

use std::fmt::Write as _;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use webradio_core::{Error, Result};

/// Largest request read from a client.
pub const MAX_REQUEST: usize = 1024;

/// The parts of a request line the servers route on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    /// Path with leading and trailing `/` removed. `/` becomes `""`.
    pub path: String,
}

impl Request {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|_| Error::BadRequest("request is not UTF-8".into()))?;
        let line = text.lines().next().unwrap_or_default();
        let mut parts = line.split_whitespace();
        let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
            return Err(Error::BadRequest(format!("malformed request line {line:?}")));
        };
        Ok(Request {
            method: method.to_string(),
            path: target.trim_matches('/').to_string(),
        })
    }
}

/// Read and parse one request, giving up after `timeout`.
pub async fn read_request<S>(stream: &mut S, timeout: Duration) -> Result<Request>
where
    S: AsyncRead + Unpin,
{
    let mut buf = [0u8; MAX_REQUEST];
    let n = tokio::time::timeout(timeout, stream.read(&mut buf))
        .await
        .map_err(|_| Error::RequestTimeout)??;
    if n == 0 {
        return Err(Error::BadRequest("empty request".into()));
    }
    Request::parse(&buf[..n])
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Response status codes the servers emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    NoContent,
    BadRequest,
    ServiceUnavailable,
}

impl Status {
    pub fn code(&self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::NoContent => 204,
            Status::BadRequest => 400,
            Status::ServiceUnavailable => 503,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::NoContent => "No Content",
            Status::BadRequest => "Bad Request",
            Status::ServiceUnavailable => "Service Unavailable",
        }
    }
}

/// An HTTP/1.0 response: status line, headers, optional body.
#[derive(Debug, Clone)]
pub struct Response {
    status: Status,
    headers: Vec<(&'static str, String)>,
    body: Bytes,
}

impl Response {
    pub fn new(status: Status) -> Self {
        Response {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn bad_request() -> Self {
        Self::new(Status::BadRequest)
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// `Access-Control-Allow-Origin: *`.
    pub fn allow_any_origin(self) -> Self {
        self.header("Access-Control-Allow-Origin", "*")
    }

    pub fn content_type(self, content_type: &str) -> Self {
        self.header("Content-type", content_type)
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Status line, headers and blank line.
    pub fn head(&self) -> String {
        let mut head = format!("HTTP/1.0 {} {}\r\n", self.status.code(), self.status.reason());
        for (name, value) in &self.headers {
            let _ = write!(head, "{name}: {value}\r\n");
        }
        head.push_str("\r\n");
        head
    }

    pub fn to_bytes(&self) -> Bytes {
        let head = self.head();
        let mut buf = BytesMut::with_capacity(head.len() + self.body.len());
        buf.put_slice(head.as_bytes());
        buf.put_slice(&self.body);
        buf.freeze()
    }

    pub async fn write_to<S>(&self, stream: &mut S) -> Result<()>
    where
        S: AsyncWrite + Unpin,
    {
        stream.write_all(&self.to_bytes()).await?;
        stream.flush().await?;
        Ok(())
    }
}
