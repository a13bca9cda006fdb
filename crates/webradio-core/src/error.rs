//! Error types for the web radio.
//!
//! All fallible operations across the workspace return [`Result<T>`], which
//! uses [`Error`] as the error type. Bus, device, caller-input, serving and
//! network-bring-up failures are all captured here.

use crate::band::Band;

/// The error type for all web radio operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A bus-level error (I2C NAK, arbitration loss, pin failure).
    #[error("bus error: {0}")]
    Bus(String),

    /// A malformed command or response frame.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The tuner reported a global error after being reinitialised.
    #[error("hardware fault: {0}")]
    HardwareFault(String),

    /// The tuner never raised clear-to-send within the poll budget.
    #[error("timed out waiting for clear-to-send")]
    CommandTimeout,

    /// A seek or tune never raised seek/tune-complete within the poll budget.
    #[error("timed out waiting for seek/tune complete")]
    SeekTimeout,

    /// The response to a command carried the error flag.
    #[error("device rejected command 0x{opcode:02X} (status 0x{status:02X})")]
    DeviceError { opcode: u8, status: u8 },

    /// A band name outside `{AM, FM}`.
    #[error("invalid band: {0}")]
    InvalidBand(String),

    /// A frequency outside the band's configured seek limits.
    #[error("frequency {freq} out of range for {band} ({min}..={max})")]
    FrequencyOutOfRange {
        band: Band,
        freq: u32,
        min: u16,
        max: u16,
    },

    /// Every audio slot is in use.
    #[error("no audio slot available")]
    NoSlot,

    /// An audio slot index that is not currently live.
    #[error("unknown audio slot {0}")]
    UnknownSlot(u32),

    /// A request line the servers refuse to handle.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The client did not send a request line in time.
    #[error("timed out waiting for request")]
    RequestTimeout,

    /// The radio worker or network link is gone.
    #[error("not connected")]
    NotConnected,

    /// The access point rejected the network credential.
    #[error("wrong network password")]
    WrongCredential,

    /// No access point with the configured SSID answered.
    #[error("access point not found: {0}")]
    NoAccessPoint(String),

    /// Network bring-up failed for any other reason.
    #[error("network connect failed: {0}")]
    ConnectFailed(String),

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error means the peer went away mid-stream.
    ///
    /// Resets, aborts, broken pipes and premature EOF are the ordinary way
    /// an audio listener stops listening.
    pub fn is_disconnect(&self) -> bool {
        use std::io::ErrorKind;
        match self {
            Error::Io(e) => matches!(
                e.kind(),
                ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::BrokenPipe
                    | ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
