use std::path::PathBuf;

use thiserror::Error;

use crate::protocol::ProtocolPhase;

/// Errors in a firmware image. Nothing has been sent to the device.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("line {line}: malformed record: {reason}")]
    MalformedLine { line: usize, reason: String },

    #[error("line {line}: checksum mismatch, expected {expected:#04x}, got {actual:#04x}")]
    BadChecksum { line: usize, expected: u8, actual: u8 },

    #[error("line {line}: unsupported record type S{kind}")]
    UnsupportedType { line: usize, kind: char },

    #[error("image has no termination record")]
    MissingTerminator,
}

impl ParseError {
    pub(crate) fn malformed(line: usize, reason: impl Into<String>) -> Self {
        ParseError::MalformedLine {
            line,
            reason: reason.into(),
        }
    }
}

/// Errors from the I2C bus.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("could not open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0:#04x} is not a 7-bit I2C address")]
    InvalidAddress(u8),

    #[error("could not select device {device:#04x}: {source}")]
    SelectDevice {
        device: u8,
        #[source]
        source: std::io::Error,
    },

    #[error("write to device {device:#04x} register {register:#04x} failed: {source}")]
    Write {
        device: u8,
        register: u8,
        #[source]
        source: std::io::Error,
    },

    #[error("short write to device {device:#04x}: {written} of {expected} bytes")]
    ShortWrite {
        device: u8,
        written: usize,
        expected: usize,
    },

    #[error("block of {0} bytes does not fit a block write")]
    BlockLength(usize),
}

/// Errors raised by the ROM mode state machine.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("flashing already started, machine is in phase {0}")]
    NotIdle(ProtocolPhase),

    #[error("illegal phase transition from {from:?} to {to:?}")]
    IllegalTransition {
        from: ProtocolPhase,
        to: ProtocolPhase,
    },

    #[error("flashing aborted while {phase}, data flash is unchanged: {source}")]
    PreEraseFailure {
        phase: ProtocolPhase,
        #[source]
        source: TransportError,
    },

    #[error(
        "flashing failed while {phase} after the data flash was erased, \
         the gauge is in an inconsistent state and may not boot: {source}"
    )]
    PostEraseFailure {
        phase: ProtocolPhase,
        #[source]
        source: TransportError,
    },
}

impl ProtocolError {
    pub fn is_irrecoverable(&self) -> bool {
        matches!(self, ProtocolError::PostEraseFailure { .. })
    }

    pub fn phase(&self) -> Option<&ProtocolPhase> {
        match self {
            ProtocolError::NotIdle(_) | ProtocolError::IllegalTransition { .. } => None,
            ProtocolError::PreEraseFailure { phase, .. }
            | ProtocolError::PostEraseFailure { phase, .. } => Some(phase),
        }
    }
}

/// Top level error of a flashing run.
#[derive(Debug, Error)]
pub enum FlashError {
    #[error("{path} is not a valid image file: {reason}")]
    InvalidImage { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("image parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("bus unavailable: {0}")]
    TransportOpen(#[source] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl FlashError {
    /// The device was left with a partially erased or written data flash.
    pub fn is_irrecoverable(&self) -> bool {
        match self {
            FlashError::Protocol(e) => e.is_irrecoverable(),
            _ => false,
        }
    }

    /// Phase the protocol was in when it failed, `None` if no bus
    /// transaction was attempted.
    pub fn phase(&self) -> Option<&ProtocolPhase> {
        match self {
            FlashError::Protocol(e) => e.phase(),
            _ => None,
        }
    }
}
