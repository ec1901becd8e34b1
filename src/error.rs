//! Error taxonomy untuk seluruh client
//!
//! Dua kelas error:
//! - Fatal: transport dan protocol (socket putus, versi buffer salah, frame rusak).
//!   Session tidak bisa dipakai lagi setelah ini.
//! - Recoverable: error dari remote `ask`, misuse text cell, nilai yang tidak muat
//!   satu word. Dikembalikan ke caller apa adanya, tidak ada retry otomatis.

use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// Peer menutup socket sebelum frame lengkap diterima.
    #[error("peer closed the control connection")]
    ConnectionClosed,

    #[error("protocol version mismatch: expected {expected}, found {found}")]
    ProtocolVersionMismatch { expected: u64, found: u64 },

    /// Reply `{"kind": "error"}` dari renderer.
    #[error("remote error: {0}")]
    Remote(String),

    /// Text cell ditulis ke tree kedua tanpa `unbind` lebih dulu.
    #[error("text cell is already bound at slot {slot}; unbind it before writing another reference")]
    UnboundCell { slot: usize },

    /// `update` yang butuh relokasi dipanggil sebelum cell pernah ditulis ke tree.
    #[error("text cell needs relocation but has no back-reference slot to patch")]
    UnboundUpdate,

    /// Cell sudah di-`release`; blob-nya bukan milik client lagi.
    #[error("text cell was released")]
    ReleasedCell,

    #[error("value encodes to {len} bytes, which does not fit one machine word")]
    EncodingContractViolation { len: usize },

    #[error("access of {len} bytes at offset {offset} exceeds the {capacity}-byte data region")]
    OutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    #[error("staged write at offset {offset} is not contiguous (expected {expected})")]
    NonContiguousWrite { offset: usize, expected: usize },

    #[error("invalid color literal {0:?}")]
    InvalidColor(String),

    #[error("malformed data: {0}")]
    Malformed(String),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration: {0}")]
    Config(String),
}

impl Error {
    /// Error yang membuat session tidak bisa dilanjutkan.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::ConnectionClosed
                | Error::ProtocolVersionMismatch { .. }
                | Error::Malformed(_)
                | Error::Json(_)
        )
    }

    /// Normalisasi io error dari socket: hangup jadi `ConnectionClosed`.
    pub(crate) fn from_socket(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted => Error::ConnectionClosed,
            _ => Error::Io(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(Error::ConnectionClosed.is_fatal());
        assert!(Error::ProtocolVersionMismatch {
            expected: 1,
            found: 2
        }
        .is_fatal());
        assert!(!Error::Remote("no space".into()).is_fatal());
        assert!(!Error::UnboundUpdate.is_fatal());
        assert!(!Error::ReleasedCell.is_fatal());
        assert!(!Error::EncodingContractViolation { len: 9 }.is_fatal());
    }

    #[test]
    fn test_socket_hangup_maps_to_connection_closed() {
        let err = Error::from_socket(io::Error::new(io::ErrorKind::BrokenPipe, "pipe"));
        assert!(matches!(err, Error::ConnectionClosed));

        let err = Error::from_socket(io::Error::new(io::ErrorKind::PermissionDenied, "nope"));
        assert!(matches!(err, Error::Io(_)));
    }
}
