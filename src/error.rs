//! Error types for system edits and the binary file format.
//!
//! Queries never fail; they return `Option`. Edits that would break one of
//! the system's invariants are rejected with a [`SystemError`] and leave the
//! model untouched. Reading or writing the file format fails with a
//! [`CodecError`] and never commits a partially decoded system.

use thiserror::Error;

/// Which position-indexed container an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Barline,
    Direction,
    ChordText,
    RhythmSlash,
    StaffPosition,
}

impl std::fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ContainerKind::Barline => "barline",
            ContainerKind::Direction => "direction",
            ContainerKind::ChordText => "chord text",
            ContainerKind::RhythmSlash => "rhythm slash",
            ContainerKind::StaffPosition => "staff position",
        };
        f.write_str(name)
    }
}

/// An edit was rejected because it would violate a system invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SystemError {
    /// Position outside `0..=position_count`, or an edit that would move
    /// something there.
    #[error("position {position} is outside the system (position count {count})")]
    InvalidPosition { position: i64, count: u32 },

    /// Spacing below the minimum or too tight for the existing content.
    #[error("position spacing {0} is not valid for this system")]
    InvalidSpacing(u32),

    /// A container already holds an entry at that position.
    #[error("a {kind} already exists at position {position}")]
    DuplicatePosition { kind: ContainerKind, position: u32 },

    #[error("no barline at position {0}")]
    BarlineNotFound(u32),

    #[error("index {index} is out of range for {kind} (len {len})")]
    InvalidIndex {
        kind: ContainerKind,
        index: usize,
        len: usize,
    },

    #[error("{sizes} staff sizes given but {visibility} visibility flags")]
    StaffCountMismatch { sizes: usize, visibility: usize },

    /// No spacing at or above the minimum fits every occupied position.
    #[error("not enough space to fit all positions (highest position {max_position})")]
    InsufficientSpace { max_position: u32 },
}

/// Reading or writing the binary file format failed.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Short read or writer failure.
    #[error("stream error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported file version {0}")]
    UnsupportedVersion(u16),

    /// A model value does not fit its field on the wire.
    #[error("{field} value {value} does not fit the file format")]
    ValueOutOfRange { field: &'static str, value: u64 },

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("invalid data: {0}")]
    InvalidData(String),
}

pub type SystemResult<T> = std::result::Result<T, SystemError>;
pub type CodecResult<T> = std::result::Result<T, CodecError>;
