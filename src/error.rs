//! Custom error types for the converter.
//!
//! This module defines the primary error type, `ConvertError`, for the whole crate.
//! Using the `thiserror` crate, it provides one place to describe everything that can
//! stop or disturb a conversion, from missing scan metadata to packets whose payload
//! does not match the scan geometry.
//!
//! ## Error Hierarchy
//!
//! - **`UnsupportedInputFormat`**: The legacy raw-file path was requested. Always fatal.
//! - **`MissingScanParameter`** / **`InvalidScanParameter`**: The metadata source could
//!   not describe the scan geometry. There is no partial-parameter recovery.
//! - **`MalformedPacket`**: A packet could not be decoded or does not fit the geometry.
//!   The driver skips and counts these unless strict mode is enabled.
//! - **`SlotOutOfRange`**, **`SlotCollision`**, **`SlotUnfilled`**: The view reordering
//!   broke its one-view-one-slot contract. Always fatal.
//! - **`ArchiveNotReady`**: Packets were requested before the archive loaded its files.
//! - **`ArchiveTruncated`**: The archive ran out of packets before its reported count.
//!   The packet set is incomplete, so no output is returned.
//! - **`UnknownConverter`**: The registry has no converter for an acquisition mode.
//! - **`Config`** / **`Configuration`**: Configuration extraction or validation failed.
//!
//! No variant is retried anywhere. A conversion is a deterministic pass over fixed input.

use thiserror::Error;

/// Convenience alias for results using the converter error type.
pub type ConvertResult<T> = std::result::Result<T, ConvertError>;

/// Everything that can stop or disturb a conversion.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// The input kind cannot be converted (legacy raw files).
    #[error("Unsupported input format: {0}")]
    UnsupportedInputFormat(String),

    /// A required metadata key is absent or has the wrong type.
    #[error("Required scan parameter '{0}' is missing")]
    MissingScanParameter(String),

    /// A metadata value cannot describe a scan.
    #[error("Scan parameter '{name}' is invalid: {reason}")]
    InvalidScanParameter {
        /// Metadata key.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// A packet could not be decoded or does not fit the scan geometry.
    #[error("Malformed packet #{index}: {reason}")]
    MalformedPacket {
        /// Position of the packet in the archive stream.
        index: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// A view was assigned a slot outside its packet's window.
    #[error("Record slot {slot} is outside the packet window of {len} slots")]
    SlotOutOfRange {
        /// Global slot that was assigned.
        slot: usize,
        /// Slots in the packet window.
        len: usize,
    },

    /// Two views were assigned the same slot.
    #[error("Record slot {slot} was written twice")]
    SlotCollision {
        /// Global slot written twice.
        slot: usize,
    },

    /// A slot of the packet window received no view.
    #[error("Record slot {slot} was never written")]
    SlotUnfilled {
        /// Global slot left empty.
        slot: usize,
    },

    /// Packets were requested before `load_saved_files`.
    #[error("Archive packets requested before saved files were loaded")]
    ArchiveNotReady,

    /// The archive ran out of packets before its reported count.
    #[error("Archive reported {expected} packets but delivered only {delivered}")]
    ArchiveTruncated {
        /// Packet count the archive reported.
        expected: usize,
        /// Packets it actually handed out.
        delivered: usize,
    },

    /// No converter is registered for the acquisition mode.
    #[error("No converter registered for acquisition mode '{0}'")]
    UnknownConverter(String),

    /// Configuration could not be extracted.
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    /// Configuration was extracted but is not usable.
    #[error("Configuration validation error: {0}")]
    Configuration(String),
}

impl ConvertError {
    /// Builds a [`ConvertError::MalformedPacket`] for the packet at `index`.
    pub fn malformed(index: usize, reason: impl Into<String>) -> Self {
        Self::MalformedPacket {
            index,
            reason: reason.into(),
        }
    }

    /// Returns `true` if the driver may skip the offending packet and continue.
    ///
    /// Only packet-level decode problems are recoverable. Everything else describes
    /// a scan that cannot be converted at all.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::MalformedPacket { .. })
    }
}
