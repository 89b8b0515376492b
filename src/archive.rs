//! Scan storage collaborators.
//!
//! The converter never touches scanner storage directly. It talks to a
//! [`ScanArchive`], which exposes the download data (scan metadata) and a sequential
//! packet source, or is handed a [`LegacyRawFile`], which it refuses.
//!
//! # Available Implementations
//!
//! - `MemoryArchive` - Packets and metadata held in memory
//! - `MemoryLegacyFile` - A named legacy raw file with no content

use crate::error::{ConvertError, ConvertResult};
use crate::packet::ControlPacket;
use crate::params::{ParameterMap, ParameterSource};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// A path-addressable scan archive.
pub trait ScanArchive {
    /// Location of the archive, used in logs and errors.
    fn path(&self) -> &Path;

    /// Loads the scan metadata used to derive
    /// [`ScanParameters`](crate::params::ScanParameters).
    fn load_download_data(&self) -> ConvertResult<Box<dyn ParameterSource>>;

    /// Prepares the archive for packet iteration. Must be called before
    /// [`next_frame_control`](Self::next_frame_control).
    fn load_saved_files(&mut self) -> ConvertResult<()>;

    /// Total number of control packets in the archive.
    fn available_control_count(&self) -> usize;

    /// Returns the next packet in archive order, or `None` once exhausted.
    fn next_frame_control(&mut self) -> ConvertResult<Option<ControlPacket>>;
}

/// Handle to legacy raw-file storage. Conversion from this source is unsupported.
pub trait LegacyRawFile {
    /// Location of the raw file.
    fn path(&self) -> &Path;
}

/// In-memory [`ScanArchive`].
#[derive(Debug, Clone)]
pub struct MemoryArchive {
    path: PathBuf,
    parameters: ParameterMap,
    packets: VecDeque<ControlPacket>,
    packet_count: usize,
    files_loaded: bool,
}

impl MemoryArchive {
    /// Creates an archive over `packets` with the given download data.
    ///
    /// The reported control count is the number of packets supplied here.
    pub fn new(
        path: impl Into<PathBuf>,
        parameters: ParameterMap,
        packets: impl IntoIterator<Item = ControlPacket>,
    ) -> Self {
        let packets: VecDeque<_> = packets.into_iter().collect();
        Self {
            path: path.into(),
            parameters,
            packet_count: packets.len(),
            packets,
            files_loaded: false,
        }
    }

    /// Packets not yet handed out.
    pub fn remaining(&self) -> usize {
        self.packets.len()
    }

    /// Whether `load_saved_files` has run.
    pub fn files_loaded(&self) -> bool {
        self.files_loaded
    }
}

impl ScanArchive for MemoryArchive {
    fn path(&self) -> &Path {
        &self.path
    }

    fn load_download_data(&self) -> ConvertResult<Box<dyn ParameterSource>> {
        Ok(Box::new(self.parameters.clone()))
    }

    fn load_saved_files(&mut self) -> ConvertResult<()> {
        self.files_loaded = true;
        Ok(())
    }

    fn available_control_count(&self) -> usize {
        self.packet_count
    }

    fn next_frame_control(&mut self) -> ConvertResult<Option<ControlPacket>> {
        if !self.files_loaded {
            return Err(ConvertError::ArchiveNotReady);
        }
        Ok(self.packets.pop_front())
    }
}

/// A legacy raw file known only by its path.
#[derive(Debug, Clone)]
pub struct MemoryLegacyFile {
    path: PathBuf,
}

impl MemoryLegacyFile {
    /// Creates a handle for the raw file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LegacyRawFile for MemoryLegacyFile {
    fn path(&self) -> &Path {
        &self.path
    }
}
