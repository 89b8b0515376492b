//! Output acquisition records and the builder that fills them.
//!
//! One [`OutputRecord`] is produced per physical view of every data packet. Its
//! fields follow the usual raw-acquisition layout consumed by reconstruction:
//! encoding counters, flags, a channel-activation mask, timestamps and the
//! `(sample, channel)` data matrix.

use crate::packet::SampleCube;
use crate::params::{ScanParameters, SliceGeometry};
use crate::reorder::SlotAssignment;
use bitflags::bitflags;
use chrono::{DateTime, Utc};
use ndarray::{s, Array2};
use num_complex::Complex32;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Acquisition flags. Bit positions match the raw-data standard (flag `n` is
    /// bit `n - 1`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
    pub struct AcquisitionFlags: u64 {
        /// First view of a slice in its packet.
        const FIRST_IN_SLICE = 1 << 6;
        /// Last view of a slice in its packet.
        const LAST_IN_SLICE = 1 << 7;
        /// Reference (phase-correction) view.
        const IS_PHASECORR_DATA = 1 << 23;
    }
}

/// Number of 64-bit words in a channel mask.
pub const CHANNEL_MASK_WORDS: usize = 16;

/// Bitset of active receiver channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChannelMask([u64; CHANNEL_MASK_WORDS]);

impl ChannelMask {
    /// Marks `channel` active. `channel` must be below [`MAX_CHANNELS`](crate::params::MAX_CHANNELS).
    pub fn set_active(&mut self, channel: usize) {
        self.0[channel / 64] |= 1u64 << (channel % 64);
    }

    /// Whether `channel` is active. Channels past the mask are never active.
    pub fn is_active(&self, channel: usize) -> bool {
        channel < CHANNEL_MASK_WORDS * 64 && self.0[channel / 64] & (1u64 << (channel % 64)) != 0
    }

    /// Number of active channels.
    pub fn active_count(&self) -> usize {
        self.0.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Raw mask words, channel `n` at bit `n % 64` of word `n / 64`.
    pub fn words(&self) -> &[u64; CHANNEL_MASK_WORDS] {
        &self.0
    }
}

/// Encoding indices of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EncodingCounters {
    /// Phase-encode line; `acquired_y / 2` for reference views.
    pub kspace_encode_step_1: usize,
    /// Geometric slice index.
    pub slice: u16,
    /// Echo number.
    pub contrast: u16,
    /// Completed passes over every slice before this packet.
    pub repetition: usize,
}

/// One acquired view, ready for reconstruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    /// Encoding counters.
    pub idx: EncodingCounters,
    /// Acquisition flags.
    pub flags: AcquisitionFlags,
    /// Unique per physical view: packet cursor plus view index.
    pub scan_counter: usize,
    /// Capture time in whole seconds since the Unix epoch.
    pub acquisition_time_stamp: u32,
    /// Always zero; no physiology data is recorded.
    pub physiology_time_stamp: [u32; 3],
    /// Number of receiver channels in the scan.
    pub available_channels: usize,
    /// Every channel of the scan is active.
    pub channel_mask: ChannelMask,
    /// Readout sample at k-space center.
    pub center_sample: usize,
    /// Slice center, zero without slice geometry.
    pub position: [f32; 3],
    /// Readout direction.
    pub read_dir: [f32; 3],
    /// Phase-encode direction.
    pub phase_dir: [f32; 3],
    /// Slice normal.
    pub slice_dir: [f32; 3],
    /// Samples indexed `(readout sample, channel)`.
    pub data: Array2<Complex32>,
}

impl OutputRecord {
    /// Readout samples per channel.
    pub fn number_of_samples(&self) -> usize {
        self.data.nrows()
    }

    /// Channels with data.
    pub fn active_channels(&self) -> usize {
        self.data.ncols()
    }

    /// Whether every bit of `flag` is set.
    pub fn is_flag_set(&self, flag: AcquisitionFlags) -> bool {
        self.flags.contains(flag)
    }

    /// Whether this is a phase-correction view.
    pub fn is_reference(&self) -> bool {
        self.is_flag_set(AcquisitionFlags::IS_PHASECORR_DATA)
    }
}

/// Source of acquisition timestamps.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Converts a capture instant to the 32-bit seconds stamp stored in records.
pub fn timestamp_seconds(at: DateTime<Utc>) -> u32 {
    u32::try_from(at.timestamp().max(0)).unwrap_or(u32::MAX)
}

/// Per-packet values shared by every record the packet produces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacketContext {
    /// First global slot of the packet (slots written by earlier packets).
    pub cursor: usize,
    /// Geometric slice index.
    pub slice: u16,
    /// Orientation of the slice, zero when unknown.
    pub geometry: SliceGeometry,
    /// Echo number.
    pub contrast: u16,
    /// Capture time in whole seconds since the Unix epoch.
    pub acquisition_time_stamp: u32,
}

/// Fills [`OutputRecord`]s for one scan.
#[derive(Debug, Clone, Copy)]
pub struct RecordBuilder<'a> {
    params: &'a ScanParameters,
}

impl<'a> RecordBuilder<'a> {
    /// Builder for records of the scan described by `params`.
    pub fn new(params: &'a ScanParameters) -> Self {
        Self { params }
    }

    /// Repetition of a packet starting at `cursor`.
    pub fn repetition(&self, cursor: usize) -> usize {
        cursor / (self.params.slices * self.params.total_views())
    }

    /// Builds the record for one physical view of a corrected packet cube.
    pub fn build(
        &self,
        assignment: &SlotAssignment,
        ctx: &PacketContext,
        samples: &SampleCube,
    ) -> OutputRecord {
        let p = self.params;
        let view = assignment.view;

        let mut flags = AcquisitionFlags::empty();
        if view == 0 {
            flags |= AcquisitionFlags::FIRST_IN_SLICE;
        }
        if view == p.total_views() - 1 {
            flags |= AcquisitionFlags::LAST_IN_SLICE;
        }
        if assignment.is_reference {
            flags |= AcquisitionFlags::IS_PHASECORR_DATA;
        }

        let mut channel_mask = ChannelMask::default();
        for channel in 0..p.channels {
            channel_mask.set_active(channel);
        }

        OutputRecord {
            idx: EncodingCounters {
                kspace_encode_step_1: assignment.kspace_encode_step_1,
                slice: ctx.slice,
                contrast: ctx.contrast,
                repetition: self.repetition(ctx.cursor),
            },
            flags,
            scan_counter: ctx.cursor + view,
            acquisition_time_stamp: ctx.acquisition_time_stamp,
            physiology_time_stamp: [0; 3],
            available_channels: p.channels,
            channel_mask,
            center_sample: p.center_sample(),
            position: ctx.geometry.position,
            read_dir: ctx.geometry.read_dir,
            phase_dir: ctx.geometry.phase_dir,
            slice_dir: ctx.geometry.slice_dir,
            data: samples.slice(s![.., view, ..]).to_owned(),
        }
    }
}
