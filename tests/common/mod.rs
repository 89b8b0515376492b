//! Shared scan fixtures for integration tests.
#![allow(dead_code)]

use epi_convert::packet::{ControlPacket, HyperFrameControl, SampleCube};
use epi_convert::params::{names, ParameterMap, SliceTable};
use ndarray::Array3;
use num_complex::Complex32;

/// Geometry of a synthetic EPI scan.
#[derive(Debug, Clone, Copy)]
pub struct ScanFixture {
    pub echoes: i64,
    pub channels: usize,
    pub slices: usize,
    pub frame_size: usize,
    pub acquired_y: usize,
    pub top_views: usize,
    pub bottom_views: usize,
}

impl ScanFixture {
    pub fn new(acquired_y: usize, top_views: usize, bottom_views: usize) -> Self {
        Self {
            echoes: 1,
            channels: 1,
            slices: 1,
            frame_size: 2,
            acquired_y,
            top_views,
            bottom_views,
        }
    }

    pub fn channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    pub fn slices(mut self, slices: usize) -> Self {
        self.slices = slices;
        self
    }

    pub fn frame_size(mut self, frame_size: usize) -> Self {
        self.frame_size = frame_size;
        self
    }

    pub fn total_views(&self) -> usize {
        self.top_views + self.acquired_y + self.bottom_views
    }

    pub fn reference_views(&self) -> usize {
        self.top_views + self.bottom_views
    }

    /// Download data with an identity slice table.
    pub fn parameters(&self) -> ParameterMap {
        self.parameters_with_table(SliceTable::identity(self.slices as u16))
    }

    pub fn parameters_with_table(&self, table: SliceTable) -> ParameterMap {
        ParameterMap::new()
            .with_int(names::NUM_ECHOES, self.echoes)
            .with_int(names::NUM_CHANNELS, self.channels as i64)
            .with_int(names::NUM_SLICES, self.slices as i64)
            .with_int(names::ACQUIRED_X_RES, self.frame_size as i64)
            .with_int(names::ACQUIRED_Y_RES, self.acquired_y as i64)
            .with_int(names::EXTRA_FRAMES_TOP, self.top_views as i64)
            .with_int(names::EXTRA_FRAMES_BOTTOM, self.bottom_views as i64)
            .with_flag(names::INTEGRATED_REFERENCE_SCAN, self.reference_views() > 0)
            .with_flag(names::MULTIBAND_ENABLED, false)
            .with_slice_table(table)
    }

    /// Raw sample value at `(x, view, channel)` for packet number `tag`.
    pub fn raw_sample(tag: usize, x: usize, view: usize, channel: usize) -> Complex32 {
        Complex32::new(
            (1000 * tag + 100 * channel + x + 1) as f32,
            view as f32 + 0.25,
        )
    }

    pub fn cube(&self, tag: usize) -> SampleCube {
        Array3::from_shape_fn(
            (self.frame_size, self.total_views(), self.channels),
            |(x, v, c)| Self::raw_sample(tag, x, v, c),
        )
    }

    pub fn packet(&self, tag: usize, slice_code: u32, echo: u16, view_skip: i16) -> ControlPacket {
        ControlPacket::frame(
            HyperFrameControl::new(view_skip, slice_code, echo),
            self.cube(tag),
        )
    }

    /// Expected corrected sample with default row flip (odd rows reversed) and RF
    /// chop removal (even views negated), for an oriented view index.
    pub fn corrected_sample(&self, tag: usize, x: usize, view: usize, channel: usize) -> Complex32 {
        let source_x = if view % 2 == 1 {
            self.frame_size - 1 - x
        } else {
            x
        };
        let sample = Self::raw_sample(tag, source_x, view, channel);
        if view % 2 == 0 {
            -sample
        } else {
            sample
        }
    }
}
