//! EPI scan-archive conversion driver.
//!
//! [`EpiConverter`] runs one synchronous pass over an archive:
//!
//! ```text
//! load parameters ─► reference range ─► for each packet:
//!     classify ─► [control: skip]
//!              └► orient ─► row flip ─► un-chop ─► records into the packet's slot window
//! ```
//!
//! The slot cursor is the length of the output accumulated so far. Each data packet
//! fills exactly `top + acquired_y + bottom` slots starting at the cursor, so the
//! output is complete and in slot order once the loop ends.

use crate::archive::{LegacyRawFile, ScanArchive};
use crate::config::ConverterConfig;
use crate::correction::{undo_rf_chop, RowFlipTable};
use crate::error::{ConvertError, ConvertResult};
use crate::packet::{classify, ControlPacket, PacketClass};
use crate::params::ScanParameters;
use crate::record::{timestamp_seconds, Clock, OutputRecord, PacketContext, RecordBuilder, SystemClock};
use crate::reorder::ViewReorderer;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn};

/// A converter selectable by acquisition mode.
pub trait SequenceConverter: Send + Sync {
    /// Acquisition mode this converter handles.
    fn name(&self) -> &str;

    /// Converts every packet of a scan archive.
    fn convert_archive(&self, archive: &mut dyn ScanArchive) -> ConvertResult<Conversion>;

    /// Converts a legacy raw file.
    fn convert_legacy(&self, raw: &dyn LegacyRawFile, acq_mode: u32) -> ConvertResult<Conversion>;
}

/// Packet accounting for one conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionStats {
    /// Packets read from the archive.
    pub packets: usize,
    /// Packets that produced records.
    pub data_packets: usize,
    /// Scan-control packets, skipped without output.
    pub control_packets: usize,
    /// Packets skipped because they could not be decoded.
    pub malformed_packets: usize,
}

/// Result of a successful conversion.
#[derive(Debug, Clone)]
pub struct Conversion {
    /// Records in slot order.
    pub records: Vec<OutputRecord>,
    /// Packet accounting.
    pub stats: ConversionStats,
}

#[derive(Debug, Default)]
struct ConversionState {
    records: Vec<OutputRecord>,
    stats: ConversionStats,
}

impl ConversionState {
    fn cursor(&self) -> usize {
        self.records.len()
    }
}

/// Per-scan processing stages, built once and applied to every packet.
#[derive(Debug)]
pub struct PacketPipeline<'a> {
    params: &'a ScanParameters,
    row_flip: RowFlipTable,
    reorderer: ViewReorderer,
    builder: RecordBuilder<'a>,
}

impl<'a> PacketPipeline<'a> {
    /// Builds every stage for one scan.
    pub fn new(params: &'a ScanParameters, config: &ConverterConfig) -> Self {
        Self {
            params,
            row_flip: RowFlipTable::new(params.row_count(), &config.row_flip),
            reorderer: ViewReorderer::new(params),
            builder: RecordBuilder::new(params),
        }
    }

    /// View reorderer shared by every packet of the scan.
    pub fn reorderer(&self) -> &ViewReorderer {
        &self.reorderer
    }

    /// Converts one packet whose slot window starts at `cursor`.
    ///
    /// Returns `Ok(None)` for control packets, and the packet's records in slot
    /// order otherwise.
    pub fn convert_packet(
        &self,
        packet: ControlPacket,
        index: usize,
        cursor: usize,
        acquisition_time_stamp: u32,
    ) -> ConvertResult<Option<Vec<OutputRecord>>> {
        let data = match classify(packet, index)? {
            PacketClass::Control => return Ok(None),
            PacketClass::Data(data) => data,
        };

        let p = self.params;
        let total_views = p.total_views();
        data.check_shape(index, (p.frame_size, total_views, p.channels))?;

        let slice = p.slice_table.lookup(data.slice_code).ok_or_else(|| {
            ConvertError::malformed(index, format!("unknown slice code {}", data.slice_code))
        })?;
        let ctx = PacketContext {
            cursor,
            slice: slice.geometric,
            geometry: slice.geometry.unwrap_or_default(),
            contrast: data.echo,
            acquisition_time_stamp,
        };
        debug!(
            index,
            cursor,
            slice = ctx.slice,
            echo = ctx.contrast,
            view_skip = data.view_skip,
            "Converting data packet"
        );

        let mut samples = data.oriented_samples();
        self.row_flip.apply_to_cube(&mut samples);
        undo_rf_chop(&mut samples);

        let mut window: Vec<Option<OutputRecord>> = (0..total_views).map(|_| None).collect();
        for assignment in self.reorderer.begin_packet(cursor) {
            let entry = assignment
                .slot
                .checked_sub(cursor)
                .and_then(|local| window.get_mut(local))
                .ok_or(ConvertError::SlotOutOfRange {
                    slot: assignment.slot,
                    len: total_views,
                })?;
            if entry.is_some() {
                return Err(ConvertError::SlotCollision {
                    slot: assignment.slot,
                });
            }
            *entry = Some(self.builder.build(&assignment, &ctx, &samples));
        }

        window
            .into_iter()
            .enumerate()
            .map(|(local, record)| record.ok_or(ConvertError::SlotUnfilled { slot: cursor + local }))
            .collect::<ConvertResult<Vec<_>>>()
            .map(Some)
    }
}

/// Converter for EPI scans, registered under [`EpiConverter::MODE`].
pub struct EpiConverter {
    config: ConverterConfig,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for EpiConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpiConverter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EpiConverter {
    /// Acquisition mode name this converter is registered under.
    pub const MODE: &'static str = "EPI";

    /// Creates a converter stamping records with wall-clock time.
    pub fn new(config: ConverterConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock used for acquisition timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Configuration in use.
    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    fn log_reference_layout(&self, params: &ScanParameters, reorderer: &ViewReorderer) {
        if params.reference_views() > 0 {
            info!(range = %reorderer.range(), "Reference views range");
            info!(
                y_acq = params.acquired_y,
                top_views = params.top_views,
                bottom_views = params.bottom_views,
                "Reference view layout"
            );
        }
        if params.top_views > 0 && params.bottom_views > 0 {
            warn!(
                top_views = params.top_views,
                bottom_views = params.bottom_views,
                "Both top and bottom reference views configured; only the top block is treated as reference data"
            );
        }
        debug!(
            integrated_reference_scan = params.integrated_reference_scan,
            multiband_enabled = params.multiband_enabled,
            echoes = params.echoes,
            "Scan options"
        );
    }
}

impl SequenceConverter for EpiConverter {
    fn name(&self) -> &str {
        Self::MODE
    }

    fn convert_archive(&self, archive: &mut dyn ScanArchive) -> ConvertResult<Conversion> {
        let span = info_span!("epi_conversion", archive = %archive.path().display());
        let _guard = span.enter();
        info!("Using EPI scan-archive converter");

        let source = archive.load_download_data()?;
        let params = ScanParameters::load(source.as_ref())?;
        archive.load_saved_files()?;

        let packet_count = archive.available_control_count();
        let pipeline = PacketPipeline::new(&params, &self.config);
        self.log_reference_layout(&params, pipeline.reorderer());

        let mut state = ConversionState::default();
        for index in 0..packet_count {
            let Some(packet) = archive.next_frame_control()? else {
                let err = ConvertError::ArchiveTruncated {
                    expected: packet_count,
                    delivered: index,
                };
                error!(error = %err, "Conversion aborted");
                return Err(err);
            };
            state.stats.packets += 1;

            let stamp = timestamp_seconds(self.clock.now());
            match pipeline.convert_packet(packet, index, state.cursor(), stamp) {
                Ok(Some(records)) => {
                    state.stats.data_packets += 1;
                    state.records.extend(records);
                }
                Ok(None) => state.stats.control_packets += 1,
                Err(err) if err.is_recoverable() && !self.config.strict => {
                    warn!(error = %err, "Skipping malformed packet");
                    state.stats.malformed_packets += 1;
                }
                Err(err) => {
                    error!(error = %err, "Conversion aborted");
                    return Err(err);
                }
            }
        }

        info!(
            records = state.records.len(),
            data_packets = state.stats.data_packets,
            control_packets = state.stats.control_packets,
            malformed_packets = state.stats.malformed_packets,
            "Conversion complete"
        );
        Ok(Conversion {
            records: state.records,
            stats: state.stats,
        })
    }

    fn convert_legacy(&self, raw: &dyn LegacyRawFile, acq_mode: u32) -> ConvertResult<Conversion> {
        error!(
            path = %raw.path().display(),
            acq_mode,
            "Conversion of EPI legacy raw files is not supported"
        );
        Err(ConvertError::UnsupportedInputFormat(format!(
            "EPI legacy raw file {} (acquisition mode {acq_mode})",
            raw.path().display()
        )))
    }
}
