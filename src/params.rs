//! Scan parameters and the metadata source they are read from.
//!
//! The scanner's download data is exposed through the [`ParameterSource`] trait. A
//! conversion reads every value it needs once, up front, into an immutable
//! [`ScanParameters`]. Any absent key aborts the conversion: there is no meaningful
//! reconstruction with partial geometry.
//!
//! [`ParameterMap`] is a plain in-memory source. It can be built programmatically or
//! parsed from a TOML dump of the download data:
//!
//! ```toml
//! NumEchoes = 1
//! NumChannels = 8
//! NumSlices = 2
//! AcquiredXRes = 64
//! AcquiredYRes = 64
//! ExtraFramesTop = 2
//! ExtraFramesBottom = 0
//! IntegratedReferenceScan = true
//! MultibandEnabled = false
//!
//! [[SliceTable]]
//! code = 0
//! geometric = 1
//! ```

use crate::error::{ConvertError, ConvertResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use toml::Value;

/// Metadata keys read from the download data.
pub mod names {
    /// Echoes per view.
    pub const NUM_ECHOES: &str = "NumEchoes";
    /// Receiver channels.
    pub const NUM_CHANNELS: &str = "NumChannels";
    /// Slices per repetition.
    pub const NUM_SLICES: &str = "NumSlices";
    /// Readout samples per view.
    pub const ACQUIRED_X_RES: &str = "AcquiredXRes";
    /// Image (phase-encode) views per packet.
    pub const ACQUIRED_Y_RES: &str = "AcquiredYRes";
    /// Reference views above the image block.
    pub const EXTRA_FRAMES_TOP: &str = "ExtraFramesTop";
    /// Reference views below the image block.
    pub const EXTRA_FRAMES_BOTTOM: &str = "ExtraFramesBottom";
    /// Reference scan acquired with the image data.
    pub const INTEGRATED_REFERENCE_SCAN: &str = "IntegratedReferenceScan";
    /// Simultaneous multi-slice acquisition.
    pub const MULTIBAND_ENABLED: &str = "MultibandEnabled";
    /// Raw slice code to geometric slice table.
    pub const SLICE_TABLE: &str = "SliceTable";
}

/// Largest channel count representable in a record's channel-activation mask.
pub const MAX_CHANNELS: usize = 1024;

/// Read-only access to scanner metadata.
pub trait ParameterSource {
    /// Returns an integer parameter, or `None` if it is absent or not an integer.
    fn int(&self, name: &str) -> Option<i64>;

    /// Returns a boolean parameter, or `None` if it is absent or not a boolean.
    fn flag(&self, name: &str) -> Option<bool>;

    /// Returns the slice lookup table, or `None` if the scan has none.
    fn slice_table(&self) -> Option<SliceTable>;
}

/// Patient-frame orientation of one geometric slice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SliceGeometry {
    /// Slice center.
    pub position: [f32; 3],
    /// Readout direction.
    pub read_dir: [f32; 3],
    /// Phase-encode direction.
    pub phase_dir: [f32; 3],
    /// Slice normal.
    pub slice_dir: [f32; 3],
}

/// One row of the slice lookup table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceEntry {
    /// Raw slice code as carried by acquisition packets.
    pub code: u32,
    /// Geometric (spatially ordered) slice index.
    pub geometric: u16,
    /// Orientation, when the scanner provides it.
    #[serde(default)]
    pub geometry: Option<SliceGeometry>,
}

/// Maps raw packet slice codes to geometric slice indices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SliceTable {
    entries: BTreeMap<u32, SliceEntry>,
}

impl SliceTable {
    /// Builds a table from its entries. A later entry for the same code wins.
    pub fn new(entries: impl IntoIterator<Item = SliceEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.code, e)).collect(),
        }
    }

    /// Identity table for `slices` slices with no geometry: code `n` is slice `n`.
    pub fn identity(slices: u16) -> Self {
        Self::new((0..slices).map(|n| SliceEntry {
            code: u32::from(n),
            geometric: n,
            geometry: None,
        }))
    }

    /// Looks up the entry for a raw slice code.
    pub fn lookup(&self, code: u32) -> Option<&SliceEntry> {
        self.entries.get(&code)
    }

    /// Geometric slice index for a raw slice code.
    pub fn geometric_slice_number(&self, code: u32) -> Option<u16> {
        self.lookup(code).map(|e| e.geometric)
    }

    /// Number of slice codes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Scan geometry and acquisition options for one conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanParameters {
    /// Echoes per view.
    pub echoes: u32,
    /// Receiver channels.
    pub channels: usize,
    /// Slices per repetition.
    pub slices: usize,
    /// Acquired readout length (samples per view).
    pub frame_size: usize,
    /// Acquired phase-encode length (image views per packet).
    pub acquired_y: usize,
    /// Reference views acquired above the image block.
    pub top_views: usize,
    /// Reference views acquired below the image block.
    pub bottom_views: usize,
    /// Reference scan acquired with the image data.
    pub integrated_reference_scan: bool,
    /// Simultaneous multi-slice acquisition.
    pub multiband_enabled: bool,
    /// Raw slice code lookup.
    pub slice_table: SliceTable,
}

impl ScanParameters {
    /// Reads every scan parameter from `source`.
    ///
    /// Fails with [`ConvertError::MissingScanParameter`] on the first absent key and
    /// with [`ConvertError::InvalidScanParameter`] on values that cannot describe a
    /// scan (non-positive sizes, negative reference counts).
    pub fn load(source: &dyn ParameterSource) -> ConvertResult<Self> {
        let echoes = positive(source, names::NUM_ECHOES)?;
        let channels = positive(source, names::NUM_CHANNELS)?;
        if channels > MAX_CHANNELS {
            return Err(ConvertError::InvalidScanParameter {
                name: names::NUM_CHANNELS.to_string(),
                reason: format!("{channels} exceeds the {MAX_CHANNELS}-channel limit"),
            });
        }

        Ok(Self {
            echoes: u32::try_from(echoes).map_err(|_| ConvertError::InvalidScanParameter {
                name: names::NUM_ECHOES.to_string(),
                reason: format!("{echoes} does not fit in 32 bits"),
            })?,
            channels,
            slices: positive(source, names::NUM_SLICES)?,
            frame_size: positive(source, names::ACQUIRED_X_RES)?,
            acquired_y: positive(source, names::ACQUIRED_Y_RES)?,
            top_views: non_negative(source, names::EXTRA_FRAMES_TOP)?,
            bottom_views: non_negative(source, names::EXTRA_FRAMES_BOTTOM)?,
            integrated_reference_scan: required_flag(source, names::INTEGRATED_REFERENCE_SCAN)?,
            multiband_enabled: required_flag(source, names::MULTIBAND_ENABLED)?,
            slice_table: source
                .slice_table()
                .ok_or_else(|| ConvertError::MissingScanParameter(names::SLICE_TABLE.to_string()))?,
        })
    }

    /// Reference views per packet (top plus bottom).
    pub fn reference_views(&self) -> usize {
        self.top_views + self.bottom_views
    }

    /// Physical views carried by every data packet.
    pub fn total_views(&self) -> usize {
        self.top_views + self.acquired_y + self.bottom_views
    }

    /// Rows covered by the row-flip table.
    pub fn row_count(&self) -> usize {
        self.acquired_y + self.reference_views()
    }

    /// Readout sample at k-space center.
    pub fn center_sample(&self) -> usize {
        self.frame_size / 2
    }
}

fn required_int(source: &dyn ParameterSource, name: &str) -> ConvertResult<i64> {
    source
        .int(name)
        .ok_or_else(|| ConvertError::MissingScanParameter(name.to_string()))
}

fn required_flag(source: &dyn ParameterSource, name: &str) -> ConvertResult<bool> {
    source
        .flag(name)
        .ok_or_else(|| ConvertError::MissingScanParameter(name.to_string()))
}

fn positive(source: &dyn ParameterSource, name: &str) -> ConvertResult<usize> {
    let value = required_int(source, name)?;
    match usize::try_from(value) {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(ConvertError::InvalidScanParameter {
            name: name.to_string(),
            reason: format!("expected a positive value, got {value}"),
        }),
    }
}

fn non_negative(source: &dyn ParameterSource, name: &str) -> ConvertResult<usize> {
    let value = required_int(source, name)?;
    usize::try_from(value).map_err(|_| ConvertError::InvalidScanParameter {
        name: name.to_string(),
        reason: format!("expected a non-negative value, got {value}"),
    })
}

/// In-memory [`ParameterSource`].
#[derive(Debug, Clone, Default)]
pub struct ParameterMap {
    values: BTreeMap<String, Value>,
    slice_table: Option<SliceTable>,
}

impl ParameterMap {
    /// Empty source; every lookup returns `None`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a TOML dump of the download data. A `SliceTable` array of tables, if
    /// present, becomes the slice lookup table.
    pub fn from_toml_str(text: &str) -> ConvertResult<Self> {
        let mut table: toml::Table = text
            .parse()
            .map_err(|e: toml::de::Error| ConvertError::Configuration(e.to_string()))?;

        let slice_table = match table.remove(names::SLICE_TABLE) {
            Some(raw) => {
                let entries: Vec<SliceEntry> = raw.try_into().map_err(|e: toml::de::Error| {
                    ConvertError::InvalidScanParameter {
                        name: names::SLICE_TABLE.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                Some(SliceTable::new(entries))
            }
            None => None,
        };

        Ok(Self {
            values: table.into_iter().collect(),
            slice_table,
        })
    }

    /// Sets an integer parameter.
    pub fn with_int(mut self, name: &str, value: i64) -> Self {
        self.values.insert(name.to_string(), Value::Integer(value));
        self
    }

    /// Sets a boolean parameter.
    pub fn with_flag(mut self, name: &str, value: bool) -> Self {
        self.values.insert(name.to_string(), Value::Boolean(value));
        self
    }

    /// Sets the slice lookup table.
    pub fn with_slice_table(mut self, table: SliceTable) -> Self {
        self.slice_table = Some(table);
        self
    }

    /// Removes a parameter, mostly useful for exercising missing-key handling.
    pub fn without(mut self, name: &str) -> Self {
        if name == names::SLICE_TABLE {
            self.slice_table = None;
        } else {
            self.values.remove(name);
        }
        self
    }
}

impl ParameterSource for ParameterMap {
    fn int(&self, name: &str) -> Option<i64> {
        self.values.get(name).and_then(Value::as_integer)
    }

    fn flag(&self, name: &str) -> Option<bool> {
        self.values.get(name).and_then(Value::as_bool)
    }

    fn slice_table(&self) -> Option<SliceTable> {
        self.slice_table.clone()
    }
}
