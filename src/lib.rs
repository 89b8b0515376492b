//! # EPI Scan-Archive Converter
//!
//! This crate turns the packet stream of an echo-planar imaging (EPI) scan archive into
//! an ordered sequence of raw acquisition records ready for image reconstruction. Each
//! packet holds one hyper-frame: every phase-encode view of one slice and echo, for
//! every receiver channel, in hardware order and interleaved with reference
//! (phase-correction) views.
//!
//! ## Crate Structure
//!
//! - **`archive`**: The `ScanArchive` and `LegacyRawFile` collaborator traits plus an
//!   in-memory archive.
//! - **`config`**: `ConverterConfig`, loaded with Figment from TOML and environment.
//! - **`converter`**: `EpiConverter`, the single-pass conversion driver, and the
//!   `SequenceConverter` trait.
//! - **`correction`**: Row-flip and RF-chop corrections applied per packet.
//! - **`error`**: The `ConvertError` enum shared by every module.
//! - **`logging`**: `tracing-subscriber` setup.
//! - **`packet`**: Control packets and their classification.
//! - **`params`**: Scan parameters and the metadata source they come from.
//! - **`record`**: Output records and the builder that fills them.
//! - **`registry`**: Converter lookup by acquisition mode (`"EPI"`).
//! - **`reorder`**: Reference-view range and physical view → slot mapping.
//!
//! ## Example
//!
//! ```no_run
//! use epi_convert::archive::MemoryArchive;
//! use epi_convert::config::ConverterConfig;
//! use epi_convert::params::ParameterMap;
//! use epi_convert::registry::ConverterRegistry;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let parameters = ParameterMap::from_toml_str(&std::fs::read_to_string("scan.toml")?)?;
//! let mut archive = MemoryArchive::new("scan.h5", parameters, Vec::new());
//!
//! let converter = ConverterRegistry::new().create("EPI", &ConverterConfig::load()?)?;
//! let conversion = converter.convert_archive(&mut archive)?;
//! println!("{} records", conversion.records.len());
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod config;
pub mod converter;
pub mod correction;
pub mod error;
pub mod logging;
pub mod packet;
pub mod params;
pub mod record;
pub mod registry;
pub mod reorder;

pub use converter::{Conversion, ConversionStats, EpiConverter, SequenceConverter};
pub use error::{ConvertError, ConvertResult};
pub use record::{AcquisitionFlags, OutputRecord};
