// src/lib.rs
// GDF Reader Library - Public API

//! # GDF Reader
//!
//! A Rust library for reading `.gdf` scan probe microscopy files and
//! extracting AFM topography measurements.
//!
//! ## Features
//!
//! - Decode the file header and the recursive control block tree
//! - Typed access to every variable payload (integers, floats, doubles, raw bytes)
//! - Extract measurements: acquisition settings, topography image, comment and preview
//! - Flow tracing through the `log` facade
//!
//! ## Example
//!
//! ```no_run
//! use gdf_reader::GdfFile;
//!
//! let mut gdf = GdfFile::new();
//! gdf.load_file("scan.gdf").expect("Failed to load file");
//!
//! println!("Description: {}", gdf.file_header.description);
//! println!("Blocks: {}", gdf.block_count());
//!
//! for measurement in gdf.export_measurements().expect("Malformed measurement") {
//!     let (rows, columns) = measurement.settings.shape();
//!     println!("{}x{} pixels, comment {:?}", rows, columns, measurement.comment);
//!     if let Some(image) = &measurement.image {
//!         println!("First value: {:?}", image.get(0, 0));
//!     }
//! }
//! ```

mod block;
mod cursor;
mod error;
mod header;
mod measurement;
mod reader;

pub use block::{
    ControlBlock, Variable, VariableData, VariableType, BLOCK_MARK, CONTROL_BLOCK_SIZE,
    VARIABLE_SIZE, VAR_NAME_SIZE,
};
pub use cursor::GdfCursor;
pub use error::{GdfError, Result};
pub use header::{GdfHeader, GDF_VERSION, HEADER_FIXED_SIZE};
pub use measurement::{
    decode_settings, extract_measurement, is_measurement_block, DecodeRule, Image, Measurement,
    MeasurementSettings, SettingValue, SettingsField, DATA_CONTAINER_INDEX,
    MEASUREMENT_DATA_ELEMENTS, MEASUREMENT_VARIABLES, SETTINGS_SCHEMA,
};
pub use reader::{decode_payload, read_variable_data, BlockTreeBuilder, GdfFile, MAX_BLOCK_DEPTH};
