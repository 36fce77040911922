// src/measurement.rs
// Measurement extraction: settings schema, image reshaping and metadata

use log::{debug, warn};

use crate::block::{ControlBlock, VariableData};
use crate::error::{GdfError, Result};

/// Variable count that identifies a measurement settings block
pub const MEASUREMENT_VARIABLES: u32 = 50;

/// Data element count of a measurement settings block
pub const MEASUREMENT_DATA_ELEMENTS: u32 = 1;

/// Position of the container holding image, comment and preview blocks
pub const DATA_CONTAINER_INDEX: usize = 47;

/// How a settings slot is turned into a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeRule {
    Int,
    Real,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingValue {
    Int(u64),
    Real(f64),
}

impl SettingValue {
    pub fn as_u64(&self) -> u64 {
        match self {
            SettingValue::Int(v) => *v,
            SettingValue::Real(v) => *v as u64,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            SettingValue::Int(v) => *v as f64,
            SettingValue::Real(v) => *v,
        }
    }
}

impl DecodeRule {
    /// Decode a materialized payload. Only numeric scalars are accepted;
    /// an `Int` slot holding a float is truncated.
    pub fn decode(&self, data: &VariableData) -> Option<SettingValue> {
        match self {
            DecodeRule::Int => match data {
                VariableData::Integer(v) => Some(SettingValue::Int(*v)),
                other => other.as_f64().map(|v| SettingValue::Int(v as u64)),
            },
            DecodeRule::Real => data.as_f64().map(SettingValue::Real),
        }
    }
}

/// One entry of the settings schema: slot position, field name and decode rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsField {
    pub index: usize,
    pub name: &'static str,
    pub rule: DecodeRule,
}

macro_rules! field_type {
    (Int) => { u64 };
    (Real) => { f64 };
}

macro_rules! field_value {
    (Int, $value:expr) => { $value.as_u64() };
    (Real, $value:expr) => { $value.as_f64() };
}

macro_rules! settings_schema {
    ($($index:literal => $field:ident : $rule:ident),* $(,)?) => {
        /// Acquisition settings of one measurement, in instrument field order.
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct MeasurementSettings {
            $(pub $field: field_type!($rule),)*
        }

        /// Slot layout of a measurement block, fixed by the acquisition software.
        pub const SETTINGS_SCHEMA: &[SettingsField] = &[
            $(SettingsField {
                index: $index,
                name: stringify!($field),
                rule: DecodeRule::$rule,
            },)*
        ];

        impl MeasurementSettings {
            /// Store a decoded value into the field at schema position `index`
            pub fn store(&mut self, index: usize, value: SettingValue) -> bool {
                match index {
                    $($index => { self.$field = field_value!($rule, value); true })*
                    _ => false,
                }
            }
        }
    };
}

settings_schema! {
    0 => lines: Int,
    1 => columns: Int,
    2 => missing_lines: Int,
    3 => line_mean: Int,
    4 => line_mean_order: Int,
    5 => invert_line_mean: Int,
    6 => plane_corr: Int,
    7 => invert_plane_corr: Int,
    8 => max_width: Real,
    9 => max_height: Real,
    10 => offset_x: Real,
    11 => offset_y: Real,
    12 => z_unit: Int,
    13 => retrace: Int,
    14 => z_linearized: Int,
    15 => scan_mode: Int,
    16 => z_calib: Real,
    17 => x_calib: Real,
    18 => y_calib: Real,
    19 => scan_speed: Real,
    20 => set_point: Real,
    21 => bias_voltage: Real,
    22 => loop_gain: Real,
    23 => loop_int: Real,
    24 => phase_shift: Real,
    25 => scan_direction: Int,
    26 => digital_loop: Int,
    27 => loop_filter: Int,
    28 => fft_type: Int,
    29 => xy_linearized: Int,
    30 => retrace_type: Int,
    31 => calculated: Int,
    32 => scanner_range: Int,
    33 => pixel_blend: Int,
    34 => source_channel: Int,
    35 => direct_ac: Int,
    36 => id: Int,
    37 => q_factor: Real,
    38 => aux_gain: Real,
    39 => fixed_palette: Int,
    40 => fixed_min: Real,
    41 => fixed_max: Real,
    42 => zero_scan: Int,
    43 => measured_amplitude: Real,
    44 => frequency_offset: Real,
    45 => q_boost: Real,
    46 => offset_pos: Real,
}

impl MeasurementSettings {
    /// Image shape as (rows, columns); missing lines were never scanned
    pub fn shape(&self) -> (usize, usize) {
        (
            self.lines.saturating_sub(self.missing_lines) as usize,
            self.columns as usize,
        )
    }

    /// Width of one pixel in meters
    pub fn pixel_width(&self) -> f64 {
        if self.columns == 0 {
            return 0.0;
        }
        self.max_width / self.columns as f64
    }

    pub fn pixel_area(&self) -> f64 {
        self.pixel_width() * self.pixel_width()
    }

    /// Scanned area as (width, height) in micrometers
    pub fn size_in_um(&self) -> (f64, f64) {
        let (rows, columns) = self.shape();
        let pixel_width = self.pixel_width();
        (
            pixel_width * columns as f64 * 1e6,
            pixel_width * rows as f64 * 1e6,
        )
    }
}

/// Row-major topography image.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    rows: usize,
    columns: usize,
    values: Vec<f64>,
}

impl Image {
    /// Reshape a flat sequence; fails when the length does not match `rows * columns`
    pub fn from_flat(values: Vec<f64>, rows: usize, columns: usize) -> Result<Self> {
        let expected = rows.checked_mul(columns).unwrap_or(usize::MAX);
        if values.len() != expected {
            return Err(GdfError::ShapeMismatch {
                rows,
                columns,
                expected,
                found: values.len(),
            });
        }
        Ok(Image {
            rows,
            columns,
            values,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.columns)
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Mutable access for in-place processing such as background correction
    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    pub fn get(&self, row: usize, column: usize) -> Option<f64> {
        if row >= self.rows || column >= self.columns {
            return None;
        }
        Some(self.values[row * self.columns + column])
    }

    pub fn row(&self, row: usize) -> Option<&[f64]> {
        if row >= self.rows {
            return None;
        }
        let start = row * self.columns;
        Some(&self.values[start..start + self.columns])
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks(self.columns.max(1))
    }

    pub fn min_max(&self) -> Option<(f64, f64)> {
        if self.values.is_empty() {
            return None;
        }
        let min = self.values.iter().fold(f64::INFINITY, |a, &b| a.min(b));
        let max = self.values.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        Some((min, max))
    }
}

/// A measurement copied out of the block tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// Id of the settings block this measurement came from
    pub block_id: usize,
    pub settings: MeasurementSettings,
    /// `None` when the stored values do not fit the settings' shape
    pub image: Option<Image>,
    pub comment: String,
    pub preview: VariableData,
}

pub fn is_measurement_block(block: &ControlBlock) -> bool {
    block.n_data == MEASUREMENT_DATA_ELEMENTS && block.n_variables == MEASUREMENT_VARIABLES
}

/// Decode the settings slots of `block` through `SETTINGS_SCHEMA`
pub fn decode_settings(block: &ControlBlock) -> Result<MeasurementSettings> {
    let mut settings = MeasurementSettings::default();
    for field in SETTINGS_SCHEMA {
        let variable = block.variable(field.index).ok_or_else(|| {
            GdfError::structural(
                block.offset,
                format!("block {} has no settings slot {}", block.id, field.index),
            )
        })?;
        let value = field.rule.decode(&variable.data).ok_or_else(|| {
            GdfError::structural(
                block.offset,
                format!(
                    "settings slot {} ({}) of block {} holds {} instead of a scalar",
                    field.index, field.name, block.id, variable.data
                ),
            )
        })?;
        if field.rule == DecodeRule::Int && !matches!(variable.data, VariableData::Integer(_)) {
            warn!(
                "block {}: integer setting '{}' stored as {}, truncating",
                block.id, field.name, variable.data
            );
        }
        settings.store(field.index, value);
    }
    Ok(settings)
}

/// Single-variable payload of one child block of the data container
fn child_payload<'b>(
    block: &ControlBlock,
    children: &'b [ControlBlock],
    slot: usize,
    what: &str,
) -> Result<&'b VariableData> {
    children
        .get(slot)
        .and_then(|child| child.variable(0))
        .map(|variable| &variable.data)
        .ok_or_else(|| {
            GdfError::structural(
                block.offset,
                format!("block {} has no {} block", block.id, what),
            )
        })
}

fn payload_bytes(data: &VariableData) -> Option<Vec<u8>> {
    match data {
        VariableData::Bytes(bytes) => Some(bytes.clone()),
        VariableData::Integer(v) if *v <= u8::MAX as u64 => Some(vec![*v as u8]),
        _ => None,
    }
}

/// Build a measurement from a block carrying the measurement signature
pub fn extract_measurement(block: &ControlBlock) -> Result<Measurement> {
    let settings = decode_settings(block)?;

    let children = block.children(DATA_CONTAINER_INDEX).ok_or_else(|| {
        GdfError::structural(
            block.offset,
            format!(
                "slot {} of block {} is not a data container",
                DATA_CONTAINER_INDEX, block.id
            ),
        )
    })?;

    let values = child_payload(block, children, 0, "image")?;
    let comment = child_payload(block, children, 1, "comment")?;
    let preview = child_payload(block, children, 2, "preview")?;

    let comment_bytes = payload_bytes(comment).ok_or_else(|| {
        GdfError::structural(
            block.offset,
            format!("comment of block {} is {}, not text", block.id, comment),
        )
    })?;
    let comment = std::str::from_utf8(&comment_bytes)
        .map_err(|e| GdfError::encoding(format!("comment of block {}", block.id), e))?
        .trim_end_matches('\0')
        .to_string();

    let (rows, columns) = settings.shape();
    let image = match values.to_f64_vec() {
        Some(flat) => match Image::from_flat(flat, rows, columns) {
            Ok(image) => Some(image),
            Err(e) => {
                warn!("block {}: {}; image left empty", block.id, e);
                None
            }
        },
        None => {
            warn!(
                "block {}: image payload {} is not numeric; image left empty",
                block.id, values
            );
            None
        }
    };

    debug!(
        "measurement from block {}: {}x{} image={} comment={:?}",
        block.id,
        rows,
        columns,
        image.is_some(),
        comment
    );

    Ok(Measurement {
        block_id: block.id,
        settings,
        image,
        comment,
        preview: preview.clone(),
    })
}
