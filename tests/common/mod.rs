// tests/common/mod.rs
// Synthetic GDF file writer shared by the integration tests

#![allow(dead_code)]

use byteorder::{LittleEndian, WriteBytesExt};
use gdf_reader::{DecodeRule, VariableType, GDF_VERSION, SETTINGS_SCHEMA, VAR_NAME_SIZE};

/// One variable declaration with either raw payload bytes or child blocks
pub struct VarSpec {
    pub name: String,
    pub var_type: VariableType,
    pub raw: Vec<u8>,
    pub children: Vec<BlockSpec>,
}

pub struct BlockSpec {
    pub n_data: u32,
    pub variables: Vec<VarSpec>,
}

impl VarSpec {
    pub fn raw(name: &str, var_type: VariableType, raw: Vec<u8>) -> Self {
        VarSpec {
            name: name.to_string(),
            var_type,
            raw,
            children: Vec::new(),
        }
    }

    pub fn u32(name: &str, value: u32) -> Self {
        Self::raw(name, VariableType::Integer, value.to_le_bytes().to_vec())
    }

    pub fn f64(name: &str, value: f64) -> Self {
        Self::raw(name, VariableType::Double, value.to_le_bytes().to_vec())
    }

    pub fn f32s(name: &str, values: &[f32]) -> Self {
        let mut raw = Vec::new();
        for v in values {
            raw.write_f32::<LittleEndian>(*v).unwrap();
        }
        Self::raw(name, VariableType::Float, raw)
    }

    pub fn container(name: &str, children: Vec<BlockSpec>) -> Self {
        VarSpec {
            name: name.to_string(),
            var_type: VariableType::DataBlock,
            raw: Vec::new(),
            children,
        }
    }
}

pub fn write_header(out: &mut Vec<u8>, version: u16, description: &str) {
    out.extend_from_slice(b"GDEF");
    out.write_u16::<LittleEndian>(version).unwrap();
    out.extend_from_slice(&[0, 0]);
    out.write_u32::<LittleEndian>(1_600_000_000).unwrap();
    out.write_u32::<LittleEndian>(description.len() as u32).unwrap();
    out.extend_from_slice(description.as_bytes());
}

fn write_structure(out: &mut Vec<u8>, blocks: &[BlockSpec]) {
    for (i, block) in blocks.iter().enumerate() {
        write_control_block(out, block, i + 1 == blocks.len());
    }
}

fn write_control_block(out: &mut Vec<u8>, block: &BlockSpec, last: bool) {
    out.extend_from_slice(b"CB");
    out.extend_from_slice(&[0, 0]);
    out.write_u32::<LittleEndian>(block.variables.len() as u32).unwrap();
    out.write_u32::<LittleEndian>(block.n_data).unwrap();
    out.write_u8(if last { 0 } else { 1 }).unwrap();
    out.extend_from_slice(&[0, 0, 0]);

    for variable in &block.variables {
        let mut name = vec![0u8; VAR_NAME_SIZE];
        name[..variable.name.len()].copy_from_slice(variable.name.as_bytes());
        out.extend_from_slice(&name);
        out.extend_from_slice(&[0, 0]);
        out.write_u32::<LittleEndian>(variable.var_type.as_u32()).unwrap();
        if variable.var_type.is_container() {
            write_structure(out, &variable.children);
        }
    }
}

fn write_data(out: &mut Vec<u8>, block: &BlockSpec) {
    for variable in &block.variables {
        if variable.var_type.is_container() {
            for child in &variable.children {
                write_data(out, child);
            }
        } else {
            out.extend_from_slice(&variable.raw);
        }
    }
}

/// Top-level blocks are written structure first, then their data
pub fn write_blocks(out: &mut Vec<u8>, blocks: &[BlockSpec]) {
    for (i, block) in blocks.iter().enumerate() {
        write_control_block(out, block, i + 1 == blocks.len());
        write_data(out, block);
    }
}

pub fn gdf_bytes(blocks: &[BlockSpec]) -> Vec<u8> {
    let mut out = Vec::new();
    write_header(&mut out, GDF_VERSION, "synthetic");
    write_blocks(&mut out, blocks);
    out
}

/// A 50-variable measurement block with a `rows x columns` float image
pub fn measurement_block(rows: u32, columns: u32, image: &[f32], comment: &str) -> BlockSpec {
    let mut variables: Vec<VarSpec> = SETTINGS_SCHEMA
        .iter()
        .map(|field| match field.name {
            "lines" => VarSpec::u32(field.name, rows),
            "columns" => VarSpec::u32(field.name, columns),
            "missing_lines" => VarSpec::u32(field.name, 0),
            "max_width" => VarSpec::f64(field.name, columns as f64 * 1e-7),
            "max_height" => VarSpec::f64(field.name, rows as f64 * 1e-7),
            "bias_voltage" => VarSpec::f64(field.name, 0.5),
            _ => match field.rule {
                DecodeRule::Int => VarSpec::u32(field.name, field.index as u32),
                DecodeRule::Real => VarSpec::f64(field.name, field.index as f64 / 10.0),
            },
        })
        .collect();

    let mut comment_raw = comment.as_bytes().to_vec();
    comment_raw.resize(comment_raw.len() + 4, 0);
    let preview = vec![0x7fu8; 8];

    variables.push(VarSpec::container(
        "data",
        vec![
            BlockSpec {
                n_data: image.len() as u32,
                variables: vec![VarSpec::f32s("values", image)],
            },
            BlockSpec {
                n_data: comment_raw.len() as u32,
                variables: vec![VarSpec::raw("comment", VariableType::Byte, comment_raw)],
            },
            BlockSpec {
                n_data: preview.len() as u32,
                variables: vec![VarSpec::raw("preview", VariableType::Byte, preview)],
            },
        ],
    ));
    variables.push(VarSpec::u32("reserved0", 0));
    variables.push(VarSpec::u32("reserved1", 0));

    BlockSpec {
        n_data: 1,
        variables,
    }
}

/// A single-element block of `n` integer variables
pub fn integer_block(n: usize) -> BlockSpec {
    BlockSpec {
        n_data: 1,
        variables: (0..n).map(|i| VarSpec::u32(&format!("v{}", i), i as u32)).collect(),
    }
}
