// src/reader.rs
// Block tree construction, typed data materialization and the GdfFile front end

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, trace, warn};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::block::{ControlBlock, Variable, VariableData, VariableType};
use crate::cursor::GdfCursor;
use crate::error::{GdfError, Result};
use crate::header::GdfHeader;
use crate::measurement::{self, Measurement};

/// Deepest container nesting accepted before the file is rejected
pub const MAX_BLOCK_DEPTH: usize = 64;

/// Recursive descent over the block section of a GDF buffer.
///
/// Structure is always parsed before data: the payload of a top-level
/// block is only read once the declarations of all its nested blocks
/// have been consumed.
pub struct BlockTreeBuilder<'a> {
    cursor: GdfCursor<'a>,
    next_id: usize,
}

impl<'a> BlockTreeBuilder<'a> {
    /// Start building from the cursor's current position (normally right after the header)
    pub fn new(cursor: GdfCursor<'a>) -> Self {
        BlockTreeBuilder { cursor, next_id: 0 }
    }

    pub fn position(&self) -> usize {
        self.cursor.position()
    }

    pub fn into_cursor(self) -> GdfCursor<'a> {
        self.cursor
    }

    /// Read sibling blocks at `depth` until one carries a zero continuation
    /// byte or the buffer is exhausted. Top-level blocks are materialized
    /// as soon as their tree is complete.
    pub fn read_block_tree(&mut self, depth: usize) -> Result<Vec<ControlBlock>> {
        if depth > MAX_BLOCK_DEPTH {
            return Err(GdfError::structural(
                self.cursor.position(),
                format!("block nesting deeper than {} levels", MAX_BLOCK_DEPTH),
            ));
        }
        let indent = depth * 4;
        trace!("{:indent$}read_block_tree(depth={})", "", depth, indent = indent);

        let mut blocks = Vec::new();
        while !self.cursor.is_at_end() {
            let id = self.next_id;
            self.next_id += 1;
            let mut block =
                ControlBlock::read_control_block(&mut self.cursor, id, blocks.len(), depth)?;

            for i in 0..block.n_variables {
                let mut variable = Variable::read_variable(&mut self.cursor)?;
                trace!(
                    "{:indent$}    block variable {} - {} ({})",
                    "",
                    i,
                    variable.name,
                    variable.var_type.name(),
                    indent = indent
                );
                if variable.var_type.is_container() {
                    variable.data = VariableData::Blocks(self.read_block_tree(depth + 1)?);
                }
                block.variables.push(variable);
            }

            if depth == 0 {
                trace!(
                    "{:indent$}    read variable data for block: {}",
                    "",
                    block.id,
                    indent = indent
                );
                read_variable_data(&mut self.cursor, &mut block, depth)?;
            }

            let last = block.is_last_sibling();
            blocks.push(block);
            if last {
                break;
            }
        }

        trace!(
            "{:indent$}return from read_block_tree(depth={}) with {} blocks",
            "",
            depth,
            blocks.len(),
            indent = indent
        );
        Ok(blocks)
    }
}

/// Read the payload of every variable in `block`, descending into the
/// children of container variables in declaration order.
pub fn read_variable_data(
    cursor: &mut GdfCursor<'_>,
    block: &mut ControlBlock,
    depth: usize,
) -> Result<()> {
    let indent = 8 + depth * 4;
    trace!(
        "{:indent$}read_variable_data(block={}, depth={})",
        "",
        block.id,
        depth,
        indent = indent
    );

    let n_data = block.n_data as usize;
    for variable in block.variables.iter_mut() {
        let element_size = match variable.var_type.element_size() {
            Some(size) => size,
            None => {
                let children = match &mut variable.data {
                    VariableData::Blocks(children) => children,
                    _ => {
                        return Err(GdfError::structural(
                            cursor.position(),
                            format!(
                                "container variable '{}' in block {} has no child list",
                                variable.name, block.id
                            ),
                        ))
                    }
                };
                for child in children.iter_mut() {
                    read_variable_data(cursor, child, depth + 1)?;
                }
                continue;
            }
        };

        let length = n_data.checked_mul(element_size).ok_or_else(|| {
            GdfError::structural(
                cursor.position(),
                format!("data size of variable '{}' overflows", variable.name),
            )
        })?;
        let raw = cursor.read_bytes(length)?;
        variable.data = decode_payload(variable.var_type, raw);
        trace!(
            "{:indent$}    variable = {} - {}",
            "",
            variable.name,
            variable.data,
            indent = indent
        );
    }

    Ok(())
}

fn collapse_integers(values: Vec<u64>) -> VariableData {
    if values.len() == 1 {
        VariableData::Integer(values[0])
    } else {
        VariableData::Integers(values)
    }
}

/// Interpret raw payload bytes according to the declared variable type
pub fn decode_payload(var_type: VariableType, raw: &[u8]) -> VariableData {
    match var_type {
        VariableType::Byte => {
            if raw.len() == 1 {
                VariableData::Integer(raw[0] as u64)
            } else {
                VariableData::Bytes(raw.to_vec())
            }
        }
        VariableType::Word => collapse_integers(
            raw.chunks_exact(2)
                .map(|c| LittleEndian::read_u16(c) as u64)
                .collect(),
        ),
        VariableType::DoubleWord | VariableType::Integer => collapse_integers(
            raw.chunks_exact(4)
                .map(|c| LittleEndian::read_u32(c) as u64)
                .collect(),
        ),
        VariableType::Float => {
            let values: Vec<f32> = raw.chunks_exact(4).map(LittleEndian::read_f32).collect();
            if values.len() == 1 {
                VariableData::Float(values[0])
            } else {
                VariableData::Floats(values)
            }
        }
        VariableType::Double => {
            let values: Vec<f64> = raw.chunks_exact(8).map(LittleEndian::read_f64).collect();
            if values.len() == 1 {
                VariableData::Double(values[0])
            } else {
                VariableData::Doubles(values)
            }
        }
        VariableType::DataBlock => VariableData::Pending,
    }
}

/// Main GDF file reader
#[derive(Default, Debug)]
pub struct GdfFile {
    pub file_path: String,
    pub file_header: GdfHeader,
    /// Top-level blocks; each owns its nested children
    pub base_blocks: Vec<ControlBlock>,
}

impl GdfFile {
    /// Create a new GdfFile instance
    pub fn new() -> Self {
        GdfFile::default()
    }

    /// Load a GDF file from the given path
    pub fn load_file<P: AsRef<Path>>(&mut self, input_file: P) -> Result<()> {
        self.file_path = input_file.as_ref().to_string_lossy().to_string();

        // The handle is closed at the end of this block, before parsing starts
        let buffer = {
            let mut file_handle = File::open(&input_file)?;
            let mut buffer = Vec::new();
            file_handle.read_to_end(&mut buffer)?;
            buffer
        };
        debug!("loaded {} ({} bytes)", self.file_path, buffer.len());

        self.load_bytes(&buffer)
    }

    /// Parse a GDF image from any reader, buffering it completely first
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;
        let mut gdf = GdfFile::new();
        gdf.load_bytes(&buffer)?;
        Ok(gdf)
    }

    /// Parse a GDF image held in memory. On error the previous content is kept.
    pub fn load_bytes(&mut self, buffer: &[u8]) -> Result<()> {
        let mut cursor = GdfCursor::new(buffer);
        let header = GdfHeader::read_header(&mut cursor)?;

        let mut builder = BlockTreeBuilder::new(cursor);
        let base_blocks = builder.read_block_tree(0)?;
        let trailing = builder.into_cursor().remaining();
        if trailing > 0 {
            warn!("{} bytes left after the last top-level block", trailing);
        }

        self.file_header = header;
        self.base_blocks = base_blocks;
        debug!(
            "parsed {} top-level blocks, {} blocks in total",
            self.base_blocks.len(),
            self.block_count()
        );
        Ok(())
    }

    /// Every block in the file, children listed before their parent
    pub fn blocks(&self) -> Vec<&ControlBlock> {
        fn collect<'b>(block: &'b ControlBlock, out: &mut Vec<&'b ControlBlock>) {
            for variable in &block.variables {
                if let VariableData::Blocks(children) = &variable.data {
                    for child in children {
                        collect(child, out);
                    }
                }
            }
            out.push(block);
        }

        let mut out = Vec::new();
        for block in &self.base_blocks {
            collect(block, &mut out);
        }
        out
    }

    pub fn block_count(&self) -> usize {
        self.blocks().len()
    }

    pub fn find_block(&self, id: usize) -> Option<&ControlBlock> {
        self.blocks().into_iter().find(|b| b.id == id)
    }

    /// Extract a measurement from every block with the measurement signature
    pub fn export_measurements(&self) -> Result<Vec<Measurement>> {
        self.blocks()
            .into_iter()
            .filter(|block| measurement::is_measurement_block(block))
            .map(measurement::extract_measurement)
            .collect()
    }
}
