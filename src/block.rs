// src/block.rs
// Control blocks, variable declarations and their typed payloads

use std::fmt;

use log::trace;

use crate::cursor::GdfCursor;
use crate::error::{GdfError, Result};

/// Literal marker opening every control block
pub const BLOCK_MARK: [u8; 2] = *b"CB";

/// mark(2) + pad(2) + variable count(4) + data count(4) + continuation(1) + pad(3)
pub const CONTROL_BLOCK_SIZE: usize = 16;

pub const VAR_NAME_SIZE: usize = 50;

/// name(50) + pad(2) + type(4)
pub const VARIABLE_SIZE: usize = VAR_NAME_SIZE + 2 + 4;

/// Variable type tags, in the order fixed by the file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum VariableType {
    /// Single byte or character string
    Byte = 0,
    Word = 1,
    DoubleWord = 2,
    Integer = 3,
    Float = 4,
    Double = 5,
    /// Container whose payload is a list of nested control blocks
    DataBlock = 6,
}

impl VariableType {
    /// Terminal sentinel of the on-disk enumeration; never a valid tag.
    pub const COUNT: u32 = 7;

    pub fn from_u32(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(VariableType::Byte),
            1 => Some(VariableType::Word),
            2 => Some(VariableType::DoubleWord),
            3 => Some(VariableType::Integer),
            4 => Some(VariableType::Float),
            5 => Some(VariableType::Double),
            6 => Some(VariableType::DataBlock),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> u32 {
        *self as u32
    }

    /// Size of one data element in bytes. Containers have no fixed size.
    pub fn element_size(&self) -> Option<usize> {
        match self {
            VariableType::Byte => Some(1),
            VariableType::Word => Some(2),
            VariableType::DoubleWord => Some(4),
            VariableType::Integer => Some(4),
            VariableType::Float => Some(4),
            VariableType::Double => Some(8),
            VariableType::DataBlock => None,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, VariableType::DataBlock)
    }

    pub fn name(&self) -> &'static str {
        match self {
            VariableType::Byte => "BYTE",
            VariableType::Word => "WORD",
            VariableType::DoubleWord => "DWORD",
            VariableType::Integer => "INTEGER",
            VariableType::Float => "FLOAT",
            VariableType::Double => "DOUBLE",
            VariableType::DataBlock => "DATABLOCK",
        }
    }
}

/// Payload of a variable after (or before) materialization.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableData {
    /// Declared but not yet read from the data section
    Pending,
    /// Child blocks of a container variable
    Blocks(Vec<ControlBlock>),
    Integer(u64),
    Integers(Vec<u64>),
    /// Multi-byte BYTE/CHAR payload, kept raw
    Bytes(Vec<u8>),
    Float(f32),
    Floats(Vec<f32>),
    Double(f64),
    Doubles(Vec<f64>),
}

impl Default for VariableData {
    fn default() -> Self {
        VariableData::Pending
    }
}

impl VariableData {
    pub fn is_pending(&self) -> bool {
        matches!(self, VariableData::Pending)
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            VariableData::Integer(_) | VariableData::Float(_) | VariableData::Double(_)
        )
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            VariableData::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Any numeric scalar widened to f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            VariableData::Integer(v) => Some(*v as f64),
            VariableData::Float(v) => Some(*v as f64),
            VariableData::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn blocks(&self) -> Option<&[ControlBlock]> {
        match self {
            VariableData::Blocks(blocks) => Some(blocks),
            _ => None,
        }
    }

    /// Flatten numeric payloads (scalar or sequence) into f64 values
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            VariableData::Integer(v) => Some(vec![*v as f64]),
            VariableData::Integers(v) => Some(v.iter().map(|&x| x as f64).collect()),
            VariableData::Float(v) => Some(vec![*v as f64]),
            VariableData::Floats(v) => Some(v.iter().map(|&x| x as f64).collect()),
            VariableData::Double(v) => Some(vec![*v]),
            VariableData::Doubles(v) => Some(v.clone()),
            _ => None,
        }
    }

    /// Number of values carried by the payload
    pub fn len(&self) -> usize {
        match self {
            VariableData::Pending => 0,
            VariableData::Blocks(v) => v.len(),
            VariableData::Integer(_) | VariableData::Float(_) | VariableData::Double(_) => 1,
            VariableData::Integers(v) => v.len(),
            VariableData::Bytes(v) => v.len(),
            VariableData::Floats(v) => v.len(),
            VariableData::Doubles(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn write_preview<T: fmt::Display>(f: &mut fmt::Formatter<'_>, values: &[T]) -> fmt::Result {
    const SHOWN: usize = 4;
    write!(f, "[{} values]", values.len())?;
    for (i, value) in values.iter().take(SHOWN).enumerate() {
        if i == 0 {
            write!(f, " {}", value)?;
        } else {
            write!(f, ", {}", value)?;
        }
    }
    if values.len() > SHOWN {
        write!(f, ", ...")?;
    }
    Ok(())
}

impl fmt::Display for VariableData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableData::Pending => write!(f, "<pending>"),
            VariableData::Blocks(v) => write!(f, "<{} blocks>", v.len()),
            VariableData::Integer(v) => write!(f, "{}", v),
            VariableData::Float(v) => write!(f, "{}", v),
            VariableData::Double(v) => write!(f, "{}", v),
            VariableData::Integers(v) => write_preview(f, v),
            VariableData::Floats(v) => write_preview(f, v),
            VariableData::Doubles(v) => write_preview(f, v),
            VariableData::Bytes(v) => {
                let text = String::from_utf8_lossy(v);
                let text = text.trim_end_matches('\0');
                if text.chars().count() > 32 {
                    let short: String = text.chars().take(32).collect();
                    write!(f, "[{} bytes] {:?}...", v.len(), short)
                } else {
                    write!(f, "[{} bytes] {:?}", v.len(), text)
                }
            }
        }
    }
}

/// A named, typed variable declared inside a control block.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub var_type: VariableType,
    pub data: VariableData,
}

impl Variable {
    /// Decode a variable declaration. The payload stays `Pending`; container
    /// payloads are filled by the tree builder, the rest by the materializer.
    pub fn read_variable(cursor: &mut GdfCursor<'_>) -> Result<Self> {
        let offset = cursor.position();
        let raw_name = cursor.read_bytes(VAR_NAME_SIZE)?;
        let name = std::str::from_utf8(raw_name)
            .map_err(|e| GdfError::encoding(format!("variable name at offset {}", offset), e))?
            .trim_end_matches('\0')
            .to_string();
        cursor.skip(2)?;

        let tag = cursor.read_u32()?;
        let var_type = VariableType::from_u32(tag).ok_or_else(|| {
            GdfError::structural(
                offset,
                format!(
                    "variable '{}' has type tag {} (valid tags are below {})",
                    name,
                    tag,
                    VariableType::COUNT
                ),
            )
        })?;

        Ok(Variable {
            name,
            var_type,
            data: VariableData::Pending,
        })
    }
}

/// A node of the block tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlBlock {
    /// File-wide sequence number, in the order blocks were encountered
    pub id: usize,
    /// Position among the siblings at the same depth
    pub index: usize,
    pub depth: usize,
    /// Byte offset of the block's marker
    pub offset: usize,
    pub mark: [u8; 2],
    pub n_variables: u32,
    /// Element count shared by every non-container variable of the block
    pub n_data: u32,
    pub continuation: u8,
    pub variables: Vec<Variable>,
}

impl ControlBlock {
    /// Decode the fixed-size control record. Variables are not read here.
    pub fn read_control_block(
        cursor: &mut GdfCursor<'_>,
        id: usize,
        index: usize,
        depth: usize,
    ) -> Result<Self> {
        let offset = cursor.position();
        let mut mark = [0u8; 2];
        mark.copy_from_slice(cursor.read_bytes(2)?);
        trace!(
            "{:indent$}read block: {} - mark={:?}",
            "",
            id,
            String::from_utf8_lossy(&mark),
            indent = depth * 4
        );
        if mark != BLOCK_MARK {
            return Err(GdfError::structural(
                offset,
                format!("control block mark {:02x?} is not \"CB\"", mark),
            ));
        }
        cursor.skip(2)?;

        let n_variables = cursor.read_u32()?;
        let n_data = cursor.read_u32()?;
        let continuation = cursor.read_u8()?;
        cursor.skip(3)?;

        Ok(ControlBlock {
            id,
            index,
            depth,
            offset,
            mark,
            n_variables,
            n_data,
            continuation,
            variables: Vec::with_capacity(n_variables.min(1024) as usize),
        })
    }

    /// A zero continuation byte closes the current nesting level
    pub fn is_last_sibling(&self) -> bool {
        self.continuation == 0
    }

    pub fn variable(&self, index: usize) -> Option<&Variable> {
        self.variables.get(index)
    }

    pub fn find_variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Child blocks held by the container variable at `index`
    pub fn children(&self, index: usize) -> Option<&[ControlBlock]> {
        self.variables.get(index).and_then(|v| v.data.blocks())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control_record(mark: &[u8; 2], n_variables: u32, n_data: u32, next: u8) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(mark);
        data.extend_from_slice(&[0, 0]);
        data.extend_from_slice(&n_variables.to_le_bytes());
        data.extend_from_slice(&n_data.to_le_bytes());
        data.push(next);
        data.extend_from_slice(&[0, 0, 0]);
        data
    }

    fn variable_record(name: &str, tag: u32) -> Vec<u8> {
        let mut data = vec![0u8; VAR_NAME_SIZE];
        data[..name.len()].copy_from_slice(name.as_bytes());
        data.extend_from_slice(&[0, 0]);
        data.extend_from_slice(&tag.to_le_bytes());
        data
    }

    #[test]
    fn test_type_tags() {
        for tag in 0..VariableType::COUNT {
            let var_type = VariableType::from_u32(tag).unwrap();
            assert_eq!(var_type.as_u32(), tag);
        }
        assert!(VariableType::from_u32(VariableType::COUNT).is_none());
        assert_eq!(VariableType::Double.element_size(), Some(8));
        assert_eq!(VariableType::Word.element_size(), Some(2));
        assert_eq!(VariableType::DataBlock.element_size(), None);
        assert!(VariableType::DataBlock.is_container());
    }

    #[test]
    fn test_control_block_parsing() {
        let data = control_record(b"CB", 50, 1, 1);
        assert_eq!(data.len(), CONTROL_BLOCK_SIZE);

        let mut cursor = GdfCursor::new(&data);
        let block = ControlBlock::read_control_block(&mut cursor, 3, 1, 2).unwrap();
        assert_eq!(block.mark, *b"CB");
        assert_eq!(block.n_variables, 50);
        assert_eq!(block.n_data, 1);
        assert_eq!(block.id, 3);
        assert_eq!(block.index, 1);
        assert_eq!(block.depth, 2);
        assert!(!block.is_last_sibling());
        assert!(cursor.is_at_end());
    }

    #[test]
    fn test_bad_mark() {
        let data = control_record(b"CX", 1, 1, 0);
        let mut cursor = GdfCursor::new(&data);
        let result = ControlBlock::read_control_block(&mut cursor, 0, 0, 0);
        assert!(matches!(
            result,
            Err(GdfError::StructuralIntegrity { offset: 0, .. })
        ));
    }

    #[test]
    fn test_variable_parsing() {
        let data = variable_record("lines", VariableType::Integer.as_u32());
        assert_eq!(data.len(), VARIABLE_SIZE);

        let mut cursor = GdfCursor::new(&data);
        let variable = Variable::read_variable(&mut cursor).unwrap();
        assert_eq!(variable.name, "lines");
        assert_eq!(variable.var_type, VariableType::Integer);
        assert!(variable.data.is_pending());
    }

    #[test]
    fn test_invalid_type_tag() {
        let data = variable_record("bogus", VariableType::COUNT);
        let mut cursor = GdfCursor::new(&data);
        let result = Variable::read_variable(&mut cursor);
        assert!(matches!(result, Err(GdfError::StructuralIntegrity { .. })));
    }

    #[test]
    fn test_invalid_variable_name() {
        let mut data = variable_record("", VariableType::Integer.as_u32());
        data[0] = 0xff;
        data[1] = 0xfe;
        let mut cursor = GdfCursor::new(&data);
        let result = Variable::read_variable(&mut cursor);
        assert!(matches!(result, Err(GdfError::Encoding { .. })));
    }

    #[test]
    fn test_variable_lookup() {
        let block = ControlBlock {
            id: 0,
            index: 0,
            depth: 0,
            offset: 0,
            mark: BLOCK_MARK,
            n_variables: 2,
            n_data: 1,
            continuation: 0,
            variables: vec![
                Variable {
                    name: "lines".to_string(),
                    var_type: VariableType::Integer,
                    data: VariableData::Integer(256),
                },
                Variable {
                    name: "z_calib".to_string(),
                    var_type: VariableType::Double,
                    data: VariableData::Double(1e-9),
                },
            ],
        };
        let found = block.find_variable("z_calib").unwrap();
        assert_eq!(found.data, VariableData::Double(1e-9));
        assert!(block.find_variable("columns").is_none());
        assert!(block.children(0).is_none());
    }

    #[test]
    fn test_data_accessors() {
        assert_eq!(VariableData::Integer(12).as_u64(), Some(12));
        assert_eq!(VariableData::Double(1.0).as_u64(), None);
        assert!(VariableData::Float(1.0).is_scalar());
        assert!(!VariableData::Integers(vec![1]).is_scalar());
        assert!(!VariableData::Pending.is_scalar());
        assert_eq!(VariableData::Integer(12).as_f64(), Some(12.0));
        assert_eq!(VariableData::Float(0.5).as_f64(), Some(0.5));
        assert_eq!(VariableData::Floats(vec![1.0, 2.0]).as_f64(), None);
        assert_eq!(
            VariableData::Floats(vec![1.0, 2.0]).to_f64_vec(),
            Some(vec![1.0, 2.0])
        );
        assert_eq!(VariableData::Bytes(vec![1, 2, 3]).to_f64_vec(), None);
        assert!(VariableData::Blocks(Vec::new()).is_empty());
    }

    #[test]
    fn test_display() {
        assert_eq!(VariableData::Integer(7).to_string(), "7");
        assert_eq!(
            VariableData::Doubles(vec![1.0, 2.0, 3.0, 4.0, 5.0]).to_string(),
            "[5 values] 1, 2, 3, 4, ..."
        );
        assert_eq!(
            VariableData::Bytes(b"hi\0\0".to_vec()).to_string(),
            "[4 bytes] \"hi\""
        );
    }
}
