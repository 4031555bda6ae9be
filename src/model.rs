//! Model blob facts.
//!
//! A model blob is a FlatBuffer holding a serialized computation graph.
//! Setup only needs the header facts: the embedded schema version, the
//! operator codes the graph references, and the optional description. The
//! walk below reads exactly those fields, bounds-checked at every step, so
//! a truncated or corrupted blob produces an error instead of a panic.

use std::path::Path;

use serde::Serialize;

use crate::error::{MicroliteError, Result};
use crate::ops::{BuiltinOp, Operator};

const FILE_IDENTIFIER: &[u8; 4] = b"TFL3";

/// Header facts extracted from a model blob.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    /// Schema revision the model was serialized for.
    pub schema_version: u32,
    /// Operators the graph references, in declaration order.
    pub operators: Vec<Operator>,
    /// Free-form description embedded by the converter, when present.
    pub description: Option<String>,
    /// Total blob length in bytes.
    pub len: usize,
}

impl ModelInfo {
    /// Parse the header of a serialized model.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 8 {
            return Err(malformed("blob shorter than a flatbuffer header"));
        }
        if &bytes[4..8] != FILE_IDENTIFIER {
            return Err(malformed("missing TFL3 file identifier"));
        }

        let root = indirect(bytes, 0)?;
        let model = table_at(bytes, root)?;

        let schema_version = match field_pos(bytes, &model, 0)? {
            Some(pos) => read_u32(bytes, pos)?,
            None => 0,
        };

        let mut operators = Vec::new();
        if let Some(pos) = field_pos(bytes, &model, 1)? {
            let vec_pos = indirect(bytes, pos)?;
            let count = read_u32(bytes, vec_pos)? as usize;
            if count > bytes.len() / 4 {
                return Err(malformed("operator vector longer than the blob"));
            }
            for i in 0..count {
                let table_pos = indirect(bytes, vec_pos + 4 + 4 * i)?;
                operators.push(read_operator_code(bytes, table_pos)?);
            }
        }

        let description = match field_pos(bytes, &model, 3)? {
            Some(pos) => Some(string_at(bytes, indirect(bytes, pos)?)?),
            None => None,
        };

        Ok(Self {
            schema_version,
            operators,
            description,
            len: bytes.len(),
        })
    }

    /// Read and parse a model file from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::parse(&bytes)
    }
}

/// One entry of the model's operator_codes vector. The builtin code moved
/// fields across schema revisions: the effective code is the maximum of the
/// old single-byte field and the current 32-bit one, and a present custom
/// name wins over both.
fn read_operator_code(bytes: &[u8], table_pos: usize) -> Result<Operator> {
    let table = table_at(bytes, table_pos)?;

    let deprecated = match field_pos(bytes, &table, 0)? {
        Some(pos) => read_i8(bytes, pos)? as i32,
        None => 0,
    };
    let custom = match field_pos(bytes, &table, 1)? {
        Some(pos) => Some(string_at(bytes, indirect(bytes, pos)?)?),
        None => None,
    };
    let builtin = match field_pos(bytes, &table, 3)? {
        Some(pos) => read_i32(bytes, pos)?,
        None => 0,
    };

    if let Some(name) = custom {
        return Ok(Operator::Custom(name));
    }
    let code = builtin.max(deprecated);
    Ok(match BuiltinOp::from_code(code) {
        Some(op) => Operator::Builtin(op),
        None => Operator::Unknown(code),
    })
}

fn malformed(what: &str) -> MicroliteError {
    MicroliteError::MalformedModel(what.to_string())
}

fn read_u16(bytes: &[u8], pos: usize) -> Result<u16> {
    let raw = bytes
        .get(pos..pos + 2)
        .ok_or_else(|| malformed("read past end of blob"))?;
    Ok(u16::from_le_bytes([raw[0], raw[1]]))
}

fn read_u32(bytes: &[u8], pos: usize) -> Result<u32> {
    let raw = bytes
        .get(pos..pos + 4)
        .ok_or_else(|| malformed("read past end of blob"))?;
    Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

fn read_i32(bytes: &[u8], pos: usize) -> Result<i32> {
    Ok(read_u32(bytes, pos)? as i32)
}

fn read_i8(bytes: &[u8], pos: usize) -> Result<i8> {
    let raw = bytes
        .get(pos)
        .ok_or_else(|| malformed("read past end of blob"))?;
    Ok(*raw as i8)
}

/// Follow a forward offset stored at `pos`.
fn indirect(bytes: &[u8], pos: usize) -> Result<usize> {
    let offset = read_u32(bytes, pos)? as usize;
    let target = pos
        .checked_add(offset)
        .ok_or_else(|| malformed("offset overflow"))?;
    if target >= bytes.len() {
        return Err(malformed("offset past end of blob"));
    }
    Ok(target)
}

struct TableRef {
    pos: usize,
    vtable: usize,
    vtable_len: usize,
}

fn table_at(bytes: &[u8], pos: usize) -> Result<TableRef> {
    let soffset = read_i32(bytes, pos)? as i64;
    let vtable = pos as i64 - soffset;
    if vtable < 0 || vtable as usize >= bytes.len() {
        return Err(malformed("vtable out of bounds"));
    }
    let vtable = vtable as usize;
    let vtable_len = read_u16(bytes, vtable)? as usize;
    if vtable_len < 4 || vtable + vtable_len > bytes.len() {
        return Err(malformed("vtable length out of bounds"));
    }
    Ok(TableRef {
        pos,
        vtable,
        vtable_len,
    })
}

/// Absolute position of a table field, or None when the field is absent.
fn field_pos(bytes: &[u8], table: &TableRef, id: usize) -> Result<Option<usize>> {
    let slot = 4 + 2 * id;
    if slot + 2 > table.vtable_len {
        return Ok(None);
    }
    let offset = read_u16(bytes, table.vtable + slot)? as usize;
    if offset == 0 {
        return Ok(None);
    }
    Ok(Some(table.pos + offset))
}

fn string_at(bytes: &[u8], pos: usize) -> Result<String> {
    let len = read_u32(bytes, pos)? as usize;
    let start = pos + 4;
    let raw = bytes
        .get(start..start.checked_add(len).ok_or_else(|| malformed("string length overflow"))?)
        .ok_or_else(|| malformed("string past end of blob"))?;
    Ok(String::from_utf8_lossy(raw).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ModelBuilder;

    #[test]
    fn parses_version_and_operators() {
        let blob = ModelBuilder::new(3)
            .operator(BuiltinOp::Conv2D)
            .operator(BuiltinOp::Softmax)
            .build();

        let info = ModelInfo::parse(&blob).unwrap();
        assert_eq!(info.schema_version, 3);
        assert_eq!(
            info.operators,
            vec![
                Operator::Builtin(BuiltinOp::Conv2D),
                Operator::Builtin(BuiltinOp::Softmax),
            ]
        );
        assert_eq!(info.description, None);
        assert_eq!(info.len, blob.len());
    }

    #[test]
    fn deprecated_builtin_code_falls_back() {
        let blob = ModelBuilder::new(3).deprecated_builtin(9).build();
        let info = ModelInfo::parse(&blob).unwrap();
        assert_eq!(
            info.operators,
            vec![Operator::Builtin(BuiltinOp::FullyConnected)]
        );
    }

    #[test]
    fn custom_and_unknown_operators_survive() {
        let blob = ModelBuilder::new(3)
            .custom("TFLite_Detection_PostProcess")
            .builtin(9999)
            .build();
        let info = ModelInfo::parse(&blob).unwrap();
        assert_eq!(
            info.operators,
            vec![
                Operator::Custom("TFLite_Detection_PostProcess".to_string()),
                Operator::Unknown(9999),
            ]
        );
    }

    #[test]
    fn description_is_read_when_present() {
        let blob = ModelBuilder::new(3)
            .description("sine approximation")
            .operator(BuiltinOp::FullyConnected)
            .build();
        let info = ModelInfo::parse(&blob).unwrap();
        assert_eq!(info.description.as_deref(), Some("sine approximation"));
    }

    #[test]
    fn rejects_truncated_and_misidentified_blobs() {
        let blob = ModelBuilder::new(3).operator(BuiltinOp::Softmax).build();

        assert!(matches!(
            ModelInfo::parse(&blob[..6]),
            Err(MicroliteError::MalformedModel(_))
        ));
        assert!(matches!(
            ModelInfo::parse(&blob[..10]),
            Err(MicroliteError::MalformedModel(_))
        ));

        let wrong_ident = ModelBuilder::new(3).identifier(*b"NOPE").build();
        assert!(matches!(
            ModelInfo::parse(&wrong_ident),
            Err(MicroliteError::MalformedModel(_))
        ));
    }

    #[test]
    fn from_file_round_trips() {
        let blob = ModelBuilder::new(3).operator(BuiltinOp::Softmax).build();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.tflite");
        std::fs::write(&path, &blob).unwrap();

        let info = ModelInfo::from_file(&path).unwrap();
        assert_eq!(info.schema_version, 3);
        assert_eq!(info.len, blob.len());

        let missing = ModelInfo::from_file(dir.path().join("absent.tflite"));
        assert!(matches!(missing, Err(MicroliteError::Io(_))));
    }
}
