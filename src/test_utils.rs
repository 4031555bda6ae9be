//! Test fixtures: a scripted backend and a model-blob builder.
//!
//! The scripted runtime stands in for a real engine binding so the setup
//! and invocation contract can be exercised without target hardware, and
//! the builder emits valid model blobs so parsing needs no binary fixtures
//! checked into the tree.

use std::ops::Range;

use crate::arena::Arena;
use crate::error::{MicroliteError, Result};
use crate::model::ModelInfo;
use crate::ops::{BuiltinOp, OpResolver};
use crate::runtime::GraphRuntime;
use crate::tensor::{TensorLayout, TensorSpec};

type InferFn = Box<dyn FnMut(&[u8], &mut [u8]) + Send>;

/// A configurable fake backend.
///
/// Allocates the configured tensors from the arena and, on invoke, runs an
/// optional bytes-in/bytes-out function from the input tensor to the
/// output tensor. Allocation and invocation can be scripted to fail.
pub struct ScriptedRuntime {
    inputs: Vec<TensorSpec>,
    outputs: Vec<TensorSpec>,
    scratch_bytes: usize,
    fail_allocation: bool,
    fail_invocation: bool,
    infer: Option<InferFn>,
    io: Option<(Range<usize>, Range<usize>)>,
    invocations: usize,
}

impl ScriptedRuntime {
    pub fn new(input: TensorSpec, output: TensorSpec) -> Self {
        Self {
            inputs: vec![input],
            outputs: vec![output],
            scratch_bytes: 0,
            fail_allocation: false,
            fail_invocation: false,
            infer: None,
            io: None,
            invocations: 0,
        }
    }

    /// Claim extra arena bytes for intermediate tensors.
    pub fn with_scratch(mut self, bytes: usize) -> Self {
        self.scratch_bytes = bytes;
        self
    }

    /// Present an additional input tensor, as a multi-input model would.
    pub fn with_extra_input(mut self, spec: TensorSpec) -> Self {
        self.inputs.push(spec);
        self
    }

    /// Present an additional output tensor, as a multi-output model would.
    pub fn with_extra_output(mut self, spec: TensorSpec) -> Self {
        self.outputs.push(spec);
        self
    }

    pub fn failing_allocation(mut self) -> Self {
        self.fail_allocation = true;
        self
    }

    pub fn failing_invocation(mut self) -> Self {
        self.fail_invocation = true;
        self
    }

    /// Run `infer` on every invocation, reading the input tensor's bytes
    /// and writing the output tensor's.
    pub fn with_infer(mut self, infer: impl FnMut(&[u8], &mut [u8]) + Send + 'static) -> Self {
        self.infer = Some(Box::new(infer));
        self
    }

    /// Successful invocations so far.
    pub fn invocations(&self) -> usize {
        self.invocations
    }
}

impl GraphRuntime for ScriptedRuntime {
    fn allocate_tensors(
        &mut self,
        _model: &[u8],
        _info: &ModelInfo,
        _resolver: &OpResolver,
        arena: &mut Arena,
    ) -> Result<TensorLayout> {
        if self.fail_allocation {
            return Err(MicroliteError::AllocateTensors(
                "scripted allocation failure".to_string(),
            ));
        }

        let mut layout = TensorLayout::default();
        for spec in &self.inputs {
            layout.inputs.push(arena.alloc_tensor(spec)?);
        }
        if self.scratch_bytes > 0 {
            arena.alloc(self.scratch_bytes, 8)?;
        }
        for spec in &self.outputs {
            layout.outputs.push(arena.alloc_tensor(spec)?);
        }

        self.io = Some((
            layout.inputs[0].range.clone(),
            layout.outputs[0].range.clone(),
        ));
        Ok(layout)
    }

    fn invoke(&mut self, _model: &[u8], arena: &mut Arena) -> Result<()> {
        if self.fail_invocation {
            return Err(MicroliteError::InvokeFailed(
                "scripted invocation failure".to_string(),
            ));
        }
        let (input, output) = self
            .io
            .clone()
            .ok_or_else(|| MicroliteError::InvokeFailed("invoke before allocation".to_string()))?;

        if let Some(infer) = &mut self.infer {
            let input_bytes = arena.bytes(input).to_vec();
            infer(&input_bytes, arena.bytes_mut(output));
        }
        self.invocations += 1;
        Ok(())
    }
}

/// Reinterpret little-endian tensor bytes as f32 values.
pub fn f32s_from_bytes(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Write f32 values into tensor bytes, little-endian.
pub fn write_f32s(dst: &mut [u8], values: &[f32]) {
    for (chunk, value) in dst.chunks_exact_mut(4).zip(values) {
        chunk.copy_from_slice(&value.to_le_bytes());
    }
}

enum OpEntry {
    Builtin(i32),
    DeprecatedBuiltin(i8),
    Custom(String),
}

/// Emits a minimal, valid model blob: file identifier, root table with
/// schema version, operator codes, and optional description.
pub struct ModelBuilder {
    version: u32,
    identifier: [u8; 4],
    description: Option<String>,
    ops: Vec<OpEntry>,
}

impl ModelBuilder {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            identifier: *b"TFL3",
            description: None,
            ops: Vec::new(),
        }
    }

    /// Override the file identifier, for negative tests.
    pub fn identifier(mut self, identifier: [u8; 4]) -> Self {
        self.identifier = identifier;
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Reference a builtin operator by its numeric code.
    pub fn builtin(mut self, code: i32) -> Self {
        self.ops.push(OpEntry::Builtin(code));
        self
    }

    /// Reference a builtin operator through the pre-revision single-byte
    /// code field.
    pub fn deprecated_builtin(mut self, code: i8) -> Self {
        self.ops.push(OpEntry::DeprecatedBuiltin(code));
        self
    }

    pub fn custom(mut self, name: &str) -> Self {
        self.ops.push(OpEntry::Custom(name.to_string()));
        self
    }

    pub fn operator(self, op: BuiltinOp) -> Self {
        self.builtin(op.code())
    }

    pub fn build(&self) -> Vec<u8> {
        let has_desc = self.description.is_some();
        let model_vt_len: usize = if has_desc { 12 } else { 8 };
        let model_table_len: usize = if has_desc { 16 } else { 12 };

        let model_vt_pos = 8;
        let model_table_pos = model_vt_pos + model_vt_len;
        let desc_pos = model_table_pos + model_table_len;
        let desc_len = self
            .description
            .as_ref()
            .map(|d| padded_string_len(d))
            .unwrap_or(0);
        let vec_pos = desc_pos + desc_len;
        let ops_region = vec_pos + 4 + 4 * self.ops.len();

        // Each operator-code block: vtable, table, trailing string for
        // custom codes. Table position recorded for the vector slots.
        let mut op_table_positions = Vec::with_capacity(self.ops.len());
        let mut cursor = ops_region;
        for op in &self.ops {
            let (size, table_offset) = match op {
                OpEntry::Builtin(_) => (20, 12),
                OpEntry::DeprecatedBuiltin(_) => (16, 8),
                OpEntry::Custom(name) => (16 + padded_string_len(name), 8),
            };
            op_table_positions.push(cursor + table_offset);
            cursor += size;
        }
        let total = cursor;

        let mut buf = Vec::with_capacity(total);
        push_u32(&mut buf, model_table_pos as u32);
        buf.extend_from_slice(&self.identifier);

        // Model vtable: version at 4, operator_codes at 8, description at
        // 12 when present (subgraphs slot left empty).
        push_u16(&mut buf, model_vt_len as u16);
        push_u16(&mut buf, model_table_len as u16);
        push_u16(&mut buf, 4);
        push_u16(&mut buf, 8);
        if has_desc {
            push_u16(&mut buf, 0);
            push_u16(&mut buf, 12);
        }

        // Model table.
        push_i32(&mut buf, (model_table_pos - model_vt_pos) as i32);
        push_u32(&mut buf, self.version);
        push_u32(&mut buf, (vec_pos - (model_table_pos + 8)) as u32);
        if has_desc {
            push_u32(&mut buf, (desc_pos - (model_table_pos + 12)) as u32);
        }

        if let Some(desc) = &self.description {
            push_string(&mut buf, desc);
        }

        // operator_codes vector of forward offsets to the tables below.
        push_u32(&mut buf, self.ops.len() as u32);
        for (i, table_pos) in op_table_positions.iter().enumerate() {
            let slot_pos = vec_pos + 4 + 4 * i;
            push_u32(&mut buf, (table_pos - slot_pos) as u32);
        }

        for op in &self.ops {
            match op {
                OpEntry::Builtin(code) => {
                    // vtable covering fields through builtin_code at id 3.
                    push_u16(&mut buf, 12);
                    push_u16(&mut buf, 8);
                    push_u16(&mut buf, 0);
                    push_u16(&mut buf, 0);
                    push_u16(&mut buf, 0);
                    push_u16(&mut buf, 4);
                    push_i32(&mut buf, 12);
                    push_i32(&mut buf, *code);
                }
                OpEntry::DeprecatedBuiltin(code) => {
                    // vtable covering only the single-byte field at id 0,
                    // padded so the table stays 4-aligned.
                    push_u16(&mut buf, 6);
                    push_u16(&mut buf, 8);
                    push_u16(&mut buf, 4);
                    push_u16(&mut buf, 0);
                    push_i32(&mut buf, 8);
                    buf.push(*code as u8);
                    buf.extend_from_slice(&[0, 0, 0]);
                }
                OpEntry::Custom(name) => {
                    // vtable covering custom_code at id 1; the string sits
                    // right after the table.
                    push_u16(&mut buf, 8);
                    push_u16(&mut buf, 8);
                    push_u16(&mut buf, 0);
                    push_u16(&mut buf, 4);
                    push_i32(&mut buf, 8);
                    push_u32(&mut buf, 4);
                    push_string(&mut buf, name);
                }
            }
        }

        debug_assert_eq!(buf.len(), total);
        buf
    }
}

fn padded_string_len(s: &str) -> usize {
    // length prefix + bytes + nul terminator, padded to 4.
    (4 + s.len() + 1).next_multiple_of(4)
}

fn push_string(buf: &mut Vec<u8>, s: &str) {
    let start = buf.len();
    push_u32(buf, s.len() as u32);
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
    while (buf.len() - start) % 4 != 0 {
        buf.push(0);
    }
}

fn push_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn push_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn push_i32(buf: &mut Vec<u8>, value: i32) {
    buf.extend_from_slice(&value.to_le_bytes());
}
