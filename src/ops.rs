//! Operator identifiers and the operator resolver.
//!
//! The resolver is the table binding operator identifiers in the model
//! format to kernel implementations linked into the backend. Registering
//! only the operators a model actually uses keeps code size down on
//! constrained targets, so the table has a fixed capacity decided at the
//! setup call site.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::{MicroliteError, Result};

macro_rules! builtin_ops {
    ($( $variant:ident = $code:literal, $name:literal; )+) => {
        /// Builtin operator codes of the serialized model format.
        ///
        /// This is the subset commonly seen in models deployed to
        /// microcontrollers; codes outside it surface as
        /// [`Operator::Unknown`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
        pub enum BuiltinOp {
            $( #[strum(serialize = $name)] $variant, )+
        }

        impl BuiltinOp {
            /// Look up the operator for a builtin code from a model blob.
            pub fn from_code(code: i32) -> Option<Self> {
                match code {
                    $( $code => Some(Self::$variant), )+
                    _ => None,
                }
            }

            /// The numeric builtin code as stored in the model format.
            pub fn code(&self) -> i32 {
                match self {
                    $( Self::$variant => $code, )+
                }
            }
        }
    };
}

builtin_ops! {
    Add = 0, "ADD";
    AveragePool2D = 1, "AVERAGE_POOL_2D";
    Concatenation = 2, "CONCATENATION";
    Conv2D = 3, "CONV_2D";
    DepthwiseConv2D = 4, "DEPTHWISE_CONV_2D";
    Dequantize = 6, "DEQUANTIZE";
    FullyConnected = 9, "FULLY_CONNECTED";
    L2Normalization = 11, "L2_NORMALIZATION";
    Logistic = 14, "LOGISTIC";
    Lstm = 16, "LSTM";
    MaxPool2D = 17, "MAX_POOL_2D";
    Mul = 18, "MUL";
    Relu = 19, "RELU";
    Relu6 = 21, "RELU6";
    Reshape = 22, "RESHAPE";
    ResizeBilinear = 23, "RESIZE_BILINEAR";
    Softmax = 25, "SOFTMAX";
    Svdf = 27, "SVDF";
    Tanh = 28, "TANH";
    Pad = 34, "PAD";
    Gather = 36, "GATHER";
    Transpose = 39, "TRANSPOSE";
    Mean = 40, "MEAN";
    Sub = 41, "SUB";
    Div = 42, "DIV";
    Squeeze = 43, "SQUEEZE";
    UnidirectionalSequenceLstm = 44, "UNIDIRECTIONAL_SEQUENCE_LSTM";
    StridedSlice = 45, "STRIDED_SLICE";
    Exp = 47, "EXP";
    Split = 49, "SPLIT";
    Cast = 53, "CAST";
    Prelu = 54, "PRELU";
    Maximum = 55, "MAXIMUM";
    ArgMax = 56, "ARG_MAX";
    Minimum = 57, "MINIMUM";
    Slice = 65, "SLICE";
    TransposeConv = 67, "TRANSPOSE_CONV";
    ExpandDims = 70, "EXPAND_DIMS";
    Sum = 74, "SUM";
    Shape = 77, "SHAPE";
    Pack = 83, "PACK";
    Unpack = 88, "UNPACK";
    ResizeNearestNeighbor = 97, "RESIZE_NEAREST_NEIGHBOR";
    LeakyRelu = 98, "LEAKY_RELU";
    Abs = 101, "ABS";
    SplitV = 102, "SPLIT_V";
    AddN = 106, "ADD_N";
    Quantize = 114, "QUANTIZE";
    HardSwish = 117, "HARD_SWISH";
    BatchMatmul = 126, "BATCH_MATMUL";
}

/// An operator referenced by a model or registered in a resolver.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operator {
    Builtin(BuiltinOp),
    /// Custom operator carried by name in the model blob.
    Custom(String),
    /// Builtin code this harness has no name for.
    Unknown(i32),
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin(op) => write!(f, "{op}"),
            Self::Custom(name) => write!(f, "{name}"),
            Self::Unknown(code) => write!(f, "UNKNOWN({code})"),
        }
    }
}

impl Serialize for Operator {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Format an operator name the way the micro runtime's registration API
/// spells it: `CONV_2D` becomes `AddConv2D`.
pub fn registration_name(op_name: &str) -> String {
    // Edge case for AddDetectionPostprocess():
    // the custom code is TFLite_Detection_PostProcess.
    let cleaned = op_name.replace("TFLite", "");

    let mut formatted = String::from("Add");
    for part in cleaned.split(['_', '-']) {
        let Some(first) = part.chars().next() else {
            continue;
        };
        if part.chars().count() > 1 && first.is_ascii_alphabetic() {
            let (head, tail) = part.split_at(first.len_utf8());
            formatted.push_str(&head.to_ascii_uppercase());
            formatted.push_str(&tail.to_ascii_lowercase());
        } else {
            formatted.push_str(&part.to_ascii_uppercase());
        }
    }

    formatted = formatted.replace("Lstm", "LSTM");
    formatted.replace("BatchMatmul", "BatchMatMul")
}

impl BuiltinOp {
    /// The registration method name for this operator, `AddConv2D` style.
    pub fn registration_name(&self) -> String {
        registration_name(&self.to_string())
    }
}

/// Fixed-capacity table of the operators a model needs.
///
/// Mirrors the mutable resolver of the micro runtime: capacity is fixed up
/// front and registering past it is an error rather than a reallocation.
#[derive(Debug, Clone)]
pub struct OpResolver {
    capacity: usize,
    ops: Vec<Operator>,
}

impl OpResolver {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ops: Vec::with_capacity(capacity),
        }
    }

    /// Register an operator. Fails when the table is full or the operator
    /// was already registered.
    pub fn register(&mut self, op: Operator) -> Result<()> {
        if self.ops.contains(&op) {
            return Err(MicroliteError::Resolver(format!(
                "operator {op} registered twice"
            )));
        }
        if self.ops.len() == self.capacity {
            return Err(MicroliteError::Resolver(format!(
                "resolver capacity of {} operators exceeded while registering {op}",
                self.capacity
            )));
        }
        self.ops.push(op);
        Ok(())
    }

    pub fn register_builtin(&mut self, op: BuiltinOp) -> Result<()> {
        self.register(Operator::Builtin(op))
    }

    pub fn register_custom(&mut self, name: impl Into<String>) -> Result<()> {
        self.register(Operator::Custom(name.into()))
    }

    pub fn contains(&self, op: &Operator) -> bool {
        self.ops.contains(op)
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operator> {
        self.ops.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_names_match_runtime_spelling() {
        assert_eq!(registration_name("CONV_2D"), "AddConv2D");
        assert_eq!(registration_name("FULLY_CONNECTED"), "AddFullyConnected");
        assert_eq!(registration_name("RELU6"), "AddRelu6");
        assert_eq!(
            registration_name("UNIDIRECTIONAL_SEQUENCE_LSTM"),
            "AddUnidirectionalSequenceLSTM"
        );
        assert_eq!(registration_name("BATCH_MATMUL"), "AddBatchMatMul");
        assert_eq!(
            registration_name("TFLite_Detection_PostProcess"),
            "AddDetectionPostprocess"
        );
    }

    #[test]
    fn builtin_codes_round_trip() {
        for op in [BuiltinOp::Conv2D, BuiltinOp::FullyConnected, BuiltinOp::Softmax] {
            assert_eq!(BuiltinOp::from_code(op.code()), Some(op));
        }
        assert_eq!(BuiltinOp::from_code(3), Some(BuiltinOp::Conv2D));
        assert_eq!(BuiltinOp::from_code(9999), None);
    }

    #[test]
    fn resolver_rejects_overflow_and_duplicates() {
        let mut resolver = OpResolver::with_capacity(1);
        resolver.register_builtin(BuiltinOp::Softmax).unwrap();

        let duplicate = resolver.register_builtin(BuiltinOp::Softmax);
        assert!(matches!(duplicate, Err(MicroliteError::Resolver(_))));

        let overflow = resolver.register_builtin(BuiltinOp::Relu);
        assert!(matches!(overflow, Err(MicroliteError::Resolver(_))));

        assert_eq!(resolver.len(), 1);
        assert!(resolver.contains(&Operator::Builtin(BuiltinOp::Softmax)));
    }
}
