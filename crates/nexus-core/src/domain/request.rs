//! Operation requests and their outputs.
//!
//! Requests carry operation names as strings, exactly as the binding layer
//! receives them. Parsing into typed operations happens inside the module
//! that executes the task, so an unknown name becomes a failed task with a
//! recorded metric sample instead of an admission error.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which operation module a request is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Binary,
    Matrix,
    Quantum,
    Hash,
    Plugin,
}

impl OperationKind {
    /// All kinds, in dispatch-table order.
    pub const ALL: [OperationKind; 5] = [
        OperationKind::Binary,
        OperationKind::Matrix,
        OperationKind::Quantum,
        OperationKind::Hash,
        OperationKind::Plugin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Binary => "binary",
            OperationKind::Matrix => "matrix",
            OperationKind::Quantum => "quantum",
            OperationKind::Hash => "hash",
            OperationKind::Plugin => "plugin",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compute request submitted to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationRequest {
    /// 64-bit bitwise operation. `b` defaults to 0 when absent.
    Binary {
        op: String,
        a: u64,
        #[serde(default)]
        b: Option<u64>,
    },
    /// Element-wise operation over 64-bit word vectors (`xor`, `and`, `or`,
    /// `not`, `batch_xor`). Served by the binary module.
    BitVector {
        op: String,
        a: Vec<u64>,
        #[serde(default)]
        b: Vec<u64>,
    },
    /// Matrix generator (`zeros`, `ones`, `identity`, `random`).
    Matrix { op: String, rows: usize, cols: usize },
    /// Arithmetic on caller-supplied row-major matrices (`add`, `subtract`,
    /// `multiply`, `element_wise`, `scalar`, `transpose`, `determinant`,
    /// `inverse`, `statistics`). Served by the matrix module.
    MatrixCompute {
        op: String,
        a: Vec<Vec<f64>>,
        #[serde(default)]
        b: Option<Vec<Vec<f64>>>,
        #[serde(default)]
        scalar: Option<f64>,
    },
    /// State-vector simulation over `qubits` qubits.
    Quantum {
        op: String,
        qubits: u32,
        #[serde(default)]
        qubit_index: Option<u32>,
    },
    /// Content hash of `payload`.
    Hash { algo: String, payload: Vec<u8> },
    /// Invocation of a registered plugin.
    Plugin {
        name: String,
        #[serde(default)]
        payload: serde_json::Value,
    },
}

impl OperationRequest {
    pub fn binary(op: impl Into<String>, a: u64, b: Option<u64>) -> Self {
        Self::Binary { op: op.into(), a, b }
    }

    pub fn bit_vector(op: impl Into<String>, a: Vec<u64>, b: Vec<u64>) -> Self {
        Self::BitVector { op: op.into(), a, b }
    }

    /// Unary matrix request (`transpose`, `determinant`, `inverse`,
    /// `statistics`).
    pub fn matrix_unary(op: impl Into<String>, a: Vec<Vec<f64>>) -> Self {
        Self::MatrixCompute {
            op: op.into(),
            a,
            b: None,
            scalar: None,
        }
    }

    pub fn matrix_binary(op: impl Into<String>, a: Vec<Vec<f64>>, b: Vec<Vec<f64>>) -> Self {
        Self::MatrixCompute {
            op: op.into(),
            a,
            b: Some(b),
            scalar: None,
        }
    }

    pub fn matrix_scale(a: Vec<Vec<f64>>, scalar: f64) -> Self {
        Self::MatrixCompute {
            op: "scalar".to_string(),
            a,
            b: None,
            scalar: Some(scalar),
        }
    }

    pub fn matrix(op: impl Into<String>, rows: usize, cols: usize) -> Self {
        Self::Matrix {
            op: op.into(),
            rows,
            cols,
        }
    }

    pub fn quantum(op: impl Into<String>, qubits: u32, qubit_index: Option<u32>) -> Self {
        Self::Quantum {
            op: op.into(),
            qubits,
            qubit_index,
        }
    }

    pub fn hash(algo: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self::Hash {
            algo: algo.into(),
            payload: payload.into(),
        }
    }

    pub fn plugin(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::Plugin {
            name: name.into(),
            payload,
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Binary { .. } | Self::BitVector { .. } => OperationKind::Binary,
            Self::Matrix { .. } | Self::MatrixCompute { .. } => OperationKind::Matrix,
            Self::Quantum { .. } => OperationKind::Quantum,
            Self::Hash { .. } => OperationKind::Hash,
            Self::Plugin { .. } => OperationKind::Plugin,
        }
    }

    /// Operation (or plugin) name, used in log fields.
    pub fn op_name(&self) -> &str {
        match self {
            Self::Binary { op, .. }
            | Self::BitVector { op, .. }
            | Self::Matrix { op, .. }
            | Self::MatrixCompute { op, .. }
            | Self::Quantum { op, .. } => op,
            Self::Hash { algo, .. } => algo,
            Self::Plugin { name, .. } => name,
        }
    }
}

/// Result of a bitwise operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryOutput {
    pub value: u64,
    /// Zero-padded 64-character rendering of `value`.
    pub binary: String,
}

/// Shape and sample of a generated matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixSummary {
    pub operation: String,
    pub rows: usize,
    pub cols: usize,
    /// Top-left corner, at most 3x3.
    pub sample: Vec<Vec<f64>>,
    pub sum: f64,
    /// Present for square matrices only.
    pub trace: Option<f64>,
}

/// Descriptive statistics over every element of a matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatrixStats {
    pub sum: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Population standard deviation.
    pub stddev: f64,
}

/// Result of a [`OperationRequest::MatrixCompute`]. Exactly one of
/// `matrix`, `value` and `stats` is set, depending on the operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixResult {
    pub operation: String,
    pub matrix: Option<Vec<Vec<f64>>>,
    /// Determinant.
    pub value: Option<f64>,
    pub stats: Option<MatrixStats>,
}

/// Per-qubit measurement probabilities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QubitProbability {
    pub qubit: u32,
    pub p0: f64,
    pub p1: f64,
}

/// Result of a quantum simulation task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantumOutput {
    pub operation: String,
    pub qubits: u32,
    pub probabilities: Vec<QubitProbability>,
    pub norm: f64,
    /// Outcome of a `measure` operation.
    pub measurement: Option<u8>,
    /// Meyer-Wallach entanglement in `[0, 1]`, for `bell` and `entanglement`.
    #[serde(default)]
    pub entanglement: Option<f64>,
}

/// Hex digest of a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashOutput {
    pub algorithm: String,
    pub hex: String,
    pub bytes_hashed: usize,
}

/// Output payload, matching the request kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum OperationOutput {
    Binary(BinaryOutput),
    BitVector(Vec<u64>),
    Matrix(MatrixSummary),
    MatrixResult(MatrixResult),
    Quantum(QuantumOutput),
    Hash(HashOutput),
    Plugin(serde_json::Value),
}

impl OperationOutput {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Binary(_) | Self::BitVector(_) => OperationKind::Binary,
            Self::Matrix(_) | Self::MatrixResult(_) => OperationKind::Matrix,
            Self::Quantum(_) => OperationKind::Quantum,
            Self::Hash(_) => OperationKind::Hash,
            Self::Plugin(_) => OperationKind::Plugin,
        }
    }
}
