//! 64-bit bitwise operations, on single words and on word vectors.

use std::str::FromStr;

use crate::domain::{BinaryOutput, OperationOutput, OperationRequest};
use crate::error::OperationError;
use crate::ports::{ExecutionContext, OperationModule};

/// Bit width of every operand and result.
pub const WIDTH: u32 = u64::BITS;

/// Supported bitwise operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Xor,
    And,
    Or,
    /// Complement of `a`; `b` is ignored.
    Not,
    /// `a << b`, zero when `b >= 64`.
    Shl,
    /// `a >> b`, zero when `b >= 64`.
    Shr,
    /// Rotate left by `b mod 64`.
    Rotl,
    /// Rotate right by `b mod 64`.
    Rotr,
    /// Number of set bits in `a`.
    Popcount,
    /// Number of differing bits between `a` and `b`.
    Hamming,
    /// Leading zero bits of `a`; 64 for zero.
    LeadingZeros,
    /// Trailing zero bits of `a`; 64 for zero.
    TrailingZeros,
}

impl FromStr for BinaryOp {
    type Err = OperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xor" => Ok(BinaryOp::Xor),
            "and" => Ok(BinaryOp::And),
            "or" => Ok(BinaryOp::Or),
            "not" => Ok(BinaryOp::Not),
            "shl" | "shift_left" => Ok(BinaryOp::Shl),
            "shr" | "shift_right" => Ok(BinaryOp::Shr),
            "rotl" | "rotate_left" => Ok(BinaryOp::Rotl),
            "rotr" | "rotate_right" => Ok(BinaryOp::Rotr),
            "popcount" => Ok(BinaryOp::Popcount),
            "hamming" | "hamming_distance" => Ok(BinaryOp::Hamming),
            "leading_zeros" | "clz" => Ok(BinaryOp::LeadingZeros),
            "trailing_zeros" | "ctz" => Ok(BinaryOp::TrailingZeros),
            other => Err(OperationError::InvalidRequest(format!(
                "unknown binary operation '{}'",
                other
            ))),
        }
    }
}

impl BinaryOp {
    pub fn apply(self, a: u64, b: u64) -> u64 {
        match self {
            BinaryOp::Xor => a ^ b,
            BinaryOp::And => a & b,
            BinaryOp::Or => a | b,
            BinaryOp::Not => !a,
            BinaryOp::Shl => u32::try_from(b)
                .ok()
                .and_then(|bits| a.checked_shl(bits))
                .unwrap_or(0),
            BinaryOp::Shr => u32::try_from(b)
                .ok()
                .and_then(|bits| a.checked_shr(bits))
                .unwrap_or(0),
            BinaryOp::Rotl => a.rotate_left((b % WIDTH as u64) as u32),
            BinaryOp::Rotr => a.rotate_right((b % WIDTH as u64) as u32),
            BinaryOp::Popcount => a.count_ones() as u64,
            BinaryOp::Hamming => (a ^ b).count_ones() as u64,
            BinaryOp::LeadingZeros => a.leading_zeros() as u64,
            BinaryOp::TrailingZeros => a.trailing_zeros() as u64,
        }
    }
}

/// Element-wise operations over word vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitVectorOp {
    /// Truncates to the shorter input.
    Xor,
    /// Truncates to the shorter input.
    And,
    /// Pads the shorter input with zero words.
    Or,
    /// Complement of `a`; `b` is ignored.
    Not,
}

impl FromStr for BitVectorOp {
    type Err = OperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xor" | "vector_xor" | "batch_xor" => Ok(BitVectorOp::Xor),
            "and" | "vector_and" => Ok(BitVectorOp::And),
            "or" | "vector_or" => Ok(BitVectorOp::Or),
            "not" | "vector_not" => Ok(BitVectorOp::Not),
            other => Err(OperationError::InvalidRequest(format!(
                "unknown bit-vector operation '{}'",
                other
            ))),
        }
    }
}

impl BitVectorOp {
    pub fn apply(self, a: &[u64], b: &[u64]) -> Vec<u64> {
        match self {
            BitVectorOp::Xor => a.iter().zip(b).map(|(x, y)| x ^ y).collect(),
            BitVectorOp::And => a.iter().zip(b).map(|(x, y)| x & y).collect(),
            BitVectorOp::Or => (0..a.len().max(b.len()))
                .map(|i| a.get(i).copied().unwrap_or(0) | b.get(i).copied().unwrap_or(0))
                .collect(),
            BitVectorOp::Not => a.iter().map(|x| !x).collect(),
        }
    }
}

/// Zero-padded binary rendering at full width.
pub fn to_binary_string(value: u64) -> String {
    format!("{:064b}", value)
}

/// Parse a binary string of at most 64 digits.
pub fn from_binary_string(binary: &str) -> Result<u64, OperationError> {
    if binary.is_empty() || binary.len() > WIDTH as usize {
        return Err(OperationError::InvalidRequest(format!(
            "binary string must have 1-{} digits, got {}",
            WIDTH,
            binary.len()
        )));
    }
    u64::from_str_radix(binary, 2)
        .map_err(|e| OperationError::InvalidRequest(format!("invalid binary string: {}", e)))
}

/// Built-in module for [`OperationRequest::Binary`].
#[derive(Debug, Default)]
pub struct BinaryModule;

impl OperationModule for BinaryModule {
    fn name(&self) -> &str {
        "binary"
    }

    fn execute(
        &self,
        request: &OperationRequest,
        _ctx: &ExecutionContext<'_>,
    ) -> Result<OperationOutput, OperationError> {
        match request {
            OperationRequest::Binary { op, a, b } => {
                let value = op.parse::<BinaryOp>()?.apply(*a, b.unwrap_or(0));
                Ok(OperationOutput::Binary(BinaryOutput {
                    value,
                    binary: to_binary_string(value),
                }))
            }
            OperationRequest::BitVector { op, a, b } => {
                let op: BitVectorOp = op.parse()?;
                Ok(OperationOutput::BitVector(op.apply(a, b)))
            }
            other => Err(OperationError::InvalidRequest(format!(
                "binary module cannot execute {} requests",
                other.kind()
            ))),
        }
    }
}
