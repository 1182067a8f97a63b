//! Matrix generators and arithmetic.
//!
//! Generator requests stream the matrix one row at a time through a pooled
//! scratch buffer and return a [`MatrixSummary`] (shape, top-left sample,
//! sum, trace). Arithmetic requests carry their operands and return a full
//! [`MatrixResult`]. Callers that want to work on matrices directly use
//! [`Matrix`].

use rand::Rng;
use std::str::FromStr;

use crate::domain::{MatrixResult, MatrixStats, MatrixSummary, OperationOutput, OperationRequest};
use crate::error::OperationError;
use crate::ports::{ExecutionContext, OperationModule};

/// Largest accepted row or column count.
pub const MAX_DIMENSION: usize = 10_000;

/// Pivots smaller than this count as zero.
const SINGULAR_EPSILON: f64 = 1e-10;

/// Rows and columns reported in the summary sample.
const SAMPLE_DIM: usize = 3;

/// Element count above which rows are generated on the rayon pool.
#[cfg(feature = "parallel")]
const PARALLEL_THRESHOLD: usize = 1 << 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixOp {
    Zeros,
    Ones,
    /// Square only.
    Identity,
    /// Uniform in `[0, 1)`.
    Random,
}

impl FromStr for MatrixOp {
    type Err = OperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "zeros" => Ok(MatrixOp::Zeros),
            "ones" => Ok(MatrixOp::Ones),
            "identity" | "eye" => Ok(MatrixOp::Identity),
            "random" | "rand" => Ok(MatrixOp::Random),
            other => Err(OperationError::InvalidRequest(format!(
                "unknown matrix operation '{}'",
                other
            ))),
        }
    }
}

impl MatrixOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatrixOp::Zeros => "zeros",
            MatrixOp::Ones => "ones",
            MatrixOp::Identity => "identity",
            MatrixOp::Random => "random",
        }
    }

    /// Validate a requested shape for this generator.
    pub fn check_shape(&self, rows: usize, cols: usize) -> Result<(), OperationError> {
        for (axis, n) in [("rows", rows), ("cols", cols)] {
            if n == 0 || n > MAX_DIMENSION {
                return Err(OperationError::InvalidRequest(format!(
                    "{} must be between 1 and {}, got {}",
                    axis, MAX_DIMENSION, n
                )));
            }
        }
        if *self == MatrixOp::Identity && rows != cols {
            return Err(OperationError::InvalidShape { rows, cols });
        }
        Ok(())
    }

    fn fill_row<R: Rng>(&self, row_index: usize, row: &mut [f64], rng: &mut R) {
        match self {
            MatrixOp::Zeros => row.fill(0.0),
            MatrixOp::Ones => row.fill(1.0),
            MatrixOp::Identity => {
                row.fill(0.0);
                if let Some(diagonal) = row.get_mut(row_index) {
                    *diagonal = 1.0;
                }
            }
            MatrixOp::Random => row.iter_mut().for_each(|v| *v = rng.gen::<f64>()),
        }
    }
}

/// Operations accepted in [`OperationRequest::MatrixCompute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixArithmetic {
    Add,
    Subtract,
    /// Matrix product `a · b`.
    Multiply,
    /// Hadamard product.
    ElementWise,
    /// `a` times the request's scalar.
    Scalar,
    Transpose,
    Determinant,
    Inverse,
    Statistics,
}

impl FromStr for MatrixArithmetic {
    type Err = OperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "add" => Ok(MatrixArithmetic::Add),
            "subtract" | "sub" => Ok(MatrixArithmetic::Subtract),
            "multiply" | "matmul" => Ok(MatrixArithmetic::Multiply),
            "element_wise" | "element_wise_multiply" | "hadamard" => {
                Ok(MatrixArithmetic::ElementWise)
            }
            "scalar" | "scalar_multiply" | "scale" => Ok(MatrixArithmetic::Scalar),
            "transpose" => Ok(MatrixArithmetic::Transpose),
            "determinant" | "det" => Ok(MatrixArithmetic::Determinant),
            "inverse" | "inv" => Ok(MatrixArithmetic::Inverse),
            "statistics" | "stats" => Ok(MatrixArithmetic::Statistics),
            other => Err(OperationError::InvalidRequest(format!(
                "unknown matrix operation '{}'",
                other
            ))),
        }
    }
}

impl MatrixArithmetic {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatrixArithmetic::Add => "add",
            MatrixArithmetic::Subtract => "subtract",
            MatrixArithmetic::Multiply => "multiply",
            MatrixArithmetic::ElementWise => "element_wise",
            MatrixArithmetic::Scalar => "scalar",
            MatrixArithmetic::Transpose => "transpose",
            MatrixArithmetic::Determinant => "determinant",
            MatrixArithmetic::Inverse => "inverse",
            MatrixArithmetic::Statistics => "statistics",
        }
    }

    /// Run against owned operands.
    pub fn apply(
        &self,
        a: &Matrix,
        b: Option<&Matrix>,
        scalar: Option<f64>,
        ctx: &ExecutionContext<'_>,
    ) -> Result<MatrixResult, OperationError> {
        let second = || {
            b.ok_or_else(|| {
                OperationError::InvalidRequest(format!("{} needs a second matrix", self.as_str()))
            })
        };

        let mut result = MatrixResult {
            operation: self.as_str().to_string(),
            matrix: None,
            value: None,
            stats: None,
        };
        match self {
            MatrixArithmetic::Add => result.matrix = Some(a.add(second()?)?.to_rows()),
            MatrixArithmetic::Subtract => result.matrix = Some(a.subtract(second()?)?.to_rows()),
            MatrixArithmetic::Multiply => {
                result.matrix = Some(a.multiply_with(second()?, || ctx.check_deadline())?.to_rows())
            }
            MatrixArithmetic::ElementWise => {
                result.matrix = Some(a.element_wise(second()?)?.to_rows())
            }
            MatrixArithmetic::Scalar => {
                let factor = scalar.ok_or_else(|| {
                    OperationError::InvalidRequest("scalar needs a scalar factor".to_string())
                })?;
                result.matrix = Some(a.scale(factor).to_rows())
            }
            MatrixArithmetic::Transpose => result.matrix = Some(a.transpose().to_rows()),
            MatrixArithmetic::Determinant => result.value = Some(a.determinant()?),
            MatrixArithmetic::Inverse => {
                result.matrix = Some(a.inverse_with(|| ctx.check_deadline())?.to_rows())
            }
            MatrixArithmetic::Statistics => result.stats = Some(a.statistics()),
        }
        Ok(result)
    }
}

/// Dense row-major matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Generate a matrix, validating the shape first.
    pub fn generate<R: Rng>(
        op: MatrixOp,
        rows: usize,
        cols: usize,
        rng: &mut R,
    ) -> Result<Self, OperationError> {
        op.check_shape(rows, cols)?;

        let len = rows * cols;
        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|e| {
            OperationError::ResourceExhausted(format!("{}x{} matrix: {}", rows, cols, e))
        })?;
        data.resize(len, 0.0);

        for (r, row) in data.chunks_mut(cols).enumerate() {
            op.fill_row(r, row, rng);
        }

        Ok(Self { rows, cols, data })
    }

    pub fn zeros(rows: usize, cols: usize) -> Result<Self, OperationError> {
        Self::generate(MatrixOp::Zeros, rows, cols, &mut rand::thread_rng())
    }

    pub fn ones(rows: usize, cols: usize) -> Result<Self, OperationError> {
        Self::generate(MatrixOp::Ones, rows, cols, &mut rand::thread_rng())
    }

    pub fn identity(n: usize) -> Result<Self, OperationError> {
        Self::generate(MatrixOp::Identity, n, n, &mut rand::thread_rng())
    }

    pub fn random(rows: usize, cols: usize) -> Result<Self, OperationError> {
        Self::generate(MatrixOp::Random, rows, cols, &mut rand::thread_rng())
    }

    /// Build from rows of equal, non-zero length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, OperationError> {
        let cols = rows.first().map_or(0, Vec::len);
        if rows.is_empty() || cols == 0 {
            return Err(OperationError::InvalidRequest(
                "matrix must have at least one row and one column".to_string(),
            ));
        }
        if rows.len() > MAX_DIMENSION || cols > MAX_DIMENSION {
            return Err(OperationError::InvalidRequest(format!(
                "matrix dimensions must not exceed {}, got {}x{}",
                MAX_DIMENSION,
                rows.len(),
                cols
            )));
        }
        if let Some(ragged) = rows.iter().position(|row| row.len() != cols) {
            return Err(OperationError::InvalidRequest(format!(
                "row {} has {} columns, expected {}",
                ragged,
                rows[ragged].len(),
                cols
            )));
        }

        Ok(Self {
            rows: rows.len(),
            cols,
            data: rows.concat(),
        })
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.data.chunks(self.cols).map(<[f64]>::to_vec).collect()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.data.get(row * self.cols + col).copied()
    }

    pub fn row(&self, row: usize) -> Option<&[f64]> {
        self.data.chunks(self.cols).nth(row)
    }

    pub fn transpose(&self) -> Self {
        let mut data = vec![0.0; self.data.len()];
        for (r, row) in self.data.chunks(self.cols).enumerate() {
            for (c, value) in row.iter().enumerate() {
                data[c * self.rows + r] = *value;
            }
        }
        Self {
            rows: self.cols,
            cols: self.rows,
            data,
        }
    }

    /// Sum of the diagonal; `None` for non-square matrices.
    pub fn trace(&self) -> Option<f64> {
        if self.rows != self.cols {
            return None;
        }
        Some((0..self.rows).map(|i| self.data[i * self.cols + i]).sum())
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    fn check_same_shape(&self, other: &Matrix) -> Result<(), OperationError> {
        if (self.rows, self.cols) != (other.rows, other.cols) {
            return Err(OperationError::InvalidRequest(format!(
                "shape mismatch: {}x{} and {}x{}",
                self.rows, self.cols, other.rows, other.cols
            )));
        }
        Ok(())
    }

    fn zip_with(&self, other: &Matrix, f: impl Fn(f64, f64) -> f64) -> Result<Self, OperationError> {
        self.check_same_shape(other)?;
        Ok(Self {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().zip(&other.data).map(|(x, y)| f(*x, *y)).collect(),
        })
    }

    pub fn add(&self, other: &Matrix) -> Result<Self, OperationError> {
        self.zip_with(other, |x, y| x + y)
    }

    pub fn subtract(&self, other: &Matrix) -> Result<Self, OperationError> {
        self.zip_with(other, |x, y| x - y)
    }

    /// Hadamard (element-wise) product.
    pub fn element_wise(&self, other: &Matrix) -> Result<Self, OperationError> {
        self.zip_with(other, |x, y| x * y)
    }

    pub fn scale(&self, factor: f64) -> Self {
        Self {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|x| x * factor).collect(),
        }
    }

    /// Matrix product. Columns of `self` must equal rows of `other`.
    pub fn multiply(&self, other: &Matrix) -> Result<Self, OperationError> {
        self.multiply_with(other, || Ok(()))
    }

    fn multiply_with<C>(&self, other: &Matrix, check: C) -> Result<Self, OperationError>
    where
        C: Fn() -> Result<(), OperationError>,
    {
        if self.cols != other.rows {
            return Err(OperationError::InvalidRequest(format!(
                "cannot multiply {}x{} by {}x{}",
                self.rows, self.cols, other.rows, other.cols
            )));
        }

        let mut data = vec![0.0; self.rows * other.cols];
        for (row, out) in self.data.chunks(self.cols).zip(data.chunks_mut(other.cols)) {
            check()?;
            // i-k-j order walks `other` row by row
            for (k, a) in row.iter().enumerate() {
                let b_row = &other.data[k * other.cols..(k + 1) * other.cols];
                out.iter_mut().zip(b_row).for_each(|(o, b)| *o += a * b);
            }
        }
        Ok(Self {
            rows: self.rows,
            cols: other.cols,
            data,
        })
    }

    /// Determinant by Gaussian elimination with partial pivoting.
    pub fn determinant(&self) -> Result<f64, OperationError> {
        if !self.is_square() {
            return Err(OperationError::InvalidShape {
                rows: self.rows,
                cols: self.cols,
            });
        }

        let n = self.rows;
        let mut m = self.data.clone();
        let mut det = 1.0;
        for i in 0..n {
            let pivot = (i..n)
                .max_by(|x, y| m[x * n + i].abs().total_cmp(&m[y * n + i].abs()))
                .unwrap_or(i);
            if m[pivot * n + i].abs() < SINGULAR_EPSILON {
                return Ok(0.0);
            }
            if pivot != i {
                swap_rows(&mut m, n, i, pivot);
                det = -det;
            }
            det *= m[i * n + i];
            for k in i + 1..n {
                let factor = m[k * n + i] / m[i * n + i];
                for j in i..n {
                    m[k * n + j] -= factor * m[i * n + j];
                }
            }
        }
        Ok(det)
    }

    /// Inverse by Gauss-Jordan elimination. Singular matrices are rejected.
    pub fn inverse(&self) -> Result<Self, OperationError> {
        self.inverse_with(|| Ok(()))
    }

    fn inverse_with<C>(&self, check: C) -> Result<Self, OperationError>
    where
        C: Fn() -> Result<(), OperationError>,
    {
        if !self.is_square() {
            return Err(OperationError::InvalidShape {
                rows: self.rows,
                cols: self.cols,
            });
        }

        let n = self.rows;
        let width = 2 * n;
        let mut aug = vec![0.0; n * width];
        for (i, row) in self.data.chunks(n).enumerate() {
            aug[i * width..i * width + n].copy_from_slice(row);
            aug[i * width + n + i] = 1.0;
        }

        for i in 0..n {
            check()?;
            let pivot = (i..n)
                .max_by(|x, y| aug[x * width + i].abs().total_cmp(&aug[y * width + i].abs()))
                .unwrap_or(i);
            if aug[pivot * width + i].abs() < SINGULAR_EPSILON {
                return Err(OperationError::InvalidRequest(
                    "matrix is singular".to_string(),
                ));
            }
            swap_rows(&mut aug, width, i, pivot);

            let pivot_value = aug[i * width + i];
            aug[i * width..(i + 1) * width]
                .iter_mut()
                .for_each(|v| *v /= pivot_value);

            for k in (0..n).filter(|k| *k != i) {
                let factor = aug[k * width + i];
                if factor == 0.0 {
                    continue;
                }
                for j in 0..width {
                    aug[k * width + j] -= factor * aug[i * width + j];
                }
            }
        }

        let data = aug
            .chunks(width)
            .flat_map(|row| row[n..].iter().copied())
            .collect();
        Ok(Self {
            rows: n,
            cols: n,
            data,
        })
    }

    /// Sum, mean, extrema and population standard deviation.
    pub fn statistics(&self) -> MatrixStats {
        let count = self.data.len() as f64;
        let sum = self.sum();
        let mean = sum / count;
        let (min, max) = self
            .data
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
        let variance = self.data.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count;
        MatrixStats {
            sum,
            mean,
            min,
            max,
            stddev: variance.sqrt(),
        }
    }
}

fn swap_rows(data: &mut [f64], width: usize, a: usize, b: usize) {
    if a == b {
        return;
    }
    let (low, high) = (a.min(b), a.max(b));
    let (head, tail) = data.split_at_mut(high * width);
    head[low * width..(low + 1) * width].swap_with_slice(&mut tail[..width]);
}

/// Running totals over generated rows. Merging keeps row order, so the
/// sample always holds the first rows.
#[derive(Debug, Default)]
struct RowAccumulator {
    sum: f64,
    trace: f64,
    sample: Vec<Vec<f64>>,
}

impl RowAccumulator {
    fn from_row(row_index: usize, row: &[f64]) -> Self {
        let sample = if row_index < SAMPLE_DIM {
            vec![row.iter().take(SAMPLE_DIM).copied().collect()]
        } else {
            Vec::new()
        };
        Self {
            sum: row.iter().sum(),
            trace: row.get(row_index).copied().unwrap_or(0.0),
            sample,
        }
    }

    fn merge(mut self, other: Self) -> Self {
        self.sum += other.sum;
        self.trace += other.trace;
        let room = SAMPLE_DIM.saturating_sub(self.sample.len());
        self.sample.extend(other.sample.into_iter().take(room));
        self
    }
}

/// Built-in module for [`OperationRequest::Matrix`].
#[derive(Debug, Default)]
pub struct MatrixModule;

impl MatrixModule {
    fn accumulate_sequential(
        op: MatrixOp,
        rows: usize,
        cols: usize,
        ctx: &ExecutionContext<'_>,
    ) -> Result<RowAccumulator, OperationError> {
        let mut rng = rand::thread_rng();
        let mut row = ctx.buffers.floats.acquire(cols);
        let mut acc = RowAccumulator::default();

        for r in 0..rows {
            ctx.check_deadline()?;
            op.fill_row(r, &mut row, &mut rng);
            acc = acc.merge(RowAccumulator::from_row(r, &row));
        }
        Ok(acc)
    }

    #[cfg(feature = "parallel")]
    fn accumulate_parallel(
        op: MatrixOp,
        rows: usize,
        cols: usize,
        ctx: &ExecutionContext<'_>,
    ) -> Result<RowAccumulator, OperationError> {
        use rayon::prelude::*;

        (0..rows)
            .into_par_iter()
            .map(|r| {
                ctx.check_deadline()?;
                let mut row = ctx.buffers.floats.acquire(cols);
                op.fill_row(r, &mut row, &mut rand::thread_rng());
                Ok(RowAccumulator::from_row(r, &row))
            })
            .try_reduce(RowAccumulator::default, |a, b| Ok(a.merge(b)))
    }
}

impl OperationModule for MatrixModule {
    fn name(&self) -> &str {
        "matrix"
    }

    fn execute(
        &self,
        request: &OperationRequest,
        ctx: &ExecutionContext<'_>,
    ) -> Result<OperationOutput, OperationError> {
        let (op, rows, cols) = match request {
            OperationRequest::Matrix { op, rows, cols } => (op, rows, cols),
            OperationRequest::MatrixCompute { op, a, b, scalar } => {
                let op: MatrixArithmetic = op.parse()?;
                let a = Matrix::from_rows(a)?;
                let b = b.as_deref().map(Matrix::from_rows).transpose()?;
                ctx.check_deadline()?;
                let result = op.apply(&a, b.as_ref(), *scalar, ctx)?;
                return Ok(OperationOutput::MatrixResult(result));
            }
            other => {
                return Err(OperationError::InvalidRequest(format!(
                    "matrix module cannot execute {} requests",
                    other.kind()
                )))
            }
        };
        let (rows, cols) = (*rows, *cols);
        let op: MatrixOp = op.parse()?;
        op.check_shape(rows, cols)?;

        #[cfg(feature = "parallel")]
        let acc = if rows * cols >= PARALLEL_THRESHOLD {
            Self::accumulate_parallel(op, rows, cols, ctx)?
        } else {
            Self::accumulate_sequential(op, rows, cols, ctx)?
        };
        #[cfg(not(feature = "parallel"))]
        let acc = Self::accumulate_sequential(op, rows, cols, ctx)?;

        Ok(OperationOutput::Matrix(MatrixSummary {
            operation: op.as_str().to_string(),
            rows,
            cols,
            sample: acc.sample,
            sum: acc.sum,
            trace: (rows == cols).then_some(acc.trace),
        }))
    }
}
