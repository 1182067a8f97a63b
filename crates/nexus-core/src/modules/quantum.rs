//! State-vector quantum simulator.
//!
//! A [`QuantumState`] over `n` qubits holds `2^n` complex amplitudes; basis
//! index bit `q` is the value of qubit `q`. Every gate is unitary, so the
//! norm stays at 1 (up to rounding); measurement renormalizes after
//! collapsing.
//!
//! States are created per task and never shared. The register size a task
//! may allocate is capped by [`ExecutionContext::max_qubits`], and the task
//! deadline is checked between preparation, gate application and readout.

use num_complex::Complex64;
use rand::Rng;
use std::f64::consts::{FRAC_1_SQRT_2, FRAC_PI_4};
use std::str::FromStr;

use crate::domain::{OperationOutput, OperationRequest, QuantumOutput, QubitProbability};
use crate::error::OperationError;
use crate::ports::{ExecutionContext, OperationModule};

/// Largest simulated register.
pub const MAX_QUBITS: u32 = 32;

/// Qubits reported in [`QuantumOutput::probabilities`].
pub const REPORTED_QUBITS: u32 = 8;

/// Amplitude count above which single-qubit gates run on the rayon pool.
#[cfg(feature = "parallel")]
const PARALLEL_THRESHOLD: usize = 1 << 14;

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);
const I: Complex64 = Complex64::new(0.0, 1.0);

/// Complex amplitude vector of a qubit register.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantumState {
    qubits: u32,
    amplitudes: Vec<Complex64>,
}

impl QuantumState {
    fn allocate(qubits: u32) -> Result<Vec<Complex64>, OperationError> {
        if qubits == 0 || qubits > MAX_QUBITS {
            return Err(OperationError::InvalidRequest(format!(
                "qubits must be between 1 and {}, got {}",
                MAX_QUBITS, qubits
            )));
        }

        let len = 1usize << qubits;
        let mut amplitudes = Vec::new();
        amplitudes.try_reserve_exact(len).map_err(|e| {
            OperationError::ResourceExhausted(format!("{}-qubit state vector: {}", qubits, e))
        })?;
        amplitudes.resize(len, ZERO);
        Ok(amplitudes)
    }

    /// `|00…0⟩`.
    pub fn ground(qubits: u32) -> Result<Self, OperationError> {
        let mut amplitudes = Self::allocate(qubits)?;
        amplitudes[0] = ONE;
        Ok(Self { qubits, amplitudes })
    }

    /// Equal superposition over every basis state.
    pub fn superposition(qubits: u32) -> Result<Self, OperationError> {
        let mut amplitudes = Self::allocate(qubits)?;
        let amplitude = Complex64::new(1.0 / (amplitudes.len() as f64).sqrt(), 0.0);
        amplitudes.fill(amplitude);
        Ok(Self { qubits, amplitudes })
    }

    /// Random normalized state.
    pub fn random<R: Rng>(qubits: u32, rng: &mut R) -> Result<Self, OperationError> {
        let mut amplitudes = Self::allocate(qubits)?;
        for amplitude in amplitudes.iter_mut() {
            *amplitude = Complex64::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
        }
        let mut state = Self { qubits, amplitudes };
        if state.norm() == 0.0 {
            state.amplitudes[0] = ONE;
        }
        state.normalize();
        Ok(state)
    }

    pub fn qubits(&self) -> u32 {
        self.qubits
    }

    pub fn amplitudes(&self) -> &[Complex64] {
        &self.amplitudes
    }

    fn check_qubit(&self, qubit: u32) -> Result<(), OperationError> {
        if qubit >= self.qubits {
            return Err(OperationError::InvalidRequest(format!(
                "qubit index {} out of range for {} qubits",
                qubit, self.qubits
            )));
        }
        Ok(())
    }

    fn check_pair(&self, a: u32, b: u32) -> Result<(), OperationError> {
        self.check_qubit(a)?;
        self.check_qubit(b)?;
        if a == b {
            return Err(OperationError::InvalidRequest(format!(
                "two-qubit gate needs distinct qubits, got {} twice",
                a
            )));
        }
        Ok(())
    }

    /// Apply `gate` to every amplitude pair differing only in bit `qubit`,
    /// as `(|…0…⟩, |…1…⟩)`.
    fn apply_pairs<F>(&mut self, qubit: u32, gate: F) -> Result<(), OperationError>
    where
        F: Fn(&mut Complex64, &mut Complex64) + Sync + Send,
    {
        self.check_qubit(qubit)?;
        let stride = 1usize << qubit;

        #[cfg(feature = "parallel")]
        if self.amplitudes.len() >= PARALLEL_THRESHOLD {
            use rayon::prelude::*;

            self.amplitudes
                .par_chunks_mut(stride * 2)
                .for_each(|block| {
                    let (zeros, ones) = block.split_at_mut(stride);
                    zeros
                        .iter_mut()
                        .zip(ones.iter_mut())
                        .for_each(|(a, b)| gate(a, b));
                });
            return Ok(());
        }

        for block in self.amplitudes.chunks_mut(stride * 2) {
            let (zeros, ones) = block.split_at_mut(stride);
            zeros
                .iter_mut()
                .zip(ones.iter_mut())
                .for_each(|(a, b)| gate(a, b));
        }
        Ok(())
    }

    pub fn hadamard(&mut self, qubit: u32) -> Result<(), OperationError> {
        self.apply_pairs(qubit, |a, b| {
            let (x, y) = (*a, *b);
            *a = (x + y) * FRAC_1_SQRT_2;
            *b = (x - y) * FRAC_1_SQRT_2;
        })
    }

    pub fn pauli_x(&mut self, qubit: u32) -> Result<(), OperationError> {
        self.apply_pairs(qubit, |a, b| std::mem::swap(a, b))
    }

    pub fn pauli_y(&mut self, qubit: u32) -> Result<(), OperationError> {
        self.apply_pairs(qubit, |a, b| {
            let (x, y) = (*a, *b);
            *a = -I * y;
            *b = I * x;
        })
    }

    pub fn pauli_z(&mut self, qubit: u32) -> Result<(), OperationError> {
        self.apply_pairs(qubit, |_, b| *b = -*b)
    }

    /// Multiply the `|1⟩` component of `qubit` by `e^{i·angle}`.
    pub fn phase_shift(&mut self, qubit: u32, angle: f64) -> Result<(), OperationError> {
        let phase = Complex64::from_polar(1.0, angle);
        self.apply_pairs(qubit, |_, b| *b *= phase)
    }

    /// Flip `target` on every basis state where `control` is 1.
    pub fn cnot(&mut self, control: u32, target: u32) -> Result<(), OperationError> {
        self.check_pair(control, target)?;
        let (c, t) = (1usize << control, 1usize << target);
        for i in 0..self.amplitudes.len() {
            if i & c != 0 && i & t == 0 {
                self.amplitudes.swap(i, i | t);
            }
        }
        Ok(())
    }

    pub fn swap(&mut self, a: u32, b: u32) -> Result<(), OperationError> {
        self.check_pair(a, b)?;
        let (ma, mb) = (1usize << a, 1usize << b);
        for i in 0..self.amplitudes.len() {
            if i & ma != 0 && i & mb == 0 {
                self.amplitudes.swap(i, i ^ ma ^ mb);
            }
        }
        Ok(())
    }

    /// Entangle two qubits: Hadamard on the first, then CNOT onto the second.
    pub fn bell_pair(&mut self, first: u32, second: u32) -> Result<(), OperationError> {
        self.check_pair(first, second)?;
        self.hadamard(first)?;
        self.cnot(first, second)
    }

    pub fn probability_zero(&self, qubit: u32) -> Result<f64, OperationError> {
        self.check_qubit(qubit)?;
        let mask = 1usize << qubit;
        Ok(self.weight(|i| i & mask == 0))
    }

    pub fn probability_one(&self, qubit: u32) -> Result<f64, OperationError> {
        self.check_qubit(qubit)?;
        let mask = 1usize << qubit;
        Ok(self.weight(|i| i & mask != 0))
    }

    fn weight(&self, include: impl Fn(usize) -> bool) -> f64 {
        self.amplitudes
            .iter()
            .enumerate()
            .filter(|(i, _)| include(*i))
            .map(|(_, a)| a.norm_sqr())
            .sum()
    }

    /// Measure one qubit and collapse the state onto the outcome.
    pub fn measure_qubit<R: Rng>(&mut self, qubit: u32, rng: &mut R) -> Result<u8, OperationError> {
        let p1 = self.probability_one(qubit)?;
        let outcome = u8::from(rng.gen::<f64>() < p1);
        let mask = 1usize << qubit;
        let keep_set = outcome == 1;

        for (i, amplitude) in self.amplitudes.iter_mut().enumerate() {
            if (i & mask != 0) != keep_set {
                *amplitude = ZERO;
            }
        }
        self.normalize();
        Ok(outcome)
    }

    /// Measure the whole register, collapsing onto one basis state.
    /// Returns the basis index.
    pub fn measure_all<R: Rng>(&mut self, rng: &mut R) -> usize {
        let target = rng.gen::<f64>() * self.weight(|_| true);
        let mut cumulative = 0.0;
        let mut outcome = 0;
        for (i, amplitude) in self.amplitudes.iter().enumerate() {
            let weight = amplitude.norm_sqr();
            if weight == 0.0 {
                continue;
            }
            // Rounding can leave `target` past the final sum; keep the last
            // reachable state in that case
            outcome = i;
            cumulative += weight;
            if target < cumulative {
                break;
            }
        }

        self.amplitudes.fill(ZERO);
        self.amplitudes[outcome] = ONE;
        outcome
    }

    pub fn norm(&self) -> f64 {
        self.weight(|_| true).sqrt()
    }

    /// Determinant of the single-qubit reduced density matrix of `qubit`:
    /// `p0·p1 - |⟨0|ρ|1⟩|²`. Zero exactly when the qubit is unentangled.
    fn reduced_determinant(&self, qubit: u32) -> f64 {
        let stride = 1usize << qubit;
        let (mut p0, mut p1, mut coherence) = (0.0, 0.0, ZERO);
        for block in self.amplitudes.chunks(stride * 2) {
            let (zeros, ones) = block.split_at(stride);
            for (a, b) in zeros.iter().zip(ones) {
                p0 += a.norm_sqr();
                p1 += b.norm_sqr();
                coherence += a * b.conj();
            }
        }
        p0 * p1 - coherence.norm_sqr()
    }

    /// Meyer-Wallach global entanglement: 0 for product states, 1 for Bell
    /// and GHZ states.
    pub fn entanglement(&self) -> f64 {
        self.entanglement_with(|| Ok(())).unwrap_or(0.0)
    }

    fn entanglement_with<C>(&self, check: C) -> Result<f64, OperationError>
    where
        C: Fn() -> Result<(), OperationError>,
    {
        let mut total = 0.0;
        for qubit in 0..self.qubits {
            check()?;
            total += self.reduced_determinant(qubit);
        }
        Ok((4.0 * total / f64::from(self.qubits)).clamp(0.0, 1.0))
    }

    fn normalize(&mut self) {
        let norm = self.norm();
        if norm > 0.0 {
            self.amplitudes.iter_mut().for_each(|a| *a /= norm);
        }
    }
}

/// Operations accepted in [`OperationRequest::Quantum`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantumOp {
    Ground,
    Superposition,
    Random,
    Hadamard,
    PauliX,
    PauliY,
    PauliZ,
    /// `π/4` phase on the target qubit of a uniform superposition.
    Phase,
    /// Bell pair on the target and the next qubit.
    Bell,
    /// Flip the target, then swap it with the next qubit.
    Swap,
    /// Measure the target qubit of a uniform superposition.
    Measure,
    /// Entanglement of a random register.
    Entanglement,
}

impl FromStr for QuantumOp {
    type Err = OperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ground" | "init" => Ok(QuantumOp::Ground),
            "superposition" => Ok(QuantumOp::Superposition),
            "random" => Ok(QuantumOp::Random),
            "hadamard" | "h" => Ok(QuantumOp::Hadamard),
            "pauli_x" | "x" => Ok(QuantumOp::PauliX),
            "pauli_y" | "y" => Ok(QuantumOp::PauliY),
            "pauli_z" | "z" => Ok(QuantumOp::PauliZ),
            "phase" => Ok(QuantumOp::Phase),
            "bell" => Ok(QuantumOp::Bell),
            "swap" => Ok(QuantumOp::Swap),
            "measure" => Ok(QuantumOp::Measure),
            "entanglement" | "measure_entanglement" => Ok(QuantumOp::Entanglement),
            other => Err(OperationError::InvalidRequest(format!(
                "unknown quantum operation '{}'",
                other
            ))),
        }
    }
}

impl QuantumOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuantumOp::Ground => "ground",
            QuantumOp::Superposition => "superposition",
            QuantumOp::Random => "random",
            QuantumOp::Hadamard => "hadamard",
            QuantumOp::PauliX => "pauli_x",
            QuantumOp::PauliY => "pauli_y",
            QuantumOp::PauliZ => "pauli_z",
            QuantumOp::Phase => "phase",
            QuantumOp::Bell => "bell",
            QuantumOp::Swap => "swap",
            QuantumOp::Measure => "measure",
            QuantumOp::Entanglement => "entanglement",
        }
    }

    fn reports_entanglement(&self) -> bool {
        matches!(self, QuantumOp::Bell | QuantumOp::Entanglement)
    }

    fn needs_pair(&self) -> bool {
        matches!(self, QuantumOp::Bell | QuantumOp::Swap)
    }

    /// Build the state and apply the operation. Returns the state and the
    /// measurement outcome, if any.
    pub fn run<R: Rng>(
        &self,
        qubits: u32,
        target: u32,
        rng: &mut R,
        ctx: &ExecutionContext<'_>,
    ) -> Result<(QuantumState, Option<u8>), OperationError> {
        if (1..=MAX_QUBITS).contains(&qubits) && qubits > ctx.max_qubits {
            return Err(OperationError::ResourceExhausted(format!(
                "{} qubits exceeds the configured limit of {}",
                qubits, ctx.max_qubits
            )));
        }
        if self.needs_pair() && qubits < 2 {
            return Err(OperationError::InvalidRequest(format!(
                "{} needs at least 2 qubits",
                self.as_str()
            )));
        }
        let partner = (target + 1) % qubits.max(1);

        let mut state = match self {
            QuantumOp::Superposition | QuantumOp::Phase | QuantumOp::Measure => {
                QuantumState::superposition(qubits)?
            }
            QuantumOp::Random | QuantumOp::Entanglement => QuantumState::random(qubits, rng)?,
            _ => QuantumState::ground(qubits)?,
        };
        state.check_qubit(target)?;
        ctx.check_deadline()?;

        let mut measurement = None;
        match self {
            QuantumOp::Ground
            | QuantumOp::Superposition
            | QuantumOp::Random
            | QuantumOp::Entanglement => {}
            QuantumOp::Hadamard => state.hadamard(target)?,
            QuantumOp::PauliX => state.pauli_x(target)?,
            QuantumOp::PauliY => state.pauli_y(target)?,
            QuantumOp::PauliZ => state.pauli_z(target)?,
            QuantumOp::Phase => state.phase_shift(target, FRAC_PI_4)?,
            QuantumOp::Bell => state.bell_pair(target, partner)?,
            QuantumOp::Swap => {
                state.pauli_x(target)?;
                state.swap(target, partner)?;
            }
            QuantumOp::Measure => measurement = Some(state.measure_qubit(target, rng)?),
        }
        Ok((state, measurement))
    }
}

/// Built-in module for [`OperationRequest::Quantum`].
#[derive(Debug, Default)]
pub struct QuantumModule;

impl OperationModule for QuantumModule {
    fn name(&self) -> &str {
        "quantum"
    }

    fn execute(
        &self,
        request: &OperationRequest,
        ctx: &ExecutionContext<'_>,
    ) -> Result<OperationOutput, OperationError> {
        let OperationRequest::Quantum {
            op,
            qubits,
            qubit_index,
        } = request
        else {
            return Err(OperationError::InvalidRequest(format!(
                "quantum module cannot execute {} requests",
                request.kind()
            )));
        };
        let op: QuantumOp = op.parse()?;

        let target = qubit_index.unwrap_or(0);
        let (state, measurement) = op.run(*qubits, target, &mut rand::thread_rng(), ctx)?;
        ctx.check_deadline()?;
        let entanglement = if op.reports_entanglement() {
            Some(state.entanglement_with(|| ctx.check_deadline())?)
        } else {
            None
        };

        let probabilities = (0..state.qubits().min(REPORTED_QUBITS))
            .map(|qubit| {
                Ok(QubitProbability {
                    qubit,
                    p0: state.probability_zero(qubit)?,
                    p1: state.probability_one(qubit)?,
                })
            })
            .collect::<Result<Vec<_>, OperationError>>()?;

        Ok(OperationOutput::Quantum(QuantumOutput {
            operation: op.as_str().to_string(),
            qubits: state.qubits(),
            probabilities,
            norm: state.norm(),
            measurement,
            entanglement,
        }))
    }
}
