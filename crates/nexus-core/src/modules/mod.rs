//! # Operation Modules
//!
//! Built-in implementations of [`OperationModule`] and the dispatch table
//! that routes each [`OperationKind`] to one of them.
//!
//! | Kind | Module | Notes |
//! |------|--------|-------|
//! | `binary` | [`BinaryModule`] | 64-bit bitwise ops, word-vector ops |
//! | `matrix` | [`MatrixModule`] | generators (summarized), arithmetic |
//! | `quantum` | [`QuantumModule`] | state-vector simulator, 1-32 qubits, capped by `max_qubits` |
//! | `hash` | [`HashModule`] | SHA-256, SHA3-256, BLAKE2b, BLAKE3, Murmur3, xxHash64, SipHash |
//! | `plugin` | (registry) | routed by name through the plugin registry |

pub mod binary;
pub mod hash;
pub mod matrix;
pub mod quantum;

pub use binary::{BinaryModule, BinaryOp, BitVectorOp};
pub use hash::{HashAlgorithm, HashModule};
pub use matrix::{Matrix, MatrixArithmetic, MatrixModule, MatrixOp};
pub use quantum::{QuantumModule, QuantumState};

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::{OperationKind, OperationOutput, OperationRequest};
use crate::error::OperationError;
use crate::ports::{ExecutionContext, OperationModule};

/// Dispatch table from operation kind to module.
///
/// Built once when the engine is constructed and never mutated afterwards.
/// `OperationKind::Plugin` is never looked up here: plugin requests go to the
/// plugin registry by name.
#[derive(Clone)]
pub struct Dispatcher {
    modules: BTreeMap<OperationKind, Arc<dyn OperationModule>>,
}

impl Dispatcher {
    /// Table with every built-in module.
    pub fn builtin() -> Self {
        Self::null()
            .with_module(OperationKind::Binary, Arc::new(BinaryModule))
            .with_module(OperationKind::Matrix, Arc::new(MatrixModule))
            .with_module(OperationKind::Quantum, Arc::new(QuantumModule))
            .with_module(OperationKind::Hash, Arc::new(HashModule))
    }

    /// Table where every kind resolves to [`NullModule`].
    pub fn null() -> Self {
        let modules = OperationKind::ALL
            .iter()
            .filter(|kind| **kind != OperationKind::Plugin)
            .map(|kind| {
                (
                    *kind,
                    Arc::new(NullModule::new(*kind)) as Arc<dyn OperationModule>,
                )
            })
            .collect();
        Self { modules }
    }

    /// Replace the module serving `kind`.
    pub fn with_module(mut self, kind: OperationKind, module: Arc<dyn OperationModule>) -> Self {
        self.modules.insert(kind, module);
        self
    }

    pub fn module_for(&self, kind: OperationKind) -> Option<&Arc<dyn OperationModule>> {
        self.modules.get(&kind)
    }

    /// Module names keyed by kind, for startup logging.
    pub fn describe(&self) -> Vec<(OperationKind, String)> {
        self.modules
            .iter()
            .map(|(kind, module)| (*kind, module.name().to_string()))
            .collect()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::builtin()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.describe()).finish()
    }
}

/// Placeholder module that fails every request with `ModuleUnavailable`.
#[derive(Debug, Clone)]
pub struct NullModule {
    kind: OperationKind,
}

impl NullModule {
    pub fn new(kind: OperationKind) -> Self {
        Self { kind }
    }
}

impl OperationModule for NullModule {
    fn name(&self) -> &str {
        "null"
    }

    fn execute(
        &self,
        _request: &OperationRequest,
        _ctx: &ExecutionContext<'_>,
    ) -> Result<OperationOutput, OperationError> {
        Err(OperationError::ModuleUnavailable(format!(
            "no {} module configured",
            self.kind
        )))
    }
}
