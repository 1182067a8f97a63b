//! # Nexus Runtime
//!
//! Building blocks of the `nexus-runtime` demo binary, exposed as a library so
//! the workload and bundled plugins can be reused by tests and benchmarks.
//!
//! - `config`: `RuntimeConfig` loaded from `ENGINE_*` environment variables
//! - `plugins`: `example_plugin` and `quantum_optimizer`
//! - `workload`: deterministic mixed request generator and runner

pub mod config;
pub mod plugins;
pub mod workload;

pub use config::{ConfigError, RuntimeConfig};
pub use plugins::{install_bundled, ExamplePlugin, QuantumOptimizerPlugin};
pub use workload::{run_mixed, RequestMix, WorkloadReport};
