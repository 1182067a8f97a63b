//! # NexusEngine Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/       # Engine-level behavior across modules
//!     ├── lifecycle.rs   # start/stop/pause, cancellation at stop
//!     ├── admission.rs   # backpressure, batches, concurrent producers
//!     ├── plugins.rs     # plugin lifecycle through the engine
//!     └── modules.rs     # module results end to end, metrics
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p nexus-tests
//! cargo test -p nexus-tests integration::admission
//!
//! # Benchmarks
//! cargo bench -p nexus-tests
//! ```

#![allow(dead_code)]

pub mod integration;
