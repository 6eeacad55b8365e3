//! # Gameplay Bus Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/integration/   # Cross-crate flows
//! │   ├── flows.rs       # Bus API end to end: ordering, retries, limits, replay
//! │   └── e2e_runtime.rs # Bridges and frame loop on a live bus
//! │
//! └── benches/
//!     └── bus_throughput.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p bus-tests
//!
//! # Benchmarks
//! cargo bench -p bus-tests
//! ```

#![allow(dead_code)]

pub mod integration;
