//! Python bindings (feature `python`)
//!
//! The boundary is JSON in, JSON out: configurations and reports cross it
//! as strings so the Python side never depends on Rust type layouts.

pub mod simulator;
