//! Application layer for the `duet` binary: settings and the simulated demo.

pub mod demo;
pub mod settings;
