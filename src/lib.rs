//! # The ROCCC driver
//!
//! `roccc` takes a C kernel through the ROCCC toolchain: the SUIF front end
//! and optimizer, the lowering passes down to VHDL, and optionally vendor
//! synthesis. It also runs queued compile jobs and regression sweeps.
pub mod cli;
pub mod stages;
