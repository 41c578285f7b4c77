//! Akkado: compiler for a live-coding audio patch language.
//!
//! Source text compiles to Cedar bytecode: a flat, topologically ordered
//! list of fixed-size DSP instructions, plus the state and parameter
//! metadata a host needs to run it.

pub mod bytecode;
pub mod config;
pub mod dsl;
pub mod error;
pub mod samples;

pub use dsl::{compile, compile_file, CompileResult, Compiler};
