//! Akkado compiler: source text → tokens → AST → analyzed AST → Cedar bytecode.

pub mod analyzer;
pub mod ast;
pub mod builtins;
pub mod codegen;
pub mod compile;
pub mod error;
pub mod lexer;
pub mod mini;
pub mod note;
pub mod parser;
pub mod remap;
pub mod stdlib;
pub mod symbols;
pub mod token;

use std::path::Path;

pub use compile::{compile, compile_file, CompileResult};
pub use error::{format_diagnostic, Diagnostic, Severity, SourceLocation};

use crate::samples::{SampleBank, SampleRegistry};

/// The Akkado compiler, bound to the sample set the host has loaded.
///
/// Compilation is a pure function of the source text and the registry, so a
/// `Compiler` can be shared and reused freely.
#[derive(Debug, Clone)]
pub struct Compiler<R = SampleBank> {
    registry: R,
}

impl Compiler {
    /// A compiler that knows the built-in drum kit.
    pub fn new() -> Self {
        Self::with_registry(SampleBank::with_defaults())
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: SampleRegistry> Compiler<R> {
    pub fn with_registry(registry: R) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Compile source text. `filename` only labels diagnostics.
    pub fn compile(&self, source: &str, filename: &str) -> CompileResult {
        compile(source, filename, &self.registry)
    }

    pub fn compile_file(&self, path: impl AsRef<Path>) -> CompileResult {
        compile_file(path, &self.registry)
    }
}
