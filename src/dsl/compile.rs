//! Compile pipeline: link the stdlib, then lex, parse, analyze and generate.
//!
//! Each phase's diagnostics are remapped to user coordinates as soon as the
//! phase returns. The pipeline stops after the first phase that reports an
//! error, so later phases never see a broken tree.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, instrument};

use super::analyzer::{analyze, ParamDecl};
use super::codegen::{generate, StateInit};
use super::error::{codes, has_errors, Diagnostic, SourceLocation};
use super::lexer::lex;
use super::parser::parse;
use super::remap::remap_diagnostics;
use super::stdlib::LinkedSource;
use crate::bytecode::{self, DecodeError, Instruction};
use crate::samples::SampleRegistry;

/// Everything a host needs to load a compiled program.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompileResult {
    pub success: bool,
    pub diagnostics: Vec<Diagnostic>,
    /// Instructions at a fixed 16-byte stride.
    pub bytecode: Vec<u8>,
    pub state_inits: Vec<StateInit>,
    pub required_samples: Vec<String>,
    pub param_decls: Vec<ParamDecl>,
}

impl CompileResult {
    fn failed(diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            diagnostics,
            ..Self::default()
        }
    }

    /// Decode the bytecode back into instructions.
    pub fn instructions(&self) -> Result<Vec<Instruction>, DecodeError> {
        bytecode::decode(&self.bytecode)
    }

    pub fn instruction_count(&self) -> usize {
        self.bytecode.len() / bytecode::INSTRUCTION_SIZE
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }
}

/// Compile user source text. `filename` is used in diagnostics.
#[instrument(skip(source, registry), fields(bytes = source.len()))]
pub fn compile(source: &str, filename: &str, registry: &dyn SampleRegistry) -> CompileResult {
    if source.is_empty() {
        return CompileResult::failed(vec![Diagnostic::error(
            codes::EMPTY_SOURCE,
            "Empty source file",
            filename,
            SourceLocation::default(),
        )]);
    }

    let linked = LinkedSource::with_stdlib(source);
    let boundary = linked.boundary;
    let mut diagnostics = Vec::new();

    // Remap one phase's diagnostics, keep them, and report whether to stop.
    let mut absorb = |mut batch: Vec<Diagnostic>, phase: &str| -> bool {
        remap_diagnostics(&mut batch, &boundary, filename);
        let failed = has_errors(&batch);
        debug!(phase, diagnostics = batch.len(), failed, "phase finished");
        diagnostics.extend(batch);
        failed
    };

    let (tokens, lex_diags) = lex(&linked.text, filename);
    if absorb(lex_diags, "lex") {
        return CompileResult::failed(diagnostics);
    }

    let (ast, parse_diags) = parse(tokens, filename);
    if absorb(parse_diags, "parse") {
        return CompileResult::failed(diagnostics);
    }

    let analysis = analyze(&ast, filename);
    if absorb(analysis.diagnostics.clone(), "analyze") || !analysis.success {
        return CompileResult::failed(diagnostics);
    }

    let generated = generate(&analysis, filename, registry);
    if absorb(generated.diagnostics, "generate") || !generated.success {
        return CompileResult::failed(diagnostics);
    }

    let mut state_inits = generated.state_inits;
    for init in state_inits.iter_mut() {
        init.location.offset = init.location.offset.saturating_sub(boundary.byte_len);
    }

    info!(
        instructions = generated.instructions.len(),
        samples = generated.required_samples.len(),
        params = generated.param_decls.len(),
        "compiled"
    );

    CompileResult {
        success: true,
        diagnostics,
        bytecode: bytecode::encode(&generated.instructions),
        state_inits,
        required_samples: generated.required_samples,
        param_decls: generated.param_decls,
    }
}

/// Read and compile a file. An unreadable file yields a failed result with `E000`.
pub fn compile_file(path: impl AsRef<Path>, registry: &dyn SampleRegistry) -> CompileResult {
    let path = path.as_ref();
    let filename = path.display().to_string();
    match std::fs::read_to_string(path) {
        Ok(source) => compile(&source, &filename, registry),
        Err(err) => {
            debug!(file = %filename, error = %err, "could not read source");
            CompileResult::failed(vec![Diagnostic::error(
                codes::OPEN_FAILED,
                format!("Could not open file: {filename}"),
                &filename,
                SourceLocation::default(),
            )])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Opcode;
    use crate::dsl::stdlib::{STDLIB, STDLIB_FILENAME};
    use crate::samples::SampleBank;

    fn compile_str(src: &str) -> CompileResult {
        compile(src, "patch.akk", &SampleBank::with_defaults())
    }

    #[test]
    fn empty_source() {
        let result = compile_str("");
        assert!(!result.success);
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].code, codes::EMPTY_SOURCE);
        assert_eq!(result.diagnostics[0].filename, "patch.akk");
        assert!(result.bytecode.is_empty());
    }

    #[test]
    fn comment_only_program() {
        let result = compile_str("// just a comment");
        assert!(result.success);
        assert!(result.bytecode.is_empty());
    }

    #[test]
    fn bytecode_stride() {
        let result = compile_str("saw(440) |> out(%, %)");
        assert!(result.success);
        assert_eq!(result.bytecode.len(), 48);
        assert_eq!(result.instruction_count(), 3);
        let insts = result.instructions().unwrap();
        assert_eq!(insts[2].opcode, Opcode::Output);
    }

    #[test]
    fn lexical_errors_stop_the_pipeline() {
        let result = compile_str("x = 1 $ 2\nunknown(3)");
        assert!(!result.success);
        assert!(result.errors().all(|d| d.code == codes::UNEXPECTED_CHAR));
    }

    #[test]
    fn user_diagnostics_use_user_coordinates() {
        let result = compile_str("x = 1\ny = foo(2)");
        let d = &result.diagnostics[0];
        assert_eq!(d.code, codes::UNKNOWN_FUNCTION);
        assert_eq!(d.filename, "patch.akk");
        assert_eq!(d.location.line, 2);
        assert_eq!(d.location.column, 5);
        assert_eq!(d.location.offset, 10);
    }

    #[test]
    fn redefining_stdlib_function_points_into_stdlib() {
        let result = compile_str("fn gain(s, a) -> s");
        let d = &result.diagnostics[0];
        assert_eq!(d.code, codes::REDEFINITION);
        assert_eq!(d.filename, "patch.akk");
        assert_eq!(d.location.line, 1);
        assert_eq!(d.related.len(), 1);
        let rel = &d.related[0];
        assert_eq!(rel.filename, STDLIB_FILENAME);
        let gain_line = STDLIB
            .lines()
            .position(|l| l.starts_with("fn gain"))
            .unwrap() as u32
            + 1;
        assert_eq!(rel.location.line, gain_line);
    }

    #[test]
    fn stdlib_functions_are_callable() {
        let result = compile_str("saw(110) |> gain(%, 0.5) |> out(%)");
        assert!(result.success, "{:?}", result.diagnostics);
        let ops: Vec<_> = result
            .instructions()
            .unwrap()
            .iter()
            .map(|i| i.opcode)
            .collect();
        assert_eq!(
            ops,
            vec![
                Opcode::PushConst,
                Opcode::OscSaw,
                Opcode::PushConst,
                Opcode::Mul,
                Opcode::Output,
            ]
        );
    }

    #[test]
    fn state_init_offsets_are_user_relative() {
        let result = compile_str("x = 1\npat(\"bd sd\") |> out(%)");
        assert!(result.success);
        assert_eq!(result.state_inits[0].location.offset, 6);
        assert_eq!(result.required_samples, vec!["bd", "sd"]);
    }

    #[test]
    fn missing_file_is_e000() {
        let result = compile_file(
            "/definitely/not/here.akk",
            &SampleBank::with_defaults(),
        );
        assert!(!result.success);
        assert_eq!(result.diagnostics[0].code, codes::OPEN_FAILED);
        assert!(result.diagnostics[0]
            .message
            .starts_with("Could not open file: "));
    }
}
