//! Code generation: lowers the analyzed tree to Cedar VM instructions.
//!
//! A single post-order walk in statement order. Every value gets a fresh
//! buffer, numbered in creation order and never reused, so an instruction
//! only ever reads buffers written by earlier instructions. A per-node memo
//! makes a node shared by several `%` holes emit exactly once.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use super::analyzer::{AnalysisResult, ParamDecl};
use super::ast::{Arg, Ast, BinOp, NodeId, NodeKind};
use super::builtins::BuiltinKind;
use super::error::{codes, has_errors, Diagnostic, SourceLocation};
use super::mini::{Atom, MiniPattern};
use super::note::midi_to_freq;
use super::symbols::{fnv1a, FunctionInfo, SymbolKind, SymbolTable};
use crate::bytecode::{Instruction, Opcode, BUFFER_UNUSED, MAX_BUFFERS};
use crate::samples::SampleRegistry;

/// Length of one pattern cycle, in beats.
pub const CYCLE_BEATS: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKind {
    /// Pitched or numeric sequence driving `SEQ_STEP`.
    Sequence,
    /// Sample trigger sequence; values are 1-based slots in the required samples.
    SampleSequence,
}

/// Initial contents for one stateful VM node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateInit {
    pub state_id: u32,
    pub location: SourceLocation,
    pub kind: StateKind,
    pub cycle_length: f64,
    /// Event start times in beats.
    pub times: Vec<f64>,
    pub values: Vec<f64>,
    pub velocities: Vec<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sample_names: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CodeGenResult {
    pub instructions: Vec<Instruction>,
    pub diagnostics: Vec<Diagnostic>,
    pub state_inits: Vec<StateInit>,
    pub required_samples: Vec<String>,
    pub param_decls: Vec<ParamDecl>,
    pub success: bool,
}

pub fn generate(
    analysis: &AnalysisResult,
    filename: &str,
    registry: &dyn SampleRegistry,
) -> CodeGenResult {
    let mut gen = Generator {
        ast: &analysis.ast,
        params: &analysis.params,
        patterns: &analysis.patterns,
        globals: &analysis.symbols,
        registry,
        filename,
        symbols: analysis.symbols.clone(),
        instructions: Vec::new(),
        memo: HashMap::new(),
        path: vec!["main".to_string()],
        counters: HashMap::new(),
        inlining: Vec::new(),
        diagnostics: Vec::new(),
        state_inits: Vec::new(),
        required_samples: Vec::new(),
        exhausted: false,
    };

    gen.symbols.push_scope();
    for &stmt in &analysis.ast.statements {
        match analysis.ast.kind(stmt) {
            NodeKind::FnDef { .. } => {}
            NodeKind::Assign { name, value } => {
                gen.path.push(name.clone());
                let buffer = gen.visit(*value);
                gen.path.pop();
                if let Some(buffer) = buffer {
                    gen.symbols.define_variable(name, buffer);
                }
            }
            _ => {
                gen.visit(stmt);
            }
        }
        // Later statements would only report follow-on errors.
        if has_errors(&gen.diagnostics) {
            break;
        }
    }
    gen.symbols.pop_scope();

    let success = !has_errors(&gen.diagnostics);
    if !success {
        gen.instructions.clear();
    }
    debug!(
        instructions = gen.instructions.len(),
        state_inits = gen.state_inits.len(),
        "code generation finished"
    );

    CodeGenResult {
        instructions: gen.instructions,
        diagnostics: gen.diagnostics,
        state_inits: gen.state_inits,
        required_samples: gen.required_samples,
        param_decls: analysis.params.clone(),
        success,
    }
}

struct Generator<'a> {
    ast: &'a Ast,
    params: &'a [ParamDecl],
    patterns: &'a HashMap<NodeId, MiniPattern>,
    /// Builtins, aliases and functions; what a function body may see.
    globals: &'a SymbolTable,
    registry: &'a dyn SampleRegistry,
    filename: &'a str,
    symbols: SymbolTable,
    instructions: Vec<Instruction>,
    memo: HashMap<NodeId, u16>,
    /// Semantic path of the code being emitted, for state ids.
    path: Vec<String>,
    counters: HashMap<String, u32>,
    /// Functions currently being expanded, innermost last.
    inlining: Vec<String>,
    diagnostics: Vec<Diagnostic>,
    state_inits: Vec<StateInit>,
    required_samples: Vec<String>,
    exhausted: bool,
}

impl<'a> Generator<'a> {
    /// Emit code for `id`, returning the buffer holding its value. `None`
    /// means an error has been recorded.
    fn visit(&mut self, id: NodeId) -> Option<u16> {
        if let Some(&buffer) = self.memo.get(&id) {
            return Some(buffer);
        }

        let loc = self.ast.loc(id);
        let ast = self.ast;
        let buffer = match ast.kind(id) {
            NodeKind::Number(v) => self.emit_const(*v as f32, loc)?,
            NodeKind::Bool(b) => self.emit_const(if *b { 1.0 } else { 0.0 }, loc)?,
            NodeKind::Str(_) => {
                self.error(
                    codes::STRING_AS_SIGNAL,
                    "a string cannot be used as a signal",
                    loc,
                );
                return None;
            }
            NodeKind::Ident(name) => match self
                .symbols
                .lookup(name)
                .filter(|sym| sym.is_value())
                .map(|sym| sym.buffer)
            {
                Some(buffer) if buffer != BUFFER_UNUSED => buffer,
                _ => {
                    self.error(
                        codes::UNRESOLVED_NODE,
                        format!("'{name}' has no value at this point"),
                        loc,
                    );
                    return None;
                }
            },
            NodeKind::Binary { op, lhs, rhs } => {
                let a = self.visit(*lhs)?;
                let b = self.visit(*rhs)?;
                self.emit(binary_opcode(*op), &[a, b], 0, loc)?
            }
            NodeKind::Call { name, args } => self.visit_call(name, args, loc)?,
            NodeKind::Hole
            | NodeKind::Pipe { .. }
            | NodeKind::Assign { .. }
            | NodeKind::FnDef { .. } => {
                self.error(
                    codes::UNRESOLVED_NODE,
                    "expression was not resolved by analysis",
                    loc,
                );
                return None;
            }
        };

        self.memo.insert(id, buffer);
        Some(buffer)
    }

    fn visit_call(&mut self, name: &str, args: &[Arg], loc: SourceLocation) -> Option<u16> {
        let kind = self.symbols.lookup(name).map(|s| s.kind.clone());
        match kind {
            Some(SymbolKind::Builtin(info)) => match info.kind {
                BuiltinKind::Op(opcode) => {
                    let mut inputs = Vec::with_capacity(args.len());
                    for arg in args {
                        inputs.push(self.visit(arg.value)?);
                    }
                    let payload = if info.stateful {
                        self.state_id(info.name)
                    } else {
                        0
                    };
                    self.emit(opcode, &inputs, payload, loc)
                }
                BuiltinKind::Pattern => self.visit_pattern(args.first()?.value, loc),
                BuiltinKind::Param(_) => self.visit_param(args.first()?.value, loc),
            },
            Some(SymbolKind::Function(info)) => self.inline_call(info, args, loc),
            _ => {
                self.error(
                    codes::UNRESOLVED_NODE,
                    format!("call to '{name}' was not resolved by analysis"),
                    loc,
                );
                None
            }
        }
    }

    /// Expand a user function at the call site.
    fn inline_call(&mut self, info: FunctionInfo, args: &[Arg], loc: SourceLocation) -> Option<u16> {
        if self.inlining.contains(&info.name) {
            self.error(
                codes::RECURSIVE_FUNCTION,
                format!("function '{}' calls itself and cannot be expanded", info.name),
                loc,
            );
            return None;
        }

        let mut inputs = Vec::with_capacity(args.len());
        for arg in args {
            inputs.push(self.visit(arg.value)?);
        }

        let ast = self.ast;
        let NodeKind::FnDef { params, body, .. } = ast.kind(info.def) else {
            self.error(
                codes::UNRESOLVED_NODE,
                format!("definition of '{}' is missing", info.name),
                loc,
            );
            return None;
        };

        let n = self.next_count(&info.name);
        self.path.push(format!("{}#{n}", info.name));
        self.inlining.push(info.name.clone());
        // The body sees its parameters and the global scope, never the caller's variables.
        let caller = std::mem::replace(&mut self.symbols, self.globals.clone());
        self.symbols.push_scope();
        for (param, &buffer) in params.iter().zip(&inputs) {
            self.symbols.define_parameter(&param.name, buffer);
        }

        // Body nodes are shared by every call site; give each expansion its own memo.
        let saved = std::mem::take(&mut self.memo);
        let result = self.visit(*body);
        self.memo = saved;

        self.symbols = caller;
        self.inlining.pop();
        self.path.pop();
        result
    }

    fn visit_pattern(&mut self, arg: NodeId, loc: SourceLocation) -> Option<u16> {
        let patterns = self.patterns;
        let Some(pattern) = patterns.get(&arg) else {
            self.error(
                codes::UNRESOLVED_NODE,
                "pattern was not resolved by analysis",
                self.ast.loc(arg),
            );
            return None;
        };
        let arg_loc = self.ast.loc(arg);

        let is_sample = pattern.is_sample();
        let mut checked: Vec<&str> = Vec::new();
        for name in pattern.sample_names() {
            if checked.contains(&name) {
                continue;
            }
            checked.push(name);
            if !self.registry.contains(name) {
                self.error(
                    codes::UNKNOWN_SAMPLE,
                    format!("unknown sample '{name}'"),
                    arg_loc,
                );
            }
        }
        if checked.iter().any(|name| !self.registry.contains(name)) {
            return None;
        }

        let state_id = self.state_id("pat");
        let mut init = StateInit {
            state_id,
            location: loc,
            kind: if is_sample {
                StateKind::SampleSequence
            } else {
                StateKind::Sequence
            },
            cycle_length: CYCLE_BEATS,
            times: Vec::with_capacity(pattern.events.len()),
            values: Vec::with_capacity(pattern.events.len()),
            velocities: Vec::with_capacity(pattern.events.len()),
            sample_names: Vec::new(),
        };

        for event in &pattern.events {
            let value = match &event.atom {
                Atom::Number(v) => *v,
                Atom::Pitch(midi) => midi_to_freq(*midi),
                Atom::Sample(name) => {
                    init.sample_names.push(name.clone());
                    self.sample_slot(name) as f64
                }
                Atom::Rest => continue,
            };
            init.times.push(event.time * CYCLE_BEATS);
            init.values.push(value);
            init.velocities.push(1.0);
        }

        let index = self.state_inits.len() as u32;
        self.state_inits.push(init);
        let seq = self.emit(Opcode::SeqStep, &[], index, loc)?;
        if !is_sample {
            return Some(seq);
        }
        let pitch = self.emit_const(1.0, loc)?;
        self.emit(Opcode::SamplePlay, &[seq, pitch], state_id, loc)
    }

    fn visit_param(&mut self, arg: NodeId, loc: SourceLocation) -> Option<u16> {
        let params = self.params;
        let decl = match self.ast.kind(arg) {
            NodeKind::Str(name) => params.iter().find(|p| &p.name == name),
            _ => None,
        };
        let Some(decl) = decl else {
            self.error(
                codes::UNRESOLVED_NODE,
                "parameter declaration was not resolved by analysis",
                loc,
            );
            return None;
        };
        let hash = decl.name_hash;
        let fallback = self.emit_const(decl.default as f32, loc)?;
        self.emit(Opcode::EnvGet, &[fallback], hash, loc)
    }

    /// 1-based slot of a sample in the required list, adding it on first use.
    fn sample_slot(&mut self, name: &str) -> usize {
        match self.required_samples.iter().position(|s| s == name) {
            Some(i) => i + 1,
            None => {
                self.required_samples.push(name.to_string());
                self.required_samples.len()
            }
        }
    }

    fn next_count(&mut self, leaf: &str) -> u32 {
        let key = format!("{}/{leaf}", self.path.join("/"));
        let counter = self.counters.entry(key).or_insert(0);
        let n = *counter;
        *counter += 1;
        n
    }

    /// Semantic id for a stateful node: hash of its path, stable across edits
    /// that do not move it.
    fn state_id(&mut self, callee: &str) -> u32 {
        let n = self.next_count(callee);
        fnv1a(&format!("{}/{callee}#{n}", self.path.join("/")))
    }

    fn emit_const(&mut self, value: f32, loc: SourceLocation) -> Option<u16> {
        let out = self.alloc(loc)?;
        self.instructions.push(Instruction::push_const(out, value));
        Some(out)
    }

    fn emit(&mut self, opcode: Opcode, inputs: &[u16], payload: u32, loc: SourceLocation) -> Option<u16> {
        let out = self.alloc(loc)?;
        self.instructions
            .push(Instruction::new(opcode, out, inputs).with_payload(payload));
        Some(out)
    }

    fn alloc(&mut self, loc: SourceLocation) -> Option<u16> {
        // Every instruction writes exactly one new buffer.
        let next = self.instructions.len();
        if next >= MAX_BUFFERS {
            if !self.exhausted {
                self.exhausted = true;
                self.error(
                    codes::BUFFER_EXHAUSTED,
                    format!("program needs more than {MAX_BUFFERS} buffers"),
                    loc,
                );
            }
            return None;
        }
        Some(next as u16)
    }

    fn error(&mut self, code: &str, message: impl Into<String>, loc: SourceLocation) {
        self.diagnostics
            .push(Diagnostic::error(code, message, self.filename, loc));
    }
}

fn binary_opcode(op: BinOp) -> Opcode {
    match op {
        BinOp::Add => Opcode::Add,
        BinOp::Sub => Opcode::Sub,
        BinOp::Mul => Opcode::Mul,
        BinOp::Div => Opcode::Div,
        BinOp::Pow => Opcode::Pow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::analyzer::analyze;
    use crate::dsl::lexer::lex;
    use crate::dsl::parser::parse;
    use crate::samples::SampleBank;
    use assert_approx_eq::assert_approx_eq;

    fn gen_with(src: &str, registry: &dyn SampleRegistry) -> CodeGenResult {
        let (tokens, lex_diags) = lex(src, "test.akk");
        assert!(lex_diags.is_empty(), "{lex_diags:?}");
        let (ast, parse_diags) = parse(tokens, "test.akk");
        assert!(parse_diags.is_empty(), "{parse_diags:?}");
        let analysis = analyze(&ast, "test.akk");
        assert!(analysis.success, "{:?}", analysis.diagnostics);
        generate(&analysis, "test.akk", registry)
    }

    fn gen(src: &str) -> CodeGenResult {
        gen_with(src, &SampleBank::with_defaults())
    }

    fn ops(result: &CodeGenResult) -> Vec<Opcode> {
        result.instructions.iter().map(|i| i.opcode).collect()
    }

    fn only_code(result: &CodeGenResult) -> &str {
        assert!(!result.success);
        assert!(result.instructions.is_empty());
        &result.diagnostics[0].code
    }

    #[test]
    fn empty_program() {
        let result = gen("// nothing\n");
        assert!(result.success);
        assert!(result.instructions.is_empty());
    }

    #[test]
    fn constant() {
        let result = gen("42");
        assert_eq!(ops(&result), vec![Opcode::PushConst]);
        assert_approx_eq!(result.instructions[0].const_value(), 42.0f32);
    }

    #[test]
    fn oscillator_reads_constant() {
        let result = gen("saw(440)");
        assert_eq!(ops(&result), vec![Opcode::PushConst, Opcode::OscSaw]);
        let saw = &result.instructions[1];
        assert_eq!(saw.inputs[0], result.instructions[0].out);
        assert_eq!(saw.inputs[1], BUFFER_UNUSED);
        assert_eq!(saw.payload, fnv1a("main/saw#0"));
    }

    #[test]
    fn shared_hole_is_emitted_once() {
        let result = gen("saw(440) |> out(%, %)");
        assert_eq!(
            ops(&result),
            vec![Opcode::PushConst, Opcode::OscSaw, Opcode::Output]
        );
        let out = &result.instructions[2];
        assert_eq!(out.inputs[0], 1);
        assert_eq!(out.inputs[1], 1);
    }

    #[test]
    fn chain_is_topologically_ordered() {
        let result = gen("saw(440) |> lp(%, 1000, 0.7) |> out(%, %)");
        assert_eq!(
            ops(&result),
            vec![
                Opcode::PushConst,
                Opcode::OscSaw,
                Opcode::PushConst,
                Opcode::PushConst,
                Opcode::FilterSvfLp,
                Opcode::Output,
            ]
        );
        for (i, inst) in result.instructions.iter().enumerate() {
            assert_eq!(inst.out as usize, i);
            for &input in inst.inputs.iter().filter(|&&b| b != BUFFER_UNUSED) {
                assert!((input as usize) < i, "instruction {i} reads a later buffer");
            }
        }
    }

    #[test]
    fn variable_reference_emits_nothing() {
        let result = gen("x = 440\nsaw(x)");
        assert_eq!(ops(&result), vec![Opcode::PushConst, Opcode::OscSaw]);
        assert_eq!(result.instructions[1].inputs[0], 0);
    }

    #[test]
    fn arithmetic() {
        let result = gen("440 + 220");
        assert_eq!(
            ops(&result),
            vec![Opcode::PushConst, Opcode::PushConst, Opcode::Add]
        );
        assert_eq!(&result.instructions[2].inputs[..2], &[0, 1]);
    }

    #[test]
    fn state_ids_follow_the_semantic_path() {
        let result = gen("a = saw(1)\nb = saw(1)\nc = saw(1) + saw(2)");
        let ids: Vec<u32> = result
            .instructions
            .iter()
            .filter(|i| i.opcode == Opcode::OscSaw)
            .map(|i| i.payload)
            .collect();
        assert_eq!(ids[0], fnv1a("main/a/saw#0"));
        assert_eq!(ids[1], fnv1a("main/b/saw#0"));
        assert_eq!(ids[2], fnv1a("main/c/saw#0"));
        assert_eq!(ids[3], fnv1a("main/c/saw#1"));
    }

    #[test]
    fn aliases_lower_like_their_canonical_name() {
        let result = gen("sawtooth(1)");
        assert_eq!(result.instructions[1].opcode, Opcode::OscSaw);
        assert_eq!(result.instructions[1].payload, fnv1a("main/saw#0"));
    }

    #[test]
    fn user_functions_are_inlined() {
        let result = gen("fn twice(x) -> x * 2\nsaw(1) |> twice(%) |> out(%)");
        assert_eq!(
            ops(&result),
            vec![
                Opcode::PushConst,
                Opcode::OscSaw,
                Opcode::PushConst,
                Opcode::Mul,
                Opcode::Output,
            ]
        );
        assert_eq!(result.instructions[3].inputs[0], 1);
    }

    #[test]
    fn each_expansion_gets_its_own_state() {
        let result = gen("fn voice(f) -> saw(f)\nvoice(1) + voice(2)");
        let ids: Vec<u32> = result
            .instructions
            .iter()
            .filter(|i| i.opcode == Opcode::OscSaw)
            .map(|i| i.payload)
            .collect();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0], fnv1a("main/voice#0/saw#0"));
        assert_eq!(ids[1], fnv1a("main/voice#1/saw#0"));
    }

    #[test]
    fn inlined_body_resolves_against_globals() {
        let result = gen("saw = 2\nfn voice(f) -> saw(f)\nvoice(saw)");
        assert!(result.success, "{:?}", result.diagnostics);
        assert_eq!(ops(&result), vec![Opcode::PushConst, Opcode::OscSaw]);
        assert_eq!(result.instructions[1].inputs[0], 0);
    }

    #[test]
    fn recursion_is_rejected() {
        let result = gen("fn f(x) -> f(x)\nf(1)");
        assert_eq!(only_code(&result), codes::RECURSIVE_FUNCTION);
    }

    #[test]
    fn pitched_pattern() {
        let result = gen("pat(\"a4 ~ a3 ~\") |> saw(%) |> out(%)");
        assert_eq!(result.instructions[0].opcode, Opcode::SeqStep);
        assert_eq!(result.instructions[0].payload, 0);
        let init = &result.state_inits[0];
        assert_eq!(init.kind, StateKind::Sequence);
        assert_eq!(init.state_id, fnv1a("main/pat#0"));
        assert_eq!(init.times, vec![0.0, 2.0]);
        assert_approx_eq!(init.values[0], 440.0);
        assert_approx_eq!(init.values[1], 220.0);
        assert_eq!(init.velocities, vec![1.0, 1.0]);
        assert!(result.required_samples.is_empty());
    }

    #[test]
    fn sample_pattern() {
        let result = gen("pat(\"bd ~ sd bd\") |> out(%)");
        assert_eq!(
            ops(&result),
            vec![
                Opcode::SeqStep,
                Opcode::PushConst,
                Opcode::SamplePlay,
                Opcode::Output,
            ]
        );
        assert_eq!(result.required_samples, vec!["bd", "sd"]);
        let init = &result.state_inits[0];
        assert_eq!(init.kind, StateKind::SampleSequence);
        assert_eq!(init.values, vec![1.0, 2.0, 1.0]);
        assert_eq!(init.sample_names, vec!["bd", "sd", "bd"]);
        let play = &result.instructions[2];
        assert_eq!(&play.inputs[..2], &[0, 1]);
    }

    #[test]
    fn unknown_sample() {
        let result = gen_with("pat(\"bd zap zap\")", &SampleBank::new());
        assert!(!result.success);
        let codes: Vec<_> = result.diagnostics.iter().map(|d| d.code.as_str()).collect();
        assert_eq!(codes, vec![codes::UNKNOWN_SAMPLE, codes::UNKNOWN_SAMPLE]);
        assert!(result.instructions.is_empty());
    }

    #[test]
    fn params_read_the_environment() {
        let result = gen("lp(saw(110), param(\"cut\", 800, 20, 2000))");
        let env = result
            .instructions
            .iter()
            .find(|i| i.opcode == Opcode::EnvGet)
            .unwrap();
        assert_eq!(env.payload, fnv1a("cut"));
        let fallback = &result.instructions[env.inputs[0] as usize];
        assert_eq!(fallback.opcode, Opcode::PushConst);
        assert_approx_eq!(fallback.const_value(), 800.0f32);
        assert_eq!(result.param_decls.len(), 1);
    }

    #[test]
    fn string_in_signal_position() {
        let result = gen("out(\"hello\")");
        assert_eq!(only_code(&result), codes::STRING_AS_SIGNAL);
    }

    #[test]
    fn buffer_exhaustion() {
        let src = vec!["1"; 130].join(" + ");
        let result = gen(&src);
        assert_eq!(only_code(&result), codes::BUFFER_EXHAUSTED);
        assert_eq!(result.diagnostics.len(), 1);
    }

    #[test]
    fn program_just_under_buffer_limit_fits() {
        // 128 constants and 127 additions.
        let src = vec!["1"; 128].join(" + ");
        let result = gen(&src);
        assert!(result.success);
        assert_eq!(result.instructions.len(), 255);
    }
}
