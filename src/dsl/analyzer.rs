//! Semantic analysis: name binding, pipe desugaring and call validation.
//!
//! The analyzer works on a copy of the parser's arena and rewrites it in
//! place. After a successful run the tree holds no `Pipe` or `Hole` nodes,
//! every call has exactly one positional argument per declared parameter,
//! and every identifier refers to a variable or parameter.

use std::collections::HashMap;

use serde::Serialize;
use tracing::trace;

use super::ast::{Arg, Ast, NodeId, NodeKind};
use super::builtins::{BuiltinInfo, BuiltinKind, ParamDefault, ParamKind};
use super::error::{codes, has_errors, Diagnostic, SourceLocation};
use super::mini::{parse_mini, MiniPattern};
use super::symbols::{fnv1a, FunctionInfo, FunctionParam, Symbol, SymbolKind, SymbolTable};

/// A host-controlled value declared with `param`, `button` or `toggle`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamDecl {
    pub name: String,
    pub name_hash: u32,
    pub kind: ParamKind,
    pub default: f64,
    pub min: f64,
    pub max: f64,
    pub source_offset: u32,
    pub source_length: u32,
}

#[derive(Debug, Clone)]
pub struct AnalysisResult {
    /// Global scope only: builtins, aliases and functions.
    pub symbols: SymbolTable,
    /// The rewritten program.
    pub ast: Ast,
    pub params: Vec<ParamDecl>,
    /// Parsed `pat` strings, keyed by the string literal node.
    pub patterns: HashMap<NodeId, MiniPattern>,
    pub diagnostics: Vec<Diagnostic>,
    pub success: bool,
}

pub fn analyze(ast: &Ast, filename: &str) -> AnalysisResult {
    let mut analyzer = Analyzer {
        ast: ast.clone(),
        symbols: SymbolTable::new(),
        filename,
        diagnostics: Vec::new(),
        params: Vec::new(),
        patterns: HashMap::new(),
    };

    analyzer.hoist_functions();
    analyzer.analyze_function_bodies();
    analyzer.analyze_program();

    let success = !has_errors(&analyzer.diagnostics);
    trace!(
        params = analyzer.params.len(),
        diagnostics = analyzer.diagnostics.len(),
        "analysis finished"
    );
    AnalysisResult {
        symbols: analyzer.symbols,
        ast: analyzer.ast,
        params: analyzer.params,
        patterns: analyzer.patterns,
        diagnostics: analyzer.diagnostics,
        success,
    }
}

enum Callee {
    Builtin(&'static BuiltinInfo),
    Function(FunctionInfo),
}

struct Analyzer<'a> {
    ast: Ast,
    symbols: SymbolTable,
    filename: &'a str,
    diagnostics: Vec<Diagnostic>,
    params: Vec<ParamDecl>,
    patterns: HashMap<NodeId, MiniPattern>,
}

impl Analyzer<'_> {
    // ------------------------------------------------------------------
    // Passes
    // ------------------------------------------------------------------

    fn hoist_functions(&mut self) {
        for id in self.ast.statements.clone() {
            let loc = self.ast.loc(id);
            let NodeKind::FnDef { name, params, .. } = self.ast.kind(id).clone() else {
                continue;
            };

            for (i, p) in params.iter().enumerate() {
                if params[..i].iter().any(|q| q.name == p.name) {
                    self.error(
                        codes::DUPLICATE_PARAMETER,
                        format!("duplicate parameter '{}' in function '{name}'", p.name),
                        p.loc,
                    );
                }
            }

            let info = FunctionInfo {
                name: name.clone(),
                params: params
                    .iter()
                    .map(|p| FunctionParam {
                        name: p.name.clone(),
                        default: p.default,
                    })
                    .collect(),
                def: id,
            };
            if !self.symbols.define_function(info, loc) {
                self.redefinition(&name, loc);
            }
        }
    }

    fn analyze_function_bodies(&mut self) {
        for id in self.ast.statements.clone() {
            let NodeKind::FnDef { name, params, body } = self.ast.kind(id).clone() else {
                continue;
            };

            self.symbols.push_scope();
            for p in &params {
                self.symbols
                    .define(Symbol::new(&p.name, SymbolKind::Parameter).at(p.loc));
            }
            let body = self.rewrite(body, None);
            self.symbols.pop_scope();

            self.ast.node_mut(id).kind = NodeKind::FnDef { name, params, body };
        }
    }

    fn analyze_program(&mut self) {
        self.symbols.push_scope();

        let mut statements = self.ast.statements.clone();
        for stmt in statements.iter_mut() {
            let loc = self.ast.loc(*stmt);
            match self.ast.kind(*stmt).clone() {
                NodeKind::FnDef { .. } => {}
                NodeKind::Assign { name, value } => {
                    let value = self.rewrite(value, None);
                    self.ast.node_mut(*stmt).kind = NodeKind::Assign {
                        name: name.clone(),
                        value,
                    };
                    let sym = Symbol::new(&name, SymbolKind::Variable).at(loc);
                    if !self.symbols.define(sym) {
                        self.redefinition(&name, loc);
                    }
                }
                _ => *stmt = self.rewrite(*stmt, None),
            }
        }
        self.ast.statements = statements;

        self.symbols.pop_scope();
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// Resolve names and desugar pipes below `id`. `hole` is the node a `%`
    /// stands for, if inside the right-hand side of a pipe.
    fn rewrite(&mut self, id: NodeId, hole: Option<NodeId>) -> NodeId {
        let loc = self.ast.loc(id);
        match self.ast.kind(id).clone() {
            NodeKind::Number(_) | NodeKind::Bool(_) | NodeKind::Str(_) => id,
            NodeKind::Hole => match hole {
                Some(source) => source,
                None => {
                    self.error(
                        codes::HOLE_OUTSIDE_PIPE,
                        "'%' can only be used on the right side of '|>'",
                        loc,
                    );
                    id
                }
            },
            NodeKind::Ident(name) => {
                self.check_value_ref(&name, loc);
                id
            }
            NodeKind::Binary { op, lhs, rhs } => {
                let lhs = self.rewrite(lhs, hole);
                let rhs = self.rewrite(rhs, hole);
                self.ast.node_mut(id).kind = NodeKind::Binary { op, lhs, rhs };
                id
            }
            NodeKind::Pipe { lhs, rhs } => {
                let source = self.rewrite(lhs, hole);
                let is_call = matches!(self.ast.kind(rhs), NodeKind::Call { .. });
                if is_call && self.contains_hole(rhs) {
                    self.rewrite(rhs, Some(source))
                } else {
                    self.error(
                        codes::INVALID_PIPE_TARGET,
                        "right side of '|>' must be a call that uses '%'",
                        self.ast.loc(rhs),
                    );
                    source
                }
            }
            NodeKind::Call { name, args } => self.rewrite_call(id, name, args, hole),
            NodeKind::Assign { .. } | NodeKind::FnDef { .. } => {
                self.error(
                    codes::MISPLACED_STATEMENT,
                    "definitions are only allowed at the top level",
                    loc,
                );
                id
            }
        }
    }

    /// Whether a `%` below `id` would be filled by an enclosing pipe.
    fn contains_hole(&self, id: NodeId) -> bool {
        match self.ast.kind(id) {
            NodeKind::Hole => true,
            NodeKind::Binary { lhs, rhs, .. } => self.contains_hole(*lhs) || self.contains_hole(*rhs),
            NodeKind::Call { args, .. } => args.iter().any(|a| self.contains_hole(a.value)),
            // Holes in a nested pipe's right side belong to that pipe.
            NodeKind::Pipe { lhs, .. } => self.contains_hole(*lhs),
            _ => false,
        }
    }

    fn check_value_ref(&mut self, name: &str, loc: SourceLocation) {
        match self.symbols.lookup(name).map(Symbol::is_value) {
            None => self.error(
                codes::UNKNOWN_IDENTIFIER,
                format!("unknown identifier '{name}'"),
                loc,
            ),
            Some(false) => self.error(
                codes::FUNCTION_AS_VALUE,
                format!("'{name}' is a function and cannot be used as a value"),
                loc,
            ),
            Some(true) => {}
        }
    }

    fn rewrite_call(
        &mut self,
        id: NodeId,
        name: String,
        mut args: Vec<Arg>,
        hole: Option<NodeId>,
    ) -> NodeId {
        let loc = self.ast.loc(id);
        for arg in args.iter_mut() {
            arg.value = self.rewrite(arg.value, hole);
        }
        self.ast.node_mut(id).kind = NodeKind::Call {
            name: name.clone(),
            args: args.clone(),
        };

        let callee = match self.symbols.lookup(&name).map(|s| s.kind.clone()) {
            None => {
                self.error(
                    codes::UNKNOWN_FUNCTION,
                    format!("unknown function '{name}'"),
                    loc,
                );
                return id;
            }
            Some(SymbolKind::Variable | SymbolKind::Parameter) => {
                self.error(
                    codes::UNKNOWN_FUNCTION,
                    format!("'{name}' is a value, not a function"),
                    loc,
                );
                return id;
            }
            Some(SymbolKind::Builtin(info)) => Callee::Builtin(info),
            Some(SymbolKind::Function(info)) => Callee::Function(info),
        };

        let params: Vec<(String, ParamDefault)> = match &callee {
            Callee::Builtin(info) => info
                .params
                .iter()
                .map(|p| (p.name.to_string(), p.default))
                .collect(),
            Callee::Function(info) => info
                .params
                .iter()
                .map(|p| {
                    let default = p.default.map_or(ParamDefault::Required, ParamDefault::Value);
                    (p.name.clone(), default)
                })
                .collect(),
        };

        let Some(bound) = self.bind_args(&name, &params, &args, loc) else {
            return id;
        };

        let positional: Vec<Arg> = bound
            .iter()
            .map(|&value| Arg {
                name: None,
                value,
                loc: self.ast.loc(value),
            })
            .collect();
        self.ast.node_mut(id).kind = NodeKind::Call {
            name: name.clone(),
            args: positional,
        };

        if let Callee::Builtin(info) = callee {
            match info.kind {
                BuiltinKind::Op(_) => {}
                BuiltinKind::Pattern => self.check_pattern(bound[0]),
                BuiltinKind::Param(kind) => self.collect_param(&name, kind, &bound, loc),
            }
        }
        id
    }

    /// Map call arguments onto the callee's parameters, filling defaults.
    fn bind_args(
        &mut self,
        callee: &str,
        params: &[(String, ParamDefault)],
        args: &[Arg],
        loc: SourceLocation,
    ) -> Option<Vec<NodeId>> {
        let mut slots: Vec<Option<NodeId>> = vec![None; params.len()];
        let mut ok = true;
        let mut positional = 0;
        let mut seen_named = false;

        for arg in args {
            match &arg.name {
                Some(n) => {
                    seen_named = true;
                    match params.iter().position(|(p, _)| p == n) {
                        None => {
                            self.error(
                                codes::UNKNOWN_PARAMETER,
                                format!("'{callee}' has no parameter named '{n}'"),
                                arg.loc,
                            );
                            ok = false;
                        }
                        Some(i) if slots[i].is_some() => {
                            self.error(
                                codes::DUPLICATE_ARGUMENT,
                                format!("argument '{n}' is given more than once"),
                                arg.loc,
                            );
                            ok = false;
                        }
                        Some(i) => slots[i] = Some(arg.value),
                    }
                }
                None if seen_named => {
                    self.error(
                        codes::POSITIONAL_AFTER_NAMED,
                        "positional argument cannot follow a named argument",
                        arg.loc,
                    );
                    ok = false;
                }
                None => {
                    if let Some(slot) = slots.get_mut(positional) {
                        *slot = Some(arg.value);
                    }
                    positional += 1;
                }
            }
        }

        if positional > params.len() {
            self.error(
                codes::TOO_MANY_ARGUMENTS,
                format!(
                    "too many arguments to '{callee}': expected at most {}, got {positional}",
                    params.len()
                ),
                loc,
            );
            ok = false;
        }

        let mut missing = Vec::new();
        for i in 0..params.len() {
            if slots[i].is_some() {
                continue;
            }
            match params[i].1 {
                ParamDefault::Required => missing.push(i),
                ParamDefault::Value(v) => slots[i] = Some(self.ast.push(NodeKind::Number(v), loc)),
                ParamDefault::SameAs(j) => slots[i] = slots.get(j).copied().flatten(),
            }
        }

        if !missing.is_empty() {
            if seen_named {
                for i in missing {
                    self.error(
                        codes::MISSING_ARGUMENT,
                        format!("missing argument '{}' for '{callee}'", params[i].0),
                        loc,
                    );
                }
            } else {
                let required = params
                    .iter()
                    .filter(|(_, d)| *d == ParamDefault::Required)
                    .count();
                self.error(
                    codes::TOO_FEW_ARGUMENTS,
                    format!(
                        "too few arguments to '{callee}': expected at least {required}, got {positional}"
                    ),
                    loc,
                );
            }
            ok = false;
        }

        if !ok {
            return None;
        }
        slots.into_iter().collect()
    }

    fn check_pattern(&mut self, arg: NodeId) {
        let loc = self.ast.loc(arg);
        match self.ast.kind(arg) {
            NodeKind::Str(text) => match parse_mini(text, loc, self.filename) {
                Ok(pattern) => {
                    self.patterns.insert(arg, pattern);
                }
                Err(diag) => self.diagnostics.push(diag),
            },
            _ => self.error(
                codes::PATTERN_NOT_STRING,
                "pat() expects a string literal",
                loc,
            ),
        }
    }

    fn collect_param(&mut self, callee: &str, kind: ParamKind, args: &[NodeId], loc: SourceLocation) {
        let name = match self.ast.kind(args[0]) {
            NodeKind::Str(s) => s.clone(),
            _ => {
                self.error(
                    codes::INVALID_PARAM_DECL,
                    format!("{callee}() name must be a string literal"),
                    self.ast.loc(args[0]),
                );
                return;
            }
        };

        let mut values = Vec::with_capacity(args.len() - 1);
        for &arg in &args[1..] {
            match self.ast.kind(arg) {
                NodeKind::Number(v) => values.push(*v),
                _ => {
                    self.error(
                        codes::INVALID_PARAM_DECL,
                        format!("{callee}() settings must be number literals"),
                        self.ast.loc(arg),
                    );
                    return;
                }
            }
        }

        let (default, mut min, mut max) = match kind {
            ParamKind::Continuous => (values[0], values[1], values[2]),
            ParamKind::Button => (0.0, 0.0, 1.0),
            ParamKind::Toggle => (values[0], 0.0, 1.0),
        };
        if min > max {
            self.diagnostics.push(Diagnostic::warning(
                codes::PARAM_RANGE_SWAPPED,
                format!("parameter '{name}' has min greater than max; swapping them"),
                self.filename,
                loc,
            ));
            std::mem::swap(&mut min, &mut max);
        }
        let default = default.clamp(min, max);

        if let Some(prev) = self.params.iter().find(|p| p.name == name) {
            if prev.kind != kind || prev.min != min || prev.max != max {
                self.diagnostics.push(Diagnostic::warning(
                    codes::PARAM_REDECLARED,
                    format!(
                        "parameter '{name}' redeclared with a different range; the first declaration is used"
                    ),
                    self.filename,
                    loc,
                ));
            }
            return;
        }

        self.params.push(ParamDecl {
            name_hash: fnv1a(&name),
            name,
            kind,
            default,
            min,
            max,
            source_offset: loc.offset,
            source_length: loc.length,
        });
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    fn error(&mut self, code: &str, message: impl Into<String>, loc: SourceLocation) {
        self.diagnostics
            .push(Diagnostic::error(code, message, self.filename, loc));
    }

    fn redefinition(&mut self, name: &str, loc: SourceLocation) {
        let mut diag = Diagnostic::error(
            codes::REDEFINITION,
            format!("cannot redefine '{name}'"),
            self.filename,
            loc,
        );
        if let Some(prev) = self.symbols.lookup(name).and_then(|s| s.defined_at) {
            diag = diag.with_related(format!("previous definition of '{name}' is here"), prev);
        }
        self.diagnostics.push(diag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::lexer::lex;
    use crate::dsl::parser::parse;

    fn run(src: &str) -> AnalysisResult {
        let (tokens, lex_diags) = lex(src, "test.akk");
        assert!(lex_diags.is_empty(), "{lex_diags:?}");
        let (ast, parse_diags) = parse(tokens, "test.akk");
        assert!(parse_diags.is_empty(), "{parse_diags:?}");
        analyze(&ast, "test.akk")
    }

    fn ok(src: &str) -> AnalysisResult {
        let result = run(src);
        assert!(result.success, "unexpected diagnostics: {:?}", result.diagnostics);
        result
    }

    fn codes_of(src: &str) -> Vec<String> {
        run(src).diagnostics.into_iter().map(|d| d.code).collect()
    }

    fn call_args(ast: &Ast, id: NodeId) -> (String, Vec<NodeId>) {
        match ast.kind(id) {
            NodeKind::Call { name, args } => (name.clone(), args.iter().map(|a| a.value).collect()),
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn pipe_is_desugared_into_call() {
        let result = ok("saw(440) |> out(%, %)");
        let ast = &result.ast;
        let (name, args) = call_args(ast, ast.statements[0]);
        assert_eq!(name, "out");
        assert_eq!(args[0], args[1]);
        assert_eq!(call_args(ast, args[0]).0, "saw");
    }

    #[test]
    fn chained_pipes_nest() {
        let result = ok("saw(440) |> lp(%, 1000, 0.7) |> out(%)");
        let ast = &result.ast;
        let (_, out_args) = call_args(ast, ast.statements[0]);
        let (lp, lp_args) = call_args(ast, out_args[0]);
        assert_eq!(lp, "lp");
        assert_eq!(call_args(ast, lp_args[0]).0, "saw");
        // out(x) fills its right channel with the same node.
        assert_eq!(out_args[0], out_args[1]);
    }

    #[test]
    fn hole_inside_arithmetic_argument() {
        let result = ok("saw(110) |> out(% * 0.5)");
        let ast = &result.ast;
        let (_, args) = call_args(ast, ast.statements[0]);
        let NodeKind::Binary { lhs, .. } = ast.kind(args[0]) else {
            panic!("expected binary");
        };
        assert_eq!(call_args(ast, *lhs).0, "saw");
    }

    #[test]
    fn nested_pipe_holes_bind_to_their_own_pipe() {
        let result = ok("saw(1) |> out(%, sin(2) |> lp(%, 500))");
        let ast = &result.ast;
        let (_, args) = call_args(ast, ast.statements[0]);
        assert_eq!(call_args(ast, args[0]).0, "saw");
        let (_, lp_args) = call_args(ast, args[1]);
        assert_eq!(call_args(ast, lp_args[0]).0, "sin");
    }

    #[test]
    fn defaults_are_filled() {
        let result = ok("lp(saw(1), 800)");
        let ast = &result.ast;
        let (_, args) = call_args(ast, ast.statements[0]);
        assert_eq!(args.len(), 3);
        assert_eq!(ast.kind(args[2]), &NodeKind::Number(0.707));
    }

    #[test]
    fn named_arguments_are_reordered() {
        let result = ok("lp(q: 2, in: saw(1), cut: 300)");
        let ast = &result.ast;
        let (_, args) = call_args(ast, ast.statements[0]);
        assert_eq!(call_args(ast, args[0]).0, "saw");
        assert_eq!(ast.kind(args[1]), &NodeKind::Number(300.0));
        assert_eq!(ast.kind(args[2]), &NodeKind::Number(2.0));
    }

    #[test]
    fn argument_errors() {
        assert_eq!(codes_of("lp(saw(1))"), vec![codes::TOO_FEW_ARGUMENTS]);
        assert_eq!(codes_of("saw(1, 2)"), vec![codes::TOO_MANY_ARGUMENTS]);
        assert_eq!(codes_of("saw(pitch: 1)"), vec![codes::UNKNOWN_PARAMETER, codes::MISSING_ARGUMENT]);
        assert_eq!(codes_of("saw(1, freq: 2)"), vec![codes::DUPLICATE_ARGUMENT]);
        assert_eq!(codes_of("lp(in: saw(1), 300)"), vec![codes::POSITIONAL_AFTER_NAMED, codes::MISSING_ARGUMENT]);
        assert_eq!(codes_of("lp(q: 1, in: saw(1))"), vec![codes::MISSING_ARGUMENT]);
    }

    #[test]
    fn name_errors() {
        assert_eq!(codes_of("unknown_function(42)"), vec![codes::UNKNOWN_FUNCTION]);
        assert_eq!(codes_of("saw(nope)"), vec![codes::UNKNOWN_IDENTIFIER]);
        assert_eq!(codes_of("x = saw\n"), vec![codes::FUNCTION_AS_VALUE]);
        assert_eq!(codes_of("x = 1\nx(2)"), vec![codes::UNKNOWN_FUNCTION]);
    }

    #[test]
    fn pipe_errors() {
        assert_eq!(codes_of("%"), vec![codes::HOLE_OUTSIDE_PIPE]);
        assert_eq!(codes_of("saw(1) |> out(saw(2))"), vec![codes::INVALID_PIPE_TARGET]);
        assert_eq!(codes_of("saw(1) |> 3"), vec![codes::INVALID_PIPE_TARGET]);
        assert_eq!(codes_of("out(%)"), vec![codes::HOLE_OUTSIDE_PIPE]);
    }

    #[test]
    fn reassignment_is_rejected_with_note() {
        let result = run("x = 1\nx = 2\n");
        assert_eq!(result.diagnostics.len(), 1);
        let d = &result.diagnostics[0];
        assert_eq!(d.code, codes::REDEFINITION);
        assert_eq!(d.location.line, 2);
        assert_eq!(d.related.len(), 1);
        assert_eq!(d.related[0].location.line, 1);
    }

    #[test]
    fn variables_may_shadow_builtins() {
        ok("lp = 3\nout(lp)");
    }

    #[test]
    fn function_cannot_redefine_builtin() {
        let result = run("fn saw(x) -> x");
        assert_eq!(result.diagnostics[0].code, codes::REDEFINITION);
        assert!(result.diagnostics[0].related.is_empty());
    }

    #[test]
    fn functions_are_hoisted() {
        let result = ok("out(twice(saw(1)))\nfn twice(x) -> x * 2");
        assert!(matches!(
            result.symbols.lookup("twice").map(|s| &s.kind),
            Some(SymbolKind::Function(_))
        ));
        // The program scope is gone; only the global scope remains.
        assert_eq!(result.symbols.scope_depth(), 1);
    }

    #[test]
    fn function_bodies_cannot_see_program_variables() {
        assert_eq!(
            codes_of("y = 1\nfn f(x) -> x + y\nf(2)"),
            vec![codes::UNKNOWN_IDENTIFIER]
        );
    }

    #[test]
    fn function_defaults_and_duplicates() {
        let result = ok("fn f(a, b = 3) -> a + b\nf(1)");
        let (_, args) = call_args(&result.ast, result.ast.statements[1]);
        assert_eq!(result.ast.kind(args[1]), &NodeKind::Number(3.0));
        assert_eq!(codes_of("fn g(a, a) -> a"), vec![codes::DUPLICATE_PARAMETER]);
    }

    #[test]
    fn pattern_checks() {
        ok("pat(\"bd ~ sd ~\") |> out(%)");
        assert_eq!(codes_of("pat(42)"), vec![codes::PATTERN_NOT_STRING]);
        assert_eq!(codes_of("pat(\"bd [sd\")"), vec![codes::INVALID_PATTERN]);
    }

    #[test]
    fn parsed_patterns_are_kept_for_codegen() {
        let result = ok("pat(\"bd sd\")\npat(\"c4 e4 g4\")");
        assert_eq!(result.patterns.len(), 2);
        let (_, args) = call_args(&result.ast, result.ast.statements[1]);
        assert_eq!(result.patterns[&args[0]].events.len(), 3);
        assert!(run("pat(\"bd*5000\")").patterns.is_empty());
    }

    #[test]
    fn params_are_collected_and_deduplicated() {
        let result = run(
            "a = param(\"cutoff\", 800, 20, 2000)\nb = param(\"cutoff\", 800, 20, 2000)\nc = button(\"hit\")\nd = toggle(\"on\", 1)",
        );
        assert!(result.success);
        assert!(result.diagnostics.is_empty());
        let names: Vec<_> = result.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["cutoff", "hit", "on"]);
        let cutoff = &result.params[0];
        assert_eq!(cutoff.kind, ParamKind::Continuous);
        assert_eq!(cutoff.name_hash, fnv1a("cutoff"));
        assert_eq!((cutoff.default, cutoff.min, cutoff.max), (800.0, 20.0, 2000.0));
        assert_eq!(cutoff.source_offset, 4);
        assert_eq!(result.params[2].default, 1.0);
    }

    #[test]
    fn param_warnings() {
        let result = run("a = param(\"x\", 5, 10, 0)\nb = param(\"x\", 5, 0, 1)");
        assert!(result.success);
        let codes: Vec<_> = result.diagnostics.iter().map(|d| d.code.as_str()).collect();
        assert_eq!(codes, vec![codes::PARAM_RANGE_SWAPPED, codes::PARAM_REDECLARED]);
        let x = &result.params[0];
        assert_eq!((x.min, x.max, x.default), (0.0, 10.0, 5.0));
    }

    #[test]
    fn param_shape_errors() {
        assert_eq!(codes_of("param(cut, 1)"), vec![codes::UNKNOWN_IDENTIFIER, codes::INVALID_PARAM_DECL]);
        assert_eq!(codes_of("param(\"c\", saw(1))"), vec![codes::INVALID_PARAM_DECL]);
    }

    #[test]
    fn input_ast_is_left_untouched() {
        let (tokens, _) = lex("saw(1) |> out(%)", "t");
        let (ast, _) = parse(tokens, "t");
        let before = ast.clone();
        let _ = analyze(&ast, "t");
        assert_eq!(ast, before);
    }
}
