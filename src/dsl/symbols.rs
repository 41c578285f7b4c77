//! Lexically scoped symbol table.
//!
//! Scopes form a stack of hash-keyed maps. The global scope is created with
//! every builtin and alias already registered and is never popped.

use std::collections::HashMap;

use super::ast::NodeId;
use super::builtins::{self, BuiltinInfo};
use super::error::SourceLocation;
use crate::bytecode::BUFFER_UNUSED;

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

/// 32-bit FNV-1a hash. Used for symbol keys, state ids and parameter ids.
pub fn fnv1a(s: &str) -> u32 {
    s.bytes().fold(FNV_OFFSET_BASIS, |hash, b| {
        (hash ^ b as u32).wrapping_mul(FNV_PRIME)
    })
}

/// A user-defined function, expanded inline at each call site.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionInfo {
    pub name: String,
    pub params: Vec<FunctionParam>,
    /// The `FnDef` node holding the body.
    pub def: NodeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionParam {
    pub name: String,
    pub default: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolKind {
    Variable,
    Parameter,
    Builtin(&'static BuiltinInfo),
    Function(FunctionInfo),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub name_hash: u32,
    pub kind: SymbolKind,
    /// Buffer holding the value; [`BUFFER_UNUSED`] unless a variable or
    /// parameter has been bound by codegen.
    pub buffer: u16,
    pub defined_at: Option<SourceLocation>,
}

impl Symbol {
    pub fn new(name: &str, kind: SymbolKind) -> Self {
        Self {
            name: name.to_string(),
            name_hash: fnv1a(name),
            kind,
            buffer: BUFFER_UNUSED,
            defined_at: None,
        }
    }

    pub fn at(mut self, loc: SourceLocation) -> Self {
        self.defined_at = Some(loc);
        self
    }

    pub fn is_value(&self) -> bool {
        matches!(self.kind, SymbolKind::Variable | SymbolKind::Parameter)
    }
}

#[derive(Debug, Clone)]
pub struct SymbolTable {
    scopes: Vec<HashMap<u32, Symbol>>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    /// A table whose global scope holds every builtin and alias.
    ///
    /// # Panics
    ///
    /// If an alias names a builtin that does not exist.
    pub fn new() -> Self {
        let mut table = Self {
            scopes: vec![HashMap::new()],
        };

        for info in builtins::BUILTINS {
            table.define(Symbol::new(info.name, SymbolKind::Builtin(info)));
        }

        for (alias, canonical) in builtins::ALIASES {
            let mut sym = table
                .lookup(canonical)
                .cloned()
                .unwrap_or_else(|| panic!("alias '{alias}' refers to unknown builtin '{canonical}'"));
            sym.name = alias.to_string();
            sym.name_hash = fnv1a(alias);
            table.define(sym);
        }

        table
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Close the innermost scope. The global scope is never removed.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    /// Insert into the innermost scope. Returns false, leaving the scope
    /// untouched, when the name is already defined there.
    pub fn define(&mut self, symbol: Symbol) -> bool {
        let Some(scope) = self.scopes.last_mut() else {
            return false;
        };
        if scope.contains_key(&symbol.name_hash) {
            return false;
        }
        scope.insert(symbol.name_hash, symbol);
        true
    }

    pub fn define_variable(&mut self, name: &str, buffer: u16) -> bool {
        let mut sym = Symbol::new(name, SymbolKind::Variable);
        sym.buffer = buffer;
        self.define(sym)
    }

    pub fn define_parameter(&mut self, name: &str, buffer: u16) -> bool {
        let mut sym = Symbol::new(name, SymbolKind::Parameter);
        sym.buffer = buffer;
        self.define(sym)
    }

    pub fn define_function(&mut self, info: FunctionInfo, loc: SourceLocation) -> bool {
        let name = info.name.clone();
        self.define(Symbol::new(&name, SymbolKind::Function(info)).at(loc))
    }

    /// Innermost symbol with this name.
    ///
    /// Entries whose hash matches but whose stored name differs are skipped,
    /// so a hash collision resolves to an outer scope instead of the wrong symbol.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        let hash = fnv1a(name);
        self.scopes
            .iter()
            .rev()
            .filter_map(|scope| scope.get(&hash))
            .find(|sym| sym.name == name)
    }

    pub fn lookup_hash(&self, hash: u32) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|scope| scope.get(&hash))
    }

    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        let hash = fnv1a(name);
        self.scopes
            .iter_mut()
            .rev()
            .filter_map(|scope| scope.get_mut(&hash))
            .find(|sym| sym.name == name)
    }

    pub fn is_defined_in_current_scope(&self, name: &str) -> bool {
        self.scopes
            .last()
            .and_then(|scope| scope.get(&fnv1a(name)))
            .is_some_and(|sym| sym.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::builtins::BuiltinKind;
    use crate::bytecode::Opcode;

    #[test]
    fn fnv1a_known_vectors() {
        assert_eq!(fnv1a(""), 0x811c9dc5);
        assert_eq!(fnv1a("a"), 0xe40c292c);
        assert_eq!(fnv1a("foobar"), 0xbf9cf968);
    }

    #[test]
    fn builtins_and_aliases_are_global() {
        let table = SymbolTable::new();
        assert_eq!(table.scope_depth(), 1);

        let saw = table.lookup("saw").unwrap();
        let SymbolKind::Builtin(info) = &saw.kind else {
            panic!("expected builtin");
        };
        assert_eq!(info.kind, BuiltinKind::Op(Opcode::OscSaw));
        assert_eq!(saw.buffer, BUFFER_UNUSED);

        let alias = table.lookup("sawtooth").unwrap();
        assert_eq!(alias.name, "sawtooth");
        assert_eq!(alias.name_hash, fnv1a("sawtooth"));
        assert_eq!(alias.kind, saw.kind);
    }

    #[test]
    fn define_in_same_scope_fails() {
        let mut table = SymbolTable::new();
        table.push_scope();
        assert!(table.define_variable("x", 1));
        assert!(!table.define_variable("x", 2));
        assert_eq!(table.lookup("x").unwrap().buffer, 1);
    }

    #[test]
    fn nested_scope_shadows_until_pop() {
        let mut table = SymbolTable::new();
        table.push_scope();
        table.define_variable("x", 1);
        table.push_scope();
        assert!(!table.is_defined_in_current_scope("x"));
        assert!(table.define_parameter("x", 7));
        assert!(table.is_defined_in_current_scope("x"));
        assert_eq!(table.lookup("x").unwrap().buffer, 7);
        assert_eq!(table.lookup("x").unwrap().kind, SymbolKind::Parameter);
        table.pop_scope();
        assert_eq!(table.lookup("x").unwrap().buffer, 1);
    }

    #[test]
    fn builtins_can_be_shadowed_in_inner_scope() {
        let mut table = SymbolTable::new();
        assert!(!table.define_variable("lp", 3));
        table.push_scope();
        assert!(table.define_variable("lp", 3));
        assert!(table.lookup("lp").unwrap().is_value());
    }

    #[test]
    fn global_scope_survives_extra_pops() {
        let mut table = SymbolTable::new();
        table.pop_scope();
        table.pop_scope();
        assert_eq!(table.scope_depth(), 1);
        assert!(table.lookup("out").is_some());
    }

    #[test]
    fn lookup_by_hash() {
        let table = SymbolTable::new();
        assert_eq!(table.lookup_hash(fnv1a("lp")).unwrap().name, "lp");
        assert!(table.lookup_hash(fnv1a("nope")).is_none());
    }

    #[test]
    fn hash_hit_with_different_name_is_skipped() {
        let mut table = SymbolTable::new();
        table.push_scope();
        // Plant a symbol under the hash of "x" but with a different name.
        let mut impostor = Symbol::new("x", SymbolKind::Variable);
        impostor.name = "y".to_string();
        table.define(impostor);
        assert!(table.lookup("x").is_none());
        assert!(!table.is_defined_in_current_scope("x"));
    }

    #[test]
    fn functions_record_definition_site() {
        let mut table = SymbolTable::new();
        let info = FunctionInfo {
            name: "f".into(),
            params: vec![],
            def: NodeId(0),
        };
        let loc = SourceLocation::new(2, 1, 10, 5);
        assert!(table.define_function(info.clone(), loc));
        assert!(!table.define_function(info, loc));
        assert_eq!(table.lookup("f").unwrap().defined_at, Some(loc));
    }
}
