//! Abstract Syntax Tree for the Akkado language.
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]. The analyzer
//! rewrites a clone of the arena in place, so ids stay valid across phases and
//! one node may be referenced from several parents (a pipe producer feeding
//! several holes).

use super::error::SourceLocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// A parsed program.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ast {
    pub nodes: Vec<Node>,
    /// Top-level statements in source order.
    pub statements: Vec<NodeId>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: NodeKind, loc: SourceLocation) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { kind, loc });
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn loc(&self, id: NodeId) -> SourceLocation {
        self.node(id).loc
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Number(f64),
    Bool(bool),
    Str(String),
    Ident(String),
    /// `%`, the value flowing in from the left of a pipe.
    Hole,
    Binary {
        op: BinOp,
        lhs: NodeId,
        rhs: NodeId,
    },
    Call {
        name: String,
        args: Vec<Arg>,
    },
    Pipe {
        lhs: NodeId,
        rhs: NodeId,
    },
    Assign {
        name: String,
        value: NodeId,
    },
    FnDef {
        name: String,
        params: Vec<FnParam>,
        body: NodeId,
    },
}

/// A call argument, optionally named (`cut: 800`).
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub name: Option<String>,
    pub value: NodeId,
    pub loc: SourceLocation,
}

/// A parameter in a `fn` definition.
#[derive(Debug, Clone, PartialEq)]
pub struct FnParam {
    pub name: String,
    pub default: Option<f64>,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinOp {
    /// Builtin function the operator is equivalent to.
    pub fn builtin_name(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::Div => "div",
            BinOp::Pow => "pow",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_assigns_sequential_ids() {
        let mut ast = Ast::new();
        let a = ast.push(NodeKind::Number(1.0), SourceLocation::default());
        let b = ast.push(NodeKind::Hole, SourceLocation::default());
        assert_eq!(a, NodeId(0));
        assert_eq!(b, NodeId(1));
        assert_eq!(ast.kind(b), &NodeKind::Hole);
        assert!(ast.is_empty());
    }
}
