//! Node kinds and tree constructors
//!
//! Every language construct is one variant of [`NodeKind`] behind the single
//! evaluation capability on [`AnnotatedNode`]; adding a construct means
//! adding a variant, not a subclass. Each kind declares its branch arity and
//! whether its own semantics are evaluation-pure (no environment, network,
//! or randomness access), which gates the parallel branch helper.

use serde::{Deserialize, Serialize};

use super::tree::AnnotatedNode;
use super::value::{BinaryOp, FoldOp, UnaryOp, Value};

/// Branch-count constraint for a node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// The kind expects exactly this many branches.
    Exact(usize),
    /// The kind accepts this many branches or more.
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => *n == count,
            Arity::AtLeast(min) => count >= *min,
        }
    }
}

impl std::fmt::Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "exactly {n}"),
            Arity::AtLeast(min) => write!(f, "at least {min}"),
        }
    }
}

/// The semantics of one AST node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum NodeKind {
    /// Literal value.
    Constant { value: Value },
    /// Time elapsed since this device's previous round, in seconds.
    DeltaTime,
    /// Wall-clock time of the current round, in seconds.
    CurrentTime,
    /// Uniform double in `[0, 1)` from the device's seeded source.
    Random,
    /// Environment read; unbound is a recoverable error.
    Variable { name: String },
    /// Two-operand operator, pointwise over fields.
    Binary { op: BinaryOp },
    /// One-operand operator, pointwise over fields.
    Unary { op: UnaryOp },
    /// Evaluate all branches in order; the last one's value is the result.
    Sequence,
    /// Branches `[condition, then, else]`. The taken branch is evaluated in
    /// its own frame; the untaken branch is erased.
    If,
    /// Branches `[init, update]`. State persists across rounds in the
    /// environment under a key derived from `binding` and the current
    /// call-stack path; the previous value is bound to `binding` while the
    /// update branch runs.
    Repeat { binding: String },
    /// One branch. Exports the branch's value at the current path and
    /// yields the field of values neighbors exported at that same path,
    /// plus this device's own.
    Neighbors,
    /// Branches `[field, default]`. Reduces the field's values; the default
    /// covers the empty field.
    Fold { op: FoldOp },
}

impl NodeKind {
    pub fn arity(&self) -> Arity {
        match self {
            NodeKind::Constant { .. }
            | NodeKind::DeltaTime
            | NodeKind::CurrentTime
            | NodeKind::Random
            | NodeKind::Variable { .. } => Arity::Exact(0),
            NodeKind::Unary { .. } | NodeKind::Neighbors => Arity::Exact(1),
            NodeKind::Binary { .. } | NodeKind::Repeat { .. } | NodeKind::Fold { .. } => {
                Arity::Exact(2)
            }
            NodeKind::If => Arity::Exact(3),
            NodeKind::Sequence => Arity::AtLeast(1),
        }
    }

    /// Whether this kind's own evaluation touches no context service beyond
    /// time and device identity. A subtree is parallel-safe only if every
    /// kind in it is pure.
    pub fn is_pure(&self) -> bool {
        match self {
            NodeKind::Constant { .. }
            | NodeKind::DeltaTime
            | NodeKind::CurrentTime
            | NodeKind::Binary { .. }
            | NodeKind::Unary { .. }
            | NodeKind::Sequence
            | NodeKind::If
            | NodeKind::Fold { .. } => true,
            NodeKind::Random
            | NodeKind::Variable { .. }
            | NodeKind::Repeat { .. }
            | NodeKind::Neighbors => false,
        }
    }

    /// Short name used by the diagnostic tree dump.
    pub fn label(&self) -> String {
        match self {
            NodeKind::Constant { value } => value.to_string(),
            NodeKind::DeltaTime => "dt".to_string(),
            NodeKind::CurrentTime => "now".to_string(),
            NodeKind::Random => "random".to_string(),
            NodeKind::Variable { name } => name.clone(),
            NodeKind::Binary { op } => op.symbol().to_string(),
            NodeKind::Unary { op } => op.symbol().to_string(),
            NodeKind::Sequence => "seq".to_string(),
            NodeKind::If => "if".to_string(),
            NodeKind::Repeat { binding } => format!("rep({binding})"),
            NodeKind::Neighbors => "nbr".to_string(),
            NodeKind::Fold { op } => op.label().to_string(),
        }
    }
}

/* ===================== Constructors ===================== */

impl AnnotatedNode {
    pub fn constant(value: Value) -> Self {
        AnnotatedNode::new(NodeKind::Constant { value }, Vec::new())
    }

    pub fn num(n: f64) -> Self {
        Self::constant(Value::Num(n))
    }

    pub fn bool(b: bool) -> Self {
        Self::constant(Value::Bool(b))
    }

    pub fn str(s: impl Into<String>) -> Self {
        Self::constant(Value::Str(s.into()))
    }

    pub fn delta_time() -> Self {
        AnnotatedNode::new(NodeKind::DeltaTime, Vec::new())
    }

    pub fn current_time() -> Self {
        AnnotatedNode::new(NodeKind::CurrentTime, Vec::new())
    }

    pub fn random() -> Self {
        AnnotatedNode::new(NodeKind::Random, Vec::new())
    }

    pub fn variable(name: impl Into<String>) -> Self {
        AnnotatedNode::new(NodeKind::Variable { name: name.into() }, Vec::new())
    }

    pub fn binary(op: BinaryOp, lhs: AnnotatedNode, rhs: AnnotatedNode) -> Self {
        AnnotatedNode::new(NodeKind::Binary { op }, vec![lhs, rhs])
    }

    pub fn unary(op: UnaryOp, inner: AnnotatedNode) -> Self {
        AnnotatedNode::new(NodeKind::Unary { op }, vec![inner])
    }

    pub fn sequence(branches: Vec<AnnotatedNode>) -> Self {
        AnnotatedNode::new(NodeKind::Sequence, branches)
    }

    pub fn conditional(
        condition: AnnotatedNode,
        then_branch: AnnotatedNode,
        else_branch: AnnotatedNode,
    ) -> Self {
        AnnotatedNode::new(NodeKind::If, vec![condition, then_branch, else_branch])
    }

    pub fn repeat(
        binding: impl Into<String>,
        init: AnnotatedNode,
        update: AnnotatedNode,
    ) -> Self {
        AnnotatedNode::new(
            NodeKind::Repeat {
                binding: binding.into(),
            },
            vec![init, update],
        )
    }

    pub fn neighbors(inner: AnnotatedNode) -> Self {
        AnnotatedNode::new(NodeKind::Neighbors, vec![inner])
    }

    pub fn fold(op: FoldOp, field: AnnotatedNode, default: AnnotatedNode) -> Self {
        AnnotatedNode::new(NodeKind::Fold { op }, vec![field, default])
    }
}
