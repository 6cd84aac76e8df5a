//! Test helpers for interpreter tests

use chrono::Utc;
use std::time::Duration;

use crate::interpreter::tree::AnnotatedNode;
use crate::interpreter::value::{BinaryOp, Value};
use crate::vm::context::RoundContext;

/// Isolated single-device context with one round begun at the given
/// delta-time.
pub fn round_context(delta_time_secs: f64) -> RoundContext {
    let mut ctx = RoundContext::isolated(0);
    ctx.begin_round(Duration::from_secs_f64(delta_time_secs), Utc::now());
    ctx
}

/// `1 + 2`
pub fn sum_tree() -> AnnotatedNode {
    AnnotatedNode::binary(BinaryOp::Add, AnnotatedNode::num(1.0), AnnotatedNode::num(2.0))
}

/// A counter: starts at 0, adds 1 every round.
pub fn counter(binding: &str) -> AnnotatedNode {
    AnnotatedNode::repeat(
        binding,
        AnnotatedNode::num(0.0),
        AnnotatedNode::binary(
            BinaryOp::Add,
            AnnotatedNode::variable(binding),
            AnnotatedNode::num(1.0),
        ),
    )
}

/// Assert that every node in the subtree is erased.
pub fn assert_all_erased(node: &AnnotatedNode) {
    assert!(node.is_erased(), "expected erased node, got {node}");
    assert!(node.annotation().is_none());
    for branch in node.branches() {
        assert_all_erased(branch);
    }
}

/// Assert that every node in the subtree carries an annotation.
pub fn assert_all_annotated(node: &AnnotatedNode) {
    assert!(!node.is_erased(), "expected annotated node, got {node}");
    for branch in node.branches() {
        assert_all_annotated(branch);
    }
}

pub fn num(value: &Option<Value>) -> f64 {
    match value {
        Some(Value::Num(n)) => *n,
        other => panic!("expected a number, got {other:?}"),
    }
}
