//! Tests for call-stack balance and path-keyed alignment

use chrono::Utc;
use std::time::Duration;

use super::helpers::{counter, num, round_context, sum_tree};
use crate::error::EvalError;
use crate::interpreter::tree::AnnotatedNode;
use crate::interpreter::value::{BinaryOp, Value};
use crate::vm::context::ExecutionContext;

#[test]
fn stack_is_balanced_after_successful_eval() {
    let mut tree = sum_tree();
    let mut ctx = round_context(1.0);

    assert_eq!(ctx.stack_depth(), 0);
    tree.eval(&mut ctx).unwrap();
    assert_eq!(ctx.stack_depth(), 0);
}

#[test]
fn stack_is_balanced_after_failed_eval() {
    // The failure happens two frames deep; every frame must unwind.
    let mut tree = AnnotatedNode::sequence(vec![AnnotatedNode::binary(
        BinaryOp::Add,
        AnnotatedNode::num(1.0),
        AnnotatedNode::variable("missing"),
    )]);
    let mut ctx = round_context(1.0);

    match tree.eval(&mut ctx) {
        Err(EvalError::UnboundVariable { name }) => assert_eq!(name, "missing"),
        other => panic!("expected an unbound variable, got {other:?}"),
    }
    assert_eq!(ctx.stack_depth(), 0);
}

#[test]
fn repeat_state_is_keyed_by_call_stack_path() {
    // The counter sits at branch ordinal 1, so its state key embeds /1.
    let mut tree = AnnotatedNode::sequence(vec![AnnotatedNode::num(7.0), counter("x")]);
    let mut ctx = round_context(1.0);

    tree.eval(&mut ctx).unwrap();
    assert!(ctx.env_has("x@/1").unwrap());
    assert_eq!(ctx.env_get("x@/1").unwrap(), Some(Value::Num(1.0)));
    // The transient binding does not leak out of the update branch.
    assert!(!ctx.env_has("x").unwrap());

    // Same tree, next round: the same position reads the same state.
    ctx.commit_round();
    ctx.begin_round(Duration::from_secs(1), Utc::now());
    tree.eval(&mut ctx).unwrap();
    assert_eq!(ctx.env_get("x@/1").unwrap(), Some(Value::Num(2.0)));
    assert_eq!(num(&tree.annotation().cloned()), 2.0);
}

#[test]
fn copied_subtree_at_the_same_position_shares_state() {
    // Paths identify positions, not node instances: a re-instantiated
    // program copy picks up where the original left off.
    let mut tree = counter("x");
    let mut ctx = round_context(1.0);
    tree.eval(&mut ctx).unwrap();
    assert_eq!(num(&tree.annotation().cloned()), 1.0);

    let mut replacement = tree.copy();
    ctx.commit_round();
    ctx.begin_round(Duration::from_secs(1), Utc::now());
    replacement.eval(&mut ctx).unwrap();
    assert_eq!(num(&replacement.annotation().cloned()), 2.0);
}

#[test]
fn sibling_positions_have_independent_state() {
    // Two instances of the same counter subtree under different ordinals
    // must not share state.
    let mut tree = AnnotatedNode::sequence(vec![counter("x"), counter("x")]);
    let mut ctx = round_context(1.0);

    for _ in 0..3 {
        tree.eval(&mut ctx).unwrap();
        ctx.commit_round();
        ctx.begin_round(Duration::from_secs(1), Utc::now());
    }

    assert_eq!(ctx.env_get("x@/0").unwrap(), Some(Value::Num(3.0)));
    assert_eq!(ctx.env_get("x@/1").unwrap(), Some(Value::Num(3.0)));
}

#[test]
fn conditional_erases_the_untaken_branch() {
    let mut tree = AnnotatedNode::conditional(
        AnnotatedNode::variable("flag"),
        AnnotatedNode::num(1.0),
        AnnotatedNode::num(2.0),
    );
    let mut ctx = round_context(1.0);

    ctx.env_put("flag", Value::Bool(true)).unwrap();
    tree.eval(&mut ctx).unwrap();
    assert_eq!(tree.annotation(), Some(&Value::Num(1.0)));
    assert!(!tree.branches()[1].is_erased());
    assert!(tree.branches()[2].is_erased());

    ctx.env_put("flag", Value::Bool(false)).unwrap();
    tree.eval(&mut ctx).unwrap();
    assert_eq!(tree.annotation(), Some(&Value::Num(2.0)));
    assert!(tree.branches()[1].is_erased());
    assert!(!tree.branches()[2].is_erased());
}

#[test]
fn conditional_branches_keep_state_apart() {
    // A counter under `then` lives at /1/..., a counter under `else` at
    // /2/...; switching branches starts the other counter fresh while the
    // first one's state stays in the environment.
    let mut tree = AnnotatedNode::conditional(
        AnnotatedNode::variable("flag"),
        counter("x"),
        counter("x"),
    );
    let mut ctx = round_context(1.0);

    ctx.env_put("flag", Value::Bool(true)).unwrap();
    for _ in 0..2 {
        tree.eval(&mut ctx).unwrap();
        ctx.commit_round();
        ctx.begin_round(Duration::from_secs(1), Utc::now());
    }
    assert_eq!(ctx.env_get("x@/1").unwrap(), Some(Value::Num(2.0)));
    assert_eq!(ctx.env_get("x@/2").unwrap(), None);

    ctx.env_put("flag", Value::Bool(false)).unwrap();
    tree.eval(&mut ctx).unwrap();
    assert_eq!(num(&tree.annotation().cloned()), 1.0);
    assert_eq!(ctx.env_get("x@/2").unwrap(), Some(Value::Num(1.0)));
    assert_eq!(ctx.env_get("x@/1").unwrap(), Some(Value::Num(2.0)));
}

#[test]
fn repeat_restores_a_shadowed_outer_binding() {
    let mut tree = counter("x");
    let mut ctx = round_context(1.0);

    ctx.env_put("x", Value::Str("outer".to_string())).unwrap();
    tree.eval(&mut ctx).unwrap();
    assert_eq!(
        ctx.env_get("x").unwrap(),
        Some(Value::Str("outer".to_string()))
    );
}

#[test]
fn repeat_restores_the_binding_when_the_update_fails() {
    let mut tree = AnnotatedNode::repeat(
        "x",
        AnnotatedNode::num(0.0),
        AnnotatedNode::binary(
            BinaryOp::Add,
            AnnotatedNode::variable("x"),
            AnnotatedNode::variable("missing"),
        ),
    );
    let mut ctx = round_context(1.0);

    assert!(tree.eval(&mut ctx).is_err());
    assert_eq!(ctx.stack_depth(), 0);
    assert!(!ctx.env_has("x").unwrap());
}
