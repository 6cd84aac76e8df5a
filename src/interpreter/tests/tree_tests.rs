//! Tests for tree lifecycle: erase, copy, render

use super::helpers::{assert_all_annotated, assert_all_erased, round_context, sum_tree};
use crate::error::EvalError;
use crate::interpreter::nodes::NodeKind;
use crate::interpreter::tree::AnnotatedNode;
use crate::interpreter::value::Value;

#[test]
fn fresh_tree_is_fully_erased() {
    assert_all_erased(&sum_tree());
}

#[test]
fn eval_annotates_every_node_reached() {
    let mut tree = sum_tree();
    let mut ctx = round_context(1.0);
    tree.eval(&mut ctx).unwrap();

    assert_all_annotated(&tree);
    assert_eq!(tree.annotation(), Some(&Value::Num(3.0)));
}

#[test]
fn erase_clears_every_descendant_and_eval_restores() {
    let mut tree = sum_tree();
    let mut ctx = round_context(1.0);
    tree.eval(&mut ctx).unwrap();

    tree.erase();
    assert_all_erased(&tree);

    tree.eval(&mut ctx).unwrap();
    assert_all_annotated(&tree);
}

#[test]
fn eval_overwrites_the_previous_annotation() {
    let mut leaf = AnnotatedNode::delta_time();

    let mut ctx = round_context(0.5);
    leaf.eval(&mut ctx).unwrap();
    assert_eq!(leaf.annotation(), Some(&Value::Num(0.5)));

    let mut ctx = round_context(2.0);
    leaf.eval(&mut ctx).unwrap();
    assert_eq!(leaf.annotation(), Some(&Value::Num(2.0)));
}

#[test]
fn copy_starts_erased_and_is_independent() {
    let mut original = sum_tree();
    let mut ctx = round_context(1.0);
    original.eval(&mut ctx).unwrap();

    let mut copied = original.copy();
    assert_all_erased(&copied);
    assert_eq!(original.annotation(), Some(&Value::Num(3.0)));

    copied.eval(&mut ctx).unwrap();
    original.erase();
    assert_eq!(copied.annotation(), Some(&Value::Num(3.0)));
}

#[test]
fn equivalent_copies_render_identically() {
    let original = sum_tree();
    assert_eq!(original.copy().render(), sum_tree().render());
}

#[test]
fn render_marks_erased_nodes() {
    let tree = sum_tree();
    assert_eq!(tree.render(), "|+|\n\t|1|\n\t|2|");
}

#[test]
fn render_shows_annotations_inline() {
    let mut tree = sum_tree();
    let mut ctx = round_context(1.0);
    tree.eval(&mut ctx).unwrap();
    assert_eq!(tree.render(), "+: 3\n\t1: 1\n\t2: 2");
}

#[test]
fn render_works_on_partially_evaluated_trees() {
    // A failing branch leaves the tree half-annotated; the dump must still
    // be usable for debugging the failed round.
    let mut tree = AnnotatedNode::binary(
        crate::interpreter::value::BinaryOp::Add,
        AnnotatedNode::num(1.0),
        AnnotatedNode::variable("missing"),
    );
    let mut ctx = round_context(1.0);
    assert!(tree.eval(&mut ctx).is_err());

    assert_eq!(tree.render(), "|+|\n\t1: 1\n\t|missing|");
}

#[test]
fn delta_time_scenario() {
    let mut leaf = AnnotatedNode::delta_time();
    let mut ctx = round_context(0.5);

    leaf.eval(&mut ctx).unwrap();
    assert_eq!(leaf.annotation(), Some(&Value::Num(0.5)));
    assert_eq!(leaf.render(), "dt: 0.5");

    leaf.erase();
    assert_eq!(leaf.render(), "|dt|");
}

#[test]
fn wrong_branch_count_is_a_structural_error() {
    let mut malformed = AnnotatedNode::new(NodeKind::If, vec![AnnotatedNode::num(1.0)]);
    let mut ctx = round_context(1.0);
    match malformed.eval(&mut ctx) {
        Err(EvalError::MalformedTree { .. }) => {}
        other => panic!("expected a structural error, got {other:?}"),
    }
}
