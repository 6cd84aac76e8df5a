//! Per-kind evaluation semantics
//!
//! Dispatched from [`AnnotatedNode::eval`] after structural validation.
//! Handlers read and write branch annotations through the branch helpers so
//! every descent is wrapped in a call-stack frame keyed by ordinal.

use super::nodes::NodeKind;
use super::path::FrameId;
use super::tree::AnnotatedNode;
use super::value::{apply_binary, apply_unary, fold_field, Value};
use crate::error::{EvalError, EvalResult};
use crate::vm::context::ExecutionContext;

const COND: usize = 0;
const THEN: usize = 1;
const ELSE: usize = 2;

const INIT: usize = 0;
const UPDATE: usize = 1;

pub(crate) fn eval_node(node: &mut AnnotatedNode, ctx: &mut dyn ExecutionContext) -> EvalResult {
    let annotation = match node.kind().clone() {
        NodeKind::Constant { value } => value,
        NodeKind::DeltaTime => Value::Num(ctx.delta_time().as_secs_f64()),
        NodeKind::CurrentTime => {
            Value::Num(ctx.current_time().timestamp_millis() as f64 / 1000.0)
        }
        NodeKind::Random => Value::Num(ctx.next_random_double()?),
        NodeKind::Variable { name } => ctx
            .env_get(&name)?
            .ok_or(EvalError::UnboundVariable { name })?,
        NodeKind::Binary { op } => {
            node.eval_branches_parallel(ctx)?;
            apply_binary(op, &node.branch_annotation(0)?, &node.branch_annotation(1)?)?
        }
        NodeKind::Unary { op } => {
            node.eval_branches(ctx)?;
            apply_unary(op, &node.branch_annotation(0)?)?
        }
        NodeKind::Sequence => {
            node.eval_branches(ctx)?;
            node.branch_annotation(node.branches().len() - 1)?
        }
        NodeKind::If => eval_if(node, ctx)?,
        NodeKind::Repeat { binding } => eval_repeat(node, ctx, &binding)?,
        NodeKind::Neighbors => eval_neighbors(node, ctx)?,
        NodeKind::Fold { op } => {
            node.eval_branches(ctx)?;
            let default = node.branch_annotation(1)?;
            match node.branch_annotation(0)? {
                Value::Field(field) => fold_field(op, &field, &default)?,
                other => {
                    return Err(EvalError::TypeMismatch {
                        operation: "fold",
                        found: other.type_name().to_string(),
                    })
                }
            }
        }
    };
    node.set_annotation(annotation);
    Ok(())
}

/// Condition in frame 0, the taken branch in its own frame. The untaken
/// branch is erased so state cached under it cannot survive a branch
/// switch; devices on opposite branches align on nothing below this node.
fn eval_if(node: &mut AnnotatedNode, ctx: &mut dyn ExecutionContext) -> EvalResult<Value> {
    node.branch_mut(COND)
        .eval_in_new_stack_frame(ctx, COND as FrameId)?;
    let taken = if node.branch_annotation(COND)?.is_truthy() {
        THEN
    } else {
        ELSE
    };
    let skipped = if taken == THEN { ELSE } else { THEN };
    node.branch_mut(skipped).erase();
    node.branch_mut(taken)
        .eval_in_new_stack_frame(ctx, taken as FrameId)?;
    node.branch_annotation(taken)
}

/// State survives rounds in the environment under a key derived from the
/// binding name and the current call-stack path, never from node identity:
/// a node re-instantiated by `copy` at the same position reads the same
/// state, and two instances of the same subtree at different positions do
/// not share any.
fn eval_repeat(
    node: &mut AnnotatedNode,
    ctx: &mut dyn ExecutionContext,
    binding: &str,
) -> EvalResult<Value> {
    let state_key = format!("{binding}@{}", ctx.current_path());
    let previous = match ctx.env_get(&state_key)? {
        Some(value) => value,
        None => {
            node.branch_mut(INIT)
                .eval_in_new_stack_frame(ctx, INIT as FrameId)?;
            node.branch_annotation(INIT)?
        }
    };

    // Shadow the binding for the update branch, restoring the outer binding
    // on both exit paths.
    let shadowed = ctx.env_get(binding)?;
    ctx.env_put(binding, previous)?;
    let update_result = node
        .branch_mut(UPDATE)
        .eval_in_new_stack_frame(ctx, UPDATE as FrameId);
    match shadowed {
        Some(outer) => {
            ctx.env_put(binding, outer)?;
        }
        None => {
            ctx.env_remove(binding)?;
        }
    }
    update_result?;

    let next = node.branch_annotation(UPDATE)?;
    ctx.env_put(&state_key, next.clone())?;
    Ok(next)
}

/// Exports the branch value at the current path and assembles the aligned
/// field: one entry per neighbor whose previous round exported exactly this
/// path, plus this device's own value. A neighbor with no value here is
/// simply absent.
fn eval_neighbors(node: &mut AnnotatedNode, ctx: &mut dyn ExecutionContext) -> EvalResult<Value> {
    node.branch_mut(0).eval_in_new_stack_frame(ctx, 0)?;
    let own = node.branch_annotation(0)?;
    let path = ctx.current_path();
    let mut field = ctx.aligned_neighbor_values(&path)?;
    field.insert(ctx.device_id(), own.clone());
    ctx.export(path, own)?;
    Ok(Value::Field(field))
}
