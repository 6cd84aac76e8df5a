//! The annotated tree
//!
//! Nodes own their branches (a tree, never a DAG); branch arity is fixed at
//! construction. The annotation is the cached result of the node's last
//! evaluation: `Option<Value>` makes "annotation present iff not erased"
//! impossible to violate.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::eval;
use super::nodes::NodeKind;
use super::path::FrameId;
use super::value::Value;
use crate::error::{EvalError, EvalResult};
use crate::vm::context::{ExecutionContext, PureForkContext};

/// One unit of an AST: a kind, its ordered branches, and the cached result
/// of its last evaluation.
#[derive(Debug, Serialize, Deserialize)]
pub struct AnnotatedNode {
    kind: NodeKind,
    branches: Vec<AnnotatedNode>,
    annotation: Option<Value>,
}

impl AnnotatedNode {
    pub(crate) fn new(kind: NodeKind, branches: Vec<AnnotatedNode>) -> Self {
        AnnotatedNode {
            kind,
            branches,
            annotation: None,
        }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn branches(&self) -> &[AnnotatedNode] {
        &self.branches
    }

    /// The cached result of the last evaluation, absent when erased.
    pub fn annotation(&self) -> Option<&Value> {
        self.annotation.as_ref()
    }

    pub fn is_erased(&self) -> bool {
        self.annotation.is_none()
    }

    pub(crate) fn set_annotation(&mut self, value: Value) {
        self.annotation = Some(value);
    }

    pub(crate) fn branch_mut(&mut self, index: usize) -> &mut AnnotatedNode {
        &mut self.branches[index]
    }

    /// Cached value of branch `index`, failing structurally if that branch
    /// has not been evaluated.
    pub(crate) fn branch_annotation(&self, index: usize) -> EvalResult<Value> {
        self.branches[index]
            .annotation
            .clone()
            .ok_or_else(|| EvalError::malformed(format!("branch {index} has no cached value")))
    }

    /* ===================== Lifecycle ===================== */

    /// Evaluate this node's semantics under `ctx`, overwriting the
    /// annotation. Context-service failures propagate unchanged.
    pub fn eval(&mut self, ctx: &mut dyn ExecutionContext) -> EvalResult {
        let arity = self.kind.arity();
        if !arity.accepts(self.branches.len()) {
            return Err(EvalError::malformed(format!(
                "`{}` expects {} branches, found {}",
                self.kind.label(),
                arity,
                self.branches.len()
            )));
        }
        if self.branches.len() > usize::from(FrameId::MAX) + 1 {
            return Err(EvalError::malformed(format!(
                "`{}` has {} branches, more than a frame id can address",
                self.kind.label(),
                self.branches.len()
            )));
        }
        eval::eval_node(self, ctx)
    }

    /// Evaluate inside a freshly pushed call-stack frame; the frame is
    /// popped on every exit path before control returns to the caller.
    pub fn eval_in_new_stack_frame(
        &mut self,
        ctx: &mut dyn ExecutionContext,
        frame: FrameId,
    ) -> EvalResult {
        ctx.new_call_stack_frame(frame);
        let result = self.eval(ctx);
        ctx.return_from_call_frame();
        result
    }

    /// Clear this node's annotation and recursively erase every branch,
    /// forcing full re-evaluation of the subtree.
    pub fn erase(&mut self) {
        for branch in &mut self.branches {
            branch.erase();
        }
        self.annotation = None;
    }

    /// A structurally identical, independently owned deep clone with fresh
    /// (erased) annotation state on every node.
    pub fn copy(&self) -> AnnotatedNode {
        AnnotatedNode {
            kind: self.kind.clone(),
            branches: self.branches.iter().map(AnnotatedNode::copy).collect(),
            annotation: None,
        }
    }

    /* ===================== Branch iteration ===================== */

    /// Evaluate every branch left-to-right, each in a new stack frame keyed
    /// by its ordinal.
    pub(crate) fn eval_branches(&mut self, ctx: &mut dyn ExecutionContext) -> EvalResult {
        for (i, branch) in self.branches.iter_mut().enumerate() {
            branch.eval_in_new_stack_frame(ctx, i as FrameId)?;
        }
        Ok(())
    }

    /// Parallel variant of [`eval_branches`](Self::eval_branches), an
    /// optimization hint only: branches run on worker threads when every
    /// kind in every branch subtree is evaluation-pure, and sequentially
    /// otherwise. Results are identical either way.
    pub(crate) fn eval_branches_parallel(&mut self, ctx: &mut dyn ExecutionContext) -> EvalResult {
        if self.branches.len() < 2 || !self.branches.iter().all(AnnotatedNode::parallel_safe) {
            return self.eval_branches(ctx);
        }
        let device = ctx.device_id();
        let parent = ctx.current_path();
        let delta_time = ctx.delta_time();
        let current_time = ctx.current_time();
        self.branches
            .par_iter_mut()
            .enumerate()
            .try_for_each(|(i, branch)| {
                let mut fork = PureForkContext::new(
                    device,
                    parent.child(i as FrameId),
                    delta_time,
                    current_time,
                );
                branch.eval(&mut fork)
            })
    }

    /// True when no kind in this subtree needs environment, network, or
    /// randomness access.
    pub(crate) fn parallel_safe(&self) -> bool {
        self.kind.is_pure() && self.branches.iter().all(AnnotatedNode::parallel_safe)
    }

    /* ===================== Diagnostics ===================== */

    /// Tab-indented tree dump. Erased nodes are wrapped in `|…|`; evaluated
    /// nodes show their label followed by `: ` and the cached annotation.
    /// Usable on partially evaluated trees.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out, 0);
        out
    }

    fn render_into(&self, out: &mut String, indent: usize) {
        for _ in 0..indent {
            out.push('\t');
        }
        match &self.annotation {
            None => {
                out.push('|');
                out.push_str(&self.kind.label());
                out.push('|');
            }
            Some(value) => {
                out.push_str(&self.kind.label());
                out.push_str(": ");
                out.push_str(&value.to_string());
            }
        }
        for branch in &self.branches {
            out.push('\n');
            branch.render_into(out, indent + 1);
        }
    }
}

impl fmt::Display for AnnotatedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
