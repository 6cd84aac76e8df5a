//! Execution contexts
//!
//! Exactly one context is active per round per device. [`RoundContext`] is
//! the real one: it carries the call stack, device identity, the shared
//! environment and network boundary, the round's neighbor snapshot and
//! outgoing exports, and the time/randomness sources. A round is
//! `begin_round` → root `eval` → `commit_round`.
//!
//! [`PureForkContext`] is the restricted context handed to branches
//! evaluated on worker threads: call stack and time only, every stateful
//! service answers [`EvalError::ServiceUnavailable`].

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;
use tracing::debug;

use super::device::DeviceId;
use super::env::{ExecutionEnvironment, SimpleExecutionEnvironment};
use super::network::{Export, NetworkManager, NullNetwork};
use crate::error::{EvalError, EvalResult};
use crate::interpreter::path::{CallStack, FrameId, Path};
use crate::interpreter::value::Value;

/// Services a node evaluation may reach through its context.
///
/// Nodes receive `&mut dyn ExecutionContext` for exactly one `eval` call
/// and never hold it longer.
pub trait ExecutionContext {
    /// Append `id` to the current call-stack path.
    fn new_call_stack_frame(&mut self, id: FrameId);

    /// Remove the most recently pushed frame. Panics on an empty stack;
    /// that is a defect in the interpreter, not a recoverable condition.
    fn return_from_call_frame(&mut self);

    /// Snapshot of the root-to-here frame path, the alignment key for any
    /// stateful read or write tied to "this position in the program".
    fn current_path(&self) -> Path;

    fn stack_depth(&self) -> usize;

    fn device_id(&self) -> DeviceId;

    /// Time elapsed since this device's previous round.
    fn delta_time(&self) -> Duration;

    fn current_time(&self) -> DateTime<Utc>;

    /// Uniform double in `[0, 1)`; deterministic given the seed.
    fn next_random_double(&mut self) -> EvalResult<f64>;

    fn env_has(&self, id: &str) -> EvalResult<bool>;

    fn env_get(&self, id: &str) -> EvalResult<Option<Value>>;

    fn env_put(&mut self, id: &str, value: Value) -> EvalResult<bool>;

    fn env_remove(&mut self, id: &str) -> EvalResult<Option<Value>>;

    /// Stage `value` for publication at `path` when the round commits.
    fn export(&mut self, path: Path, value: Value) -> EvalResult<()>;

    /// Values neighbors exported at exactly `path` in their previous
    /// round, from the snapshot taken at round start. Absent neighbors are
    /// absent entries, not errors.
    fn aligned_neighbor_values(&self, path: &Path) -> EvalResult<BTreeMap<DeviceId, Value>>;
}

/* ===================== RoundContext ===================== */

/// The per-device context driven once per round.
///
/// The environment and network boundary are shared across rounds (and with
/// forked contexts); the call stack, neighbor snapshot, and export buffer
/// are round-local.
pub struct RoundContext {
    device: DeviceId,
    stack: CallStack,
    environment: Rc<RefCell<dyn ExecutionEnvironment>>,
    network: Rc<RefCell<dyn NetworkManager>>,
    neighbor_snapshot: Rc<BTreeMap<DeviceId, Export>>,
    exports: Rc<RefCell<Export>>,
    delta_time: Duration,
    current_time: DateTime<Utc>,
    rng: StdRng,
    round: u64,
}

impl RoundContext {
    pub fn new(
        device: DeviceId,
        environment: Rc<RefCell<dyn ExecutionEnvironment>>,
        network: Rc<RefCell<dyn NetworkManager>>,
        seed: u64,
    ) -> Self {
        environment.borrow_mut().setup();
        RoundContext {
            device,
            stack: CallStack::new(),
            environment,
            network,
            neighbor_snapshot: Rc::new(BTreeMap::new()),
            exports: Rc::new(RefCell::new(Export::new())),
            delta_time: Duration::ZERO,
            current_time: Utc::now(),
            rng: StdRng::seed_from_u64(seed),
            round: 0,
        }
    }

    /// A single-device context with a fresh environment and no neighbors,
    /// for tests, examples, and offline evaluation.
    pub fn isolated(seed: u64) -> Self {
        let environment: Rc<RefCell<dyn ExecutionEnvironment>> =
            Rc::new(RefCell::new(SimpleExecutionEnvironment::new()));
        let network: Rc<RefCell<dyn NetworkManager>> = Rc::new(RefCell::new(NullNetwork));
        Self::new(DeviceId::random(), environment, network, seed)
    }

    /// Start the next round: snapshot the neighborhood, reset the call
    /// stack, clear the export buffer, and fix this round's times.
    pub fn begin_round(&mut self, delta_time: Duration, now: DateTime<Utc>) {
        self.round += 1;
        self.delta_time = delta_time;
        self.current_time = now;
        self.stack.reset();
        self.exports.borrow_mut().clear();
        self.neighbor_snapshot = Rc::new(self.network.borrow().neighbor_state());
        debug!(
            device = %self.device,
            round = self.round,
            neighbors = self.neighbor_snapshot.len(),
            "round started"
        );
    }

    /// Finish the round: publish the staged exports and commit the
    /// environment so this round's writes reach the next one.
    pub fn commit_round(&mut self) {
        let export = std::mem::take(&mut *self.exports.borrow_mut());
        let exported = export.len();
        self.network.borrow_mut().publish(export);
        self.environment.borrow_mut().commit();
        debug!(
            device = %self.device,
            round = self.round,
            exported,
            "round committed"
        );
    }

    /// A context rooted at an empty call stack for evaluating a subtree as
    /// if it were a fresh root. Shares the environment, network boundary,
    /// neighbor snapshot, and export buffer; round continuity is kept, the
    /// randomness stream is split off deterministically.
    pub fn fork(&mut self) -> RoundContext {
        RoundContext {
            device: self.device,
            stack: CallStack::new(),
            environment: Rc::clone(&self.environment),
            network: Rc::clone(&self.network),
            neighbor_snapshot: Rc::clone(&self.neighbor_snapshot),
            exports: Rc::clone(&self.exports),
            delta_time: self.delta_time,
            current_time: self.current_time,
            rng: StdRng::seed_from_u64(self.rng.next_u64()),
            round: self.round,
        }
    }

    /// Rounds completed or in progress on this context.
    pub fn round(&self) -> u64 {
        self.round
    }

    /// Shared handle to the device's environment, for external
    /// pre-population and inspection.
    pub fn environment(&self) -> Rc<RefCell<dyn ExecutionEnvironment>> {
        Rc::clone(&self.environment)
    }
}

impl ExecutionContext for RoundContext {
    fn new_call_stack_frame(&mut self, id: FrameId) {
        self.stack.push(id);
    }

    fn return_from_call_frame(&mut self) {
        self.stack.pop();
    }

    fn current_path(&self) -> Path {
        self.stack.path()
    }

    fn stack_depth(&self) -> usize {
        self.stack.depth()
    }

    fn device_id(&self) -> DeviceId {
        self.device
    }

    fn delta_time(&self) -> Duration {
        self.delta_time
    }

    fn current_time(&self) -> DateTime<Utc> {
        self.current_time
    }

    fn next_random_double(&mut self) -> EvalResult<f64> {
        Ok(self.rng.gen::<f64>())
    }

    fn env_has(&self, id: &str) -> EvalResult<bool> {
        Ok(self.environment.borrow().has(id))
    }

    fn env_get(&self, id: &str) -> EvalResult<Option<Value>> {
        Ok(self.environment.borrow().get(id))
    }

    fn env_put(&mut self, id: &str, value: Value) -> EvalResult<bool> {
        Ok(self.environment.borrow_mut().put(id, value))
    }

    fn env_remove(&mut self, id: &str) -> EvalResult<Option<Value>> {
        Ok(self.environment.borrow_mut().remove(id))
    }

    fn export(&mut self, path: Path, value: Value) -> EvalResult<()> {
        self.exports.borrow_mut().put(path, value);
        Ok(())
    }

    fn aligned_neighbor_values(&self, path: &Path) -> EvalResult<BTreeMap<DeviceId, Value>> {
        let mut out = BTreeMap::new();
        for (device, export) in self.neighbor_snapshot.iter() {
            if let Some(value) = export.get(path) {
                out.insert(*device, value.clone());
            }
        }
        Ok(out)
    }
}

/* ===================== PureForkContext ===================== */

/// Context for one branch evaluated on a worker thread: a forked call
/// stack (parent path plus the branch's frame) and copied time and device
/// identity. Environment, network, and randomness are out of reach:
/// branch subtrees handed to the parallel helper are evaluation-pure.
#[derive(Debug)]
pub struct PureForkContext {
    device: DeviceId,
    stack: CallStack,
    delta_time: Duration,
    current_time: DateTime<Utc>,
}

impl PureForkContext {
    pub fn new(
        device: DeviceId,
        path: Path,
        delta_time: Duration,
        current_time: DateTime<Utc>,
    ) -> Self {
        PureForkContext {
            device,
            stack: CallStack::from_path(path),
            delta_time,
            current_time,
        }
    }
}

impl ExecutionContext for PureForkContext {
    fn new_call_stack_frame(&mut self, id: FrameId) {
        self.stack.push(id);
    }

    fn return_from_call_frame(&mut self) {
        self.stack.pop();
    }

    fn current_path(&self) -> Path {
        self.stack.path()
    }

    fn stack_depth(&self) -> usize {
        self.stack.depth()
    }

    fn device_id(&self) -> DeviceId {
        self.device
    }

    fn delta_time(&self) -> Duration {
        self.delta_time
    }

    fn current_time(&self) -> DateTime<Utc> {
        self.current_time
    }

    fn next_random_double(&mut self) -> EvalResult<f64> {
        Err(EvalError::ServiceUnavailable {
            service: "randomness",
        })
    }

    fn env_has(&self, _id: &str) -> EvalResult<bool> {
        Err(EvalError::ServiceUnavailable {
            service: "environment",
        })
    }

    fn env_get(&self, _id: &str) -> EvalResult<Option<Value>> {
        Err(EvalError::ServiceUnavailable {
            service: "environment",
        })
    }

    fn env_put(&mut self, _id: &str, _value: Value) -> EvalResult<bool> {
        Err(EvalError::ServiceUnavailable {
            service: "environment",
        })
    }

    fn env_remove(&mut self, _id: &str) -> EvalResult<Option<Value>> {
        Err(EvalError::ServiceUnavailable {
            service: "environment",
        })
    }

    fn export(&mut self, _path: Path, _value: Value) -> EvalResult<()> {
        Err(EvalError::ServiceUnavailable { service: "network" })
    }

    fn aligned_neighbor_values(&self, _path: &Path) -> EvalResult<BTreeMap<DeviceId, Value>> {
        Err(EvalError::ServiceUnavailable { service: "network" })
    }
}
