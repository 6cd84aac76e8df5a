//! In-process multi-device round driver
//!
//! Runs copies of one program on simulated devices sharing a
//! [`LocalNetwork`], in lockstep: every device starts round N (taking its
//! neighbor snapshot) before any device commits round N, so round N's
//! publishes are fully visible to every round N+1 snapshot and to nothing
//! earlier.

use chrono::{DateTime, Utc};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tracing::info;

use crate::error::EvalResult;
use crate::interpreter::tree::AnnotatedNode;
use crate::interpreter::value::{BinaryOp, FoldOp, Value};
use crate::vm::context::RoundContext;
use crate::vm::device::DeviceId;
use crate::vm::env::{ExecutionEnvironment, SimpleExecutionEnvironment};
use crate::vm::network::{LocalNetwork, NetworkManager};

struct SimulatedDevice {
    id: DeviceId,
    program: AnnotatedNode,
    ctx: RoundContext,
}

/// Lockstep simulator over a fully connected [`LocalNetwork`].
pub struct Simulator {
    devices: Vec<SimulatedDevice>,
    delta_time: Duration,
    now: DateTime<Utc>,
    rounds_run: u32,
}

impl Simulator {
    /// `device_count` devices, each evaluating its own [`copy`] of
    /// `program` with seed `seed + index`.
    ///
    /// [`copy`]: AnnotatedNode::copy
    pub fn new(
        program: &AnnotatedNode,
        device_count: usize,
        delta_time: Duration,
        seed: u64,
    ) -> Self {
        let network = LocalNetwork::new();
        let devices = (0..device_count)
            .map(|index| {
                let id = DeviceId::from_index(index as u64);
                let environment: Rc<RefCell<dyn ExecutionEnvironment>> =
                    Rc::new(RefCell::new(SimpleExecutionEnvironment::new()));
                let net: Rc<RefCell<dyn NetworkManager>> =
                    Rc::new(RefCell::new(network.handle(id)));
                SimulatedDevice {
                    id,
                    program: program.copy(),
                    ctx: RoundContext::new(id, environment, net, seed.wrapping_add(index as u64)),
                }
            })
            .collect();
        Simulator {
            devices,
            delta_time,
            now: Utc::now(),
            rounds_run: 0,
        }
    }

    /// Pre-populate every device's environment; `setup` receives the
    /// device's index and its store.
    pub fn seed_environments(&mut self, setup: impl Fn(usize, &mut dyn ExecutionEnvironment)) {
        for (index, device) in self.devices.iter_mut().enumerate() {
            let environment = device.ctx.environment();
            setup(index, &mut *environment.borrow_mut());
        }
    }

    /// One lockstep round across all devices.
    pub fn run_round(&mut self) -> EvalResult<()> {
        for device in &mut self.devices {
            device.ctx.begin_round(self.delta_time, self.now);
            device.program.eval(&mut device.ctx)?;
        }
        for device in &mut self.devices {
            device.ctx.commit_round();
        }
        self.rounds_run += 1;
        self.now = self.now
            + chrono::Duration::from_std(self.delta_time)
                .expect("delta time exceeds the representable range");
        Ok(())
    }

    pub fn run(&mut self, rounds: u32) -> EvalResult<()> {
        for _ in 0..rounds {
            self.run_round()?;
        }
        info!(rounds, devices = self.devices.len(), "simulation finished");
        Ok(())
    }

    pub fn rounds_run(&self) -> u32 {
        self.rounds_run
    }

    pub fn device_ids(&self) -> Vec<DeviceId> {
        self.devices.iter().map(|d| d.id).collect()
    }

    /// Each device's root annotation after the last round.
    pub fn results(&self) -> Vec<(DeviceId, Option<Value>)> {
        self.devices
            .iter()
            .map(|d| (d.id, d.program.annotation().cloned()))
            .collect()
    }

    /// Diagnostic dump of one device's tree.
    pub fn render_device(&self, index: usize) -> String {
        self.devices[index].program.render()
    }
}

/// Demo program: hop-count distance from the devices whose environment
/// binds `source` to true. Sources hold 0; everyone else takes the minimum
/// neighbor distance plus one, starting from (effectively) infinity.
pub fn hop_count_gradient() -> AnnotatedNode {
    let unreachable = 1.0e9;
    AnnotatedNode::repeat(
        "d",
        AnnotatedNode::conditional(
            AnnotatedNode::variable("source"),
            AnnotatedNode::num(0.0),
            AnnotatedNode::num(unreachable),
        ),
        AnnotatedNode::conditional(
            AnnotatedNode::variable("source"),
            AnnotatedNode::num(0.0),
            AnnotatedNode::fold(
                FoldOp::Min,
                AnnotatedNode::binary(
                    BinaryOp::Add,
                    AnnotatedNode::neighbors(AnnotatedNode::variable("d")),
                    AnnotatedNode::num(1.0),
                ),
                AnnotatedNode::num(unreachable),
            ),
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_simulator(devices: usize) -> Simulator {
        let program = hop_count_gradient();
        let mut sim = Simulator::new(&program, devices, Duration::from_secs(1), 7);
        sim.seed_environments(|index, env| {
            env.put("source", Value::Bool(index == 0));
        });
        sim
    }

    #[test]
    fn gradient_converges_on_fully_connected_network() {
        let mut sim = gradient_simulator(4);
        sim.run(3).unwrap();

        let results = sim.results();
        assert_eq!(results.len(), 4);
        // Device 0 is the source; on a fully connected network everyone
        // else is one hop away.
        assert_eq!(results[0].1, Some(Value::Num(0.0)));
        for (_, value) in &results[1..] {
            assert_eq!(*value, Some(Value::Num(1.0)));
        }
    }

    #[test]
    fn single_device_gradient_stays_unreachable() {
        let program = hop_count_gradient();
        let mut sim = Simulator::new(&program, 1, Duration::from_secs(1), 7);
        sim.seed_environments(|_, env| {
            env.put("source", Value::Bool(false));
        });
        sim.run(3).unwrap();

        // No neighbors: the only field entry is the device's own previous
        // value, so the distance keeps growing past the horizon.
        let results = sim.results();
        let (_, value) = &results[0];
        match value {
            Some(Value::Num(n)) => assert!(*n >= 1.0e9),
            other => panic!("expected a number, got {other:?}"),
        }
    }

    #[test]
    fn rounds_are_counted() {
        let mut sim = gradient_simulator(2);
        assert_eq!(sim.rounds_run(), 0);
        sim.run(5).unwrap();
        assert_eq!(sim.rounds_run(), 5);
    }
}
