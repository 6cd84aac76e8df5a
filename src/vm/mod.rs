//! # Device-side virtual machine
//!
//! Everything an evaluation needs beyond the tree itself: the per-device
//! persistent [`ExecutionEnvironment`], the [`NetworkManager`] boundary
//! through which rounds exchange exports, and the [`ExecutionContext`] that
//! hands both (plus time, randomness, device identity, and the call stack)
//! to the tree once per round.

pub mod context;
pub mod device;
pub mod env;
pub mod network;

#[cfg(test)]
mod tests;

// Re-export commonly used items
pub use context::{ExecutionContext, PureForkContext, RoundContext};
pub use device::DeviceId;
pub use env::{ExecutionEnvironment, SimpleExecutionEnvironment};
pub use network::{Export, LocalNetwork, LocalNetworkHandle, NetworkManager, NullNetwork};
