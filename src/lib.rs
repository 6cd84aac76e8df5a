pub mod config;
pub mod error;
pub mod interpreter;
pub mod sim;
pub mod vm;

// Re-export main types
pub use error::{EvalError, EvalResult};
pub use interpreter::{AnnotatedNode, BinaryOp, FoldOp, NodeKind, Path, UnaryOp, Value};
pub use vm::{
    DeviceId, ExecutionContext, ExecutionEnvironment, Export, NetworkManager, RoundContext,
    SimpleExecutionEnvironment,
};
