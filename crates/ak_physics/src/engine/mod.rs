// crates/ak_physics/src/engine/mod.rs

//! 时间步进引擎
//!
//! 跳蛙式二阶中心差分时间积分，空间模板按行分块并行。

pub(crate) mod stencil;
pub mod solver;

pub use solver::{RunHandle, RunSummary, SolverPhase, WaveSolver};
