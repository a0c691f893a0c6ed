// crates/ak_physics/src/lib.rs

//! 声学 FDTD 求解核心
//!
//! 在结构化网格上对线性声波方程做显式时域有限差分求解，包括：
//! - 网格规划 (grid) - 由稳定性条件推导网格间距、时间步长与节点数
//! - 域掩码 (mask) - 节点分类：内部 / 边界 / 外部，支持盒体与盒体+穹顶
//! - 边界模型 (boundary) - 刚性全反射与反射系数参数化的损耗边界
//! - 场存储 (state) - 预算内一次性分配、O(1) 轮换的三层时间缓冲
//! - 声源注入 (source) - 离散激励信号到网格节点的映射
//! - 接收记录 (receiver) - 固定节点处的逐步采样
//! - 引擎 (engine) - 跳蛙式时间步进、并行空间模板、取消与失稳中止
//!
//! # 调度模型
//!
//! 时间步之间严格串行（第 n+1 步依赖第 n、n-1 步的场）；
//! 单步内的空间模板更新无节点间写依赖，按行分块并行，
//! 步末的 `advance()` 之前存在完整的步内同步。

pub mod boundary;
pub mod engine;
pub mod error;
pub mod grid;
pub mod mask;
pub mod receiver;
pub mod source;
pub mod state;

pub use boundary::BoundaryModel;
pub use engine::{RunHandle, RunSummary, SolverPhase, WaveSolver};
pub use error::SolverError;
pub use grid::{Grid, GridPlanner};
pub use mask::{DomainMask, NodeTag, RoomGeometry};
pub use receiver::ReceiverTrace;
pub use source::{Excitation, SourceInjector};
pub use state::FieldStore;
