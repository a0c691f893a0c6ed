// crates/ak_config/src/lib.rs

//! 配置层
//!
//! 定义声学 FDTD 模拟的全部配置参数（全 f64），
//! 提供 JSON 序列化、默认值与构建前验证。
//!
//! # 分层原则
//!
//! 本层只做参数收集与一致性检查，不做任何网格推导或分配；
//! 网格尺寸由 `ak_physics::GridPlanner` 从这里的参数推导。

mod error;
mod simulation_config;

pub use error::ConfigError;
pub use simulation_config::{
    BoundaryConfig, Dimensionality, InjectionPoint, MediumConfig, MemoryConfig, ResolutionConfig,
    RetentionPolicy, RoomConfig, SimulationConfig, SolverTuning, SourceConfig,
};
