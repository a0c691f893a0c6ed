// crates/ak_runtime/src/lib.rs

//! 运行时基础层
//!
//! 为波场求解器提供与物理无关的基础设施：
//! - 对齐字段缓冲区 (memory) - SIMD 友好的零初始化缓冲区与内存预算
//! - 类型安全索引 (indices) - 网格节点、接收点的强类型索引
//!
//! # 分层原则
//!
//! 本层不依赖任何物理概念，物理相关类型在 `ak_physics` 中定义。

pub mod indices;
pub mod memory;

pub use indices::{node, receiver, NodeIndex, ReceiverIndex, INVALID_INDEX};
pub use memory::{
    state_bytes, AlignedField, Alignment, CpuAlign, DefaultAlign, MemoryBudget, ResourceError,
};
