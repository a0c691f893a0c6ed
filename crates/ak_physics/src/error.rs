// crates/ak_physics/src/error.rs

//! 求解器错误类型
//!
//! 配置与资源错误在构建阶段（任何分配之前 / 之中）出现；
//! 失稳、取消与超时在运行阶段出现，且都保留已完成的步数，
//! 以便调用方取回部分记录。

use ak_config::ConfigError;
use ak_runtime::ResourceError;

use crate::engine::SolverPhase;

/// 求解器错误
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 资源错误
    #[error("资源错误: {0}")]
    Resource(#[from] ResourceError),

    /// 数值失稳
    #[error("第 {step} 步数值失稳: 幅值 {value:.3e} 超过上限 {bound:.3e}")]
    Instability {
        /// 检出失稳的时间步
        step: usize,
        /// 检出的最大幅值
        value: f64,
        /// 配置的幅值上限
        bound: f64,
    },

    /// 协作取消
    #[error("运行被取消，已完成 {completed_steps} 步")]
    Cancelled {
        /// 取消前完成的步数
        completed_steps: usize,
    },

    /// 截止时间超时
    #[error("超过截止时间，已完成 {completed_steps} 步")]
    DeadlineExceeded {
        /// 超时前完成的步数
        completed_steps: usize,
    },

    /// 求解器处于不可步进的阶段
    #[error("求解器处于 {0:?} 阶段，不可步进")]
    NotRunnable(SolverPhase),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instability_display() {
        let err = SolverError::Instability {
            step: 42,
            value: 2.5e7,
            bound: 1e6,
        };
        let msg = err.to_string();
        assert!(msg.contains("42"));
        assert!(msg.contains("2.500e7"));
    }

    #[test]
    fn test_config_error_conversion() {
        let err: SolverError = ConfigError::Missing("room.lz".to_string()).into();
        assert!(matches!(err, SolverError::Config(_)));
    }
}
