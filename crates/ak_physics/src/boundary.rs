// crates/ak_physics/src/boundary.rs

//! 边界模型
//!
//! 每个时间步在模板更新之后、缓冲轮换之前，对全部边界节点
//! 就地写入新场。两种模型：
//!
//! - 刚性（Neumann 镜像）：边界节点复制其向内镜像节点的新值，
//!   法向压强梯度为零，实现全反射。
//! - 损耗：以反射系数 R 在刚性镜像值与一阶外推吸收值之间线性
//!   混合。R = 1 时与刚性一致（浮点容差内），R = 0 时出射波
//!   被吸收、无可检测的反射返回。
//!
//! 镜像节点若本身是边界节点（穹顶接缝处可能出现），其新值
//! 尚未写入，此时读取它的当前值代替。

use ak_config::{BoundaryConfig, ConfigError};

use crate::mask::{DomainMask, NodeTag};

/// 边界模型
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundaryModel {
    /// 刚性全反射
    Rigid,
    /// 反射系数参数化的损耗边界
    Lossy {
        /// 反射系数 ∈ [0, 1]
        refl_coeff: f64,
    },
}

impl BoundaryModel {
    /// 从边界配置构建
    ///
    /// 配置层的验证在这里重跑一遍，保证单独构造的
    /// `BoundaryConfig` 也不能绕过约束。
    pub fn from_config(config: &BoundaryConfig) -> Result<Self, ConfigError> {
        if config.apply_loss && !config.apply_rigid {
            return Err(ConfigError::invalid(
                "boundary.apply_loss",
                config.apply_loss,
                "损耗边界要求启用刚性反射",
            ));
        }
        if !config.apply_rigid && !config.apply_loss {
            return Err(ConfigError::invalid(
                "boundary.apply_rigid",
                config.apply_rigid,
                "必须启用一种边界处理",
            ));
        }
        if !(0.0..=1.0).contains(&config.refl_coeff) {
            return Err(ConfigError::invalid(
                "boundary.refl_coeff",
                config.refl_coeff,
                "反射系数必须在 [0, 1] 内",
            ));
        }

        if config.apply_loss {
            Ok(Self::Lossy {
                refl_coeff: config.refl_coeff,
            })
        } else {
            Ok(Self::Rigid)
        }
    }

    /// 对全部边界节点写入新场，返回写入值的最大幅值
    ///
    /// `lambda` 为 Courant 数 c*dt/dx，损耗模型的一阶出射
    /// 外推需要它。`cur` / `next` 分别是当前场与本步新场，
    /// 内部节点的 `next` 已由模板更新写好。
    pub fn apply(
        &self,
        mask: &DomainMask,
        lambda: f64,
        cur: &[f64],
        next: &mut [f64],
    ) -> f64 {
        // 一阶出射外推的传输系数 (λ-1)/(λ+1)
        let transport = (lambda - 1.0) / (lambda + 1.0);
        let mut max_abs = 0.0f64;

        for bn in mask.boundary_nodes() {
            let b = bn.node.get();
            let m = bn.mirror.get();

            // 镜像是内部节点时读新值，否则读当前值
            let mirror_val = if mask.tag(m) == NodeTag::Interior {
                next[m]
            } else {
                cur[m]
            };

            let value = match *self {
                BoundaryModel::Rigid => mirror_val,
                BoundaryModel::Lossy { refl_coeff } => {
                    // 一阶吸收外推：出射波穿过边界不返回
                    let outgoing = cur[m] + transport * (mirror_val - cur[b]);
                    outgoing + refl_coeff * (mirror_val - outgoing)
                }
            };

            next[b] = value;
            max_abs = max_abs.max(value.abs());
        }

        max_abs
    }
}
