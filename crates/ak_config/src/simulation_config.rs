// crates/ak_config/src/simulation_config.rs

//! SimulationConfig - 模拟配置（全 f64）
//!
//! 定义声学 FDTD 模拟的所有输入参数，使用纯 f64 类型以便
//! JSON 序列化。网格尺寸、时间步长等派生量不在此层出现。
//!
//! 参考脚本中的模块级可变常量（声速、参考声压）在这里
//! 成为显式字段，贯穿所有组件，不存在环境态。

use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// 空间维度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Dimensionality {
    /// 二维（垂直轴为 y）
    #[serde(rename = "2d")]
    #[default]
    TwoD,
    /// 三维（垂直轴为 z）
    #[serde(rename = "3d")]
    ThreeD,
}

impl Dimensionality {
    /// 空间维数 D
    pub fn ndim(self) -> usize {
        match self {
            Dimensionality::TwoD => 2,
            Dimensionality::ThreeD => 3,
        }
    }
}

/// 介质参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediumConfig {
    /// 声速 [m/s]（20°C 空气取 343）
    #[serde(default = "default_speed_of_sound")]
    pub speed_of_sound: f64,
}

fn default_speed_of_sound() -> f64 {
    343.0
}

impl Default for MediumConfig {
    fn default() -> Self {
        Self {
            speed_of_sound: default_speed_of_sound(),
        }
    }
}

/// 分辨率参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// 最高解析频率 [Hz]
    #[serde(default = "default_fmax")]
    pub fmax: f64,

    /// 每波长采样点数（奈奎斯特下限为 2）
    #[serde(default = "default_ppw")]
    pub ppw: f64,

    /// 模拟时长 [s]
    #[serde(default = "default_duration")]
    pub duration: f64,
}

fn default_fmax() -> f64 {
    20_000.0
}
fn default_ppw() -> f64 {
    6.0
}
fn default_duration() -> f64 {
    0.25
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            fmax: default_fmax(),
            ppw: default_ppw(),
            duration: default_duration(),
        }
    }
}

/// 房间几何参数
///
/// 矩形盒以原点为角点；可选穹顶为半球/半圆，
/// 圆心位于盒顶面中心，半径 `dome_radius`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// x 方向长度 [m]
    #[serde(default = "default_lx")]
    pub lx: f64,

    /// y 方向长度 [m]（二维时为垂直轴）
    #[serde(default = "default_ly")]
    pub ly: f64,

    /// z 方向长度 [m]（仅三维，垂直轴）
    #[serde(default)]
    pub lz: Option<f64>,

    /// 穹顶半径 [m]（None = 无穹顶）
    #[serde(default)]
    pub dome_radius: Option<f64>,
}

fn default_lx() -> f64 {
    10.0
}
fn default_ly() -> f64 {
    4.0
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            lx: default_lx(),
            ly: default_ly(),
            lz: None,
            dome_radius: None,
        }
    }
}

/// 边界处理参数
///
/// 刚性反射是全部边界处理的基础；损耗只在其上叠加，
/// 绝不单独存在（`apply_loss` 要求 `apply_rigid`）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundaryConfig {
    /// 是否启用刚性（Neumann 镜像）边界
    #[serde(default = "default_true")]
    pub apply_rigid: bool,

    /// 是否在刚性反射上叠加损耗
    #[serde(default)]
    pub apply_loss: bool,

    /// 反射系数 ∈ [0, 1]（1 = 全反射，0 = 全吸收）
    #[serde(default = "default_refl_coeff")]
    pub refl_coeff: f64,
}

fn default_true() -> bool {
    true
}
fn default_refl_coeff() -> f64 {
    0.9
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            apply_rigid: true,
            apply_loss: false,
            refl_coeff: default_refl_coeff(),
        }
    }
}

/// 源注入时机（每次运行固定）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InjectionPoint {
    /// 模板更新前注入当前场
    BeforeStencil,
    /// 模板更新后注入新场
    #[default]
    AfterStencil,
}

/// 声源参数
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SourceConfig {
    /// 源位置 [m]（None = 域中心，沿用参考实现）
    #[serde(default)]
    pub position: Option<DVec3>,

    /// 激励信号（离散时间采样，消耗完后视为静音）
    #[serde(default)]
    pub excitation: Vec<f64>,

    /// 注入时机
    #[serde(default)]
    pub injection: InjectionPoint,
}

/// 场保留策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// 保留每个时间步的完整场快照（内存代价 Nt × 场大小，仅适合小规模）
    Full,
    /// 只保留接收点采样（内存代价与 Nt 无关）
    #[default]
    ReceiverOnly,
}

/// 内存参数
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MemoryConfig {
    /// 内存预算 [字节]（None = 无限制）
    #[serde(default)]
    pub budget_bytes: Option<u64>,

    /// 保留策略
    #[serde(default)]
    pub retention: RetentionPolicy,
}

/// 求解器调优参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverTuning {
    /// 运行时稳定性检查的声压幅值上限
    #[serde(default = "default_amplitude_bound")]
    pub amplitude_bound: f64,

    /// 最小并行节点数（低于此值使用串行模板更新）
    #[serde(default = "default_min_parallel_size")]
    pub min_parallel_size: usize,
}

fn default_amplitude_bound() -> f64 {
    1e6
}
fn default_min_parallel_size() -> usize {
    16_384
}

impl Default for SolverTuning {
    fn default() -> Self {
        Self {
            amplitude_bound: default_amplitude_bound(),
            min_parallel_size: default_min_parallel_size(),
        }
    }
}

/// 模拟配置（全 f64）
///
/// 包含 FDTD 模拟的全部输入参数。派生量（网格间距、时间步长、
/// 节点数）由 `GridPlanner` 计算。
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SimulationConfig {
    /// 空间维度
    #[serde(default)]
    pub dimensionality: Dimensionality,

    /// 介质参数
    #[serde(default)]
    pub medium: MediumConfig,

    /// 分辨率参数
    #[serde(default)]
    pub resolution: ResolutionConfig,

    /// 房间几何
    #[serde(default)]
    pub room: RoomConfig,

    /// 边界处理
    #[serde(default)]
    pub boundary: BoundaryConfig,

    /// 声源
    #[serde(default)]
    pub source: SourceConfig,

    /// 接收点位置 [m]（为空时在源节点处记录）
    #[serde(default)]
    pub receivers: Vec<DVec3>,

    /// 内存参数
    #[serde(default)]
    pub memory: MemoryConfig,

    /// 求解器调优
    #[serde(default)]
    pub tuning: SolverTuning,
}

impl SimulationConfig {
    /// 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;

        let config: SimulationConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// 验证配置有效性
    ///
    /// 所有检查在任何分配之前完成。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.medium.speed_of_sound <= 0.0 {
            return Err(ConfigError::invalid(
                "medium.speed_of_sound",
                self.medium.speed_of_sound,
                "声速必须为正",
            ));
        }

        if self.resolution.fmax <= 0.0 {
            return Err(ConfigError::invalid(
                "resolution.fmax",
                self.resolution.fmax,
                "最高频率必须为正",
            ));
        }

        // 奈奎斯特下限
        if self.resolution.ppw < 2.0 {
            return Err(ConfigError::invalid(
                "resolution.ppw",
                self.resolution.ppw,
                "每波长点数必须 >= 2（奈奎斯特）",
            ));
        }

        if self.resolution.duration <= 0.0 {
            return Err(ConfigError::invalid(
                "resolution.duration",
                self.resolution.duration,
                "时长必须为正",
            ));
        }

        if self.room.lx <= 0.0 {
            return Err(ConfigError::invalid("room.lx", self.room.lx, "长度必须为正"));
        }
        if self.room.ly <= 0.0 {
            return Err(ConfigError::invalid("room.ly", self.room.ly, "长度必须为正"));
        }

        match (self.dimensionality, self.room.lz) {
            (Dimensionality::ThreeD, None) => {
                return Err(ConfigError::Missing("room.lz（三维模拟必需）".to_string()));
            }
            (Dimensionality::ThreeD, Some(lz)) if lz <= 0.0 => {
                return Err(ConfigError::invalid("room.lz", lz, "长度必须为正"));
            }
            _ => {}
        }

        if let Some(r) = self.room.dome_radius {
            if r <= 0.0 {
                return Err(ConfigError::invalid(
                    "room.dome_radius",
                    r,
                    "穹顶半径必须为正",
                ));
            }
        }

        if !(0.0..=1.0).contains(&self.boundary.refl_coeff) {
            return Err(ConfigError::invalid(
                "boundary.refl_coeff",
                self.boundary.refl_coeff,
                "反射系数必须在 [0, 1] 内",
            ));
        }

        // 损耗叠加在刚性反射之上，不能单独存在
        if self.boundary.apply_loss && !self.boundary.apply_rigid {
            return Err(ConfigError::invalid(
                "boundary.apply_loss",
                self.boundary.apply_loss,
                "损耗边界要求启用刚性反射（损耗是刚性反射的修正，不是替代）",
            ));
        }

        if !self.boundary.apply_rigid && !self.boundary.apply_loss {
            return Err(ConfigError::invalid(
                "boundary.apply_rigid",
                self.boundary.apply_rigid,
                "必须启用一种边界处理",
            ));
        }

        if self.tuning.amplitude_bound <= 0.0 {
            return Err(ConfigError::invalid(
                "tuning.amplitude_bound",
                self.tuning.amplitude_bound,
                "幅值上限必须为正",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.dimensionality, Dimensionality::TwoD);
        assert!((config.medium.speed_of_sound - 343.0).abs() < 1e-12);
        assert!((config.resolution.ppw - 6.0).abs() < 1e-12);
        assert_eq!(config.memory.retention, RetentionPolicy::ReceiverOnly);
    }

    #[test]
    fn test_invalid_ppw() {
        let mut config = SimulationConfig::default();
        config.resolution.ppw = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_speed_of_sound() {
        let mut config = SimulationConfig::default();
        config.medium.speed_of_sound = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_three_d_requires_lz() {
        let mut config = SimulationConfig::default();
        config.dimensionality = Dimensionality::ThreeD;
        assert!(matches!(config.validate(), Err(ConfigError::Missing(_))));

        config.room.lz = Some(3.12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_loss_requires_rigid() {
        let mut config = SimulationConfig::default();
        config.boundary.apply_loss = true;
        config.boundary.apply_rigid = false;
        assert!(config.validate().is_err());

        config.boundary.apply_rigid = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_refl_coeff_range() {
        let mut config = SimulationConfig::default();
        config.boundary.refl_coeff = 1.2;
        assert!(config.validate().is_err());

        config.boundary.refl_coeff = -0.1;
        assert!(config.validate().is_err());

        config.boundary.refl_coeff = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_serialize_deserialize() {
        let config = SimulationConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: SimulationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.dimensionality, config.dimensionality);
        assert!((parsed.resolution.fmax - config.resolution.fmax).abs() < 1e-12);
        assert_eq!(parsed.memory.retention, config.memory.retention);
    }
}
