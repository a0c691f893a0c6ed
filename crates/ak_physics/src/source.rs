// crates/ak_physics/src/source.rs

//! 声源注入
//!
//! 把离散激励信号逐步加到网格节点上。源位置在构建时吸附到
//! 最近节点并校验为内部节点；信号消耗完后注入值恒为零，
//! 信号长度与步数解耦。

use ak_config::{ConfigError, Dimensionality, SimulationConfig};
use ak_runtime::NodeIndex;
use glam::DVec3;

use crate::grid::Grid;
use crate::mask::{DomainMask, NodeTag};

/// 离散激励信号
#[derive(Debug, Clone, Default)]
pub struct Excitation {
    samples: Vec<f64>,
}

impl Excitation {
    /// 单位脉冲（首样本 1，其余静音），沿用参考实现的初始条件
    pub fn impulse() -> Self {
        Self {
            samples: vec![1.0],
        }
    }

    /// 从采样序列构建
    pub fn from_samples(samples: Vec<f64>) -> Self {
        Self { samples }
    }

    /// 样本数
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// 是否为空（全程静音）
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// 采样切片
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }
}

/// 声源注入器
///
/// 持有一个或多个目标节点与激励信号游标。每个时间步取出
/// 一个样本，加到全部目标节点的场值上。
#[derive(Debug, Clone)]
pub struct SourceInjector {
    nodes: Vec<NodeIndex>,
    excitation: Excitation,
    cursor: usize,
}

impl SourceInjector {
    /// 从配置构建
    ///
    /// 源位置缺省为房间盒体中心；给定位置吸附到最近节点后
    /// 必须落在内部节点上，否则拒绝。
    pub fn from_config(
        config: &SimulationConfig,
        grid: &Grid,
        mask: &DomainMask,
    ) -> Result<Self, ConfigError> {
        let position = config.source.position.unwrap_or_else(|| {
            match config.dimensionality {
                Dimensionality::TwoD => {
                    DVec3::new(config.room.lx / 2.0, config.room.ly / 2.0, 0.0)
                }
                Dimensionality::ThreeD => DVec3::new(
                    config.room.lx / 2.0,
                    config.room.ly / 2.0,
                    config.room.lz.unwrap_or(0.0) / 2.0,
                ),
            }
        });

        let node = resolve_interior_node(grid, mask, position, "source.position")?;

        let excitation = if config.source.excitation.is_empty() {
            Excitation::impulse()
        } else {
            Excitation::from_samples(config.source.excitation.clone())
        };

        Ok(Self {
            nodes: vec![node],
            excitation,
            cursor: 0,
        })
    }

    /// 直接构建（测试与程序化使用）
    pub fn at_node(node: NodeIndex, excitation: Excitation) -> Self {
        Self::at_nodes(vec![node], excitation)
    }

    /// 多节点声源（同一信号同步注入全部节点）
    pub fn at_nodes(nodes: Vec<NodeIndex>, excitation: Excitation) -> Self {
        Self {
            nodes,
            excitation,
            cursor: 0,
        }
    }

    /// 首个目标节点（接收点缺省回退位置）
    pub fn node(&self) -> NodeIndex {
        self.nodes[0]
    }

    /// 全部目标节点
    pub fn nodes(&self) -> &[NodeIndex] {
        &self.nodes
    }

    /// 取出下一个样本并前进游标，耗尽后恒为零
    pub fn next_sample(&mut self) -> f64 {
        let s = self
            .excitation
            .samples()
            .get(self.cursor)
            .copied()
            .unwrap_or(0.0);
        self.cursor = self.cursor.saturating_add(1);
        s
    }

    /// 把本步样本加到全部目标节点，返回注入后各节点场值的最大幅值
    pub fn inject(&mut self, field: &mut [f64]) -> f64 {
        let s = self.next_sample();
        let mut max_abs = 0.0f64;
        for node in &self.nodes {
            let n = node.get();
            if s != 0.0 {
                field[n] += s;
            }
            max_abs = max_abs.max(field[n].abs());
        }
        max_abs
    }

    /// 信号是否已耗尽
    pub fn exhausted(&self) -> bool {
        self.cursor >= self.excitation.len()
    }
}

/// 位置吸附到最近节点并校验为内部节点
pub(crate) fn resolve_interior_node(
    grid: &Grid,
    mask: &DomainMask,
    position: DVec3,
    key: &str,
) -> Result<NodeIndex, ConfigError> {
    let (i, j, k) = grid
        .nearest_node(position)
        .ok_or_else(|| ConfigError::invalid(key, position, "位置在网格之外"))?;
    let n = grid.index(i, j, k);
    if mask.tag(n) != NodeTag::Interior {
        return Err(ConfigError::invalid(
            key,
            position,
            "位置未落在域内部（吸附后的节点不是内部节点）",
        ));
    }
    Ok(NodeIndex::new(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridPlanner;
    use crate::mask::RoomGeometry;

    fn setup() -> (SimulationConfig, Grid, DomainMask) {
        let mut config = SimulationConfig::default();
        config.resolution.fmax = 500.0;
        config.resolution.duration = 0.01;
        config.room.lx = 2.0;
        config.room.ly = 1.5;
        let grid = GridPlanner::new(&config).unwrap().plan().unwrap();
        let geometry = RoomGeometry::from_config(&config);
        let mask = DomainMask::build(&grid, &geometry);
        (config, grid, mask)
    }

    #[test]
    fn test_default_position_is_room_center() {
        let (config, grid, mask) = setup();
        let injector = SourceInjector::from_config(&config, &grid, &mask).unwrap();
        let expected = grid
            .nearest_node(DVec3::new(1.0, 0.75, 0.0))
            .map(|(i, j, k)| grid.index(i, j, k))
            .unwrap();
        assert_eq!(injector.node().get(), expected);
        assert_eq!(mask.tag(expected), NodeTag::Interior);
    }

    #[test]
    fn test_boundary_position_rejected() {
        let (mut config, grid, mask) = setup();
        // 原点吸附到边界壳上
        config.source.position = Some(DVec3::new(-0.1, -0.1, 0.0));
        assert!(SourceInjector::from_config(&config, &grid, &mask).is_err());
    }

    #[test]
    fn test_out_of_grid_position_rejected() {
        let (mut config, grid, mask) = setup();
        config.source.position = Some(DVec3::new(100.0, 0.75, 0.0));
        assert!(SourceInjector::from_config(&config, &grid, &mask).is_err());
    }

    #[test]
    fn test_silence_after_exhaustion() {
        let mut injector = SourceInjector::at_node(
            NodeIndex::new(0),
            Excitation::from_samples(vec![1.0, 0.5]),
        );
        assert_eq!(injector.next_sample(), 1.0);
        assert_eq!(injector.next_sample(), 0.5);
        assert!(injector.exhausted());
        for _ in 0..10 {
            assert_eq!(injector.next_sample(), 0.0);
        }
    }

    #[test]
    fn test_inject_adds_to_field() {
        let mut field = vec![0.25; 4];
        let mut injector =
            SourceInjector::at_node(NodeIndex::new(2), Excitation::from_samples(vec![0.5]));
        let after = injector.inject(&mut field);
        assert!((after - 0.75).abs() < 1e-12);
        assert!((field[2] - 0.75).abs() < 1e-12);
        // 其余节点不受影响
        assert!((field[0] - 0.25).abs() < 1e-12);
        // 耗尽后注入不改变场
        injector.inject(&mut field);
        assert!((field[2] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_multi_node_injection() {
        let mut field = vec![0.0; 8];
        let mut injector = SourceInjector::at_nodes(
            vec![NodeIndex::new(1), NodeIndex::new(5)],
            Excitation::from_samples(vec![2.0]),
        );
        let max = injector.inject(&mut field);
        assert!((max - 2.0).abs() < 1e-12);
        assert_eq!(field[1], 2.0);
        assert_eq!(field[5], 2.0);
        assert_eq!(field[0], 0.0);
    }

    #[test]
    fn test_impulse_default_when_no_excitation() {
        let (config, grid, mask) = setup();
        let mut injector = SourceInjector::from_config(&config, &grid, &mask).unwrap();
        assert_eq!(injector.next_sample(), 1.0);
        assert_eq!(injector.next_sample(), 0.0);
    }
}
