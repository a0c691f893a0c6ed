// crates/ak_physics/src/receiver.rs

//! 接收记录
//!
//! 在固定节点处逐时间步采样声压。接收点在构建时吸附到最近
//! 节点并校验为内部节点；记录缓冲按步数预留，时间循环中
//! 只做 push，不再分配。

use ak_config::{ConfigError, SimulationConfig};
use ak_runtime::{NodeIndex, ReceiverIndex};
use glam::DVec3;

use crate::grid::Grid;
use crate::mask::DomainMask;
use crate::source::resolve_interior_node;

/// 接收点采样记录
#[derive(Debug, Clone)]
pub struct ReceiverTrace {
    nodes: Vec<NodeIndex>,
    positions: Vec<DVec3>,
    sample_rate: f64,
    samples: Vec<Vec<f64>>,
}

impl ReceiverTrace {
    /// 从配置构建
    ///
    /// 接收点列表为空时退化为单点记录，落在声源节点上，
    /// 沿用参考实现在源点读回声压的做法。
    pub fn from_config(
        config: &SimulationConfig,
        grid: &Grid,
        mask: &DomainMask,
        source_node: NodeIndex,
    ) -> Result<Self, ConfigError> {
        let mut nodes = Vec::new();
        let mut positions = Vec::new();

        if config.receivers.is_empty() {
            let (i, j, k) = grid.coords(source_node.get());
            nodes.push(source_node);
            positions.push(grid.position(i, j, k));
        } else {
            for (r, &p) in config.receivers.iter().enumerate() {
                let node = resolve_interior_node(grid, mask, p, &format!("receivers[{r}]"))?;
                nodes.push(node);
                positions.push(p);
            }
        }

        let samples = nodes
            .iter()
            .map(|_| Vec::with_capacity(grid.nt))
            .collect();

        Ok(Self {
            nodes,
            positions,
            sample_rate: grid.sample_rate(),
            samples,
        })
    }

    /// 接收点数
    pub fn n_receivers(&self) -> usize {
        self.nodes.len()
    }

    /// 采样率 [Hz]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// 已记录的样本数（各接收点一致）
    pub fn len(&self) -> usize {
        self.samples.first().map_or(0, Vec::len)
    }

    /// 是否尚无记录
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 接收点的节点索引
    pub fn node(&self, r: ReceiverIndex) -> NodeIndex {
        self.nodes[r.get()]
    }

    /// 接收点的请求位置 [m]
    pub fn position(&self, r: ReceiverIndex) -> DVec3 {
        self.positions[r.get()]
    }

    /// 接收点的采样序列
    pub fn samples(&self, r: ReceiverIndex) -> &[f64] {
        &self.samples[r.get()]
    }

    /// 记录本步场值（每步恰好调用一次）
    pub fn record(&mut self, field: &[f64]) {
        for (node, trace) in self.nodes.iter().zip(self.samples.iter_mut()) {
            trace.push(field[node.get()]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridPlanner;
    use crate::mask::RoomGeometry;
    use ak_runtime::receiver;

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
    fn test_empty_receivers_fall_back_to_source_node() {
        let (config, grid, mask) = setup();
        let src = NodeIndex::new(grid.index(5, 5, 0));
        let trace = ReceiverTrace::from_config(&config, &grid, &mask, src).unwrap();
        assert_eq!(trace.n_receivers(), 1);
        assert_eq!(trace.node(receiver(0)), src);
    }

    #[test]
    fn test_exterior_receiver_rejected() {
        let (mut config, grid, mask) = setup();
        config.receivers = vec![DVec3::new(-0.5, -0.5, 0.0)];
        let src = NodeIndex::new(grid.index(5, 5, 0));
        assert!(ReceiverTrace::from_config(&config, &grid, &mask, src).is_err());
    }

    #[test]
    fn test_record_appends_field_values() {
        let (mut config, grid, mask) = setup();
        config.receivers = vec![DVec3::new(0.5, 0.5, 0.0), DVec3::new(1.5, 1.0, 0.0)];
        let src = NodeIndex::new(grid.index(5, 5, 0));
        let mut trace = ReceiverTrace::from_config(&config, &grid, &mask, src).unwrap();

        let mut field = vec![0.0; grid.n_nodes()];
        field[trace.node(receiver(0)).get()] = 1.25;
        trace.record(&field);
        field[trace.node(receiver(0)).get()] = -0.5;
        trace.record(&field);

        assert_eq!(trace.len(), 2);
        assert_eq!(trace.samples(receiver(0)), &[1.25, -0.5]);
        assert_eq!(trace.samples(receiver(1)), &[0.0, 0.0]);
        assert!((trace.sample_rate() - grid.sample_rate()).abs() < 1e-9);
    }
}
