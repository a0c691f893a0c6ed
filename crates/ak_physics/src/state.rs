// crates/ak_physics/src/state.rs

//! 场存储
//!
//! 三层时间缓冲（前一步 / 当前 / 下一步）加一个轮换计数。
//! 缓冲在构建时一次性分配并清零，此后只轮换角色、绝不再分配；
//! `advance()` 为 O(1)，只递增计数。
//!
//! 分配前按内存预算做总量检查：三层缓冲加上（Full 保留策略下）
//! 每步一份快照的代价。预算不足时整体拒绝，不做部分分配。

use ak_config::RetentionPolicy;
use ak_runtime::{state_bytes, AlignedField, MemoryBudget, ResourceError};

use crate::grid::Grid;

/// 时间层数（跳蛙格式需要三层）
pub const TIME_LEVELS: usize = 3;

/// 每场变量字节数（f64）
pub const BYTES_PER_VAR: usize = std::mem::size_of::<f64>();

/// 场存储
#[derive(Debug)]
pub struct FieldStore {
    field_a: AlignedField<f64>,
    field_b: AlignedField<f64>,
    field_c: AlignedField<f64>,
    rot: usize,
    n_nodes: usize,
    state_bytes: u64,
    retention: RetentionPolicy,
    snapshots: Vec<Vec<f64>>,
}

impl FieldStore {
    /// 按网格与保留策略分配场存储
    ///
    /// 先算后分：总字节数（含 Full 策略的快照预留）超出预算时
    /// 返回错误，不触发任何分配。
    pub fn allocate(
        grid: &Grid,
        retention: RetentionPolicy,
        budget: &MemoryBudget,
    ) -> Result<Self, ResourceError> {
        let n = grid.n_nodes();

        let mut total = state_bytes(n, TIME_LEVELS, BYTES_PER_VAR)?;
        if retention == RetentionPolicy::Full {
            total = total
                .checked_add(state_bytes(n, grid.nt, BYTES_PER_VAR)?)
                .ok_or(ResourceError::SizeOverflow {
                    nodes: n,
                    vars_per_node: grid.nt,
                })?;
        }
        budget.check(total)?;

        let snapshots = match retention {
            RetentionPolicy::Full => Vec::with_capacity(grid.nt),
            RetentionPolicy::ReceiverOnly => Vec::new(),
        };

        Ok(Self {
            field_a: AlignedField::zeros(n),
            field_b: AlignedField::zeros(n),
            field_c: AlignedField::zeros(n),
            rot: 0,
            n_nodes: n,
            state_bytes: total,
            retention,
            snapshots,
        })
    }

    /// 节点数
    pub fn n_nodes(&self) -> usize {
        self.n_nodes
    }

    /// 分配的状态字节总数（含快照预留）
    pub fn state_bytes(&self) -> u64 {
        self.state_bytes
    }

    /// 三层缓冲的当前角色视图：(前一步, 当前, 下一步可写)
    ///
    /// 借用检查保证同一缓冲不可能同时以只读和可写身份出现。
    pub fn frames(&mut self) -> (&[f64], &[f64], &mut [f64]) {
        match self.rot % TIME_LEVELS {
            0 => (
                self.field_a.as_slice(),
                self.field_b.as_slice(),
                self.field_c.as_mut_slice(),
            ),
            1 => (
                self.field_b.as_slice(),
                self.field_c.as_slice(),
                self.field_a.as_mut_slice(),
            ),
            _ => (
                self.field_c.as_slice(),
                self.field_a.as_slice(),
                self.field_b.as_mut_slice(),
            ),
        }
    }

    /// 前一步场只读视图
    pub fn previous(&self) -> &[f64] {
        match self.rot % TIME_LEVELS {
            0 => self.field_a.as_slice(),
            1 => self.field_b.as_slice(),
            _ => self.field_c.as_slice(),
        }
    }

    /// 当前场只读视图
    pub fn current(&self) -> &[f64] {
        match self.rot % TIME_LEVELS {
            0 => self.field_b.as_slice(),
            1 => self.field_c.as_slice(),
            _ => self.field_a.as_slice(),
        }
    }

    /// 当前场可写视图（模板更新前的源注入用）
    pub fn current_mut(&mut self) -> &mut [f64] {
        match self.rot % TIME_LEVELS {
            0 => self.field_b.as_mut_slice(),
            1 => self.field_c.as_mut_slice(),
            _ => self.field_a.as_mut_slice(),
        }
    }

    /// 本步新场只读视图（轮换之前有效）
    pub fn next(&self) -> &[f64] {
        match self.rot % TIME_LEVELS {
            0 => self.field_c.as_slice(),
            1 => self.field_a.as_slice(),
            _ => self.field_b.as_slice(),
        }
    }

    /// 轮换缓冲角色，O(1)
    ///
    /// 新场成为当前场，当前场成为前一步场，
    /// 最旧的缓冲将在下一步被覆写。
    pub fn advance(&mut self) {
        self.rot = self.rot.wrapping_add(1);
    }

    /// Full 保留策略下记录本步新场快照（轮换之前调用）
    pub fn record_snapshot(&mut self) {
        if self.retention == RetentionPolicy::Full {
            self.snapshots.push(self.next().to_vec());
        }
    }

    /// 已记录的场快照（ReceiverOnly 策略下恒为空）
    pub fn snapshots(&self) -> &[Vec<f64>] {
        &self.snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ak_config::SimulationConfig;
    use crate::grid::GridPlanner;

    fn small_grid() -> Grid {
        let mut config = SimulationConfig::default();
        config.resolution.fmax = 500.0;
        config.resolution.duration = 0.005;
        config.room.lx = 2.0;
        config.room.ly = 1.5;
        GridPlanner::new(&config).unwrap().plan().unwrap()
    }

    #[test]
    fn test_allocate_zeroed() {
        let grid = small_grid();
        let mut store =
            FieldStore::allocate(&grid, RetentionPolicy::ReceiverOnly, &MemoryBudget::UNLIMITED)
                .unwrap();
        let (prev, cur, next) = store.frames();
        assert!(prev.iter().all(|&v| v == 0.0));
        assert!(cur.iter().all(|&v| v == 0.0));
        assert!(next.iter().all(|&v| v == 0.0));
        assert_eq!(prev.len(), grid.n_nodes());
    }

    #[test]
    fn test_rotation_cycle() {
        let grid = small_grid();
        let mut store =
            FieldStore::allocate(&grid, RetentionPolicy::ReceiverOnly, &MemoryBudget::UNLIMITED)
                .unwrap();

        // 第 0 步：写入新场
        {
            let (_, _, next) = store.frames();
            next[0] = 1.0;
        }
        store.advance();

        // 轮换后新场成为当前场
        assert_eq!(store.current()[0], 1.0);
        assert_eq!(store.previous()[0], 0.0);

        // 第 1 步：上一步的当前场成为前一步场
        {
            let (prev, cur, next) = store.frames();
            assert_eq!(cur[0], 1.0);
            assert_eq!(prev[0], 0.0);
            next[0] = 2.0;
        }
        store.advance();
        {
            let (prev, cur, _) = store.frames();
            assert_eq!(prev[0], 1.0);
            assert_eq!(cur[0], 2.0);
        }
        assert_eq!(store.previous()[0], 1.0);
    }

    #[test]
    fn test_rotation_period_three() {
        let grid = small_grid();
        let mut store =
            FieldStore::allocate(&grid, RetentionPolicy::ReceiverOnly, &MemoryBudget::UNLIMITED)
                .unwrap();
        {
            let (_, _, next) = store.frames();
            next[7] = 42.0;
        }
        // 三次轮换后同一缓冲回到"下一步"角色
        store.advance();
        store.advance();
        store.advance();
        let (_, _, next) = store.frames();
        assert_eq!(next[7], 42.0);
    }

    #[test]
    fn test_budget_rejection_before_allocation() {
        let grid = small_grid();
        let budget = MemoryBudget::bytes(64);
        let err = FieldStore::allocate(&grid, RetentionPolicy::ReceiverOnly, &budget).unwrap_err();
        assert!(matches!(err, ResourceError::BudgetExceeded { .. }));
    }

    #[test]
    fn test_full_retention_costs_more() {
        let grid = small_grid();
        let lean =
            FieldStore::allocate(&grid, RetentionPolicy::ReceiverOnly, &MemoryBudget::UNLIMITED)
                .unwrap();
        let full = FieldStore::allocate(&grid, RetentionPolicy::Full, &MemoryBudget::UNLIMITED)
            .unwrap();
        assert!(full.state_bytes() > lean.state_bytes());

        // ReceiverOnly 下预算刚好够三层缓冲，Full 下同样预算被拒
        let budget = MemoryBudget::bytes(lean.state_bytes());
        assert!(FieldStore::allocate(&grid, RetentionPolicy::ReceiverOnly, &budget).is_ok());
        assert!(FieldStore::allocate(&grid, RetentionPolicy::Full, &budget).is_err());
    }

    #[test]
    fn test_snapshot_recording() {
        let grid = small_grid();
        let mut store =
            FieldStore::allocate(&grid, RetentionPolicy::Full, &MemoryBudget::UNLIMITED).unwrap();
        {
            let (_, _, next) = store.frames();
            next[3] = 5.0;
        }
        store.record_snapshot();
        store.advance();
        assert_eq!(store.snapshots().len(), 1);
        assert_eq!(store.snapshots()[0][3], 5.0);

        // ReceiverOnly 下不记录
        let mut lean =
            FieldStore::allocate(&grid, RetentionPolicy::ReceiverOnly, &MemoryBudget::UNLIMITED)
                .unwrap();
        lean.record_snapshot();
        assert!(lean.snapshots().is_empty());
    }
}
