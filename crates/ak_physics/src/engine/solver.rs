// crates/ak_physics/src/engine/solver.rs

//! 波动求解器
//!
//! 把网格、掩码、边界模型、场存储、声源与接收记录装配成
//! 完整的时间步进循环。单步顺序固定：
//!
//! 1. 模板更新全部内部节点
//! 2. 源注入（缺省在模板更新后注入新场）
//! 3. 边界模型写入全部边界节点
//! 4. 失稳检查（超限即中止，保留已有记录）
//! 5. 接收点采样、（Full 策略下）快照
//! 6. 缓冲轮换
//!
//! 取消与截止时间在步与步之间检查，绝不打断一个进行中的步，
//! 因此中止后场状态总是自洽的，部分记录总是可取回。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ak_config::{InjectionPoint, SimulationConfig};
use ak_runtime::MemoryBudget;
use serde::Serialize;

use crate::boundary::BoundaryModel;
use crate::engine::stencil;
use crate::error::SolverError;
use crate::grid::{Grid, GridPlanner};
use crate::mask::{DomainMask, RoomGeometry};
use crate::receiver::ReceiverTrace;
use crate::source::SourceInjector;
use crate::state::FieldStore;

/// 求解器阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SolverPhase {
    /// 已装配，未开始步进
    Ready,
    /// 步进中
    Running,
    /// 全部步数完成
    Completed,
    /// 因失稳 / 取消 / 超时中止
    Aborted,
}

/// 运行句柄
///
/// 可跨线程克隆传递，用于协作取消一次运行。
#[derive(Debug, Clone)]
pub struct RunHandle {
    cancelled: Arc<AtomicBool>,
}

impl RunHandle {
    /// 请求取消（在下一个步间检查点生效）
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// 是否已请求取消
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// 运行摘要
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// 完成的时间步数
    pub steps_completed: usize,
    /// 计划的时间步数
    pub nt: usize,
    /// x 轴节点数
    pub nx: usize,
    /// y 轴节点数
    pub ny: usize,
    /// z 轴节点数（二维时为 1）
    pub nz: usize,
    /// 节点总数
    pub n_nodes: usize,
    /// 内部节点数
    pub n_interior: usize,
    /// 边界节点数
    pub n_boundary: usize,
    /// 网格间距 [m]
    pub dx: f64,
    /// 时间步长 [s]
    pub dt: f64,
    /// 接收点采样率 [Hz]
    pub sample_rate: f64,
    /// 状态内存 [字节]
    pub state_bytes: u64,
    /// 墙钟耗时 [s]
    pub elapsed_secs: f64,
}

/// 波动求解器
#[derive(Debug)]
pub struct WaveSolver {
    grid: Grid,
    mask: DomainMask,
    boundary: BoundaryModel,
    store: FieldStore,
    source: SourceInjector,
    trace: ReceiverTrace,
    injection: InjectionPoint,
    lambda: f64,
    lambda2: f64,
    amplitude_bound: f64,
    min_parallel_size: usize,
    phase: SolverPhase,
    steps_completed: usize,
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
    elapsed: Duration,
}

impl WaveSolver {
    /// 从配置装配求解器
    ///
    /// 依次完成：配置验证、网格规划、掩码构建、边界模型、
    /// 预算内场分配、源与接收点吸附。任一步失败则整体失败，
    /// 不留下部分状态。
    pub fn from_config(config: &SimulationConfig) -> Result<Self, SolverError> {
        let planner = GridPlanner::new(config)?;
        let grid = planner.plan()?;

        let geometry = RoomGeometry::from_config(config);
        let mask = DomainMask::build(&grid, &geometry);
        let boundary = BoundaryModel::from_config(&config.boundary)?;

        let budget = match config.memory.budget_bytes {
            Some(limit) => MemoryBudget::bytes(limit),
            None => MemoryBudget::UNLIMITED,
        };
        let store = FieldStore::allocate(&grid, config.memory.retention, &budget)?;

        let source = SourceInjector::from_config(config, &grid, &mask)?;
        let trace = ReceiverTrace::from_config(config, &grid, &mask, source.node())?;

        let lambda = planner.courant();

        tracing::info!(
            nx = grid.nx,
            ny = grid.ny,
            nz = grid.nz,
            nt = grid.nt,
            dx = grid.dx,
            dt = grid.dt,
            n_interior = mask.n_interior(),
            n_boundary = mask.n_boundary(),
            state_bytes = store.state_bytes(),
            "求解器装配完成"
        );

        Ok(Self {
            grid,
            mask,
            boundary,
            store,
            source,
            trace,
            injection: config.source.injection,
            lambda,
            lambda2: lambda * lambda,
            amplitude_bound: config.tuning.amplitude_bound,
            min_parallel_size: config.tuning.min_parallel_size,
            phase: SolverPhase::Ready,
            steps_completed: 0,
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: None,
            elapsed: Duration::ZERO,
        })
    }

    /// 取消句柄
    pub fn handle(&self) -> RunHandle {
        RunHandle {
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    /// 设置墙钟截止时间
    pub fn set_deadline(&mut self, deadline: Instant) {
        self.deadline = Some(deadline);
    }

    /// 网格
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// 域掩码
    pub fn mask(&self) -> &DomainMask {
        &self.mask
    }

    /// 当前阶段
    pub fn phase(&self) -> SolverPhase {
        self.phase
    }

    /// 完成的步数
    pub fn steps_completed(&self) -> usize {
        self.steps_completed
    }

    /// 接收记录（中止后同样可用，持有已完成步的样本）
    pub fn trace(&self) -> &ReceiverTrace {
        &self.trace
    }

    /// 场存储（快照读取用）
    pub fn store(&self) -> &FieldStore {
        &self.store
    }

    /// 运行摘要
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            steps_completed: self.steps_completed,
            nt: self.grid.nt,
            nx: self.grid.nx,
            ny: self.grid.ny,
            nz: self.grid.nz,
            n_nodes: self.grid.n_nodes(),
            n_interior: self.mask.n_interior(),
            n_boundary: self.mask.n_boundary(),
            dx: self.grid.dx,
            dt: self.grid.dt,
            sample_rate: self.grid.sample_rate(),
            state_bytes: self.store.state_bytes(),
            elapsed_secs: self.elapsed.as_secs_f64(),
        }
    }

    /// 执行一个时间步
    pub fn step(&mut self) -> Result<(), SolverError> {
        match self.phase {
            SolverPhase::Ready | SolverPhase::Running => {}
            other => return Err(SolverError::NotRunnable(other)),
        }
        self.phase = SolverPhase::Running;

        if self.injection == InjectionPoint::BeforeStencil {
            self.source.inject(self.store.current_mut());
        }

        let (prev, cur, next) = self.store.frames();
        let mut max_abs = stencil::update_interior(
            &self.grid,
            &self.mask,
            self.lambda2,
            prev,
            cur,
            next,
            self.min_parallel_size,
        );

        if self.injection == InjectionPoint::AfterStencil {
            max_abs = max_abs.max(self.source.inject(next));
        }

        max_abs = max_abs.max(self.boundary.apply(&self.mask, self.lambda, cur, next));

        // NaN / Inf 不满足任何比较，显式用 !is_finite 捕获
        if !max_abs.is_finite() || max_abs > self.amplitude_bound {
            self.phase = SolverPhase::Aborted;
            tracing::warn!(
                step = self.steps_completed,
                value = max_abs,
                bound = self.amplitude_bound,
                "数值失稳，中止运行"
            );
            return Err(SolverError::Instability {
                step: self.steps_completed,
                value: max_abs,
                bound: self.amplitude_bound,
            });
        }

        self.trace.record(next);
        self.store.record_snapshot();
        self.store.advance();
        self.steps_completed += 1;
        Ok(())
    }

    /// 运行到计划步数结束
    ///
    /// 取消与截止时间在每步之前检查。任何中止路径都保留
    /// 已完成步的接收记录与快照，通过 [`Self::trace`] /
    /// [`Self::store`] 取回。
    pub fn run(&mut self) -> Result<RunSummary, SolverError> {
        match self.phase {
            SolverPhase::Ready | SolverPhase::Running => {}
            other => return Err(SolverError::NotRunnable(other)),
        }

        let started = Instant::now();
        let result = self.run_loop();
        self.elapsed += started.elapsed();

        match result {
            Ok(()) => {
                self.phase = SolverPhase::Completed;
                let summary = self.summary();
                tracing::info!(
                    steps = summary.steps_completed,
                    elapsed_secs = summary.elapsed_secs,
                    "运行完成"
                );
                Ok(summary)
            }
            Err(e) => {
                tracing::warn!(error = %e, steps = self.steps_completed, "运行中止");
                Err(e)
            }
        }
    }

    fn run_loop(&mut self) -> Result<(), SolverError> {
        while self.steps_completed < self.grid.nt {
            if self.cancelled.load(Ordering::Relaxed) {
                self.phase = SolverPhase::Aborted;
                return Err(SolverError::Cancelled {
                    completed_steps: self.steps_completed,
                });
            }
            if let Some(deadline) = self.deadline {
                if Instant::now() >= deadline {
                    self.phase = SolverPhase::Aborted;
                    return Err(SolverError::DeadlineExceeded {
                        completed_steps: self.steps_completed,
                    });
                }
            }
            self.step()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ak_config::RetentionPolicy;

    fn small_config() -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.medium.speed_of_sound = 343.0;
        config.resolution.fmax = 500.0;
        config.resolution.ppw = 6.0;
        config.resolution.duration = 0.005;
        config.room.lx = 2.0;
        config.room.ly = 1.5;
        config
    }

    #[test]
    fn test_assembly_reaches_ready() {
        let solver = WaveSolver::from_config(&small_config()).unwrap();
        assert_eq!(solver.phase(), SolverPhase::Ready);
        assert_eq!(solver.steps_completed(), 0);
        assert!(solver.grid().nt > 0);
    }

    #[test]
    fn test_run_completes_with_full_trace() {
        let mut solver = WaveSolver::from_config(&small_config()).unwrap();
        let nt = solver.grid().nt;
        let summary = solver.run().unwrap();
        assert_eq!(solver.phase(), SolverPhase::Completed);
        assert_eq!(summary.steps_completed, nt);
        assert_eq!(solver.trace().len(), nt);
        // 摘要携带逐轴节点数，网格形状可由输出件复原
        assert_eq!(summary.nx, solver.grid().nx);
        assert_eq!(summary.ny, solver.grid().ny);
        assert_eq!(summary.nz, solver.grid().nz);
        assert_eq!(summary.n_nodes, summary.nx * summary.ny * summary.nz);
    }

    #[test]
    fn test_silent_source_yields_zero_trace() {
        let mut config = small_config();
        config.source.excitation = vec![0.0; 8];
        let mut solver = WaveSolver::from_config(&config).unwrap();
        let nt = solver.grid().nt;
        solver.run().unwrap();

        let trace = solver.trace();
        assert_eq!(trace.len(), nt);
        assert!(trace
            .samples(ak_runtime::receiver(0))
            .iter()
            .all(|&v| v == 0.0));
    }

    #[test]
    fn test_impulse_produces_nonzero_trace() {
        let mut solver = WaveSolver::from_config(&small_config()).unwrap();
        solver.run().unwrap();
        let samples = solver.trace().samples(ak_runtime::receiver(0));
        assert!(samples.iter().any(|&v| v != 0.0));
        assert!(samples.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_cancellation_preserves_partial_trace() {
        let mut solver = WaveSolver::from_config(&small_config()).unwrap();
        for _ in 0..3 {
            solver.step().unwrap();
        }
        solver.handle().cancel();
        let err = solver.run().unwrap_err();
        assert!(matches!(
            err,
            SolverError::Cancelled { completed_steps: 3 }
        ));
        assert_eq!(solver.phase(), SolverPhase::Aborted);
        assert_eq!(solver.trace().len(), 3);
    }

    #[test]
    fn test_expired_deadline_aborts() {
        let mut solver = WaveSolver::from_config(&small_config()).unwrap();
        solver.set_deadline(Instant::now() - Duration::from_millis(1));
        let err = solver.run().unwrap_err();
        assert!(matches!(
            err,
            SolverError::DeadlineExceeded { completed_steps: 0 }
        ));
        assert_eq!(solver.phase(), SolverPhase::Aborted);
    }

    #[test]
    fn test_instability_abort() {
        let mut config = small_config();
        config.tuning.amplitude_bound = 0.5;
        config.source.excitation = vec![10.0];
        let mut solver = WaveSolver::from_config(&config).unwrap();
        let err = solver.run().unwrap_err();
        assert!(matches!(err, SolverError::Instability { .. }));
        assert_eq!(solver.phase(), SolverPhase::Aborted);
        // 中止的求解器不可再步进
        assert!(matches!(solver.step(), Err(SolverError::NotRunnable(_))));
    }

    #[test]
    fn test_completed_solver_not_runnable() {
        let mut solver = WaveSolver::from_config(&small_config()).unwrap();
        solver.run().unwrap();
        assert!(matches!(solver.run(), Err(SolverError::NotRunnable(_))));
    }

    #[test]
    fn test_full_retention_records_snapshots() {
        let mut config = small_config();
        config.resolution.duration = 0.001;
        config.memory.retention = RetentionPolicy::Full;
        let mut solver = WaveSolver::from_config(&config).unwrap();
        let nt = solver.grid().nt;
        solver.run().unwrap();
        assert_eq!(solver.store().snapshots().len(), nt);
        assert_eq!(solver.store().snapshots()[0].len(), solver.grid().n_nodes());
    }

    #[test]
    fn test_budget_rejection_at_assembly() {
        let mut config = small_config();
        config.memory.budget_bytes = Some(128);
        let err = WaveSolver::from_config(&config).unwrap_err();
        assert!(matches!(err, SolverError::Resource(_)));
    }

    #[test]
    fn test_rigid_energy_stays_bounded() {
        // 刚性全反射下脉冲在闭域内回荡，幅值保持有限
        let mut config = small_config();
        config.resolution.duration = 0.02;
        let mut solver = WaveSolver::from_config(&config).unwrap();
        solver.run().unwrap();
        let samples = solver.trace().samples(ak_runtime::receiver(0));
        assert!(samples.iter().all(|v| v.abs() < 100.0));
    }

    #[test]
    fn test_absorbing_boundary_attenuates_return() {
        // R = 0 吸收边界的后期回波远小于刚性边界
        let mut rigid_cfg = small_config();
        rigid_cfg.resolution.duration = 0.02;
        let mut lossy_cfg = rigid_cfg.clone();
        lossy_cfg.boundary.apply_loss = true;
        lossy_cfg.boundary.refl_coeff = 0.0;

        let tail_energy = |config: &SimulationConfig| -> f64 {
            let mut solver = WaveSolver::from_config(config).unwrap();
            solver.run().unwrap();
            let samples = solver.trace().samples(ak_runtime::receiver(0));
            // 跳过直达波，只看边界返回之后的段
            samples[samples.len() / 2..].iter().map(|v| v * v).sum()
        };

        let rigid = tail_energy(&rigid_cfg);
        let lossy = tail_energy(&lossy_cfg);
        assert!(lossy < rigid * 0.1, "吸收边界回波 {lossy} 未远小于刚性 {rigid}");
    }

    #[test]
    fn test_dome_run_completes() {
        let mut config = small_config();
        config.room.dome_radius = Some(0.75);
        config.resolution.duration = 0.002;
        let mut solver = WaveSolver::from_config(&config).unwrap();
        solver.run().unwrap();
        assert_eq!(solver.phase(), SolverPhase::Completed);
        let samples = solver.trace().samples(ak_runtime::receiver(0));
        assert!(samples.iter().all(|v| v.is_finite()));
    }
}
