// crates/ak_physics/src/engine/stencil.rs

//! 空间模板更新
//!
//! 对全部内部节点做跳蛙更新：
//!
//! ```text
//! next = 2*cur - prev + λ² * (Σ 轴向邻居 cur - 2D * cur)
//! ```
//!
//! 其中 λ² = (c*dt/dx)²，在稳定性极限处恰为 1/D。
//! 内部节点的全部轴向邻居保证在格（掩码构建保证），无需钳位。
//!
//! 并行版按 x 行分块：每行只写自己的 `next` 片段，读共享的
//! `prev` / `cur`，无写冲突；幅值最大值用位型原子做无锁归约
//! （非负浮点的位序与数值序一致）。

use ak_config::Dimensionality;
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::grid::Grid;
use crate::mask::{DomainMask, NodeTag};

/// 更新全部内部节点，返回写入值的最大幅值
///
/// 节点数低于 `min_parallel_size` 时走串行路径，避免小网格上
/// 的调度开销。两条路径逐位等价（同一求和顺序）。
pub(crate) fn update_interior(
    grid: &Grid,
    mask: &DomainMask,
    lambda2: f64,
    prev: &[f64],
    cur: &[f64],
    next: &mut [f64],
    min_parallel_size: usize,
) -> f64 {
    if grid.n_nodes() < min_parallel_size {
        update_serial(grid, mask, lambda2, prev, cur, next)
    } else {
        update_parallel(grid, mask, lambda2, prev, cur, next)
    }
}

#[inline]
fn update_row(
    grid: &Grid,
    tags: &[NodeTag],
    lambda2: f64,
    prev: &[f64],
    cur: &[f64],
    row: &mut [f64],
    base: usize,
) -> f64 {
    let nx = grid.nx;
    let plane = nx * grid.ny;
    let two_d = 2.0 * grid.dimensionality.ndim() as f64;
    let mut max_abs = 0.0f64;

    for i in 0..row.len() {
        let n = base + i;
        if tags[n] != NodeTag::Interior {
            continue;
        }

        let c = cur[n];
        let mut sum = cur[n - 1] + cur[n + 1] + cur[n - nx] + cur[n + nx];
        if grid.dimensionality == Dimensionality::ThreeD {
            sum += cur[n - plane] + cur[n + plane];
        }

        let value = 2.0 * c - prev[n] + lambda2 * (sum - two_d * c);
        row[i] = value;
        max_abs = max_abs.max(value.abs());
    }

    max_abs
}

fn update_serial(
    grid: &Grid,
    mask: &DomainMask,
    lambda2: f64,
    prev: &[f64],
    cur: &[f64],
    next: &mut [f64],
) -> f64 {
    let tags = mask.tags();
    let mut max_abs = 0.0f64;
    for (r, row) in next.chunks_mut(grid.nx).enumerate() {
        max_abs = max_abs.max(update_row(grid, tags, lambda2, prev, cur, row, r * grid.nx));
    }
    max_abs
}

fn update_parallel(
    grid: &Grid,
    mask: &DomainMask,
    lambda2: f64,
    prev: &[f64],
    cur: &[f64],
    next: &mut [f64],
) -> f64 {
    let tags = mask.tags();
    let max_bits = AtomicU64::new(0);

    next.par_chunks_mut(grid.nx)
        .enumerate()
        .for_each(|(r, row)| {
            let local = update_row(grid, tags, lambda2, prev, cur, row, r * grid.nx);
            max_bits.fetch_max(local.to_bits(), Ordering::Relaxed);
        });

    f64::from_bits(max_bits.load(Ordering::Relaxed))
}
