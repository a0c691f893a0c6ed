// apps/ak_cli/src/commands/run.rs

//! 运行模拟命令
//!
//! 从配置装配求解器，执行时间步进，把接收点记录写为 CSV、
//! 运行摘要写为 JSON。失稳或超时中止时仍导出已完成步的记录。

use anyhow::{Context, Result};
use ak_physics::{SolverError, WaveSolver};
use clap::Args;
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use ak_runtime::receiver;

/// 运行模拟参数
#[derive(Args)]
pub struct RunArgs {
    /// 配置文件路径（缺省使用默认配置）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 输出目录
    #[arg(short, long, default_value = "output")]
    pub output: PathBuf,

    /// 覆盖模拟时长 [秒]
    #[arg(short = 't', long)]
    pub duration: Option<f64>,

    /// 覆盖最高解析频率 [Hz]
    #[arg(long)]
    pub fmax: Option<f64>,

    /// 墙钟时间上限 [秒]（超出则中止并导出部分记录）
    #[arg(long)]
    pub max_seconds: Option<f64>,
}

/// 执行运行命令
pub fn execute(args: RunArgs) -> Result<()> {
    info!("=== AkuRoom 模拟启动 ===");

    let mut config = super::load_config(args.config.as_deref())?;
    if let Some(duration) = args.duration {
        config.resolution.duration = duration;
    }
    if let Some(fmax) = args.fmax {
        config.resolution.fmax = fmax;
    }

    let mut solver = WaveSolver::from_config(&config).context("装配求解器失败")?;
    if let Some(secs) = args.max_seconds {
        solver.set_deadline(Instant::now() + Duration::from_secs_f64(secs));
    }

    let grid = solver.grid();
    info!(
        "网格: {}x{}x{} = {} 节点, dx={:.4} m, dt={:.3e} s, {} 步",
        grid.nx,
        grid.ny,
        grid.nz,
        grid.n_nodes(),
        grid.dx,
        grid.dt,
        grid.nt
    );

    std::fs::create_dir_all(&args.output)?;

    // 中止路径同样导出部分记录
    match solver.run() {
        Ok(summary) => {
            info!("=== 模拟完成 ===");
            info!("总步数: {}", summary.steps_completed);
            info!("计算时间: {:.2} s", summary.elapsed_secs);
        }
        Err(
            e @ (SolverError::Instability { .. }
            | SolverError::Cancelled { .. }
            | SolverError::DeadlineExceeded { .. }),
        ) => {
            warn!("模拟中止: {}，导出已完成步的记录", e);
        }
        Err(e) => return Err(e.into()),
    }

    write_trace_csv(&solver, &args.output.join("trace.csv"))?;
    write_summary_json(&solver, &args.output.join("summary.json"))?;

    info!("输出目录: {}", args.output.display());
    Ok(())
}

/// 接收点记录写为 CSV（第一列为时刻，其后每接收点一列）
fn write_trace_csv(solver: &WaveSolver, path: &PathBuf) -> Result<()> {
    let trace = solver.trace();
    let dt = solver.grid().dt;

    let file = std::fs::File::create(path)
        .with_context(|| format!("创建输出文件失败: {}", path.display()))?;
    let mut w = std::io::BufWriter::new(file);

    write!(w, "time")?;
    for r in 0..trace.n_receivers() {
        write!(w, ",receiver_{r}")?;
    }
    writeln!(w)?;

    for step in 0..trace.len() {
        write!(w, "{:.9e}", step as f64 * dt)?;
        for r in 0..trace.n_receivers() {
            write!(w, ",{:.9e}", trace.samples(receiver(r))[step])?;
        }
        writeln!(w)?;
    }

    info!("接收点记录: {} ({} 样本)", path.display(), trace.len());
    Ok(())
}

fn write_summary_json(solver: &WaveSolver, path: &PathBuf) -> Result<()> {
    let summary = solver.summary();
    let content = serde_json::to_string_pretty(&summary)?;
    std::fs::write(path, content)?;
    Ok(())
}
