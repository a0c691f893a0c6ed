// apps/ak_cli/src/commands/info.rs

//! 网格规划与存储估算命令
//!
//! 在不分配任何场内存的前提下显示离散化结果与内存需求，
//! 用于在大模拟前评估可行性。

use ak_physics::state::TIME_LEVELS;
use ak_physics::GridPlanner;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use tracing::info;

/// 信息显示参数
#[derive(Args)]
pub struct InfoArgs {
    /// 配置文件路径（缺省使用默认配置）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 显示默认配置 JSON
    #[arg(long)]
    pub defaults: bool,
}

/// 执行信息命令
pub fn execute(args: InfoArgs) -> Result<()> {
    info!("=== AkuRoom 网格规划 ===");

    if args.defaults {
        let config = ak_config::SimulationConfig::default();
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let config = super::load_config(args.config.as_deref())?;
    let planner = GridPlanner::new(&config)?;
    let grid = planner.plan()?;

    println!("=== 离散化 ===");
    println!("维度: {}D", config.dimensionality.ndim());
    println!("网格间距 dx: {:.6} m ({:.3} mm)", grid.dx, grid.dx * 1000.0);
    println!("时间步长 dt: {:.6e} s", grid.dt);
    println!("Courant 数 λ: {:.6}", planner.courant());
    println!("节点数: {} x {} x {} = {}", grid.nx, grid.ny, grid.nz, grid.n_nodes());
    println!("时间步数: {}", grid.nt);
    println!("采样率: {:.1} Hz", grid.sample_rate());

    println!();
    println!("=== 存储估算 ===");
    let state = planner.estimated_state_bytes(&grid, TIME_LEVELS, 8)?;
    println!("场状态: {} 字节 ({:.2} MiB)", state, state as f64 / (1024.0 * 1024.0));

    let per_point = (TIME_LEVELS * 8) as f64;
    println!("点密度: {:.1} 点/m³", planner.point_density());
    println!(
        "存储密度: {:.1} 字节/m³ ({:.3} MiB/m³)",
        planner.storage_density(per_point),
        planner.storage_density(per_point) / (1024.0 * 1024.0)
    );

    if let Some(budget) = config.memory.budget_bytes {
        let fits = state <= budget;
        println!(
            "内存预算: {} 字节 -> {}",
            budget,
            if fits { "满足" } else { "不满足" }
        );
    }

    Ok(())
}
