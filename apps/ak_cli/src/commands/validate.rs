// apps/ak_cli/src/commands/validate.rs

//! 配置验证命令
//!
//! 验证配置文件的格式与一致性，附带若干经验性警告
//! （不影响有效性判定，除非启用严格模式）。

use ak_config::SimulationConfig;
use ak_physics::GridPlanner;
use anyhow::{bail, Result};
use clap::Args;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// 验证参数
#[derive(Args)]
pub struct ValidateArgs {
    /// 配置文件路径
    #[arg(short, long)]
    pub config: PathBuf,

    /// 严格模式（警告也视为错误）
    #[arg(long)]
    pub strict: bool,
}

/// 验证结果
#[derive(Default)]
struct ValidationResult {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationResult {
    fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn is_ok(&self, strict: bool) -> bool {
        self.errors.is_empty() && (!strict || self.warnings.is_empty())
    }
}

/// 执行验证命令
pub fn execute(args: ValidateArgs) -> Result<()> {
    info!("=== AkuRoom 配置验证 ===");
    println!("检查配置文件: {}", args.config.display());

    let mut result = ValidationResult::default();

    match SimulationConfig::from_file(&args.config) {
        Ok(config) => {
            println!("  ✓ 配置文件格式有效");
            check_consistency(&config, &mut result);
        }
        Err(e) => result.add_error(e.to_string()),
    }

    print_validation_result(&result, args.strict)
}

/// 超出硬性验证的经验性检查
fn check_consistency(config: &SimulationConfig, result: &mut ValidationResult) {
    if config.resolution.ppw < 6.0 {
        result.add_warning(format!(
            "ppw = {} 低于推荐值 6，数值色散可能明显",
            config.resolution.ppw
        ));
    }

    if let Some(r) = config.room.dome_radius {
        let half_span = config.room.lx / 2.0;
        if r > half_span {
            result.add_warning(format!(
                "穹顶半径 {} m 超过房间半宽 {} m，穹顶将被盒体边缘截断",
                r, half_span
            ));
        }
    }

    let planner = match GridPlanner::new(config) {
        Ok(planner) => planner,
        Err(e) => {
            result.add_error(e.to_string());
            return;
        }
    };
    let grid = match planner.plan() {
        Ok(grid) => grid,
        Err(e) => {
            result.add_error(e.to_string());
            return;
        }
    };

    if grid.n_nodes() > 100_000_000 {
        result.add_warning(format!(
            "节点数 {} 超过 1 亿，建议设置内存预算",
            grid.n_nodes()
        ));
    }
    if config.memory.retention == ak_config::RetentionPolicy::Full
        && grid.nt * grid.n_nodes() > 10_000_000
    {
        result.add_warning("Full 保留策略下快照总量很大，建议改用 receiver_only");
    }
}

fn print_validation_result(result: &ValidationResult, strict: bool) -> Result<()> {
    println!("\n=== 验证结果 ===");

    if !result.errors.is_empty() {
        println!("\n错误 ({}):", result.errors.len());
        for err in &result.errors {
            error!("  ✗ {}", err);
            println!("  ✗ {}", err);
        }
    }

    if !result.warnings.is_empty() {
        println!("\n警告 ({}):", result.warnings.len());
        for warning in &result.warnings {
            warn!("  ⚠ {}", warning);
            println!("  ⚠ {}", warning);
        }
    }

    if result.is_ok(strict) {
        println!("\n✓ 验证通过");
        Ok(())
    } else {
        println!("\n✗ 验证失败");
        bail!(
            "验证失败：发现 {} 个错误，{} 个警告",
            result.errors.len(),
            result.warnings.len()
        )
    }
}
