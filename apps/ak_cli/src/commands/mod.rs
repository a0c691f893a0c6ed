// apps/ak_cli/src/commands/mod.rs

//! CLI 子命令

pub mod info;
pub mod run;
pub mod validate;

use ak_config::SimulationConfig;
use anyhow::{Context, Result};
use std::path::Path;

/// 加载配置文件，未指定时使用默认配置
pub(crate) fn load_config(path: Option<&Path>) -> Result<SimulationConfig> {
    match path {
        Some(p) => SimulationConfig::from_file(p)
            .with_context(|| format!("加载配置失败: {}", p.display())),
        None => Ok(SimulationConfig::default()),
    }
}
