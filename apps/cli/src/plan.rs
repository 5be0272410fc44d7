//! 自动化计划加载
//!
//! 计划文件支持 TOML 和 JSON 两种格式（按扩展名区分）：
//!
//! ```toml
//! name = "demo"
//!
//! [[steps]]
//! sequence_number = 1
//! radius = 10.0
//! angle = 0.0
//! delay_seconds = 1
//! ```
//!
//! 加载时按 `sequence_number` 排序，延时为负数的行直接拒绝。

use anyhow::{Context, Result};
use polar_client::AutomationStep;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 计划文件中的一行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRow {
    pub sequence_number: i32,
    pub radius: f64,
    pub angle: f64,
    /// 有符号读取，以便给出明确的错误信息
    pub delay_seconds: i64,
}

/// 自动化计划
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// 计划名称
    #[serde(default)]
    pub name: Option<String>,

    pub steps: Vec<PlanRow>,
}

impl Plan {
    /// 加载计划文件
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("读取计划文件失败: {}", path.display()))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml(&content),
            Some("json") => Self::from_json(&content),
            other => anyhow::bail!("不支持的计划文件格式: {:?}（需要 .toml 或 .json）", other),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("解析计划 TOML 失败")
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("解析计划 JSON 失败")
    }

    /// 校验并转换为自动化步骤（按序号排序）
    pub fn into_steps(self) -> Result<Vec<AutomationStep>> {
        let mut rows = self.steps;
        rows.sort_by_key(|row| row.sequence_number);

        rows.into_iter()
            .map(|row| {
                let delay = u64::try_from(row.delay_seconds).map_err(|_| {
                    anyhow::anyhow!(
                        "步骤 #{} 的延时不能为负数: {}",
                        row.sequence_number,
                        row.delay_seconds
                    )
                })?;
                Ok(AutomationStep::new(
                    row.sequence_number,
                    row.radius,
                    row.angle,
                    delay,
                ))
            })
            .collect()
    }
}
