//! Project task breakdown produced by the planning architect

use super::{StructuredError, StructuredOutput};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::Write as _;
use std::sync::LazyLock;

static ESTIMATED_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+天$").expect("estimated time pattern is a valid regex"));

/// Archive prefix for saved plans
pub const PLAN_ARCHIVE_PREFIX: &str = "project_tasks_db";

/// Persona that breaks a requirement into modules
pub const PLANNER_PROMPT: &str = "\
### 角色：
你是一个精通项目管理的系统架构师，对项目的健壮性和可靠性有着近乎偏执的追求，愿意花时间打磨产品，不为上线时间妥协。";

const FEW_SHOT: &str = r#"### 范例 (Few-Shot)：
用户需求：设计一个基础的 Redis 库存扣减模块。
输出：
{
    "project_name": "Redis 库存模块",
    "total_modules": 1,
    "details": [{
        "module": "缓存层",
        "priority": "高",
        "estimated_time": "1天",
        "tasks": [
            "编写 Lua 脚本实现 DECR 原子扣减与库存校验",
            "配置 Redis 连接池，设置合理的超时重试策略",
            "实现库存预热脚本，将 MySQL 数据同步至 Redis"
        ]
    }]
}"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    #[serde(rename = "高")]
    High,
    #[serde(rename = "中")]
    Medium,
    #[serde(rename = "低")]
    Low,
}

impl Priority {
    pub fn label(&self) -> &'static str {
        match self {
            Priority::High => "高",
            Priority::Medium => "中",
            Priority::Low => "低",
        }
    }
}

/// One module of the breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleTask {
    pub module: String,
    pub priority: Priority,
    /// Whole days, written as `N天`
    pub estimated_time: String,
    pub tasks: Vec<String>,
}

/// Project breakdown returned by the planner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectPlan {
    pub project_name: String,
    pub total_modules: u32,
    pub details: Vec<ModuleTask>,
}

impl ProjectPlan {
    /// User prompt wrapping `requirement` with format rules and an example
    pub fn prompt(requirement: &str) -> String {
        format!(
            "### 背景：\n{}\n\n### 格式要求：\n\
             1. 必须只返回 JSON 格式数据，严禁包含任何自然语言的解释或开场白。\n\
             2. priority 只能是 高 / 中 / 低，estimated_time 形如 \"3天\"，total_modules 等于 details 的数量。\n\n{}",
            requirement.trim(),
            FEW_SHOT
        )
    }

    /// Total estimated days across modules
    pub fn total_days(&self) -> u32 {
        self.details
            .iter()
            .filter_map(|m| m.estimated_time.strip_suffix('天'))
            .filter_map(|d| d.parse::<u32>().ok())
            .sum()
    }
}

impl StructuredOutput for ProjectPlan {
    fn schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "project_name": { "type": "STRING", "description": "项目名称" },
                "total_modules": { "type": "INTEGER", "description": "模块的总计数量" },
                "details": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "module": { "type": "STRING" },
                            "priority": { "type": "STRING", "enum": ["高", "中", "低"] },
                            "estimated_time": { "type": "STRING", "description": "整数天数，例如 3天" },
                            "tasks": { "type": "ARRAY", "items": { "type": "STRING" } }
                        },
                        "required": ["module", "priority", "estimated_time", "tasks"]
                    }
                }
            },
            "required": ["project_name", "total_modules", "details"]
        })
    }

    fn validate(&self) -> Result<(), StructuredError> {
        if self.project_name.trim().is_empty() {
            return Err(StructuredError::validation("project_name", "must not be empty"));
        }

        for (i, module) in self.details.iter().enumerate() {
            if !ESTIMATED_TIME.is_match(&module.estimated_time) {
                return Err(StructuredError::validation(
                    format!("details[{}].estimated_time", i),
                    format!("'{}' does not match ^\\d+天$", module.estimated_time),
                ));
            }
        }

        if self.total_modules as usize != self.details.len() {
            return Err(StructuredError::validation(
                "total_modules",
                format!(
                    "declares {} modules but details lists {}",
                    self.total_modules,
                    self.details.len()
                ),
            ));
        }

        Ok(())
    }
}

/// Plain-text table of the plan
pub fn render_plan_table(plan: &ProjectPlan) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {} ==", plan.project_name);
    let _ = writeln!(out, "项目任务清单 ({} 个模块)", plan.details.len());
    let _ = writeln!(out, "{}", "-".repeat(48));
    let _ = writeln!(out, "模块 | 优先级 | 耗时 | 任务详情");
    let _ = writeln!(out, "{}", "-".repeat(48));

    for module in &plan.details {
        let _ = writeln!(
            out,
            "{} | {} | {}",
            module.module,
            module.priority.label(),
            module.estimated_time
        );
        for task in &module.tasks {
            let _ = writeln!(out, "    • {}", task);
        }
        let _ = writeln!(out, "{}", "-".repeat(48));
    }

    out
}
