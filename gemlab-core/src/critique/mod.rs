//! Generator / auditor / refactorer improvement loop
//!
//! An architect drafts code from a design context, an auditor scores it,
//! and a refactorer rewrites it against the critiques. The loop keeps every
//! round and returns the best-scoring draft.

pub mod prompts;

use crate::persistence::{JsonArchive, StoreError};
use crate::protocol::GenerateContentRequest;
use crate::providers::GenerativeModel;
use crate::structured::{escape_control_chars, extract_json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

/// Archive prefix for the winning draft
pub const CRITIQUE_ARCHIVE_PREFIX: &str = "optimized_service";

/// Highest score an auditor can award
pub const MAX_SCORE: u32 = 10;

#[derive(Debug, Error)]
pub enum CritiqueError {
    #[error("Initial generation failed: {reason}")]
    InitialGeneration { reason: String },

    #[error("Loop is configured with zero iterations")]
    NoRounds,
}

/// Loop bounds
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct CritiqueConfig {
    /// Number of audit rounds
    pub max_iterations: u32,
    /// Score (0-10) at which the loop stops early
    pub pass_score: u32,
}

impl Default for CritiqueConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            pass_score: 9,
        }
    }
}

/// One LLM-backed participant
#[derive(Clone)]
pub struct Role {
    name: String,
    system_instruction: String,
    model: Arc<dyn GenerativeModel>,
}

impl std::fmt::Debug for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Role")
            .field("name", &self.name)
            .field("model", &self.model.model_id())
            .finish()
    }
}

impl Role {
    pub fn new(
        name: impl Into<String>,
        system_instruction: impl Into<String>,
        model: Arc<dyn GenerativeModel>,
    ) -> Self {
        Self {
            name: name.into(),
            system_instruction: system_instruction.into(),
            model,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Send one user turn and return the cleaned JSON text
    ///
    /// API failures are logged and reported as `None`.
    pub async fn ask(&self, message: &str) -> Option<String> {
        info!(role = %self.name, "Thinking");
        let request = GenerateContentRequest::from_text(message)
            .with_system_instruction(self.system_instruction.clone());

        match self.model.generate(&request).await {
            Ok(response) => match response.text() {
                Some(text) => Some(extract_json(&text).to_string()),
                None => {
                    warn!(role = %self.name, "Reply carried no text");
                    None
                }
            },
            Err(e) => {
                error!(role = %self.name, error = %e, "Model call failed");
                None
            }
        }
    }
}

/// Snapshot of one audit round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: u32,
    pub score: u32,
    pub code: String,
    pub critiques: Vec<String>,
}

/// Result of a full run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CritiqueOutcome {
    pub best: RoundRecord,
    pub history: Vec<RoundRecord>,
    /// Whether the best round reached the pass score
    pub passed: bool,
}

impl CritiqueOutcome {
    /// Persist the winning round
    pub fn archive(&self, archive: &JsonArchive) -> Result<PathBuf, StoreError> {
        archive.save(CRITIQUE_ARCHIVE_PREFIX, &self.best)
    }
}

/// Parsed auditor verdict
#[derive(Debug, Clone, PartialEq)]
struct Audit {
    score: u32,
    critiques: Vec<String>,
}

impl Audit {
    fn parse_failure() -> Self {
        Self {
            score: 0,
            critiques: vec![prompts::AUDIT_PARSE_FAILURE.to_string()],
        }
    }

    fn from_reply(raw: Option<&str>) -> Self {
        let Some(value) = raw.and_then(parse_object) else {
            return Self::parse_failure();
        };

        let score = value.get("score").map(score_from_value).unwrap_or(0);
        let critiques = match value.get("critiques") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            Some(Value::String(s)) => vec![s.clone()],
            _ => Vec::new(),
        };

        Self { score, critiques }
    }
}

fn parse_object(raw: &str) -> Option<Value> {
    serde_json::from_str::<Value>(&escape_control_chars(raw))
        .ok()
        .filter(Value::is_object)
}

fn score_from_value(value: &Value) -> u32 {
    let score = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    score.clamp(0.0, MAX_SCORE as f64) as u32
}

fn pseudocode(raw: Option<&str>) -> Option<String> {
    raw.and_then(parse_object)
        .and_then(|v| v.get("pseudocode").and_then(Value::as_str).map(str::to_string))
        .filter(|code| !code.trim().is_empty())
}

/// The three-role improvement loop
#[derive(Debug, Clone)]
pub struct CritiqueLoop {
    architect: Role,
    auditor: Role,
    refactorer: Role,
    config: CritiqueConfig,
}

impl CritiqueLoop {
    /// Loop using the default personas on one model
    pub fn new(model: Arc<dyn GenerativeModel>, config: CritiqueConfig) -> Self {
        Self {
            architect: Role::new(prompts::ARCHITECT_NAME, prompts::ARCHITECT_PROMPT, model.clone()),
            auditor: Role::new(prompts::AUDITOR_NAME, prompts::AUDITOR_PROMPT, model.clone()),
            refactorer: Role::new(prompts::REFACTOR_NAME, prompts::REFACTOR_PROMPT, model),
            config,
        }
    }

    /// Loop with custom roles
    pub fn with_roles(architect: Role, auditor: Role, refactorer: Role, config: CritiqueConfig) -> Self {
        Self {
            architect,
            auditor,
            refactorer,
            config,
        }
    }

    pub fn config(&self) -> &CritiqueConfig {
        &self.config
    }

    /// Run the loop against a design context
    pub async fn run(&self, context: &Value) -> Result<CritiqueOutcome, CritiqueError> {
        if self.config.max_iterations == 0 {
            return Err(CritiqueError::NoRounds);
        }

        let architect_raw = self
            .architect
            .ask(&format!("参考设计：{}", context))
            .await
            .ok_or_else(|| CritiqueError::InitialGeneration {
                reason: format!("{} returned nothing", self.architect.name()),
            })?;
        let mut current_code = pseudocode(Some(&architect_raw)).ok_or_else(|| {
            CritiqueError::InitialGeneration {
                reason: "reply has no usable 'pseudocode' field".to_string(),
            }
        })?;

        let mut history: Vec<RoundRecord> = Vec::new();

        for i in 0..self.config.max_iterations {
            let round = i + 1;
            info!(round, "Critique round started");

            let audit_raw = self
                .auditor
                .ask(&format!("请审计此代码：\n{}", current_code))
                .await;
            let audit = Audit::from_reply(audit_raw.as_deref());
            if audit.critiques.first().map(String::as_str) == Some(prompts::AUDIT_PARSE_FAILURE) {
                warn!(round, "Audit reply unusable, scoring 0");
            }

            info!(round, score = audit.score, "Audit finished");
            history.push(RoundRecord {
                round,
                score: audit.score,
                code: current_code.clone(),
                critiques: audit.critiques.clone(),
            });

            if audit.score >= self.config.pass_score {
                info!(round, "Pass score reached, stopping early");
                break;
            }

            if i + 1 < self.config.max_iterations {
                let critiques = serde_json::to_string(&audit.critiques).unwrap_or_default();
                let refactor_raw = self
                    .refactorer
                    .ask(&format!(
                        "历史代码：\n{}\n\n历史审计意见：\n{}",
                        current_code, critiques
                    ))
                    .await;

                match pseudocode(refactor_raw.as_deref()) {
                    Some(code) => current_code = code,
                    None => warn!(round, "Refactor reply unusable, keeping previous code"),
                }
            }
        }

        let best = best_round(&history).ok_or(CritiqueError::NoRounds)?.clone();
        let passed = best.score >= self.config.pass_score;
        info!(round = best.round, score = best.score, passed, "Best version selected");

        Ok(CritiqueOutcome {
            best,
            history,
            passed,
        })
    }
}

/// Highest score, earliest round on ties
pub fn best_round(history: &[RoundRecord]) -> Option<&RoundRecord> {
    history.iter().fold(None, |best: Option<&RoundRecord>, record| match best {
        Some(b) if b.score >= record.score => Some(b),
        _ => Some(record),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn record(round: u32, score: u32) -> RoundRecord {
        RoundRecord {
            round,
            score,
            code: format!("v{}", round),
            critiques: Vec::new(),
        }
    }

    #[test]
    fn test_best_round_prefers_earliest_tie() {
        let history = vec![record(1, 3), record(2, 7), record(3, 7), record(4, 5)];
        assert_eq!(best_round(&history).unwrap().round, 2);
        assert!(best_round(&[]).is_none());
    }

    #[test_case(Some(r#"{"score": 7, "critiques": ["a", "b"]}"#), 7, 2 ; "normal verdict")]
    #[test_case(Some(r#"{"score": 8.9, "critiques": "single"}"#), 8, 1 ; "float score and string critique")]
    #[test_case(Some(r#"{"score": "9"}"#), 9, 0 ; "string score")]
    #[test_case(Some(r#"{"score": 42}"#), 10, 0 ; "clamped")]
    #[test_case(Some("not json"), 0, 1 ; "garbage")]
    #[test_case(None, 0, 1 ; "api failure")]
    fn test_audit_parsing(raw: Option<&str>, score: u32, critiques: usize) {
        let audit = Audit::from_reply(raw);
        assert_eq!(audit.score, score);
        assert_eq!(audit.critiques.len(), critiques);
    }

    #[test]
    fn test_pseudocode_requires_text() {
        assert_eq!(pseudocode(Some(r#"{"pseudocode": "return 1"}"#)).as_deref(), Some("return 1"));
        assert!(pseudocode(Some(r#"{"pseudocode": "  "}"#)).is_none());
        assert!(pseudocode(Some(r#"{"module": "x"}"#)).is_none());
        assert!(pseudocode(None).is_none());
    }
}
