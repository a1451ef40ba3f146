//! Conversational wrapper with a manually managed history

use crate::persistence::StoreError;
use crate::protocol::{Content, GenerateContentRequest, UsageMetadata};
use crate::providers::{GenerativeModel, ProviderError, ProviderResult};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Persona used by [`review_code`]
pub const CODE_REVIEWER_PROMPT: &str = "\
你是一个拥有 20 年经验的资深 Python 架构师。
你的任务是评审用户提交的代码。
要求：
1. 只指出代码中的逻辑缺陷、性能瓶颈或不规范命名。
2. 评价必须刻薄但精准。
3. 必须给出优化后的 Python 代码块。
4. 使用 Markdown 格式输出。";

/// Chain-of-thought architect persona for design documents
pub const ARCHITECT_COT_PROMPT: &str = "\
你是一个有丰富经验的系统架构师，擅长一步步思考。

在回答之前，请务必遵循以下步骤 (Chain of Thought)：
1. 【场景分析】：深入分析用户的具体业务场景、并发量级和核心约束条件。
2. 【瓶颈识别】：指出在当前场景下，系统最可能挂在哪个环节（如数据库死锁、带宽打满）。
3. 【方案设计】：给出分层防御的架构方案（如网关层、缓存层、数据库层），并解释技术选型理由。
4. 【兜底策略】：设计异常情况下的降级或熔断方案。

输出格式要求：请使用清晰的 Markdown 格式，包含标题、加粗和代码块。";

const REVIEW_TEMPERATURE: f32 = 0.3;

/// A multi-turn conversation
///
/// The full history is resent on every turn. A failed call leaves the
/// history untouched so the caller can simply retry.
pub struct ChatSession {
    model: Arc<dyn GenerativeModel>,
    system_instruction: Option<String>,
    temperature: Option<f32>,
    history: Vec<Content>,
    last_usage: Option<UsageMetadata>,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("model", &self.model.model_id())
            .field("turns", &self.history.len())
            .finish()
    }
}

impl ChatSession {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self {
            model,
            system_instruction: None,
            temperature: None,
            history: Vec::new(),
            last_usage: None,
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Send `message` after the existing history and return the reply text
    pub async fn ask(&mut self, message: &str) -> ProviderResult<String> {
        let user_turn = Content::user_text(message);
        let mut contents = self.history.clone();
        contents.push(user_turn.clone());

        let mut request = GenerateContentRequest::new(contents);
        if let Some(instruction) = &self.system_instruction {
            request = request.with_system_instruction(instruction.clone());
        }
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }

        debug!(turns = self.history.len(), "Sending chat turn");
        let response = self.model.generate(&request).await?;
        let text = response.text().ok_or_else(|| ProviderError::EmptyResponse {
            reason: "reply carried no text".to_string(),
        })?;

        self.history.push(user_turn);
        self.history.push(Content::model_text(text.clone()));
        self.last_usage = response.usage_metadata;

        Ok(text)
    }

    /// Drop the conversation so far
    pub fn reset(&mut self) {
        self.history.clear();
        self.last_usage = None;
    }

    pub fn history(&self) -> &[Content] {
        &self.history
    }

    /// Token usage of the most recent successful turn
    pub fn last_usage(&self) -> Option<UsageMetadata> {
        self.last_usage
    }
}

/// Markdown review plus the token bill
#[derive(Debug, Clone, PartialEq)]
pub struct CodeReview {
    pub markdown: String,
    pub usage: Option<UsageMetadata>,
}

/// Review `code` with the senior-architect persona
pub async fn review_code(model: &dyn GenerativeModel, code: &str) -> ProviderResult<CodeReview> {
    let request = GenerateContentRequest::from_text(format!("评审这段代码：\n{}", code))
        .with_system_instruction(CODE_REVIEWER_PROMPT)
        .with_temperature(REVIEW_TEMPERATURE);

    let response = model.generate(&request).await?;
    let markdown = response.text().ok_or_else(|| ProviderError::EmptyResponse {
        reason: "review carried no text".to_string(),
    })?;

    Ok(CodeReview {
        markdown,
        usage: response.usage_metadata,
    })
}

/// Write a Markdown document, creating parent directories
pub fn save_markdown(path: impl AsRef<Path>, content: &str) -> Result<(), StoreError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    fs::write(path, content).map_err(|e| StoreError::io(path, e))?;
    info!(path = %path.display(), "Document saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Role;
    use crate::providers::ScriptedModel;

    #[tokio::test]
    async fn test_history_grows_on_success() {
        let model = Arc::new(ScriptedModel::from_texts(["方案一", "补充说明"]));
        let mut session = ChatSession::new(model.clone())
            .with_system_instruction(ARCHITECT_COT_PROMPT)
            .with_temperature(0.7);

        assert_eq!(session.ask("设计秒杀").await.unwrap(), "方案一");
        assert_eq!(session.ask("再详细点").await.unwrap(), "补充说明");
        assert_eq!(session.history().len(), 4);
        assert_eq!(session.history()[1].role, Some(Role::Model));

        let second = &model.requests()[1];
        assert_eq!(second.contents.len(), 3);
        assert!(second.system_instruction.is_some());
    }

    #[tokio::test]
    async fn test_history_unchanged_on_failure() {
        let model = Arc::new(ScriptedModel::new());
        model.push_error(ProviderError::Timeout);
        let mut session = ChatSession::new(model);

        assert!(session.ask("hello").await.is_err());
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_review_uses_low_temperature() {
        let model = ScriptedModel::from_texts(["## 问题\n- 用 sum()"]);
        let review = review_code(&model, "def total(n): ...").await.unwrap();

        assert!(review.markdown.contains("sum()"));
        let request = &model.requests()[0];
        let config = request.generation_config.as_ref().unwrap();
        assert_eq!(config.temperature, Some(0.3));
    }

    #[test]
    fn test_save_markdown_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rst/architecture_design.md");
        save_markdown(&path, "# 设计").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "# 设计");
    }
}
