//! Retrieval-augmented answering over a [`VectorStore`]

use super::store::{MetadataFilter, QueryHit, VectorStore};
use super::RagError;
use crate::config::RagSettings;
use crate::protocol::GenerateContentRequest;
use crate::providers::{GenerativeModel, ProviderError};
use std::sync::Arc;
use tracing::{debug, info};

/// Reply when a category filter finds nothing usable
pub const NO_MATERIAL_ANSWER: &str = "没有找到相关资料。";

/// Context placeholder when retrieval returns nothing
const EMPTY_CONTEXT: &str = "无";

const ANSWER_TEMPERATURE: f32 = 0.3;

/// Grounded-answer persona
pub const KNOWLEDGE_BASE_PROMPT: &str = "\
###角色
你是一个基于【私有知识库】的智能助手。
###任务
请根据提供的上下文回答用户问题。
###约束
1.如果上下文中没有答案，请诚实地说不知道，不要编造。
2.区分“事件的次数”和“动作的频率”。例如，“打了三次球”通常意味着“这是一次打球的活动”。
3.如果资料中没有明确提到见面的次数，请回答“资料中只提到了具体的互动细节，未统计见面总次数”。";

#[derive(Debug, Clone, PartialEq)]
pub struct RagAnswer {
    pub answer: String,
    /// Hits the answer was grounded on, closest first
    pub sources: Vec<QueryHit>,
}

/// Retrieve, then generate
pub struct RagPipeline {
    store: Arc<VectorStore>,
    model: Arc<dyn GenerativeModel>,
    n_results: usize,
    distance_threshold: Option<f32>,
    system_instruction: String,
}

impl std::fmt::Debug for RagPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagPipeline")
            .field("store", &self.store)
            .field("model", &self.model.model_id())
            .field("n_results", &self.n_results)
            .field("distance_threshold", &self.distance_threshold)
            .finish()
    }
}

impl RagPipeline {
    pub fn new(store: Arc<VectorStore>, model: Arc<dyn GenerativeModel>) -> Self {
        let defaults = RagSettings::default();
        Self {
            store,
            model,
            n_results: defaults.n_results,
            distance_threshold: defaults.distance_threshold,
            system_instruction: KNOWLEDGE_BASE_PROMPT.to_string(),
        }
    }

    pub fn from_settings(
        store: Arc<VectorStore>,
        model: Arc<dyn GenerativeModel>,
        settings: &RagSettings,
    ) -> Self {
        Self::new(store, model)
            .with_n_results(settings.n_results)
            .with_distance_threshold(settings.distance_threshold)
    }

    pub fn with_n_results(mut self, n_results: usize) -> Self {
        self.n_results = n_results;
        self
    }

    /// Hits at or beyond this squared distance are discarded
    pub fn with_distance_threshold(mut self, threshold: Option<f32>) -> Self {
        self.distance_threshold = threshold;
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Hits for `query` that pass the category filter and the threshold
    pub async fn retrieve(
        &self,
        query: &str,
        category: Option<&str>,
    ) -> Result<Vec<QueryHit>, RagError> {
        let filter = category.map(|c| MetadataFilter::eq("category", c));
        let hits = self
            .store
            .query(query, self.n_results, filter.as_ref())
            .await?;

        let found = hits.len();
        let kept: Vec<QueryHit> = match self.distance_threshold {
            Some(threshold) => hits.into_iter().filter(|h| h.distance < threshold).collect(),
            None => hits,
        };
        debug!(found, kept = kept.len(), "Retrieval finished");
        Ok(kept)
    }

    /// Answer `query` from retrieved material
    pub async fn answer(&self, query: &str, category: Option<&str>) -> Result<RagAnswer, RagError> {
        let sources = self.retrieve(query, category).await?;

        if sources.is_empty() && category.is_some() {
            info!(category = ?category, "No material found for category");
            return Ok(RagAnswer {
                answer: NO_MATERIAL_ANSWER.to_string(),
                sources,
            });
        }

        let context = if sources.is_empty() {
            EMPTY_CONTEXT.to_string()
        } else {
            sources
                .iter()
                .map(|h| h.document.as_str())
                .collect::<Vec<_>>()
                .join("\n")
        };
        let prompt = build_prompt(&context, query, category);

        let request = GenerateContentRequest::from_text(prompt)
            .with_system_instruction(self.system_instruction.clone())
            .with_temperature(ANSWER_TEMPERATURE);
        let response = self.model.generate(&request).await?;
        let answer = response.text().ok_or_else(|| ProviderError::EmptyResponse {
            reason: "answer carried no text".to_string(),
        })?;

        info!(sources = sources.len(), "Answer generated");
        Ok(RagAnswer { answer, sources })
    }
}

fn build_prompt(context: &str, query: &str, category: Option<&str>) -> String {
    let heading = match category {
        Some(category) => format!("【参考资料 ({}类)】", category),
        None => "【参考资料】".to_string(),
    };
    format!("{}\n{}\n\n【用户问题】\n{}", heading, context, query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ScriptedEmbedder, ScriptedModel};
    use crate::rag::Metadata;
    use serde_json::json;

    async fn store() -> Arc<VectorStore> {
        let embedder = ScriptedEmbedder::new()
            .with_vector("胖墩墩早上吃了鸡胸肉", vec![1.0, 0.0])
            .with_vector("Rust 的所有权规则", vec![0.0, 1.0])
            .with_vector("胖墩墩吃了什么", vec![0.9, 0.1])
            .with_fallback(vec![10.0, 10.0]);
        let mut store = VectorStore::new("categorized_memory", Arc::new(embedder));

        let meta = |c: &str| -> Metadata {
            let mut m = Metadata::new();
            m.insert("category".to_string(), json!(c));
            m
        };
        store
            .upsert(
                vec!["diary_a_0".into(), "tech_b_0".into()],
                vec!["胖墩墩早上吃了鸡胸肉".into(), "Rust 的所有权规则".into()],
                vec![meta("diary"), meta("tech")],
            )
            .await
            .unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_answer_uses_category_context() {
        let model = Arc::new(ScriptedModel::from_texts(["鸡胸肉"]));
        let pipeline = RagPipeline::new(store().await, model.clone());

        let reply = pipeline.answer("胖墩墩吃了什么", Some("diary")).await.unwrap();
        assert_eq!(reply.answer, "鸡胸肉");
        assert_eq!(reply.sources.len(), 1);
        assert_eq!(reply.sources[0].id, "diary_a_0");

        let requests = model.requests();
        let sent = serde_json::to_string(&requests[0]).unwrap();
        assert!(sent.contains("【参考资料 (diary类)】"));
        assert!(sent.contains("胖墩墩早上吃了鸡胸肉"));
        assert!(!sent.contains("所有权"));
    }

    #[tokio::test]
    async fn test_threshold_empty_category_skips_model() {
        let model = Arc::new(ScriptedModel::new());
        let pipeline = RagPipeline::new(store().await, model.clone())
            .with_distance_threshold(Some(0.001));

        let reply = pipeline.answer("完全无关的问题", Some("tech")).await.unwrap();
        assert_eq!(reply.answer, NO_MATERIAL_ANSWER);
        assert!(reply.sources.is_empty());
        assert!(model.requests().is_empty());
    }

    #[tokio::test]
    async fn test_no_category_falls_back_to_empty_context() {
        let model = Arc::new(ScriptedModel::from_texts(["不知道"]));
        let pipeline = RagPipeline::new(store().await, model.clone())
            .with_distance_threshold(Some(0.001));

        let reply = pipeline.answer("完全无关的问题", None).await.unwrap();
        assert_eq!(reply.answer, "不知道");
        let sent = serde_json::to_string(&model.requests()[0]).unwrap();
        assert!(sent.contains("【参考资料】\\n无"));
    }
}
