//! Embedding fan-out and vector math

use crate::providers::Embedder;
use futures::future::join_all;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{error, info};

/// Number of leading values kept as a debugging fingerprint
pub const FINGERPRINT_LEN: usize = 5;

/// A text bound to its vector
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextVector {
    pub text: String,
    /// Empty when embedding failed
    pub vector: Vec<f32>,
    pub fingerprint: Vec<f32>,
}

impl TextVector {
    pub fn new(text: impl Into<String>, vector: Vec<f32>) -> Self {
        let fingerprint = vector.iter().take(FINGERPRINT_LEN).copied().collect();
        Self {
            text: text.into(),
            vector,
            fingerprint,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vector.is_empty()
    }
}

/// Concurrent embedding of text batches
#[derive(Clone)]
pub struct EmbeddingService {
    embedder: Arc<dyn Embedder>,
}

impl std::fmt::Debug for EmbeddingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingService")
            .field("embedder", &self.embedder.name())
            .finish()
    }
}

impl EmbeddingService {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    async fn fetch_single(&self, text: String) -> TextVector {
        info!(text = %text, "Sending embedding request");
        match self.embedder.embed(&text).await {
            Ok(vector) => {
                let tv = TextVector::new(text, vector);
                info!(text = %tv.text, fingerprint = ?tv.fingerprint, "Embedding received");
                tv
            }
            Err(e) => {
                error!(text = %text, error = %e, "Embedding failed");
                TextVector::new(text, Vec::new())
            }
        }
    }

    /// Embed every distinct text concurrently, keyed by text
    ///
    /// Failures are logged and show up as empty vectors.
    pub async fn fetch_batch<S: AsRef<str>>(&self, texts: &[S]) -> HashMap<String, TextVector> {
        let mut seen = HashSet::new();
        let unique: Vec<String> = texts
            .iter()
            .map(|t| t.as_ref().to_string())
            .filter(|t| seen.insert(t.clone()))
            .collect();

        info!(count = unique.len(), "Embedding batch concurrently");
        let results = join_all(unique.into_iter().map(|t| self.fetch_single(t))).await;

        results.into_iter().map(|tv| (tv.text.clone(), tv)).collect()
    }
}

/// Cosine similarity; 0.0 for empty, mismatched or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Squared Euclidean distance; `f32::INFINITY` for mismatched lengths
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// How a compared text relates to the base
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FingerprintStatus {
    /// The base text itself
    SelfMatch,
    Normal,
    /// Different text, identical fingerprint
    Collision,
    /// No vector came back
    Missing,
}

impl FingerprintStatus {
    pub fn label(&self) -> &'static str {
        match self {
            FingerprintStatus::SelfMatch => "自身(正常)",
            FingerprintStatus::Normal => "正常",
            FingerprintStatus::Collision => "指纹完全重合(异常)",
            FingerprintStatus::Missing => "无向量",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityRow {
    pub text: String,
    pub score: f32,
    pub status: FingerprintStatus,
}

/// Compare `others` against `base` using vectors from [`EmbeddingService::fetch_batch`]
pub fn similarity_report(
    vectors: &HashMap<String, TextVector>,
    base: &str,
    others: &[String],
) -> Vec<SimilarityRow> {
    let base_vector = vectors.get(base);

    others
        .iter()
        .map(|text| {
            let target = vectors.get(text);
            let (score, status) = match (base_vector, target) {
                (Some(b), Some(t)) if !b.is_empty() && !t.is_empty() => {
                    let status = if text == base {
                        FingerprintStatus::SelfMatch
                    } else if b.fingerprint == t.fingerprint {
                        FingerprintStatus::Collision
                    } else {
                        FingerprintStatus::Normal
                    };
                    (cosine_similarity(&b.vector, &t.vector), status)
                }
                _ => (0.0, FingerprintStatus::Missing),
            };
            SimilarityRow {
                text: text.clone(),
                score,
                status,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ScriptedEmbedder;

    #[test]
    fn test_cosine_edge_cases() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn test_squared_l2() {
        assert_eq!(squared_l2(&[0.0, 0.0], &[3.0, 4.0]), 25.0);
        assert_eq!(squared_l2(&[1.0], &[1.0, 2.0]), f32::INFINITY);
    }

    #[tokio::test]
    async fn test_fetch_batch_dedupes_and_tolerates_failure() {
        let embedder = ScriptedEmbedder::new()
            .with_vector("胖墩墩", vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.3])
            .with_vector("一只可爱的小狗", vec![0.9, 0.1, 0.0, 0.0, 0.0, 0.0])
            .with_vector("复读机", vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.9])
            .failing_on("今天天气真好");
        let service = EmbeddingService::new(Arc::new(embedder));

        let texts = ["胖墩墩", "胖墩墩", "一只可爱的小狗", "今天天气真好", "复读机"];
        let vectors = service.fetch_batch(&texts).await;
        assert_eq!(vectors.len(), 4);
        assert_eq!(vectors["胖墩墩"].fingerprint.len(), FINGERPRINT_LEN);
        assert!(vectors["今天天气真好"].is_empty());

        let others: Vec<String> = ["胖墩墩", "一只可爱的小狗", "今天天气真好", "复读机"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let report = similarity_report(&vectors, "胖墩墩", &others);
        assert_eq!(report[0].status, FingerprintStatus::SelfMatch);
        assert_eq!(report[1].status, FingerprintStatus::Normal);
        assert_eq!(report[2].status, FingerprintStatus::Missing);
        assert_eq!(report[3].status, FingerprintStatus::Collision);
        assert!(report[1].score > 0.5);
    }
}
