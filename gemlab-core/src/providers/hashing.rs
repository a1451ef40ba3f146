//! Offline embedder based on character n-gram feature hashing
//!
//! Vectors are deterministic across runs and platforms, which lets a
//! persisted vector store be reopened and queried without network access.
//! Similar strings share n-grams and therefore land close to each other,
//! which is enough for keyword-flavoured retrieval over small corpora.

use super::error::ProviderResult;
use super::Embedder;
use async_trait::async_trait;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Deterministic, L2-normalised hashing embedder
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    name: String,
    dimensions: usize,
    max_ngram: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

impl HashingEmbedder {
    /// Embedder producing vectors of `dimensions` values (at least 1)
    pub fn new(dimensions: usize) -> Self {
        let dimensions = dimensions.max(1);
        Self {
            name: format!("hashing-{}", dimensions),
            dimensions,
            max_ngram: 2,
        }
    }

    /// Use n-grams up to length `n` (at least 1)
    pub fn with_max_ngram(mut self, n: usize) -> Self {
        self.max_ngram = n.max(1);
        self
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Embed synchronously
    pub fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let chars: Vec<char> = text
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();

        for n in 1..=self.max_ngram {
            if chars.len() < n {
                break;
            }
            for window in chars.windows(n) {
                let hash = fnv1a(window);
                let bucket = (hash % self.dimensions as u64) as usize;
                // The top bit picks the sign so collisions cancel instead of pile up
                let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
                vector[bucket] += sign;
            }
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

fn fnv1a(chars: &[char]) -> u64 {
    let mut hash = FNV_OFFSET;
    let mut buf = [0u8; 4];
    for c in chars {
        for byte in c.encode_utf8(&mut buf).as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        // Separator keeps ("ab","c") and ("a","bc") apart
        hash ^= 0xff;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>> {
        Ok(self.vectorize(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> ProviderResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::cosine_similarity;

    #[test]
    fn test_deterministic_and_normalised() {
        let embedder = HashingEmbedder::new(64);
        let a = embedder.vectorize("胖墩墩今天去公园玩飞盘");
        let b = embedder.vectorize("胖墩墩今天去公园玩飞盘");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let v = HashingEmbedder::new(16).vectorize("   ");
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_overlapping_text_scores_higher() {
        let embedder = HashingEmbedder::default();
        let query = embedder.vectorize("胖墩墩喜欢吃什么");
        let related = embedder.vectorize("胖墩墩最喜欢吃鸡胸肉");
        let unrelated = embedder.vectorize("Python 编程语言的装饰器");

        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }
}
