use async_trait::async_trait;
use std::collections::HashMap;
use yojana_core::{YojanaError, YojanaResult};

/// Trait for computing text embeddings (vector representations).
///
/// Implementations must be deterministic: the same text always maps to the
/// same vector, and every vector has [`EmbeddingProvider::dimension`] entries.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Compute embedding vector for a single text.
    async fn embed(&self, text: &str) -> YojanaResult<Vec<f32>>;

    /// Compute embeddings for a batch of texts, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> YojanaResult<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Dimension of the embedding vectors produced by this provider.
    fn dimension(&self) -> usize;

    /// Short provider name for logs.
    fn name(&self) -> &str;

    /// Identifies the vector space this provider embeds into. Vectors from
    /// providers with different fingerprints are not comparable.
    fn fingerprint(&self) -> String {
        format!("{}/{}", self.name(), self.dimension())
    }
}

/// Words that carry no topical signal in scheme questions.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "can", "do", "does", "did", "for",
    "from", "has", "have", "how", "i", "if", "in", "is", "it", "its", "me", "my", "of", "on",
    "or", "our", "please", "should", "so", "tell", "than", "that", "the", "their", "them",
    "there", "these", "they", "this", "those", "to", "us", "was", "we", "were", "what", "when",
    "where", "which", "who", "why", "will", "with", "would", "you", "your", "about", "any",
    "some",
];

/// Local hashed bag-of-words embedding (no external API needed).
///
/// Each non-stop-word is hashed to three positions of a fixed-size vector
/// and weighted by its term frequency; the result is L2-normalised. Texts
/// that share vocabulary end up close in cosine distance, which is enough
/// for keyword-heavy scheme descriptions and for tests. Use
/// `HttpEmbedding` with a sentence-transformer server in production.
pub struct LocalEmbedding {
    dimension: usize,
}

impl LocalEmbedding {
    /// Creates an embedder producing vectors of `dimension` entries.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn tokens(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 1 && !STOP_WORDS.contains(w))
            .map(str::to_string)
            .collect()
    }
}

impl Default for LocalEmbedding {
    /// 384 dimensions, the width of the MiniLM sentence embeddings.
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedding {
    async fn embed(&self, text: &str) -> YojanaResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(YojanaError::Embedding("Cannot embed empty text".to_string()));
        }

        let mut vector = vec![0.0f32; self.dimension];
        let words = Self::tokens(text);
        if words.is_empty() {
            return Ok(vector);
        }

        let mut freq: HashMap<&str, f32> = HashMap::new();
        for word in &words {
            *freq.entry(word.as_str()).or_insert(0.0) += 1.0;
        }

        let total = words.len() as f32;
        for (word, count) in &freq {
            let tf = count / total;
            let bytes = word.as_bytes();
            let h1 = fnv1a(bytes) as usize;
            let h2 = fnv1a(&[bytes, &[1u8]].concat()) as usize;
            let h3 = fnv1a(&[bytes, &[2u8]].concat()) as usize;

            vector[h1 % self.dimension] += tf;
            vector[h2 % self.dimension] += tf * 0.7;
            vector[h3 % self.dimension] += tf * 0.5;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "local-bow"
    }
}

/// FNV-1a, 32-bit.
fn fnv1a(data: &[u8]) -> u32 {
    let mut hash: u32 = 2166136261;
    for &byte in data {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}

/// Cosine distance (`1 - cosine similarity`), in `[0, 2]`.
///
/// Mismatched lengths and zero vectors are maximally uninformative and
/// yield `1.0`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 1.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        1.0
    } else {
        1.0 - dot / (na * nb)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_embedding_dimension() {
        let emb = LocalEmbedding::new(128);
        assert_eq!(emb.dimension(), 128);
        let vec = emb.embed("pension for widows").await.unwrap();
        assert_eq!(vec.len(), 128);
    }

    #[tokio::test]
    async fn test_local_embedding_normalized() {
        let emb = LocalEmbedding::default();
        let vec = emb
            .embed("free bicycles for girl students in government schools")
            .await
            .unwrap();
        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_shared_vocabulary_is_closer() {
        let emb = LocalEmbedding::default();
        let scheme = emb
            .embed("Scholarship for disabled students studying in colleges")
            .await
            .unwrap();
        let related = emb.embed("scholarship disabled students").await.unwrap();
        let unrelated = emb.embed("crop insurance for paddy farmers").await.unwrap();

        let d_related = cosine_distance(&scheme, &related);
        let d_unrelated = cosine_distance(&scheme, &unrelated);
        assert!(
            d_related < d_unrelated,
            "related={d_related} should be < unrelated={d_unrelated}"
        );
    }

    #[tokio::test]
    async fn test_stop_words_only_gives_zero_vector() {
        let emb = LocalEmbedding::default();
        let vec = emb.embed("what is the").await.unwrap();
        assert!(vec.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn test_local_embedding_empty() {
        let emb = LocalEmbedding::default();
        assert!(emb.embed("").await.is_err());
        assert!(emb.embed("   ").await.is_err());
    }

    #[tokio::test]
    async fn test_local_embedding_deterministic() {
        let emb = LocalEmbedding::default();
        let v1 = emb.embed("marriage assistance scheme").await.unwrap();
        let v2 = emb.embed("marriage assistance scheme").await.unwrap();
        assert_eq!(v1, v2);
    }

    #[tokio::test]
    async fn test_embed_batch_preserves_order() {
        let emb = LocalEmbedding::default();
        let vecs = emb.embed_batch(&["housing", "pension"]).await.unwrap();
        assert_eq!(vecs.len(), 2);
        assert_eq!(vecs[0], emb.embed("housing").await.unwrap());
        assert_eq!(vecs[1], emb.embed("pension").await.unwrap());
    }

    #[test]
    fn test_fingerprint_tracks_dimension() {
        assert_eq!(LocalEmbedding::new(384).fingerprint(), "local-bow/384");
        assert_ne!(
            LocalEmbedding::new(384).fingerprint(),
            LocalEmbedding::new(256).fingerprint()
        );
    }

    #[test]
    fn test_cosine_distance_bounds() {
        let a = vec![1.0, 0.0];
        assert!(cosine_distance(&a, &a).abs() < 0.001);
        assert!((cosine_distance(&a, &[0.0, 1.0]) - 1.0).abs() < 0.001);
        assert!((cosine_distance(&a, &[-1.0, 0.0]) - 2.0).abs() < 0.001);
        assert!((cosine_distance(&a, &[0.0, 0.0]) - 1.0).abs() < 0.001);
        assert!((cosine_distance(&a, &[1.0]) - 1.0).abs() < 0.001);
    }
}
