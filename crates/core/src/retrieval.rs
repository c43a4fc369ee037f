//! Retrieval collaborator — injects indexed document snippets into context.
//!
//! Indexing and embedding live outside this engine. The orchestrator only
//! asks a retriever for snippets relevant to the user's query and rides them
//! in the system turn.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A snippet pulled from an external index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Where the snippet came from (path, URL, document id)
    pub source: String,

    /// The snippet text
    pub text: String,

    /// Relevance score, higher is better
    pub score: f32,
}

/// Supplies context snippets for a query. Infallible by contract:
/// implementations degrade to an empty result on error.
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    async fn retrieve(&self, query: &str, limit: usize) -> Vec<RetrievedChunk>;
}

/// The default retriever: returns nothing.
pub struct NoRetrieval;

#[async_trait]
impl ContextRetriever for NoRetrieval {
    async fn retrieve(&self, _query: &str, _limit: usize) -> Vec<RetrievedChunk> {
        Vec::new()
    }
}

/// A fixed in-memory retriever with naive keyword matching. Useful in tests
/// and demos where no real index exists.
pub struct StaticRetriever {
    chunks: Vec<RetrievedChunk>,
}

impl StaticRetriever {
    pub fn new(chunks: Vec<RetrievedChunk>) -> Self {
        Self { chunks }
    }
}

#[async_trait]
impl ContextRetriever for StaticRetriever {
    async fn retrieve(&self, query: &str, limit: usize) -> Vec<RetrievedChunk> {
        let query_lower = query.to_lowercase();
        let words: Vec<&str> = query_lower.split_whitespace().collect();

        let mut hits: Vec<RetrievedChunk> = self
            .chunks
            .iter()
            .filter(|c| {
                let text = c.text.to_lowercase();
                words.iter().any(|w| text.contains(w))
            })
            .cloned()
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(source: &str, text: &str, score: f32) -> RetrievedChunk {
        RetrievedChunk {
            source: source.into(),
            text: text.into(),
            score,
        }
    }

    #[tokio::test]
    async fn no_retrieval_is_empty() {
        let retriever = NoRetrieval;
        assert!(retriever.retrieve("anything", 5).await.is_empty());
    }

    #[tokio::test]
    async fn static_retriever_matches_keywords() {
        let retriever = StaticRetriever::new(vec![
            chunk("a.md", "Rust borrow checker notes", 0.9),
            chunk("b.md", "Gardening tips for spring", 0.8),
        ]);

        let hits = retriever.retrieve("borrow semantics", 5).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source, "a.md");
    }

    #[tokio::test]
    async fn static_retriever_respects_limit_and_order() {
        let retriever = StaticRetriever::new(vec![
            chunk("low.md", "tokio runtime", 0.2),
            chunk("high.md", "tokio channels", 0.9),
            chunk("mid.md", "tokio tasks", 0.5),
        ]);

        let hits = retriever.retrieve("tokio", 2).await;
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].source, "high.md");
        assert_eq!(hits[1].source, "mid.md");
    }
}
