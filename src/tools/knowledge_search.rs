//! Guidance lookup against the knowledge store

use super::{require_text, text_schema, Tool};
use crate::knowledge::KnowledgeStore;
use crate::models::ToolInput;
use crate::Result;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

pub const NOT_FOUND_SENTINEL: &str = "Maaf, informasi tidak ditemukan di basis pengetahuan.";

pub struct KnowledgeSearchTool {
    store: Arc<KnowledgeStore>,
}

impl KnowledgeSearchTool {
    pub fn new(store: Arc<KnowledgeStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for KnowledgeSearchTool {
    fn name(&self) -> &'static str {
        "cari_pengetahuan"
    }

    fn description(&self) -> &'static str {
        "Cari panduan UMKM (perizinan, pendanaan seperti KUR, pemasaran, keuangan) di basis pengetahuan"
    }

    fn input_schema(&self) -> Value {
        text_schema("query", "Pertanyaan atau kata kunci yang dicari")
    }

    async fn execute(&self, input: &ToolInput) -> Result<String> {
        let query = require_text(input, &["query", "text"])?;
        let results = self.store.query(&query, 1).await?;

        match results.into_iter().next() {
            Some((entry, score)) => {
                debug!(entry_id = %entry.id, score, "Knowledge match");
                Ok(entry.text)
            }
            None => Ok(NOT_FOUND_SENTINEL.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdvisorError;
    use crate::knowledge::{seed, HashedEmbedder};
    use serde_json::json;

    async fn tool() -> KnowledgeSearchTool {
        let store = KnowledgeStore::new(Box::new(HashedEmbedder::default()));
        store.add(seed::seed_documents()).await.unwrap();
        KnowledgeSearchTool::new(Arc::new(store))
    }

    fn input(query: &str) -> ToolInput {
        ToolInput {
            tool_name: "cari_pengetahuan".to_string(),
            parameters: json!({ "query": query }),
        }
    }

    #[tokio::test]
    async fn test_returns_best_passage() {
        let out = tool().await.execute(&input("Cara daftar KUR yang mudah")).await.unwrap();
        assert_eq!(out, "Cara mengajukan KUR (Kredit Usaha Rakyat)");
    }

    #[tokio::test]
    async fn test_no_match_returns_sentinel() {
        let out = tool().await.execute(&input("zebra astronot")).await.unwrap();
        assert_eq!(out, NOT_FOUND_SENTINEL);
    }

    #[tokio::test]
    async fn test_empty_store_is_an_error() {
        let store = KnowledgeStore::new(Box::new(HashedEmbedder::default()));
        let err = KnowledgeSearchTool::new(Arc::new(store))
            .execute(&input("KUR"))
            .await
            .unwrap_err();
        assert!(matches!(err, AdvisorError::EmptyIndex(_)));
    }
}
