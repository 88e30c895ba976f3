//! In-process fakes for unit tests.

use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::link::FolderId;
use crate::models::Document;
use crate::source::DocumentSource;

pub(crate) use crate::llm::testing::ScriptedModel;

/// Returns the same single text document for any folder.
pub struct StaticSource(pub &'static str);

#[async_trait]
impl DocumentSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn load(&self, _folder: &FolderId) -> anyhow::Result<Vec<Document>> {
        Ok(vec![Document {
            name: "doc.txt".to_string(),
            uri: None,
            content_type: "text/plain".to_string(),
            updated_at: None,
            text: self.0.to_string(),
        }])
    }
}

/// Maps every text to the same vector.
pub struct FlatEmbedder;

#[async_trait]
impl EmbeddingProvider for FlatEmbedder {
    fn model_name(&self) -> &str {
        "flat"
    }

    fn dims(&self) -> usize {
        2
    }

    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
    }
}
