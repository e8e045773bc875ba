use async_trait::async_trait;

use crate::domain::ClassifyError;

/// Generates dense vectors for queries and catalogue documents.
///
/// Providers with asymmetric models embed queries and documents with
/// distinct task orientations; every returned vector has exactly
/// `dimensions()` elements.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// The model identifier actually used, as reported in response provenance.
    fn model_name(&self) -> &str;

    fn dimensions(&self) -> usize;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ClassifyError>;

    async fn embed_document(
        &self,
        text: &str,
        title: Option<&str>,
    ) -> Result<Vec<f32>, ClassifyError>;

    /// Embed many documents, chunking to the provider batch limit internally.
    async fn embed_documents_batch(
        &self,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, ClassifyError>;
}
