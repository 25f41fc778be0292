//! Media resolution seam.
//!
//! Upload handling is an external collaborator: Courier hands it an opaque
//! blob reference and gets back a stable URL to persist alongside the
//! message.

use async_trait::async_trait;

/// Resolves an opaque media blob reference to a stable URL.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Resolve `blob` to a URL, or explain why it cannot be resolved.
    async fn resolve(&self, blob: &str) -> Result<String, String>;
}

/// Resolver that treats the blob reference as already being a stable URL.
///
/// Used when the upstream client uploads out of band and sends the final
/// URL in the message body.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughResolver;

#[async_trait]
impl MediaResolver for PassthroughResolver {
    async fn resolve(&self, blob: &str) -> Result<String, String> {
        if blob.trim().is_empty() {
            return Err("empty media reference".to_string());
        }
        Ok(blob.to_string())
    }
}
