// Object storage abstraction (evidence photos)

pub mod supabase;

pub use supabase::SupabaseStorage;

use async_trait::async_trait;

use crate::error::AppResult;

#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Uploads `data` under `key`. Returns the stored object path.
    async fn upload(&self, key: &str, data: Vec<u8>, content_type: &str) -> AppResult<String>;

    /// Publicly reachable URL of an object.
    fn public_url(&self, key: &str) -> String;

    async fn delete(&self, key: &str) -> AppResult<()>;

    fn bucket(&self) -> &str;
}

/// Content type from a file extension, `application/octet-stream` when unknown.
pub fn content_type_for(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("JPG"), "image/jpeg");
        assert_eq!(content_type_for("png"), "image/png");
        assert_eq!(content_type_for("xyz"), "application/octet-stream");
    }
}
