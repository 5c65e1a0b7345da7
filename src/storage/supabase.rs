use async_trait::async_trait;

use crate::error::AppResult;
use crate::http_client::HttpClient;

use super::StorageBackend;

/// Bucket on the backend's object storage API.
pub struct SupabaseStorage {
    http: HttpClient,
    storage_url: String,
    bucket_name: String,
    access_token: Option<String>,
}

impl SupabaseStorage {
    pub fn new(http: HttpClient, storage_url: impl Into<String>, bucket_name: impl Into<String>) -> Self {
        Self {
            http,
            storage_url: storage_url.into(),
            bucket_name: bucket_name.into(),
            access_token: None,
        }
    }

    /// Uploads run as the signed-in user so bucket policies apply.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/object/{}/{}", self.storage_url, self.bucket_name, encode_key(key))
    }
}

/// Percent-encodes each path segment, keeping the separators.
fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl StorageBackend for SupabaseStorage {
    async fn upload(&self, key: &str, data: Vec<u8>, content_type: &str) -> AppResult<String> {
        let size = data.len();
        self.http
            .post_bytes(&self.object_url(key), data, content_type, self.access_token.as_deref())
            .await?;
        tracing::info!("Storage upload: bucket={}, key={}, size={}", self.bucket_name, key, size);
        Ok(format!("{}/{}", self.bucket_name, key))
    }

    fn public_url(&self, key: &str) -> String {
        format!(
            "{}/object/public/{}/{}",
            self.storage_url,
            self.bucket_name,
            encode_key(key)
        )
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.http
            .delete(&self.object_url(key), self.access_token.as_deref())
            .await?;
        tracing::info!("Storage delete: bucket={}, key={}", self.bucket_name, key);
        Ok(())
    }

    fn bucket(&self) -> &str {
        &self.bucket_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> SupabaseStorage {
        let http = HttpClient::new("anon").unwrap();
        SupabaseStorage::new(http, "https://project.supabase.co/storage/v1", "imagenes-repuestos-garantias")
    }

    #[test]
    fn test_public_url() {
        assert_eq!(
            storage().public_url("warranty-evidence/abc-1700000000000.jpg"),
            "https://project.supabase.co/storage/v1/object/public/imagenes-repuestos-garantias/warranty-evidence/abc-1700000000000.jpg"
        );
    }

    #[test]
    fn test_object_url_encodes_segments() {
        assert_eq!(
            storage().object_url("warranty-evidence/foto 1.png"),
            "https://project.supabase.co/storage/v1/object/imagenes-repuestos-garantias/warranty-evidence/foto%201.png"
        );
        assert_eq!(storage().bucket(), "imagenes-repuestos-garantias");
    }
}
