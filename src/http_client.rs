use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Error payload shapes returned by the auth and storage APIs.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    error_code: Option<String>,
    code: Option<serde_json::Value>,
    msg: Option<String>,
    message: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl ApiErrorBody {
    fn code(&self) -> Option<String> {
        self.error_code
            .clone()
            .or_else(|| match &self.code {
                Some(serde_json::Value::String(s)) => Some(s.clone()),
                _ => None,
            })
            .or_else(|| self.error.clone())
    }

    fn message(&self) -> String {
        self.msg
            .clone()
            .or_else(|| self.message.clone())
            .or_else(|| self.error_description.clone())
            .or_else(|| self.error.clone())
            .unwrap_or_default()
    }
}

/// Thin reqwest wrapper carrying the project API key on every call.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    api_key: String,
}

impl HttpClient {
    pub fn new(api_key: impl Into<String>) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
        })
    }

    /// Attaches the API key and a bearer token (the user's, or the API key itself).
    fn authorized(&self, builder: RequestBuilder, bearer: Option<&str>) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(bearer.unwrap_or(&self.api_key))
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
        bearer: Option<&str>,
    ) -> AppResult<T> {
        let response = self
            .authorized(self.client.post(url), bearer)
            .json(body)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// POST whose response body is ignored.
    pub async fn post_json_no_content<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
        bearer: Option<&str>,
    ) -> AppResult<()> {
        let response = self
            .authorized(self.client.post(url), bearer)
            .json(body)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    pub async fn put_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
        bearer: Option<&str>,
    ) -> AppResult<T> {
        let response = self
            .authorized(self.client.put(url), bearer)
            .json(body)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn post_bytes(
        &self,
        url: &str,
        data: Vec<u8>,
        content_type: &str,
        bearer: Option<&str>,
    ) -> AppResult<()> {
        let response = self
            .authorized(self.client.post(url), bearer)
            .header("content-type", content_type)
            .body(data)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    pub async fn delete(&self, url: &str, bearer: Option<&str>) -> AppResult<()> {
        let response = self
            .authorized(self.client.delete(url), bearer)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

/// Turns a non-2xx response into `AppError::Api` with the decoded code/message.
async fn check(response: Response) -> AppResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let body: ApiErrorBody = serde_json::from_str(&text).unwrap_or_default();
    let message = match body.message() {
        m if m.is_empty() => text,
        m => m,
    };
    tracing::warn!("API call failed: status={}, message={}", status, message);
    Err(AppError::Api {
        status: status.as_u16(),
        code: body.code(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_new_format() {
        let body: ApiErrorBody = serde_json::from_str(
            r#"{"code":400,"error_code":"invalid_credentials","msg":"Invalid login credentials"}"#,
        )
        .unwrap();
        assert_eq!(body.code().as_deref(), Some("invalid_credentials"));
        assert_eq!(body.message(), "Invalid login credentials");
    }

    #[test]
    fn test_error_body_oauth_format() {
        let body: ApiErrorBody = serde_json::from_str(
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        )
        .unwrap();
        assert_eq!(body.code().as_deref(), Some("invalid_grant"));
        assert_eq!(body.message(), "Invalid login credentials");
    }

    #[test]
    fn test_error_body_storage_format() {
        let body: ApiErrorBody = serde_json::from_str(
            r#"{"statusCode":"409","error":"Duplicate","message":"The resource already exists"}"#,
        )
        .unwrap();
        assert_eq!(body.code().as_deref(), Some("Duplicate"));
        assert_eq!(body.message(), "The resource already exists");
    }
}
