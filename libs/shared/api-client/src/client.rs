use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Error, Debug)]
pub enum ApiClientError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Authentication error ({status}): {body}")]
    Unauthorized { status: u16, body: String },

    #[error("API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// JSON client for one backend record-keeping service.
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        }
    }

    fn get_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = &self.token {
            match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => error!("Service token contains invalid header characters, sending unauthenticated"),
            }
        }

        headers
    }

    async fn send<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<String, ApiClientError>
    where
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut req = self.client.request(method, &url).headers(self.get_headers());

        if let Some(body_data) = body {
            req = req.json(body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            if status != StatusCode::NOT_FOUND {
                error!("API error ({}): {}", status, text);
            }

            return Err(match status.as_u16() {
                404 => ApiClientError::NotFound(path.to_string()),
                401 | 403 => ApiClientError::Unauthorized { status: status.as_u16(), body: text },
                code => ApiClientError::Status { status: code, body: text },
            });
        }

        Ok(text)
    }

    pub async fn request<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ApiClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let text = self.send(method, path, body).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Like [`ApiClient::request`] but a 404 becomes `Ok(None)`.
    pub async fn request_optional<T>(&self, path: &str) -> Result<Option<T>, ApiClientError>
    where
        T: DeserializeOwned,
    {
        match self.request::<T, ()>(Method::GET, path, None).await {
            Ok(data) => Ok(Some(data)),
            Err(ApiClientError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// For calls whose success response carries no body worth reading.
    pub async fn execute<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<(), ApiClientError>
    where
        B: Serialize + ?Sized,
    {
        self.send(method, path, body).await.map(|_| ())
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}
