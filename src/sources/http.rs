use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::auth::handler::TokenHandler;
use crate::config::handler::{GenericSourceValue, HandlerConfig};
use crate::error::HandlerError;
use crate::utils::constants::DEFAULT_HTTP_TIMEOUT_MS;

/// Mints tokens by calling an HTTP issuer endpoint described by [`HandlerConfig`].
#[derive(Debug, Clone)]
pub struct HttpTokenHandler {
    cfg: HandlerConfig,
    client: Client,
}

impl HttpTokenHandler {
    pub fn new(cfg: HandlerConfig) -> Result<Self> {
        let timeout = Duration::from_millis(cfg.timeout_ms.unwrap_or(DEFAULT_HTTP_TIMEOUT_MS));
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;
        Ok(Self { cfg, client })
    }

    async fn fetch_token(&self) -> Result<String> {
        let mut request = self.client.request(self.cfg.method.clone(), &self.cfg.url);

        // Build headers dynamically
        if let Some(headers) = &self.cfg.headers {
            for (key, v) in headers {
                let value = prepare_generic_source_value(v)
                    .await
                    .with_context(|| format!("resolving header '{}'", key))?;
                request = request.header(key, value);
            }
        }
        // Build body dynamically
        if let Some(source_body) = &self.cfg.body {
            let mut body = HashMap::new();
            for (k, v) in source_body {
                let value = prepare_generic_source_value(v)
                    .await
                    .with_context(|| format!("resolving body field '{}'", k))?;
                body.insert(k.to_owned(), value);
            }
            request = request.json(&body);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("HTTP request failed: {}", response.status()));
        }
        let body = response.text().await?;
        debug!(bytes = body.len(), "token issuer responded");

        extract_token(&body, self.cfg.token_pointer.as_deref())
    }
}

#[async_trait]
impl TokenHandler for HttpTokenHandler {
    async fn request_token(&self) -> Result<String, HandlerError> {
        self.fetch_token().await.map_err(Into::into)
    }
}

/// Pull the token out of a response body: a JSON pointer lookup, or the trimmed body itself.
pub fn extract_token(body: &str, token_pointer: Option<&str>) -> Result<String> {
    match token_pointer {
        None => Ok(body.trim().to_owned()),
        Some(pointer) => {
            let json: Value = serde_json::from_str(body)
                .map_err(|e| anyhow!("response body is not valid JSON: {}", e))?;
            json.pointer(pointer)
                .ok_or_else(|| anyhow!("field '{}' not found in response", pointer))?
                .as_str()
                .map(str::to_owned)
                .ok_or_else(|| anyhow!("field '{}' is not a string", pointer))
        }
    }
}

async fn prepare_generic_source_value(value: &GenericSourceValue) -> Result<String> {
    match value {
        GenericSourceValue::Literal { value } => Ok(value.to_owned()),
        GenericSourceValue::FromEnv { from_env } => std::env::var(from_env)
            .map_err(|err| anyhow!("env var '{}': {}", from_env, err)),
        GenericSourceValue::FromFile { path } => tokio::fs::read_to_string(path)
            .await
            .map(|res| res.trim().to_string())
            .map_err(|err| anyhow!("file '{}': {}", path, err)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use httpmock::prelude::*;
    use serde_json::json;

    use super::{extract_token, HttpTokenHandler};
    use crate::auth::handler::TokenHandler;
    use crate::config::handler::{GenericSourceValue, HandlerConfig};

    fn handler_config(url: String, token_pointer: Option<&str>) -> HandlerConfig {
        HandlerConfig {
            url,
            method: http::Method::POST,
            headers: None,
            body: None,
            token_pointer: token_pointer.map(str::to_owned),
            timeout_ms: Some(2000),
        }
    }

    #[test]
    fn extracts_plain_and_pointer_tokens() {
        assert_eq!(extract_token("  raw.jwt.token\n", None).unwrap(), "raw.jwt.token");
        assert_eq!(
            extract_token(r#"{"data":{"token":"a.b.c"}}"#, Some("/data/token")).unwrap(),
            "a.b.c"
        );
        assert!(extract_token(r#"{"data":{}}"#, Some("/data/token")).is_err());
        assert!(extract_token(r#"{"token":42}"#, Some("/token")).is_err());
        assert!(extract_token("not json", Some("/token")).is_err());
    }

    #[tokio::test]
    async fn sends_resolved_headers_and_body() {
        let server = MockServer::start_async().await;
        std::env::set_var("AUTH_REFRESHER_TEST_CLIENT_ID", "client-42");
        let mut secret = tempfile::NamedTempFile::new().unwrap();
        writeln!(secret, "s3cret").unwrap();

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/token")
                    .header("x-api-key", "literal-key")
                    .header("x-secret", "s3cret")
                    .json_body(json!({ "client_id": "client-42" }));
                then.status(200).json_body(json!({ "access_token": "h.p.s" }));
            })
            .await;

        let mut cfg = handler_config(server.url("/token"), Some("/access_token"));
        cfg.headers = Some(HashMap::from([
            ("x-api-key".to_owned(), GenericSourceValue::Literal { value: "literal-key".into() }),
            (
                "x-secret".to_owned(),
                GenericSourceValue::FromFile { path: secret.path().display().to_string() },
            ),
        ]));
        cfg.body = Some(HashMap::from([(
            "client_id".to_owned(),
            GenericSourceValue::FromEnv { from_env: "AUTH_REFRESHER_TEST_CLIENT_ID".into() },
        )]));

        let handler = HttpTokenHandler::new(cfg).unwrap();
        assert_eq!(handler.request_token().await.unwrap(), "h.p.s");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(503).body("unavailable");
            })
            .await;

        let handler = HttpTokenHandler::new(handler_config(server.url("/token"), None)).unwrap();
        let err = handler.request_token().await.unwrap_err();
        assert!(err.to_string().contains("503"), "{}", err);
    }

    #[tokio::test]
    async fn missing_env_var_fails_before_sending() {
        let mut cfg = handler_config("http://127.0.0.1:9/token".to_owned(), None);
        cfg.headers = Some(HashMap::from([(
            "authorization".to_owned(),
            GenericSourceValue::FromEnv { from_env: "AUTH_REFRESHER_TEST_DEFINITELY_UNSET".into() },
        )]));

        let handler = HttpTokenHandler::new(cfg).unwrap();
        let err = handler.request_token().await.unwrap_err();
        assert!(err.to_string().contains("resolving header 'authorization'"), "{}", err);
    }
}
