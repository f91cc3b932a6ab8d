//! REST client for the remote persistence service.
//!
//! Routes: `GET/POST {base}/api/{tasks|projects|tags}` and
//! `PUT/DELETE {base}/api/{collection}/{id}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;

use crate::config::RemoteConfig;
use crate::error::{Error, Result};
use crate::models::{EntityKind, EntitySnapshot};
use crate::util::compact_text;

use super::{decode_entity, decode_list, RemotePersistence};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct HttpRemote {
    base_url: Url,
    token: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpRemote {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpRemote")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl HttpRemote {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        Self::with_timeout(config, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Client whose requests give up after `timeout`, independently of the
    /// sync engine's own deadlines.
    pub fn with_timeout(config: &RemoteConfig, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|error| Error::Config(format!("invalid API URL: {error}")))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "API URL cannot be used as a base: {}",
                config.base_url
            )));
        }

        Ok(Self {
            base_url,
            token: config.token.clone(),
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    fn url(&self, kind: EntityKind, id: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("api").push(kind.collection());
            if let Some(id) = id {
                segments.push(id);
            }
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self
            .client
            .request(method, url)
            .header("Accept", "application/json");
        match self.token.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(Error::Api {
            status: status.as_u16(),
            message: parse_api_error(status, &body),
        })
    }

    async fn json_body(response: Response) -> Result<Value> {
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|error| {
            Error::MalformedResponse(format!("{error}: {}", compact_text(&text)))
        })
    }
}

#[async_trait]
impl RemotePersistence for HttpRemote {
    async fn list_all(&self, kind: EntityKind, user_id: &str) -> Result<Vec<EntitySnapshot>> {
        let request = self
            .request(Method::GET, self.url(kind, None))
            .query(&[("userId", user_id)]);
        let response = self.send(request).await?;
        decode_list(kind, Self::json_body(response).await?)
    }

    async fn create(&self, entity: &EntitySnapshot) -> Result<EntitySnapshot> {
        let kind = entity.kind();
        let request = self
            .request(Method::POST, self.url(kind, None))
            .json(&entity.to_json()?);
        let response = self.send(request).await?;
        match Self::json_body(response).await? {
            // Some deployments answer 201/204 without echoing the entity.
            Value::Null => Ok(entity.clone()),
            body => decode_entity(kind, body),
        }
    }

    async fn update(&self, kind: EntityKind, id: &str, fields: &Value) -> Result<()> {
        let request = self
            .request(Method::PUT, self.url(kind, Some(id)))
            .json(fields);
        self.send(request).await?;
        Ok(())
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<()> {
        let request = self.request(Method::DELETE, self.url(kind, Some(id)));
        match self.send(request).await {
            Err(Error::Api { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                tracing::debug!("Remote {} {} already deleted", kind, id);
                Ok(())
            }
            Err(error) => Err(error),
            Ok(_) => Ok(()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return compact_text(&message);
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .map_or_else(|| format!("HTTP {}", status.as_u16()), ToString::to_string)
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn remote(base: &str) -> HttpRemote {
        HttpRemote::new(&RemoteConfig::new(base, Some("secret".to_string())).unwrap()).unwrap()
    }

    #[test]
    fn urls_follow_collection_routes() {
        let remote = remote("https://tasks.example.com");
        assert_eq!(
            remote.url(EntityKind::Task, None).as_str(),
            "https://tasks.example.com/api/tasks"
        );
        assert_eq!(
            remote.url(EntityKind::Tag, Some("a b")).as_str(),
            "https://tasks.example.com/api/tags/a%20b"
        );
    }

    #[test]
    fn urls_keep_base_path_prefix() {
        let remote = remote("https://example.com/deck/");
        assert_eq!(
            remote.url(EntityKind::Project, Some("p1")).as_str(),
            "https://example.com/deck/api/projects/p1"
        );
    }

    #[test]
    fn api_errors_prefer_json_message() {
        assert_eq!(
            parse_api_error(StatusCode::BAD_REQUEST, r#"{"error":"title required"}"#),
            "title required"
        );
        assert_eq!(
            parse_api_error(StatusCode::BAD_GATEWAY, "upstream down"),
            "upstream down"
        );
        assert_eq!(
            parse_api_error(StatusCode::SERVICE_UNAVAILABLE, "  "),
            "Service Unavailable"
        );
    }

    #[test]
    fn debug_redacts_token() {
        let debug = format!("{:?}", remote("https://tasks.example.com"));
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
