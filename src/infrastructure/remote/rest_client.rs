use super::codec::{RemoteRow, to_local_shape, to_remote_shape};
use super::realtime::{RealtimeClient, RealtimeConfig};
use crate::application::ports::remote_store::{
    RemoteChange, RemoteStore, RemoteStoreError, Subscription,
};
use crate::domain::entities::IntakeRecord;
use crate::domain::value_objects::RecordId;
use crate::shared::config::RemoteConfig;
use crate::shared::error::AppError;
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;

const PREFER_REPRESENTATION: &str = "return=representation";
const PREFER_MERGE: &str = "resolution=merge-duplicates,return=representation";

/// HTTP client for the hosted intake table, speaking the PostgREST dialect.
#[derive(Clone)]
pub struct RestRemoteStore {
    base_url: String,
    api_key: Option<String>,
    table: String,
    realtime: Option<RealtimeConfig>,
    http: reqwest::Client,
}

impl RestRemoteStore {
    pub fn new(config: &RemoteConfig, reconnect_delay: Duration) -> Result<Self, AppError> {
        let base_url = config
            .rest_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| AppError::ConfigurationError("remote rest_url is not set".into()))?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        let api_key = config
            .api_key
            .clone()
            .filter(|value| !value.trim().is_empty());

        let realtime = config
            .realtime_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(|url| RealtimeConfig {
                url: url.to_string(),
                api_key: api_key.clone(),
                schema: config.schema.clone(),
                table: config.table.clone(),
                reconnect_delay,
            });

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            table: config.table.clone(),
            realtime,
            http,
        })
    }

    fn request(&self, method: Method) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, self.table);
        let builder = self.http.request(method, url);
        if let Some(key) = &self.api_key {
            builder
                .header("apikey", key)
                .header("Authorization", format!("Bearer {key}"))
        } else {
            builder
        }
    }

    async fn write_row(
        &self,
        record: &IntakeRecord,
        prefer: &str,
        query: &[(&str, &str)],
    ) -> Result<IntakeRecord, RemoteStoreError> {
        let row = to_remote_shape(record);
        let resp = self
            .request(Method::POST)
            .query(query)
            .header("Prefer", prefer)
            .json(&[row])
            .send()
            .await
            .map_err(transport_error)?;

        let rows: Vec<RemoteRow> = decode_rows(resp).await?;
        Ok(rows
            .into_iter()
            .next()
            .map(to_local_shape)
            .unwrap_or_else(|| record.clone()))
    }
}

#[async_trait]
impl RemoteStore for RestRemoteStore {
    fn is_configured(&self) -> bool {
        true
    }

    async fn insert(&self, record: &IntakeRecord) -> Result<IntakeRecord, RemoteStoreError> {
        self.write_row(record, PREFER_REPRESENTATION, &[]).await
    }

    async fn upsert(&self, record: &IntakeRecord) -> Result<IntakeRecord, RemoteStoreError> {
        self.write_row(record, PREFER_MERGE, &[("on_conflict", "id")])
            .await
    }

    async fn delete(&self, id: &RecordId) -> Result<bool, RemoteStoreError> {
        let filter = format!("eq.{id}");
        let resp = self
            .request(Method::DELETE)
            .query(&[("id", filter.as_str())])
            .header("Prefer", PREFER_REPRESENTATION)
            .send()
            .await
            .map_err(transport_error)?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        let removed: Vec<Value> = decode_rows(resp).await?;
        Ok(!removed.is_empty())
    }

    async fn select_all(&self) -> Result<Vec<IntakeRecord>, RemoteStoreError> {
        let resp = self
            .request(Method::GET)
            .query(&[("select", "*"), ("order", "updated_at.asc")])
            .send()
            .await
            .map_err(transport_error)?;

        let rows: Vec<RemoteRow> = decode_rows(resp).await?;
        Ok(rows.into_iter().map(to_local_shape).collect())
    }

    async fn subscribe(
        &self,
        sink: mpsc::UnboundedSender<RemoteChange>,
    ) -> Result<Subscription, RemoteStoreError> {
        let Some(config) = self.realtime.clone() else {
            tracing::debug!(target: "sync::realtime", "no realtime url configured");
            return Ok(Subscription::inert());
        };
        Ok(RealtimeClient::new(config)?.spawn(sink))
    }
}

async fn decode_rows<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<Vec<T>, RemoteStoreError> {
    let status = resp.status();
    let body = match resp.text().await {
        Ok(body) => body,
        Err(err) if status.is_success() => return Err(transport_error(err)),
        Err(err) => format!("unreadable response body: {err}"),
    };
    if status == StatusCode::CONFLICT {
        return Err(RemoteStoreError::Conflict(body));
    }
    if !status.is_success() {
        return Err(RemoteStoreError::Rejected {
            status: status.as_u16(),
            body,
        });
    }
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&body).map_err(|err| RemoteStoreError::Decode(err.to_string()))
}

fn transport_error(err: reqwest::Error) -> RemoteStoreError {
    if err.is_timeout() {
        RemoteStoreError::Timeout(err.to_string())
    } else if err.is_decode() {
        RemoteStoreError::Decode(err.to_string())
    } else {
        RemoteStoreError::Unreachable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: Option<&str>) -> RemoteConfig {
        RemoteConfig {
            rest_url: url.map(str::to_string),
            api_key: Some("anon".into()),
            ..RemoteConfig::default()
        }
    }

    #[test]
    fn new_requires_a_base_url() {
        let err = RestRemoteStore::new(&config(None), Duration::from_secs(5));
        assert!(matches!(err, Err(AppError::ConfigurationError(_))));

        let blank = RestRemoteStore::new(&config(Some("  ")), Duration::from_secs(5));
        assert!(blank.is_err());
    }

    #[test]
    fn base_url_is_normalized() {
        let store =
            RestRemoteStore::new(&config(Some("https://db.example.test/rest/v1/")), Duration::from_secs(5))
                .unwrap();
        assert_eq!(store.base_url, "https://db.example.test/rest/v1");
        assert!(store.realtime.is_none());
    }

    #[tokio::test]
    async fn unreachable_host_maps_to_unreachable() {
        let store =
            RestRemoteStore::new(&config(Some("http://127.0.0.1:9")), Duration::from_secs(5))
                .unwrap();
        let err = store.select_all().await.unwrap_err();
        assert!(matches!(
            err,
            RemoteStoreError::Unreachable(_) | RemoteStoreError::Timeout(_)
        ));
    }

    /// Answers one request with `response` and hangs up.
    async fn serve_once(response: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn truncated_success_body_is_an_error() {
        let url = serve_once(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 512\r\n\r\n[{\"id\":",
        )
        .await;
        let store = RestRemoteStore::new(&config(Some(&url)), Duration::from_secs(5)).unwrap();

        let err = store.select_all().await.unwrap_err();
        assert!(matches!(
            err,
            RemoteStoreError::Unreachable(_) | RemoteStoreError::Decode(_)
        ));
    }

    #[tokio::test]
    async fn conflict_status_maps_to_conflict() {
        let url = serve_once(
            "HTTP/1.1 409 Conflict\r\ncontent-length: 9\r\n\r\nduplicate",
        )
        .await;
        let store = RestRemoteStore::new(&config(Some(&url)), Duration::from_secs(5)).unwrap();

        let err = store.select_all().await.unwrap_err();
        assert_eq!(err, RemoteStoreError::Conflict("duplicate".into()));
    }

    #[tokio::test]
    async fn subscribe_without_realtime_url_is_inert() {
        let store =
            RestRemoteStore::new(&config(Some("http://127.0.0.1:9")), Duration::from_secs(5))
                .unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let subscription = store.subscribe(tx).await.unwrap();
        assert!(!subscription.is_active());
    }
}
