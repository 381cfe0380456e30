use super::codec::{RemoteRow, to_local_shape};
use crate::application::ports::remote_store::{RemoteChange, RemoteStoreError, Subscription};
use crate::domain::entities::IntakeRecord;
use crate::domain::value_objects::RecordId;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const HEARTBEAT_TOPIC: &str = "phoenix";

#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub schema: String,
    pub table: String,
    pub reconnect_delay: Duration,
}

/// Phoenix channel envelope used by the realtime socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Envelope {
    topic: String,
    event: String,
    #[serde(default)]
    payload: Value,
    #[serde(rename = "ref", default)]
    reference: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChangePayload {
    data: ChangeData,
}

#[derive(Debug, Deserialize)]
struct ChangeData {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    record: Option<Value>,
    #[serde(default)]
    old_record: Option<Value>,
}

enum SessionEnd {
    /// The consumer dropped its receiver; stop for good.
    SinkClosed,
    Disconnected(String),
}

/// Websocket subscription to row changes on one table.
pub struct RealtimeClient {
    config: RealtimeConfig,
}

impl RealtimeClient {
    pub fn new(config: RealtimeConfig) -> Result<Self, RemoteStoreError> {
        if config.url.trim().is_empty() {
            return Err(RemoteStoreError::NotConfigured);
        }
        Ok(Self { config })
    }

    pub fn topic(&self) -> String {
        format!("realtime:{}:{}", self.config.schema, self.config.table)
    }

    /// Runs the socket on a background task, reconnecting until the handle is dropped.
    pub fn spawn(self, sink: mpsc::UnboundedSender<RemoteChange>) -> Subscription {
        let task = tokio::spawn(async move {
            loop {
                match self.run_session(&sink).await {
                    SessionEnd::SinkClosed => {
                        tracing::debug!(target: "sync::realtime", "change consumer gone; stopping");
                        return;
                    }
                    SessionEnd::Disconnected(reason) => {
                        tracing::warn!(
                            target: "sync::realtime",
                            reason = %reason,
                            retry_in_secs = self.config.reconnect_delay.as_secs(),
                            "realtime channel disconnected"
                        );
                    }
                }
                if sink.is_closed() {
                    return;
                }
                tokio::time::sleep(self.config.reconnect_delay).await;
            }
        });
        Subscription::new(task)
    }

    fn socket_url(&self) -> String {
        let base = self.config.url.trim();
        let separator = if base.contains('?') { '&' } else { '?' };
        match &self.config.api_key {
            Some(key) => format!("{base}{separator}apikey={key}&vsn=1.0.0"),
            None => format!("{base}{separator}vsn=1.0.0"),
        }
    }

    fn join_message(&self) -> Envelope {
        let mut payload = json!({
            "config": {
                "postgres_changes": [{
                    "event": "*",
                    "schema": self.config.schema,
                    "table": self.config.table,
                }]
            }
        });
        if let Some(key) = &self.config.api_key {
            payload["access_token"] = Value::String(key.clone());
        }
        Envelope {
            topic: self.topic(),
            event: "phx_join".to_string(),
            payload,
            reference: Some("1".to_string()),
        }
    }

    async fn run_session(&self, sink: &mpsc::UnboundedSender<RemoteChange>) -> SessionEnd {
        let (stream, _) = match connect_async(self.socket_url()).await {
            Ok(connected) => connected,
            Err(err) => return SessionEnd::Disconnected(err.to_string()),
        };
        let (mut write, mut read) = stream.split();

        if let Err(err) = send_envelope(&mut write, &self.join_message()).await {
            return SessionEnd::Disconnected(err);
        }
        tracing::info!(target: "sync::realtime", topic = %self.topic(), "realtime channel joined");

        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut next_ref: u64 = 2;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    let beat = Envelope {
                        topic: HEARTBEAT_TOPIC.to_string(),
                        event: "heartbeat".to_string(),
                        payload: json!({}),
                        reference: Some(next_ref.to_string()),
                    };
                    next_ref += 1;
                    if let Err(err) = send_envelope(&mut write, &beat).await {
                        return SessionEnd::Disconnected(err);
                    }
                }
                message = read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(change) = parse_change(text.as_str())
                                && sink.send(change).is_err()
                            {
                                return SessionEnd::SinkClosed;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            return SessionEnd::Disconnected("socket closed".to_string());
                        }
                        Some(Ok(_)) => {}
                        Some(Err(err)) => return SessionEnd::Disconnected(err.to_string()),
                    }
                }
            }
        }
    }
}

async fn send_envelope<S>(write: &mut S, envelope: &Envelope) -> Result<(), String>
where
    S: futures::Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let text = serde_json::to_string(envelope).map_err(|err| err.to_string())?;
    write
        .send(Message::Text(text.into()))
        .await
        .map_err(|err| err.to_string())
}

/// Decodes one socket frame. Control frames and malformed payloads yield `None`.
pub fn parse_change(text: &str) -> Option<RemoteChange> {
    let envelope: Envelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(err) => {
            tracing::trace!(target: "sync::realtime", error = %err, "ignoring unparseable frame");
            return None;
        }
    };

    if envelope.event != "postgres_changes" {
        if envelope.event == "phx_reply"
            && envelope.payload.get("status").and_then(Value::as_str) == Some("error")
        {
            tracing::warn!(
                target: "sync::realtime",
                topic = %envelope.topic,
                payload = %envelope.payload,
                "realtime server rejected request"
            );
        }
        return None;
    }

    let data = serde_json::from_value::<ChangePayload>(envelope.payload)
        .ok()?
        .data;
    match data.kind.as_str() {
        "INSERT" => decode_row(data.record).map(RemoteChange::Inserted),
        "UPDATE" => decode_row(data.record).map(RemoteChange::Updated),
        "DELETE" => data
            .old_record
            .as_ref()
            .and_then(|old| old.get("id"))
            .and_then(Value::as_str)
            .and_then(|id| RecordId::new(id.to_string()).ok())
            .map(RemoteChange::Deleted),
        other => {
            tracing::trace!(target: "sync::realtime", kind = other, "ignoring change kind");
            None
        }
    }
}

fn decode_row(value: Option<Value>) -> Option<IntakeRecord> {
    let row: RemoteRow = match serde_json::from_value(value?) {
        Ok(row) => row,
        Err(err) => {
            tracing::warn!(target: "sync::realtime", error = %err, "undecodable realtime row");
            return None;
        }
    };
    Some(to_local_shape(row))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> RealtimeClient {
        RealtimeClient::new(RealtimeConfig {
            url: "wss://example.test/realtime/v1/websocket".into(),
            api_key: Some("anon".into()),
            schema: "public".into(),
            table: "intake_forms".into(),
            reconnect_delay: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn join_targets_the_table_topic() {
        let client = client();
        let join = client.join_message();

        assert_eq!(join.topic, "realtime:public:intake_forms");
        assert_eq!(join.event, "phx_join");
        assert_eq!(
            join.payload["config"]["postgres_changes"][0]["table"],
            "intake_forms"
        );
        assert_eq!(
            client.socket_url(),
            "wss://example.test/realtime/v1/websocket?apikey=anon&vsn=1.0.0"
        );
    }

    #[test]
    fn parses_insert_and_update_rows() {
        let frame = json!({
            "topic": "realtime:public:intake_forms",
            "event": "postgres_changes",
            "payload": {
                "data": {
                    "type": "UPDATE",
                    "record": {
                        "id": "a1",
                        "consigner_type": "new",
                        "consigner_name": "Lamp owner",
                        "items": []
                    }
                }
            },
            "ref": null
        })
        .to_string();

        match parse_change(&frame) {
            Some(RemoteChange::Updated(record)) => {
                assert_eq!(record.id.as_str(), "a1");
                assert_eq!(record.consigner_name, "Lamp owner");
            }
            other => panic!("unexpected change: {other:?}"),
        }
    }

    #[test]
    fn parses_delete_from_old_record() {
        let frame = json!({
            "topic": "realtime:public:intake_forms",
            "event": "postgres_changes",
            "payload": { "data": { "type": "DELETE", "old_record": { "id": "a1" } } }
        })
        .to_string();

        assert_eq!(
            parse_change(&frame),
            Some(RemoteChange::Deleted(RecordId::new("a1".into()).unwrap()))
        );
    }

    #[test]
    fn control_frames_are_ignored() {
        let reply = json!({
            "topic": "phoenix",
            "event": "phx_reply",
            "payload": { "status": "ok", "response": {} },
            "ref": "2"
        })
        .to_string();

        assert_eq!(parse_change(&reply), None);
        assert_eq!(parse_change("not json"), None);
    }

    #[test]
    fn blank_url_is_rejected() {
        let result = RealtimeClient::new(RealtimeConfig {
            url: "  ".into(),
            api_key: None,
            schema: "public".into(),
            table: "intake_forms".into(),
            reconnect_delay: Duration::from_secs(1),
        });
        assert!(matches!(result, Err(RemoteStoreError::NotConfigured)));
    }
}
