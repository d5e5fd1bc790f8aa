//! REST realtime client.
//!
//! The platform's change feed is a long-lived server-sent-events response:
//! one `data:` line per row change. A spawned task parses the byte stream and
//! forwards events over a bounded channel; cancelling the subscription's
//! token stops the task and closes the connection.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Method;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::PlatformClient;
use crate::platform::{ChangeEvent, ChangeTopic, PlatformError, RealtimeApi, RealtimeSubscription};

/// In-flight events buffered per subscription before backpressure applies.
const CHANNEL_CAPACITY: usize = 64;

/// REST implementation of [`RealtimeApi`].
#[derive(Debug, Clone)]
pub struct RestRealtime {
    client: PlatformClient,
}

impl RestRealtime {
    /// Wrap the shared platform client.
    #[must_use]
    pub const fn new(client: PlatformClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RealtimeApi for RestRealtime {
    async fn subscribe(&self, topic: ChangeTopic) -> Result<RealtimeSubscription, PlatformError> {
        let mut url = self.client.realtime_url("changes")?;
        url.query_pairs_mut()
            .append_pair("collection", topic.collection)
            .append_pair("user_id", &format!("eq.{}", topic.user))
            .append_pair("events", "insert,update,delete");

        let response = self
            .client
            .request(Method::GET, url)
            .header("Accept", "text/event-stream")
            .send()
            .await?;
        let response = PlatformClient::check(response).await?;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let worker_cancel = cancel.clone();

        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut buffer = String::new();

            loop {
                let chunk = tokio::select! {
                    () = worker_cancel.cancelled() => break,
                    chunk = stream.next() => chunk,
                };

                let Some(chunk) = chunk else {
                    tracing::debug!("realtime stream closed by the platform");
                    break;
                };

                let bytes = match chunk {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        tracing::warn!(error = %err, "realtime stream error");
                        break;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&bytes));
                for payload in drain_data_lines(&mut buffer) {
                    match serde_json::from_str::<ChangeEvent>(&payload) {
                        Ok(event) => {
                            if tx.send(event).await.is_err() {
                                return;
                            }
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "dropping unparseable change event");
                        }
                    }
                }
            }
        });

        Ok(RealtimeSubscription::new(rx, cancel))
    }
}

/// Pull complete `data:` payloads out of the buffer, leaving any partial
/// trailing line in place.
fn drain_data_lines(buffer: &mut String) -> Vec<String> {
    let mut payloads = Vec::new();

    while let Some(newline) = buffer.find('\n') {
        let line: String = buffer.drain(..=newline).collect();
        let line = line.trim_end();
        if let Some(payload) = line.strip_prefix("data:") {
            let payload = payload.trim_start();
            if !payload.is_empty() {
                payloads.push(payload.to_owned());
            }
        }
        // Comment (`:`) and blank separator lines carry nothing.
    }

    payloads
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_complete_data_lines() {
        let mut buffer = "data: {\"a\":1}\n\ndata: {\"b\":2}\ndata: {\"part".to_owned();
        let payloads = drain_data_lines(&mut buffer);
        assert_eq!(payloads, vec!["{\"a\":1}", "{\"b\":2}"]);
        assert_eq!(buffer, "data: {\"part");
    }

    #[test]
    fn skips_comment_and_blank_lines() {
        let mut buffer = ": keepalive\n\n\ndata: {}\n".to_owned();
        assert_eq!(drain_data_lines(&mut buffer), vec!["{}"]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn completes_split_lines_across_chunks() {
        let mut buffer = "data: {\"part".to_owned();
        assert!(drain_data_lines(&mut buffer).is_empty());
        buffer.push_str("ial\":true}\n");
        assert_eq!(drain_data_lines(&mut buffer), vec!["{\"partial\":true}"]);
    }
}
