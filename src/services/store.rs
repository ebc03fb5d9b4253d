//
// Copyright © 2025 Hardcore Engineering Inc.
//
// Licensed under the Eclipse Public License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License. You may
// obtain a copy of the License at https://www.eclipse.org/legal/epl-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//
// See the License for the specific language governing permissions and
// limitations under the License.
//

use std::collections::HashSet;
use std::time::{Duration, SystemTime};

use reqwest_retry::{Jitter, RetryDecision, RetryPolicy, policies::ExponentialBackoff};
use serde::{Deserialize, Serialize};
use serde_json::{self as json, Value, json};
use tracing::*;
use url::Url;

use super::{HttpClient, HttpFailure, RequestBuilderExt, ResponseExt};
use crate::config::Config;
use crate::document::Document;
use crate::{Error, Result};

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Action {
    Create,
    Update,
    Delete,
    Read,
}

#[derive(Serialize, Debug)]
struct Envelope<'a> {
    action: Action,
    payload: &'a Value,
}

#[derive(Deserialize, Debug)]
struct Reply {
    success: bool,

    #[serde(default)]
    data: Option<Value>,

    #[serde(default)]
    error: Option<Value>,
}

/// The system of record. A call that returns `Ok` has been committed remotely.
#[allow(async_fn_in_trait)]
pub trait RemoteStore {
    async fn execute(&self, action: Action, payload: Value) -> Result<Option<Value>>;

    async fn create(&self, document: &Document) -> Result<()> {
        self.execute(Action::Create, json::to_value(document)?)
            .await
            .map(drop)
    }

    async fn update(&self, document: &Document) -> Result<()> {
        self.execute(Action::Update, json::to_value(document)?)
            .await
            .map(drop)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.execute(Action::Delete, json!({ "id": id }))
            .await
            .map(drop)
    }

    async fn read(&self) -> Result<Vec<Document>> {
        let data = self.execute(Action::Read, json!({})).await?;
        decode_documents(data)
    }
}

/// Rows that do not decode are skipped so one bad spreadsheet line cannot block a sync.
/// Ids stay unique: only the first row carrying an id is kept.
pub(crate) fn decode_documents(data: Option<Value>) -> Result<Vec<Document>> {
    let rows = match data {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(rows)) => rows,
        Some(_) => return Err(Error::Sync(String::from("read returned no document list"))),
    };

    let total = rows.len();
    let mut seen = HashSet::new();
    let documents = rows
        .into_iter()
        .filter_map(|row| match json::from_value::<Document>(row) {
            Ok(document) if seen.insert(document.id().to_owned()) => Some(document),
            Ok(document) => {
                warn!(id = document.id(), "Skipping duplicate document row");
                None
            }
            Err(error) => {
                warn!(%error, "Skipping malformed document row");
                None
            }
        })
        .collect::<Vec<_>>();

    debug!(total, decoded = documents.len(), "read");

    Ok(documents)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetrySettings {
    fn policy(&self) -> ExponentialBackoff {
        let ceiling = self.base_delay * 2u32.saturating_pow(self.max_retries);

        ExponentialBackoff::builder()
            .retry_bounds(self.base_delay, ceiling)
            .jitter(Jitter::None)
            .base(2)
            .build_with_max_retries(self.max_retries)
    }

    /// Wait before the next attempt, `None` once the retry budget is spent.
    fn delay(
        &self,
        policy: &ExponentialBackoff,
        started: SystemTime,
        past_retries: u32,
    ) -> Option<Duration> {
        match policy.should_retry(started, past_retries) {
            RetryDecision::Retry { execute_after } => Some(
                execute_after
                    .duration_since(SystemTime::now())
                    .unwrap_or_default(),
            ),
            RetryDecision::DoNotRetry => None,
        }
    }
}

#[derive(Clone)]
pub struct StoreClient {
    http: HttpClient,
    endpoint: Url,
    retry: RetrySettings,
}

impl StoreClient {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self::with_client(
            super::http_client()?,
            config.store_url.clone(),
            RetrySettings {
                max_retries: config.max_retries,
                base_delay: config.retry_base_delay,
            },
        ))
    }

    pub fn with_client(http: HttpClient, endpoint: Url, retry: RetrySettings) -> Self {
        Self {
            http,
            endpoint,
            retry,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// One attempt; the body is read here so a cut-off reply counts as a transport failure.
    async fn post(&self, envelope: &Envelope<'_>) -> std::result::Result<Reply, HttpFailure> {
        self.http
            .post(self.endpoint.clone())
            .json(envelope)
            .send_ext()
            .await?
            .json_body::<Reply>()
            .await
    }
}

impl RemoteStore for StoreClient {
    #[tracing::instrument(level = "debug", skip(self, payload), fields(url = %self.endpoint))]
    async fn execute(&self, action: Action, payload: Value) -> Result<Option<Value>> {
        let envelope = Envelope {
            action,
            payload: &payload,
        };

        let policy = self.retry.policy();
        let started = SystemTime::now();
        let mut past_retries = 0;

        let reply = loop {
            trace!(%action, %payload, "http request");

            match self.post(&envelope).await {
                Ok(reply) => break reply,

                Err(failure) if failure.is_transport() => {
                    let Some(delay) = self.retry.delay(&policy, started, past_retries) else {
                        return Err(Error::Sync(format!(
                            "Cannot reach the document store after {} attempts ({failure}). \
                             Check the network connection and that the endpoint allows access.",
                            past_retries + 1
                        )));
                    };

                    past_retries += 1;
                    warn!(%action, %failure, attempt = past_retries, ?delay, "Transport failure, retrying");

                    tokio::time::sleep(delay).await;
                }

                Err(failure) => {
                    return Err(Error::Sync(format!("{action} failed: {failure}")));
                }
            }
        };

        if reply.success {
            Ok(reply.data)
        } else {
            let message = match reply.error {
                Some(Value::String(message)) => message,
                Some(other) => other.to_string(),
                None => format!("{action} was rejected by the document store"),
            };

            Err(Error::Sync(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use reqwest_middleware::ClientBuilder;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use super::*;
    use crate::document::DocumentInputBuilder;

    #[derive(Debug, Clone, Copy)]
    enum Step {
        /// Close the connection without answering.
        Drop,
        Reply(u16, &'static str),
        /// Announce a longer body than is sent, then close.
        Truncated(&'static str),
    }

    const OK: Step = Step::Reply(200, r#"{"success":true}"#);

    struct Loopback {
        url: Url,
        hits: Arc<AtomicUsize>,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl Loopback {
        fn hits(&self) -> usize {
            self.hits.load(Ordering::SeqCst)
        }
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 4096];

        loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                return String::new();
            }
            buffer.extend_from_slice(&chunk[..n]);

            if let Some(end) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buffer[..end]).to_lowercase();
                let length = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|value| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);

                if buffer.len() >= end + 4 + length {
                    return String::from_utf8_lossy(&buffer[end + 4..end + 4 + length]).into_owned();
                }
            }
        }
    }

    /// Serves one scripted step per connection.
    async fn serve(script: Vec<Step>) -> Loopback {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!("http://{}/exec", listener.local_addr().unwrap())).unwrap();

        let hits = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let (counter, log) = (hits.clone(), requests.clone());
        tokio::spawn(async move {
            for step in script {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);

                let (status, body, length) = match step {
                    Step::Drop => {
                        drop(socket);
                        continue;
                    }
                    Step::Reply(status, body) => (status, body, body.len()),
                    Step::Truncated(body) => (200, body, body.len() + 100),
                };

                let request = read_request(&mut socket).await;
                log.lock().unwrap().push(request);

                let response = format!(
                    "HTTP/1.1 {status} Scripted\r\ncontent-type: application/json\r\n\
                     content-length: {length}\r\nconnection: close\r\n\r\n{body}"
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        Loopback {
            url,
            hits,
            requests,
        }
    }

    fn client(url: &Url) -> StoreClient {
        let http = ClientBuilder::new(reqwest::Client::builder().no_proxy().build().unwrap()).build();

        StoreClient::with_client(
            http,
            url.clone(),
            RetrySettings {
                max_retries: 2,
                base_delay: Duration::from_millis(1),
            },
        )
    }

    fn document() -> Document {
        let input = DocumentInputBuilder::default()
            .doc_number("42/2567")
            .source("Registry office")
            .subject("Annual report")
            .doc_date("01/02/2567")
            .build()
            .unwrap();

        Document::new(&input, vec![String::from("report")], None)
    }

    #[tokio::test]
    async fn test_create_sends_envelope() -> anyhow::Result<()> {
        let server = serve(vec![OK]).await;
        let document = document();

        client(&server.url).create(&document).await?;

        let requests = server.requests.lock().unwrap().clone();
        let sent: Value = serde_json::from_str(&requests[0])?;

        assert_eq!(sent["action"], "create");
        assert_eq!(sent["payload"]["id"], document.id());
        assert_eq!(sent["payload"]["docNumber"], "42/2567");

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_sends_id_only() -> anyhow::Result<()> {
        let server = serve(vec![OK]).await;

        client(&server.url).delete("ABC1").await?;

        let requests = server.requests.lock().unwrap().clone();
        let sent: Value = serde_json::from_str(&requests[0])?;
        assert_eq!(sent, json!({ "action": "delete", "payload": { "id": "ABC1" } }));

        Ok(())
    }

    #[tokio::test]
    async fn test_read_skips_malformed_rows() -> anyhow::Result<()> {
        let body = r#"{"success":true,"data":[
            {"id":"1","docNumber":"1","source":"s","subject":"a","docDate":"01/01/2566","createdAt":"2023-01-01T00:00:00Z"},
            {"docNumber":"no id"}
        ]}"#;
        let server = serve(vec![Step::Reply(200, body)]).await;

        let documents = client(&server.url).read().await?;

        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].id(), "1");

        Ok(())
    }

    #[tokio::test]
    async fn test_server_rejection_uses_server_message() {
        let server = serve(vec![Step::Reply(200, r#"{"success":false,"error":"Sheet is locked"}"#)]).await;

        let error = client(&server.url).delete("1").await.unwrap_err();

        assert!(matches!(error, Error::Sync(ref message) if message == "Sheet is locked"));
    }

    #[tokio::test]
    async fn test_http_status_is_not_retried() {
        let server = serve(vec![Step::Reply(500, "oops"), OK]).await;

        let error = client(&server.url).delete("1").await.unwrap_err();

        assert!(matches!(error, Error::Sync(_)));
        assert_eq!(server.hits(), 1);
    }

    #[tokio::test]
    async fn test_malformed_body_is_not_retried() {
        let server = serve(vec![Step::Reply(200, "<html>login</html>"), OK]).await;

        let error = client(&server.url).delete("1").await.unwrap_err();

        assert!(matches!(error, Error::Sync(_)));
        assert_eq!(server.hits(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_is_retried() -> anyhow::Result<()> {
        let server = serve(vec![Step::Drop, OK]).await;

        client(&server.url).delete("1").await?;

        assert_eq!(server.hits(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_cut_off_body_is_retried() -> anyhow::Result<()> {
        let server = serve(vec![Step::Truncated(r#"{"success""#), OK]).await;

        client(&server.url).delete("1").await?;

        assert_eq!(server.hits(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_retry_budget_is_bounded() {
        let server = serve(vec![Step::Drop, Step::Drop, Step::Drop, OK]).await;

        let error = client(&server.url).delete("1").await.unwrap_err();

        assert!(matches!(error, Error::Sync(ref message) if message.contains("after 3 attempts")));
        assert_eq!(server.hits(), 3);
    }

    #[test]
    fn test_backoff_doubles() {
        let settings = RetrySettings::default();
        let policy = settings.policy();
        let started = SystemTime::now();

        let first = settings.delay(&policy, started, 0).unwrap();
        let second = settings.delay(&policy, started, 1).unwrap();

        assert!(first <= Duration::from_millis(1000) && first > Duration::from_millis(900));
        assert!(second <= Duration::from_millis(2000) && second > Duration::from_millis(1900));
        assert_eq!(settings.delay(&policy, started, 2), None);
    }

    #[test]
    fn test_decode_documents_shapes() {
        assert!(decode_documents(None).unwrap().is_empty());
        assert!(decode_documents(Some(Value::Null)).unwrap().is_empty());
        assert!(decode_documents(Some(json!({"rows": []}))).is_err());
    }

    #[test]
    fn test_decode_documents_keeps_first_of_duplicate_ids() -> anyhow::Result<()> {
        let row = |subject: &str| {
            json!({
                "id": "DUP",
                "docNumber": "1",
                "source": "s",
                "subject": subject,
                "docDate": "01/01/2566",
                "createdAt": "2023-01-01T00:00:00Z"
            })
        };

        let documents = decode_documents(Some(json!([row("first"), row("second")])))?;

        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].subject, "first");

        Ok(())
    }
}
