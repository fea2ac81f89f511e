// Veo API Client
// Long-running video generation through the Gemini API operations endpoints

use crate::credentials::CredentialProvider;
use crate::jobs::{JobError, JobHandle, JobPoll, VideoJobApi, OUTPUTS_PER_JOB, OUTPUT_RESOLUTION};
use crate::types::AspectRatio;
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "veo-3.1-fast-generate-preview";

#[derive(Clone)]
pub struct VeoClient {
    client: Client,
    credentials: Arc<dyn CredentialProvider>,
    base_url: String,
    model: String,
}

// ============================================================================
// API REQUEST/RESPONSE STRUCTURES
// ============================================================================

#[derive(Serialize, Debug)]
pub struct GenerateVideosRequest {
    pub instances: Vec<VideoInstance>,
    pub parameters: VideoParameters,
}

#[derive(Serialize, Debug)]
pub struct VideoInstance {
    pub prompt: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VideoParameters {
    pub aspect_ratio: String,
    pub resolution: String,
    pub sample_count: u32,
}

#[derive(Deserialize, Debug, Default)]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    pub response: Option<OperationResponse>,
    pub error: Option<OperationError>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OperationResponse {
    pub generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideoResponse {
    #[serde(default)]
    pub generated_samples: Vec<GeneratedSample>,
}

#[derive(Deserialize, Debug)]
pub struct GeneratedSample {
    pub video: Option<VideoFile>,
}

#[derive(Deserialize, Debug)]
pub struct VideoFile {
    pub uri: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct OperationError {
    pub code: Option<i32>,
    pub message: Option<String>,
}

/// Which failures may send a request again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resend {
    Always,
    ConnectOnly,
}

// ============================================================================
// IMPLEMENTATION
// ============================================================================

impl VeoClient {
    pub fn new(credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            client: Client::new(),
            credentials,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn build_request(prompt: &str, aspect_ratio: AspectRatio) -> GenerateVideosRequest {
        GenerateVideosRequest {
            instances: vec![VideoInstance {
                prompt: prompt.to_string(),
            }],
            parameters: VideoParameters {
                aspect_ratio: aspect_ratio.label().to_string(),
                resolution: OUTPUT_RESOLUTION.to_string(),
                sample_count: OUTPUTS_PER_JOB,
            },
        }
    }

    fn api_key(&self) -> Result<String, JobError> {
        self.credentials.api_key().ok_or(JobError::MissingCredential)
    }

    /// Send a request with exponential backoff and return the response body.
    ///
    /// `Resend::Always` retries connection failures, timeouts and 429/5xx
    /// answers. `Resend::ConnectOnly` only retries requests that never
    /// reached the server; anything else is returned as `JobError::Api`.
    async fn send_with_retry<F>(&self, what: &str, resend: Resend, build: F) -> Result<String, JobError>
    where
        F: Fn() -> RequestBuilder,
    {
        let backoff_config = ExponentialBackoff {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(30),
            multiplier: 2.0,
            max_elapsed_time: Some(Duration::from_secs(120)),
            ..Default::default()
        };

        let operation = || async {
            let response = build()
                .timeout(Duration::from_secs(60))
                .send()
                .await
                .map_err(|e| {
                    if e.is_connect() || (e.is_timeout() && resend == Resend::Always) {
                        tracing::warn!("Veo {} connection error (retrying): {}", what, e);
                        backoff::Error::transient(format!("Connection error: {}", e))
                    } else {
                        backoff::Error::permanent(format!("Request error: {}", e))
                    }
                })?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| backoff::Error::permanent(format!("Failed to read response: {}", e)))?;

            if resend == Resend::Always && matches!(status.as_u16(), 429 | 500 | 502 | 503) {
                tracing::warn!("Veo {} returned {} (retrying)", what, status);
                return Err(backoff::Error::transient(format!("API error ({}): {}", status, body)));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(format!("API error ({}): {}", status, body)));
            }
            Ok(body)
        };

        retry(backoff_config, operation).await.map_err(JobError::Api)
    }
}

/// Collapse a finished operation into a poll result
pub fn operation_to_poll(operation: Operation) -> JobPoll {
    let error = operation.error.map(|e| {
        e.message
            .unwrap_or_else(|| format!("operation failed with code {}", e.code.unwrap_or_default()))
    });
    let output_uri = operation
        .response
        .and_then(|r| r.generate_video_response)
        .and_then(|r| r.generated_samples.into_iter().next())
        .and_then(|s| s.video)
        .and_then(|v| v.uri);

    JobPoll {
        done: operation.done,
        output_uri,
        error,
    }
}

#[async_trait]
impl VideoJobApi for VeoClient {
    async fn start(&self, prompt: &str, aspect_ratio: AspectRatio) -> Result<JobHandle, JobError> {
        let api_key = self.api_key()?;
        let url = format!("{}/models/{}:predictLongRunning", self.base_url, self.model);
        let request_body = Self::build_request(prompt, aspect_ratio);

        let body = self
            // every accepted POST is a new billable job
            .send_with_retry("start", Resend::ConnectOnly, || {
                self.client
                    .post(&url)
                    .header("x-goog-api-key", &api_key)
                    .json(&request_body)
            })
            .await?;

        let operation: Operation = serde_json::from_str(&body)
            .map_err(|e| JobError::Api(format!("Failed to parse operation: {}", e)))?;
        Ok(JobHandle { name: operation.name })
    }

    async fn poll(&self, handle: &JobHandle) -> Result<JobPoll, JobError> {
        let api_key = self.api_key()?;
        let url = format!("{}/{}", self.base_url, handle.name);

        let body = self
            .send_with_retry("poll", Resend::Always, || {
                self.client.get(&url).header("x-goog-api-key", &api_key)
            })
            .await?;

        let operation: Operation = serde_json::from_str(&body)
            .map_err(|e| JobError::Api(format!("Failed to parse operation status: {}", e)))?;
        Ok(operation_to_poll(operation))
    }

    async fn fetch_bytes(&self, output_uri: &str) -> Result<Vec<u8>, JobError> {
        // download links need the key again
        let api_key = self.api_key()?;
        let response = self
            .client
            .get(output_uri)
            .query(&[("key", api_key.as_str())])
            .send()
            .await
            .map_err(|e| JobError::Download(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(JobError::Download(
                status.canonical_reason().unwrap_or(status.as_str()).to_string(),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| JobError::Download(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::Keyring;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Local HTTP server answering requests in order with the given
    /// `(status line, body)` pairs, repeating the last one. Returns the base
    /// URL and a counter of requests received.
    async fn scripted_server(answers: Vec<(&'static str, &'static str)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(AtomicUsize::new(0));
        let counter = requests.clone();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                read_request(&mut socket).await;
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let (status, body) = answers[n.min(answers.len() - 1)];
                let response = format!(
                    "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        (base_url, requests)
    }

    /// Consume headers and body so the client sees a complete exchange
    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let Ok(n) = socket.read(&mut chunk).await else { return };
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let body_len = text[..end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + body_len {
                    return;
                }
            }
        }
    }

    fn keyed_client(base_url: &str) -> VeoClient {
        VeoClient::new(Arc::new(Keyring::new(Some("test-key".into())))).with_base_url(base_url)
    }

    #[test]
    fn test_request_asks_for_one_720p_clip() {
        let request = VeoClient::build_request("a fox", AspectRatio::Portrait);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["instances"][0]["prompt"], "a fox");
        assert_eq!(json["parameters"]["aspectRatio"], "9:16");
        assert_eq!(json["parameters"]["resolution"], "720p");
        assert_eq!(json["parameters"]["sampleCount"], 1);
    }

    #[test]
    fn test_running_operation_is_not_done() {
        let operation: Operation =
            serde_json::from_str(r#"{"name": "models/veo/operations/1"}"#).unwrap();
        assert_eq!(operation_to_poll(operation), JobPoll::default());
    }

    #[test]
    fn test_finished_operation_yields_first_video_uri() {
        let operation: Operation = serde_json::from_str(
            r#"{
                "name": "models/veo/operations/1",
                "done": true,
                "response": {
                    "@type": "type.googleapis.com/google.ai.generativelanguage.v1beta.PredictLongRunningResponse",
                    "generateVideoResponse": {
                        "generatedSamples": [
                            { "video": { "uri": "https://example.test/files/a:download?alt=media" } },
                            { "video": { "uri": "https://example.test/files/b:download?alt=media" } }
                        ]
                    }
                }
            }"#,
        )
        .unwrap();

        let poll = operation_to_poll(operation);
        assert!(poll.done);
        assert_eq!(
            poll.output_uri.as_deref(),
            Some("https://example.test/files/a:download?alt=media")
        );
        assert_eq!(poll.error, None);
    }

    #[test]
    fn test_failed_operation_carries_message() {
        let operation: Operation = serde_json::from_str(
            r#"{"name": "op", "done": true, "error": {"code": 3, "message": "bad prompt"}}"#,
        )
        .unwrap();
        let poll = operation_to_poll(operation);
        assert!(poll.done);
        assert_eq!(poll.error.as_deref(), Some("bad prompt"));
        assert_eq!(poll.output_uri, None);
    }

    #[tokio::test]
    async fn test_start_without_key_fails_before_network() {
        let client = VeoClient::new(Arc::new(Keyring::empty()))
            .with_base_url("http://127.0.0.1:9/");
        let err = client.start("p", AspectRatio::Landscape).await.unwrap_err();
        assert_eq!(err, JobError::MissingCredential);
    }

    #[tokio::test]
    async fn test_start_is_sent_once_even_on_server_error() {
        let (base_url, requests) = scripted_server(vec![
            ("503 Service Unavailable", r#"{"error": {"message": "overloaded"}}"#),
            ("200 OK", r#"{"name": "operations/2"}"#),
        ])
        .await;

        let err = keyed_client(&base_url)
            .start("p", AspectRatio::Landscape)
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::Api(ref m) if m.contains("503")));
        assert_eq!(requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_start_returns_operation_name() {
        let (base_url, requests) =
            scripted_server(vec![("200 OK", r#"{"name": "models/veo/operations/7"}"#)]).await;

        let handle = keyed_client(&base_url)
            .start("p", AspectRatio::Portrait)
            .await
            .unwrap();

        assert_eq!(handle.name, "models/veo/operations/7");
        assert_eq!(requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_poll_retries_server_errors() {
        let (base_url, requests) = scripted_server(vec![
            ("503 Service Unavailable", "{}"),
            ("200 OK", r#"{"name": "operations/1", "done": false}"#),
        ])
        .await;

        let poll = keyed_client(&base_url)
            .poll(&JobHandle { name: "operations/1".into() })
            .await
            .unwrap();

        assert!(!poll.done);
        assert_eq!(requests.load(Ordering::SeqCst), 2);
    }
}
