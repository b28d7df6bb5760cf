//! Streaming chat against a local Ollama server.
//!
//! `/api/chat` with `stream: true` answers with one JSON object per line;
//! each carries a fragment of the assistant message until `done` is set.

use crate::types::ChatMessage;
use anyhow::{anyhow, Context, Result};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Ollama HTTP client.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    temperature: f64,
    num_ctx: u32,
    http: reqwest::Client,
}

// -- Request / response types -----------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<MessagePayload>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct MessagePayload {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f64,
    num_ctx: u32,
}

#[derive(Debug, Deserialize)]
struct StreamLinePayload {
    #[serde(default)]
    message: Option<ResponseMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// One decoded line of a streaming chat response.
#[derive(Debug, PartialEq)]
pub struct StreamLine {
    pub content: String,
    pub done: bool,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature: 0.7,
            num_ctx: 8192,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_options(mut self, temperature: f64, num_ctx: u32) -> Self {
        self.temperature = temperature;
        self.num_ctx = num_ctx;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Stream the assistant's reply as text fragments.
    ///
    /// Transport and server errors arrive as `Err` items; the stream ends
    /// after the first error or the final `done` line.
    pub fn chat_stream(&self, messages: &[ChatMessage]) -> impl Stream<Item = Result<String>> + Send + 'static {
        let http = self.http.clone();
        let url = format!("{}/api/chat", self.base_url);
        let request = ChatRequest {
            model: self.model.clone(),
            messages: messages
                .iter()
                .map(|m| MessagePayload {
                    role: m.role.to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            stream: true,
            options: ChatOptions {
                temperature: self.temperature,
                num_ctx: self.num_ctx,
            },
        };

        async_stream::try_stream! {
            debug!("Ollama chat request to model: {}", request.model);

            let resp = http
                .post(&url)
                .json(&request)
                .send()
                .await
                .context("Ollama chat request failed")?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                Err::<(), _>(anyhow!("Ollama chat failed ({}): {}", status, body))?;
            } else {
                let mut body = resp.bytes_stream();
                let mut lines = LineBuffer::default();
                let mut done = false;

                'read: while let Some(bytes) = body.next().await {
                    let bytes = bytes.context("Ollama stream interrupted")?;
                    for line in lines.push(&bytes) {
                        if let Some(parsed) = parse_stream_line(&line)? {
                            if !parsed.content.is_empty() {
                                yield parsed.content;
                            }
                            if parsed.done {
                                done = true;
                                break 'read;
                            }
                        }
                    }
                }

                if !done {
                    if let Some(line) = lines.finish() {
                        if let Some(parsed) = parse_stream_line(&line)? {
                            if !parsed.content.is_empty() {
                                yield parsed.content;
                            }
                        }
                    }
                }
            }
        }
    }

    /// Names of the models installed on the server.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let resp = self
            .http
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .context("Ollama tags request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Ollama tags failed ({}): {}", status, body);
        }

        let body: TagsResponse = resp.json().await.context("Failed to parse Ollama tags")?;
        Ok(body.models.into_iter().map(|m| m.name).collect())
    }
}

/// Decode one NDJSON line. Blank lines yield `None`.
pub fn parse_stream_line(line: &str) -> Result<Option<StreamLine>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let payload: StreamLinePayload =
        serde_json::from_str(line).with_context(|| format!("Malformed Ollama stream line: {}", line))?;

    if let Some(err) = payload.error {
        return Err(anyhow!("Ollama error: {}", err));
    }

    Ok(Some(StreamLine {
        content: payload.message.map(|m| m.content).unwrap_or_default(),
        done: payload.done,
    }))
}

/// Splits a byte stream into lines, holding partial lines (and partial
/// UTF-8 sequences) until their newline arrives.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            lines.push(String::from_utf8_lossy(&line[..newline]).into_owned());
        }
        lines
    }

    fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// Answer a single HTTP request with `status` and `body`, returning the base URL.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/x-ndjson\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn read_request(socket: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let headers = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let len = headers
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + len {
                    return;
                }
            }
        }
    }

    #[tokio::test]
    async fn chat_stream_yields_fragments_until_done() {
        let url = serve_once(
            "200 OK",
            concat!(
                r#"{"message":{"role":"assistant","content":"pve01 "},"done":false}"#,
                "\n",
                r#"{"message":{"role":"assistant","content":"is up"},"done":false}"#,
                "\n",
                r#"{"message":{"role":"assistant","content":""},"done":true}"#,
                "\n",
            ),
        )
        .await;
        let client = OllamaClient::new(&url, "llama3.1");
        let chunks: Vec<String> = client
            .chat_stream(&[ChatMessage::user("is pve01 up?")])
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert_eq!(chunks, vec!["pve01 ".to_string(), "is up".to_string()]);
    }

    #[tokio::test]
    async fn chat_stream_reports_http_status() {
        let url = serve_once("404 Not Found", r#"{"error":"model 'nope' not found"}"#).await;
        let client = OllamaClient::new(&url, "nope");
        let items: Vec<Result<String>> = client.chat_stream(&[ChatMessage::user("hi")]).collect().await;
        assert_eq!(items.len(), 1);
        let err = items[0].as_ref().unwrap_err().to_string();
        assert!(err.contains("404"), "{}", err);
        assert!(err.contains("model 'nope' not found"), "{}", err);
    }

    #[test]
    fn content_line() {
        let line = r#"{"model":"llama3.1","message":{"role":"assistant","content":"Hel"},"done":false}"#;
        assert_eq!(
            parse_stream_line(line).unwrap(),
            Some(StreamLine {
                content: "Hel".into(),
                done: false,
            })
        );
    }

    #[test]
    fn final_line() {
        let line = r#"{"model":"llama3.1","message":{"role":"assistant","content":""},"done":true,"eval_count":42}"#;
        let parsed = parse_stream_line(line).unwrap().unwrap();
        assert!(parsed.done);
        assert!(parsed.content.is_empty());
    }

    #[test]
    fn blank_line_is_skipped() {
        assert_eq!(parse_stream_line("  \r").unwrap(), None);
    }

    #[test]
    fn error_line_fails() {
        let err = parse_stream_line(r#"{"error":"model 'nope' not found"}"#).unwrap_err();
        assert_eq!(err.to_string(), "Ollama error: model 'nope' not found");
    }

    #[test]
    fn garbage_line_fails() {
        assert!(parse_stream_line("{not json").is_err());
    }

    #[test]
    fn line_buffer_joins_split_lines() {
        let mut buf = LineBuffer::default();
        assert!(buf.push(b"{\"a\":").is_empty());
        assert_eq!(buf.push(b"1}\n{\"b\""), vec!["{\"a\":1}".to_string()]);
        assert_eq!(buf.push(b":2}\n\n"), vec!["{\"b\":2}".to_string(), String::new()]);
        assert_eq!(buf.finish(), None);
    }

    #[test]
    fn line_buffer_keeps_split_utf8() {
        let text = "température\n".as_bytes();
        let split = text.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let mut buf = LineBuffer::default();
        assert!(buf.push(&text[..split]).is_empty());
        assert_eq!(buf.push(&text[split..]), vec!["température".to_string()]);
    }

    #[test]
    fn line_buffer_flushes_tail() {
        let mut buf = LineBuffer::default();
        buf.push(b"{\"done\":true}");
        assert_eq!(buf.finish(), Some("{\"done\":true}".to_string()));
        assert_eq!(buf.finish(), None);
    }
}
