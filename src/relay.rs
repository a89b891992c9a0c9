use async_stream::try_stream;
use futures::stream::{BoxStream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::models::{ChatMessage, Role};

// Instructions for the portfolio assistant, including the contact-capture protocol
pub const SYSTEM_PROMPT: &str = "You are the assistant on a personal portfolio website. \
Answer questions about the site owner's work, projects and experience briefly and in a friendly tone. \
If the visitor wants to get in touch, collect their name, their email address and the message they want to send. \
Before sending anything, repeat all three back and ask the visitor to confirm. \
Only after the visitor explicitly confirms, end your reply with exactly one fenced block tagged `contact` \
containing a single JSON object with the keys \"name\", \"email\" and \"message\", for example:\n\
```contact\n{\"name\": \"Ada\", \"email\": \"ada@example.com\", \"message\": \"Hello!\"}\n```\n\
Never emit that block without confirmation, and never emit more than one.";

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("LLM request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("LLM returned status {0}")]
    Status(u16),

    #[error("LLM stream is malformed: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("LLM reported an error: {0}")]
    Upstream(String),

    #[error("LLM produced no output within {0:?}")]
    FirstTokenTimeout(Duration),
}

/// Hosted model that turns a conversation into a stream of reply tokens.
pub trait ChatBackend: Send + Sync + 'static {
    fn stream_reply(&self, messages: Vec<ChatMessage>)
    -> BoxStream<'static, Result<String, RelayError>>;
}

// Conversation with the system prompt in front
pub fn with_system_prompt(messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
    let mut full = Vec::with_capacity(messages.len() + 1);
    full.push(ChatMessage {
        role: Role::System,
        content: SYSTEM_PROMPT.to_string(),
    });
    full.extend(messages);
    full
}

// Ollama /api/chat request format
#[derive(Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

// One line of the Ollama streaming response
#[derive(Deserialize)]
struct OllamaChatChunk {
    #[serde(default)]
    message: Option<OllamaChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct OllamaChunkMessage {
    #[serde(default)]
    content: String,
}

pub struct OllamaChat {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaChat {
    pub fn new(client: reqwest::Client, base_url: &str, model: String) -> Self {
        // add http:// if not present
        let base_url = if base_url.starts_with("http") {
            base_url.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", base_url.trim_end_matches('/'))
        };
        Self {
            client,
            base_url,
            model,
        }
    }
}

impl ChatBackend for OllamaChat {
    fn stream_reply(
        &self,
        messages: Vec<ChatMessage>,
    ) -> BoxStream<'static, Result<String, RelayError>> {
        let request = self.client.post(format!("{}/api/chat", self.base_url)).json(
            &OllamaChatRequest {
                model: self.model.clone(),
                messages: with_system_prompt(messages),
                stream: true,
            },
        );
        ollama_tokens(request).boxed()
    }
}

fn ollama_tokens(
    request: reqwest::RequestBuilder,
) -> impl Stream<Item = Result<String, RelayError>> + Send + 'static {
    try_stream! {
        let res = request.send().await?;
        let status = res.status();
        if !status.is_success() {
            Err::<(), _>(RelayError::Status(status.as_u16()))?;
        }

        let mut decoder = NdjsonDecoder::default();
        let mut body = Box::pin(res.bytes_stream());
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            for token in decoder.push(&chunk)? {
                yield token;
            }
            if decoder.is_done() {
                break;
            }
        }
        for token in decoder.finish()? {
            yield token;
        }
    }
}

/// Incremental decoder for newline-delimited JSON chat chunks.
///
/// Network chunks may split a JSON object anywhere, including inside a
/// multi-byte character, so bytes are buffered until a full line arrives.
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buf: Vec<u8>,
    done: bool,
}

impl NdjsonDecoder {
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<String>, RelayError> {
        self.buf.extend_from_slice(bytes);
        let mut tokens = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            self.decode_line(&line, &mut tokens)?;
        }
        Ok(tokens)
    }

    // Flush a trailing line that had no newline
    pub fn finish(&mut self) -> Result<Vec<String>, RelayError> {
        let rest = std::mem::take(&mut self.buf);
        let mut tokens = Vec::new();
        self.decode_line(&rest, &mut tokens)?;
        Ok(tokens)
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    fn decode_line(&mut self, line: &[u8], tokens: &mut Vec<String>) -> Result<(), RelayError> {
        let line = line.trim_ascii();
        if line.is_empty() || self.done {
            return Ok(());
        }

        let chunk: OllamaChatChunk = serde_json::from_slice(line)?;
        if let Some(err) = chunk.error {
            return Err(RelayError::Upstream(err));
        }
        if let Some(msg) = chunk.message {
            if !msg.content.is_empty() {
                tokens.push(msg.content);
            }
        }
        self.done = chunk.done;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_tokens_split_across_chunks() {
        let mut decoder = NdjsonDecoder::default();
        let mut out = decoder
            .push(b"{\"message\":{\"role\":\"assistant\",\"content\":\"Hel\"},\"done\":false}\n{\"mess")
            .unwrap();
        out.extend(
            decoder
                .push(b"age\":{\"content\":\"lo\"},\"done\":false}\n")
                .unwrap(),
        );
        assert_eq!(out, vec!["Hel", "lo"]);
        assert!(!decoder.is_done());
    }

    #[test]
    fn multibyte_character_split_between_chunks() {
        let line = "{\"message\":{\"content\":\"héllo\"}}\n".as_bytes();
        let split = line.iter().position(|b| *b == 0xC3).unwrap() + 1;

        let mut decoder = NdjsonDecoder::default();
        assert!(decoder.push(&line[..split]).unwrap().is_empty());
        assert_eq!(decoder.push(&line[split..]).unwrap(), vec!["héllo"]);
    }

    #[test]
    fn stops_at_done_and_ignores_the_rest() {
        let mut decoder = NdjsonDecoder::default();
        let out = decoder
            .push(b"{\"message\":{\"content\":\"a\"}}\n{\"done\":true}\n{\"message\":{\"content\":\"b\"}}\n")
            .unwrap();
        assert_eq!(out, vec!["a"]);
        assert!(decoder.is_done());
    }

    #[test]
    fn trailing_line_without_newline_is_flushed() {
        let mut decoder = NdjsonDecoder::default();
        assert!(decoder.push(b"{\"message\":{\"content\":\"end\"}}").unwrap().is_empty());
        assert_eq!(decoder.finish().unwrap(), vec!["end"]);
        assert!(decoder.finish().unwrap().is_empty());
    }

    #[test]
    fn upstream_error_line_fails_the_stream() {
        let mut decoder = NdjsonDecoder::default();
        let err = decoder.push(b"{\"error\":\"model not found\"}\n").unwrap_err();
        assert!(matches!(err, RelayError::Upstream(msg) if msg == "model not found"));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let mut decoder = NdjsonDecoder::default();
        assert!(matches!(
            decoder.push(b"not json\n"),
            Err(RelayError::Decode(_))
        ));
    }

    #[test]
    fn system_prompt_goes_first() {
        let messages = with_system_prompt(vec![ChatMessage {
            role: Role::User,
            content: "hi".into(),
        }]);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("```contact"));
        assert_eq!(messages[1].content, "hi");
    }

    #[test]
    fn base_url_gets_a_scheme() {
        let chat = OllamaChat::new(reqwest::Client::new(), "localhost:11434/", "m".into());
        assert_eq!(chat.base_url, "http://localhost:11434");
    }
}
