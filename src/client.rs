use anyhow::{anyhow, Result};
use futures_util::{Stream, StreamExt};
use reqwest::Client;

use crate::transcript::Message;

/// Progress of one exchange, published from the streaming task to the UI
/// loop. `Partial` carries the full reply accumulated so far, not a delta,
/// so applying it is a plain overwrite of the placeholder entry.
#[derive(Debug)]
pub enum ChatEvent {
    Partial(String),
    Done,
    Failed(String),
}

#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    base_url: String,
}

impl ChatClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// POST the conversation history and hand back the response with its
    /// body still unread, ready to be consumed as a chunk stream. A
    /// non-success status is a transport failure.
    pub async fn send(&self, history: &[Message]) -> Result<reqwest::Response> {
        let url = format!("{}/api/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(history)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Chat request failed with status: {}",
                response.status()
            ));
        }

        Ok(response)
    }
}

/// Incremental UTF-8 decoder. The backend's chunk boundaries fall wherever
/// the transport cuts them, so a multi-byte character may arrive split in
/// two; the incomplete tail is carried into the next call instead of being
/// mangled into replacement characters.
#[derive(Default)]
pub struct StreamDecoder {
    carry: Vec<u8>,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.carry);
        bytes.extend_from_slice(chunk);

        match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => {
                let utf8_err = err.utf8_error();
                let mut bytes = err.into_bytes();
                match utf8_err.error_len() {
                    // Incomplete sequence at the end: keep it for the
                    // next chunk, emit the valid prefix.
                    None => {
                        self.carry = bytes.split_off(utf8_err.valid_up_to());
                        String::from_utf8_lossy(&bytes).into_owned()
                    }
                    // Actually-invalid bytes: not specially handled,
                    // decode lossily and move on.
                    Some(_) => String::from_utf8_lossy(&bytes).into_owned(),
                }
            }
        }
    }
}

/// The accumulation loop: drain the response body chunk by chunk, decode
/// statefully, and publish the ever-growing reply after every chunk. The
/// reply only grows by concatenation, in arrival order. Ends on stream
/// completion or propagates the first read error.
pub async fn consume_stream<S, B, E, F>(stream: S, mut publish: F) -> Result<()>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::error::Error + Send + Sync + 'static,
    F: FnMut(String),
{
    let mut stream = std::pin::pin!(stream);
    let mut decoder = StreamDecoder::new();
    let mut reply = String::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        reply.push_str(&decoder.decode(chunk.as_ref()));
        publish(reply.clone());
    }

    Ok(())
}
