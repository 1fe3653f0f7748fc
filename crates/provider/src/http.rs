//! HTTP transport for OpenAI-compatible chat completions endpoints.
//!
//! `HttpProvider` wraps a `reqwest::Client` and posts one request per task.
//! Streaming responses are framed line by line across network reads, so a
//! JSON payload split between two reads is reassembled before decoding.

use crate::{decode, request, sse};
use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;
use qcore::{ChunkStream, Error, Request, ResponseChunk, Result, Transport};
use reqwest::{
    Client,
    header::{self, HeaderMap, HeaderValue},
};

/// HTTP transport for OpenAI-compatible providers.
#[derive(Debug, Clone, Default)]
pub struct HttpProvider {
    client: Client,
}

impl HttpProvider {
    /// Create a provider over an existing client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Issue the request and yield its decoded chunks in wire order.
    pub fn stream(
        &self,
        req: Request,
    ) -> impl Stream<Item = Result<ResponseChunk>> + Send + use<> {
        let client = self.client.clone();
        try_stream! {
            let body = request::Request::new(&req);
            if let Ok(json) = serde_json::to_string(&body) {
                tracing::trace!("request: {json}");
            }

            let response = client
                .post(req.model.endpoint())
                .headers(headers(&req.model.api_key)?)
                .timeout(req.timeout)
                .json(&body)
                .send()
                .await
                .map_err(transport)?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                tracing::error!("{} answered {status}: {body}", req.model.name);
                Err::<(), _>(Error::Http {
                    status: status.as_u16(),
                    body,
                })?;
            } else if req.stream {
                let mut lines = sse::LineBuffer::default();
                let mut bytes = response.bytes_stream();
                while let Some(next) = bytes.next().await {
                    let next = next.map_err(transport)?;
                    for line in lines.push(&next) {
                        if let Some(chunk) = decode_line(&line) {
                            yield chunk;
                        }
                    }
                }

                if let Some(chunk) = lines.finish().as_deref().and_then(decode_line) {
                    yield chunk;
                }
            } else {
                let text = response.text().await.map_err(transport)?;
                tracing::trace!("response: {text}");
                for chunk in decode::decode(&text)? {
                    yield chunk;
                }
            }
        }
    }
}

impl Transport for HttpProvider {
    fn send(&self, request: Request) -> ChunkStream {
        Box::pin(self.stream(request))
    }
}

/// Bearer auth plus JSON content negotiation.
fn headers(key: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(
        header::AUTHORIZATION,
        format!("Bearer {key}")
            .parse()
            .map_err(|e| Error::Transport(format!("invalid api key: {e}")))?,
    );
    Ok(headers)
}

/// Decode one SSE line, skipping anything that is not a valid payload.
fn decode_line(line: &str) -> Option<ResponseChunk> {
    tracing::trace!("sse: {line}");
    let data = sse::data(line)?;
    match decode::decode_event(data) {
        Ok(chunk) => Some(chunk),
        Err(e) => {
            tracing::warn!("skipping undecodable chunk: {e}");
            None
        }
    }
}

fn transport(e: reqwest::Error) -> Error {
    tracing::error!("request failed: {e}");
    Error::Transport(e.to_string())
}
