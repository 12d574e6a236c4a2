use crate::sse::{Decoder, Event};
use crate::{Error, Result};
use async_stream::try_stream;
use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use std::time::Duration;

/// Event type the server uses to announce a new post.
pub const POST_CREATED: &str = "post_created";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Open,
    Message(Event),
}

/// An open notification stream. Ends (or yields an error) when the transport is lost.
pub type Connection = BoxStream<'static, Result<StreamEvent>>;

/// The server-wide stream of notifications, shared by every thread.
pub trait NotificationStream: Send + Sync {
    fn connect(&self) -> Connection;
}

pub struct EventSource {
    http: reqwest::Client,
    url: String,
}

impl EventSource {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        // no overall timeout: the body never finishes while the stream is healthy
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

impl NotificationStream for EventSource {
    fn connect(&self) -> Connection {
        events(self.http.clone(), self.url.clone()).boxed()
    }
}

fn events(http: reqwest::Client, url: String) -> impl Stream<Item = Result<StreamEvent>> + Send {
    try_stream! {
        log::debug!("connect to {url}");
        let response = http
            .get(&url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            Err::<(), _>(Error::Status { status, url: url.clone() })?;
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.starts_with("text/event-stream") {
            Err::<(), _>(Error::Stream(format!("unexpected content type {content_type:?}")))?;
        }
        yield StreamEvent::Open;
        let mut decoder = Decoder::new();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            for event in decoder.feed(&chunk?) {
                yield StreamEvent::Message(event);
            }
        }
        log::debug!("event stream {url} closed by server");
    }
}
