mod event_stream;
mod polling;

pub use event_stream::EventStreamSource;
pub use polling::PollingSource;

use super::watch::{BatchSink, PostRepository};
use super::POST_CREATED;
use crate::api::parse_post;
use crate::sse::Event;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

#[derive(Clone)]
struct Updater {
    repository: Arc<dyn PostRepository>,
    slug: Arc<str>,
    thread_id: u64,
    sink: BatchSink,
}

impl Updater {
    /// Fetch the whole thread and offer it as one candidate batch.
    async fn update(&self) {
        match self
            .repository
            .fetch_posts(&self.slug, self.thread_id)
            .await
        {
            Ok(posts) => {
                let count = self.sink.offer(posts);
                if count > 0 {
                    log::debug!("{count} new posts in /{}/{}", self.slug, self.thread_id);
                }
            }
            Err(e) => {
                log::warn!(
                    "failed to fetch posts of /{}/{}: {e}",
                    self.slug,
                    self.thread_id
                );
            }
        }
    }
    fn on_message(&self, message: &Event) {
        if message.event != POST_CREATED {
            return;
        }
        match parse_post(&message.data) {
            Ok(post) if post.belongs_to(&self.slug, self.thread_id) => {
                self.sink.offer(vec![post]);
            }
            Ok(_) => {}
            Err(e) => {
                log::warn!("invalid post payload {}: {e}", message.data);
            }
        }
    }
}

const MIN_PERIOD: Duration = Duration::from_secs(1);

/// Ticks every `period` (at least a second), starting one period from now.
fn ticker(period: Duration) -> Interval {
    if period < MIN_PERIOD {
        log::warn!("interval {period:?} too short, using {MIN_PERIOD:?}");
    }
    let period = period.max(MIN_PERIOD);
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}
