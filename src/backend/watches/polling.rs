use super::super::watch::{BatchSink, Command, PostRepository, SourceHandle, UpdateSource};
use super::super::Watcher;
use super::{ticker, Updater};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinSet;

impl Watcher {
    pub fn polling(&self, slug: &str, thread_id: u64) -> PollingSource {
        PollingSource::new(
            self.repository.clone(),
            slug,
            thread_id,
            Duration::from_secs(self.config.intervals.poll),
        )
    }
}

/// Re-fetches the whole thread every `period`.
pub struct PollingSource {
    repository: Arc<dyn PostRepository>,
    slug: Arc<str>,
    thread_id: u64,
    period: Duration,
}

impl PollingSource {
    pub fn new(
        repository: Arc<dyn PostRepository>,
        slug: &str,
        thread_id: u64,
        period: Duration,
    ) -> Self {
        Self {
            repository,
            slug: Arc::from(slug),
            thread_id,
            period,
        }
    }
}

impl UpdateSource for PollingSource {
    fn start(self: Box<Self>, sink: BatchSink) -> SourceHandle {
        let (handle, mut commands) = SourceHandle::channel();
        let updater = Updater {
            repository: self.repository,
            slug: self.slug,
            thread_id: self.thread_id,
            sink,
        };
        let period = self.period;
        tokio::spawn(async move {
            let mut interval = ticker(period);
            let mut tasks = JoinSet::new();
            loop {
                tokio::select! {
                    command = commands.recv() => match command {
                        Ok(Command::Refresh) => {
                            let updater = updater.clone();
                            tasks.spawn(async move { updater.update().await });
                        }
                        Ok(Command::Quit) | Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(n)) => log::debug!("skipped {n} commands"),
                    },
                    _ = interval.tick() => {
                        let updater = updater.clone();
                        tasks.spawn(async move { updater.update().await });
                    }
                    Some(result) = tasks.join_next() => {
                        if let Err(e) = result {
                            log::error!("poll task failed: {e}");
                        }
                    }
                }
            }
            log::debug!("quit polling /{}/{}", updater.slug, updater.thread_id);
        });
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::FakeRepository;
    use super::*;
    use crate::backend::ThreadUpdater;
    use tokio::time;

    fn polling(repository: &Arc<FakeRepository>) -> ThreadUpdater {
        let source = PollingSource::new(repository.clone(), "b", 1, Duration::from_secs(10));
        ThreadUpdater::new("b", 1, Box::new(source))
    }

    fn ids(posts: Option<Vec<crate::types::Post>>) -> Vec<u64> {
        posts
            .expect("updates closed")
            .iter()
            .map(|post| post.id)
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn poll_every_interval() {
        let repository = Arc::new(FakeRepository::default());
        repository.push(&[1, 2]);
        let updater = polling(&repository);
        let mut updates = updater.updates();

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(repository.calls(), 0);
        assert!(updates.try_recv().is_err());

        time::sleep(Duration::from_secs(6)).await;
        assert_eq!(ids(updates.recv().await), vec![1, 2]);

        repository.push(&[1, 2, 3]);
        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(ids(updates.recv().await), vec![3]);

        // unchanged thread
        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(repository.calls(), 3);
        assert!(updates.try_recv().is_err());
        assert_eq!(updater.last_seen_post_id(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_on_next_tick() {
        let repository = Arc::new(FakeRepository::default());
        repository.fail();
        repository.push(&[7]);
        let updater = polling(&repository);
        let mut updates = updater.updates();

        time::sleep(Duration::from_secs(11)).await;
        assert_eq!(repository.calls(), 1);
        assert!(updates.try_recv().is_err());

        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(ids(updates.recv().await), vec![7]);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_immediately() {
        let repository = Arc::new(FakeRepository::default());
        repository.push(&[4]);
        let updater = polling(&repository);
        let mut updates = updater.updates();
        updater.refresh();

        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(repository.calls(), 1);
        assert_eq!(ids(updates.recv().await), vec![4]);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_period_polls_every_second() {
        let repository = Arc::new(FakeRepository::default());
        repository.push(&[1]);
        let source = PollingSource::new(repository.clone(), "b", 1, Duration::ZERO);
        let updater = ThreadUpdater::new("b", 1, Box::new(source));
        let mut updates = updater.updates();

        time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(repository.calls(), 1);
        assert_eq!(ids(updates.recv().await), vec![1]);
        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(repository.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_after_dispose() {
        let repository = Arc::new(FakeRepository::with_delay(Duration::from_secs(5)));
        repository.push(&[1]);
        let updater = polling(&repository);
        let mut updates = updater.updates();

        // dispose while the first fetch is in flight
        time::sleep(Duration::from_secs(12)).await;
        assert_eq!(repository.calls(), 1);
        updater.dispose();

        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(repository.calls(), 1);
        assert!(updates.recv().await.is_none());
        assert_eq!(updater.last_seen_post_id(), 0);
    }
}
