use super::super::stream::{Connection, NotificationStream, StreamEvent};
use super::super::watch::{
    BatchSink, Command, ConnectionState, PostRepository, SourceHandle, UpdateSource,
};
use super::super::Watcher;
use super::{ticker, Updater};
use crate::Result;
use futures_util::StreamExt;
use std::future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinSet;

impl Watcher {
    pub fn event_stream(&self, slug: &str, thread_id: u64) -> EventStreamSource {
        EventStreamSource::new(
            self.repository.clone(),
            self.stream.clone(),
            slug,
            thread_id,
            Duration::from_secs(self.config.intervals.reconnect),
        )
    }
}

/// Listens to the server-wide notification stream and keeps only the posts of one thread.
///
/// Every successful (re)connection triggers a catch-up fetch of the whole thread,
/// which covers anything missed while disconnected. A lost connection is re-opened
/// by the next liveness check, never immediately.
pub struct EventStreamSource {
    repository: Arc<dyn PostRepository>,
    stream: Arc<dyn NotificationStream>,
    slug: Arc<str>,
    thread_id: u64,
    reconnect_interval: Duration,
    state: watch::Sender<ConnectionState>,
}

impl EventStreamSource {
    pub fn new(
        repository: Arc<dyn PostRepository>,
        stream: Arc<dyn NotificationStream>,
        slug: &str,
        thread_id: u64,
        reconnect_interval: Duration,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            repository,
            stream,
            slug: Arc::from(slug),
            thread_id,
            reconnect_interval,
            state,
        }
    }
}

impl UpdateSource for EventStreamSource {
    fn start(self: Box<Self>, sink: BatchSink) -> SourceHandle {
        let (handle, mut commands) = SourceHandle::channel();
        let Self {
            repository,
            stream,
            slug,
            thread_id,
            reconnect_interval,
            state,
        } = *self;
        let updater = Updater {
            repository,
            slug,
            thread_id,
            sink,
        };
        tokio::spawn(async move {
            let mut interval = ticker(reconnect_interval);
            let mut tasks = JoinSet::new();
            let mut connection = Some(connect(stream.as_ref(), &state));
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
                        if connection.is_none() {
                            log::debug!("reconnect event stream");
                            connection = Some(connect(stream.as_ref(), &state));
                        }
                    }
                    event = next_event(&mut connection) => match event {
                        Some(Ok(StreamEvent::Open)) => {
                            log::debug!("event stream connected");
                            state.send_replace(ConnectionState::Connected);
                            let updater = updater.clone();
                            tasks.spawn(async move { updater.update().await });
                        }
                        Some(Ok(StreamEvent::Message(message))) => updater.on_message(&message),
                        Some(Err(e)) => {
                            log::warn!("event stream error: {e}");
                            connection = None;
                            state.send_replace(ConnectionState::Disconnected);
                        }
                        None => {
                            log::warn!("event stream closed");
                            connection = None;
                            state.send_replace(ConnectionState::Disconnected);
                        }
                    },
                    Some(result) = tasks.join_next() => {
                        if let Err(e) = result {
                            log::error!("catch-up task failed: {e}");
                        }
                    }
                }
            }
            drop(connection);
            state.send_replace(ConnectionState::Disconnected);
            log::debug!("quit event stream /{}/{}", updater.slug, updater.thread_id);
        });
        handle
    }
    fn connection_state(&self) -> Option<watch::Receiver<ConnectionState>> {
        Some(self.state.subscribe())
    }
}

fn connect(stream: &dyn NotificationStream, state: &watch::Sender<ConnectionState>) -> Connection {
    state.send_replace(ConnectionState::Connecting);
    stream.connect()
}

async fn next_event(connection: &mut Option<Connection>) -> Option<Result<StreamEvent>> {
    match connection {
        Some(connection) => connection.next().await,
        None => future::pending().await,
    }
}
