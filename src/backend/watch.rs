use super::config::{Config, Strategy};
use super::stream::NotificationStream;
use crate::types::Post;
use crate::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, ThreadId};
use tokio::sync::{broadcast, mpsc, watch};

/// Source of the complete, current post list of a thread.
#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn fetch_posts(&self, slug: &str, thread_id: u64) -> Result<Vec<Post>>;
}

/// A transport that proposes candidate batches to a [`BatchSink`].
pub trait UpdateSource: Send {
    fn start(self: Box<Self>, sink: BatchSink) -> SourceHandle;
    fn connection_state(&self) -> Option<watch::Receiver<ConnectionState>> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone)]
pub enum Command {
    Refresh,
    Quit,
}

pub struct SourceHandle {
    tx: broadcast::Sender<Command>,
}

impl SourceHandle {
    pub fn channel() -> (Self, broadcast::Receiver<Command>) {
        let (tx, rx) = broadcast::channel(1);
        (Self { tx }, rx)
    }
    fn send(&self, command: Command) {
        if let Err(e) = self.tx.send(command) {
            log::warn!("failed to send source command: {e}");
        }
    }
}

type Listener = Arc<dyn Fn(&[Post]) + Send + Sync>;

struct Shared {
    dispatch: Mutex<()>,
    dispatching: Mutex<Option<ThreadId>>,
    last_seen: AtomicU64,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener: AtomicU64,
    disposed: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone)]
pub struct BatchSink {
    shared: Arc<Shared>,
}

impl BatchSink {
    /// Dispatch the posts newer than the watermark, then advance it.
    /// Returns the number of posts delivered.
    pub fn offer(&self, mut posts: Vec<Post>) -> usize {
        let _dispatch = lock(&self.shared.dispatch);
        if self.shared.disposed.load(Ordering::Acquire) {
            log::debug!("discard {} posts after dispose", posts.len());
            return 0;
        }
        let last_seen = self.shared.last_seen.load(Ordering::Acquire);
        posts.retain(|post| post.id > last_seen);
        posts.sort_by_key(|post| post.id);
        posts.dedup_by_key(|post| post.id);
        let Some(max) = posts.last().map(|post| post.id) else {
            return 0;
        };
        let listeners = lock(&self.shared.listeners)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect::<Vec<_>>();
        *lock(&self.shared.dispatching) = Some(thread::current().id());
        for listener in listeners {
            listener(&posts);
        }
        *lock(&self.shared.dispatching) = None;
        if !self.shared.disposed.load(Ordering::Acquire) {
            self.shared.last_seen.fetch_max(max, Ordering::AcqRel);
        }
        posts.len()
    }
}

#[derive(Debug)]
pub struct Unsubscribe {
    shared: Weak<Shared>,
    id: u64,
}

impl Unsubscribe {
    pub fn unsubscribe(&self) {
        if let Some(shared) = self.shared.upgrade() {
            lock(&shared.listeners).retain(|(id, _)| *id != self.id);
        }
    }
}

enum Source {
    Idle(Box<dyn UpdateSource>),
    Running(SourceHandle),
    Stopped,
}

/// Delivers the new posts of one thread to its subscribers, each post at most once.
///
/// The source is started by the first subscription, so nothing is dispatched
/// before anyone listens. Until then no connection is opened or fetch made, and
/// [`ThreadUpdater::connection_state`] stays `Disconnected`. Must be used inside
/// a tokio runtime.
pub struct ThreadUpdater {
    slug: String,
    thread_id: u64,
    shared: Arc<Shared>,
    source: Mutex<Source>,
    connection_state: Option<watch::Receiver<ConnectionState>>,
}

impl ThreadUpdater {
    pub fn new(slug: impl Into<String>, thread_id: u64, source: Box<dyn UpdateSource>) -> Self {
        Self::with_last_seen(slug, thread_id, 0, source)
    }
    /// Posts up to `last_seen` are treated as already known.
    pub fn with_last_seen(
        slug: impl Into<String>,
        thread_id: u64,
        last_seen: u64,
        source: Box<dyn UpdateSource>,
    ) -> Self {
        Self {
            slug: slug.into(),
            thread_id,
            shared: Arc::new(Shared {
                dispatch: Mutex::new(()),
                dispatching: Mutex::new(None),
                last_seen: AtomicU64::new(last_seen),
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(0),
                disposed: AtomicBool::new(false),
            }),
            connection_state: source.connection_state(),
            source: Mutex::new(Source::Idle(source)),
        }
    }
    pub fn slug(&self) -> &str {
        &self.slug
    }
    pub fn thread_id(&self) -> u64 {
        self.thread_id
    }
    pub fn last_seen_post_id(&self) -> u64 {
        self.shared.last_seen.load(Ordering::Acquire)
    }
    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::Acquire)
    }
    /// `None` for sources without a persistent connection.
    pub fn connection_state(&self) -> Option<watch::Receiver<ConnectionState>> {
        self.connection_state.clone()
    }
    pub fn subscribe<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&[Post]) + Send + Sync + 'static,
    {
        let id = self.shared.next_listener.fetch_add(1, Ordering::Relaxed);
        if self.is_disposed() {
            log::debug!("subscribe after dispose /{}/{}", self.slug, self.thread_id);
            return Unsubscribe {
                shared: Weak::new(),
                id,
            };
        }
        lock(&self.shared.listeners).push((id, Arc::new(listener)));
        self.start();
        Unsubscribe {
            shared: Arc::downgrade(&self.shared),
            id,
        }
    }
    /// Channel flavor of [`ThreadUpdater::subscribe`].
    pub fn updates(&self) -> mpsc::UnboundedReceiver<Vec<Post>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribe(move |posts| {
            if let Err(e) = tx.send(posts.to_vec()) {
                log::debug!("failed to send new posts: {e}");
            }
        });
        rx
    }
    /// Ask the source for an immediate catch-up fetch.
    pub fn refresh(&self) {
        if let Source::Running(handle) = &*lock(&self.source) {
            handle.send(Command::Refresh);
        }
    }
    /// Once this returns no listener is called again and the watermark stays put.
    /// A batch being dispatched on another thread is waited for; called from a
    /// listener, the rest of the current batch is still delivered.
    pub fn dispose(&self) {
        if self.shared.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let reentrant = *lock(&self.shared.dispatching) == Some(thread::current().id());
        if !reentrant {
            drop(lock(&self.shared.dispatch));
        }
        lock(&self.shared.listeners).clear();
        if let Source::Running(handle) = std::mem::replace(&mut *lock(&self.source), Source::Stopped)
        {
            handle.send(Command::Quit);
        }
        log::debug!("disposed /{}/{}", self.slug, self.thread_id);
    }
    fn start(&self) {
        let mut source = lock(&self.source);
        *source = match std::mem::replace(&mut *source, Source::Stopped) {
            Source::Idle(pending) => {
                log::debug!("start updates for /{}/{}", self.slug, self.thread_id);
                Source::Running(pending.start(BatchSink {
                    shared: Arc::clone(&self.shared),
                }))
            }
            source => source,
        };
    }
}

impl Drop for ThreadUpdater {
    fn drop(&mut self) {
        self.dispose();
    }
}

pub struct Watcher {
    pub repository: Arc<dyn PostRepository>,
    pub stream: Arc<dyn NotificationStream>,
    pub(crate) config: Config,
}

impl Watcher {
    pub fn new(
        repository: Arc<dyn PostRepository>,
        stream: Arc<dyn NotificationStream>,
        config: Config,
    ) -> Self {
        Self {
            repository,
            stream,
            config,
        }
    }
    pub fn thread(&self, slug: &str, thread_id: u64, last_seen: u64) -> ThreadUpdater {
        self.thread_with(self.config.strategy, slug, thread_id, last_seen)
    }
    pub fn thread_with(
        &self,
        strategy: Strategy,
        slug: &str,
        thread_id: u64,
        last_seen: u64,
    ) -> ThreadUpdater {
        let source: Box<dyn UpdateSource> = match strategy {
            Strategy::Sse => Box::new(self.event_stream(slug, thread_id)),
            Strategy::Polling => Box::new(self.polling(slug, thread_id)),
        };
        ThreadUpdater::with_last_seen(slug, thread_id, last_seen, source)
    }
}
