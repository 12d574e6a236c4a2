pub mod config;
mod stream;
mod watch;
mod watches;

pub use stream::{Connection, EventSource, NotificationStream, StreamEvent, POST_CREATED};
pub use watch::{
    BatchSink, Command, ConnectionState, PostRepository, SourceHandle, ThreadUpdater, Unsubscribe,
    UpdateSource, Watcher,
};
pub use watches::{EventStreamSource, PollingSource};
