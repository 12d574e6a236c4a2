use crate::api::Client;
use crate::backend::config::Strategy;
use crate::backend::{EventSource, Watcher};
use crate::config::Config;
use crate::model::ThreadModel;
use crate::types::Post;
use clap::Subcommand;
use color_eyre::Result;
use std::sync::Arc;
use tokio::signal;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List all boards.
    Boards,
    /// List the threads of a board.
    Threads { slug: String },
    /// Print a thread, then follow its new posts until interrupted.
    Watch {
        slug: String,
        thread_id: u64,
        /// Poll instead of listening to the event stream.
        #[arg(long)]
        polling: bool,
    },
}

pub struct App {
    config: Config,
}

impl App {
    pub fn new(config: Config) -> Self {
        log::debug!("App::new({config:?})");
        Self { config }
    }
    pub async fn run(&self, command: Command) -> Result<()> {
        let client = Arc::new(Client::new(&self.config.api.base_url)?);
        match command {
            Command::Boards => {
                for board in client.browse_boards().await? {
                    println!("/{}/ {} ({} posts)", board.slug, board.title, board.post_count);
                }
            }
            Command::Threads { slug } => {
                for thread in client.browse_threads(&slug).await? {
                    let title = if thread.subject.is_empty() {
                        thread.message.lines().next().unwrap_or_default()
                    } else {
                        thread.subject.as_str()
                    };
                    println!(
                        "{:>8} {title} ({} posts, bumped {})",
                        thread.id,
                        thread.post_count,
                        thread.bumped_at.format(TIME_FORMAT)
                    );
                }
            }
            Command::Watch {
                slug,
                thread_id,
                polling,
            } => {
                let strategy = if polling {
                    Strategy::Polling
                } else {
                    self.config.watcher.strategy
                };
                self.watch(client, &slug, thread_id, strategy).await?;
            }
        }
        Ok(())
    }
    async fn watch(
        &self,
        client: Arc<Client>,
        slug: &str,
        thread_id: u64,
        strategy: Strategy,
    ) -> Result<()> {
        let mut model = ThreadModel::new(slug, thread_id);
        model.load(client.as_ref()).await?;
        for post in model.posts() {
            self.print_post(post);
        }

        let watcher = Watcher::new(
            client,
            Arc::new(EventSource::new(self.config.sse.url.as_str())?),
            self.config.watcher.clone(),
        );
        let updater = watcher.thread_with(strategy, slug, thread_id, model.last_post_id());
        let mut updates = updater.updates();
        loop {
            tokio::select! {
                result = signal::ctrl_c() => {
                    if let Err(e) = result {
                        log::error!("failed to listen for ctrl-c: {e}");
                    }
                    break;
                }
                Some(posts) = updates.recv() => {
                    let count = model.apply(&posts, false);
                    log::info!("{count} new posts, {} total", model.len());
                    for post in &posts {
                        self.print_post(post);
                    }
                }
            }
        }
        updater.dispose();
        Ok(())
    }
    fn print_post(&self, post: &Post) {
        let name = if post.name.is_empty() {
            "Anonymous"
        } else {
            post.name.as_str()
        };
        println!(
            "#{} {name}{} {}",
            post.id,
            post.tripcode,
            post.created_at.format(TIME_FORMAT)
        );
        for file in &post.files {
            println!(
                "  [{}] {}",
                file.name,
                file.original_url(&self.config.content.base_url)
            );
        }
        for line in post.message.lines() {
            println!("  {line}");
        }
        println!();
    }
}
