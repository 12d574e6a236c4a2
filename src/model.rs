use crate::backend::PostRepository;
use crate::types::Post;
use crate::Result;
use indexmap::IndexMap;

/// Posts of one thread as a reader sees them, with a count of the ones
/// that arrived while the reader was away.
#[derive(Debug)]
pub struct ThreadModel {
    slug: String,
    thread_id: u64,
    posts: IndexMap<u64, Post>,
    unread: usize,
}

impl ThreadModel {
    pub fn new(slug: impl Into<String>, thread_id: u64) -> Self {
        Self {
            slug: slug.into(),
            thread_id,
            posts: IndexMap::new(),
            unread: 0,
        }
    }
    pub fn slug(&self) -> &str {
        &self.slug
    }
    pub fn thread_id(&self) -> u64 {
        self.thread_id
    }
    pub async fn load(&mut self, repository: &dyn PostRepository) -> Result<()> {
        let posts = repository.fetch_posts(&self.slug, self.thread_id).await?;
        log::debug!("loaded {} posts of /{}/{}", posts.len(), self.slug, self.thread_id);
        self.unread = 0;
        self.posts.clear();
        self.posts
            .extend(posts.into_iter().map(|post| (post.id, post)));
        Ok(())
    }
    /// Merge new posts and return how many were not known before.
    pub fn apply(&mut self, new_posts: &[Post], hidden: bool) -> usize {
        let mut count = 0;
        for post in new_posts {
            if self.posts.insert(post.id, post.clone()).is_none() {
                count += 1;
            }
        }
        if hidden {
            self.unread += count;
        }
        count
    }
    pub fn posts(&self) -> impl Iterator<Item = &Post> {
        self.posts.values()
    }
    pub fn get(&self, id: u64) -> Option<&Post> {
        self.posts.get(&id)
    }
    pub fn len(&self) -> usize {
        self.posts.len()
    }
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
    pub fn last_post_id(&self) -> u64 {
        self.posts.keys().copied().max().unwrap_or(0)
    }
    pub fn unread(&self) -> usize {
        self.unread
    }
    pub fn reset_unread(&mut self) {
        self.unread = 0;
    }
}
