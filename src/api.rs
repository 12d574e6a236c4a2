use crate::backend::PostRepository;
use crate::types::{Board, Post, Thread};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

impl Client {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
    pub async fn browse_boards(&self) -> Result<Vec<Board>> {
        self.browse("boards", "board").await
    }
    pub async fn browse_threads(&self, slug: &str) -> Result<Vec<Thread>> {
        self.browse(&format!("boards/{slug}/threads"), "thread")
            .await
    }
    pub async fn browse_posts(&self, slug: &str, thread_id: u64) -> Result<Vec<Post>> {
        self.browse(&format!("boards/{slug}/threads/{thread_id}/posts"), "post")
            .await
    }
    async fn browse<T>(&self, path: &str, kind: &str) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}/{path}", self.base_url);
        log::debug!("GET {url}");
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status { status, url });
        }
        parse_items(response.json().await?, kind)
    }
}

#[async_trait]
impl PostRepository for Client {
    async fn fetch_posts(&self, slug: &str, thread_id: u64) -> Result<Vec<Post>> {
        self.browse_posts(slug, thread_id).await
    }
}

/// Unwrap an `{"items": [...]}` listing, rejecting it whole if any item is malformed.
pub fn parse_items<T>(mut body: Value, kind: &str) -> Result<Vec<T>>
where
    T: DeserializeOwned,
{
    let Some(Value::Array(items)) = body.get_mut("items").map(Value::take) else {
        return Err(Error::InvalidResponse(String::from("items: array expected")));
    };
    items
        .into_iter()
        .map(|item| {
            let text = item.to_string();
            serde_json::from_value(item).map_err(|e| {
                Error::InvalidResponse(format!("invalid {kind} DTO: {text}: {e}"))
            })
        })
        .collect()
}

/// Parse the payload of a `post_created` notification.
pub fn parse_post(raw: &str) -> Result<Post> {
    Ok(serde_json::from_str(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn post_json(id: u64) -> Value {
        json!({
            "slug": "b",
            "id": id,
            "parent_id": 1,
            "subject": "",
            "name": "anon",
            "tripcode": null,
            "files": [{
                "hash": "f00",
                "extension": "webm",
                "name": "clip.webm",
                "size": 2048,
                "type": "video/webm",
                "path": "f00.webm",
                "width": 640,
                "height": 360,
                "length": 12,
                "created_at": "2024-06-01T12:00:00Z"
            }],
            "message": "hello",
            "message_parsed": [{ "type": "text", "text": "hello" }],
            "created_at": "2024-06-01T12:00:00Z"
        })
    }

    #[test]
    fn parse_listing() {
        let posts = parse_items::<Post>(json!({ "items": [post_json(1), post_json(2)] }), "post")
            .expect("failed to parse posts");
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[1].id, 2);
        assert_eq!(posts[0].name, "anon");
        assert_eq!(posts[0].tripcode, "");
        assert_eq!(posts[0].files[0].mime, "video/webm");
        assert_eq!(posts[0].files[0].length, Some(12));
    }

    #[test]
    fn parse_empty_listing() {
        let boards = parse_items::<Board>(json!({ "items": [] }), "board")
            .expect("failed to parse boards");
        assert!(boards.is_empty());
    }

    #[test]
    fn reject_missing_items() {
        for body in [json!({}), json!({ "items": {} }), json!([])] {
            let err = parse_items::<Post>(body, "post").expect_err("should fail");
            assert_eq!(err.to_string(), "invalid response: items: array expected");
        }
    }

    #[test]
    fn reject_invalid_item() {
        let mut invalid = post_json(2);
        invalid["files"] = json!("none");
        let err = parse_items::<Post>(json!({ "items": [post_json(1), invalid] }), "post")
            .expect_err("should fail");
        assert!(err.to_string().contains("invalid post DTO"));
    }

    #[test]
    fn parse_notification() {
        let post = parse_post(&post_json(3).to_string()).expect("failed to parse post");
        assert_eq!(post.id, 3);
        assert_eq!(post.thread_id, 1);
        assert!(matches!(parse_post("{\"id\": 3}"), Err(Error::Payload(_))));
        assert!(matches!(parse_post("not json"), Err(Error::Payload(_))));
    }
}
