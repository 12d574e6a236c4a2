use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

const THUMB_WIDTH: f64 = 200.0;
const THUMB_HEIGHT: f64 = 200.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub slug: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub post_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub slug: String,
    pub id: u64,
    pub subject: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tripcode: String,
    pub files: Vec<File>,
    pub message: String,
    #[serde(rename = "message_parsed")]
    pub markup: Vec<Markup>,
    pub created_at: DateTime<Utc>,
    pub bumped_at: DateTime<Utc>,
    pub post_count: u64,
}

/// A single message in a thread. The opening post has `id == thread_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub slug: String,
    pub id: u64,
    #[serde(rename = "parent_id")]
    pub thread_id: u64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tripcode: String,
    pub files: Vec<File>,
    pub message: String,
    #[serde(rename = "message_parsed")]
    pub markup: Vec<Markup>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn is_op(&self) -> bool {
        self.id == self.thread_id
    }
    pub fn belongs_to(&self, slug: &str, thread_id: u64) -> bool {
        self.slug == slug && self.thread_id == thread_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub hash: String,
    pub extension: String,
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime: String,
    pub path: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub length: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl File {
    pub fn is_transparent(&self) -> bool {
        matches!(self.extension.as_str(), "png" | "gif" | "webp")
    }
    pub fn original_url(&self, content_url: &str) -> String {
        format!("{content_url}/original/{}.{}", self.hash, self.extension)
    }
    pub fn thumbnail_url(&self, content_url: &str) -> String {
        format!("{content_url}/thumbnails/{}.webp", self.hash)
    }
    pub fn fallback_thumbnail_extension(&self) -> &'static str {
        if self.is_transparent() {
            "png"
        } else {
            "jpg"
        }
    }
    pub fn fallback_thumbnail_type(&self) -> &'static str {
        if self.is_transparent() {
            "image/png"
        } else {
            "image/jpeg"
        }
    }
    pub fn fallback_thumbnail_url(&self, content_url: &str) -> String {
        format!(
            "{content_url}/thumbnails/{}.{}",
            self.hash,
            self.fallback_thumbnail_extension()
        )
    }
    /// Thumbnail size scaled down to fit the 200x200 box, never scaled up.
    /// Media without dimensions gets the full box.
    pub fn thumbnail_size(&self) -> (f64, f64) {
        let width = self.width.filter(|&w| w > 0).map_or(THUMB_WIDTH, f64::from);
        let height = self.height.filter(|&h| h > 0).map_or(THUMB_HEIGHT, f64::from);
        let scale = 1f64.max(width / THUMB_WIDTH).max(height / THUMB_HEIGHT);
        (width / scale, height / scale)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Markup {
    Newline,
    Text {
        text: String,
    },
    Style {
        style: Style,
        #[serde(default)]
        value: String,
        #[serde(default)]
        children: Vec<Markup>,
    },
    Link {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        icon: Option<String>,
        url: String,
        text: String,
    },
    #[serde(rename = "reflink")]
    RefLink {
        #[serde(rename = "postID")]
        post_id: u64,
        #[serde(rename = "threadID", default, skip_serializing_if = "Option::is_none")]
        thread_id: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        slug: Option<String>,
    },
    Dice {
        count: u32,
        max: u32,
        result: Vec<u32>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    Bold,
    Italic,
    Underline,
    Strike,
    Subscript,
    Superscript,
    Spoiler,
    Code,
    Quote,
    Color,
    Size,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
