//! JSON records printed on stdout: the profile summary on success and the
//! error record on failure.

use crate::instagram::{InstagramError, Post, Profile};
use serde::{Deserialize, Serialize};

/// Maximum number of posts included in a profile record
pub const MAX_POSTS: usize = 12;

/// Captions are cut to this many characters to form a post title
pub const TITLE_MAX_CHARS: usize = 100;

/// Title used when a post has no caption
pub const DEFAULT_TITLE: &str = "Post";

pub const USAGE: &str = "Usage: igscrape <username>";

const RATE_LIMITED_CODE: &str = "rate_limited";
const RATE_LIMITED_MESSAGE: &str = "Instagram rate limit (429). Try again later.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileRecord {
    pub username: String,
    pub full_name: String,
    pub biography: String,
    pub followers: u64,
    pub following: u64,
    pub posts_count: u64,
    pub is_private: bool,
    pub is_verified: bool,
    pub profile_pic_url: Option<String>,
    pub external_url: Option<String>,
    pub posts: Vec<PostSummary>,
}

impl ProfileRecord {
    /// Builds the record from profile metadata, with no posts attached yet
    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            username: profile.username.clone(),
            full_name: profile.full_name.clone().unwrap_or_default(),
            biography: profile.biography.clone().unwrap_or_default(),
            followers: profile.followers(),
            following: profile.following(),
            posts_count: profile.media_count(),
            is_private: profile.is_private,
            is_verified: profile.is_verified,
            profile_pic_url: profile.profile_pic_url().map(str::to_string),
            external_url: profile.external_url.clone(),
            posts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostSummary {
    /// Post shortcode
    pub id: String,
    pub url: String,
    pub title: String,
    pub thumbnail: Option<String>,
    pub likes: u64,
    pub comments: u64,
    pub views: u64,
    pub is_video: bool,
    pub upload_date: Option<String>,
}

impl From<&Post> for PostSummary {
    fn from(post: &Post) -> Self {
        Self {
            id: post.shortcode.clone(),
            url: post_url(&post.shortcode),
            title: post_title(post.caption()),
            thumbnail: post.display_url.clone(),
            likes: post.likes(),
            comments: post.comments(),
            views: post.views(),
            is_video: post.is_video,
            upload_date: post.upload_date(),
        }
    }
}

/// Canonical URL of a post
pub fn post_url(shortcode: &str) -> String {
    format!("https://www.instagram.com/p/{shortcode}/")
}

/// First [`TITLE_MAX_CHARS`] characters of the caption, or [`DEFAULT_TITLE`]
pub fn post_title(caption: Option<&str>) -> String {
    match caption {
        Some(text) if !text.is_empty() => text.chars().take(TITLE_MAX_CHARS).collect(),
        _ => DEFAULT_TITLE.to_string(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorRecord {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorRecord {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
        }
    }

    pub fn usage() -> Self {
        Self::new(USAGE)
    }
}

impl From<&InstagramError> for ErrorRecord {
    fn from(err: &InstagramError) -> Self {
        if err.is_rate_limited() {
            return Self {
                error: RATE_LIMITED_CODE.to_string(),
                message: Some(RATE_LIMITED_MESSAGE.to_string()),
            };
        }

        match err {
            InstagramError::Connection { .. } => Self::new(format!("Connection error: {err}")),
            InstagramError::Other(inner) => Self::new(format!("{inner:#}")),
            _ => Self::new(err.to_string()),
        }
    }
}
