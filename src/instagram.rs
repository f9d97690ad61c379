use crate::datetime_utils::upload_date_from_timestamp;
use crate::error_utils::{create_http_client_with_context, parse_http_response_json};
use anyhow::Context;
use regex::Regex;
use reqwest::{
    header::{self, HeaderMap, HeaderValue},
    Client, StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Instagram lookup errors with structured information
#[derive(Debug, Error)]
pub enum InstagramError {
    #[error("Profile '{username}' does not exist")]
    ProfileNotFound { username: String },

    #[error("404 Not Found")]
    NotFound { url: String },

    /// Transport failures and unexpected status codes.
    #[error("{message}")]
    Connection { message: String },

    #[error("Redirected to login page. Login is required to access this profile.")]
    LoginRequired { url: String },

    #[error("Invalid username: '{input}'")]
    InvalidUsername { input: String },

    #[error("Script timeout")]
    Timeout,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl InstagramError {
    /// Instagram signals throttling with HTTP 429; anything carrying that code counts.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, InstagramError::Connection { message } if message.contains("429"))
    }
}

pub const INSTAGRAM_BASE_URL: &str = "https://www.instagram.com";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

// Public web client id; the profile endpoint rejects requests without it
const IG_APP_ID: &str = "936619743392459";

const WEB_PROFILE_INFO_PATH: &str = "/api/v1/users/web_profile_info/";
const GRAPHQL_QUERY_PATH: &str = "/graphql/query/";
const TIMELINE_QUERY_HASH: &str = "003056d32c2554def87228bc3fd9668a";
const TIMELINE_PAGE_SIZE: u32 = 12;

/// Connection settings for [`InstagramClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: INSTAGRAM_BASE_URL.to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Count {
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Edge<T> {
    pub node: T,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageInfo {
    #[serde(default)]
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

/// One page of a profile's timeline media
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Timeline {
    #[serde(default)]
    pub count: u64,
    pub page_info: Option<PageInfo>,
    #[serde(default)]
    pub edges: Vec<Edge<Post>>,
}

impl Timeline {
    /// Cursor of the following page, if Instagram reports one
    fn next_cursor(&self) -> Option<&str> {
        self.page_info
            .as_ref()
            .filter(|info| info.has_next_page)
            .and_then(|info| info.end_cursor.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptionNode {
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaptionEdges {
    #[serde(default)]
    pub edges: Vec<Edge<CaptionNode>>,
}

/// Instagram profile metadata as returned by the web profile endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub full_name: Option<String>,
    pub biography: Option<String>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub is_verified: bool,
    pub profile_pic_url: Option<String>,
    pub profile_pic_url_hd: Option<String>,
    pub external_url: Option<String>,
    pub edge_followed_by: Option<Count>,
    pub edge_follow: Option<Count>,
    pub edge_owner_to_timeline_media: Option<Timeline>,
}

impl Profile {
    pub fn followers(&self) -> u64 {
        self.edge_followed_by.unwrap_or_default().count
    }

    pub fn following(&self) -> u64 {
        self.edge_follow.unwrap_or_default().count
    }

    pub fn media_count(&self) -> u64 {
        self.edge_owner_to_timeline_media
            .as_ref()
            .map_or(0, |timeline| timeline.count)
    }

    /// Prefers the high resolution picture when Instagram provides one
    pub fn profile_pic_url(&self) -> Option<&str> {
        self.profile_pic_url_hd
            .as_deref()
            .or(self.profile_pic_url.as_deref())
    }
}

/// A single timeline post node
#[derive(Debug, Clone, Deserialize)]
pub struct Post {
    pub shortcode: String,
    pub display_url: Option<String>,
    #[serde(default)]
    pub is_video: bool,
    pub video_view_count: Option<u64>,
    pub taken_at_timestamp: Option<i64>,
    pub edge_media_preview_like: Option<Count>,
    pub edge_liked_by: Option<Count>,
    pub edge_media_to_comment: Option<Count>,
    pub edge_media_to_parent_comment: Option<Count>,
    pub edge_media_to_caption: Option<CaptionEdges>,
}

impl Post {
    pub fn likes(&self) -> u64 {
        self.edge_media_preview_like
            .or(self.edge_liked_by)
            .unwrap_or_default()
            .count
    }

    pub fn comments(&self) -> u64 {
        self.edge_media_to_comment
            .or(self.edge_media_to_parent_comment)
            .unwrap_or_default()
            .count
    }

    /// Video view count; photos and videos without a count report 0
    pub fn views(&self) -> u64 {
        if self.is_video {
            self.video_view_count.unwrap_or(0)
        } else {
            0
        }
    }

    pub fn caption(&self) -> Option<&str> {
        self.edge_media_to_caption
            .as_ref()
            .and_then(|captions| captions.edges.first())
            .and_then(|edge| edge.node.text.as_deref())
    }

    pub fn upload_date(&self) -> Option<String> {
        upload_date_from_timestamp(self.taken_at_timestamp)
    }
}

#[derive(Debug, Deserialize)]
struct WebProfileInfoResponse {
    data: Option<WebProfileInfoData>,
}

#[derive(Debug, Deserialize)]
struct WebProfileInfoData {
    user: Option<Profile>,
}

#[derive(Debug, Deserialize)]
struct TimelineQueryResponse {
    data: Option<TimelineQueryData>,
}

#[derive(Debug, Deserialize)]
struct TimelineQueryData {
    user: Option<TimelineQueryUser>,
}

#[derive(Debug, Deserialize)]
struct TimelineQueryUser {
    edge_owner_to_timeline_media: Option<Timeline>,
}

/// Instagram web client for profile and timeline lookups.
///
/// Every request is attempted exactly once; throttling and transport
/// failures are reported to the caller instead of being retried.
pub struct InstagramClient {
    client: Client,
    base_url: String,
}

impl InstagramClient {
    pub fn new(config: &ClientConfig) -> Result<Self, InstagramError> {
        let mut headers = HeaderMap::new();
        headers.insert("X-IG-App-ID", HeaderValue::from_static(IG_APP_ID));
        headers.insert(
            "X-Requested-With",
            HeaderValue::from_static("XMLHttpRequest"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));

        let client = create_http_client_with_context(config.timeout, &config.user_agent, headers)?;

        debug!(
            "Instagram client configured for {base} (timeout: {timeout:?})",
            base = config.base_url,
            timeout = config.timeout
        );

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Builds an endpoint URL below the configured base
    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, InstagramError> {
        let raw = format!("{base}{path}", base = self.base_url);
        let url = Url::parse_with_params(&raw, params)
            .with_context(|| format!("Invalid Instagram endpoint URL: {raw}"))?;
        Ok(url)
    }

    /// Sends a single GET request and decodes the JSON body
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, InstagramError> {
        debug!(%url, "Making request to Instagram");

        let response = self.client.get(url.clone()).send().await.map_err(|err| {
            let message = if err.is_timeout() {
                "Request timed out".to_string()
            } else {
                // The URL is left out so the message only carries transport details
                format!("{:#}", anyhow::Error::new(err.without_url()))
            };
            debug!("Request to {url} failed: {message}");
            InstagramError::Connection { message }
        })?;

        let status = response.status();
        debug!("Received {status} from {url}");

        if status.is_redirection() {
            let location = response
                .headers()
                .get(header::LOCATION)
                .and_then(|h| h.to_str().ok())
                .unwrap_or_default()
                .to_string();

            if location.contains("/accounts/login") {
                return Err(InstagramError::LoginRequired {
                    url: url.to_string(),
                });
            }
            return Err(InstagramError::Connection {
                message: format!("Unexpected redirect to {location}"),
            });
        }

        match status {
            StatusCode::NOT_FOUND => Err(InstagramError::NotFound {
                url: url.to_string(),
            }),
            StatusCode::TOO_MANY_REQUESTS => Err(InstagramError::Connection {
                message: "429 Too Many Requests".to_string(),
            }),
            s if !s.is_success() => Err(InstagramError::Connection {
                message: format!("HTTP error code {code}.", code = s.as_u16()),
            }),
            // Decode failures are reported as-is, not as connection errors
            _ => Ok(parse_http_response_json(response, "Instagram").await?),
        }
    }

    /// Get a profile's metadata, including its first page of posts
    pub async fn get_profile(&self, username: &str) -> Result<Profile, InstagramError> {
        let url = self.endpoint(WEB_PROFILE_INFO_PATH, &[("username", username)])?;

        let response: WebProfileInfoResponse = match self.get_json(url).await {
            Err(InstagramError::NotFound { .. }) => {
                return Err(InstagramError::ProfileNotFound {
                    username: username.to_string(),
                })
            }
            other => other?,
        };

        response
            .data
            .and_then(|data| data.user)
            .ok_or_else(|| InstagramError::ProfileNotFound {
                username: username.to_string(),
            })
    }

    /// Collects up to `limit` of the profile's most recent posts.
    ///
    /// The first page comes embedded in the profile; further pages are only
    /// requested while fewer than `limit` posts have been collected.
    pub async fn get_posts(
        &self,
        profile: &Profile,
        limit: usize,
    ) -> Result<Vec<Post>, InstagramError> {
        let mut posts: Vec<Post> = Vec::new();
        let mut page = profile
            .edge_owner_to_timeline_media
            .clone()
            .unwrap_or_default();

        loop {
            let page_len = page.edges.len();
            let cursor = page.next_cursor().map(str::to_string);
            posts.extend(page.edges.into_iter().map(|edge| edge.node));

            if posts.len() >= limit {
                posts.truncate(limit);
                break;
            }

            let Some(cursor) = cursor else {
                break;
            };
            if page_len == 0 {
                debug!("Empty timeline page for @{}, stopping", profile.username);
                break;
            }

            page = self.get_timeline_page(&profile.id, &cursor).await?;
        }

        debug!(
            "Collected {count} posts for @{username}",
            count = posts.len(),
            username = profile.username
        );

        Ok(posts)
    }

    /// Fetches the timeline page following `cursor`
    async fn get_timeline_page(
        &self,
        user_id: &str,
        cursor: &str,
    ) -> Result<Timeline, InstagramError> {
        let variables = serde_json::json!({
            "id": user_id,
            "first": TIMELINE_PAGE_SIZE,
            "after": cursor,
        })
        .to_string();

        let url = self.endpoint(
            GRAPHQL_QUERY_PATH,
            &[("query_hash", TIMELINE_QUERY_HASH), ("variables", &variables)],
        )?;

        let response: TimelineQueryResponse = match self.get_json(url).await {
            Err(err @ InstagramError::NotFound { .. }) => {
                return Err(InstagramError::Connection {
                    message: err.to_string(),
                })
            }
            other => other?,
        };

        let timeline = response
            .data
            .and_then(|data| data.user)
            .and_then(|user| user.edge_owner_to_timeline_media)
            .context("Timeline page missing from GraphQL response")?;

        Ok(timeline)
    }
}

/// Extracts a username from `@name`, `name` or a profile URL
pub fn parse_username(input: &str) -> Result<String, InstagramError> {
    let input = input.trim();
    let invalid = || InstagramError::InvalidUsername {
        input: input.to_string(),
    };

    let candidate = match Url::parse(input) {
        Ok(parsed_url) => {
            let is_instagram = parsed_url
                .host_str()
                .is_some_and(|h| h == "instagram.com" || h.ends_with(".instagram.com"));
            if !is_instagram {
                return Err(invalid());
            }

            // Path format should be /username/
            parsed_url
                .path_segments()
                .and_then(|mut segments| segments.find(|s| !s.is_empty()))
                .map(|s| s.trim_start_matches('@').to_string())
                .ok_or_else(invalid)?
        }
        Err(_) => input.trim_start_matches('@').to_string(),
    };

    let pattern = Regex::new(r"^[A-Za-z0-9._]{1,30}$").context("Invalid username pattern")?;
    if !pattern.is_match(&candidate) {
        return Err(invalid());
    }

    Ok(candidate)
}
