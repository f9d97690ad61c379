use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::instagram::{self, InstagramClient, InstagramError};
use crate::profile::{PostSummary, ProfileRecord, MAX_POSTS};

/// Fetch a user's profile and, for public profiles, their most recent posts
///
/// # Arguments
/// * `username` - Instagram username (with or without @ symbol) or profile URL
/// * `client` - Configured Instagram client
pub async fn execute(
    username: &str,
    client: &InstagramClient,
) -> Result<ProfileRecord, InstagramError> {
    let username = instagram::parse_username(username)?;

    info!("Fetching profile for @{username}");

    let profile = client.get_profile(&username).await?;
    let mut record = ProfileRecord::from_profile(&profile);

    if profile.is_private {
        info!("Profile @{username} is private, skipping posts");
        return Ok(record);
    }

    // Profile data is still returned when the posts cannot be fetched
    match client.get_posts(&profile, MAX_POSTS).await {
        Ok(posts) => {
            record.posts = posts.iter().take(MAX_POSTS).map(PostSummary::from).collect();
            info!(
                "Fetched {count} posts for @{username}",
                count = record.posts.len()
            );
        }
        Err(e) => {
            debug!("Failed to fetch posts for @{username}: {e}");
        }
    }

    Ok(record)
}

/// Bounds the whole run; a lookup still pending after `limit` becomes
/// [`InstagramError::Timeout`]
pub async fn run_with_watchdog<T, F>(limit: Duration, lookup: F) -> Result<T, InstagramError>
where
    F: Future<Output = Result<T, InstagramError>>,
{
    match tokio::time::timeout(limit, lookup).await {
        Ok(outcome) => outcome,
        Err(_) => {
            warn!("Run aborted after {limit:?}");
            Err(InstagramError::Timeout)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instagram::ClientConfig;
    use mockito::Matcher;
    use serde_json::{json, Value};

    const PROFILE_PATH: &str = "/api/v1/users/web_profile_info/";
    const GRAPHQL_PATH: &str = "/graphql/query/";

    fn posts(range: std::ops::Range<usize>) -> Vec<Value> {
        range
            .map(|i| {
                json!({
                    "node": {
                        "shortcode": format!("s{i}"),
                        "display_url": format!("https://cdn.example.com/s{i}.jpg"),
                        "is_video": false,
                        "taken_at_timestamp": 1705764600,
                        "edge_media_preview_like": { "count": i },
                        "edge_media_to_comment": { "count": 1 },
                        "edge_media_to_caption": { "edges": [] }
                    }
                })
            })
            .collect()
    }

    fn profile_body(is_private: bool, edges: Vec<Value>, has_next_page: bool) -> String {
        json!({
            "data": {
                "user": {
                    "id": "7",
                    "username": "natgeo",
                    "full_name": "National Geographic",
                    "biography": "",
                    "is_private": is_private,
                    "is_verified": true,
                    "profile_pic_url": "https://cdn.example.com/pic.jpg",
                    "external_url": null,
                    "edge_followed_by": { "count": 100 },
                    "edge_follow": { "count": 5 },
                    "edge_owner_to_timeline_media": {
                        "count": 40,
                        "page_info": { "has_next_page": has_next_page, "end_cursor": "next" },
                        "edges": edges
                    }
                }
            }
        })
        .to_string()
    }

    fn client_for(server: &mockito::ServerGuard) -> InstagramClient {
        let config = ClientConfig {
            base_url: server.url(),
            ..ClientConfig::default()
        };
        InstagramClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_strips_at_prefix_before_lookup() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", PROFILE_PATH)
            .match_query(Matcher::UrlEncoded("username".into(), "natgeo".into()))
            .with_status(200)
            .with_body(profile_body(false, posts(0..2), false))
            .expect(1)
            .create_async()
            .await;

        let record = execute("@natgeo", &client_for(&server)).await.unwrap();

        assert_eq!(record.username, "natgeo");
        assert_eq!(record.posts.len(), 2);
        assert_eq!(record.posts[1].url, "https://www.instagram.com/p/s1/");
        assert_eq!(record.posts[1].title, "Post");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_private_profile_has_no_posts() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", PROFILE_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(profile_body(true, posts(0..3), true))
            .create_async()
            .await;
        let graphql = server
            .mock("GET", GRAPHQL_PATH)
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let record = execute("natgeo", &client_for(&server)).await.unwrap();

        assert!(record.is_private);
        assert!(record.posts.is_empty());
        assert_eq!(record.posts_count, 40);
        graphql.assert_async().await;
    }

    #[tokio::test]
    async fn test_posts_capped_at_twelve() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", PROFILE_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(profile_body(false, posts(0..6), true))
            .create_async()
            .await;
        server
            .mock("GET", GRAPHQL_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({
                    "data": { "user": { "edge_owner_to_timeline_media": {
                        "count": 40,
                        "page_info": { "has_next_page": true, "end_cursor": "more" },
                        "edges": posts(6..18)
                    }}}
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let record = execute("natgeo", &client_for(&server)).await.unwrap();

        assert_eq!(record.posts.len(), MAX_POSTS);
        assert_eq!(record.posts.last().unwrap().id, "s11");
    }

    #[tokio::test]
    async fn test_post_failure_keeps_profile() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", PROFILE_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(profile_body(false, posts(0..4), true))
            .create_async()
            .await;
        server
            .mock("GET", GRAPHQL_PATH)
            .match_query(Matcher::Any)
            .with_status(429)
            .create_async()
            .await;

        let record = execute("natgeo", &client_for(&server)).await.unwrap();

        assert_eq!(record.full_name, "National Geographic");
        assert_eq!(record.followers, 100);
        assert!(record.posts.is_empty());
    }

    #[tokio::test]
    async fn test_watchdog_stops_stalled_run() {
        let stalled = std::future::pending::<Result<ProfileRecord, InstagramError>>();

        let err = run_with_watchdog(Duration::from_millis(50), stalled)
            .await
            .unwrap_err();

        assert!(matches!(err, InstagramError::Timeout));
        assert_eq!(
            crate::profile::ErrorRecord::from(&err),
            crate::profile::ErrorRecord::new("Script timeout")
        );
    }

    #[tokio::test]
    async fn test_watchdog_passes_through_finished_run() {
        let finished = async {
            Err::<ProfileRecord, _>(InstagramError::ProfileNotFound {
                username: "ghost".to_string(),
            })
        };

        let err = run_with_watchdog(Duration::from_secs(5), finished)
            .await
            .unwrap_err();

        assert!(matches!(err, InstagramError::ProfileNotFound { .. }));
    }

    #[tokio::test]
    async fn test_invalid_username_makes_no_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", PROFILE_PATH)
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let err = execute("@", &client_for(&server)).await.unwrap_err();

        assert!(matches!(err, InstagramError::InvalidUsername { .. }));
        mock.assert_async().await;
    }
}
