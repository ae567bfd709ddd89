//! Reddit sample fetcher
//!
//! Pulls the newest posts of a subreddit so the frontend has realistic text to
//! analyze. Two access modes are supported: the anonymous public JSON listing,
//! and app-only OAuth with a client id and secret.

use civitas_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

pub const DEFAULT_PUBLIC_BASE_URL: &str = "https://www.reddit.com";
pub const DEFAULT_OAUTH_BASE_URL: &str = "https://oauth.reddit.com";
pub const DEFAULT_USER_AGENT: &str = "Civitas/0.1";
pub const DEFAULT_SUBREDDIT: &str = "confessions";
pub const DEFAULT_LIMIT: u32 = 5;

/// Refresh an app token this many seconds before it expires
const EXPIRY_SAFETY_WINDOW: i64 = 300;

/// How requests to Reddit are authenticated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedditAuth {
    /// Anonymous access to the public `.json` listings
    #[default]
    None,
    /// Client-credentials grant, client id and secret sent as HTTP basic auth
    BasicAuth,
}

/// Reddit section of the service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditConfig {
    #[serde(default)]
    pub auth: RedditAuth,

    #[serde(default = "default_client_id_env")]
    pub client_id_env: String,

    #[serde(default = "default_client_secret_env")]
    pub client_secret_env: String,

    /// Root for anonymous listings and the token endpoint
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Root for authenticated listings
    #[serde(default = "default_oauth_base_url")]
    pub oauth_base_url: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            auth: RedditAuth::default(),
            client_id_env: default_client_id_env(),
            client_secret_env: default_client_secret_env(),
            public_base_url: default_public_base_url(),
            oauth_base_url: default_oauth_base_url(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_client_id_env() -> String {
    "REDDIT_CLIENT_ID".to_string()
}

fn default_client_secret_env() -> String {
    "REDDIT_CLIENT_SECRET".to_string()
}

fn default_public_base_url() -> String {
    DEFAULT_PUBLIC_BASE_URL.to_string()
}

fn default_oauth_base_url() -> String {
    DEFAULT_OAUTH_BASE_URL.to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

/// One post as returned by `/api/fetch-reddit`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedditPost {
    pub title: String,
    pub text: String,
    pub author: String,
    pub subreddit: String,
    pub upvotes: i64,
    pub downvotes: i64,
    pub url: String,
    pub created_utc: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    children: Vec<ListingChild>,
}

#[derive(Debug, Deserialize)]
struct ListingChild {
    data: PostData,
}

#[derive(Debug, Default, Deserialize)]
struct PostData {
    title: Option<String>,
    selftext: Option<String>,
    author: Option<String>,
    subreddit: Option<String>,
    ups: Option<i64>,
    downs: Option<i64>,
    permalink: Option<String>,
    created_utc: Option<f64>,
}

impl From<PostData> for RedditPost {
    fn from(data: PostData) -> Self {
        Self {
            title: data.title.unwrap_or_else(|| "No title".to_string()),
            text: data.selftext.unwrap_or_default(),
            author: data.author.unwrap_or_else(|| "Unknown".to_string()),
            subreddit: data.subreddit.unwrap_or_else(|| "N/A".to_string()),
            upvotes: data.ups.unwrap_or(0),
            downvotes: data.downs.unwrap_or(0),
            url: format!(
                "{}{}",
                DEFAULT_PUBLIC_BASE_URL,
                data.permalink.unwrap_or_default()
            ),
            created_utc: data.created_utc,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    exp_unix: i64,
}

#[derive(Clone)]
struct ClientCredentials {
    id: String,
    secret: String,
}

/// Client for subreddit listings
pub struct RedditClient {
    config: RedditConfig,
    credentials: Option<ClientCredentials>,
    http: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl RedditClient {
    /// Build a client, reading credentials from the process environment
    pub fn new(config: RedditConfig, http: reqwest::Client) -> Result<Self> {
        Self::with_env(config, http, |name| std::env::var(name).ok())
    }

    /// Build a client, resolving credential variables through `lookup`
    pub fn with_env(
        config: RedditConfig,
        http: reqwest::Client,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let credentials = match config.auth {
            RedditAuth::None => None,
            RedditAuth::BasicAuth => {
                let id = lookup(&config.client_id_env)
                    .ok_or_else(|| Error::config(format!("{} is not set", config.client_id_env)))?;
                let secret = lookup(&config.client_secret_env).ok_or_else(|| {
                    Error::config(format!("{} is not set", config.client_secret_env))
                })?;
                Some(ClientCredentials { id, secret })
            }
        };

        Ok(Self {
            config,
            credentials,
            http,
            token: Mutex::new(None),
        })
    }

    /// Newest posts of `subreddit`, at most `limit` of them
    pub async fn fetch_new(&self, subreddit: &str, limit: u32) -> Result<Vec<RedditPost>> {
        let request = match &self.credentials {
            None => {
                let url = listing_url(&self.config.public_base_url, subreddit, "new.json")?;
                self.http.get(url)
            }
            Some(credentials) => {
                let token = self.access_token(credentials).await?;
                let url = listing_url(&self.config.oauth_base_url, subreddit, "new")?;
                self.http.get(url).bearer_auth(token)
            }
        };

        let response = request
            .header(reqwest::header::USER_AGENT, &self.config.user_agent)
            .query(&[("limit", limit)])
            .send()
            .await
            .map_err(|e| Error::upstream(format!("Reddit request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::upstream(format!("Reddit returned {}", status)));
        }

        let listing: Listing = response
            .json()
            .await
            .map_err(|e| Error::upstream(format!("Unexpected Reddit listing: {}", e)))?;

        let posts: Vec<RedditPost> = listing
            .data
            .children
            .into_iter()
            .map(|child| RedditPost::from(child.data))
            .collect();
        debug!("Fetched {} posts from r/{}", posts.len(), subreddit);
        Ok(posts)
    }

    async fn access_token(&self, credentials: &ClientCredentials) -> Result<String> {
        let mut cache = self.token.lock().await;
        let now = chrono::Utc::now().timestamp();

        if let Some(cached) = cache.as_ref() {
            if cached.exp_unix - EXPIRY_SAFETY_WINDOW > now {
                return Ok(cached.token.clone());
            }
        }

        let fresh = self.fetch_token(credentials, now).await?;
        let token = fresh.token.clone();
        *cache = Some(fresh);
        Ok(token)
    }

    async fn fetch_token(&self, credentials: &ClientCredentials, now: i64) -> Result<CachedToken> {
        let url = format!(
            "{}/api/v1/access_token",
            self.config.public_base_url.trim_end_matches('/')
        );
        let response = self
            .http
            .post(url)
            .basic_auth(&credentials.id, Some(&credentials.secret))
            .header(reqwest::header::USER_AGENT, &self.config.user_agent)
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| Error::upstream(format!("Reddit token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::upstream(format!(
                "Reddit token endpoint returned {}",
                status
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::upstream(format!("Invalid Reddit token response: {}", e)))?;
        debug!("Obtained Reddit app token valid for {}s", token.expires_in);

        Ok(CachedToken {
            token: token.access_token,
            exp_unix: now + token.expires_in,
        })
    }
}

/// `{base}/r/{subreddit}/{leaf}` with the subreddit percent-encoded as one segment
fn listing_url(base: &str, subreddit: &str, leaf: &str) -> Result<reqwest::Url> {
    let mut url = reqwest::Url::parse(base)
        .map_err(|e| Error::config(format!("Invalid Reddit base URL {}: {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| Error::config(format!("Reddit base URL {} cannot hold a path", base)))?
        .pop_if_empty()
        .extend(["r", subreddit, leaf]);
    Ok(url)
}
