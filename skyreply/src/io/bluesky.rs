//! Bluesky (AT Protocol) client over blocking XRPC calls.

use std::cell::RefCell;
use std::env;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::core::types::RawPost;
use crate::io::config::BlueskyConfig;
use crate::io::media::ImageAttachment;
use crate::io::network::{ActionReport, SocialNetwork};

const POST_COLLECTION: &str = "app.bsky.feed.post";
const LIKE_COLLECTION: &str = "app.bsky.feed.like";
const IMAGES_EMBED: &str = "app.bsky.embed.images";

/// Authenticated session returned by `createSession`.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Session {
    access_jwt: String,
    did: String,
}

/// XRPC error body, e.g. `{"error": "ExpiredToken", "message": "..."}`.
#[derive(Debug, Default, Deserialize)]
struct XrpcError {
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StrongRef {
    uri: String,
    cid: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ReplyRefs {
    root: StrongRef,
    parent: StrongRef,
}

#[derive(Debug, Deserialize)]
struct TimelineResponse {
    #[serde(default)]
    feed: Vec<FeedViewPost>,
}

#[derive(Debug, Deserialize)]
struct FeedViewPost {
    post: PostView,
}

#[derive(Debug, Deserialize)]
struct PostsResponse {
    #[serde(default)]
    posts: Vec<PostView>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostView {
    uri: String,
    cid: String,
    author: Author,
    #[serde(default)]
    record: Value,
    indexed_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Author {
    handle: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BlobResponse {
    blob: Value,
}

#[derive(Debug, Deserialize)]
struct CreatedRecord {
    uri: String,
}

impl PostView {
    fn into_raw(self) -> RawPost {
        let text = self
            .record
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let author = self
            .author
            .display_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(self.author.handle);
        RawPost {
            address: self.uri,
            author,
            text,
            observed_at: self.indexed_at,
        }
    }

    /// Root and parent refs for replying to this post.
    ///
    /// Keeps the thread root when the post is itself a reply.
    fn reply_refs(&self) -> ReplyRefs {
        let parent = StrongRef {
            uri: self.uri.clone(),
            cid: self.cid.clone(),
        };
        let root = self
            .record
            .get("reply")
            .and_then(|reply| reply.get("root"))
            .and_then(|root| serde_json::from_value::<StrongRef>(root.clone()).ok())
            .unwrap_or_else(|| parent.clone());
        ReplyRefs { root, parent }
    }
}

/// XRPC client bound to one account.
///
/// The session is created on first use and reused until the server reports
/// it expired; then the client logs in again and retries that call once.
pub struct BlueskyClient {
    service: String,
    identifier: String,
    password: String,
    client: Client,
    session: RefCell<Option<Session>>,
}

impl BlueskyClient {
    /// Build from config, reading credentials from the configured variables.
    pub fn from_config(config: &BlueskyConfig) -> Result<Self> {
        let identifier = env::var(&config.handle_env)
            .with_context(|| format!("read Bluesky handle from ${}", config.handle_env))?;
        let password = env::var(&config.password_env)
            .with_context(|| format!("read Bluesky password from ${}", config.password_env))?;
        Self::new(
            &config.service,
            identifier,
            password,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn new(
        service: &str,
        identifier: String,
        password: String,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("build bluesky http client")?;
        Ok(Self {
            service: service.trim_end_matches('/').to_string(),
            identifier,
            password,
            client,
            session: RefCell::new(None),
        })
    }

    fn xrpc_url(&self, method: &str) -> String {
        format!("{}/xrpc/{method}", self.service)
    }

    #[instrument(skip_all, fields(identifier = %self.identifier))]
    fn session(&self) -> Result<Session> {
        if let Some(session) = self.session.borrow().as_ref() {
            return Ok(session.clone());
        }
        info!("creating bluesky session");
        let response = self
            .client
            .post(self.xrpc_url("com.atproto.server.createSession"))
            .json(&json!({ "identifier": self.identifier, "password": self.password }))
            .send()
            .context("send createSession")?;
        let session: Session = read_json(response, "createSession")?;
        *self.session.borrow_mut() = Some(session.clone());
        Ok(session)
    }

    /// Send an authenticated request built by `build`.
    ///
    /// An expired or rejected token drops the cached session; the request is
    /// rebuilt and sent once more under a fresh one.
    fn send_authed<F>(&self, method: &str, build: F) -> Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let session = self.session()?;
        let response = build(&self.client)
            .bearer_auth(&session.access_jwt)
            .send()
            .with_context(|| format!("send {method}"))?;
        let status = response.status();
        if status != StatusCode::UNAUTHORIZED && status != StatusCode::BAD_REQUEST {
            return Ok(response);
        }

        let body = response.text().unwrap_or_default();
        if !is_expired_session(status, &body) {
            warn!(%status, method, "xrpc call failed");
            return Err(xrpc_failure(method, status, &body));
        }
        info!(method, %status, "bluesky session expired, logging in again");
        self.session.borrow_mut().take();
        let session = self.session()?;
        build(&self.client)
            .bearer_auth(&session.access_jwt)
            .send()
            .with_context(|| format!("send {method} after new login"))
    }

    fn get_json<T: DeserializeOwned>(&self, method: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = self.xrpc_url(method);
        let response = self.send_authed(method, |client| client.get(&url).query(query))?;
        read_json(response, method)
    }

    fn post_json<T: DeserializeOwned>(&self, method: &str, body: &Value) -> Result<T> {
        let url = self.xrpc_url(method);
        let response = self.send_authed(method, |client| client.post(&url).json(body))?;
        read_json(response, method)
    }

    fn resolve(&self, target: &str) -> Result<PostView> {
        ensure_post_uri(target)?;
        let response: PostsResponse = self.get_json("app.bsky.feed.getPosts", &[("uris", target)])?;
        response
            .posts
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("post not found: {target}"))
    }

    fn create_record(&self, collection: &str, record: Value) -> Result<CreatedRecord> {
        let did = self.session()?.did;
        self.post_json(
            "com.atproto.repo.createRecord",
            &json!({ "repo": did, "collection": collection, "record": record }),
        )
    }

    fn upload_blob(&self, image: &ImageAttachment) -> Result<Value> {
        let method = "com.atproto.repo.uploadBlob";
        let url = self.xrpc_url(method);
        let response = self.send_authed(method, |client| {
            client
                .post(&url)
                .header(reqwest::header::CONTENT_TYPE, image.mime.as_str())
                .body(image.bytes.clone())
        })?;
        let uploaded: BlobResponse = read_json(response, method)?;
        Ok(uploaded.blob)
    }
}

impl SocialNetwork for BlueskyClient {
    #[instrument(skip_all, fields(limit = limit))]
    fn fetch_timeline(&self, limit: u32) -> Result<Vec<RawPost>> {
        let limit = limit.to_string();
        let timeline: TimelineResponse =
            self.get_json("app.bsky.feed.getTimeline", &[("limit", limit.as_str())])?;
        let posts: Vec<RawPost> = timeline
            .feed
            .into_iter()
            .map(|item| item.post.into_raw())
            .collect();
        debug!(count = posts.len(), "fetched timeline");
        Ok(posts)
    }

    #[instrument(skip_all, fields(with_image = image.is_some()))]
    fn post(&self, text: &str, image: Option<&ImageAttachment>) -> Result<ActionReport> {
        let embed = match image {
            Some(image) => Some(images_embed(self.upload_blob(image)?, &image.alt)),
            None => None,
        };
        let created = self.create_record(POST_COLLECTION, post_record(text, None, embed))?;
        info!(uri = %created.uri, "posted");
        let message = if image.is_some() {
            "Posted with image successfully"
        } else {
            "Posted successfully"
        };
        Ok(ActionReport::new(message))
    }

    #[instrument(skip_all)]
    fn reply(&self, target: &str, text: &str) -> Result<ActionReport> {
        let original = self.resolve(target)?;
        let record = post_record(text, Some(original.reply_refs()), None);
        let created = self.create_record(POST_COLLECTION, record)?;
        info!(uri = %created.uri, "reply posted");
        Ok(ActionReport::new("Reply posted successfully"))
    }

    #[instrument(skip_all)]
    fn like(&self, target: &str) -> Result<ActionReport> {
        let original = self.resolve(target)?;
        let record = json!({
            "$type": LIKE_COLLECTION,
            "subject": { "uri": original.uri, "cid": original.cid },
            "createdAt": now_timestamp(),
        });
        self.create_record(LIKE_COLLECTION, record)?;
        Ok(ActionReport::new("Post liked successfully"))
    }
}

fn read_json<T: DeserializeOwned>(response: Response, method: &str) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        warn!(%status, method, "xrpc call failed");
        return Err(xrpc_failure(method, status, &body));
    }
    response
        .json()
        .with_context(|| format!("parse {method} response"))
}

fn xrpc_failure(method: &str, status: StatusCode, body: &str) -> anyhow::Error {
    anyhow!("{method} failed with {status}: {}", body.trim())
}

/// 401, or 400 carrying `ExpiredToken`/`InvalidToken`.
fn is_expired_session(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::UNAUTHORIZED {
        return true;
    }
    let parsed: XrpcError = serde_json::from_str(body).unwrap_or_default();
    status == StatusCode::BAD_REQUEST
        && matches!(parsed.error.as_deref(), Some("ExpiredToken" | "InvalidToken"))
}

/// Reject addresses that are not `at://<repo>/<collection>/<rkey>`.
fn ensure_post_uri(target: &str) -> Result<()> {
    let valid = target.starts_with("at://") && target.split('/').count() >= 5;
    if !valid {
        return Err(anyhow!("invalid post URI format: {target}"));
    }
    Ok(())
}

fn post_record(text: &str, reply: Option<ReplyRefs>, embed: Option<Value>) -> Value {
    let mut record = json!({
        "$type": POST_COLLECTION,
        "text": text,
        "createdAt": now_timestamp(),
    });
    if let Some(reply) = reply {
        record["reply"] = json!({ "root": reply.root, "parent": reply.parent });
    }
    if let Some(embed) = embed {
        record["embed"] = embed;
    }
    record
}

fn images_embed(blob: Value, alt: &str) -> Value {
    json!({
        "$type": IMAGES_EMBED,
        "images": [{ "alt": alt, "image": blob }],
    })
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
