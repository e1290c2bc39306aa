// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::WikiError;
use crate::http::encode_form;

use super::venue::{CommentId, PostId, WikiVenue};

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_BASE: &str = "https://oauth.reddit.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Script-app credentials for a bot account
#[derive(Clone)]
pub struct RedditCredentials {
    pub username: String,
    pub password: String,
    pub app_id: String,
    pub app_secret: String,
    pub user_agent: String,
}

impl fmt::Debug for RedditCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedditCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("app_id", &self.app_id)
            .field("app_secret", &"[REDACTED]")
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct WikiPageResponse {
    data: WikiPageData,
}

#[derive(Deserialize)]
struct WikiPageData {
    content_md: String,
}

/// `{"json": {"errors": [...], "data": {...}}}` wrapper used with `api_type=json`
#[derive(Deserialize)]
struct ApiEnvelope<T> {
    json: ApiBody<T>,
}

#[derive(Deserialize)]
struct ApiBody<T> {
    #[serde(default)]
    errors: Vec<serde_json::Value>,
    data: Option<T>,
}

#[derive(Deserialize)]
struct SubmitData {
    name: String,
}

#[derive(Deserialize)]
struct CommentData {
    things: Vec<Thing>,
}

#[derive(Deserialize)]
struct Thing {
    data: ThingData,
}

#[derive(Deserialize)]
struct ThingData {
    name: String,
}

/// A subreddit's wiki and front page, accessed through the OAuth API
pub struct RedditVenue {
    client: reqwest::Client,
    token: String,
    subreddit: String,
}

impl RedditVenue {
    /// Authenticate the bot account and bind to a subreddit
    pub async fn login(
        credentials: &RedditCredentials,
        subreddit: impl Into<String>,
    ) -> Result<Self, WikiError> {
        let client = reqwest::Client::builder()
            .user_agent(credentials.user_agent.as_str())
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| http_failed("login", e))?;

        let request = token_request(&client, credentials)?;
        let response = client
            .execute(request)
            .await
            .map_err(|e| http_failed("login", e))?;

        let token: TokenResponse = read_json("login", response).await?;
        let token = match (token.access_token, token.error) {
            (Some(token), _) => token,
            (None, error) => {
                return Err(WikiError::Api {
                    operation: "login",
                    message: error.unwrap_or_else(|| "no access token returned".to_string()),
                });
            }
        };

        tracing::debug!(username = %credentials.username, "Logged in to reddit");

        Ok(Self {
            client,
            token,
            subreddit: subreddit.into(),
        })
    }

    fn get_request(
        &self,
        operation: &'static str,
        path: &str,
    ) -> Result<reqwest::Request, WikiError> {
        self.client
            .get(format!("{API_BASE}{path}"))
            .bearer_auth(&self.token)
            .build()
            .map_err(|e| http_failed(operation, e))
    }

    fn post_request(
        &self,
        operation: &'static str,
        path: &str,
        fields: &[(&str, &str)],
    ) -> Result<reqwest::Request, WikiError> {
        self.client
            .post(format!("{API_BASE}{path}"))
            .bearer_auth(&self.token)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(encode_form(fields))
            .build()
            .map_err(|e| http_failed(operation, e))
    }

    fn wiki_page_request(&self, page: &str) -> Result<reqwest::Request, WikiError> {
        let path = format!("/r/{}/wiki/{}?raw_json=1", self.subreddit, page);
        self.get_request("wiki page", &path)
    }

    fn wiki_edit_request(
        &self,
        page: &str,
        content: &str,
        reason: &str,
    ) -> Result<reqwest::Request, WikiError> {
        let path = format!("/r/{}/api/wiki/edit", self.subreddit);
        self.post_request(
            "wiki edit",
            &path,
            &[("page", page), ("content", content), ("reason", reason)],
        )
    }

    fn submit_request(&self, title: &str, url: &str) -> Result<reqwest::Request, WikiError> {
        self.post_request(
            "link submit",
            "/api/submit",
            &[
                ("api_type", "json"),
                ("kind", "link"),
                ("sr", self.subreddit.as_str()),
                ("title", title),
                ("url", url),
                ("resubmit", "true"),
            ],
        )
    }

    fn comment_request(&self, post: &PostId, text: &str) -> Result<reqwest::Request, WikiError> {
        self.post_request(
            "comment",
            "/api/comment",
            &[("api_type", "json"), ("thing_id", post.0.as_str()), ("text", text)],
        )
    }

    fn distinguish_request(&self, comment: &CommentId) -> Result<reqwest::Request, WikiError> {
        self.post_request(
            "distinguish",
            "/api/distinguish",
            &[("api_type", "json"), ("id", comment.0.as_str()), ("how", "yes")],
        )
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: reqwest::Request,
    ) -> Result<T, WikiError> {
        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| http_failed(operation, e))?;

        read_json(operation, response).await
    }
}

/// Password-grant token request for a script app
fn token_request(
    client: &reqwest::Client,
    credentials: &RedditCredentials,
) -> Result<reqwest::Request, WikiError> {
    let body = encode_form(&[
        ("grant_type", "password"),
        ("username", credentials.username.as_str()),
        ("password", credentials.password.as_str()),
    ]);

    client
        .post(TOKEN_URL)
        .basic_auth(&credentials.app_id, Some(&credentials.app_secret))
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(body)
        .build()
        .map_err(|e| http_failed("login", e))
}

#[async_trait]
impl WikiVenue for RedditVenue {
    async fn wiki_page(&self, page: &str) -> Result<String, WikiError> {
        let request = self.wiki_page_request(page)?;
        let response: WikiPageResponse = self.send("wiki page", request).await?;
        Ok(response.data.content_md)
    }

    async fn edit_wiki_page(
        &self,
        page: &str,
        content: &str,
        reason: &str,
    ) -> Result<(), WikiError> {
        let request = self.wiki_edit_request(page, content, reason)?;
        let _: serde_json::Value = self.send("wiki edit", request).await?;
        Ok(())
    }

    async fn submit_link(&self, title: &str, url: &str) -> Result<PostId, WikiError> {
        let request = self.submit_request(title, url)?;
        let envelope: ApiEnvelope<SubmitData> = self.send("link submit", request).await?;

        let data = api_data("link submit", envelope)?;
        Ok(PostId(data.name))
    }

    async fn comment(&self, post: &PostId, text: &str) -> Result<CommentId, WikiError> {
        let request = self.comment_request(post, text)?;
        let envelope: ApiEnvelope<CommentData> = self.send("comment", request).await?;

        let data = api_data("comment", envelope)?;
        data.things
            .into_iter()
            .next()
            .map(|thing| CommentId(thing.data.name))
            .ok_or(WikiError::Api {
                operation: "comment",
                message: "no comment returned".to_string(),
            })
    }

    async fn distinguish(&self, comment: &CommentId) -> Result<(), WikiError> {
        let request = self.distinguish_request(comment)?;
        let envelope: ApiEnvelope<serde_json::Value> = self.send("distinguish", request).await?;

        api_errors("distinguish", &envelope.json.errors)
    }
}

fn http_failed(operation: &'static str, source: reqwest::Error) -> WikiError {
    WikiError::HttpFailed { operation, source }
}

async fn read_json<T: DeserializeOwned>(
    operation: &'static str,
    response: reqwest::Response,
) -> Result<T, WikiError> {
    let status = response.status();
    if !status.is_success() {
        return Err(WikiError::HttpStatus {
            operation,
            status: status.as_u16(),
        });
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| http_failed(operation, e))?;
    decode(operation, &body)
}

fn decode<T: DeserializeOwned>(operation: &'static str, body: &[u8]) -> Result<T, WikiError> {
    serde_json::from_slice(body).map_err(|e| WikiError::UnexpectedResponse {
        operation,
        source: e,
    })
}

fn api_errors(operation: &'static str, errors: &[serde_json::Value]) -> Result<(), WikiError> {
    if errors.is_empty() {
        return Ok(());
    }

    let message = errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    Err(WikiError::Api { operation, message })
}

fn api_data<T>(operation: &'static str, envelope: ApiEnvelope<T>) -> Result<T, WikiError> {
    api_errors(operation, &envelope.json.errors)?;
    envelope.json.data.ok_or(WikiError::Api {
        operation,
        message: "response carried no data".to_string(),
    })
}
