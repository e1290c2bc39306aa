// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;

use serde::Deserialize;
use url::Url;

use crate::error::PublishError;
use crate::feed::Episode;
use crate::http::HttpClient;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::stage::StagedMedia;

use super::request::{DEFAULT_GENRE, build_publish_request};

/// Default base URL of the audio-hosting API
pub const DEFAULT_API_BASE: &str = "https://api.soundcloud.com";

/// OAuth access token for the audio host
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

/// How to obtain an access token
#[derive(Clone)]
pub enum Credentials {
    /// OAuth2 password grant
    Password {
        client_id: String,
        client_secret: String,
        username: String,
        password: String,
    },
    /// Pre-supplied token, no exchange needed
    Token(AccessToken),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Password {
                client_id,
                username,
                ..
            } => f
                .debug_struct("Password")
                .field("client_id", client_id)
                .field("client_secret", &"[REDACTED]")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            Credentials::Token(token) => f.debug_tuple("Token").field(token).finish(),
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// What the audio host answered to an upload
#[derive(Debug, Clone)]
pub struct UploadReceipt {
    pub status: u16,
    pub body: String,
}

/// Publishes staged episodes as tracks on the audio host
pub struct TrackPublisher<'a, C: HttpClient> {
    client: &'a C,
    credentials: Credentials,
    api_base: String,
    genre: String,
    reporter: SharedProgressReporter,
}

impl<'a, C: HttpClient> TrackPublisher<'a, C> {
    pub fn new(client: &'a C, credentials: Credentials, reporter: SharedProgressReporter) -> Self {
        Self {
            client,
            credentials,
            api_base: DEFAULT_API_BASE.to_string(),
            genre: DEFAULT_GENRE.to_string(),
            reporter,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = genre.into();
        self
    }

    /// Obtain an access token, exchanging the password grant if needed
    pub async fn authenticate(&self) -> Result<AccessToken, PublishError> {
        let (client_id, client_secret, username, password) = match &self.credentials {
            Credentials::Token(token) => return Ok(token.clone()),
            Credentials::Password {
                client_id,
                client_secret,
                username,
                password,
            } => (client_id, client_secret, username, password),
        };

        let url = format!("{}/oauth2/token", self.api_base);
        let response = self
            .client
            .post_form(
                &url,
                &[
                    ("client_id", client_id.as_str()),
                    ("client_secret", client_secret.as_str()),
                    ("grant_type", "password"),
                    ("username", username.as_str()),
                    ("password", password.as_str()),
                ],
            )
            .await
            .map_err(|e| PublishError::TokenRequestFailed {
                url: url.clone(),
                source: e,
            })?;

        if !response.is_success() {
            return Err(PublishError::TokenRejected {
                status: response.status,
                body: response.text(),
            });
        }

        let token: TokenResponse = serde_json::from_slice(&response.body)?;
        self.reporter.report(ProgressEvent::Authenticated);

        Ok(AccessToken::new(token.access_token))
    }

    /// Upload one staged episode as a public podcast track
    pub async fn publish(
        &self,
        episode: &Episode,
        staged: &StagedMedia,
        token: &AccessToken,
    ) -> Result<UploadReceipt, PublishError> {
        let request = build_publish_request(episode, staged, token, &self.genre).await?;
        let body = request.encode();

        let mut url = Url::parse(&format!("{}/tracks", self.api_base))?;
        url.query_pairs_mut()
            .append_pair("oauth_token", token.secret());

        self.reporter.report(ProgressEvent::UploadStarting {
            title: episode.title.clone(),
            bytes: body.len(),
        });

        let response = self
            .client
            .post_body(url.as_str(), &request.content_type(), body)
            .await
            .map_err(|e| PublishError::UploadFailed {
                url: format!("{}/tracks", self.api_base),
                source: e,
            })?;

        let receipt = UploadReceipt {
            status: response.status,
            body: response.text(),
        };

        self.reporter.report(ProgressEvent::UploadCompleted {
            status: receipt.status,
            body: receipt.body.clone(),
        });

        if !response.is_success() {
            return Err(PublishError::UploadRejected {
                status: receipt.status,
                body: receipt.body,
            });
        }

        Ok(receipt)
    }
}
