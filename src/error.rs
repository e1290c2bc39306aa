// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when fetching or parsing RSS feeds
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to fetch feed from {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to read feed file {path}: {source}")]
    FileReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse RSS feed: {0}")]
    ParseFailed(#[from] rss::Error),
}

/// Errors that can occur while staging an episode's media locally
#[derive(Error, Debug)]
pub enum StageError {
    #[error("Cannot derive a file name from {url}")]
    NoFileName { url: String },

    #[error("HTTP request failed for {url}: {source}")]
    HttpFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Stream error while downloading {url}: {source}")]
    StreamFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to write to file {path}: {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur when publishing to the audio host
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Token request to {url} failed: {source}")]
    TokenRequestFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Token request rejected with HTTP {status}: {body}")]
    TokenRejected { status: u16, body: String },

    #[error("Token response could not be decoded: {0}")]
    TokenDecodeFailed(#[from] serde_json::Error),

    #[error("Failed to read staged file {path}: {source}")]
    FileReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Upload to {url} failed: {source}")]
    UploadFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Upload rejected with HTTP {status}: {body}")]
    UploadRejected { status: u16, body: String },

    #[error("Invalid endpoint URL: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
}

/// Errors raised by the wiki/discussion venue
#[derive(Error, Debug)]
pub enum WikiError {
    #[error("Separator line '{separator}' not found in wiki page")]
    SeparatorNotFound { separator: String },

    #[error("{operation} request failed: {source}")]
    HttpFailed {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation} failed with HTTP {status}")]
    HttpStatus {
        operation: &'static str,
        status: u16,
    },

    #[error("{operation} returned errors: {message}")]
    Api {
        operation: &'static str,
        message: String,
    },

    #[error("{operation} returned an unexpected response: {source}")]
    UnexpectedResponse {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors produced while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML in config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Missing required configuration field: {0}")]
    MissingField(&'static str),
}

/// Failure of a single episode; the run continues with the next one
#[derive(Error, Debug)]
pub enum EpisodeError {
    #[error("Staging failed: {0}")]
    Stage(#[from] StageError),

    #[error("Publishing failed: {0}")]
    Publish(#[from] PublishError),

    #[error("Discussion post failed: {0}")]
    Wiki(#[from] WikiError),
}

/// Top-level errors that abort a pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Authentication failed: {0}")]
    Auth(#[from] PublishError),
}
