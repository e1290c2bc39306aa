//! Run configuration: an optional TOML file, overridden by command-line values.
//!
//! Everything is validated into [`Settings`] before any network activity, so a
//! missing credential fails the process up front with the field's name.
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::publish::{AccessToken, Credentials, DEFAULT_API_BASE, DEFAULT_GENRE};
use crate::select::SelectionPolicy;
use crate::wiki::{DEFAULT_SEPARATOR, DEFAULT_WIKI_PAGE, RedditCredentials};

// ============================================================================
// File configuration
// ============================================================================

/// Contents of the TOML config file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Feed URL or local path
    pub feed: Option<String>,
    /// Directory staged media is cached in
    pub cache_dir: Option<PathBuf>,
    pub selection: SelectionSection,
    pub publish: PublishSection,
    pub wiki: WikiSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SelectionSection {
    /// Publish only the newest episode
    pub latest: bool,
    /// Number of oldest episodes to skip
    pub skip: Option<usize>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct PublishSection {
    pub enabled: bool,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub access_token: Option<String>,
    pub genre: Option<String>,
    pub api_base: Option<String>,
}

impl fmt::Debug for PublishSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishSection")
            .field("enabled", &self.enabled)
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("access_token", &redact(&self.access_token))
            .field("genre", &self.genre)
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct WikiSection {
    pub enabled: bool,
    pub subreddit: Option<String>,
    pub page: Option<String>,
    pub separator: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub app_id: Option<String>,
    pub app_secret: Option<String>,
    pub user_agent: Option<String>,
}

impl fmt::Debug for WikiSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WikiSection")
            .field("enabled", &self.enabled)
            .field("subreddit", &self.subreddit)
            .field("page", &self.page)
            .field("separator", &self.separator)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("app_id", &self.app_id)
            .field("app_secret", &redact(&self.app_secret))
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

fn redact(secret: &Option<String>) -> Option<&'static str> {
    secret.as_ref().map(|_| "[REDACTED]")
}

impl FileConfig {
    /// Load configuration from a TOML file.
    ///
    /// Unlike optional dotfiles, a file named on the command line must exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::FileNotFound(path.to_path_buf()));
            }
            Err(e) => {
                return Err(ConfigError::ReadFailed {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        };

        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = ["feed", "cache_dir", "selection", "publish", "wiki"];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: FileConfig = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }
}

// ============================================================================
// Command-line overrides
// ============================================================================

/// Values given on the command line; each one wins over the file
#[derive(Default)]
pub struct Overrides {
    pub feed: Option<String>,
    pub cache_dir: Option<PathBuf>,
    pub latest: bool,
    pub skip: Option<usize>,
    pub publish: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub access_token: Option<String>,
    pub wiki: bool,
    pub subreddit: Option<String>,
}

// ============================================================================
// Resolved settings
// ============================================================================

#[derive(Debug, Clone)]
pub struct PublishSettings {
    pub credentials: Credentials,
    pub genre: String,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct WikiSettings {
    pub subreddit: String,
    pub page: String,
    pub separator: String,
    pub credentials: RedditCredentials,
}

/// Fully validated configuration for one run
#[derive(Debug, Clone)]
pub struct Settings {
    pub feed: String,
    pub policy: SelectionPolicy,
    pub cache_dir: PathBuf,
    /// Present when publishing to the audio host is enabled
    pub publish: Option<PublishSettings>,
    /// Present when the wiki/discussion update is enabled
    pub wiki: Option<WikiSettings>,
}

impl Settings {
    pub fn resolve(file: FileConfig, overrides: Overrides) -> Result<Self, ConfigError> {
        let feed = overrides
            .feed
            .or(file.feed)
            .ok_or(ConfigError::MissingField("feed"))?;

        let policy = if overrides.latest || (file.selection.latest && overrides.skip.is_none()) {
            SelectionPolicy::Latest
        } else {
            SelectionPolicy::SkipFromOldest(overrides.skip.or(file.selection.skip).unwrap_or(0))
        };

        let cache_dir = overrides
            .cache_dir
            .or(file.cache_dir)
            .unwrap_or_else(std::env::temp_dir);

        let publish = if overrides.publish || file.publish.enabled {
            Some(resolve_publish(
                file.publish,
                overrides.username,
                overrides.password,
                overrides.access_token,
            )?)
        } else {
            None
        };

        let wiki = if overrides.wiki || file.wiki.enabled {
            Some(resolve_wiki(file.wiki, overrides.subreddit)?)
        } else {
            None
        };

        Ok(Self {
            feed,
            policy,
            cache_dir,
            publish,
            wiki,
        })
    }
}

fn resolve_publish(
    section: PublishSection,
    username: Option<String>,
    password: Option<String>,
    access_token: Option<String>,
) -> Result<PublishSettings, ConfigError> {
    let credentials = match access_token.or(section.access_token) {
        Some(token) => Credentials::Token(AccessToken::new(token)),
        None => Credentials::Password {
            client_id: section
                .client_id
                .ok_or(ConfigError::MissingField("publish.client_id"))?,
            client_secret: section
                .client_secret
                .ok_or(ConfigError::MissingField("publish.client_secret"))?,
            username: username
                .or(section.username)
                .ok_or(ConfigError::MissingField("publish.username"))?,
            password: password
                .or(section.password)
                .ok_or(ConfigError::MissingField("publish.password"))?,
        },
    };

    Ok(PublishSettings {
        credentials,
        genre: section.genre.unwrap_or_else(|| DEFAULT_GENRE.to_string()),
        api_base: section
            .api_base
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
    })
}

fn resolve_wiki(section: WikiSection, subreddit: Option<String>) -> Result<WikiSettings, ConfigError> {
    let subreddit = subreddit
        .or(section.subreddit)
        .ok_or(ConfigError::MissingField("wiki.subreddit"))?;
    let username = section
        .username
        .ok_or(ConfigError::MissingField("wiki.username"))?;

    let user_agent = section.user_agent.unwrap_or_else(|| {
        format!(
            "podcloud/{} (by u/{username})",
            env!("CARGO_PKG_VERSION")
        )
    });

    Ok(WikiSettings {
        subreddit,
        page: section
            .page
            .unwrap_or_else(|| DEFAULT_WIKI_PAGE.to_string()),
        separator: section
            .separator
            .unwrap_or_else(|| DEFAULT_SEPARATOR.to_string()),
        credentials: RedditCredentials {
            password: section
                .password
                .ok_or(ConfigError::MissingField("wiki.password"))?,
            app_id: section
                .app_id
                .ok_or(ConfigError::MissingField("wiki.app_id"))?,
            app_secret: section
                .app_secret
                .ok_or(ConfigError::MissingField("wiki.app_secret"))?,
            username,
            user_agent,
        },
    })
}

// ============================================================================
// Tests
// ============================================================================
