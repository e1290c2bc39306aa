// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use url::Url;

use crate::error::FeedError;

/// Hard cap on episode title length, in characters
pub const MAX_TITLE_CHARS: usize = 100;

/// Represents a parsed podcast feed
#[derive(Debug, Clone)]
pub struct ParsedFeed {
    pub title: String,
    /// Valid episodes, in the feed's native order
    pub episodes: Vec<Episode>,
    /// Items that could not be turned into an episode
    pub skipped: Vec<SkippedItem>,
}

impl ParsedFeed {
    /// Number of items seen in the feed, valid or not
    pub fn total_items(&self) -> usize {
        self.episodes.len() + self.skipped.len()
    }
}

/// Represents a single podcast episode
#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub audio_url: Url,
    pub art_url: Option<Url>,
    pub episode_url: Option<String>,
    pub release_date: Option<DateTime<FixedOffset>>,
}

/// Diagnostic for a feed item that was dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    /// 1-based position among all items in the feed
    pub position: usize,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingTitle,
    MissingAudioUrl,
    InvalidAudioUrl(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingTitle => write!(f, "has no title"),
            SkipReason::MissingAudioUrl => write!(f, "has no audio url"),
            SkipReason::InvalidAudioUrl(url) => write!(f, "has an invalid audio url '{url}'"),
        }
    }
}

/// Parse RSS feed XML bytes into episodes and skip diagnostics
pub fn parse_feed(xml_bytes: &[u8]) -> Result<ParsedFeed, FeedError> {
    let channel = rss::Channel::read_from(xml_bytes)?;

    let mut episodes = Vec::new();
    let mut skipped = Vec::new();

    for (index, item) in channel.items().iter().enumerate() {
        match parse_episode(item) {
            Ok(episode) => episodes.push(episode),
            Err(reason) => {
                tracing::debug!(position = index + 1, %reason, "Dropping feed item");
                skipped.push(SkippedItem {
                    position: index + 1,
                    reason,
                });
            }
        }
    }

    Ok(ParsedFeed {
        title: channel.title().to_string(),
        episodes,
        skipped,
    })
}

fn parse_episode(item: &rss::Item) -> Result<Episode, SkipReason> {
    let title = item
        .title()
        .filter(|t| !t.is_empty())
        .ok_or(SkipReason::MissingTitle)?;

    let audio_url = item
        .enclosure()
        .map(|enclosure| enclosure.url())
        .filter(|url| !url.is_empty())
        .ok_or(SkipReason::MissingAudioUrl)?;
    let audio_url =
        Url::parse(audio_url).map_err(|_| SkipReason::InvalidAudioUrl(audio_url.to_string()))?;

    let art_url = item
        .itunes_ext()
        .and_then(|ext| ext.image())
        .and_then(|url| Url::parse(url).ok());

    Ok(Episode {
        title: truncate_title(title),
        description: strip_paragraphs(item.description().unwrap_or_default()),
        tags: item
            .categories()
            .iter()
            .map(|category| category.name().to_string())
            .collect(),
        audio_url,
        art_url,
        episode_url: item.link().filter(|l| !l.is_empty()).map(String::from),
        release_date: item.pub_date().and_then(parse_pub_date),
    })
}

/// Cut a title down to [`MAX_TITLE_CHARS`] characters
pub fn truncate_title(title: &str) -> String {
    match title.char_indices().nth(MAX_TITLE_CHARS) {
        Some((byte_index, _)) => title[..byte_index].to_string(),
        None => title.to_string(),
    }
}

/// Remove literal `<p>` and `</p>` tags; everything else is kept as-is
fn strip_paragraphs(description: &str) -> String {
    description.replace("<p>", "").replace("</p>", "")
}

/// Parse an RSS publish date, tolerating a few common non-RFC 2822 forms
fn parse_pub_date(date_str: &str) -> Option<DateTime<FixedOffset>> {
    const FORMATS: [&str; 3] = [
        "%a, %d %b %Y %H:%M:%S %z",
        "%Y-%m-%dT%H:%M:%S%:z",
        "%Y-%m-%d %H:%M:%S %z",
    ];

    let date_str = date_str.trim();
    DateTime::parse_from_rfc2822(date_str).ok().or_else(|| {
        FORMATS
            .iter()
            .find_map(|format| DateTime::parse_from_str(date_str, format).ok())
    })
}
