// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use async_trait::async_trait;

use crate::error::WikiError;
use crate::feed::Episode;
use crate::progress::{ProgressEvent, SharedProgressReporter};

use super::patch::{DEFAULT_SEPARATOR, edit_reason, patch_table, table_row};

/// Wiki page the episode table lives on unless configured otherwise
pub const DEFAULT_WIKI_PAGE: &str = "episodes";

/// Identifier of a submitted link post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostId(pub String);

/// Identifier of a comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentId(pub String);

/// Community wiki and discussion venue
#[async_trait]
pub trait WikiVenue: Send + Sync {
    /// Current markdown content of a wiki page
    async fn wiki_page(&self, page: &str) -> Result<String, WikiError>;

    /// Replace a wiki page's content
    async fn edit_wiki_page(&self, page: &str, content: &str, reason: &str)
    -> Result<(), WikiError>;

    /// Submit a link post
    async fn submit_link(&self, title: &str, url: &str) -> Result<PostId, WikiError>;

    /// Reply to a post
    async fn comment(&self, post: &PostId, text: &str) -> Result<CommentId, WikiError>;

    /// Mark a comment as distinguished (moderator)
    async fn distinguish(&self, comment: &CommentId) -> Result<(), WikiError>;
}

/// Result of recording one episode in the venue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VenueOutcome {
    pub table_updated: bool,
    pub post: PostId,
}

/// Records episodes in the venue: a table row on the wiki page, then a
/// link post with a distinguished comment carrying the description.
///
/// Table update failures never block the discussion post.
pub struct VenueUpdater<'a> {
    venue: &'a dyn WikiVenue,
    page: String,
    separator: String,
    reporter: SharedProgressReporter,
}

impl<'a> VenueUpdater<'a> {
    pub fn new(venue: &'a dyn WikiVenue, reporter: SharedProgressReporter) -> Self {
        Self {
            venue,
            page: DEFAULT_WIKI_PAGE.to_string(),
            separator: DEFAULT_SEPARATOR.to_string(),
            reporter,
        }
    }

    pub fn with_page(mut self, page: impl Into<String>) -> Self {
        self.page = page.into();
        self
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub async fn record(&self, episode: &Episode) -> Result<VenueOutcome, WikiError> {
        let table_updated = match self.update_table(episode).await {
            Ok(line) => {
                self.reporter.report(ProgressEvent::WikiRowInserted {
                    page: self.page.clone(),
                    line,
                });
                true
            }
            Err(e) => {
                tracing::warn!(page = %self.page, error = %e, "Wiki table update failed");
                self.reporter.report(ProgressEvent::WikiUpdateFailed {
                    page: self.page.clone(),
                    error: e.to_string(),
                });
                false
            }
        };

        let link = episode
            .episode_url
            .clone()
            .unwrap_or_else(|| episode.audio_url.to_string());

        let post = self.venue.submit_link(&episode.title, &link).await?;
        let comment = self.venue.comment(&post, &episode.description).await?;
        self.venue.distinguish(&comment).await?;

        self.reporter.report(ProgressEvent::DiscussionPosted {
            post_id: post.0.clone(),
        });

        Ok(VenueOutcome {
            table_updated,
            post,
        })
    }

    /// Fetch, patch and save the table; returns the inserted line
    pub async fn update_table(&self, episode: &Episode) -> Result<String, WikiError> {
        let current = self.venue.wiki_page(&self.page).await?;
        let row = table_row(episode);
        let patched = patch_table(&current, &self.separator, &row)?;

        self.venue
            .edit_wiki_page(&self.page, &patched, &edit_reason(&episode.title))
            .await?;

        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{NoopReporter, RecordingReporter};
    use crate::test_support::{FakeVenue, VenueCall};
    use std::sync::Arc;
    use url::Url;

    const PAGE: &str = "Title|Released|Description|Download\n---|---|---|---\nold row";

    fn make_episode() -> Episode {
        Episode {
            title: "Ep1".to_string(),
            description: "Full\ndescription".to_string(),
            tags: vec![],
            audio_url: Url::parse("http://x/1.mp3").unwrap(),
            art_url: None,
            episode_url: Some("http://x/1".to_string()),
            release_date: None,
        }
    }

    #[tokio::test]
    async fn record_updates_table_then_posts() {
        let venue = FakeVenue::with_page(PAGE);
        let updater = VenueUpdater::new(&venue, NoopReporter::shared());

        let outcome = updater.record(&make_episode()).await.unwrap();

        assert!(outcome.table_updated);
        assert_eq!(
            venue.content(),
            "Title|Released|Description|Download\n---|---|---|---\n\
             [Ep1](http://x/1)||Fulldescription|[Mp3](http://x/1.mp3)\nold row"
        );
        assert_eq!(
            venue.calls(),
            vec![
                VenueCall::GetPage("episodes".to_string()),
                VenueCall::Edit {
                    page: "episodes".to_string(),
                    reason: "Ep1".to_string(),
                },
                VenueCall::Submit {
                    title: "Ep1".to_string(),
                    url: "http://x/1".to_string(),
                },
                VenueCall::Comment {
                    post: "t3_1".to_string(),
                    text: "Full\ndescription".to_string(),
                },
                VenueCall::Distinguish("t1_1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn missing_separator_still_posts() {
        let venue = FakeVenue::with_page("no table yet");
        let reporter = Arc::new(RecordingReporter::default());
        let updater = VenueUpdater::new(&venue, reporter.clone());

        let outcome = updater.record(&make_episode()).await.unwrap();

        assert!(!outcome.table_updated);
        assert_eq!(venue.content(), "no table yet");
        let calls = venue.calls();
        assert!(!calls.iter().any(|c| matches!(c, VenueCall::Edit { .. })));
        assert!(calls.iter().any(|c| matches!(c, VenueCall::Submit { .. })));
        assert!(calls.iter().any(|c| matches!(c, VenueCall::Distinguish(_))));
        assert!(
            reporter
                .events()
                .iter()
                .any(|e| matches!(e, ProgressEvent::WikiUpdateFailed { .. }))
        );
    }

    #[tokio::test]
    async fn failed_save_still_posts() {
        let venue = FakeVenue::with_page(PAGE).failing_edits();
        let updater = VenueUpdater::new(&venue, NoopReporter::shared());

        let outcome = updater.record(&make_episode()).await.unwrap();

        assert!(!outcome.table_updated);
        assert_eq!(outcome.post, PostId("t3_1".to_string()));
    }

    #[tokio::test]
    async fn link_falls_back_to_audio_url() {
        let venue = FakeVenue::with_page(PAGE);
        let updater = VenueUpdater::new(&venue, NoopReporter::shared());
        let mut episode = make_episode();
        episode.episode_url = None;

        updater.record(&episode).await.unwrap();

        assert!(venue.calls().contains(&VenueCall::Submit {
            title: "Ep1".to_string(),
            url: "http://x/1.mp3".to_string(),
        }));
    }

    #[tokio::test]
    async fn custom_page_and_separator() {
        let venue = FakeVenue::with_page("a\n:--|:--|:--|:--\nb");
        let updater = VenueUpdater::new(&venue, NoopReporter::shared())
            .with_page("changelog")
            .with_separator(":--|:--|:--|:--");

        let line = updater.update_table(&make_episode()).await.unwrap();

        assert_eq!(venue.content(), format!("a\n:--|:--|:--|:--\n{line}\nb"));
        assert_eq!(venue.calls()[0], VenueCall::GetPage("changelog".to_string()));
    }
}
