// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::error::{EpisodeError, PipelineError};
use crate::feed::{Episode, SkippedItem, load_feed};
use crate::http::HttpClient;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::publish::{AccessToken, TrackPublisher};
use crate::select::{SelectionPolicy, select};
use crate::stage::{MediaStager, MediaStore};
use crate::wiki::{VenueOutcome, VenueUpdater};

/// What happened to one selected episode
#[derive(Debug, Clone)]
pub struct EpisodeReport {
    pub title: String,
    /// Upload accepted by the audio host
    pub published: bool,
    /// Outcome in the wiki/discussion venue, when enabled
    pub venue: Option<VenueOutcome>,
    /// Venue failure after a successful upload; the episode still counts
    pub venue_error: Option<String>,
}

/// Result of a pipeline run
#[derive(Debug, Clone, Default)]
pub struct RunResult {
    /// Episodes processed without error, in processing order
    pub processed: Vec<EpisodeReport>,
    /// Feed items dropped during parsing
    pub skipped: Vec<SkippedItem>,
    /// Details of failed episodes (title, error message)
    pub failed: Vec<(String, String)>,
}

impl RunResult {
    pub fn published_count(&self) -> usize {
        self.processed.iter().filter(|r| r.published).count()
    }

    /// Published episodes whose discussion post failed (title, error message)
    pub fn venue_failures(&self) -> Vec<(&str, &str)> {
        self.processed
            .iter()
            .filter_map(|r| Some((r.title.as_str(), r.venue_error.as_deref()?)))
            .collect()
    }
}

/// Drives feed → selection → staging/publishing → venue, one episode at a time
pub struct Pipeline<'a, C: HttpClient, S: MediaStore> {
    client: &'a C,
    stager: MediaStager<'a, C, S>,
    publisher: Option<TrackPublisher<'a, C>>,
    venue: Option<VenueUpdater<'a>>,
    reporter: SharedProgressReporter,
}

impl<'a, C: HttpClient, S: MediaStore> Pipeline<'a, C, S> {
    pub fn new(client: &'a C, store: S, reporter: SharedProgressReporter) -> Self {
        Self {
            client,
            stager: MediaStager::new(client, store, reporter.clone()),
            publisher: None,
            venue: None,
            reporter,
        }
    }

    /// Stage and upload every selected episode
    pub fn with_publisher(mut self, publisher: TrackPublisher<'a, C>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Record every selected episode in the wiki/discussion venue
    pub fn with_venue(mut self, venue: VenueUpdater<'a>) -> Self {
        self.venue = Some(venue);
        self
    }

    /// Run the pipeline once.
    ///
    /// Only an unreadable feed or a failed token exchange abort the run;
    /// per-episode failures are reported and the next episode is processed.
    pub async fn run(
        &self,
        feed_source: &str,
        policy: SelectionPolicy,
    ) -> Result<RunResult, PipelineError> {
        self.reporter.report(ProgressEvent::FetchingFeed {
            source: feed_source.to_string(),
        });

        let feed = load_feed(self.client, feed_source).await?;
        let total_items = feed.total_items();
        let valid_episodes = feed.episodes.len();

        for skipped in &feed.skipped {
            self.reporter.report(ProgressEvent::ItemSkipped {
                position: skipped.position,
                reason: skipped.reason.to_string(),
            });
        }

        let selected = select(feed.episodes, policy);
        let total = selected.len();

        self.reporter.report(ProgressEvent::FeedParsed {
            podcast_title: feed.title,
            total_items,
            valid_episodes,
            selected: total,
        });

        let mut result = RunResult {
            skipped: feed.skipped,
            ..Default::default()
        };

        let token = match &self.publisher {
            Some(publisher) if total > 0 => Some(publisher.authenticate().await?),
            _ => None,
        };

        for (episode_index, episode) in selected.into_iter().enumerate() {
            self.reporter.report(ProgressEvent::EpisodeStarting {
                episode_index,
                total,
                title: episode.title.clone(),
                audio_url: episode.audio_url.to_string(),
                art_url: episode.art_url.as_ref().map(|u| u.to_string()),
                description: episode.description.clone(),
            });

            match self.process_episode(&episode, token.as_ref()).await {
                Ok(report) => result.processed.push(report),
                Err(e) => {
                    tracing::warn!(title = %episode.title, error = %e, "Episode failed");
                    self.reporter.report(ProgressEvent::EpisodeFailed {
                        title: episode.title.clone(),
                        error: e.to_string(),
                    });
                    result.failed.push((episode.title, e.to_string()));
                }
            }
        }

        self.reporter.report(ProgressEvent::RunCompleted {
            processed_count: result.processed.len(),
            skipped_count: result.skipped.len(),
            failed_count: result.failed.len(),
        });

        Ok(result)
    }

    async fn process_episode(
        &self,
        episode: &Episode,
        token: Option<&AccessToken>,
    ) -> Result<EpisodeReport, EpisodeError> {
        let published = match (&self.publisher, token) {
            (Some(publisher), Some(token)) => {
                let staged = self.stager.stage(episode).await?;
                publisher.publish(episode, &staged, token).await?;
                true
            }
            _ => false,
        };

        let mut report = EpisodeReport {
            title: episode.title.clone(),
            published,
            venue: None,
            venue_error: None,
        };

        if let Some(updater) = &self.venue {
            match updater.record(episode).await {
                Ok(outcome) => report.venue = Some(outcome),
                // The upload cannot be undone, so the episode stays published
                Err(e) if published => {
                    tracing::warn!(title = %episode.title, error = %e, "Discussion post failed");
                    self.reporter.report(ProgressEvent::DiscussionFailed {
                        title: episode.title.clone(),
                        error: e.to_string(),
                    });
                    report.venue_error = Some(e.to_string());
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(report)
    }
}
