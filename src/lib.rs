pub mod config;
pub mod error;
pub mod feed;
pub mod http;
pub mod pipeline;
pub mod progress;
pub mod publish;
pub mod select;
pub mod stage;
pub mod wiki;

#[cfg(test)]
mod test_support;

// Re-export main types for convenience
pub use config::{FileConfig, Overrides, Settings};
pub use error::{
    ConfigError, EpisodeError, FeedError, PipelineError, PublishError, StageError, WikiError,
};
pub use feed::{Episode, ParsedFeed, is_url, load_feed, parse_feed};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use pipeline::{EpisodeReport, Pipeline, RunResult};
pub use progress::{
    MediaKind, NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter,
};
pub use publish::{AccessToken, Credentials, TrackPublisher};
pub use select::{SelectionPolicy, select};
pub use stage::{FsStore, MediaStager, MediaStore, StagedMedia};
pub use wiki::{RedditCredentials, RedditVenue, VenueUpdater, WikiVenue};
