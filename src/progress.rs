use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Which of an episode's two media files an event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Artwork,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Artwork => write!(f, "artwork"),
        }
    }
}

/// Events emitted during a pipeline run for progress reporting
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Feed is being fetched from a URL or read from disk
    FetchingFeed { source: String },

    /// Feed has been parsed and episodes selected
    FeedParsed {
        podcast_title: String,
        total_items: usize,
        valid_episodes: usize,
        selected: usize,
    },

    /// A feed item was dropped because it lacks required fields
    ItemSkipped { position: usize, reason: String },

    /// Processing of one selected episode begins
    EpisodeStarting {
        /// Index of this episode in the selection
        episode_index: usize,
        /// Total number of selected episodes
        total: usize,
        title: String,
        audio_url: String,
        art_url: Option<String>,
        description: String,
    },

    /// A staged file already existed and is reused
    CacheHit { kind: MediaKind, path: PathBuf },

    /// A media download is starting
    DownloadStarting {
        kind: MediaKind,
        url: String,
        /// Expected content length in bytes, if known
        content_length: Option<u64>,
    },

    /// Download progress update
    DownloadProgress {
        kind: MediaKind,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    },

    /// A media download completed and was written to the cache
    DownloadCompleted {
        kind: MediaKind,
        path: PathBuf,
        bytes_downloaded: u64,
    },

    /// Artwork could not be staged; the episode continues without it
    ArtworkSkipped { error: String },

    /// An access token for the audio host was obtained
    Authenticated,

    /// Multipart upload is being sent
    UploadStarting { title: String, bytes: usize },

    /// Audio host answered the upload
    UploadCompleted { status: u16, body: String },

    /// A row was inserted into the wiki table
    WikiRowInserted { page: String, line: String },

    /// The wiki table could not be updated; discussion posting continues
    WikiUpdateFailed { page: String, error: String },

    /// Link post and distinguished comment were created
    DiscussionPosted { post_id: String },

    /// Discussion post failed for an episode that was already uploaded
    DiscussionFailed { title: String, error: String },

    /// An episode failed; the run continues with the next one
    EpisodeFailed { title: String, error: String },

    /// Pipeline run completed
    RunCompleted {
        processed_count: usize,
        skipped_count: usize,
        failed_count: usize,
    },
}

/// Trait for reporting progress events during a run.
///
/// Implementations can use this to display progress bars, log messages,
/// or collect statistics.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {
        // Intentionally empty
    }
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}

/// Reporter that keeps every event, for assertions in tests
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: std::sync::Mutex<Vec<ProgressEvent>>,
}

#[cfg(test)]
impl RecordingReporter {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl ProgressReporter for RecordingReporter {
    fn report(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}
