use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use console::Emoji;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use podcloud::{
    FileConfig, FsStore, MediaKind, NoopReporter, Overrides, Pipeline, ProgressEvent,
    ProgressReporter, RedditVenue, ReqwestClient, Settings, SharedProgressReporter,
    TrackPublisher, VenueUpdater,
};

// Emoji with fallback for terminals without Unicode support
static MICROPHONE: Emoji<'_, '_> = Emoji("🎙️  ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static HEADPHONES: Emoji<'_, '_> = Emoji("🎧 ", "[i] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static UPLOAD: Emoji<'_, '_> = Emoji("📤 ", "[^] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static WARNING: Emoji<'_, '_> = Emoji("⚠️  ", "[?] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

/// Publish podcast episodes from an RSS feed to an audio host and a subreddit wiki
#[derive(Parser, Debug)]
#[command(name = "podcloud")]
#[command(about = "Publish podcast episodes from an RSS feed to an audio host and a subreddit wiki")]
#[command(version)]
struct Args {
    /// RSS feed URL or path to local RSS file
    #[arg(short, long)]
    feed: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only process the newest episode
    #[arg(long, conflicts_with = "skip")]
    latest: bool,

    /// Skip the N oldest episodes
    #[arg(short, long)]
    skip: Option<usize>,

    /// Upload episodes to the audio host
    #[arg(long)]
    publish: bool,

    /// Audio host account name
    #[arg(long)]
    username: Option<String>,

    /// Audio host account password
    #[arg(long)]
    password: Option<String>,

    /// Use an existing access token instead of a password login
    #[arg(long)]
    access_token: Option<String>,

    /// Insert a row into the wiki table and post a discussion link
    #[arg(long)]
    wiki: bool,

    /// Subreddit whose wiki and front page are updated
    #[arg(long)]
    subreddit: Option<String>,

    /// Directory for staged media files
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Quiet mode - suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            feed: self.feed.clone(),
            cache_dir: self.cache_dir.clone(),
            latest: self.latest,
            skip: self.skip,
            publish: self.publish,
            username: self.username.clone(),
            password: self.password.clone(),
            access_token: self.access_token.clone(),
            wiki: self.wiki,
            subreddit: self.subreddit.clone(),
        }
    }
}

/// Progress reporter using indicatif for terminal output
struct IndicatifReporter {
    multi: MultiProgress,
    bars: Mutex<HashMap<MediaKind, ProgressBar>>,
    main_bar: ProgressBar,
}

impl IndicatifReporter {
    fn new() -> Self {
        let multi = MultiProgress::new();

        let main_style = ProgressStyle::default_bar()
            .template("{spinner:.green} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());

        let main_bar = multi.add(ProgressBar::new_spinner());
        main_bar.set_style(main_style);
        main_bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            multi,
            bars: Mutex::new(HashMap::new()),
            main_bar,
        }
    }

    fn get_or_create_bar(&self, kind: MediaKind) -> ProgressBar {
        let mut bars = self.bars.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(bar) = bars.get(&kind) {
            return bar.clone();
        }

        let style = ProgressStyle::default_bar()
            .template(&format!(
                "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} {{wide_msg}}"
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");

        let bar = self.multi.add(ProgressBar::new(0));
        bar.set_style(style);
        bar.set_message(kind.to_string());
        bars.insert(kind, bar.clone());
        bar
    }

    fn finish_bar(&self, kind: MediaKind) {
        let mut bars = self.bars.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(bar) = bars.remove(&kind) {
            bar.finish_and_clear();
        }
    }

    fn line(&self, message: String) {
        // A closed terminal is ignored
        let _ = self.multi.println(message);
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::FetchingFeed { source } => {
                self.main_bar
                    .set_message(format!("{SEARCH}Fetching feed: {}", source.cyan()));
            }

            ProgressEvent::FeedParsed {
                podcast_title,
                total_items,
                valid_episodes,
                selected,
            } => {
                self.line(format!(
                    "{HEADPHONES}{} • {} items, {} episodes, {} selected",
                    podcast_title.bold().green(),
                    total_items.to_string().cyan(),
                    valid_episodes.to_string().cyan(),
                    selected.to_string().yellow()
                ));
            }

            ProgressEvent::ItemSkipped { position, reason } => {
                self.line(format!(
                    "{WARNING}Skipping feed item {}: {}",
                    position.to_string().yellow(),
                    reason.dimmed()
                ));
            }

            ProgressEvent::EpisodeStarting {
                episode_index,
                total,
                title,
                audio_url,
                art_url,
                description,
            } => {
                self.main_bar.set_message(format!(
                    "[{}/{}] {}",
                    (episode_index + 1).to_string().cyan(),
                    total.to_string().cyan(),
                    truncate_title(&title, 40)
                ));
                self.line(format!("\n{}", title.bold()));
                self.line(format!("  audio: {}", audio_url.cyan()));
                if let Some(art_url) = art_url {
                    self.line(format!("  art:   {}", art_url.cyan()));
                }
                self.line(format!("  {}", truncate_title(&description, 70).dimmed()));
            }

            ProgressEvent::CacheHit { kind, path } => {
                self.line(format!(
                    "  {SUCCESS}Using cached {kind}: {}",
                    path.display().to_string().dimmed()
                ));
            }

            ProgressEvent::DownloadStarting {
                kind,
                content_length,
                ..
            } => {
                let bar = self.get_or_create_bar(kind);
                bar.set_length(content_length.unwrap_or(0));
                bar.set_position(0);
            }

            ProgressEvent::DownloadProgress {
                kind,
                bytes_downloaded,
                total_bytes,
            } => {
                let bar = self.get_or_create_bar(kind);
                if let Some(total) = total_bytes {
                    bar.set_length(total);
                }
                bar.set_position(bytes_downloaded);
            }

            ProgressEvent::DownloadCompleted {
                kind,
                path,
                bytes_downloaded,
            } => {
                self.finish_bar(kind);
                self.line(format!(
                    "  {SUCCESS}Staged {kind} ({} bytes): {}",
                    bytes_downloaded,
                    path.display().to_string().dimmed()
                ));
            }

            ProgressEvent::ArtworkSkipped { error } => {
                self.finish_bar(MediaKind::Artwork);
                self.line(format!(
                    "  {WARNING}Continuing without artwork: {}",
                    error.yellow()
                ));
            }

            ProgressEvent::Authenticated => {
                self.line(format!("{SUCCESS}Authenticated with audio host"));
            }

            ProgressEvent::UploadStarting { title, bytes } => {
                self.main_bar.set_message(format!(
                    "{UPLOAD}Uploading {} ({} bytes)",
                    truncate_title(&title, 40),
                    bytes
                ));
            }

            ProgressEvent::UploadCompleted { status, body } => {
                self.line(format!(
                    "  {UPLOAD}Upload answered {}",
                    status.to_string().green()
                ));
                tracing::debug!(status, body = %body, "Upload response");
            }

            ProgressEvent::WikiRowInserted { page, line } => {
                self.line(format!(
                    "  {SUCCESS}Wiki page {} updated: {}",
                    page.cyan(),
                    truncate_title(&line, 50).dimmed()
                ));
            }

            ProgressEvent::WikiUpdateFailed { page, error } => {
                self.line(format!(
                    "  {WARNING}Wiki page {} not updated: {}",
                    page.cyan(),
                    error.yellow()
                ));
            }

            ProgressEvent::DiscussionPosted { post_id } => {
                self.line(format!("  {SUCCESS}Discussion posted: {}", post_id.cyan()));
            }

            ProgressEvent::DiscussionFailed { title, error } => {
                self.line(format!(
                    "  {WARNING}{} published, but no discussion post: {}",
                    truncate_title(&title, 30).yellow(),
                    error.yellow()
                ));
            }

            ProgressEvent::EpisodeFailed { title, error } => {
                self.finish_bar(MediaKind::Audio);
                self.finish_bar(MediaKind::Artwork);
                self.line(format!(
                    "  {FAILURE}{} - {}",
                    truncate_title(&title, 30).red(),
                    error.red()
                ));
            }

            ProgressEvent::RunCompleted {
                processed_count,
                skipped_count,
                failed_count,
            } => {
                self.main_bar.finish_and_clear();
                println!(
                    "\n{PARTY}{} {} processed, {} skipped, {} failed",
                    "Run complete:".bold().green(),
                    processed_count.to_string().green().bold(),
                    skipped_count.to_string().yellow(),
                    if failed_count > 0 {
                        failed_count.to_string().red().bold()
                    } else {
                        failed_count.to_string().green()
                    }
                );
            }
        }
    }
}

fn truncate_title(title: &str, max_chars: usize) -> String {
    if title.chars().count() <= max_chars {
        title.to_string()
    } else {
        let head: String = title.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{head}...")
    }
}

/// Warning shown when the run would neither publish nor touch the wiki
fn idle_notice(settings: &Settings) -> Option<&'static str> {
    if settings.publish.is_none() && settings.wiki.is_none() {
        Some("Neither publishing nor wiki updates are enabled, only listing episodes")
    } else {
        None
    }
}

fn init_tracing(quiet: bool) {
    let default_level = if quiet { "error" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.quiet);

    if !args.quiet {
        println!(
            "\n{}{} {}\n",
            MICROPHONE,
            "podcloud".bold().magenta(),
            "- Podcast Publisher".dimmed()
        );
    }

    let file_config = match &args.config {
        Some(path) => FileConfig::load(path).context("Failed to load configuration")?,
        None => FileConfig::default(),
    };
    let settings =
        Settings::resolve(file_config, args.overrides()).context("Invalid configuration")?;

    if let Some(notice) = idle_notice(&settings).filter(|_| !args.quiet) {
        println!("{WARNING}{}\n", notice.yellow());
    }

    let client = ReqwestClient::new().context("Failed to create HTTP client")?;
    let store = FsStore::new(&settings.cache_dir);

    let reporter: SharedProgressReporter = if args.quiet {
        NoopReporter::shared()
    } else {
        Arc::new(IndicatifReporter::new())
    };

    let venue = match &settings.wiki {
        Some(wiki) => Some(
            RedditVenue::login(&wiki.credentials, &wiki.subreddit)
                .await
                .context("Failed to log in to reddit")?,
        ),
        None => None,
    };

    let mut pipeline = Pipeline::new(&client, store, reporter.clone());

    if let Some(publish) = &settings.publish {
        let publisher = TrackPublisher::new(&client, publish.credentials.clone(), reporter.clone())
            .with_api_base(&publish.api_base)
            .with_genre(&publish.genre);
        pipeline = pipeline.with_publisher(publisher);
    }

    if let (Some(venue), Some(wiki)) = (&venue, &settings.wiki) {
        let updater = VenueUpdater::new(venue, reporter.clone())
            .with_page(&wiki.page)
            .with_separator(&wiki.separator);
        pipeline = pipeline.with_venue(updater);
    }

    let result = pipeline
        .run(&settings.feed, settings.policy)
        .await
        .context("Failed to run pipeline")?;

    if !args.quiet && !result.failed.is_empty() {
        println!("\n{}", "Failed episodes:".red().bold());
        for (title, error) in &result.failed {
            println!("  {}{} - {}", CROSS, title.yellow(), error.dimmed());
        }
    }

    let venue_failures = result.venue_failures();
    if !args.quiet && !venue_failures.is_empty() {
        println!("\n{}", "Published without discussion post:".yellow().bold());
        for (title, error) in venue_failures {
            println!("  {}{} - {}", CROSS, title.yellow(), error.dimmed());
        }
    }

    if !args.quiet {
        println!(
            "\n{FOLDER}Cache: {}\n",
            settings.cache_dir.display().to_string().cyan()
        );
    }

    if !result.failed.is_empty() && result.processed.is_empty() {
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(args: &[&str]) -> Settings {
        let args = Args::parse_from(args);
        Settings::resolve(FileConfig::default(), args.overrides()).unwrap()
    }

    #[test]
    fn listing_only_run_is_announced() {
        let settings = settings(&["podcloud", "--feed", "feed.xml"]);
        assert!(idle_notice(&settings).is_some());
    }

    #[test]
    fn publishing_run_needs_no_notice() {
        let settings = settings(&[
            "podcloud",
            "--feed",
            "feed.xml",
            "--publish",
            "--access-token",
            "t",
        ]);
        assert!(idle_notice(&settings).is_none());
    }

    #[test]
    fn latest_and_skip_conflict() {
        let result = Args::try_parse_from(["podcloud", "--latest", "--skip", "2"]);
        assert!(result.is_err());
    }

    #[test]
    fn truncate_title_counts_chars() {
        assert_eq!(truncate_title("short", 10), "short");
        assert_eq!(truncate_title("ééééééééééé", 6), "ééé...");
    }
}
