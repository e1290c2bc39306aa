use std::path::{Path, PathBuf};

use futures::StreamExt;
use url::Url;

use crate::error::StageError;
use crate::feed::Episode;
use crate::http::{HttpClient, HttpResponse};
use crate::progress::{MediaKind, ProgressEvent, SharedProgressReporter};

use super::key::cache_key;
use super::store::{MediaStore, StagingWriter};

/// Local copies of an episode's media, ready for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedMedia {
    pub audio_path: PathBuf,
    pub art_path: Option<PathBuf>,
}

/// Downloads episode media into a [`MediaStore`], reusing files already there
pub struct MediaStager<'a, C: HttpClient, S: MediaStore> {
    client: &'a C,
    store: S,
    reporter: SharedProgressReporter,
}

impl<'a, C: HttpClient, S: MediaStore> MediaStager<'a, C, S> {
    pub fn new(client: &'a C, store: S, reporter: SharedProgressReporter) -> Self {
        Self {
            client,
            store,
            reporter,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Stage audio and (if present) artwork for an episode.
    ///
    /// Both transfers run concurrently. An audio failure fails the episode;
    /// an artwork failure is reported and the episode goes on without art.
    pub async fn stage(&self, episode: &Episode) -> Result<StagedMedia, StageError> {
        let audio = self.stage_url(&episode.audio_url, MediaKind::Audio);

        let (audio_path, art_path) = match &episode.art_url {
            Some(art_url) => {
                let (audio, art) =
                    tokio::join!(audio, self.stage_url(art_url, MediaKind::Artwork));
                let audio_path = audio?;

                let art_path = match art {
                    Ok(path) => Some(path),
                    Err(e) => {
                        tracing::warn!(url = %art_url, error = %e, "Artwork staging failed");
                        self.reporter.report(ProgressEvent::ArtworkSkipped {
                            error: e.to_string(),
                        });
                        None
                    }
                };

                (audio_path, art_path)
            }
            None => (audio.await?, None),
        };

        Ok(StagedMedia {
            audio_path,
            art_path,
        })
    }

    async fn stage_url(&self, url: &Url, kind: MediaKind) -> Result<PathBuf, StageError> {
        let key = cache_key(url).ok_or_else(|| StageError::NoFileName {
            url: url.to_string(),
        })?;
        let path = self.store.path(&key);

        if self.store.exists(&key).await {
            tracing::debug!(%url, path = %path.display(), "Reusing staged file");
            self.reporter.report(ProgressEvent::CacheHit { kind, path: path.clone() });
            return Ok(path);
        }

        let response = self
            .client
            .get_stream(url.as_str())
            .await
            .map_err(|e| StageError::HttpFailed {
                url: url.to_string(),
                source: e,
            })?;

        if response.status >= 400 {
            return Err(StageError::HttpStatus {
                url: url.to_string(),
                status: response.status,
            });
        }

        self.reporter.report(ProgressEvent::DownloadStarting {
            kind,
            url: url.to_string(),
            content_length: response.content_length,
        });

        let write_failed = |e: std::io::Error| StageError::FileWriteFailed {
            path: path.clone(),
            source: e,
        };

        let mut writer = self.store.create(&key).await.map_err(write_failed)?;

        let copied = self
            .copy_body(url, kind, response, writer.as_mut(), &path)
            .await;
        let bytes_downloaded = match copied {
            Ok(bytes) => bytes,
            Err(e) => {
                if let Err(cleanup) = writer.discard().await {
                    tracing::debug!(%url, error = %cleanup, "Could not remove partial file");
                }
                return Err(e);
            }
        };

        writer.commit().await.map_err(write_failed)?;

        self.reporter.report(ProgressEvent::DownloadCompleted {
            kind,
            path: path.clone(),
            bytes_downloaded,
        });

        Ok(path)
    }

    /// Stream a response body into `writer` chunk by chunk, reporting progress
    async fn copy_body(
        &self,
        url: &Url,
        kind: MediaKind,
        response: HttpResponse,
        writer: &mut dyn StagingWriter,
        path: &Path,
    ) -> Result<u64, StageError> {
        let total_bytes = response.content_length;
        let mut bytes_downloaded: u64 = 0;
        let mut stream = response.body;

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| StageError::StreamFailed {
                url: url.to_string(),
                source: e,
            })?;

            writer
                .write_chunk(&chunk)
                .await
                .map_err(|e| StageError::FileWriteFailed {
                    path: path.to_path_buf(),
                    source: e,
                })?;

            bytes_downloaded += chunk.len() as u64;

            self.reporter.report(ProgressEvent::DownloadProgress {
                kind,
                bytes_downloaded,
                total_bytes,
            });
        }

        Ok(bytes_downloaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{NoopReporter, RecordingReporter};
    use crate::stage::{FsStore, MemoryStore};
    use crate::test_support::MockHttpClient;
    use bytes::Bytes;
    use std::sync::Arc;
    use tempfile::tempdir;

    const AUDIO_URL: &str = "https://example.com/media/episode.mp3";
    const ART_URL: &str = "https://example.com/media/cover.jpg";

    fn make_episode(art: Option<&str>) -> Episode {
        Episode {
            title: "Test Episode".to_string(),
            description: String::new(),
            tags: vec![],
            audio_url: Url::parse(AUDIO_URL).unwrap(),
            art_url: art.map(|a| Url::parse(a).unwrap()),
            episode_url: None,
            release_date: None,
        }
    }

    #[tokio::test]
    async fn stage_downloads_audio_and_artwork() {
        let client = MockHttpClient::new()
            .route(AUDIO_URL, "test audio content")
            .route(ART_URL, "jpeg");
        let stager = MediaStager::new(&client, MemoryStore::new(), NoopReporter::shared());

        let staged = stager.stage(&make_episode(Some(ART_URL))).await.unwrap();

        assert_eq!(staged.audio_path, PathBuf::from("memory/episode.mp3"));
        assert_eq!(staged.art_path, Some(PathBuf::from("memory/cover.jpg")));
        assert_eq!(
            stager.store().get("episode.mp3"),
            Some(Bytes::from_static(b"test audio content"))
        );
        assert_eq!(stager.store().get("cover.jpg"), Some(Bytes::from_static(b"jpeg")));
    }

    #[tokio::test]
    async fn stage_without_artwork_leaves_art_path_empty() {
        let client = MockHttpClient::new().route(AUDIO_URL, "audio");
        let stager = MediaStager::new(&client, MemoryStore::new(), NoopReporter::shared());

        let staged = stager.stage(&make_episode(None)).await.unwrap();

        assert!(staged.art_path.is_none());
        assert_eq!(client.get_count(ART_URL), 0);
    }

    #[tokio::test]
    async fn stage_twice_fetches_once() {
        let client = MockHttpClient::new()
            .route(AUDIO_URL, "audio")
            .route(ART_URL, "jpeg");
        let reporter = Arc::new(RecordingReporter::default());
        let stager = MediaStager::new(&client, MemoryStore::new(), reporter.clone());
        let episode = make_episode(Some(ART_URL));

        let first = stager.stage(&episode).await.unwrap();
        let second = stager.stage(&episode).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(client.get_count(AUDIO_URL), 1);
        assert_eq!(client.get_count(ART_URL), 1);

        let hits = reporter
            .events()
            .iter()
            .filter(|e| matches!(e, ProgressEvent::CacheHit { .. }))
            .count();
        assert_eq!(hits, 2);
    }

    #[tokio::test]
    async fn stage_reuses_files_from_previous_runs() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("episode.mp3"), b"from last run").unwrap();

        let client = MockHttpClient::new().route(AUDIO_URL, "fresh");
        let stager = MediaStager::new(&client, FsStore::new(dir.path()), NoopReporter::shared());

        let staged = stager.stage(&make_episode(None)).await.unwrap();

        assert_eq!(staged.audio_path, dir.path().join("episode.mp3"));
        assert_eq!(client.get_count(AUDIO_URL), 0);
        assert_eq!(std::fs::read(&staged.audio_path).unwrap(), b"from last run");
    }

    #[tokio::test]
    async fn stage_fails_on_audio_http_error() {
        let client = MockHttpClient::new()
            .route_status(AUDIO_URL, 404)
            .route(ART_URL, "jpeg");
        let stager = MediaStager::new(&client, MemoryStore::new(), NoopReporter::shared());

        let result = stager.stage(&make_episode(Some(ART_URL))).await;

        match result.unwrap_err() {
            StageError::HttpStatus { status, .. } => assert_eq!(status, 404),
            other => panic!("Expected HttpStatus error, got {other:?}"),
        }
        assert!(!stager.store().exists("episode.mp3").await);
    }

    #[tokio::test]
    async fn stage_continues_without_broken_artwork() {
        let client = MockHttpClient::new()
            .route(AUDIO_URL, "audio")
            .route_status(ART_URL, 500);
        let reporter = Arc::new(RecordingReporter::default());
        let stager = MediaStager::new(&client, MemoryStore::new(), reporter.clone());

        let staged = stager.stage(&make_episode(Some(ART_URL))).await.unwrap();

        assert!(staged.art_path.is_none());
        assert!(
            reporter
                .events()
                .iter()
                .any(|e| matches!(e, ProgressEvent::ArtworkSkipped { .. }))
        );
    }

    #[tokio::test]
    async fn stage_rejects_url_without_file_name() {
        let client = MockHttpClient::new();
        let stager = MediaStager::new(&client, MemoryStore::new(), NoopReporter::shared());
        let mut episode = make_episode(None);
        episode.audio_url = Url::parse("https://example.com/").unwrap();

        let result = stager.stage(&episode).await;
        assert!(matches!(result, Err(StageError::NoFileName { .. })));
    }

    #[tokio::test]
    async fn stage_ignores_bogus_content_length() {
        let client = MockHttpClient::new()
            .route(AUDIO_URL, "tiny")
            .content_length(AUDIO_URL, u64::MAX);
        let reporter = Arc::new(RecordingReporter::default());
        let stager = MediaStager::new(&client, MemoryStore::new(), reporter.clone());

        stager.stage(&make_episode(None)).await.unwrap();

        assert_eq!(stager.store().get("episode.mp3"), Some(Bytes::from_static(b"tiny")));
        assert!(reporter.events().iter().any(|e| matches!(
            e,
            ProgressEvent::DownloadCompleted {
                bytes_downloaded: 4,
                ..
            }
        )));
    }

    #[tokio::test]
    async fn stage_streams_chunks_to_disk() {
        let dir = tempdir().unwrap();
        let client = MockHttpClient::new().route_chunks(AUDIO_URL, &["ab", "cd", "ef"]);
        let reporter = Arc::new(RecordingReporter::default());
        let stager = MediaStager::new(&client, FsStore::new(dir.path()), reporter.clone());

        let staged = stager.stage(&make_episode(None)).await.unwrap();

        assert_eq!(std::fs::read(&staged.audio_path).unwrap(), b"abcdef");
        let progress: Vec<u64> = reporter
            .events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::DownloadProgress {
                    bytes_downloaded, ..
                } => Some(bytes_downloaded),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![2, 4, 6]);
    }
}
