// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Keyed storage for staged media files.
///
/// Existence of a key is the whole cache contract: stored files are never
/// re-validated.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Whether a file for `key` has already been stored
    async fn exists(&self, key: &str) -> bool;

    /// Open a writer for `key`. Nothing is visible under `key` until the
    /// writer is committed.
    async fn create(&self, key: &str) -> io::Result<Box<dyn StagingWriter>>;

    /// Local path a file for `key` lives (or will live) at
    fn path(&self, key: &str) -> PathBuf;
}

/// An in-progress write into a [`MediaStore`]
#[async_trait]
pub trait StagingWriter: Send {
    async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()>;

    /// Publish the written bytes under the key
    async fn commit(self: Box<Self>) -> io::Result<()>;

    /// Drop everything written so far
    async fn discard(self: Box<Self>) -> io::Result<()>;
}

/// Media store backed by a directory on the local filesystem
#[derive(Debug, Clone)]
pub struct FsStore {
    dir: PathBuf,
}

impl FsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Each write gets its own partial file, so two writers for one key
    /// never share a file.
    fn partial_path(&self, key: &str) -> PathBuf {
        let id = uuid::Uuid::new_v4().simple();
        self.dir.join(format!("{key}.{id}.partial"))
    }
}

#[async_trait]
impl MediaStore for FsStore {
    async fn exists(&self, key: &str) -> bool {
        tokio::fs::try_exists(self.path(key)).await.unwrap_or(false)
    }

    async fn create(&self, key: &str) -> io::Result<Box<dyn StagingWriter>> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let partial = self.partial_path(key);
        let file = File::create(&partial).await?;

        Ok(Box::new(FsWriter {
            file,
            partial,
            target: self.path(key),
        }))
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

/// Writes to a partial file next to the target and renames it on commit
struct FsWriter {
    file: File,
    partial: PathBuf,
    target: PathBuf,
}

#[async_trait]
impl StagingWriter for FsWriter {
    async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.file.write_all(chunk).await
    }

    async fn commit(self: Box<Self>) -> io::Result<()> {
        let FsWriter {
            mut file,
            partial,
            target,
        } = *self;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&partial, &target).await
    }

    async fn discard(self: Box<Self>) -> io::Result<()> {
        let FsWriter { file, partial, .. } = *self;
        drop(file);

        tokio::fs::remove_file(&partial).await
    }
}

/// In-memory media store, used where touching the disk is not wanted
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Arc<Mutex<HashMap<String, Bytes>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contents stored under `key`, if any
    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }
}

#[async_trait]
impl MediaStore for MemoryStore {
    async fn exists(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    async fn create(&self, key: &str) -> io::Result<Box<dyn StagingWriter>> {
        Ok(Box::new(MemoryWriter {
            files: Arc::clone(&self.files),
            key: key.to_string(),
            buffer: BytesMut::new(),
        }))
    }

    fn path(&self, key: &str) -> PathBuf {
        PathBuf::from("memory").join(key)
    }
}

struct MemoryWriter {
    files: Arc<Mutex<HashMap<String, Bytes>>>,
    key: String,
    buffer: BytesMut,
}

#[async_trait]
impl StagingWriter for MemoryWriter {
    async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.buffer.extend_from_slice(chunk);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> io::Result<()> {
        let MemoryWriter { files, key, buffer } = *self;
        files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key, buffer.freeze());
        Ok(())
    }

    async fn discard(self: Box<Self>) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn store_all(store: &dyn MediaStore, key: &str, chunks: &[&[u8]]) {
        let mut writer = store.create(key).await.unwrap();
        for chunk in chunks {
            writer.write_chunk(chunk).await.unwrap();
        }
        writer.commit().await.unwrap();
    }

    fn partial_files(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "partial"))
            .collect()
    }

    #[tokio::test]
    async fn fs_store_writes_and_detects_files() {
        let dir = tempdir().unwrap();
        let store = FsStore::new(dir.path());

        assert!(!store.exists("ep.mp3").await);

        store_all(&store, "ep.mp3", &[b"au", b"dio"]).await;

        assert!(store.exists("ep.mp3").await);
        assert_eq!(std::fs::read(store.path("ep.mp3")).unwrap(), b"audio");
        assert!(partial_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn fs_store_creates_missing_directory() {
        let dir = tempdir().unwrap();
        let store = FsStore::new(dir.path().join("nested").join("cache"));

        store_all(&store, "cover.jpg", &[b"jpeg"]).await;

        assert!(store.dir().join("cover.jpg").exists());
    }

    #[tokio::test]
    async fn fs_store_hides_uncommitted_writes() {
        let dir = tempdir().unwrap();
        let store = FsStore::new(dir.path());

        let mut writer = store.create("ep.mp3").await.unwrap();
        writer.write_chunk(b"half").await.unwrap();

        assert!(!store.exists("ep.mp3").await);
        assert_eq!(partial_files(dir.path()).len(), 1);

        writer.discard().await.unwrap();
        assert!(partial_files(dir.path()).is_empty());
        assert!(!store.exists("ep.mp3").await);
    }

    #[tokio::test]
    async fn fs_store_concurrent_writers_for_one_key_do_not_mix() {
        let dir = tempdir().unwrap();
        let store = FsStore::new(dir.path());

        let mut first = store.create("same.bin").await.unwrap();
        let mut second = store.create("same.bin").await.unwrap();
        first.write_chunk(b"aaaa").await.unwrap();
        second.write_chunk(b"bb").await.unwrap();
        first.write_chunk(b"aaaa").await.unwrap();
        second.write_chunk(b"bb").await.unwrap();
        first.commit().await.unwrap();
        second.commit().await.unwrap();

        // Last commit wins, and it is intact
        assert_eq!(std::fs::read(store.path("same.bin")).unwrap(), b"bbbb");
        assert!(partial_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryStore::new();

        assert!(!store.exists("a.mp3").await);
        store_all(&store, "a.mp3", &[b"x", b"y"]).await;

        assert!(store.exists("a.mp3").await);
        assert_eq!(store.get("a.mp3"), Some(Bytes::from_static(b"xy")));
        assert_eq!(store.path("a.mp3"), PathBuf::from("memory/a.mp3"));
    }

    #[tokio::test]
    async fn memory_store_discard_stores_nothing() {
        let store = MemoryStore::new();

        let mut writer = store.create("a.mp3").await.unwrap();
        writer.write_chunk(b"x").await.unwrap();
        writer.discard().await.unwrap();

        assert!(!store.exists("a.mp3").await);
    }
}
