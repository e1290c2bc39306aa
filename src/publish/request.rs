// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::PublishError;
use crate::feed::Episode;
use crate::stage::StagedMedia;

use super::client::AccessToken;

/// Genre label sent with every track unless configured otherwise
pub const DEFAULT_GENRE: &str = "Storytelling";

pub const AUDIO_PART: &str = "track[asset_data]";
pub const ARTWORK_PART: &str = "track[artwork_data]";

/// A binary part of the upload
#[derive(Debug, Clone)]
pub struct FilePart {
    pub name: &'static str,
    pub filename: String,
    pub data: Bytes,
}

/// Multipart track upload: text fields followed by binary parts
#[derive(Debug, Clone)]
pub struct PublishRequest {
    boundary: String,
    fields: Vec<(&'static str, String)>,
    files: Vec<FilePart>,
}

impl PublishRequest {
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the `Content-Type` header
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|(name, _)| *name).collect()
    }

    pub fn file(&self, name: &str) -> Option<&FilePart> {
        self.files.iter().find(|part| part.name == name)
    }

    pub fn files(&self) -> &[FilePart] {
        &self.files
    }

    /// Encode as a `multipart/form-data` body
    pub fn encode(&self) -> Bytes {
        let file_bytes: usize = self.files.iter().map(|f| f.data.len()).sum();
        let mut body = BytesMut::with_capacity(file_bytes + 256 * (self.fields.len() + 2));

        for (name, value) in &self.fields {
            body.put_slice(format!("--{}\r\n", self.boundary).as_bytes());
            body.put_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            );
            body.put_slice(value.as_bytes());
            body.put_slice(b"\r\n");
        }

        for part in &self.files {
            body.put_slice(format!("--{}\r\n", self.boundary).as_bytes());
            body.put_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    part.name,
                    escape_filename(&part.filename)
                )
                .as_bytes(),
            );
            body.put_slice(b"Content-Type: application/octet-stream\r\n\r\n");
            body.put_slice(&part.data);
            body.put_slice(b"\r\n");
        }

        body.put_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        body.freeze()
    }
}

/// Join tags with single spaces, quoting any tag that contains whitespace
pub fn tag_list(tags: &[String]) -> String {
    tags.iter()
        .map(|tag| {
            if tag.chars().any(char::is_whitespace) {
                format!("\"{tag}\"")
            } else {
                tag.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Assemble the upload for one staged episode.
///
/// Fails only if a staged file cannot be read back from disk.
pub async fn build_publish_request(
    episode: &Episode,
    staged: &StagedMedia,
    token: &AccessToken,
    genre: &str,
) -> Result<PublishRequest, PublishError> {
    let fields = vec![
        ("oauth_token", token.secret().to_string()),
        ("track[title]", episode.title.clone()),
        ("track[description]", episode.description.clone()),
        ("track[tag_list]", tag_list(&episode.tags)),
        ("track[genre]", genre.to_string()),
        ("track[sharing]", "public".to_string()),
        ("track[track_type]", "podcast".to_string()),
    ];

    let mut files = vec![read_part(AUDIO_PART, &staged.audio_path).await?];
    if let Some(art_path) = &staged.art_path {
        files.push(read_part(ARTWORK_PART, art_path).await?);
    }

    Ok(PublishRequest {
        boundary: uuid::Uuid::new_v4().simple().to_string(),
        fields,
        files,
    })
}

async fn read_part(name: &'static str, path: &Path) -> Result<FilePart, PublishError> {
    let data = tokio::fs::read(path)
        .await
        .map_err(|e| PublishError::FileReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(FilePart {
        name,
        filename,
        data: Bytes::from(data),
    })
}

fn escape_filename(filename: &str) -> String {
    filename
        .replace('"', "%22")
        .replace(['\r', '\n'], "")
}
