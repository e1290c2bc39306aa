mod client;
mod request;

pub use client::{AccessToken, Credentials, DEFAULT_API_BASE, TrackPublisher, UploadReceipt};
pub use request::{
    ARTWORK_PART, AUDIO_PART, DEFAULT_GENRE, FilePart, PublishRequest, build_publish_request,
    tag_list,
};
