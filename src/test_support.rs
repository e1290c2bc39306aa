//! Shared fakes for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::WikiError;
use crate::http::{BufferedResponse, ByteStream, HttpClient, HttpResponse};
use crate::wiki::{CommentId, PostId, WikiVenue};

/// A request captured by [`MockHttpClient`]
#[derive(Debug, Clone)]
pub struct RecordedPost {
    pub url: String,
    pub content_type: String,
    pub body: Bytes,
}

/// In-memory HTTP client serving canned GET bodies and recording POSTs
pub struct MockHttpClient {
    routes: HashMap<String, (u16, Vec<Bytes>)>,
    lengths: HashMap<String, u64>,
    gets: Mutex<Vec<String>>,
    posts: Mutex<Vec<RecordedPost>>,
    token_response: BufferedResponse,
    upload_status: u16,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            lengths: HashMap::new(),
            gets: Mutex::new(Vec::new()),
            posts: Mutex::new(Vec::new()),
            token_response: BufferedResponse {
                status: 200,
                body: Bytes::from_static(br#"{"access_token":"mock-token","scope":"*"}"#),
            },
            upload_status: 201,
        }
    }

    pub fn route(mut self, url: &str, body: impl Into<Bytes>) -> Self {
        self.routes.insert(url.to_string(), (200, vec![body.into()]));
        self
    }

    /// Serve `url` as several stream chunks
    pub fn route_chunks(mut self, url: &str, chunks: &[&'static str]) -> Self {
        let chunks = chunks
            .iter()
            .copied()
            .map(|c| Bytes::from_static(c.as_bytes()))
            .collect();
        self.routes.insert(url.to_string(), (200, chunks));
        self
    }

    /// Advertise `length` as Content-Length for `url`, whatever the body is
    pub fn content_length(mut self, url: &str, length: u64) -> Self {
        self.lengths.insert(url.to_string(), length);
        self
    }

    pub fn route_status(mut self, url: &str, status: u16) -> Self {
        self.routes
            .insert(url.to_string(), (status, vec![Bytes::from_static(b"error")]));
        self
    }

    pub fn token_response(mut self, status: u16, body: &'static str) -> Self {
        self.token_response = BufferedResponse {
            status,
            body: Bytes::from_static(body.as_bytes()),
        };
        self
    }

    pub fn upload_status(mut self, status: u16) -> Self {
        self.upload_status = status;
        self
    }

    /// Number of GET requests issued for `url`
    pub fn get_count(&self, url: &str) -> usize {
        self.gets.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    pub fn posts(&self) -> Vec<RecordedPost> {
        self.posts.lock().unwrap().clone()
    }

    fn lookup(&self, url: &str) -> (u16, Vec<Bytes>) {
        self.gets.lock().unwrap().push(url.to_string());
        self.routes
            .get(url)
            .cloned()
            .unwrap_or((404, vec![Bytes::from_static(b"not found")]))
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn get_bytes(&self, url: &str) -> Result<Bytes, reqwest::Error> {
        Ok(self.lookup(url).1.concat().into())
    }

    async fn get_stream(&self, url: &str) -> Result<HttpResponse, reqwest::Error> {
        let (status, chunks) = self.lookup(url);
        let len = self
            .lengths
            .get(url)
            .copied()
            .unwrap_or_else(|| chunks.iter().map(|c| c.len() as u64).sum());

        let chunks = chunks.into_iter().map(Ok::<Bytes, reqwest::Error>);
        let stream: ByteStream = Box::pin(futures::stream::iter(chunks));

        Ok(HttpResponse {
            status,
            content_length: Some(len),
            body: stream,
        })
    }

    async fn post_form(
        &self,
        url: &str,
        fields: &[(&str, &str)],
    ) -> Result<BufferedResponse, reqwest::Error> {
        self.posts.lock().unwrap().push(RecordedPost {
            url: url.to_string(),
            content_type: "application/x-www-form-urlencoded".to_string(),
            body: Bytes::from(crate::http::encode_form(fields)),
        });
        Ok(self.token_response.clone())
    }

    async fn post_body(
        &self,
        url: &str,
        content_type: &str,
        body: Bytes,
    ) -> Result<BufferedResponse, reqwest::Error> {
        self.posts.lock().unwrap().push(RecordedPost {
            url: url.to_string(),
            content_type: content_type.to_string(),
            body,
        });
        Ok(BufferedResponse {
            status: self.upload_status,
            body: Bytes::from_static(br#"{"id":1}"#),
        })
    }
}

/// One call observed by [`FakeVenue`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VenueCall {
    GetPage(String),
    Edit { page: String, reason: String },
    Submit { title: String, url: String },
    Comment { post: String, text: String },
    Distinguish(String),
}

/// In-memory wiki venue holding a single page
pub struct FakeVenue {
    content: Mutex<String>,
    fail_edits: bool,
    fail_submits: bool,
    calls: Mutex<Vec<VenueCall>>,
}

impl FakeVenue {
    pub fn with_page(content: &str) -> Self {
        Self {
            content: Mutex::new(content.to_string()),
            fail_edits: false,
            fail_submits: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_edits(mut self) -> Self {
        self.fail_edits = true;
        self
    }

    pub fn failing_submits(mut self) -> Self {
        self.fail_submits = true;
        self
    }

    pub fn content(&self) -> String {
        self.content.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<VenueCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: VenueCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn count(&self, pred: impl Fn(&VenueCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }
}

#[async_trait]
impl WikiVenue for FakeVenue {
    async fn wiki_page(&self, page: &str) -> Result<String, WikiError> {
        self.record(VenueCall::GetPage(page.to_string()));
        Ok(self.content())
    }

    async fn edit_wiki_page(
        &self,
        page: &str,
        content: &str,
        reason: &str,
    ) -> Result<(), WikiError> {
        self.record(VenueCall::Edit {
            page: page.to_string(),
            reason: reason.to_string(),
        });
        if self.fail_edits {
            return Err(WikiError::HttpStatus {
                operation: "wiki edit",
                status: 403,
            });
        }
        *self.content.lock().unwrap() = content.to_string();
        Ok(())
    }

    async fn submit_link(&self, title: &str, url: &str) -> Result<PostId, WikiError> {
        self.record(VenueCall::Submit {
            title: title.to_string(),
            url: url.to_string(),
        });
        if self.fail_submits {
            return Err(WikiError::HttpStatus {
                operation: "link submit",
                status: 503,
            });
        }
        let n = self.count(|c| matches!(c, VenueCall::Submit { .. }));
        Ok(PostId(format!("t3_{n}")))
    }

    async fn comment(&self, post: &PostId, text: &str) -> Result<CommentId, WikiError> {
        self.record(VenueCall::Comment {
            post: post.0.clone(),
            text: text.to_string(),
        });
        let n = self.count(|c| matches!(c, VenueCall::Comment { .. }));
        Ok(CommentId(format!("t1_{n}")))
    }

    async fn distinguish(&self, comment: &CommentId) -> Result<(), WikiError> {
        self.record(VenueCall::Distinguish(comment.0.clone()));
        Ok(())
    }
}
