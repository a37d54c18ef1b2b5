//! HTTP backend trait and shared types.
//!
//! The [`HttpBackend`] trait is the only way the crate talks to the network:
//! the release feed and every archive download go through `get`. The
//! production implementation is [`UreqBackend`](super::github::UreqBackend).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP {status} from {url}")]
    Http { url: String, status: u16 },
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("archive {url} is not a valid zip: {message}")]
    Archive { url: String, message: String },
    #[error("archive {url} has no single top-level directory")]
    EmptyArchive { url: String },
    #[error("release feed JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A successful response body plus the headers the crate cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub body: Vec<u8>,
    /// Raw `Link` header, used for feed pagination.
    pub link: Option<String>,
}

/// Trait for HTTP backends.
///
/// Non-2xx statuses must be reported as [`FetchError::Http`]; there is no
/// retry at this layer or above.
pub trait HttpBackend: Sync {
    fn get(&self, url: &str) -> Result<HttpResponse, FetchError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Mock backend serving canned responses by URL and recording every request.
    /// Uses Mutex (not RefCell) so it is Sync and works with rayon's par_iter.
    #[derive(Default)]
    pub struct MockBackend {
        pub responses: Mutex<HashMap<String, HttpResponse>>,
        pub requests: Mutex<Vec<String>>,
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn serve(self, url: &str, body: impl Into<Vec<u8>>) -> Self {
            self.serve_page(url, body, None)
        }

        pub fn serve_page(self, url: &str, body: impl Into<Vec<u8>>, link: Option<&str>) -> Self {
            self.responses.lock().unwrap().insert(
                url.to_string(),
                HttpResponse {
                    body: body.into(),
                    link: link.map(str::to_string),
                },
            );
            self
        }

        pub fn get_requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }

        pub fn request_count(&self, url: &str) -> usize {
            self.get_requests().iter().filter(|u| *u == url).count()
        }
    }

    impl HttpBackend for MockBackend {
        fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.responses
                .lock()
                .unwrap()
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::Http {
                    url: url.to_string(),
                    status: 404,
                })
        }
    }

    #[test]
    fn mock_records_requests_in_order() {
        let backend = MockBackend::new().serve("https://a.test/1", "one");
        assert_eq!(backend.get("https://a.test/1").unwrap().body, b"one");
        assert!(backend.get("https://a.test/2").is_err());
        assert_eq!(
            backend.get_requests(),
            vec!["https://a.test/1", "https://a.test/2"]
        );
    }

    #[test]
    fn mock_missing_url_is_http_404() {
        let backend = MockBackend::new();
        match backend.get("https://a.test/missing") {
            Err(FetchError::Http { status, .. }) => assert_eq!(status, 404),
            other => panic!("expected 404, got {other:?}"),
        }
    }
}
