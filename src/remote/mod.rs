//! Network access: release feed pages and release archives.
//!
//! - **Backend**: [`HttpBackend`] trait + [`FetchError`]
//! - **GitHub**: [`UreqBackend`] with credentials from the environment

pub mod backend;
pub mod github;

pub use backend::{FetchError, HttpBackend, HttpResponse};
pub use github::{Credentials, UreqBackend};
