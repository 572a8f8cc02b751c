//! Remote page fetching.
//!
//! - [`RemoteFetcher`] is the contract the repository consumes
//! - [`HttpFetcher`] implements it against a TMDB-compatible JSON API
//! - [`FetchHandle`] is the cancellable token returned for every fetch
//! - [`FetchError`] classifies failures into connectivity vs. remote errors

mod error;
mod handle;
mod http;

pub use error::FetchError;
pub use handle::{DeliveryGate, FetchHandle};
pub use http::{HttpFetcher, DEFAULT_BASE_URL};

use crate::domain::{Page, RequestKey};

/// Performs one network page fetch.
///
/// Cancellation is by dropping the returned future; implementations must not
/// report results through any other path.
#[async_trait::async_trait]
pub trait RemoteFetcher: Send + Sync {
    async fn fetch(&self, key: &RequestKey) -> Result<Page, FetchError>;
}
