//! The remote image backend, as seen by the browsing layer.

use std::future::Future;

use thiserror::Error;

use crate::types::{ClusterEntry, ImagePage, ImageRecord};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("not authorized (sign in or set BESSIE_TOKEN)")]
    Unauthorized,
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("image not found: {0}")]
    NotFound(String),
}

/// Paged access to the photo library.
///
/// Implementations must be cheap to share behind an `Arc`; every call may
/// be issued from a spawned task.
pub trait ImageSource: Send + Sync + 'static {
    /// `GET /images?offset&limit`: server-ordered page.
    fn fetch_images(
        &self,
        offset: usize,
        limit: usize,
    ) -> impl Future<Output = Result<ImagePage, SourceError>> + Send;

    /// `GET /images/clusters`: the full cluster manifest.
    fn fetch_clusters(&self) -> impl Future<Output = Result<Vec<ClusterEntry>, SourceError>> + Send;

    /// `GET /images/clustered?offset&limit`: server-flattened cluster order.
    fn fetch_clustered(
        &self,
        offset: usize,
        limit: usize,
    ) -> impl Future<Output = Result<ImagePage, SourceError>> + Send;

    /// `GET /images/{id}`.
    fn fetch_image(&self, id: &str) -> impl Future<Output = Result<ImageRecord, SourceError>> + Send;

    /// `PATCH /images/{id}/gps`, returning the refreshed record.
    fn patch_gps(
        &self,
        id: &str,
        lat: f64,
        lon: f64,
    ) -> impl Future<Output = Result<ImageRecord, SourceError>> + Send;
}
