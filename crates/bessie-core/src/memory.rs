//! In-memory [`ImageSource`] for offline browsing and tests.

use std::path::Path;
use std::sync::Mutex;

use serde::Deserialize;

use crate::fetch::Request;
use crate::gallery::flatten_clusters;
use crate::source::{ImageSource, SourceError};
use crate::types::{ClusterEntry, ImagePage, ImageRecord};

/// On-disk fixture: `{ "images": [...], "clusters": [...] }`.
#[derive(Debug, Default, Deserialize)]
struct Fixture {
    #[serde(default)]
    images: Vec<ImageRecord>,
    #[serde(default)]
    clusters: Vec<ClusterEntry>,
}

/// Serves a fixed library and logs every request it receives.
#[derive(Debug, Default)]
pub struct MemorySource {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    images: Vec<ImageRecord>,
    clusters: Vec<ClusterEntry>,
    requests: Vec<Request>,
    /// Number of upcoming calls that fail with a network error.
    failures: usize,
}

impl MemorySource {
    pub fn new(images: Vec<ImageRecord>, clusters: Vec<ClusterEntry>) -> Self {
        Self {
            state: Mutex::new(State {
                images,
                clusters,
                ..State::default()
            }),
        }
    }

    /// `count` records named `img0.jpg`, `img1.jpg`, … and no clusters.
    pub fn numbered(count: usize) -> Self {
        let images = (0..count)
            .map(|i| ImageRecord {
                id: format!("img-{i}"),
                original_name: format!("img{i}.jpg"),
                url: format!("photos/img{i}.jpg"),
                thumbnail_url: None,
                gps_lat: None,
                gps_lon: None,
                cluster_id: None,
            })
            .collect();
        Self::new(images, Vec::new())
    }

    /// Load a JSON fixture file.
    pub fn from_file(path: &Path) -> Result<Self, SourceError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SourceError::Network(format!("{}: {e}", path.display())))?;
        let fixture: Fixture =
            serde_json::from_str(&raw).map_err(|e| SourceError::Decode(e.to_string()))?;
        tracing::info!(
            path = %path.display(),
            images = fixture.images.len(),
            clusters = fixture.clusters.len(),
            "fixture loaded"
        );
        Ok(Self::new(fixture.images, fixture.clusters))
    }

    /// Make the next `n` calls fail.
    pub fn fail_next(&self, n: usize) {
        self.lock().failures = n;
    }

    /// Every list request received so far, in arrival order.
    pub fn requests(&self) -> Vec<Request> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A poisoned lock only means a test panicked mid-call.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn take_failure(state: &mut State) -> Result<(), SourceError> {
        if state.failures > 0 {
            state.failures -= 1;
            return Err(SourceError::Network("injected failure".into()));
        }
        Ok(())
    }
}

fn slice_page(all: &[ImageRecord], offset: usize, limit: usize) -> ImagePage {
    let start = offset.min(all.len());
    let end = offset.saturating_add(limit).min(all.len());
    ImagePage {
        images: all[start..end].to_vec(),
        total: Some(all.len()),
    }
}

impl ImageSource for MemorySource {
    async fn fetch_images(&self, offset: usize, limit: usize) -> Result<ImagePage, SourceError> {
        let mut state = self.lock();
        state.requests.push(Request::Images { offset, limit });
        Self::take_failure(&mut state)?;
        Ok(slice_page(&state.images, offset, limit))
    }

    async fn fetch_clusters(&self) -> Result<Vec<ClusterEntry>, SourceError> {
        let mut state = self.lock();
        state.requests.push(Request::Clusters);
        Self::take_failure(&mut state)?;
        Ok(state.clusters.clone())
    }

    async fn fetch_clustered(&self, offset: usize, limit: usize) -> Result<ImagePage, SourceError> {
        let mut state = self.lock();
        state.requests.push(Request::Clustered { offset, limit });
        Self::take_failure(&mut state)?;
        let flat = flatten_clusters(state.clusters.clone());
        Ok(slice_page(&flat, offset, limit))
    }

    async fn fetch_image(&self, id: &str) -> Result<ImageRecord, SourceError> {
        let mut state = self.lock();
        Self::take_failure(&mut state)?;
        state
            .images
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(id.to_string()))
    }

    async fn patch_gps(&self, id: &str, lat: f64, lon: f64) -> Result<ImageRecord, SourceError> {
        let mut state = self.lock();
        Self::take_failure(&mut state)?;
        let record = state
            .images
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| SourceError::NotFound(id.to_string()))?;
        record.gps_lat = Some(lat);
        record.gps_lon = Some(lon);
        Ok(record.clone())
    }
}
