//! Paged contact-sheet state in numerical or cluster mode.
//!
//! Numerical mode asks the server for one page at a time and replaces
//! the visible page wholesale. Cluster mode fetches the cluster manifest
//! once per activation, flattens it largest-cluster-first into a cache,
//! and pages by slicing the cache locally.
//!
//! Loading transitions are reported through [`GalleryEvent`]s as well as
//! [`PagedGallery::is_loading`]. A load served from the cluster cache
//! emits `LoadingStarted` and `LoadingFinished` within the same call, so
//! `is_loading()` is already false when `load` returns.

use crate::fetch::{Completion, FetchState, FetchTicket, Liveness, Payload, Request};
use crate::natural;
use crate::source::SourceError;
use crate::types::{ClusterEntry, ImageRecord, Mode};

const DEFAULT_PAGE_SIZE: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GalleryConfig {
    pub page_size: usize,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// State transitions observable by a presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum GalleryEvent {
    LoadingStarted,
    LoadingFinished,
    ModeChanged(Mode),
    /// The visible page changed; carries its offset and length.
    PageChanged { offset: usize, len: usize },
    LoadFailed(SourceError),
}

#[derive(Debug)]
pub struct PagedGallery {
    page_size: usize,
    mode: Mode,
    /// Offset of the page currently shown.
    offset: usize,
    /// Offset the outstanding load will show once it lands.
    target: usize,
    total: usize,
    /// Last numerical page; kept across a visit to cluster mode.
    page: Vec<ImageRecord>,
    cluster_cache: Option<Vec<ImageRecord>>,
    pending: Option<FetchTicket>,
    last: FetchState<usize>,
    events: Vec<GalleryEvent>,
    liveness: Liveness,
    next_seq: u64,
}

impl PagedGallery {
    pub fn new(config: GalleryConfig) -> Self {
        Self {
            page_size: config.page_size.max(1),
            mode: Mode::Numerical,
            offset: 0,
            target: 0,
            total: 0,
            page: Vec::new(),
            cluster_cache: None,
            pending: None,
            last: FetchState::Idle,
            events: Vec::new(),
            liveness: Liveness::new(),
            next_seq: 0,
        }
    }

    /// Show the page starting at `offset` in `mode`.
    ///
    /// Switches mode first if `mode` differs from the current one. Returns
    /// the fetch to run, or `None` if the page can be served locally or a
    /// manifest fetch for this activation is already in flight.
    pub fn load(&mut self, mode: Mode, offset: usize) -> Option<FetchTicket> {
        if mode != self.mode {
            self.enter_mode(mode);
        }
        self.target = offset;

        match self.mode {
            Mode::Numerical => {
                let request = Request::Images {
                    offset,
                    limit: self.page_size,
                };
                if matches!(&self.pending, Some(t) if t.request == request) {
                    tracing::debug!(offset, "page already in flight");
                    return None;
                }
                self.begin_loading();
                Some(self.issue(request))
            }
            Mode::Cluster => {
                if let Some(cache) = &self.cluster_cache {
                    let total = cache.len();
                    self.events.push(GalleryEvent::LoadingStarted);
                    self.offset = offset;
                    self.total = total;
                    self.last = FetchState::Success(total);
                    self.push_page_changed();
                    self.events.push(GalleryEvent::LoadingFinished);
                    tracing::debug!(offset, total, "cluster page served from cache");
                    return None;
                }
                if matches!(&self.pending, Some(t) if t.request == Request::Clusters) {
                    tracing::debug!(offset, "cluster manifest already in flight");
                    return None;
                }
                self.begin_loading();
                Some(self.issue(Request::Clusters))
            }
        }
    }

    /// Reload the current mode and offset.
    pub fn reload(&mut self) -> Option<FetchTicket> {
        self.load(self.mode, self.offset)
    }

    /// Change mode and load its first page.
    ///
    /// Leaving cluster mode discards the cluster cache, and the numerical
    /// page is refetched from the first page. Entering it keeps the
    /// numerical page. Returns `None` without effect if `new_mode` is
    /// already active.
    pub fn switch_mode(&mut self, new_mode: Mode) -> Option<FetchTicket> {
        if new_mode == self.mode {
            return None;
        }
        self.enter_mode(new_mode);
        self.load(new_mode, 0)
    }

    pub fn next_page(&mut self) -> Option<FetchTicket> {
        if !self.can_next() {
            return None;
        }
        self.load(self.mode, self.base() + self.page_size)
    }

    pub fn prev_page(&mut self) -> Option<FetchTicket> {
        if !self.can_prev() {
            return None;
        }
        self.load(self.mode, self.base() - self.page_size)
    }

    /// Jump to 1-based page `page`. Out-of-range pages are ignored.
    pub fn jump_to_page(&mut self, page: usize) -> Option<FetchTicket> {
        let offset = page.checked_sub(1)?.checked_mul(self.page_size)?;
        if offset >= self.total {
            return None;
        }
        self.load(self.mode, offset)
    }

    /// Apply a finished fetch.
    ///
    /// Completions for a superseded load (older offset, previous mode,
    /// disposed gallery) are dropped. Failures and empty results leave
    /// the visible state untouched.
    pub fn complete(&mut self, completion: Completion) {
        let Completion { ticket, outcome } = completion;

        if !matches!(&self.pending, Some(p) if p.seq == ticket.seq) {
            tracing::debug!(seq = ticket.seq, request = ?ticket.request, "discarding stale page");
            return;
        }
        let Some(state) = FetchState::resolve(ticket.is_live(), outcome) else {
            tracing::debug!(seq = ticket.seq, "discarding page from disposed gallery");
            return;
        };
        self.pending = None;

        match state {
            FetchState::Success(Payload::Page(page)) => {
                if page.images.is_empty() {
                    tracing::debug!(offset = self.target, "page fetch returned no records");
                    self.last = FetchState::Success(0);
                } else {
                    let mut images = page.images;
                    natural::sort_by_name(&mut images);
                    self.offset = self.target;
                    self.total = page.total.unwrap_or(self.offset + images.len());
                    self.last = FetchState::Success(images.len());
                    self.page = images;
                    self.push_page_changed();
                }
            }
            FetchState::Success(Payload::Clusters(clusters)) => {
                let flat = flatten_clusters(clusters);
                if flat.is_empty() {
                    tracing::debug!("cluster manifest is empty");
                    self.last = FetchState::Success(0);
                } else {
                    tracing::info!(images = flat.len(), "cluster cache built");
                    self.offset = self.target;
                    self.total = flat.len();
                    self.last = FetchState::Success(flat.len());
                    self.cluster_cache = Some(flat);
                    self.push_page_changed();
                }
            }
            FetchState::Failure(err) => {
                tracing::warn!(mode = %self.mode, offset = self.target, error = %err, "page fetch failed");
                self.events.push(GalleryEvent::LoadFailed(err.clone()));
                self.last = FetchState::Failure(err);
            }
            FetchState::Idle | FetchState::Pending => {}
        }
        self.events.push(GalleryEvent::LoadingFinished);
    }

    /// Drop outstanding work and the cluster cache.
    pub fn dispose(&mut self) {
        self.liveness.revoke();
        if self.pending.take().is_some() {
            self.events.push(GalleryEvent::LoadingFinished);
        }
        self.cluster_cache = None;
        tracing::info!(mode = %self.mode, "gallery disposed");
    }

    /// Records on the visible page.
    pub fn visible(&self) -> &[ImageRecord] {
        match self.mode {
            Mode::Numerical => &self.page,
            Mode::Cluster => match &self.cluster_cache {
                Some(cache) => {
                    let start = self.offset.min(cache.len());
                    let end = (self.offset + self.page_size).min(cache.len());
                    &cache[start..end]
                }
                None => &[],
            },
        }
    }

    /// Drain transitions recorded since the last call.
    pub fn take_events(&mut self) -> Vec<GalleryEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Size of the active mode's collection.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Paging steps from the pending target while a load is in flight.
    pub fn can_next(&self) -> bool {
        self.base() + self.page_size < self.total
    }

    pub fn can_prev(&self) -> bool {
        self.base() >= self.page_size
    }

    /// 1-based page number of the current offset.
    pub fn current_page(&self) -> usize {
        self.offset / self.page_size + 1
    }

    pub fn page_count(&self) -> usize {
        self.total.div_ceil(self.page_size).max(1)
    }

    /// The last numerical page, whichever mode is active.
    pub fn numerical_page(&self) -> &[ImageRecord] {
        &self.page
    }

    pub fn cluster_cache(&self) -> Option<&[ImageRecord]> {
        self.cluster_cache.as_deref()
    }

    pub fn last_outcome(&self) -> &FetchState<usize> {
        &self.last
    }

    fn enter_mode(&mut self, mode: Mode) {
        tracing::info!(from = %self.mode, to = %mode, "gallery mode switch");
        if self.mode == Mode::Cluster {
            self.cluster_cache = None;
        }
        self.liveness.renew();
        if self.pending.take().is_some() {
            self.events.push(GalleryEvent::LoadingFinished);
        }
        if mode == Mode::Numerical {
            self.page.clear();
        }
        self.mode = mode;
        self.offset = 0;
        self.target = 0;
        self.total = match mode {
            Mode::Numerical => 0,
            Mode::Cluster => self.cluster_cache.as_ref().map_or(0, Vec::len),
        };
        self.events.push(GalleryEvent::ModeChanged(mode));
    }

    fn base(&self) -> usize {
        if self.pending.is_some() {
            self.target
        } else {
            self.offset
        }
    }

    fn begin_loading(&mut self) {
        if self.pending.is_none() {
            self.events.push(GalleryEvent::LoadingStarted);
        }
    }

    fn issue(&mut self, request: Request) -> FetchTicket {
        self.next_seq += 1;
        let ticket = FetchTicket::new(self.next_seq, request, self.liveness.token());
        tracing::debug!(seq = ticket.seq, ?request, mode = %self.mode, "page fetch issued");
        self.pending = Some(ticket.clone());
        self.last = FetchState::Pending;
        ticket
    }

    fn push_page_changed(&mut self) {
        let len = self.visible().len();
        self.events.push(GalleryEvent::PageChanged {
            offset: self.offset,
            len,
        });
    }
}

impl Default for PagedGallery {
    fn default() -> Self {
        Self::new(GalleryConfig::default())
    }
}

/// Largest cluster first; ties keep manifest order.
pub fn flatten_clusters(mut clusters: Vec<ClusterEntry>) -> Vec<ImageRecord> {
    clusters.sort_by(|a, b| b.images.len().cmp(&a.images.len()));
    clusters.into_iter().flat_map(|c| c.images).collect()
}
