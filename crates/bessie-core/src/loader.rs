//! Windowed block loader for the single-image viewer.
//!
//! The sequence grows one block at a time as the cursor approaches the
//! end of what is loaded. The first record is fetched alone so something
//! can be shown immediately, then the rest of the first block follows.
//!
//! At most one fetch is outstanding at any moment, and a start offset is
//! never requested twice while a request for it is pending or has
//! already succeeded. A failed or empty block releases its offset so the
//! next qualifying cursor move retries it.

use std::collections::BTreeSet;

use crate::fetch::{Completion, FetchState, FetchTicket, Liveness, Payload, Request};
use crate::source::SourceError;
use crate::types::ImageRecord;

const DEFAULT_BLOCK_SIZE: usize = 25;
const DEFAULT_LOOKAHEAD: usize = 2;

/// Block loader tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Records per block fetch.
    pub block_size: usize,
    /// Fetch the next block once the cursor is within this many
    /// records of the loaded end.
    pub lookahead: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            lookahead: DEFAULT_LOOKAHEAD,
        }
    }
}

/// Which step of the loading sequence a ticket belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// The single first record.
    First,
    /// Remainder of the first block.
    Rest,
    /// A boundary-triggered block.
    Block,
}

#[derive(Debug)]
pub struct WindowedLoader {
    config: LoaderConfig,
    records: Vec<ImageRecord>,
    total: Option<usize>,
    /// Start offsets requested and not released by a failure.
    requested: BTreeSet<usize>,
    in_flight: Option<(FetchTicket, Phase)>,
    last: FetchState<usize>,
    liveness: Liveness,
    next_seq: u64,
}

impl WindowedLoader {
    pub fn new(config: LoaderConfig) -> Self {
        let config = LoaderConfig {
            block_size: config.block_size.max(1),
            lookahead: config.lookahead.max(1),
        };
        Self {
            config,
            records: Vec::new(),
            total: None,
            requested: BTreeSet::new(),
            in_flight: None,
            last: FetchState::Idle,
            liveness: Liveness::new(),
            next_seq: 0,
        }
    }

    /// Reset to empty and request the first record.
    ///
    /// Any fetch still outstanding from a previous initialization is
    /// orphaned: its completion will be discarded.
    pub fn initialize(&mut self) -> FetchTicket {
        self.liveness.renew();
        self.records.clear();
        self.total = None;
        self.requested.clear();
        self.requested.insert(0);

        tracing::info!(block_size = self.config.block_size, "loader initialized");
        self.issue(Phase::First, 0, 1)
    }

    /// Request the next block if `cursor` is near the loaded end.
    ///
    /// Returns `None` when no fetch is needed or allowed: nothing loaded
    /// yet, total unknown, everything loaded, a fetch already in flight,
    /// or the next start offset already requested.
    pub fn advance_if_near_boundary(&mut self, cursor: usize) -> Option<FetchTicket> {
        let len = self.records.len();
        let total = self.total?;
        if len == 0 || len >= total || self.in_flight.is_some() {
            return None;
        }
        if cursor + self.config.lookahead < len {
            return None;
        }
        if !self.requested.insert(len) {
            tracing::debug!(offset = len, "block already requested");
            return None;
        }

        // Overshoot past `total` is clipped in `append`.
        Some(self.issue(Phase::Block, len, self.config.block_size))
    }

    /// Apply a finished fetch. May return the follow-up request for the
    /// rest of the first block.
    pub fn complete(&mut self, completion: Completion) -> Option<FetchTicket> {
        let Completion { ticket, outcome } = completion;

        let phase = match &self.in_flight {
            Some((current, phase)) if current.seq == ticket.seq => *phase,
            _ => {
                tracing::debug!(seq = ticket.seq, request = ?ticket.request, "discarding stale block");
                return None;
            }
        };

        let offset = match ticket.request {
            Request::Images { offset, .. } => offset,
            _ => 0,
        };

        let outcome = outcome.and_then(|payload| match payload {
            Payload::Page(page) => Ok(page),
            Payload::Clusters(_) => Err(SourceError::Decode(
                "cluster manifest where a page was expected".into(),
            )),
        });

        let Some(state) = FetchState::resolve(ticket.is_live(), outcome) else {
            tracing::debug!(seq = ticket.seq, offset, "discarding block from disposed loader");
            return None;
        };
        self.in_flight = None;

        let page = match state {
            FetchState::Success(page) => page,
            FetchState::Failure(err) => {
                tracing::warn!(offset, error = %err, "block fetch failed");
                self.release(phase, offset);
                self.last = FetchState::Failure(err);
                return None;
            }
            FetchState::Idle | FetchState::Pending => return None,
        };

        if page.images.is_empty() {
            tracing::debug!(offset, "block fetch returned no records");
            self.release(phase, offset);
            self.last = FetchState::Success(0);
            return None;
        }

        // A backend that cannot count leaves `total` unknown; the rest of
        // the first block is still fetched, later blocks wait for a count.
        if phase != Phase::Block && self.total.is_none() {
            self.total = page.total;
        }

        let appended = self.append(offset, page.images);
        self.last = FetchState::Success(appended);
        tracing::debug!(offset, appended, loaded = self.records.len(), total = ?self.total, "block applied");

        match phase {
            Phase::First if self.config.block_size > 1 && !self.is_complete() => {
                let limit = self.config.block_size - 1;
                Some(self.issue(Phase::Rest, self.records.len(), limit))
            }
            _ => None,
        }
    }

    /// Drop all outstanding work; later completions are discarded.
    pub fn dispose(&mut self) {
        self.liveness.revoke();
        self.in_flight = None;
        tracing::info!(loaded = self.records.len(), "loader disposed");
    }

    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&ImageRecord> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total reported by the first successful response.
    pub fn total(&self) -> Option<usize> {
        self.total
    }

    /// True while any fetch of this loader is outstanding.
    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.total, Some(total) if self.records.len() >= total)
    }

    pub fn requested_offsets(&self) -> impl Iterator<Item = usize> + '_ {
        self.requested.iter().copied()
    }

    pub fn last_outcome(&self) -> &FetchState<usize> {
        &self.last
    }

    pub fn config(&self) -> LoaderConfig {
        self.config
    }

    fn issue(&mut self, phase: Phase, offset: usize, limit: usize) -> FetchTicket {
        self.next_seq += 1;
        let ticket = FetchTicket::new(
            self.next_seq,
            Request::Images { offset, limit },
            self.liveness.token(),
        );
        tracing::debug!(seq = ticket.seq, offset, limit, ?phase, "block fetch issued");
        self.in_flight = Some((ticket.clone(), phase));
        self.last = FetchState::Pending;
        ticket
    }

    /// Forget a start offset so a later boundary check can retry it.
    fn release(&mut self, phase: Phase, offset: usize) {
        if phase == Phase::Block {
            self.requested.remove(&offset);
        }
    }

    /// Append in server order, never past the known total.
    fn append(&mut self, offset: usize, images: Vec<ImageRecord>) -> usize {
        if offset != self.records.len() {
            tracing::warn!(offset, loaded = self.records.len(), "block does not extend sequence");
            return 0;
        }
        let room = self
            .total
            .map_or(usize::MAX, |total| total.saturating_sub(self.records.len()));
        let before = self.records.len();
        self.records.extend(images.into_iter().take(room));
        self.records.len() - before
    }
}

impl Default for WindowedLoader {
    fn default() -> Self {
        Self::new(LoaderConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImagePage;

    fn record(i: usize) -> ImageRecord {
        ImageRecord {
            id: format!("id-{i}"),
            original_name: format!("img{i}.jpg"),
            url: format!("photos/img{i}.jpg"),
            thumbnail_url: None,
            gps_lat: None,
            gps_lon: None,
            cluster_id: None,
        }
    }

    fn page(range: std::ops::Range<usize>, total: usize) -> Payload {
        Payload::Page(ImagePage {
            images: range.map(record).collect(),
            total: Some(total),
        })
    }

    fn done(ticket: FetchTicket, payload: Payload) -> Completion {
        Completion {
            ticket,
            outcome: Ok(payload),
        }
    }

    fn failed(ticket: FetchTicket) -> Completion {
        Completion {
            ticket,
            outcome: Err(SourceError::Network("connection reset".into())),
        }
    }

    fn loader(block_size: usize) -> WindowedLoader {
        WindowedLoader::new(LoaderConfig {
            block_size,
            lookahead: 2,
        })
    }

    /// Initialize and resolve both initial fetches against a backend of `total` records.
    fn loaded(block_size: usize, total: usize) -> WindowedLoader {
        let mut l = loader(block_size);
        let first = l.initialize();
        let rest = l.complete(done(first, page(0..1, total))).unwrap();
        let end = block_size.min(total);
        assert!(l.complete(done(rest, page(1..end, total))).is_none());
        l
    }

    #[test]
    fn test_initialize_requests_single_record() {
        let mut l = loader(5);
        let t = l.initialize();
        assert_eq!(t.request, Request::Images { offset: 0, limit: 1 });
        assert!(l.is_loading());
        assert_eq!(l.requested_offsets().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_first_record_then_rest_of_block() {
        let mut l = loader(5);
        let first = l.initialize();
        let rest = l.complete(done(first, page(0..1, 20))).unwrap();
        assert_eq!(rest.request, Request::Images { offset: 1, limit: 4 });
        assert_eq!(l.len(), 1);
        assert_eq!(l.total(), Some(20));
        assert!(l.is_loading());

        assert!(l.complete(done(rest, page(1..5, 20))).is_none());
        assert_eq!(l.len(), 5);
        assert!(!l.is_loading());
    }

    #[test]
    fn test_empty_first_fetch_stops() {
        let mut l = loader(5);
        let first = l.initialize();
        assert!(l.complete(done(first, page(0..0, 0))).is_none());
        assert!(l.is_empty());
        assert!(!l.is_loading());
        assert!(l.advance_if_near_boundary(0).is_none());
    }

    #[test]
    fn test_small_library_loads_fully_without_boundary_fetch() {
        // total = 3: one record, then two more, then nothing further.
        let mut l = loaded(25, 3);
        assert_eq!(l.len(), 3);
        for cursor in 0..3 {
            assert!(l.advance_if_near_boundary(cursor).is_none());
        }
        assert!(l.is_complete());
    }

    #[test]
    fn test_boundary_triggers_next_block() {
        let mut l = loaded(5, 12);
        assert!(l.advance_if_near_boundary(1).is_none());
        assert!(l.advance_if_near_boundary(2).is_none());

        let t = l.advance_if_near_boundary(3).unwrap();
        assert_eq!(t.request, Request::Images { offset: 5, limit: 5 });
        l.complete(done(t, page(5..10, 12)));
        assert_eq!(l.len(), 10);

        let t = l.advance_if_near_boundary(8).unwrap();
        assert_eq!(t.request, Request::Images { offset: 10, limit: 5 });
        l.complete(done(t, page(10..12, 12)));
        assert_eq!(l.len(), 12);
        assert!(l.advance_if_near_boundary(11).is_none());
    }

    #[test]
    fn test_lookahead_is_configurable() {
        let mut l = WindowedLoader::new(LoaderConfig {
            block_size: 5,
            lookahead: 1,
        });
        let first = l.initialize();
        let rest = l.complete(done(first, page(0..1, 12))).unwrap();
        l.complete(done(rest, page(1..5, 12)));
        assert!(l.advance_if_near_boundary(3).is_none());
        assert!(l.advance_if_near_boundary(4).is_some());
    }

    #[test]
    fn test_no_duplicate_request_while_in_flight() {
        let mut l = loaded(5, 12);
        let t = l.advance_if_near_boundary(4).unwrap();
        assert!(l.advance_if_near_boundary(4).is_none());
        assert!(l.advance_if_near_boundary(3).is_none());
        assert!(l.is_loading());
        l.complete(done(t, page(5..10, 12)));
        assert_eq!(l.requested_offsets().collect::<Vec<_>>(), vec![0, 5]);
    }

    #[test]
    fn test_failed_block_is_retried_on_next_move() {
        let mut l = loaded(5, 12);
        let t = l.advance_if_near_boundary(4).unwrap();
        l.complete(failed(t));
        assert_eq!(l.len(), 5);
        assert!(!l.is_loading());
        assert!(matches!(l.last_outcome(), FetchState::Failure(_)));

        let retry = l.advance_if_near_boundary(4).unwrap();
        assert_eq!(retry.request, Request::Images { offset: 5, limit: 5 });
    }

    #[test]
    fn test_empty_block_is_retried_on_next_move() {
        let mut l = loaded(5, 12);
        let t = l.advance_if_near_boundary(4).unwrap();
        l.complete(done(t, page(5..5, 12)));
        assert_eq!(l.len(), 5);
        assert!(l.advance_if_near_boundary(4).is_some());
    }

    #[test]
    fn test_sequence_never_exceeds_total() {
        let mut l = loaded(5, 7);
        let t = l.advance_if_near_boundary(4).unwrap();
        // Server over-delivers.
        l.complete(done(t, page(5..10, 7)));
        assert_eq!(l.len(), 7);
        assert!(l.is_complete());
    }

    #[test]
    fn test_length_monotonic_over_walk() {
        let mut l = loaded(4, 30);
        let mut prev = l.len();
        for cursor in 0..40 {
            let cursor = cursor.min(l.len() - 1);
            if let Some(t) = l.advance_if_near_boundary(cursor) {
                let Request::Images { offset, limit } = t.request else {
                    panic!("unexpected request");
                };
                l.complete(done(t, page(offset..offset + limit, 30)));
            }
            assert!(l.len() >= prev);
            assert!(l.len() <= 30);
            prev = l.len();
        }
        assert_eq!(l.len(), 30);
    }

    #[test]
    fn test_reinitialize_discards_stale_completion() {
        let mut l = loaded(5, 12);
        let stale = l.advance_if_near_boundary(4).unwrap();
        let first = l.initialize();
        assert!(l.complete(done(stale, page(5..10, 12))).is_none());
        assert!(l.is_empty());
        assert!(l.is_loading());

        l.complete(done(first, page(0..1, 12)));
        assert_eq!(l.len(), 1);
    }

    #[test]
    fn test_dispose_discards_in_flight() {
        let mut l = loaded(5, 12);
        let t = l.advance_if_near_boundary(4).unwrap();
        l.dispose();
        assert!(!l.is_loading());
        l.complete(done(t, page(5..10, 12)));
        assert_eq!(l.len(), 5);
    }

    #[test]
    fn test_unknown_total_still_fetches_rest_of_block() {
        let uncounted = |range: std::ops::Range<usize>| {
            Payload::Page(ImagePage {
                images: range.map(record).collect(),
                total: None,
            })
        };
        let mut l = loader(5);
        let first = l.initialize();
        let rest = l.complete(done(first, uncounted(0..1))).unwrap();
        assert_eq!(rest.request, Request::Images { offset: 1, limit: 4 });
        assert_eq!(l.total(), None);
        assert!(!l.is_complete());

        assert!(l.complete(done(rest, uncounted(1..5))).is_none());
        assert_eq!(l.len(), 5);
        assert!(l.advance_if_near_boundary(4).is_none());
    }

    #[test]
    fn test_total_reported_by_rest_enables_boundary() {
        let mut l = loader(5);
        let first = l.initialize();
        let rest = l
            .complete(done(
                first,
                Payload::Page(ImagePage {
                    images: vec![record(0)],
                    total: None,
                }),
            ))
            .unwrap();
        l.complete(done(rest, page(1..5, 9)));
        assert_eq!(l.total(), Some(9));
        let t = l.advance_if_near_boundary(4).unwrap();
        assert_eq!(t.request, Request::Images { offset: 5, limit: 5 });
    }

    #[test]
    fn test_block_size_one_skips_rest_fetch() {
        let mut l = loader(1);
        let first = l.initialize();
        assert!(l.complete(done(first, page(0..1, 4))).is_none());
        let t = l.advance_if_near_boundary(0).unwrap();
        assert_eq!(t.request, Request::Images { offset: 1, limit: 1 });
    }
}
