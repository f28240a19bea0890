//! View-level owners that tie state machines, key routing and fetching
//! together.
//!
//! Each session owns one [`KeyBus`] with a single listener over its view
//! state, and one [`FetchDispatcher`]. Tickets produced while handling a
//! key are queued in the view state and dispatched once the listener
//! returns. Completions come back through [`ViewerSession::next_completion`]
//! / [`GallerySession::next_completion`] and are applied with `apply`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::bus::KeyBus;
use crate::dispatch::FetchDispatcher;
use crate::fetch::{Completion, FetchTicket};
use crate::gallery::{GalleryConfig, GalleryEvent, PagedGallery};
use crate::loader::{LoaderConfig, WindowedLoader};
use crate::modal::{Layer, ModalCoordinator};
use crate::navigation::{Key, NavAction, NavSnapshot, NavigationController};
use crate::source::ImageSource;
use crate::types::{ImageRecord, Mode};

/// A measured user-visible round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timing {
    /// `initial_load`, `arrow_left` or `arrow_right`.
    pub action: &'static str,
    pub roundtrip: Duration,
}

// ── Single-image viewer ───────────────────────────────────────────────

struct Viewer {
    loader: WindowedLoader,
    nav: NavigationController,
    cursor: usize,
    outbox: Vec<FetchTicket>,
    timings: Vec<Timing>,
    /// Set by `start`, cleared when the first record lands.
    started: Option<Instant>,
}

impl Viewer {
    fn on_key(&mut self, key: Key) -> bool {
        let pressed = Instant::now();
        let snap = NavSnapshot::new(self.cursor, self.loader.len(), self.loader.is_loading());
        let mut actions = Vec::new();
        let consumed = self.nav.handle(key, snap, &mut actions);

        for action in actions {
            match action {
                NavAction::Prev(index) => {
                    self.move_to(index);
                    self.time("arrow_left", pressed);
                }
                NavAction::Next(index) => {
                    self.move_to(index);
                    self.time("arrow_right", pressed);
                }
                NavAction::Zoom(index) => tracing::debug!(index, "viewer zoomed"),
                NavAction::Unzoom(index) => self.cursor = index,
            }
        }
        consumed
    }

    fn move_to(&mut self, index: usize) {
        self.cursor = index;
        if let Some(ticket) = self.loader.advance_if_near_boundary(index) {
            self.outbox.push(ticket);
        }
    }

    fn time(&mut self, action: &'static str, since: Instant) {
        self.timings.push(Timing {
            action,
            roundtrip: since.elapsed(),
        });
    }
}

/// Keyboard-driven single-image viewer over a [`WindowedLoader`].
pub struct ViewerSession<S> {
    dispatcher: FetchDispatcher<S>,
    bus: KeyBus<Viewer>,
    viewer: Viewer,
}

impl<S: ImageSource> ViewerSession<S> {
    pub fn new(source: Arc<S>, config: LoaderConfig) -> Self {
        let mut bus = KeyBus::new();
        bus.attach(|viewer: &mut Viewer, key| viewer.on_key(key));
        Self {
            dispatcher: FetchDispatcher::new(source),
            bus,
            viewer: Viewer {
                loader: WindowedLoader::new(config),
                nav: NavigationController::new(),
                cursor: 0,
                outbox: Vec::new(),
                timings: Vec::new(),
                started: None,
            },
        }
    }

    /// (Re)load from the first record.
    pub fn start(&mut self) {
        let ticket = self.viewer.loader.initialize();
        self.viewer.cursor = 0;
        self.viewer.nav.unzoom();
        self.viewer.started = Some(Instant::now());
        self.dispatcher.dispatch(ticket);
    }

    /// Route one key press. Returns whether a listener consumed it.
    pub fn handle_key(&mut self, key: Key) -> bool {
        let consumed = self.bus.dispatch(&mut self.viewer, key);
        self.flush();
        consumed
    }

    pub async fn next_completion(&mut self) -> Option<Completion> {
        self.dispatcher.next_completion().await
    }

    pub fn apply(&mut self, completion: Completion) {
        if let Some(follow_up) = self.viewer.loader.complete(completion) {
            self.viewer.outbox.push(follow_up);
        }
        if !self.viewer.loader.is_empty() {
            if let Some(started) = self.viewer.started.take() {
                self.viewer.time("initial_load", started);
            }
        }
        self.flush();
    }

    /// Apply completions until nothing is outstanding.
    pub async fn settle(&mut self) {
        while let Some(completion) = self.next_completion().await {
            self.apply(completion);
        }
    }

    pub fn current(&self) -> Option<&ImageRecord> {
        self.viewer.loader.get(self.viewer.cursor)
    }

    pub fn cursor(&self) -> usize {
        self.viewer.cursor
    }

    pub fn loader(&self) -> &WindowedLoader {
        &self.viewer.loader
    }

    pub fn is_zoomed(&self) -> bool {
        self.viewer.nav.is_zoomed()
    }

    pub fn is_loading(&self) -> bool {
        self.viewer.loader.is_loading()
    }

    pub fn outstanding(&self) -> usize {
        self.dispatcher.outstanding()
    }

    pub fn take_timings(&mut self) -> Vec<Timing> {
        std::mem::take(&mut self.viewer.timings)
    }

    pub fn listener_count(&self) -> usize {
        self.bus.listener_count()
    }

    pub fn source(&self) -> &Arc<S> {
        self.dispatcher.source()
    }

    /// Detach the key listener and orphan in-flight fetches.
    pub fn dispose(&mut self) {
        self.bus.dispose();
        self.viewer.loader.dispose();
        self.viewer.outbox.clear();
    }

    fn flush(&mut self) {
        for ticket in self.viewer.outbox.drain(..) {
            self.dispatcher.dispatch(ticket);
        }
    }
}

// ── Contact sheet ─────────────────────────────────────────────────────

/// Something the contact sheet wants its presenter to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum SheetEvent {
    Gallery(GalleryEvent),
    ModalOpened(usize),
    /// Carries the grid cell focus returned to.
    ModalClosed(usize),
    /// Enter on a record: show its detail view.
    OpenDetail(String),
}

struct Sheet {
    gallery: PagedGallery,
    nav: NavigationController,
    modal: ModalCoordinator,
    cursor: usize,
    outbox: Vec<FetchTicket>,
    events: Vec<SheetEvent>,
}

impl Sheet {
    fn on_key(&mut self, key: Key) -> bool {
        if self.modal.is_open() {
            return self.on_modal_key(key);
        }
        match key {
            Key::Char('c') => self.switch_mode(Mode::Cluster),
            Key::Char('n') => self.switch_mode(Mode::Numerical),
            Key::PageDown => {
                let ticket = self.gallery.next_page();
                self.page_moved(ticket)
            }
            Key::PageUp => {
                let ticket = self.gallery.prev_page();
                self.page_moved(ticket)
            }
            Key::Enter => self.open_detail(self.cursor),
            _ => self.on_grid_key(key),
        }
    }

    fn on_grid_key(&mut self, key: Key) -> bool {
        let len = self.gallery.visible().len();
        let snap = NavSnapshot::new(self.cursor, len, self.gallery.is_loading());
        let mut actions = Vec::new();
        let consumed = self.nav.handle(key, snap, &mut actions);

        for action in actions {
            match action {
                NavAction::Prev(index) | NavAction::Next(index) => {
                    self.cursor = index;
                    self.modal.set_grid_focus(Some(index));
                }
                NavAction::Zoom(index) => {
                    if self.modal.open(index, len) {
                        self.events.push(SheetEvent::ModalOpened(index));
                    } else {
                        self.nav.unzoom();
                    }
                }
                NavAction::Unzoom(index) => self.cursor = index,
            }
        }
        consumed
    }

    /// The modal owns the keyboard until it closes.
    fn on_modal_key(&mut self, key: Key) -> bool {
        let len = self.gallery.visible().len();
        match key {
            Key::Left => {
                self.modal.prev(len);
            }
            Key::Right => {
                self.modal.next(len);
            }
            Key::Escape | Key::Space => self.close_modal(),
            Key::Enter => {
                if let Some(index) = self.modal.index() {
                    self.open_detail(index);
                }
            }
            _ => {}
        }
        true
    }

    fn close_modal(&mut self) {
        let Some(focus) = self.modal.close() else {
            return;
        };
        self.nav.unzoom();
        self.cursor = focus;
        self.events.push(SheetEvent::ModalClosed(focus));
    }

    fn open_detail(&mut self, index: usize) -> bool {
        match self.gallery.visible().get(index) {
            Some(record) => {
                self.events.push(SheetEvent::OpenDetail(record.id.clone()));
                true
            }
            None => false,
        }
    }

    fn switch_mode(&mut self, mode: Mode) -> bool {
        if mode == self.gallery.mode() {
            return true;
        }
        let ticket = self.gallery.switch_mode(mode);
        self.page_moved(ticket);
        true
    }

    fn page_moved(&mut self, ticket: Option<FetchTicket>) -> bool {
        self.outbox.extend(ticket);
        self.cursor = 0;
        self.modal.set_grid_focus(Some(0));
        true
    }

    fn drain_gallery(&mut self) {
        self.events
            .extend(self.gallery.take_events().into_iter().map(SheetEvent::Gallery));
        let len = self.gallery.visible().len();
        if self.cursor >= len {
            self.cursor = len.saturating_sub(1);
        }
    }
}

/// Paged contact sheet with a grid cursor and a single-image modal.
pub struct GallerySession<S> {
    dispatcher: FetchDispatcher<S>,
    bus: KeyBus<Sheet>,
    sheet: Sheet,
}

impl<S: ImageSource> GallerySession<S> {
    pub fn new(source: Arc<S>, config: GalleryConfig, columns: usize) -> Self {
        let mut bus = KeyBus::new();
        bus.attach(|sheet: &mut Sheet, key| sheet.on_key(key));
        Self {
            dispatcher: FetchDispatcher::new(source),
            bus,
            sheet: Sheet {
                gallery: PagedGallery::new(config),
                nav: NavigationController::with_columns(columns),
                modal: ModalCoordinator::new(),
                cursor: 0,
                outbox: Vec::new(),
                events: Vec::new(),
            },
        }
    }

    /// Load the first page of `mode`.
    pub fn start(&mut self, mode: Mode) {
        let ticket = self.sheet.gallery.load(mode, 0);
        self.sheet.page_moved(ticket);
        self.flush();
    }

    pub fn handle_key(&mut self, key: Key) -> bool {
        let consumed = self.bus.dispatch(&mut self.sheet, key);
        self.flush();
        consumed
    }

    /// Select `index` on the visible page and open the modal on it.
    pub fn click(&mut self, index: usize) -> bool {
        if self.bus.listener_count() == 0 || self.sheet.modal.is_open() {
            return false;
        }
        if index >= self.sheet.gallery.visible().len() {
            return false;
        }
        self.sheet.cursor = index;
        self.handle_key(Key::Space)
    }

    /// Jump to 1-based `page`; out-of-range pages are ignored.
    pub fn jump_to_page(&mut self, page: usize) -> bool {
        if self.bus.listener_count() == 0 {
            return false;
        }
        match self.sheet.gallery.jump_to_page(page) {
            Some(ticket) => {
                self.sheet.page_moved(Some(ticket));
                self.flush();
                true
            }
            None => false,
        }
    }

    pub async fn next_completion(&mut self) -> Option<Completion> {
        self.dispatcher.next_completion().await
    }

    pub fn apply(&mut self, completion: Completion) {
        self.sheet.gallery.complete(completion);
        self.flush();
    }

    pub async fn settle(&mut self) {
        while let Some(completion) = self.next_completion().await {
            self.apply(completion);
        }
    }

    /// Drain everything that happened since the last call.
    pub fn take_events(&mut self) -> Vec<SheetEvent> {
        std::mem::take(&mut self.sheet.events)
    }

    pub fn visible(&self) -> &[ImageRecord] {
        self.sheet.gallery.visible()
    }

    pub fn selected(&self) -> Option<&ImageRecord> {
        self.sheet.gallery.visible().get(self.sheet.cursor)
    }

    pub fn cursor(&self) -> usize {
        self.sheet.cursor
    }

    pub fn modal_index(&self) -> Option<usize> {
        self.sheet.modal.index()
    }

    pub fn live_layer(&self) -> Layer {
        self.sheet.modal.live_layer()
    }

    pub fn gallery(&self) -> &PagedGallery {
        &self.sheet.gallery
    }

    pub fn columns(&self) -> usize {
        self.sheet.nav.columns().unwrap_or(1)
    }

    pub fn outstanding(&self) -> usize {
        self.dispatcher.outstanding()
    }

    pub fn listener_count(&self) -> usize {
        self.bus.listener_count()
    }

    pub fn source(&self) -> &Arc<S> {
        self.dispatcher.source()
    }

    pub fn dispose(&mut self) {
        self.bus.dispose();
        self.sheet.gallery.dispose();
        self.sheet.outbox.clear();
        self.sheet.drain_gallery();
    }

    fn flush(&mut self) {
        for ticket in self.sheet.outbox.drain(..) {
            self.dispatcher.dispatch(ticket);
        }
        self.sheet.drain_gallery();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySource;

    #[tokio::test]
    async fn test_viewer_reports_initial_load_once() {
        let mut viewer = ViewerSession::new(Arc::new(MemorySource::numbered(4)), LoaderConfig::default());
        viewer.start();
        viewer.settle().await;

        let timings = viewer.take_timings();
        assert_eq!(timings.len(), 1);
        assert_eq!(timings[0].action, "initial_load");

        viewer.handle_key(Key::Left);
        viewer.handle_key(Key::Right);
        let actions: Vec<_> = viewer.take_timings().iter().map(|t| t.action).collect();
        assert_eq!(actions, vec!["arrow_left", "arrow_right"]);
    }

    #[tokio::test]
    async fn test_enter_opens_detail_of_selection() {
        let mut sheet = GallerySession::new(
            Arc::new(MemorySource::numbered(8)),
            GalleryConfig { page_size: 4 },
            2,
        );
        sheet.start(Mode::Numerical);
        sheet.settle().await;
        sheet.take_events();

        sheet.handle_key(Key::Down);
        assert_eq!(sheet.cursor(), 2);
        let id = sheet.selected().map(|r| r.id.clone()).unwrap();
        assert!(sheet.handle_key(Key::Enter));
        assert_eq!(sheet.take_events(), vec![SheetEvent::OpenDetail(id)]);
    }

    #[tokio::test]
    async fn test_page_keys_reset_selection() {
        let mut sheet = GallerySession::new(
            Arc::new(MemorySource::numbered(10)),
            GalleryConfig { page_size: 4 },
            2,
        );
        sheet.start(Mode::Numerical);
        sheet.settle().await;
        sheet.handle_key(Key::Right);
        assert_eq!(sheet.cursor(), 1);

        sheet.handle_key(Key::PageDown);
        assert_eq!(sheet.cursor(), 0);
        sheet.settle().await;
        assert_eq!(sheet.gallery().current_page(), 2);

        assert!(sheet.jump_to_page(3));
        sheet.settle().await;
        assert_eq!(sheet.visible().len(), 2);
        assert!(!sheet.jump_to_page(4));
    }
}
