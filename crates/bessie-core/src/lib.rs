//! bessie-core: Browsing state for a remote, paged photo library.
//!
//! Owns the data/navigation layer of the gallery: windowed block loading
//! for the single-image viewer, paged contact-sheet state in numerical or
//! cluster mode, keyboard navigation and modal focus. Network access goes
//! through the [`ImageSource`] trait; state machines never await.

pub mod bus;
pub mod dispatch;
pub mod fetch;
pub mod gallery;
pub mod loader;
pub mod memory;
pub mod modal;
pub mod natural;
pub mod navigation;
pub mod session;
pub mod source;
pub mod types;

pub use bus::{KeyBus, ListenerId};
pub use dispatch::FetchDispatcher;
pub use fetch::{Completion, FetchState, FetchTicket, LiveToken, Liveness, Payload, Request};
pub use gallery::{GalleryConfig, GalleryEvent, PagedGallery};
pub use loader::{LoaderConfig, WindowedLoader};
pub use memory::MemorySource;
pub use modal::{Layer, ModalCoordinator};
pub use navigation::{Key, NavAction, NavSnapshot, NavigationController, NavigationHandler};
pub use session::{GallerySession, SheetEvent, Timing, ViewerSession};
pub use source::{ImageSource, SourceError};
pub use types::{ClusterEntry, GpsPatch, ImagePage, ImageRecord, Mode};
