//! bessie-client: Talks to the photo backend.
//!
//! [`HttpImageSource`] implements the core `ImageSource` over the REST API,
//! [`ClientConfig`] carries connection and browsing settings, and
//! [`TimingReporter`] posts viewer round trips back to the server.

pub mod config;
pub mod http;
pub mod timing;

pub use config::{ClientConfig, ConfigError};
pub use http::HttpImageSource;
pub use timing::{TimingEntry, TimingReporter};
