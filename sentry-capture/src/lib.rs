//! Builds Sentry events out of loosely-typed host maps and sends them through
//! a pluggable transport.
//!
//! ```no_run
//! use sentry_capture::{Client, ClientConfig, Datum, SentryTransport};
//!
//! let client = Client::init(
//!     SentryTransport::new(),
//!     "https://public@sentry.example.com/42",
//!     &ClientConfig::default(),
//! )?;
//!
//! let id = client.send_event(&Datum::map([(
//!     Datum::kw("message"),
//!     Datum::map([(Datum::kw("message"), "oh no")]),
//! )]))?;
//! println!("sent {id}");
//!
//! client.close()?;
//! # Ok::<(), sentry_capture::CaptureError>(())
//! ```

pub mod client;
pub mod config;
pub mod datum;
pub mod entities;
pub mod error;
pub mod event;
pub mod level;
pub mod normalize;
pub mod transport;

pub use client::Client;
pub use config::ClientConfig;
pub use datum::Datum;
pub use error::{BuildError, CaptureError, ConfigError, ConversionError, TransportError};
pub use event::{build_event, CapturedError, EventFields};
pub use transport::{EventTransport, SentryTransport};
