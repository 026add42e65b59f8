//! Engine and transport boundary for the dataset retriever.
//!
//! The registry core only depends on two small contracts defined here:
//! - [`Engine`]: the storage/transformation backend a script's download
//!   step targets.
//! - [`Transport`]: blocking retrieval of a single URL, returning the status
//!   code and body so callers can tell "not found" apart from other failures.
//!
//! [`FileEngine`] is the bundled engine: it stores raw files below an output
//! directory and nothing else. [`HttpTransport`] is the bundled transport;
//! [`OfflineTransport`] refuses all network access.

pub mod engine;
pub mod error;
pub mod file_engine;
pub mod transport;

pub use engine::Engine;
pub use error::{EngineError, Result, TransportError};
pub use file_engine::FileEngine;
pub use transport::{HttpTransport, OfflineTransport, Response, Transport};
