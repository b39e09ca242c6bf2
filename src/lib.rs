//! # appview-bridge
//!
//! Asynchronous call/callback bridge between a sandboxed client and a
//! privileged host executor.
//!
//! ## Design
//!
//! - **Client side** - [`Bridge`] validates arguments, allocates a correlation
//!   id, registers a pending call and posts a serialized envelope. Callers get
//!   back a future ([`Call`] or [`CallHandle`]).
//! - **Host side** - the [`Executor`](executor::Executor) runs each operation
//!   (file system, remote downloads, SQLite) on its own task and settles the
//!   call through a [`CallbackSink`].
//! - **Boundary** - everything crosses as JSON text: envelopes one way, tagged
//!   [`Outcome`]s the other.
//!
//! The batch downloader fetches many URLs with a fixed concurrency ceiling,
//! reporting progress after every completion, and resolves once with one
//! [`TaskOutcome`] per URL.
//!
//! ## Quick Start
//!
//! ```no_run
//! use appview_bridge::{AppView, Config, Encoding};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let app = AppView::start(Config::with_documents_dir("./documents")).await?;
//!     let bridge = app.bridge();
//!
//!     bridge.write_file("hello.txt", "Hello, world")?.await?;
//!     let text = bridge.read_file("hello.txt", Encoding::Utf8)?.await?;
//!     println!("{}", text);
//!
//!     let results = bridge
//!         .download_files_with_progress(
//!             &["https://example.com/a.png", "https://example.com/b.png"],
//!             |done, total| println!("{}/{}", done, total),
//!         )?
//!         .await?;
//!     for result in results {
//!         println!("{} -> {:?}", result.url, result.outcome);
//!     }
//!
//!     app.shutdown().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Host application wiring
pub mod appview;
/// Client-side dispatcher, registry and transport
pub mod bridge;
/// Settlement encoding and content transport encoding
pub mod codec;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Host-side operation executor
pub mod executor;
/// Path string helpers
pub mod paths;
/// Startup staging of web resources
pub mod resources;
/// Core types
pub mod types;
/// Argument validation
pub mod validate;

// Re-export commonly used types
pub use appview::AppView;
pub use bridge::{Bridge, Call, CallHandle, CallbackSink, ChannelTransport, Envelope, Transport};
pub use codec::Outcome;
pub use config::Config;
pub use error::{Error, ProtocolError, RemoteError, RemoteErrorKind, Result, ValidationError};
pub use types::{CorrelationId, DownloadTask, Encoding, FileStat, Operation, TaskOutcome};
