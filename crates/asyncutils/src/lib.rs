//! Plumbing between the blocking archive writer and the async uploader.
//!
//! - [`pipe()`] connects a blocking [`Write`](std::io::Write) to an async
//!   [`AsyncRead`](tokio::io::AsyncRead) with at most one chunk in flight, so
//!   an archive can be produced and uploaded concurrently without ever being
//!   held in memory (or on disk) in full.
//! - [`ProgressReader`] counts the bytes flowing through any async reader and
//!   exposes them through a lock-free [`Progress`] handle.

mod pipe;
mod progress;

pub use crate::pipe::{PipeReader, PipeWriter, pipe};
pub use crate::progress::{Progress, ProgressReader, UploadProgress};
