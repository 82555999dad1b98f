use pin_project_lite::pin_project;
use std::io::Result as IoResult;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::task::{Context, Poll, ready};
use tokio::io::{AsyncRead, ReadBuf};

/// A point-in-time view of an upload's progress.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UploadProgress {
    /// Bytes read from the source so far; never decreases.
    pub bytes_transferred: u64,
    /// Set once end-of-stream has been observed.
    pub complete: bool,
}

#[derive(Debug, Default)]
struct Counters {
    bytes: AtomicU64,
    complete: AtomicBool,
}

/// Cloneable, lock-free handle onto the counters of a [`ProgressReader`].
///
/// Safe to sample from any task or thread while the reader is being polled.
#[derive(Clone, Debug, Default)]
pub struct Progress {
    counters: Arc<Counters>,
}

impl Progress {
    pub fn snapshot(&self) -> UploadProgress {
        // Load completion first: if it's set, the byte count loaded afterwards
        // is guaranteed to be final.
        let complete = self.counters.complete.load(Ordering::Acquire);
        let bytes_transferred = self.counters.bytes.load(Ordering::Acquire);
        UploadProgress { bytes_transferred, complete }
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.counters.bytes.load(Ordering::Acquire)
    }

    pub fn is_complete(&self) -> bool {
        self.counters.complete.load(Ordering::Acquire)
    }

    fn record(&self, bytes: usize) {
        // Infallible: usize always fits in a u64 on supported platforms.
        self.counters.bytes.fetch_add(u64::try_from(bytes).unwrap_or(u64::MAX), Ordering::AcqRel);
    }

    fn finish(&self) {
        self.counters.complete.store(true, Ordering::Release);
    }
}

pin_project! {
    /// Wraps an [`AsyncRead`], counting every byte handed to the caller.
    ///
    /// A read that returns zero bytes into a non-empty buffer is end-of-stream
    /// and marks the progress as complete. Errors are passed through untouched
    /// and never mark completion.
    pub struct ProgressReader<R> {
        #[pin]
        inner: R,
        progress: Progress,
    }
}

impl<R: AsyncRead> ProgressReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, progress: Progress::default() }
    }

    /// A handle that can be moved into a reporting task.
    pub fn progress(&self) -> Progress {
        self.progress.clone()
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: AsyncRead> AsyncRead for ProgressReader<R> {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<IoResult<()>> {
        let this = self.project();
        let before = buf.filled().len();
        let wanted = buf.remaining();
        ready!(this.inner.poll_read(cx, buf))?;
        let read = buf.filled().len() - before;
        if read > 0 {
            this.progress.record(read);
        } else if wanted > 0 {
            this.progress.finish();
        }
        Poll::Ready(Ok(()))
    }
}
