//! Bounded in-memory pipe from a blocking writer to an async reader.

use std::io::{Error as IoError, ErrorKind as IoErrorKind, Result as IoResult, Write};
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::mpsc::{Receiver, Sender, channel};

/// Largest chunk accepted by a single call to [`PipeWriter::write`]. Larger
/// buffers are accepted partially; `write_all` takes care of the rest.
const MAX_CHUNK_SIZE: usize = 64 * 1024;

enum Frame {
    Chunk(Vec<u8>),
    End,
}

/// Create a connected writer/reader pair.
///
/// The channel between the two halves holds a single chunk: a write blocks
/// until the reader has taken the previous chunk, and a read waits until the
/// writer has produced the next one.
///
/// The stream only ends cleanly when [`PipeWriter::close`] is called. If the
/// writer is dropped without closing, the reader fails with
/// [`UnexpectedEof`](std::io::ErrorKind::UnexpectedEof) so that a producer
/// failure can never be mistaken for a complete stream. If the reader is
/// dropped, writes fail with [`BrokenPipe`](std::io::ErrorKind::BrokenPipe).
///
/// # Examples
///
/// ```
/// use std::io::Write;
/// use tokio::io::AsyncReadExt;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> std::io::Result<()> {
/// let (mut writer, mut reader) = tarship_asyncutils::pipe();
/// let producer = tokio::task::spawn_blocking(move || {
///     writer.write_all(b"hello")?;
///     writer.close()
/// });
/// let mut received = Vec::new();
/// reader.read_to_end(&mut received).await?;
/// producer.await??;
/// assert_eq!(received, b"hello");
/// # Ok(())
/// # }
/// ```
pub fn pipe() -> (PipeWriter, PipeReader) {
    let (sender, receiver) = channel(1);
    let writer = PipeWriter { sender: Some(sender) };
    let reader = PipeReader {
        receiver,
        chunk: Vec::new(),
        offset: 0,
        finished: false,
    };
    (writer, reader)
}

/// Blocking write half of a [`pipe()`].
///
/// Must only be used from a blocking context (a dedicated thread or
/// [`spawn_blocking`](tokio::task::spawn_blocking)); writing from inside an
/// async task would stall the runtime.
pub struct PipeWriter {
    sender: Option<Sender<Frame>>,
}

impl PipeWriter {
    /// Signal a clean end-of-stream to the reader.
    ///
    /// Closing is idempotent; writing after closing fails with
    /// [`BrokenPipe`](std::io::ErrorKind::BrokenPipe).
    pub fn close(&mut self) -> IoResult<()> {
        match self.sender.take() {
            Some(sender) => sender.blocking_send(Frame::End).map_err(|_| reader_gone()),
            None => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_none()
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> IoResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let Some(sender) = self.sender.as_ref() else {
            return Err(IoError::new(IoErrorKind::BrokenPipe, "write after pipe was closed"));
        };
        let len = buf.len().min(MAX_CHUNK_SIZE);
        sender.blocking_send(Frame::Chunk(buf[..len].to_vec())).map_err(|_| reader_gone())?;
        Ok(len)
    }

    fn flush(&mut self) -> IoResult<()> {
        // Every accepted chunk has already been handed to the channel.
        Ok(())
    }
}

fn reader_gone() -> IoError {
    IoError::new(IoErrorKind::BrokenPipe, "pipe reader has gone away")
}

/// Async read half of a [`pipe()`].
pub struct PipeReader {
    receiver: Receiver<Frame>,
    chunk: Vec<u8>,
    offset: usize,
    finished: bool,
}

impl AsyncRead for PipeReader {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<IoResult<()>> {
        let this = &mut *self;
        loop {
            if this.offset < this.chunk.len() {
                let len = (this.chunk.len() - this.offset).min(buf.remaining());
                buf.put_slice(&this.chunk[this.offset..this.offset + len]);
                this.offset += len;
                return Poll::Ready(Ok(()));
            }
            if this.finished {
                return Poll::Ready(Ok(()));
            }
            match ready!(this.receiver.poll_recv(cx)) {
                Some(Frame::Chunk(chunk)) => {
                    this.chunk = chunk;
                    this.offset = 0;
                },
                Some(Frame::End) => this.finished = true,
                None => {
                    return Poll::Ready(Err(IoError::new(
                        IoErrorKind::UnexpectedEof,
                        "archive stream closed before completion",
                    )));
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_clean_close_reaches_eof() {
        let (mut writer, mut reader) = pipe();
        let producer = tokio::task::spawn_blocking(move || {
            writer.write_all(b"first ")?;
            writer.write_all(b"second")?;
            writer.close()
        });
        let mut received = Vec::new();
        reader.read_to_end(&mut received).await.unwrap();
        producer.await.unwrap().unwrap();
        assert_eq!(received, b"first second");
    }

    #[tokio::test]
    async fn test_large_writes_are_chunked() {
        let data: Vec<u8> = (0..(MAX_CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        let expected = data.clone();
        let (mut writer, mut reader) = pipe();
        let producer = tokio::task::spawn_blocking(move || {
            writer.write_all(&data)?;
            writer.close()
        });
        let mut received = Vec::new();
        reader.read_to_end(&mut received).await.unwrap();
        producer.await.unwrap().unwrap();
        assert_eq!(received, expected);
    }

    #[tokio::test]
    async fn test_dropped_writer_is_not_a_clean_eof() {
        let (mut writer, mut reader) = pipe();
        let producer = tokio::task::spawn_blocking(move || {
            writer.write_all(b"partial").unwrap();
            drop(writer);
        });
        let mut received = Vec::new();
        let err = reader.read_to_end(&mut received).await.unwrap_err();
        producer.await.unwrap();
        assert_eq!(err.kind(), IoErrorKind::UnexpectedEof);
        assert_eq!(received, b"partial");
    }

    #[tokio::test]
    async fn test_dropped_reader_breaks_the_pipe() {
        let (mut writer, reader) = pipe();
        drop(reader);
        let result = tokio::task::spawn_blocking(move || writer.write_all(b"nobody listening")).await.unwrap();
        assert_eq!(result.unwrap_err().kind(), IoErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (mut writer, mut reader) = pipe();
        let producer = tokio::task::spawn_blocking(move || {
            writer.close()?;
            assert!(writer.is_closed());
            writer.close()?;
            Ok::<_, IoError>(writer.write(b"late").unwrap_err().kind())
        });
        let mut received = Vec::new();
        reader.read_to_end(&mut received).await.unwrap();
        assert!(received.is_empty());
        assert_eq!(producer.await.unwrap().unwrap(), IoErrorKind::BrokenPipe);
    }

    #[test]
    fn test_writer_blocks_until_reader_drains() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let (mut writer, mut reader) = pipe();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&accepted);
        let producer = std::thread::spawn(move || {
            for _ in 0..4 {
                writer.write_all(&[0u8; 8]).unwrap();
                counter.fetch_add(1, Ordering::SeqCst);
            }
            writer.close().unwrap();
        });
        // With nothing reading, only the single buffered chunk is accepted.
        std::thread::sleep(std::time::Duration::from_millis(100));
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
        let received = runtime.block_on(async {
            let mut received = Vec::new();
            reader.read_to_end(&mut received).await.unwrap();
            received
        });
        producer.join().unwrap();
        assert_eq!(received.len(), 32);
        assert_eq!(accepted.load(Ordering::SeqCst), 4);
    }
}
