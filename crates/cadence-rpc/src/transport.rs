//! Newline-delimited message transport over a Unix stream.

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::net::unix::OwnedWriteHalf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::{debug, warn};

use crate::protocol::encode_line;

/// Longest line accepted from a peer, newline excluded.
pub const MAX_LINE_LENGTH: usize = 4 * 1024 * 1024;

/// Stream of newline-delimited frames.
pub(crate) type LineReader<R> = FramedRead<R, LinesCodec>;

/// Frames `read` into lines of at most [`MAX_LINE_LENGTH`] bytes.
///
/// An overlong line yields `LinesCodecError::MaxLineLengthExceeded` instead
/// of growing the buffer.
pub(crate) fn line_reader<R: AsyncRead>(read: R) -> LineReader<R> {
    FramedRead::new(read, LinesCodec::new_with_max_length(MAX_LINE_LENGTH))
}

/// Queue feeding the writer task. Sending never blocks.
pub(crate) type LineSender = mpsc::UnboundedSender<String>;

/// Spawns the task that owns the write half and drains the queue.
///
/// The task ends when every sender is dropped or the peer stops reading.
pub(crate) fn spawn_writer(mut writer: OwnedWriteHalf) -> (LineSender, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let handle = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if let Err(e) = writer.write_all(line.as_bytes()).await {
                debug!(error = %e, "write failed, closing writer");
                break;
            }
            if let Err(e) = writer.flush().await {
                debug!(error = %e, "flush failed, closing writer");
                break;
            }
        }
        let _ = writer.shutdown().await;
    });
    (tx, handle)
}

/// Encodes `message` and queues it. Returns false if it could not be queued.
pub(crate) fn send<T: Serialize>(tx: &LineSender, message: &T) -> bool {
    match encode_line(message) {
        Ok(line) => tx.send(line).is_ok(),
        Err(e) => {
            warn!(error = %e, "failed to encode outbound message");
            false
        }
    }
}
