//! One live byte-stream endpoint carrying framed messages.

use crate::error::TransportError;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::process::Child;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use toolwire_protocol::{Message, decode_line, encode_line};

type BoxedRead = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWrite = Box<dyn AsyncWrite + Send + Unpin>;

/// One connection: exclusive reader, exclusive writer, idempotent close.
///
/// Framing is stateful (partial lines buffer in the reader), so reads are
/// serialized behind a mutex; callers must not assume concurrent `recv`s
/// interleave meaningfully. Writes lock the writer for the whole line, so a
/// message is never interleaved with another writer's bytes.
pub struct Connection {
    reader: Mutex<Lines<BufReader<BoxedRead>>>,
    writer: Mutex<BoxedWrite>,
    cancel: CancellationToken,
    child: Mutex<Option<Child>>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

impl Connection {
    /// Wrap a reader/writer pair.
    pub fn new(
        read: impl AsyncRead + Send + Unpin + 'static,
        write: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self::with_child(Box::new(read), Box::new(write), None)
    }

    pub(crate) fn with_child(read: BoxedRead, write: BoxedWrite, child: Option<Child>) -> Self {
        Self {
            reader: Mutex::new(BufReader::new(read).lines()),
            writer: Mutex::new(write),
            cancel: CancellationToken::new(),
            child: Mutex::new(child),
        }
    }

    /// Receive the next message.
    ///
    /// Blocks until a full line is available. Returns `Ok(None)` on
    /// end-of-stream or once the connection has been closed; blank lines are
    /// skipped (they cannot desynchronize line framing). A line that fails
    /// to decode is fatal.
    pub async fn recv(&self) -> Result<Option<Message>, TransportError> {
        let mut reader = self.reader.lock().await;
        loop {
            let line = tokio::select! {
                () = self.cancel.cancelled() => return Ok(None),
                line = reader.next_line() => line?,
            };
            let Some(line) = line else {
                return Ok(None);
            };
            if line.trim().is_empty() {
                continue;
            }
            return Ok(Some(decode_line(&line)?));
        }
    }

    /// Encode and write one message, flushing the stream.
    pub async fn send(&self, msg: &Message) -> Result<(), TransportError> {
        if self.cancel.is_cancelled() {
            return Err(TransportError::Closed);
        }
        let line = encode_line(msg)?;
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Close the connection. Idempotent; unblocks any in-progress `recv`.
    ///
    /// For a process connection this closes the child's stdin (EOF) but does
    /// not kill the child — use [`Connection::kill`] for that.
    pub async fn close(&self) {
        self.cancel.cancel();
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
    }

    /// Force-terminate the child process, if this connection owns one.
    pub async fn kill(&self) -> std::io::Result<()> {
        let mut child = self.child.lock().await;
        match child.as_mut() {
            Some(child) => child.kill().await,
            None => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use toolwire_protocol::{Notification, Request};

    fn pair() -> (Connection, Connection) {
        let (a, b) = tokio::io::duplex(64 * 1024);
        let (ar, aw) = tokio::io::split(a);
        let (br, bw) = tokio::io::split(b);
        (Connection::new(ar, aw), Connection::new(br, bw))
    }

    #[tokio::test]
    async fn send_and_receive_one_message() {
        let (left, right) = pair();
        let msg = Message::Request(Request::new(1, "tools/list", None));
        left.send(&msg).await.unwrap();
        let received = right.recv().await.unwrap().unwrap();
        assert_eq!(received, msg);
    }

    #[tokio::test]
    async fn receive_returns_none_on_peer_close() {
        let (left, right) = pair();
        left.close().await;
        let received = right.recv().await.unwrap();
        assert!(received.is_none());
    }

    #[tokio::test]
    async fn close_unblocks_pending_receive() {
        let (_left, right) = pair();
        let right = Arc::new(right);
        let receiver = {
            let right = Arc::clone(&right);
            tokio::spawn(async move { right.recv().await })
        };
        // Let the recv start blocking before closing.
        tokio::time::sleep(Duration::from_millis(20)).await;
        right.close().await;
        let result = tokio::time::timeout(Duration::from_secs(1), receiver)
            .await
            .expect("recv should unblock")
            .unwrap();
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn send_after_close_fails() {
        let (left, _right) = pair();
        left.close().await;
        let msg = Message::Notification(Notification::new("notifications/initialized", None));
        assert!(matches!(
            left.send(&msg).await,
            Err(TransportError::Closed)
        ));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (left, _right) = pair();
        left.close().await;
        left.close().await;
        assert!(left.is_closed());
    }

    #[tokio::test]
    async fn malformed_line_is_fatal() {
        let (a, b) = tokio::io::duplex(1024);
        let (_ar, mut aw) = tokio::io::split(a);
        let (br, bw) = tokio::io::split(b);
        let conn = Connection::new(br, bw);
        tokio::io::AsyncWriteExt::write_all(&mut aw, b"this is not json\n")
            .await
            .unwrap();
        assert!(matches!(
            conn.recv().await,
            Err(TransportError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn blank_lines_are_skipped() {
        let (a, b) = tokio::io::duplex(1024);
        let (_ar, mut aw) = tokio::io::split(a);
        let (br, bw) = tokio::io::split(b);
        let conn = Connection::new(br, bw);
        let line = format!(
            "\n\n{}",
            toolwire_protocol::encode_line(&Message::Notification(Notification::new(
                "ping",
                Some(json!({}))
            )))
            .unwrap()
        );
        tokio::io::AsyncWriteExt::write_all(&mut aw, line.as_bytes())
            .await
            .unwrap();
        let received = conn.recv().await.unwrap().unwrap();
        assert!(matches!(received, Message::Notification(n) if n.method == "ping"));
    }

    #[tokio::test]
    async fn kill_without_child_is_a_no_op() {
        let (left, _right) = pair();
        left.kill().await.unwrap();
    }
}
