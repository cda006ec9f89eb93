//! 基于暂存缓冲区的分块传输循环。
//!
//! 上传与下载都只经过调用方持有的那块缓冲区，按顺序逐块读写，
//! 后一块永远不会先于前一块完成。

use axum::body::{Body as AxumBody, BodyDataStream, Bytes};
use futures_util::stream::StreamExt;
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time;
use tracing::debug;

use crate::error::FileError;

/// Where upload bytes come from.
pub trait ChunkSource {
    /// Fills at most `buf.len()` bytes; `Ok(0)` means the body has ended.
    fn recv(&mut self, buf: &mut [u8]) -> impl Future<Output = Result<usize, FileError>> + Send;
}

/// Where download chunks go.
pub trait ChunkSink {
    fn send_chunk(&mut self, chunk: &[u8]) -> impl Future<Output = Result<(), FileError>> + Send;
}

/// Request body adapter that hands out frames piecewise.
pub struct BodySource {
    stream: BodyDataStream,
    pending: Bytes,
}

impl BodySource {
    pub fn new(body: AxumBody) -> Self {
        Self {
            stream: body.into_data_stream(),
            pending: Bytes::new(),
        }
    }
}

impl ChunkSource for BodySource {
    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, FileError> {
        while self.pending.is_empty() {
            match self.stream.next().await {
                Some(Ok(frame)) => self.pending = frame,
                Some(Err(err)) => return Err(FileError::ReceiveFailure(err.to_string())),
                None => return Ok(0),
            }
        }
        let count = buf.len().min(self.pending.len());
        buf[..count].copy_from_slice(&self.pending.split_to(count));
        Ok(count)
    }
}

/// Response body channel. Capacity 1 keeps a single chunk copy in flight.
pub struct BodySink {
    tx: mpsc::Sender<Result<Bytes, io::Error>>,
}

impl BodySink {
    pub fn channel() -> (Self, mpsc::Receiver<Result<Bytes, io::Error>>) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx }, rx)
    }

    /// 以错误帧结束响应体，传输层据此中止而不是正常收尾。
    pub async fn abort(self, err: io::Error) {
        let _ = self.tx.send(Err(err)).await;
    }
}

impl ChunkSink for BodySink {
    async fn send_chunk(&mut self, chunk: &[u8]) -> Result<(), FileError> {
        self.tx
            .send(Ok(Bytes::copy_from_slice(chunk)))
            .await
            .map_err(|_| FileError::SendFailure("response body dropped".into()))
    }
}

/// Turns the receiving half of a [`BodySink`] into a streaming response body.
pub fn body_from_channel(rx: mpsc::Receiver<Result<Bytes, io::Error>>) -> AxumBody {
    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    });
    AxumBody::from_stream(stream)
}

/// 将 `declared` 字节从 `source` 逐块收入 `buf` 并写入 `sink`。
///
/// 单次接收超过 `chunk_timeout` 记为一次超时并重试，连续超时超过
/// `max_retries` 次后返回 `Timeout`。请求体提前结束视为接收失败。
pub async fn receive_into<S, W>(
    source: &mut S,
    sink: &mut W,
    buf: &mut [u8],
    declared: u64,
    chunk_timeout: Duration,
    max_retries: u32,
) -> Result<u64, FileError>
where
    S: ChunkSource,
    W: AsyncWrite + Unpin,
{
    let mut remaining = declared;
    let mut timeouts: u32 = 0;

    while remaining > 0 {
        let want = usize::try_from(remaining).map_or(buf.len(), |left| left.min(buf.len()));
        let received = time::timeout(chunk_timeout, source.recv(&mut buf[..want]))
            .await
            .unwrap_or(Err(FileError::ReceiveTimeout));
        let received = match received {
            Ok(0) => {
                return Err(FileError::ReceiveFailure(format!(
                    "body ended with {remaining} bytes outstanding"
                )));
            }
            Ok(count) => count,
            Err(err) if err.is_retryable() => {
                timeouts += 1;
                if timeouts > max_retries {
                    return Err(FileError::Timeout { attempts: timeouts });
                }
                debug!(attempt = timeouts, remaining, "receive timed out, retrying");
                continue;
            }
            Err(err) => return Err(err),
        };
        timeouts = 0;

        sink.write_all(&buf[..received])
            .await
            .map_err(FileError::WriteFailure)?;
        remaining -= received as u64;
        debug!(received, remaining, "chunk stored");
    }

    Ok(declared)
}

/// 从 `reader` 逐块读入 `buf` 并发送到 `sink`，直到读到 0 字节。
///
/// 发送失败或超过 `chunk_timeout` 立即返回 `SendFailure`，不重试。
pub async fn stream_out<R, K>(
    reader: &mut R,
    sink: &mut K,
    buf: &mut [u8],
    chunk_timeout: Duration,
) -> Result<u64, FileError>
where
    R: AsyncRead + Unpin,
    K: ChunkSink,
{
    let mut sent: u64 = 0;
    loop {
        let count = reader.read(buf).await.map_err(FileError::ReadFailure)?;
        if count == 0 {
            return Ok(sent);
        }
        time::timeout(chunk_timeout, sink.send_chunk(&buf[..count]))
            .await
            .map_err(|_| FileError::SendFailure("peer stalled".into()))??;
        sent += count as u64;
        debug!(chunk = count, sent, "chunk sent");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::collections::VecDeque;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    const QUICK: Duration = Duration::from_millis(20);

    enum Step {
        Data(Vec<u8>),
        Stall,
        Fail,
    }

    struct ScriptedSource {
        steps: VecDeque<Step>,
    }

    impl ScriptedSource {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: steps.into(),
            }
        }
    }

    impl ChunkSource for ScriptedSource {
        async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, FileError> {
            match self.steps.pop_front() {
                None => Ok(0),
                Some(Step::Stall) => std::future::pending().await,
                Some(Step::Fail) => Err(FileError::ReceiveFailure("connection reset".into())),
                Some(Step::Data(mut data)) => {
                    let count = buf.len().min(data.len());
                    buf[..count].copy_from_slice(&data[..count]);
                    let rest = data.split_off(count);
                    if !rest.is_empty() {
                        self.steps.push_front(Step::Data(rest));
                    }
                    Ok(count)
                }
            }
        }
    }

    /// Accepts `room` bytes, then reports a zero-length write.
    struct FullDisk {
        written: Vec<u8>,
        room: usize,
    }

    impl AsyncWrite for FullDisk {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            let left = self.room - self.written.len();
            let count = left.min(buf.len());
            self.written.extend_from_slice(&buf[..count]);
            Poll::Ready(Ok(count))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[derive(Default)]
    struct CollectSink {
        chunks: Vec<Vec<u8>>,
        fail_after: Option<usize>,
    }

    impl ChunkSink for CollectSink {
        async fn send_chunk(&mut self, chunk: &[u8]) -> Result<(), FileError> {
            if self.fail_after == Some(self.chunks.len()) {
                return Err(FileError::SendFailure("peer closed".into()));
            }
            self.chunks.push(chunk.to_vec());
            Ok(())
        }
    }

    #[tokio::test]
    async fn receive_respects_buffer_capacity() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let mut source = ScriptedSource::new(vec![Step::Data(payload.clone())]);
        let mut file = Vec::new();
        let mut buf = [0u8; 64];

        let written = receive_into(&mut source, &mut file, &mut buf, 1000, QUICK, 0)
            .await
            .expect("receive");
        assert_eq!(written, 1000);
        assert_eq!(file, payload);
    }

    #[tokio::test]
    async fn receive_stops_at_declared_length() {
        let mut source = ScriptedSource::new(vec![Step::Data(b"hello world".to_vec())]);
        let mut file = Vec::new();
        let mut buf = [0u8; 4];

        receive_into(&mut source, &mut file, &mut buf, 5, QUICK, 0)
            .await
            .expect("receive");
        assert_eq!(file, b"hello");
    }

    #[tokio::test]
    async fn receive_retries_timeouts_within_budget() {
        let mut source = ScriptedSource::new(vec![
            Step::Data(b"ab".to_vec()),
            Step::Stall,
            Step::Stall,
            Step::Data(b"cd".to_vec()),
        ]);
        let mut file = Vec::new();
        let mut buf = [0u8; 8];

        receive_into(&mut source, &mut file, &mut buf, 4, QUICK, 2)
            .await
            .expect("receive");
        assert_eq!(file, b"abcd");
    }

    #[tokio::test]
    async fn receive_gives_up_after_retry_budget() {
        let mut source = ScriptedSource::new(vec![Step::Stall, Step::Stall, Step::Stall]);
        let mut file = Vec::new();
        let mut buf = [0u8; 8];

        let result = receive_into(&mut source, &mut file, &mut buf, 4, QUICK, 2).await;
        assert!(matches!(result, Err(FileError::Timeout { attempts: 3 })));
    }

    #[tokio::test]
    async fn receive_failure_is_not_retried() {
        let mut source = ScriptedSource::new(vec![Step::Fail, Step::Data(b"late".to_vec())]);
        let mut file = Vec::new();
        let mut buf = [0u8; 8];

        let result = receive_into(&mut source, &mut file, &mut buf, 4, QUICK, 5).await;
        assert!(matches!(result, Err(FileError::ReceiveFailure(_))));
    }

    #[tokio::test]
    async fn short_body_is_a_receive_failure() {
        let mut source = ScriptedSource::new(vec![Step::Data(b"abc".to_vec())]);
        let mut file = Vec::new();
        let mut buf = [0u8; 8];

        let result = receive_into(&mut source, &mut file, &mut buf, 10, QUICK, 0).await;
        assert!(matches!(result, Err(FileError::ReceiveFailure(_))));
    }

    #[tokio::test]
    async fn short_write_is_a_write_failure() {
        let mut source = ScriptedSource::new(vec![Step::Data(vec![7u8; 100])]);
        let mut disk = FullDisk {
            written: Vec::new(),
            room: 40,
        };
        let mut buf = [0u8; 32];

        let result = receive_into(&mut source, &mut disk, &mut buf, 100, QUICK, 0).await;
        assert!(matches!(result, Err(FileError::WriteFailure(_))));
        assert_eq!(disk.written.len(), 40);
    }

    #[tokio::test]
    async fn stream_out_sends_bounded_chunks_in_order() {
        let data: Vec<u8> = (0..150u8).collect();
        let mut reader = &data[..];
        let mut sink = CollectSink::default();
        let mut buf = [0u8; 64];

        let sent = stream_out(&mut reader, &mut sink, &mut buf, QUICK)
            .await
            .expect("stream");
        assert_eq!(sent, 150);
        assert!(sink.chunks.iter().all(|chunk| chunk.len() <= 64));
        assert_eq!(sink.chunks.concat(), data);
    }

    #[tokio::test]
    async fn stream_out_stops_on_first_send_failure() {
        let data = vec![1u8; 300];
        let mut reader = &data[..];
        let mut sink = CollectSink {
            fail_after: Some(1),
            ..Default::default()
        };
        let mut buf = [0u8; 64];

        let result = stream_out(&mut reader, &mut sink, &mut buf, QUICK).await;
        assert!(matches!(result, Err(FileError::SendFailure(_))));
        assert_eq!(sink.chunks.len(), 1);
    }

    #[tokio::test]
    async fn body_source_splits_frames_to_fit() {
        let mut source = BodySource::new(AxumBody::from("hello world"));
        let mut buf = [0u8; 4];
        let mut collected = Vec::new();
        loop {
            let count = source.recv(&mut buf).await.expect("recv");
            if count == 0 {
                break;
            }
            collected.extend_from_slice(&buf[..count]);
        }
        assert_eq!(collected, b"hello world");
    }

    #[tokio::test]
    async fn body_sink_feeds_response_body() {
        let (mut sink, rx) = BodySink::channel();
        let body = body_from_channel(rx);
        let producer = tokio::spawn(async move {
            sink.send_chunk(b"he").await.expect("send");
            sink.send_chunk(b"llo").await.expect("send");
        });
        let bytes = body.collect().await.expect("collect").to_bytes();
        producer.await.expect("join");
        assert_eq!(&bytes[..], b"hello");
    }

    #[tokio::test]
    async fn dropped_body_fails_send() {
        let (mut sink, rx) = BodySink::channel();
        drop(rx);
        let result = sink.send_chunk(b"data").await;
        assert!(matches!(result, Err(FileError::SendFailure(_))));
    }
}
