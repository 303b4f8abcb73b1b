//! 行分隔流式读取
//!
//! 以换行符为分隔增量消费字节流：每读到一个分块就递增序号并回调，
//! 分块字节包含结尾换行符，末尾无分隔符的残块也会完整投递一次。
//!
//! 取消是协作式的，只在边界点检查：每次读取之前和每个分块回调之后。
//! 已经阻塞在 IO 上的读取不会被抢占，只会在该次读取返回后被察觉。
//! 取消、底层读错误与回调错误三类终止都携带已处理的字节/分块进度，
//! 部分进度对调用方可见，不会被丢弃。

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use hyper::body::{Body, Bytes};
use pin_project_lite::pin_project;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, ReadBuf};

use crate::utils::logger::debug;

/// 协作式取消标记
///
/// 克隆共享同一底层标记，任意一侧触发后所有持有者都能观察到
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// 触发取消，只在下一个边界点被察觉
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// 流式消费进度
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamProgress {
    /// 已处理字节数（含分隔符）
    pub bytes: u64,
    /// 已投递分块数
    pub chunks: u64,
}

/// 流式消费的终止错误
///
/// 取消是独立的子类，调用方可据此选择不把取消当成故障记录
#[derive(Error, Debug)]
pub enum StreamError {
    /// 调用方触发了取消信号
    #[error("流已取消: 已处理 {bytes} 字节 / {chunks} 个分块")]
    Cancelled { bytes: u64, chunks: u64 },

    /// 底层读取失败（文件结束不算）
    #[error("流读取失败: 已处理 {bytes} 字节 / {chunks} 个分块: {source}")]
    Io {
        bytes: u64,
        chunks: u64,
        #[source]
        source: std::io::Error,
    },

    /// 分块回调返回了错误，与读取错误同样立即终止并传播
    #[error("流回调失败: 已处理 {bytes} 字节 / {chunks} 个分块: {source}")]
    Callback {
        bytes: u64,
        chunks: u64,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StreamError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StreamError::Cancelled { .. })
    }

    /// 终止时的已处理进度
    pub fn progress(&self) -> StreamProgress {
        match self {
            StreamError::Cancelled { bytes, chunks }
            | StreamError::Io { bytes, chunks, .. }
            | StreamError::Callback { bytes, chunks, .. } => StreamProgress {
                bytes: *bytes,
                chunks: *chunks,
            },
        }
    }
}

/// 行分隔流式读取器
///
/// 每次 `consume` 调用独立计数，取消标记可在创建时注入以便外部持有
pub struct LineStreamReader {
    cancel: CancelFlag,
}

impl LineStreamReader {
    pub fn new() -> Self {
        Self {
            cancel: CancelFlag::new(),
        }
    }

    /// 使用外部取消标记创建
    pub fn with_cancel(cancel: CancelFlag) -> Self {
        Self { cancel }
    }

    /// 取得取消标记的克隆，便于在另一个任务中触发取消
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// 增量消费字节流，直到文件结束、出错或被取消
    ///
    /// 成功返回总进度；三类终止错误都携带终止前的进度。
    /// 状态只会从读取中走向完成/中止/取消，终止后不再发生任何回调。
    pub async fn consume<R, F>(&self, source: R, mut on_chunk: F) -> Result<StreamProgress, StreamError>
    where
        R: AsyncRead + Unpin,
        F: FnMut(u64, &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>>,
    {
        let mut reader = BufReader::new(source);
        let mut progress = StreamProgress::default();
        let mut chunk = Vec::new();

        loop {
            // 读取前的取消检查
            if self.cancel.is_cancelled() {
                debug!("🛑 [流式] 读取前检测到取消信号: {:?}", progress);
                return Err(StreamError::Cancelled {
                    bytes: progress.bytes,
                    chunks: progress.chunks,
                });
            }

            chunk.clear();
            let n = reader.read_until(b'\n', &mut chunk).await.map_err(|e| StreamError::Io {
                bytes: progress.bytes,
                chunks: progress.chunks,
                source: e,
            })?;

            if n == 0 {
                // 文件结束，正常完成
                return Ok(progress);
            }

            progress.chunks += 1;
            progress.bytes += n as u64;

            on_chunk(progress.chunks, &chunk).map_err(|e| StreamError::Callback {
                bytes: progress.bytes,
                chunks: progress.chunks,
                source: e,
            })?;

            // 分块回调后的取消检查
            if self.cancel.is_cancelled() {
                debug!("🛑 [流式] 分块后检测到取消信号: {:?}", progress);
                return Err(StreamError::Cancelled {
                    bytes: progress.bytes,
                    chunks: progress.chunks,
                });
            }
        }
    }
}

impl Default for LineStreamReader {
    fn default() -> Self {
        Self::new()
    }
}

pin_project! {
    /// 把 HTTP 响应体适配成 `AsyncRead`
    ///
    /// 逐帧拉取响应体数据，非数据帧（trailers）直接跳过
    pub struct BodyReader<B> {
        #[pin]
        body: B,
        buffer: Bytes,
    }
}

impl<B> BodyReader<B> {
    pub fn new(body: B) -> Self {
        Self {
            body,
            buffer: Bytes::new(),
        }
    }
}

impl<B> AsyncRead for BodyReader<B>
where
    B: Body<Data = Bytes>,
    B::Error: std::fmt::Display,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let mut this = self.project();
        loop {
            // 先吐出缓冲里剩余的数据
            if !this.buffer.is_empty() {
                let to_copy = std::cmp::min(this.buffer.len(), buf.remaining());
                buf.put_slice(&this.buffer.split_to(to_copy));
                return Poll::Ready(Ok(()));
            }

            match this.body.as_mut().poll_frame(cx) {
                Poll::Ready(Some(Ok(frame))) => {
                    if let Ok(data) = frame.into_data() {
                        *this.buffer = data;
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Err(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        e.to_string(),
                    )));
                }
                Poll::Ready(None) => return Poll::Ready(Ok(())),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_two_delimited_chunks() {
        let reader = LineStreamReader::new();
        let seen: Arc<Mutex<Vec<(u64, Vec<u8>)>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_in_cb = seen.clone();

        let progress = reader
            .consume(&b"line1\nline2\n"[..], move |seq, chunk| {
                seen_in_cb.lock().unwrap().push((seq, chunk.to_vec()));
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(progress.bytes, 12);
        assert_eq!(progress.chunks, 2);
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], (1, b"line1\n".to_vec()));
        assert_eq!(seen[1], (2, b"line2\n".to_vec()));
    }

    #[tokio::test]
    async fn test_undelimited_remainder_still_delivered() {
        let reader = LineStreamReader::new();
        let seen: Arc<Mutex<Vec<Vec<u8>>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_in_cb = seen.clone();

        let progress = reader
            .consume(&b"partial"[..], move |_seq, chunk| {
                seen_in_cb.lock().unwrap().push(chunk.to_vec());
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(progress.chunks, 1);
        assert_eq!(progress.bytes, 7);
        assert_eq!(seen.lock().unwrap()[0], b"partial".to_vec());
    }

    #[tokio::test]
    async fn test_cancel_after_first_chunk() {
        let reader = LineStreamReader::new();
        let cancel = reader.cancel_flag();
        let count = Arc::new(Mutex::new(0u64));
        let count_in_cb = count.clone();

        let err = reader
            .consume(&b"line1\nline2\n"[..], move |_seq, _chunk| {
                *count_in_cb.lock().unwrap() += 1;
                cancel.cancel();
                Ok(())
            })
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(err.progress().bytes, b"line1\n".len() as u64);
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cancel_before_any_read() {
        let reader = LineStreamReader::new();
        reader.cancel_flag().cancel();

        let err = reader
            .consume(&b"line1\n"[..], |_seq, _chunk| {
                panic!("取消后不应再有回调");
            })
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(err.progress(), StreamProgress::default());
    }

    #[tokio::test]
    async fn test_callback_error_aborts() {
        let reader = LineStreamReader::new();
        let err = reader
            .consume(&b"line1\nline2\n"[..], |seq, _chunk| {
                if seq >= 2 {
                    Err("业务拒绝".into())
                } else {
                    Ok(())
                }
            })
            .await
            .unwrap_err();

        assert!(!err.is_cancelled());
        assert_eq!(err.progress().chunks, 2);
        assert!(matches!(err, StreamError::Callback { .. }));
    }

    /// 读了一个分块之后持续报错的源
    struct FailingSource {
        served: bool,
    }

    impl AsyncRead for FailingSource {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            if !self.served {
                self.served = true;
                buf.put_slice(b"ok\n");
                return Poll::Ready(Ok(()));
            }
            Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "连接被重置",
            )))
        }
    }

    #[tokio::test]
    async fn test_read_error_propagates_with_progress() {
        let reader = LineStreamReader::new();
        let err = reader
            .consume(FailingSource { served: false }, |_seq, _chunk| Ok(()))
            .await
            .unwrap_err();

        assert!(matches!(err, StreamError::Io { .. }));
        assert_eq!(err.progress().bytes, 3);
        assert_eq!(err.progress().chunks, 1);
    }

    #[tokio::test]
    async fn test_body_reader_adapts_full_body() {
        use http_body_util::Full;

        let body = Full::new(Bytes::from_static(b"a\nb\n"));
        let reader = LineStreamReader::new();
        let progress = reader
            .consume(BodyReader::new(body), |_seq, _chunk| Ok(()))
            .await
            .unwrap();
        assert_eq!(progress.chunks, 2);
        assert_eq!(progress.bytes, 4);
    }
}
