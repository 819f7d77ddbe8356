/*!
 * 物理管道抽象
 *
 * 传输层只通过 FrameSink 写出、通过 FrameSource 读入。这里提供两种实现：
 * - 进程内的内存管道（tokio mpsc），用于同进程的两个上下文以及测试
 * - JSON Lines 流管道，每帧一行 JSON 数组，适用于子进程 stdio、套接字等字节流
 */

use async_trait::async_trait;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::sync::mpsc;

use super::error::{IpcError, IpcResult};
use super::frame::Frame;

/// 帧写出端
#[async_trait]
pub trait FrameSink: Send {
    async fn send_frame(&mut self, frame: Frame) -> IpcResult<()>;

    /// 写出端关闭时调用，默认无操作
    async fn close(&mut self) -> IpcResult<()> {
        Ok(())
    }
}

/// 帧读入端，`Ok(None)` 表示对端已关闭
#[async_trait]
pub trait FrameSource: Send {
    async fn next_frame(&mut self) -> IpcResult<Option<Frame>>;
}

// ===== 内存管道 =====

pub struct MemorySink {
    tx: mpsc::UnboundedSender<Frame>,
}

pub struct MemorySource {
    rx: mpsc::UnboundedReceiver<Frame>,
}

/// 内存管道的一端
pub struct PipeEnd {
    pub sink: MemorySink,
    pub source: MemorySource,
}

/// 创建一对相互连接的内存管道端点
pub fn memory_pipe() -> (PipeEnd, PipeEnd) {
    let (a_tx, b_rx) = mpsc::unbounded_channel();
    let (b_tx, a_rx) = mpsc::unbounded_channel();

    (
        PipeEnd {
            sink: MemorySink { tx: a_tx },
            source: MemorySource { rx: a_rx },
        },
        PipeEnd {
            sink: MemorySink { tx: b_tx },
            source: MemorySource { rx: b_rx },
        },
    )
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send_frame(&mut self, frame: Frame) -> IpcResult<()> {
        self.tx.send(frame).map_err(|_| IpcError::Closed)
    }
}

#[async_trait]
impl FrameSource for MemorySource {
    async fn next_frame(&mut self) -> IpcResult<Option<Frame>> {
        Ok(self.rx.recv().await)
    }
}

// ===== JSON Lines 流管道 =====

pub struct JsonLinesSink<W> {
    writer: W,
}

impl<W> JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl<W> FrameSink for JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send_frame(&mut self, frame: Frame) -> IpcResult<()> {
        let mut line = serde_json::to_vec(&frame)?;
        line.push(b'\n');
        self.writer.write_all(&line).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> IpcResult<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

pub struct JsonLinesSource<R> {
    reader: BufReader<R>,
    max_frame_bytes: usize,
    buf: Vec<u8>,
}

impl<R> JsonLinesSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(reader: R, max_frame_bytes: usize) -> Self {
        Self {
            reader: BufReader::new(reader),
            max_frame_bytes,
            buf: Vec::new(),
        }
    }

    /// 丢弃当前行剩余部分，返回丢弃的字节数
    async fn discard_line(&mut self) -> IpcResult<usize> {
        let mut discarded = 0;
        loop {
            let (consumed, done) = {
                let available = self.reader.fill_buf().await?;
                if available.is_empty() {
                    return Ok(discarded);
                }
                match available.iter().position(|b| *b == b'\n') {
                    Some(pos) => (pos + 1, true),
                    None => (available.len(), false),
                }
            };
            self.reader.consume(consumed);
            discarded += consumed;
            if done {
                return Ok(discarded);
            }
        }
    }
}

#[async_trait]
impl<R> FrameSource for JsonLinesSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn next_frame(&mut self) -> IpcResult<Option<Frame>> {
        loop {
            self.buf.clear();
            let limit = self.max_frame_bytes as u64 + 1;
            let read = read_line_limited(&mut self.reader, limit, &mut self.buf).await?;
            if read == 0 {
                return Ok(None);
            }

            if !self.buf.ends_with(b"\n") && self.buf.len() as u64 >= limit {
                let size = self.buf.len() + self.discard_line().await?;
                return Err(IpcError::FrameTooLarge {
                    size,
                    max: self.max_frame_bytes,
                });
            }

            let line = trim_line_end(&self.buf);
            if line.iter().all(|b| b.is_ascii_whitespace()) {
                continue;
            }

            return serde_json::from_slice::<Frame>(line)
                .map(Some)
                .map_err(IpcError::from);
        }
    }
}

async fn read_line_limited<B>(reader: &mut B, limit: u64, buf: &mut Vec<u8>) -> IpcResult<usize>
where
    B: AsyncBufRead + AsyncRead + Unpin,
{
    let read = reader.take(limit).read_until(b'\n', buf).await?;
    Ok(read)
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
