/*!
 * IpcTransport - 单一物理管道上的通道多路复用器
 *
 * 负责：通道注册/注销、出站帧排队写出、入站帧按通道名分发。
 * 入站帧只在读取任务中读取，未注册通道的帧直接丢弃。
 */

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::channel::{Channel, Disposable};
use super::error::{IpcError, IpcResult};
use super::frame::Frame;
use super::pipe::{FrameSink, FrameSource};

/// 传输层状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportState {
    /// 已创建，尚未接入管道
    Idle,
    /// 已接入管道，正在读取
    Listening,
    /// 已关闭，不可再发送
    Closed,
}

struct ChannelEntry {
    generation: u64,
    channel: Channel,
}

struct TransportInner {
    channels: DashMap<String, ChannelEntry>,
    next_generation: AtomicU64,
    state: RwLock<TransportState>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Frame>>>,
    reader_handle: Mutex<Option<JoinHandle<()>>>,
    closed: Notify,
}

/// 通道多路复用传输层，克隆后共享同一实例
#[derive(Clone)]
pub struct IpcTransport {
    inner: Arc<TransportInner>,
}

impl Default for IpcTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl IpcTransport {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TransportInner {
                channels: DashMap::new(),
                next_generation: AtomicU64::new(1),
                state: RwLock::new(TransportState::Idle),
                outbound: Mutex::new(None),
                reader_handle: Mutex::new(None),
                closed: Notify::new(),
            }),
        }
    }

    pub fn state(&self) -> TransportState {
        *self.inner.state.read()
    }

    /// 等待传输层进入 Closed（本端关闭或对端断开）
    pub async fn closed(&self) {
        loop {
            let notified = self.inner.closed.notified();
            if self.state() == TransportState::Closed {
                return;
            }
            notified.await;
        }
    }

    /// 注册通道，同名通道会被替换
    ///
    /// 返回的句柄只注销本次注册；被替换后的旧句柄调用时无效果
    pub fn register_channel(&self, channel: Channel) -> Disposable {
        let name = channel.name().to_string();
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);

        let replaced = self
            .inner
            .channels
            .insert(name.clone(), ChannelEntry { generation, channel })
            .is_some();
        if replaced {
            debug!("通道已被替换: channel={}", name);
        } else {
            debug!("注册通道: channel={}", name);
        }

        let weak: Weak<TransportInner> = Arc::downgrade(&self.inner);
        Disposable::new(move || {
            if let Some(inner) = weak.upgrade() {
                let removed = inner
                    .channels
                    .remove_if(&name, |_, entry| entry.generation == generation)
                    .is_some();
                if removed {
                    debug!("注销通道: channel={}", name);
                }
            }
        })
    }

    pub fn has_channel(&self, name: &str) -> bool {
        self.inner.channels.contains_key(name)
    }

    pub fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .channels
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    /// 接入物理管道并开始监听
    ///
    /// 必须在 tokio 运行时内调用，且只能调用一次
    #[instrument(skip_all)]
    pub fn listen<S, R>(&self, sink: S, source: R) -> IpcResult<()>
    where
        S: FrameSink + 'static,
        R: FrameSource + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| IpcError::unavailable("listen 必须在 tokio 运行时内调用"))?;

        {
            let mut state = self.inner.state.write();
            if *state != TransportState::Idle {
                return Err(IpcError::unavailable(format!(
                    "传输层状态为 {:?}，无法重复监听",
                    *state
                )));
            }
            *state = TransportState::Listening;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *self.inner.outbound.lock() = Some(tx);

        runtime.spawn(write_loop(sink, rx));
        let reader = runtime.spawn(read_loop(Arc::downgrade(&self.inner), source));
        *self.inner.reader_handle.lock() = Some(reader);

        info!("IPC 传输层开始监听");
        Ok(())
    }

    /// 向指定通道发送一帧
    ///
    /// 帧按调用顺序写出；未监听或已关闭时立即失败
    pub fn send(&self, channel: &str, args: Vec<Value>) -> IpcResult<()> {
        let sent = self
            .inner
            .outbound
            .lock()
            .as_ref()
            .map(|tx| tx.send(Frame::new(channel, args)).is_ok());

        match sent {
            Some(true) => Ok(()),
            Some(false) => Err(IpcError::unavailable("写出任务已退出")),
            None => Err(IpcError::unavailable(format!(
                "传输层状态为 {:?}",
                self.state()
            ))),
        }
    }

    /// 关闭传输层
    ///
    /// 已排队的出站帧仍会写出，之后写出端关闭
    pub fn close(&self) {
        self.inner.mark_closed();
        if let Some(reader) = self.inner.reader_handle.lock().take() {
            reader.abort();
        }
        info!("IPC 传输层已关闭");
    }
}

impl TransportInner {
    fn mark_closed(&self) {
        *self.state.write() = TransportState::Closed;
        self.outbound.lock().take();
        self.closed.notify_waiters();
    }

    fn dispatch(&self, frame: Frame) {
        // 先克隆出通道再调用，避免处理器内注册通道时持有分片锁
        let channel = self
            .channels
            .get(&frame.channel)
            .map(|entry| entry.channel.clone());

        match channel {
            Some(channel) => channel.on_message(frame.args),
            None => debug!("丢弃未注册通道的帧: channel={}", frame.channel),
        }
    }
}

async fn write_loop<S>(mut sink: S, mut rx: mpsc::UnboundedReceiver<Frame>)
where
    S: FrameSink,
{
    while let Some(frame) = rx.recv().await {
        if let Err(e) = sink.send_frame(frame).await {
            warn!("写出帧失败，停止写出: {}", e);
            break;
        }
    }

    if let Err(e) = sink.close().await {
        debug!("关闭写出端失败: {}", e);
    }
}

async fn read_loop<R>(inner: Weak<TransportInner>, mut source: R)
where
    R: FrameSource,
{
    loop {
        let result = source.next_frame().await;
        let Some(inner) = inner.upgrade() else {
            return;
        };

        match result {
            Ok(Some(frame)) => inner.dispatch(frame),
            Ok(None) => {
                info!("对端已关闭管道");
                inner.mark_closed();
                return;
            }
            Err(e) if e.is_recoverable() => {
                debug!("丢弃无效帧: {}", e);
            }
            Err(e) => {
                warn!("读取管道失败: {}", e);
                inner.mark_closed();
                return;
            }
        }
    }
}
