//! 逻辑通道与注销句柄

use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// 通道消息处理器
///
/// 在传输层的读取任务中同步调用，不应阻塞
pub trait ChannelHandler: Send + Sync {
    fn on_message(&self, args: Vec<Value>);
}

impl<F> ChannelHandler for F
where
    F: Fn(Vec<Value>) + Send + Sync,
{
    fn on_message(&self, args: Vec<Value>) {
        self(args)
    }
}

/// 命名的逻辑通道
#[derive(Clone)]
pub struct Channel {
    name: String,
    handler: Arc<dyn ChannelHandler>,
}

impl Channel {
    pub fn new<S, H>(name: S, handler: H) -> Self
    where
        S: Into<String>,
        H: ChannelHandler + 'static,
    {
        Self {
            name: name.into(),
            handler: Arc::new(handler),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn on_message(&self, args: Vec<Value>) {
        self.handler.on_message(args);
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel").field("name", &self.name).finish()
    }
}

type DisposeFn = Box<dyn FnOnce() + Send>;

/// 注销句柄
///
/// 只有显式调用 `dispose` 才会注销，丢弃句柄不会。重复调用无副作用。
pub struct Disposable {
    dispose_fn: Mutex<Option<DisposeFn>>,
}

impl Disposable {
    pub fn new<F>(dispose_fn: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            dispose_fn: Mutex::new(Some(Box::new(dispose_fn))),
        }
    }

    pub fn dispose(&self) {
        let dispose_fn = self.dispose_fn.lock().take();
        if let Some(dispose_fn) = dispose_fn {
            dispose_fn();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.dispose_fn.lock().is_none()
    }
}

impl fmt::Debug for Disposable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposable")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
