/*!
 * CommandService - 命令调用入口
 *
 * - call: 在本进程注册表中解析并执行
 * - remote_call: 通过命令通道发送请求，按 correlationId 等待对端响应
 *
 * 同时负责响应对端发来的请求：在本地注册表执行后把结果写回同一通道。
 */

use dashmap::DashMap;
use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use serde_json::Value;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use super::error::{CommandError, CommandResult};
use super::handler::CommandArgs;
use super::registry::CommandRegistry;
use crate::config::RpcConfig;
use crate::ipc::{Channel, CommandEnvelope, Disposable, IpcTransport};

/// 等待响应的远程调用
struct PendingCall {
    command: String,
    sender: oneshot::Sender<CommandResult<Value>>,
}

struct ServiceInner {
    registry: Arc<CommandRegistry>,
    transport: IpcTransport,
    channel_name: String,
    default_timeout: Option<Duration>,
    pending: DashMap<String, PendingCall>,
    registration: Mutex<Option<Disposable>>,
}

/// 命令服务，克隆后共享同一实例
#[derive(Clone)]
pub struct CommandService {
    inner: Arc<ServiceInner>,
}

impl CommandService {
    /// 创建命令服务并在传输层上注册命令通道
    pub fn new(registry: Arc<CommandRegistry>, transport: IpcTransport, config: &RpcConfig) -> Self {
        let inner = Arc::new(ServiceInner {
            registry,
            transport,
            channel_name: config.command_channel.clone(),
            default_timeout: config.remote_call_timeout(),
            pending: DashMap::new(),
            registration: Mutex::new(None),
        });

        let weak: Weak<ServiceInner> = Arc::downgrade(&inner);
        let channel = Channel::new(inner.channel_name.clone(), move |args: Vec<Value>| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_message(args);
            }
        });
        let registration = inner.transport.register_channel(channel);
        *inner.registration.lock() = Some(registration);

        Self { inner }
    }

    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.inner.registry
    }

    pub fn channel_name(&self) -> &str {
        &self.inner.channel_name
    }

    /// 本地调用
    pub async fn call(&self, name: &str, args: CommandArgs) -> CommandResult<Value> {
        self.inner.registry.execute(name, args).await
    }

    /// 本地调用，失败只记录日志
    pub fn call_and_ignore_failure(&self, name: &str, args: CommandArgs) {
        let service = self.clone();
        let name = name.to_string();
        tokio::spawn(async move {
            if let Err(e) = service.call(&name, args).await {
                debug!("忽略本地命令失败: command={}, error={}", name, e);
            }
        });
    }

    /// 远程调用，使用配置中的默认超时
    pub async fn remote_call(&self, name: &str, args: CommandArgs) -> CommandResult<Value> {
        self.remote_call_with_timeout(name, args, self.inner.default_timeout)
            .await
    }

    /// 远程调用，`timeout` 为 `None` 时无限等待
    #[instrument(skip(self, args), fields(command = %name))]
    pub async fn remote_call_with_timeout(
        &self,
        name: &str,
        args: CommandArgs,
        timeout: Option<Duration>,
    ) -> CommandResult<Value> {
        let correlation_id = Uuid::new_v4().to_string();
        let request = CommandEnvelope::request(&correlation_id, name, args).to_value()?;

        let (sender, receiver) = oneshot::channel();
        self.inner.pending.insert(
            correlation_id.clone(),
            PendingCall {
                command: name.to_string(),
                sender,
            },
        );
        // 调用方放弃等待或超时时清理等待项
        let _guard = PendingGuard {
            inner: &self.inner,
            correlation_id: &correlation_id,
        };

        self.inner
            .transport
            .send(&self.inner.channel_name, vec![request])?;
        debug!("发送远程调用: correlation_id={}", correlation_id);

        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, receiver).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(
                        "远程调用超时: command={}, correlation_id={}",
                        name, correlation_id
                    );
                    return Err(CommandError::Timeout {
                        command: name.to_string(),
                        timeout_ms: duration_millis(limit),
                    });
                }
            },
            None => receiver.await,
        };

        outcome.map_err(|_| CommandError::ChannelClosed(self.inner.channel_name.clone()))?
    }

    /// 远程调用，失败只记录日志
    pub fn remote_call_and_ignore_failure(&self, name: &str, args: CommandArgs) {
        let service = self.clone();
        let name = name.to_string();
        tokio::spawn(async move {
            if let Err(e) = service.remote_call(&name, args).await {
                debug!("忽略远程命令失败: command={}, error={}", name, e);
            }
        });
    }

    /// 当前等待响应的远程调用数量
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    /// 以 ChannelClosed 拒绝所有等待中的远程调用
    pub fn fail_pending(&self) {
        let ids: Vec<String> = self
            .inner
            .pending
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        for id in ids {
            if let Some((_, pending)) = self.inner.pending.remove(&id) {
                let _ = pending.sender.send(Err(CommandError::ChannelClosed(
                    self.inner.channel_name.clone(),
                )));
            }
        }
    }

    /// 从传输层注销命令通道
    pub fn dispose(&self) {
        if let Some(registration) = self.inner.registration.lock().take() {
            registration.dispose();
        }
    }
}

impl ServiceInner {
    fn handle_message(self: &Arc<Self>, args: Vec<Value>) {
        let Some(payload) = args.into_iter().next() else {
            debug!("丢弃空的命令帧");
            return;
        };

        let envelope = match CommandEnvelope::from_value(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!("丢弃无法解析的命令信封: {}", e);
                return;
            }
        };

        match envelope {
            CommandEnvelope::Request {
                correlation_id,
                command_name,
                args,
            } => self.handle_request(correlation_id, command_name, args),
            CommandEnvelope::Response {
                correlation_id,
                result,
                error,
            } => {
                let Some((_, pending)) = self.pending.remove(&correlation_id) else {
                    debug!("丢弃无匹配的响应: correlation_id={}", correlation_id);
                    return;
                };

                let outcome = match error {
                    Some(payload) => Err(CommandError::from_payload(&pending.command, payload)),
                    None => Ok(result.unwrap_or(Value::Null)),
                };
                let _ = pending.sender.send(outcome);
            }
        }
    }

    fn handle_request(self: &Arc<Self>, correlation_id: String, command_name: String, args: CommandArgs) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            // 处理器 panic 时同样回写失败响应
            let outcome = AssertUnwindSafe(inner.registry.execute(&command_name, args))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    let message = panic_message(panic.as_ref());
                    error!(
                        "命令处理器 panic: command={}, message={}",
                        command_name, message
                    );
                    Err(CommandError::handler_failure(&command_name, message))
                });

            let response = match outcome {
                Ok(value) => CommandEnvelope::success(&correlation_id, value),
                Err(e) => CommandEnvelope::failure(&correlation_id, e.to_payload()),
            };

            let sent = response
                .to_value()
                .map_err(CommandError::from)
                .and_then(|value| {
                    inner
                        .transport
                        .send(&inner.channel_name, vec![value])
                        .map_err(CommandError::from)
                });
            if let Err(e) = sent {
                warn!(
                    "发送命令响应失败: command={}, correlation_id={}, error={}",
                    command_name, correlation_id, e
                );
            }
        });
    }
}

/// 毫秒数超出 u64 时取上限
fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "命令处理器 panic".to_string()
    }
}

struct PendingGuard<'a> {
    inner: &'a ServiceInner,
    correlation_id: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.inner.pending.remove(self.correlation_id);
    }
}
