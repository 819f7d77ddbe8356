//! RpcRuntime - 每个进程一份的运行时组合
//!
//! 显式构造传输层、注册表和命令服务；需要进程级唯一实例时使用 init_runtime

use std::sync::{Arc, OnceLock};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::info;

use crate::command::{CommandRegistry, CommandService};
use crate::config::RpcConfig;
use crate::ipc::{FrameSink, FrameSource, IpcResult, IpcTransport, JsonLinesSink, JsonLinesSource};

/// 运行时组合
pub struct RpcRuntime {
    config: RpcConfig,
    transport: IpcTransport,
    registry: Arc<CommandRegistry>,
    commands: CommandService,
}

impl RpcRuntime {
    pub fn new(config: RpcConfig) -> Self {
        let transport = IpcTransport::new();
        let registry = Arc::new(CommandRegistry::new());
        let commands = CommandService::new(Arc::clone(&registry), transport.clone(), &config);

        Self {
            config,
            transport,
            registry,
            commands,
        }
    }

    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    pub fn transport(&self) -> &IpcTransport {
        &self.transport
    }

    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    pub fn commands(&self) -> &CommandService {
        &self.commands
    }

    /// 接入物理管道
    pub fn listen<S, R>(&self, sink: S, source: R) -> IpcResult<()>
    where
        S: FrameSink + 'static,
        R: FrameSource + 'static,
    {
        self.transport.listen(sink, source)
    }

    /// 接入字节流（子进程 stdio、套接字等），每帧一行 JSON
    ///
    /// 入站单帧上限取自配置的 `max_frame_bytes`
    pub fn listen_stream<R, W>(&self, reader: R, writer: W) -> IpcResult<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        self.transport.listen(
            JsonLinesSink::new(writer),
            JsonLinesSource::new(reader, self.config.max_frame_bytes),
        )
    }

    /// 拒绝所有等待中的远程调用，注销命令通道并关闭传输层
    pub fn shutdown(&self) {
        self.commands.fail_pending();
        self.commands.dispose();
        self.transport.close();
        info!("RPC 运行时已关闭");
    }
}

/// 全局运行时实例
static GLOBAL_RUNTIME: OnceLock<Arc<RpcRuntime>> = OnceLock::new();

/// 初始化进程级运行时，只能调用一次
pub fn init_runtime(config: RpcConfig) -> Result<Arc<RpcRuntime>, &'static str> {
    let runtime = Arc::new(RpcRuntime::new(config));
    GLOBAL_RUNTIME
        .set(Arc::clone(&runtime))
        .map_err(|_| "RpcRuntime已经初始化")?;
    info!("RPC 运行时初始化完成");
    Ok(runtime)
}

/// 获取进程级运行时，未初始化时返回 None
pub fn get_runtime() -> Option<Arc<RpcRuntime>> {
    GLOBAL_RUNTIME.get().cloned()
}

pub fn is_runtime_initialized() -> bool {
    GLOBAL_RUNTIME.get().is_some()
}

/// 关闭进程级运行时
///
/// 关闭后 get_runtime() 仍返回同一个（已关闭的）实例
pub fn shutdown_runtime() {
    if let Some(runtime) = GLOBAL_RUNTIME.get() {
        runtime.shutdown();
    }
}
