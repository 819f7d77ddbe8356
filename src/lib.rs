//! channel-rpc 命令与通道 RPC 运行时
//!
//! 在一个执行上下文中按名称注册命令，并在本进程内或跨进程调用。
//! 主要功能包括：
//! - 命令注册表与本地调用
//! - 单管道多通道的 IPC 传输层
//! - 基于 correlationId 的远程调用与超时

// 模块声明
pub mod command; // 命令注册与调用
pub mod config; // 运行时配置
pub mod ipc; // 通道多路复用传输层
pub mod runtime; // 进程级运行时组合
pub mod utils; // 日志与错误工具

pub use command::{
    handler_fn, sync_handler_fn, Command, CommandArgs, CommandError, CommandHandler,
    CommandRegistry, CommandResult, CommandService,
};
pub use config::RpcConfig;
pub use ipc::{memory_pipe, Channel, Disposable, Frame, IpcError, IpcTransport, TransportState};
pub use runtime::{get_runtime, init_runtime, shutdown_runtime, RpcRuntime};
