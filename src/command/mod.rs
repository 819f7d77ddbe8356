// 命令系统：注册表、处理器抽象与本地/远程调用服务

pub mod error;
pub mod handler;
pub mod registry;
pub mod service;

pub use error::{CommandError, CommandResult, ErrorSeverity, COMMAND_NOT_FOUND_CODE};
pub use handler::{handler_fn, sync_handler_fn, CommandArgs, CommandHandler, FnHandler, SyncFnHandler};
pub use registry::{Command, CommandRegistry, CommandStats};
pub use service::CommandService;
