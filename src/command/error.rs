/*!
 * 命令系统错误处理
 */

use thiserror::Error;

use crate::ipc::{ErrorPayload, IpcError};

/// 远程响应中表示命令未找到的错误码
pub const COMMAND_NOT_FOUND_CODE: &str = "CommandNotFound";

/// 命令调用错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("命令未找到: {0}")]
    NotFound(String),

    /// 处理器自身失败，显示内容即处理器的错误消息
    #[error("{message}")]
    HandlerFailure { command: String, message: String },

    #[error("传输不可用: {0}")]
    TransportUnavailable(String),

    #[error("远程调用超时: {command} 超过 {timeout_ms}ms")]
    Timeout { command: String, timeout_ms: u64 },

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("无效的命令名称: {0:?}")]
    InvalidName(String),

    /// 等待响应期间通道被关闭
    #[error("通道已关闭: {0}")]
    ChannelClosed(String),
}

impl CommandError {
    pub fn handler_failure<S1: Into<String>, S2: Into<String>>(command: S1, message: S2) -> Self {
        Self::HandlerFailure {
            command: command.into(),
            message: message.into(),
        }
    }

    /// 判断错误是否可恢复（调用方重试可能成功）
    pub fn is_recoverable(&self) -> bool {
        match self {
            CommandError::NotFound(_) => false,
            CommandError::HandlerFailure { .. } => true,
            CommandError::TransportUnavailable(_) => false,
            CommandError::Timeout { .. } => true,
            CommandError::Serialization(_) => false,
            CommandError::InvalidName(_) => false,
            CommandError::ChannelClosed(_) => false,
        }
    }

    /// 获取错误的严重级别
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            CommandError::NotFound(_) => ErrorSeverity::Warning,
            CommandError::HandlerFailure { .. } => ErrorSeverity::Error,
            CommandError::TransportUnavailable(_) => ErrorSeverity::Critical,
            CommandError::Timeout { .. } => ErrorSeverity::Warning,
            CommandError::Serialization(_) => ErrorSeverity::Error,
            CommandError::InvalidName(_) => ErrorSeverity::Warning,
            CommandError::ChannelClosed(_) => ErrorSeverity::Error,
        }
    }

    /// 编码为响应帧中的错误载荷
    pub fn to_payload(&self) -> ErrorPayload {
        match self {
            CommandError::NotFound(_) => ErrorPayload {
                message: self.to_string(),
                code: Some(COMMAND_NOT_FOUND_CODE.to_string()),
            },
            other => ErrorPayload {
                message: other.to_string(),
                code: None,
            },
        }
    }

    /// 从远程错误载荷还原，`command` 为请求方发起的命令名
    pub fn from_payload(command: &str, payload: ErrorPayload) -> Self {
        match payload.code.as_deref() {
            Some(COMMAND_NOT_FOUND_CODE) => CommandError::NotFound(command.to_string()),
            _ => CommandError::handler_failure(command, payload.message),
        }
    }
}

/// 错误严重级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Warning,
    Error,
    Critical,
}

impl From<IpcError> for CommandError {
    fn from(err: IpcError) -> Self {
        CommandError::TransportUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for CommandError {
    fn from(err: serde_json::Error) -> Self {
        CommandError::Serialization(err.to_string())
    }
}

/// 命令调用结果类型
pub type CommandResult<T> = Result<T, CommandError>;
