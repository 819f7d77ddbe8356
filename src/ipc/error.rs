//! IPC 传输层错误

use thiserror::Error;

/// 传输层错误类型
#[derive(Debug, Error)]
pub enum IpcError {
    /// 尚未监听或已经关闭
    #[error("传输不可用: {0}")]
    TransportUnavailable(String),

    /// 对端已断开
    #[error("管道已关闭")]
    Closed,

    /// 帧编解码失败
    #[error("帧编解码失败: {0}")]
    Codec(String),

    #[error("帧过大: {size} 字节 (上限 {max} 字节)")]
    FrameTooLarge { size: usize, max: usize },

    #[error("I/O错误: {0}")]
    Io(#[from] std::io::Error),
}

impl IpcError {
    /// 创建传输不可用错误
    pub fn unavailable<S: Into<String>>(reason: S) -> Self {
        Self::TransportUnavailable(reason.into())
    }

    /// 单帧错误，丢弃该帧后管道仍可继续读取
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Codec(_) | Self::FrameTooLarge { .. })
    }
}

impl From<serde_json::Error> for IpcError {
    fn from(err: serde_json::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

/// 传输层结果类型
pub type IpcResult<T> = Result<T, IpcError>;
