/*!
 * CommandHandler trait
 *
 * 处理器接收任意长度的位置参数，返回 JSON 值或错误。
 * 闭包通过 handler_fn / sync_handler_fn 适配。
 */

use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;

use crate::utils::error::AppResult;

/// 命令位置参数
pub type CommandArgs = Vec<Value>;

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn invoke(&self, args: CommandArgs) -> AppResult<Value>;
}

/// 异步闭包处理器
pub struct FnHandler<F> {
    f: F,
}

/// 将异步闭包包装为处理器
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(CommandArgs) -> Fut + Send + Sync,
    Fut: Future<Output = AppResult<Value>> + Send,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> CommandHandler for FnHandler<F>
where
    F: Fn(CommandArgs) -> Fut + Send + Sync,
    Fut: Future<Output = AppResult<Value>> + Send,
{
    async fn invoke(&self, args: CommandArgs) -> AppResult<Value> {
        (self.f)(args).await
    }
}

/// 同步闭包处理器
pub struct SyncFnHandler<F> {
    f: F,
}

/// 将同步闭包包装为处理器
pub fn sync_handler_fn<F>(f: F) -> SyncFnHandler<F>
where
    F: Fn(CommandArgs) -> AppResult<Value> + Send + Sync,
{
    SyncFnHandler { f }
}

#[async_trait]
impl<F> CommandHandler for SyncFnHandler<F>
where
    F: Fn(CommandArgs) -> AppResult<Value> + Send + Sync,
{
    async fn invoke(&self, args: CommandArgs) -> AppResult<Value> {
        (self.f)(args)
    }
}
