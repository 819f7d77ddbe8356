/*!
 * CommandRegistry - 命令注册表
 * 负责：注册、查找、执行命令与统计信息
 */

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use super::error::{CommandError, CommandResult};
use super::handler::{CommandArgs, CommandHandler};
use crate::utils::error::AppResult;

/// 已注册的命令
#[derive(Clone)]
pub struct Command {
    name: String,
    handler: Arc<dyn CommandHandler>,
}

impl Command {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handler(&self) -> Arc<dyn CommandHandler> {
        Arc::clone(&self.handler)
    }

    /// 直接调用处理器，不经过统计
    pub async fn invoke(&self, args: CommandArgs) -> AppResult<Value> {
        self.handler.invoke(args).await
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command").field("name", &self.name).finish()
    }
}

/// 命令执行统计
#[derive(Debug, Clone, Default)]
pub struct CommandStats {
    pub total_calls: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub last_called_at: Option<DateTime<Utc>>,
}

/// 命令注册表，进程内按名称唯一
#[derive(Default)]
pub struct CommandRegistry {
    commands: DashMap<String, Command>,
    stats: DashMap<String, CommandStats>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册命令，同名命令直接覆盖（后注册者生效）
    pub fn register_command<H>(&self, name: &str, handler: H) -> CommandResult<()>
    where
        H: CommandHandler + 'static,
    {
        self.register_shared(name, Arc::new(handler))
    }

    pub fn register_shared(&self, name: &str, handler: Arc<dyn CommandHandler>) -> CommandResult<()> {
        if name.trim().is_empty() {
            return Err(CommandError::InvalidName(name.to_string()));
        }

        let command = Command {
            name: name.to_string(),
            handler,
        };
        if self.commands.insert(name.to_string(), command).is_some() {
            debug!("覆盖已注册命令: {}", name);
        }
        self.stats.insert(name.to_string(), CommandStats::default());

        info!("成功注册命令: {}", name);
        Ok(())
    }

    /// 查找命令，不执行
    pub fn get_command(&self, name: &str) -> CommandResult<Command> {
        self.commands
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| CommandError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    pub fn list_commands(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .commands
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn stats(&self, name: &str) -> Option<CommandStats> {
        self.stats.get(name).map(|entry| entry.value().clone())
    }

    /// 查找并执行命令，处理器失败转换为 HandlerFailure
    pub async fn execute(&self, name: &str, args: CommandArgs) -> CommandResult<Value> {
        let command = self.get_command(name)?;

        let result = command.invoke(args).await;
        self.update_stats(name, result.is_ok());

        result.map_err(|e| {
            debug!("命令 {} 执行失败: {}", name, e);
            CommandError::handler_failure(name, e.to_string())
        })
    }

    fn update_stats(&self, name: &str, success: bool) {
        if let Some(mut s) = self.stats.get_mut(name) {
            s.total_calls += 1;
            if success {
                s.success_count += 1;
            } else {
                s.failure_count += 1;
            }
            s.last_called_at = Some(Utc::now());
        }
    }
}
