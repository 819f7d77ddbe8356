//! RPC 运行时配置管理
//!
//! 支持文件、环境变量两种配置源，按 文件 -> 环境变量 -> 校验 的顺序加载

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 命令通道默认名称
pub const DEFAULT_COMMAND_CHANNEL: &str = "commandService";

/// RPC 运行时配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RpcConfig {
    /// 承载命令请求/响应的通道名称
    pub command_channel: String,
    /// 远程调用默认超时（毫秒），0 表示不超时
    pub remote_call_timeout_ms: u64,
    /// 单帧最大字节数（JSON Lines 管道）
    pub max_frame_bytes: usize,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            command_channel: DEFAULT_COMMAND_CHANNEL.to_string(),
            remote_call_timeout_ms: 30_000, // 30秒
            max_frame_bytes: 4 * 1024 * 1024,
        }
    }
}

impl RpcConfig {
    /// 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let path = path.as_ref();
        debug!("从文件加载配置: {:?}", path);

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;

        info!("配置加载成功: {:?}", path);
        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let path = path.as_ref();
        debug!("保存配置到文件: {:?}", path);

        let content = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        info!("配置保存成功: {:?}", path);
        Ok(())
    }

    /// 从环境变量覆盖配置
    pub fn override_from_env(&mut self) {
        debug!("从环境变量覆盖配置");

        if let Ok(val) = std::env::var("RPC_COMMAND_CHANNEL") {
            if !val.trim().is_empty() {
                debug!("从环境变量设置 command_channel = {}", val);
                self.command_channel = val;
            }
        }

        if let Ok(val) = std::env::var("RPC_REMOTE_CALL_TIMEOUT_MS") {
            if let Ok(ms) = val.parse::<u64>() {
                self.remote_call_timeout_ms = ms;
                debug!("从环境变量设置 remote_call_timeout_ms = {}", ms);
            }
        }

        if let Ok(val) = std::env::var("RPC_MAX_FRAME_BYTES") {
            if let Ok(size) = val.parse::<usize>() {
                self.max_frame_bytes = size;
                debug!("从环境变量设置 max_frame_bytes = {}", size);
            }
        }
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<(), String> {
        if self.command_channel.trim().is_empty() {
            return Err("command_channel 不能为空".to_string());
        }

        if self.max_frame_bytes == 0 {
            return Err("max_frame_bytes 不能为0".to_string());
        }

        debug!("配置验证通过");
        Ok(())
    }

    /// 加载配置（按优先级：文件 -> 环境变量 -> 默认值）
    ///
    /// 文件不存在或解析失败时回退到默认值，校验失败则返回错误
    pub fn load(path: Option<&Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = Self::default();

        if let Some(path) = path {
            if path.exists() {
                match Self::from_file(path) {
                    Ok(file_config) => config = file_config,
                    Err(e) => warn!("加载配置文件失败 {:?}: {}", path, e),
                }
            }
        }

        config.override_from_env();
        config.validate()?;

        Ok(config)
    }

    /// 获取远程调用超时，`None` 表示无限等待
    pub fn remote_call_timeout(&self) -> Option<Duration> {
        match self.remote_call_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}
