//! channel-rpc-peer - 通过 stdin/stdout 提供命令的对端进程
//!
//! 每行一帧 JSON，日志写到 stderr。stdin 关闭后退出。
//! 配置文件路径取自 `RPC_CONFIG` 环境变量（可选）。

use anyhow::{anyhow, Context};
use channel_rpc::utils::{init_logging, AppResult};
use channel_rpc::{app_bail, sync_handler_fn, CommandRegistry, RpcConfig, RpcRuntime};
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::info;

fn register_builtin_commands(registry: &CommandRegistry) -> AppResult<()> {
    registry.register_command(
        "peer.echo",
        sync_handler_fn(|args| Ok(args.into_iter().next().unwrap_or(Value::Null))),
    )?;

    registry.register_command(
        "peer.sum",
        sync_handler_fn(|args| {
            let mut total = 0.0;
            for arg in &args {
                match arg.as_f64() {
                    Some(n) => total += n,
                    None => app_bail!("peer.sum 只接受数字参数, 收到: {}", arg),
                }
            }
            Ok(json!(total))
        }),
    )?;

    registry.register_command(
        "peer.info",
        sync_handler_fn(|_| {
            Ok(json!({
                "pid": std::process::id(),
                "version": env!("CARGO_PKG_VERSION"),
            }))
        }),
    )?;

    Ok(())
}

#[tokio::main]
async fn main() -> AppResult<()> {
    if let Err(e) = init_logging() {
        eprintln!("日志系统初始化失败: {}", e);
        std::process::exit(1);
    }

    let config_path = std::env::var_os("RPC_CONFIG").map(PathBuf::from);
    let config = RpcConfig::load(config_path.as_deref()).map_err(|e| anyhow!("加载配置失败: {}", e))?;

    let runtime = RpcRuntime::new(config);
    register_builtin_commands(runtime.registry())?;
    runtime
        .listen_stream(tokio::io::stdin(), tokio::io::stdout())
        .context("接入 stdio 管道失败")?;
    info!(
        "对端进程就绪: commands={:?}",
        runtime.registry().list_commands()
    );

    runtime.transport().closed().await;
    runtime.shutdown();
    Ok(())
}
