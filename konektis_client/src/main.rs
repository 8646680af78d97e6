// konektis_client/src/main.rs

//! `konektis` 命令行客户端。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use konektis_client::config::DEFAULT_CONFIG_FILE;
use konektis_client::{ClientConfig, ConnectionStatus, FileCredentialStore, LoginCoordinator, WebSocketClientService};
use konektis_models::ws_payloads::MIN_CHARGING_POWER_WATTS;
use konektis_models::{ChargingState, ClientMessage, Device, Message};
use log::{error, info, warn, LevelFilter};
use tokio::sync::broadcast::error::RecvError;

/// 等待连接建立的最长时间 (set-charging)。
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "konektis", version, about = "Konektis 家庭能源客户端")]
struct Cli {
    /// 客户端配置文件路径
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// 覆盖配置文件中的服务端地址
    #[arg(long)]
    server_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 使用已保存的凭据连接并持续打印能量数据，Ctrl-C 退出
    Run,
    /// 保存凭据并连接，随后与 run 相同
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// 清除已保存的凭据
    Logout,
    /// 发送一次充电模式命令
    SetCharging {
        #[arg(value_enum)]
        mode: ChargingMode,
        /// 最大充电功率 (W)，仅用于 max 模式
        #[arg(long, default_value_t = MIN_CHARGING_POWER_WATTS)]
        watts: u32,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ChargingMode {
    Off,
    Excess,
    Max,
}

impl ChargingMode {
    fn to_state(self, watts: u32) -> ChargingState {
        match self {
            ChargingMode::Off => ChargingState::NotCharging,
            ChargingMode::Excess => ChargingState::ChargingWithExcessPower,
            ChargingMode::Max => ChargingState::with_max_power(watts),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("konektis_client", LevelFilter::Debug)
        .filter_module("konektis_ws_utils", LevelFilter::Debug)
        .format_timestamp_millis()
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::load(&cli.config)?;
    if let Some(url) = cli.server_url {
        config.server_url = url;
        config.validate()?;
    }
    info!("[主程序] 服务端地址: {}", config.server_url);

    let store = FileCredentialStore::open(&config.credentials_path)
        .await
        .with_context(|| format!("无法打开凭据文件 {:?}", config.credentials_path))?;
    let client = Arc::new(WebSocketClientService::new(&config));
    let coordinator = LoginCoordinator::new(client.clone(), Arc::new(store));

    match cli.command {
        Command::Run => {
            if !coordinator.auto_login().await {
                bail!("没有已保存的凭据，请先执行 `konektis login`");
            }
            follow_connection(&client).await
        }
        Command::Login { username, password } => {
            coordinator.login(&username, &password).await?;
            follow_connection(&client).await
        }
        Command::Logout => {
            coordinator.logout().await?;
            info!("[主程序] 已清除保存的凭据");
            Ok(())
        }
        Command::SetCharging { mode, watts } => {
            if !coordinator.auto_login().await {
                bail!("没有已保存的凭据，请先执行 `konektis login`");
            }
            let result = send_charging_command(&client, mode.to_state(watts)).await;
            client.disconnect().await;
            result
        }
    }
}

/// 打印状态变化与能量数据，直到 Ctrl-C、认证失败或连接任务终止。
async fn follow_connection(client: &WebSocketClientService) -> Result<()> {
    let mut status_rx = client.connection_status();
    let mut messages = client.messages();

    let outcome = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("[主程序] 收到 Ctrl-C，正在断开连接...");
                break Ok(());
            }
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let status = status_rx.borrow_and_update().clone();
                info!("[主程序] 连接状态: {}", status);
                match status {
                    ConnectionStatus::Unauthorized => break Err(anyhow::anyhow!("服务端拒绝了凭据")),
                    ConnectionStatus::Error(reason) => {
                        // 传输错误会进入重连等待，其余错误是终止性的。
                        if !client.is_reconnect_pending() {
                            break Err(anyhow::anyhow!("连接已终止: {}", reason));
                        }
                    }
                    ConnectionStatus::Idle | ConnectionStatus::Connected => {}
                }
            }
            received = messages.recv() => match received {
                Ok(message) => print_message(&message),
                Err(RecvError::Lagged(skipped)) => warn!("[主程序] 处理过慢，跳过了 {} 条消息", skipped),
                Err(RecvError::Closed) => break Ok(()),
            },
        }
    };

    client.disconnect().await;
    outcome
}

async fn send_charging_command(client: &WebSocketClientService, charging_state: ChargingState) -> Result<()> {
    let mut status_rx = client.connection_status();
    let status = tokio::time::timeout(
        CONNECT_TIMEOUT,
        status_rx.wait_for(|s| match s {
            ConnectionStatus::Connected | ConnectionStatus::Unauthorized => true,
            ConnectionStatus::Error(_) => !client.is_reconnect_pending(),
            ConnectionStatus::Idle => false,
        }),
    )
    .await
    .context("等待连接超时")?
    .context("连接状态通道已关闭")?
    .clone();

    match status {
        ConnectionStatus::Unauthorized => bail!("服务端拒绝了凭据"),
        ConnectionStatus::Error(reason) => bail!("连接已终止: {}", reason),
        ConnectionStatus::Idle | ConnectionStatus::Connected => {}
    }
    info!("[主程序] 发送充电命令: {:?}", charging_state);
    client.send_message(&ClientMessage::SetCharging { charging_state }).await;
    Ok(())
}

fn print_message(message: &Message) {
    match message {
        Message::PowerUsageUpdate { updates } => {
            let line = updates
                .iter()
                .map(|u| format!("{}={}W", u.device, u.power))
                .collect::<Vec<_>>()
                .join("  ");
            println!("{}", line);
            if let Some(grid) = message.power_of(Device::Grid) {
                if grid < 0 {
                    info!("[主程序] 正在向电网回馈 {} W", grid.unsigned_abs());
                }
            }
        }
        other => error!("[主程序] 认证后收到非预期的消息: {}", other.kind()),
    }
}
