use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use konektis_mock_server::config::DEFAULT_CONFIG_FILE;
use konektis_mock_server::{MockEnergyServer, ServerConfig};
use log::{error, info, LevelFilter};

#[derive(Parser, Debug)]
#[command(name = "konektis-mock-server", version, about = "Konektis 家庭能源模拟服务端")]
struct Cli {
    /// 配置文件路径，不存在时写出默认配置
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// 覆盖配置中的端口
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .format_timestamp_millis()
        .parse_default_env()
        .init();
    info!("[主程序] 日志系统已初始化，默认级别: Info");

    let cli = Cli::parse();
    let mut config = ServerConfig::load_or_create(&cli.config)?;
    if let Some(port) = cli.port {
        config.port = port;
    }

    let server = MockEnergyServer::new(config);
    tokio::select! {
        result = server.start() => {
            if let Err(e) = &result {
                error!("[主程序] 模拟服务端异常退出: {}", e);
            }
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("[主程序] 收到 Ctrl-C，退出");
        }
    }
    Ok(())
}
