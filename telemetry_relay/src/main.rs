use anyhow::Result;
use log::{LevelFilter, error, info};
use std::sync::Arc;
use telemetry_relay::config::{CliArgs, DEVICE_HOST_ENV, RelayConfig};
use telemetry_relay::relay::control::CommandChannel;
use telemetry_relay::relay::link::DeviceConnector;
use telemetry_relay::relay::spawn_relay;
use telemetry_relay::ws_server::broadcast_hub::BroadcastHub;
use telemetry_relay::ws_server::message_router::Router;
use telemetry_relay::ws_server::service::ObserverService;

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志记录器，默认 Info，可由 RUST_LOG 覆盖
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_millis()
        .init();
    info!("[主程序] 日志系统已成功初始化 (env_logger)，默认级别: Info。");

    let args = CliArgs::from_env()?;
    let app_config = RelayConfig::resolve(&args, std::env::var(DEVICE_HOST_ENV).ok());
    info!("[主程序] 设备地址: {}:{}", app_config.device.host, app_config.device.port);

    let hub = Arc::new(BroadcastHub::new());
    let commands = Arc::new(CommandChannel::new());
    let router = Arc::new(Router::new(Arc::clone(&commands)));

    let service = ObserverService::bind(&app_config.observer, Arc::clone(&hub), router).await?;
    info!("[主程序] 观察端 WebSocket 服务地址: ws://{}", service.local_addr()?);

    let connector = Arc::new(DeviceConnector::new(app_config.device.clone()));
    let relay = spawn_relay(&app_config, connector, hub, commands);

    let outcome = tokio::select! {
        result = service.run() => result,
        signal = tokio::signal::ctrl_c() => {
            info!("[主程序] 收到退出信号，正在停止 ...");
            signal.map_err(anyhow::Error::from)
        }
    };

    relay.shutdown().await;
    if let Err(e) = &outcome {
        error!("[主程序] 致命错误：{:#}", e);
    }
    outcome
}
