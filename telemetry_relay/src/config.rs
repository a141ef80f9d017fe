//! 中继配置的加载与校验。
//!
//! 解析顺序：内置默认值 → JSON 配置文件 → `POLLY_PHONE_IP` 环境变量 → 第一个位置参数。
//! 后一层只覆盖前一层中它所涉及的字段。

use crate::error::{RelayError, Result};
use crate::relay::backoff::Backoff;
use common_models::enums::EndpointName;
use log::{info, warn};
use rust_websocket_utils::client::transport::ClientOptions;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 上游设备的默认地址
pub const DEFAULT_DEVICE_HOST: &str = "192.168.1.100";
/// 上游设备 WebSocket 桥接服务的默认端口号
pub const DEFAULT_DEVICE_PORT: u16 = 8080;
/// 观察端 WebSocket 服务的默认主机地址
pub const DEFAULT_OBSERVER_HOST: &str = "0.0.0.0";
/// 观察端 WebSocket 服务的默认端口号
pub const DEFAULT_OBSERVER_PORT: u16 = 8000;
/// 工作目录下默认查找的配置文件名
pub const DEFAULT_CONFIG_FILE: &str = "relay_settings.json";
/// 覆盖设备地址的环境变量
pub const DEVICE_HOST_ENV: &str = "POLLY_PHONE_IP";

/// 上游设备连接配置
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DeviceConfig {
    pub host: String,
    pub port: u16,
    /// 保活 Ping 间隔（毫秒），需短于设备端 5 秒的读超时；0 表示不发送 Ping
    pub ping_interval_ms: u64,
    /// 关闭握手的最长等待时间（毫秒）
    pub close_timeout_ms: u64,
    /// 单条消息的最大字节数，需容纳一帧摄像头 JPEG
    pub max_message_size: usize,
    /// 启动时相邻端点之间的错峰间隔（毫秒）
    pub stagger_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DEVICE_HOST.to_string(),
            port: DEFAULT_DEVICE_PORT,
            ping_interval_ms: 3000,
            close_timeout_ms: 2000,
            max_message_size: 1 << 20,
            stagger_ms: 500,
        }
    }
}

impl DeviceConfig {
    /// 某个端点的上游 URL，例如 `ws://192.168.1.100:8080/lidar`
    pub fn endpoint_url(&self, endpoint: EndpointName) -> String {
        format!("ws://{}:{}/{}", self.host, self.port, endpoint)
    }

    /// 面向设备 HTTP 桥接服务调校过的连接参数：定时 Ping、容忍缺失的 Pong、限时关闭。
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            ping_interval: (self.ping_interval_ms > 0).then(|| Duration::from_millis(self.ping_interval_ms)),
            ping_timeout: None,
            close_timeout: Duration::from_millis(self.close_timeout_ms),
            max_message_size: self.max_message_size,
            ..ClientOptions::default()
        }
    }

    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }
}

/// 重连退避配置
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BackoffConfig {
    pub floor_ms: u64,
    pub ceiling_ms: u64,
    pub factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            floor_ms: 5000,
            ceiling_ms: 30000,
            factor: 1.5,
        }
    }
}

impl BackoffConfig {
    pub fn build(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.floor_ms),
            Duration::from_millis(self.ceiling_ms),
            self.factor,
        )
    }
}

/// 观察端 WebSocket 服务配置
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ObserverConfig {
    pub host: String,
    pub port: u16,
    /// 每个观察端出站队列的容量，队列满即视为该观察端已失效
    pub client_queue_capacity: usize,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_OBSERVER_HOST.to_string(),
            port: DEFAULT_OBSERVER_PORT,
            client_queue_capacity: 64,
        }
    }
}

impl ObserverConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 应用的主配置结构体
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct RelayConfig {
    pub device: DeviceConfig,
    pub backoff: BackoffConfig,
    pub observer: ObserverConfig,
}

impl RelayConfig {
    /// 从 JSON 文件加载配置，文件中缺失的字段取默认值。
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| RelayError::ConfigError(format!("读取 {:?} 失败: {}", path, e)))?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// 按解析顺序得到最终配置。
    ///
    /// 配置文件无法读取或格式错误时记录警告并保留默认值，不会中断启动。
    pub fn resolve(args: &CliArgs, env_device_host: Option<String>) -> Self {
        let mut config = match args.config_path.clone().or_else(default_config_file) {
            Some(path) => match Self::from_file(&path) {
                Ok(config) => {
                    info!("[配置模块] 已成功从配置文件 {:?} 加载中继配置。", path);
                    config
                }
                Err(e) => {
                    warn!("[配置模块] 警告：加载配置文件 {:?} 失败: {}。将使用默认配置。", path, e);
                    Self::default()
                }
            },
            None => Self::default(),
        };

        if let Some(host) = env_device_host.filter(|h| !h.trim().is_empty()) {
            info!("[配置模块] 设备地址由环境变量 {} 覆盖为 {}", DEVICE_HOST_ENV, host);
            config.device.host = host;
        }
        if let Some(host) = &args.device_host {
            info!("[配置模块] 设备地址由命令行参数覆盖为 {}", host);
            config.device.host = host.clone();
        }
        config.sanitize();
        info!("[配置模块] 中继配置已成功初始化完毕。");
        config
    }

    /// 把会导致运行期 panic 或无意义行为的取值改回可用值，并记录警告。
    fn sanitize(&mut self) {
        let backoff = &mut self.backoff;
        if !backoff.factor.is_finite() || backoff.factor < 1.0 {
            warn!("[配置模块] 退避倍数 {} 无效，改用默认值 1.5", backoff.factor);
            backoff.factor = BackoffConfig::default().factor;
        }
        if backoff.floor_ms == 0 {
            warn!("[配置模块] 退避下限为 0，改用默认值 {} 毫秒", BackoffConfig::default().floor_ms);
            backoff.floor_ms = BackoffConfig::default().floor_ms;
        }
        if backoff.ceiling_ms < backoff.floor_ms {
            warn!("[配置模块] 退避上限 {} 毫秒小于下限，改为与下限相同", backoff.ceiling_ms);
            backoff.ceiling_ms = backoff.floor_ms;
        }
        if self.device.ping_interval_ms == 0 {
            warn!("[配置模块] ping_interval_ms 为 0，将不发送保活 Ping");
        }
        if self.device.max_message_size == 0 {
            warn!("[配置模块] max_message_size 为 0，改用默认值");
            self.device.max_message_size = DeviceConfig::default().max_message_size;
        }
        if self.observer.client_queue_capacity == 0 {
            warn!("[配置模块] client_queue_capacity 为 0，改为 1");
            self.observer.client_queue_capacity = 1;
        }
    }
}

fn default_config_file() -> Option<PathBuf> {
    let path = env::current_dir().ok()?.join(DEFAULT_CONFIG_FILE);
    path.exists().then_some(path)
}

/// 命令行参数：`telemetry-relay [device_ip] [--config <path>]`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliArgs {
    pub device_host: Option<String>,
    pub config_path: Option<PathBuf>,
}

impl CliArgs {
    /// 解析参数列表 (不含程序名)。
    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parsed = CliArgs::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    let path = args
                        .next()
                        .ok_or_else(|| RelayError::ConfigError(format!("{} 缺少文件路径", arg)))?;
                    parsed.config_path = Some(PathBuf::from(path));
                }
                flag if flag.starts_with('-') => {
                    return Err(RelayError::ConfigError(format!("未知参数: {}", flag)));
                }
                _ if parsed.device_host.is_none() => parsed.device_host = Some(arg),
                _ => warn!("[配置模块] 忽略多余的位置参数: {}", arg),
            }
        }
        Ok(parsed)
    }

    pub fn from_env() -> Result<Self> {
        Self::parse(env::args().skip(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults_match_device_bridge() {
        let config = RelayConfig::default();
        assert_eq!(config.device.endpoint_url(EndpointName::Lidar), "ws://192.168.1.100:8080/lidar");
        assert_eq!(config.observer.listen_addr(), "0.0.0.0:8000");

        let options = config.device.client_options();
        assert_eq!(options.ping_interval, Some(Duration::from_secs(3)));
        assert_eq!(options.ping_timeout, None);
        assert_eq!(options.close_timeout, Duration::from_secs(2));
        assert_eq!(options.max_message_size, 1_048_576);
    }

    #[test]
    fn test_cli_args_parse() {
        let parsed = CliArgs::parse(args(&["10.0.0.7", "--config", "/tmp/relay.json"])).unwrap();
        assert_eq!(parsed.device_host.as_deref(), Some("10.0.0.7"));
        assert_eq!(parsed.config_path, Some(PathBuf::from("/tmp/relay.json")));

        assert_eq!(CliArgs::parse(args(&[])).unwrap(), CliArgs::default());
        assert!(CliArgs::parse(args(&["--config"])).is_err());
        assert!(CliArgs::parse(args(&["--verbose"])).is_err());
    }

    #[test]
    fn test_cli_host_wins_over_env_host() {
        let missing = std::env::temp_dir().join("telemetry-relay-missing-config.json");
        let cli = CliArgs { device_host: Some("10.0.0.9".into()), config_path: Some(missing.clone()) };
        let config = RelayConfig::resolve(&cli, Some("10.0.0.8".into()));
        assert_eq!(config.device.host, "10.0.0.9");

        let cli = CliArgs { device_host: None, config_path: Some(missing) };
        let config = RelayConfig::resolve(&cli, Some("10.0.0.8".into()));
        assert_eq!(config.device.host, "10.0.0.8");
        assert_eq!(config.device.port, DEFAULT_DEVICE_PORT);
    }

    #[test]
    fn test_partial_config_file_keeps_defaults() {
        let path = std::env::temp_dir().join(format!("relay-settings-{}.json", uuid::Uuid::new_v4()));
        fs::write(&path, r#"{"device":{"host":"phone.local","stagger_ms":100},"backoff":{"ceiling_ms":10000}}"#).unwrap();

        let cli = CliArgs { device_host: None, config_path: Some(path.clone()) };
        let config = RelayConfig::resolve(&cli, None);
        fs::remove_file(&path).unwrap();

        assert_eq!(config.device.host, "phone.local");
        assert_eq!(config.device.stagger(), Duration::from_millis(100));
        assert_eq!(config.device.port, 8080);
        assert_eq!(config.backoff.ceiling_ms, 10000);
        assert_eq!(config.backoff.floor_ms, 5000);
        assert_eq!(config.observer.client_queue_capacity, 64);
    }

    #[test]
    fn test_malformed_config_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join(format!("relay-settings-{}.json", uuid::Uuid::new_v4()));
        fs::write(&path, "{ not json").unwrap();
        assert!(RelayConfig::from_file(&path).is_err());

        let cli = CliArgs { device_host: None, config_path: Some(path.clone()) };
        let config = RelayConfig::resolve(&cli, None);
        fs::remove_file(&path).unwrap();
        assert_eq!(config, RelayConfig::default());
    }

    #[test]
    fn test_unusable_values_are_replaced() {
        let path = std::env::temp_dir().join(format!("relay-settings-{}.json", uuid::Uuid::new_v4()));
        fs::write(
            &path,
            r#"{"device":{"ping_interval_ms":0,"max_message_size":0},
               "backoff":{"floor_ms":0,"ceiling_ms":0,"factor":1e300},
               "observer":{"client_queue_capacity":0}}"#,
        )
        .unwrap();
        let cli = CliArgs { device_host: None, config_path: Some(path.clone()) };
        let config = RelayConfig::resolve(&cli, None);
        fs::remove_file(&path).unwrap();

        // 1e300 本身是有限值，保留；由 Backoff 在计算时封顶
        assert_eq!(config.backoff.factor, 1e300);
        assert_eq!(config.backoff.floor_ms, 5000);
        assert_eq!(config.backoff.ceiling_ms, 5000);
        assert_eq!(config.device.client_options().ping_interval, None);
        assert_eq!(config.device.max_message_size, 1 << 20);
        assert_eq!(config.observer.client_queue_capacity, 1);

        let mut config = RelayConfig::default();
        config.backoff.factor = 0.5;
        config.sanitize();
        assert_eq!(config.backoff.factor, 1.5);
        config.backoff.factor = f64::NAN;
        config.sanitize();
        assert_eq!(config.backoff.factor, 1.5);

        let mut backoff = config.backoff.clone();
        backoff.factor = 1e300;
        let mut backoff = backoff.build();
        assert_eq!(backoff.next_delay(), Duration::from_secs(5));
        assert_eq!(backoff.next_delay(), Duration::from_secs(30));
        assert_eq!(backoff.next_delay(), Duration::from_secs(30));
    }
}
