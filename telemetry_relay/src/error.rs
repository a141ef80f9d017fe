use thiserror::Error;

/// 遥测中继的主要错误类型
///
/// 中继核心本身没有致命错误：上游链路失败由退避重连吸收，观察端发送失败只清理该观察端。
/// 这里的错误只出现在命令行参数解析与配置文件加载上。
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
