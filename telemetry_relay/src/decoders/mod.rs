//! 上游二进制数据的解码器。
//!
//! 两个解码器都是纯函数：输入一条完整的二进制消息，输出结构化数据，不保留跨消息状态。
//!
//! 两者的舍入方式一致：恰好落在中点时取偶数 (`f64::round_ties_even`)。

pub mod range_scan;
pub mod thermal;

pub use range_scan::decode_range_scan;
pub use thermal::decode_thermal_frame;

/// 四舍五入到一位小数，恰好落在中点时取偶数。
pub(crate) fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}
