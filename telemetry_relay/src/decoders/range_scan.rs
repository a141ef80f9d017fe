//! 旋转激光测距仪扫描数据解码。
//!
//! 一条消息由连续的 5 字节记录组成：
//!
//! | 字节 | 内容 |
//! |---|---|
//! | 0 | bit[7:2] 质量，bit[1:0] 保留 |
//! | 1-2 | 角度，bit0 为起始标志 (丢弃)，其余 15 位为 1/64 度 |
//! | 3-4 | 距离，小端，单位 1/4 毫米 |

use super::round_one_decimal;
use common_models::ws_payloads::RangeScanPoint;

/// 单条记录的字节数
pub const RECORD_LEN: usize = 5;

/// 解码一次扫描。末尾不足 5 字节的残余记录被忽略；质量为 0 或距离为 0 的记录被丢弃。
pub fn decode_range_scan(bytes: &[u8]) -> Vec<RangeScanPoint> {
    bytes.chunks_exact(RECORD_LEN).filter_map(decode_record).collect()
}

fn decode_record(record: &[u8]) -> Option<RangeScanPoint> {
    let quality = record[0] >> 2;
    if quality == 0 {
        return None;
    }

    let angle_raw = (u16::from(record[1]) >> 1) | (u16::from(record[2]) << 7);
    let distance_raw = u16::from_le_bytes([record[3], record[4]]);
    let distance = f64::from(distance_raw) / 4.0;
    if distance <= 0.0 {
        return None;
    }

    Some(RangeScanPoint {
        angle: round_one_decimal(f64::from(angle_raw) / 64.0),
        distance: round_one_decimal(distance),
        quality,
    })
}
