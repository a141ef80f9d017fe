//! 重连退避。

use std::time::Duration;

/// 单个端点的重连退避状态。
///
/// 每次链路失败后等待 `current()`，随后乘以 `factor` 并封顶于 `ceiling`；
/// 成功建立链路时回到 `floor`。
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    floor: Duration,
    ceiling: Duration,
    factor: f64,
    current: Duration,
}

impl Backoff {
    pub fn new(floor: Duration, ceiling: Duration, factor: f64) -> Self {
        let ceiling = ceiling.max(floor);
        Self {
            floor,
            ceiling,
            factor: if factor.is_finite() { factor.max(1.0) } else { 1.0 },
            current: floor,
        }
    }

    /// 当前应等待的时长。
    pub fn current(&self) -> Duration {
        self.current
    }

    /// 返回本次应等待的时长，并把下一次的时长推进一步。
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        // 乘积超出 Duration 可表示的范围时直接取上限
        self.current = Duration::try_from_secs_f64(self.current.as_secs_f64() * self.factor)
            .map_or(self.ceiling, |next| next.min(self.ceiling));
        delay
    }

    /// 链路建立成功后回到下限。
    pub fn reset(&mut self) {
        self.current = self.floor;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(30), 1.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_grows_and_caps() {
        let mut backoff = Backoff::default();
        let delays: Vec<u128> = (0..8).map(|_| backoff.next_delay().as_micros()).collect();
        assert_eq!(
            delays,
            vec![5_000_000, 7_500_000, 11_250_000, 16_875_000, 25_312_500, 30_000_000, 30_000_000, 30_000_000]
        );
    }

    #[test]
    fn test_reset_returns_to_floor() {
        let mut backoff = Backoff::default();
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.current(), Duration::from_millis(11_250));
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_degenerate_parameters_are_normalised() {
        let mut backoff = Backoff::new(Duration::from_secs(10), Duration::from_secs(1), 0.5);
        assert_eq!(backoff.next_delay(), Duration::from_secs(10));
        assert_eq!(backoff.next_delay(), Duration::from_secs(10));
    }

    #[test]
    fn test_huge_factor_saturates_at_ceiling() {
        let mut backoff = Backoff::new(Duration::from_secs(5), Duration::from_secs(30), 1e300);
        assert_eq!(backoff.next_delay(), Duration::from_secs(5));
        assert_eq!(backoff.next_delay(), Duration::from_secs(30));
        assert_eq!(backoff.next_delay(), Duration::from_secs(30));

        let mut backoff = Backoff::new(Duration::from_secs(5), Duration::from_secs(30), f64::INFINITY);
        assert_eq!(backoff.next_delay(), Duration::from_secs(5));
        assert_eq!(backoff.next_delay(), Duration::from_secs(5));
    }
}
