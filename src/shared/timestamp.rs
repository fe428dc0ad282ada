/// 时间工具
///
/// 行情中的时间戳均为 Unix 毫秒。延迟 = 本地接收时间 - 撮合引擎时间，
/// 时钟漂移可能导致负值，按原值保留。

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// 当前 Unix 时间（毫秒）
#[inline]
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(duration_millis)
        .unwrap_or_default()
}

/// Duration 转毫秒，超出 i64 时饱和
#[inline]
pub fn duration_millis(elapsed: Duration) -> i64 {
    i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
}

/// 处理延迟（毫秒）
#[inline]
pub fn delay_millis(engine_time_ms: i64, now_ms: i64) -> i64 {
    now_ms.saturating_sub(engine_time_ms)
}

/// 非负延迟，供直方图使用
#[inline]
pub fn delay_duration(engine_time_ms: i64, now_ms: i64) -> Duration {
    Duration::from_millis(delay_millis(engine_time_ms, now_ms).max(0) as u64)
}
