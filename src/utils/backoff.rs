use chrono::Duration;

pub const MAX_ATTEMPTS: i32 = 5;

const BASE_DELAY_MS: u64 = 1_000;
const MAX_DELAY_MS: u64 = 3_600_000;

pub fn delay_ms(attempt_count: i32) -> u64 {
    let exp = attempt_count.clamp(0, 31) as u32;
    BASE_DELAY_MS
        .saturating_mul(1u64 << exp)
        .min(MAX_DELAY_MS)
}

pub fn delay(attempt_count: i32) -> Duration {
    Duration::milliseconds(delay_ms(attempt_count) as i64)
}
