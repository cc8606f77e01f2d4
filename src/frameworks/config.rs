use std::{env, time::Duration};

// Runtime/server constants (not gameplay tuning).

pub fn http_port() -> u16 {
    env::var("BUMP_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000)
}

/// How long the session waits for a connection to acknowledge its player id.
pub fn connect_handshake_timeout() -> Duration {
    let millis = env::var("CONNECT_HANDSHAKE_TIMEOUT_MS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(2000);
    Duration::from_millis(millis)
}

pub const CONTROL_CHANNEL_CAPACITY: usize = 256;
pub const INBOUND_CHANNEL_CAPACITY: usize = 1024;
pub const OUTBOUND_CHANNEL_CAPACITY: usize = 64;

// A connection gives up on its player id after this long.
pub const REGISTER_TIMEOUT: Duration = Duration::from_secs(5);

pub const SIM_TICK_INTERVAL: Duration = Duration::from_nanos(1_000_000_000 / 72);
pub const BROADCAST_INTERVAL: Duration = Duration::from_nanos(1_000_000_000 / 24);
