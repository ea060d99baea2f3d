//! Default value functions for configuration.

/// Returns `true` (for serde defaults).
pub fn default_true() -> bool {
    true
}

// =============================================================================
// Bot identity
// =============================================================================

pub fn default_realname() -> String {
    "leetbot".to_string()
}

pub fn default_command_prefix() -> String {
    "!".to_string()
}

pub fn default_quit_message() -> String {
    "Disconnecting".to_string()
}

pub fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

pub fn default_max_response_lines() -> usize {
    10
}

// =============================================================================
// Servers
// =============================================================================

pub fn default_port() -> u16 {
    6667
}

// =============================================================================
// Outbound rate limiting
// =============================================================================

pub fn default_bucket_capacity() -> f64 {
    5.0
}

pub fn default_refill_per_second() -> f64 {
    0.5
}

pub fn default_min_refill_interval_ms() -> u64 {
    100
}

pub fn default_retry_backoff_ms() -> u64 {
    100
}

pub fn default_max_wait_secs() -> u64 {
    10
}

// =============================================================================
// Timeouts
// =============================================================================

pub fn default_connect_secs() -> u64 {
    30
}

pub fn default_registration_secs() -> u64 {
    60
}

pub fn default_keepalive_secs() -> u64 {
    120
}

pub fn default_shutdown_secs() -> u64 {
    5
}

pub fn default_reconnect_initial_secs() -> u64 {
    5
}

pub fn default_reconnect_max_secs() -> u64 {
    300
}
