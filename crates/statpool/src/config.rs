//! Runtime configuration for a pool.
//!
//! The pool size is fixed at compile time through the pool's const
//! parameter. What remains configurable is whether freed memory is scrubbed
//! ("safe mode"), which can come from code or from `STATPOOL_SAFE`.

/// Environment variable read by [`PoolConfig::from_env`].
pub const SAFE_ENV_VAR: &str = "STATPOOL_SAFE";

/// Options applied when a pool is constructed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolConfig {
    /// Overwrite freed chunks with random bytes and zero absorbed headers.
    pub safe: bool,
}

impl PoolConfig {
    /// Default configuration: safe mode off.
    #[must_use]
    pub const fn new() -> Self {
        Self { safe: false }
    }

    /// Sets safe mode.
    #[must_use]
    pub const fn with_safe(mut self, safe: bool) -> Self {
        self.safe = safe;
        self
    }

    /// Reads `STATPOOL_SAFE`; unset or unrecognised values leave safe mode
    /// off.
    #[must_use]
    pub fn from_env() -> Self {
        let safe = std::env::var(SAFE_ENV_VAR)
            .ok()
            .and_then(|raw| parse_flag(&raw))
            .unwrap_or(false);
        Self { safe }
    }
}

/// Parses the usual spellings of a boolean switch.
#[must_use]
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
