// Matcher configuration and level profiles.
//
// Each profile trades the resynchronization search window against speed:
// the search costs O(W^2 * A) per mismatch, so wider windows find more
// distant realignments at a quadratic price.

use crate::format::MAX_LITERAL_LEN;

/// Largest lookahead (search window plus anchor length) a matcher accepts.
/// Offsets inside the window are indexed as `u32`.
pub const MAX_LOOKAHEAD: usize = u32::MAX as usize;

/// Default anchor length (bytes that must agree to accept a resync point).
pub const DEFAULT_ANCHOR_LENGTH: usize = 8;

/// Default resynchronization search window.
pub const DEFAULT_SEARCH_WINDOW: usize = 4096;

/// Default backward-reference bound for streamed old input (64 KiB).
pub const DEFAULT_MAX_OLD_LOOKBACK: usize = 1 << 16;

/// Default size at which a growing Insert span is flushed (1 MiB).
pub const DEFAULT_MAX_INSERT_LEN: usize = 1 << 20;

/// Configuration for diffing and applying.
///
/// Passed explicitly into every entry point; there is no global state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Profile name for display purposes.
    pub name: &'static str,
    /// Minimum run of equal bytes required to accept a resync point.
    pub anchor_length: usize,
    /// Maximum forward offset scanned in either sequence while resyncing.
    pub search_window: usize,
    /// How far behind its position a forward-only old source stays
    /// addressable.
    pub max_old_lookback: usize,
    /// Insert spans are emitted once they reach this many bytes.
    pub max_insert_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        DEFAULT
    }
}

impl Config {
    /// Bytes a cursor must be able to address ahead of its position for
    /// the matcher to run.
    pub fn lookahead(&self) -> usize {
        self.search_window.saturating_add(self.anchor_length)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.anchor_length == 0 {
            return Err(ConfigError::ZeroAnchorLength);
        }
        if self.search_window == 0 {
            return Err(ConfigError::ZeroSearchWindow);
        }
        if self.max_insert_len == 0 {
            return Err(ConfigError::ZeroInsertLimit);
        }
        match self.search_window.checked_add(self.anchor_length) {
            Some(n) if n <= MAX_LOOKAHEAD => {}
            _ => return Err(ConfigError::WindowTooLarge),
        }
        if self.max_insert_len as u64 > MAX_LITERAL_LEN {
            return Err(ConfigError::InsertLimitTooLarge);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("anchor length must be at least 1")]
    ZeroAnchorLength,
    #[error("search window must be at least 1")]
    ZeroSearchWindow,
    #[error("maximum insert length must be at least 1")]
    ZeroInsertLimit,
    #[error("search window plus anchor length must not exceed {}", MAX_LOOKAHEAD)]
    WindowTooLarge,
    #[error("maximum insert length must not exceed {}", MAX_LITERAL_LEN)]
    InsertLimitTooLarge,
}

/// Compression levels mapping to profiles.
///
/// - Levels 0-1: fastest
/// - Levels 2-4: fast
/// - Levels 5-6: default
/// - Levels 7-9: slow
pub fn config_for_level(level: u32) -> Config {
    match level {
        0 | 1 => FASTEST,
        2..=4 => FAST,
        5 | 6 => DEFAULT,
        _ => SLOW,
    }
}

// ---------------------------------------------------------------------------
// Profile definitions
// ---------------------------------------------------------------------------

pub const FASTEST: Config = Config {
    name: "fastest",
    anchor_length: 16,
    search_window: 256,
    max_old_lookback: DEFAULT_MAX_OLD_LOOKBACK,
    max_insert_len: DEFAULT_MAX_INSERT_LEN,
};

pub const FAST: Config = Config {
    name: "fast",
    anchor_length: 12,
    search_window: 1024,
    max_old_lookback: DEFAULT_MAX_OLD_LOOKBACK,
    max_insert_len: DEFAULT_MAX_INSERT_LEN,
};

pub const DEFAULT: Config = Config {
    name: "default",
    anchor_length: DEFAULT_ANCHOR_LENGTH,
    search_window: DEFAULT_SEARCH_WINDOW,
    max_old_lookback: DEFAULT_MAX_OLD_LOOKBACK,
    max_insert_len: DEFAULT_MAX_INSERT_LEN,
};

pub const SLOW: Config = Config {
    name: "slow",
    anchor_length: 6,
    search_window: 16384,
    max_old_lookback: DEFAULT_MAX_OLD_LOOKBACK,
    max_insert_len: DEFAULT_MAX_INSERT_LEN,
};
