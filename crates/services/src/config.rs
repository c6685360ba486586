use std::env;
use std::time::Duration;

use flashdeck_core::model::ContentLimits;
use tracing::warn;

/// Quiet period after the last keystroke before an edit is written.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// What a failed reorder write does to the local sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReorderFailurePolicy {
    /// Keep the moved sequence and report; the next refetch reconciles.
    #[default]
    KeepLocal,
    /// Restore the sequence as it was before the move.
    Rollback,
}

/// Context handed to every ordered collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub debounce: Duration,
    pub limits: ContentLimits,
    pub read_only: bool,
    pub reorder_failure: ReorderFailurePolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            limits: ContentLimits::default(),
            read_only: false,
            reorder_failure: ReorderFailurePolicy::KeepLocal,
        }
    }
}

impl SyncConfig {
    /// Defaults overridden by `FLASHDECK_DEBOUNCE_MS`, `FLASHDECK_MAX_CHARS`,
    /// `FLASHDECK_READ_ONLY` and `FLASHDECK_REORDER_ROLLBACK`.
    ///
    /// Unparseable values are logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(ms) = parse_number::<u64>(&lookup, "FLASHDECK_DEBOUNCE_MS") {
            config.debounce = Duration::from_millis(ms);
        }
        if let Some(max) = parse_number::<usize>(&lookup, "FLASHDECK_MAX_CHARS") {
            if max == 0 {
                warn!(key = "FLASHDECK_MAX_CHARS", "ignoring zero character limit");
            } else {
                config.limits.max_content_chars = max;
            }
        }
        if let Some(flag) = parse_flag(&lookup, "FLASHDECK_READ_ONLY") {
            config.read_only = flag;
        }
        if let Some(flag) = parse_flag(&lookup, "FLASHDECK_REORDER_ROLLBACK") {
            config.reorder_failure = if flag {
                ReorderFailurePolicy::Rollback
            } else {
                ReorderFailurePolicy::KeepLocal
            };
        }

        config
    }

    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    #[must_use]
    pub fn with_reorder_failure(mut self, policy: ReorderFailurePolicy) -> Self {
        self.reorder_failure = policy;
        self
    }
}

fn parse_number<N: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<N> {
    let raw = lookup(key)?;
    match raw.trim().parse::<N>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring invalid number");
            None
        }
    }
}

fn parse_flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<bool> {
    let raw = lookup(key)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => {
            warn!(key, value = %raw, "ignoring invalid flag");
            None
        }
    }
}
