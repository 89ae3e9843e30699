use serde::{Deserialize, Serialize};

/// Connection settings applied when a [`crate::SqliteStore`] is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(default = "StoreConfig::default_busy_timeout_ms")]
    pub busy_timeout_ms: u32,

    /// Page cache size in KiB.
    #[serde(default = "StoreConfig::default_cache_size_kib")]
    pub cache_size_kib: u32,

    /// Use write-ahead logging so readers keep the last committed timeline
    /// while a recompute is in flight.
    #[serde(default = "StoreConfig::default_wal")]
    pub wal: bool,
}

impl StoreConfig {
    const fn default_busy_timeout_ms() -> u32 {
        5000
    }

    const fn default_cache_size_kib() -> u32 {
        32000
    }

    const fn default_wal() -> bool {
        true
    }

    pub fn with_busy_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.busy_timeout_ms = timeout_ms;
        self
    }

    pub fn with_cache_size_kib(mut self, kib: u32) -> Self {
        self.cache_size_kib = kib;
        self
    }

    pub fn with_wal(mut self, wal: bool) -> Self {
        self.wal = wal;
        self
    }

    pub(crate) fn pragmas(&self) -> String {
        let journal = if self.wal { "WAL" } else { "DELETE" };
        format!(
            "
            PRAGMA journal_mode = {journal};
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA cache_size = -{};
            PRAGMA busy_timeout = {};
            ",
            self.cache_size_kib, self.busy_timeout_ms
        )
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: Self::default_busy_timeout_ms(),
            cache_size_kib: Self::default_cache_size_kib(),
            wal: Self::default_wal(),
        }
    }
}
