//! Database configuration.

/// How the select-result cache behaves when records change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Entries are appended and never invalidated.
    ///
    /// A select repeated after a mutation returns the earlier result. This
    /// is the historical behaviour of the on-disk cache format.
    #[default]
    AppendOnly,
    /// Cached selects of a table are dropped whenever that table is mutated.
    InvalidateOnWrite,
    /// The cache file is neither read nor written.
    Disabled,
}

/// Configuration for opening a database.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create a database when opening one that doesn't exist.
    pub create_if_missing: bool,

    /// Select-result cache behaviour.
    pub cache_mode: CacheMode,

    /// Whether record values must parse as their declared field type.
    pub strict_types: bool,

    /// Whether file replacements are fsynced before being renamed into place.
    pub sync_writes: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            cache_mode: CacheMode::AppendOnly,
            strict_types: true,
            sync_writes: true,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the database if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets the cache mode.
    #[must_use]
    pub const fn cache_mode(mut self, mode: CacheMode) -> Self {
        self.cache_mode = mode;
        self
    }

    /// Sets whether values are checked against their declared types.
    #[must_use]
    pub const fn strict_types(mut self, value: bool) -> Self {
        self.strict_types = value;
        self
    }

    /// Sets whether file replacements are fsynced.
    #[must_use]
    pub const fn sync_writes(mut self, value: bool) -> Self {
        self.sync_writes = value;
        self
    }
}
