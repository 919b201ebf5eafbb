use std::time::Duration;

pub const APP_NAME: &str = "lualink";

/// Default memory cap for a restricted engine.
pub const DEFAULT_MAX_MEMORY: usize = 100 * 1024 * 1024;

/// Smallest memory cap the sandbox accepts. Below this the Lua state cannot
/// even load its standard libraries.
pub const MIN_MEMORY_LIMIT: usize = 100 * 1024;

/// Default wall-clock budget for a single load/eval/call entry.
pub const DEFAULT_MAX_EXECUTION_TIME: Duration = Duration::from_secs(30);

/// Default memory cap for plugin states.
pub const PLUGIN_MAX_MEMORY: usize = 1024 * 1024;

/// How many VM instructions run between deadline checks. Low enough to catch
/// runaway loops within milliseconds, high enough to stay off profiles.
pub const DEADLINE_CHECK_INSTRUCTIONS: u32 = 4096;

/// Default interval between watcher polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default settle window before a change batch is delivered.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);
