/// Recurrence of a task: `"<number> <unit>"`.
pub const KEY_EVERY: &str = "every";

/// Memory ceiling in megabytes.
pub const KEY_MAX_MEM: &str = "MaxMem";

/// Runtime ceiling in seconds.
pub const KEY_MAX_RUNTIME: &str = "MaxRuntime";
