/// A guest visible descriptor handle.
pub type Fd = u32;

pub const STDIN_FD: Fd = 0;
pub const STDOUT_FD: Fd = 1;
pub const STDERR_FD: Fd = 2;

/// Handle of the first preopened directory. Preopens occupy consecutive
/// handles starting here; the current working directory follows them.
pub const FIRST_PREOPEN_FD: Fd = 3;

/// Lowest handle handed out by dynamic allocation.
pub const MIN_ALLOCATED_FD: Fd = 5;

/// Upper bound (exclusive) of the descriptor space.
pub const MAX_FD: Fd = 1024;
