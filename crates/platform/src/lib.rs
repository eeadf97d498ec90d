//! Platform-specific unsafe code isolation for `ulog`.
//!
//! The only unsafe-adjacent surface the daemon needs is signal delivery: the
//! self-pipe trick that turns an asynchronous `SIGINT`/`SIGTERM` into a
//! byte the main event loop can observe through its poller, so that all
//! shutdown work happens on the main loop rather than inside a signal
//! handler.

#[cfg(unix)]
pub mod signal;
