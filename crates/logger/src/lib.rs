//! A small leveled logger that writes to an optional file (local or
//! proxied through a `ulog` daemon via [`ulog_client::ProxyFile`]) and fans
//! out to stdout/stderr by level, mirroring the formatter/fan-out the core
//! protocol treats as an external collaborator.
//!
//! This crate is the "already-formatted UTF-8 byte string" producer the
//! core protocol expects on the other end of `ProxyFile::write` — it is not
//! part of the wire protocol itself.

mod error;
mod level;

use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use error::LoggerError;
pub use level::Level;
use time::OffsetDateTime;
use ulog_client::ProxyFile;

/// Default socket path a [`Logger`] connects to when not overridden,
/// matching the daemon's own default.
pub const DEFAULT_SOCK_PATH: &str = "/tmp/ulog.sock";

/// Default handshake/close timeout, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Construction-time knobs for a [`Logger`]. `Default` matches the source
/// implementation's defaults: everything at or above `Debug` goes to the
/// file, `Info` and above to stdout, `Warning` and above to stderr (stdout
/// and stderr are mutually exclusive per record: stderr takes priority).
pub struct LoggerConfig {
    pub file_level: Option<Level>,
    pub stdout_level: Option<Level>,
    pub stderr_level: Option<Level>,
    pub local_file: bool,
    pub socket_path: PathBuf,
    pub timeout: Duration,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            file_level: Some(Level::Debug),
            stdout_level: Some(Level::Info),
            stderr_level: Some(Level::Warning),
            local_file: false,
            socket_path: PathBuf::from(DEFAULT_SOCK_PATH),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

enum Destination {
    Local(std::fs::File),
    Proxy(ProxyFile),
}

impl Destination {
    fn write(&mut self, bytes: &[u8]) -> Result<(), LoggerError> {
        match self {
            Destination::Local(file) => {
                file.write_all(bytes)?;
                file.flush()?;
                Ok(())
            }
            Destination::Proxy(proxy) => {
                proxy.write(bytes)?;
                Ok(())
            }
        }
    }

    fn close(&mut self) -> Result<(), LoggerError> {
        match self {
            Destination::Local(file) => {
                file.flush()?;
                Ok(())
            }
            Destination::Proxy(proxy) => {
                proxy.close()?;
                Ok(())
            }
        }
    }
}

/// Logs to an optional file and fans out to stdout/stderr by level.
pub struct Logger {
    name: Option<String>,
    file_level: Option<Level>,
    stdout_level: Option<Level>,
    stderr_level: Option<Level>,
    min_level: Level,
    file: Option<Destination>,
    closed: bool,
}

impl Logger {
    /// Opens a logger for `filepath` (or a fully disabled file sink if
    /// `filepath` is `None` or `config.file_level` is `None`).
    pub fn open(
        name: Option<String>,
        filepath: Option<&Path>,
        config: LoggerConfig,
    ) -> Result<Self, LoggerError> {
        let min_level = [config.file_level, config.stdout_level, config.stderr_level]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(Level::Critical);

        let file = match (config.file_level, filepath) {
            (Some(_), Some(path)) if config.local_file => {
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?;
                Some(Destination::Local(file))
            }
            (Some(_), Some(path)) => {
                let proxy = ProxyFile::open(path, &config.socket_path, config.timeout)?;
                Some(Destination::Proxy(proxy))
            }
            _ => None,
        };

        Ok(Self {
            name,
            file_level: config.file_level,
            stdout_level: config.stdout_level,
            stderr_level: config.stderr_level,
            min_level,
            file,
            closed: false,
        })
    }

    fn format(&self, level: Level, msg: &str) -> String {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        let name = self.name.as_deref().unwrap_or("-");
        let mut out = String::with_capacity(msg.len() + 32);
        let _ = write!(
            out,
            "[{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:03} {name} {level}] {msg}\n",
            now.year(),
            u8::from(now.month()),
            now.day(),
            now.hour(),
            now.minute(),
            now.second(),
            now.millisecond(),
        );
        out
    }

    /// Logs `msg` at `level`. A no-op if `level` is below every configured
    /// sink's threshold.
    pub fn log(&mut self, level: Level, msg: &str) -> Result<(), LoggerError> {
        if level < self.min_level {
            return Ok(());
        }
        let rendered = self.format(level, msg);

        if let (Some(file_level), Some(dest)) = (self.file_level, self.file.as_mut()) {
            if level >= file_level {
                dest.write(rendered.as_bytes())?;
            }
        }

        if self.stderr_level.is_some_and(|threshold| level >= threshold) {
            let mut stderr = io::stderr();
            let _ = stderr.write_all(rendered.as_bytes());
            let _ = stderr.flush();
        } else if self.stdout_level.is_some_and(|threshold| level >= threshold) {
            let mut stdout = io::stdout();
            let _ = stdout.write_all(rendered.as_bytes());
            let _ = stdout.flush();
        }

        Ok(())
    }

    /// Logs `msg` at [`Level::Error`] followed by `err`'s cause chain, the
    /// closest analogue to the source implementation's traceback dump.
    pub fn exception(
        &mut self,
        msg: &str,
        err: &(dyn std::error::Error + 'static),
    ) -> Result<(), LoggerError> {
        let mut full = msg.to_string();
        let mut cause: Option<&dyn std::error::Error> = Some(err);
        while let Some(e) = cause {
            let _ = write!(full, "\ncaused by: {e}");
            cause = e.source();
        }
        self.log(Level::Error, &full)
    }

    pub fn debug(&mut self, msg: &str) -> Result<(), LoggerError> {
        self.log(Level::Debug, msg)
    }

    pub fn info(&mut self, msg: &str) -> Result<(), LoggerError> {
        self.log(Level::Info, msg)
    }

    pub fn warning(&mut self, msg: &str) -> Result<(), LoggerError> {
        self.log(Level::Warning, msg)
    }

    pub fn error(&mut self, msg: &str) -> Result<(), LoggerError> {
        self.log(Level::Error, msg)
    }

    pub fn critical(&mut self, msg: &str) -> Result<(), LoggerError> {
        self.log(Level::Critical, msg)
    }

    /// Closes the file sink. Idempotent.
    pub fn close(&mut self) -> Result<(), LoggerError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Some(dest) = self.file.as_mut() {
            dest.close()?;
        }
        Ok(())
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_threshold_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        let mut logger = Logger::open(
            Some("svc".into()),
            Some(&path),
            LoggerConfig {
                file_level: Some(Level::Warning),
                stdout_level: None,
                stderr_level: None,
                local_file: true,
                ..Default::default()
            },
        )
        .unwrap();
        logger.debug("ignored").unwrap();
        logger.close().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn local_file_receives_formatted_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        let mut logger = Logger::open(
            Some("svc".into()),
            Some(&path),
            LoggerConfig {
                file_level: Some(Level::Debug),
                stdout_level: None,
                stderr_level: None,
                local_file: true,
                ..Default::default()
            },
        )
        .unwrap();
        logger.info("started").unwrap();
        logger.close().unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("svc INFO"));
        assert!(contents.ends_with("started\n"));
    }

    #[test]
    fn proxied_file_round_trips_through_daemon() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("t.sock");
        let server = ulog_test_support::spawn_server(sock.clone());
        let path = dir.path().join("out.log");

        let mut logger = Logger::open(
            Some("svc".into()),
            Some(&path),
            LoggerConfig {
                file_level: Some(Level::Debug),
                stdout_level: None,
                stderr_level: None,
                local_file: false,
                socket_path: sock,
                timeout: Duration::from_secs(1),
            },
        )
        .unwrap();
        logger.info("via daemon").unwrap();
        logger.close().unwrap();

        assert!(ulog_test_support::wait_for(
            || std::fs::read_to_string(&path)
                .map(|s| s.contains("via daemon"))
                .unwrap_or(false),
            Duration::from_secs(2),
        ));
        drop(server);
    }
}
