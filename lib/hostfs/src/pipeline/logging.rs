use std::time::Instant;

use tracing::Level;

use super::{Chain, FileSystemInterceptor, OperationResult};

/// How much of each operation is written to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoggingLevel {
    None,
    /// Operation name and outcome only.
    Name,
    #[default]
    Basic,
    /// Also the message of failed operations.
    Verbose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndEvent {
    pub format_inputs: bool,
    pub format_outputs: bool,
    pub log_duration: bool,
}

impl Default for EndEvent {
    fn default() -> Self {
        Self {
            format_inputs: true,
            format_outputs: true,
            log_duration: false,
        }
    }
}

/// Which events are logged around an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggingEvents {
    pub start: bool,
    pub end: Option<EndEvent>,
}

impl Default for LoggingEvents {
    fn default() -> Self {
        Self {
            start: false,
            end: Some(EndEvent::default()),
        }
    }
}

macro_rules! emit {
    ($level:expr, $($arg:tt)+) => {
        match $level {
            Level::ERROR => tracing::error!(target: "wasi_hostfs::op", $($arg)+),
            Level::WARN => tracing::warn!(target: "wasi_hostfs::op", $($arg)+),
            Level::INFO => tracing::info!(target: "wasi_hostfs::op", $($arg)+),
            Level::DEBUG => tracing::debug!(target: "wasi_hostfs::op", $($arg)+),
            _ => tracing::trace!(target: "wasi_hostfs::op", $($arg)+),
        }
    };
}

/// Writes one line per operation through `tracing`.
#[derive(Debug, Clone)]
pub struct LoggingInterceptor {
    level: LoggingLevel,
    events: LoggingEvents,
    log_level: Level,
}

impl LoggingInterceptor {
    pub fn new(level: LoggingLevel) -> Self {
        Self {
            level,
            events: LoggingEvents::default(),
            log_level: Level::DEBUG,
        }
    }

    pub fn with_events(mut self, events: LoggingEvents) -> Self {
        self.events = events;
        self
    }

    pub fn with_log_level(mut self, log_level: Level) -> Self {
        self.log_level = log_level;
        self
    }

    fn formats_values(&self) -> bool {
        matches!(self.level, LoggingLevel::Basic | LoggingLevel::Verbose)
    }
}

impl FileSystemInterceptor for LoggingInterceptor {
    fn intercept(&self, chain: Chain<'_>) -> OperationResult {
        if self.level == LoggingLevel::None {
            return chain.proceed();
        }

        let name = chain.operation().name();
        let inputs = if self.formats_values() {
            format!("{:?}", chain.input())
        } else {
            String::new()
        };

        if self.events.start {
            emit!(self.log_level, "^{name}({inputs})");
        }

        let started = Instant::now();
        let result = chain.proceed();
        let Some(end) = self.events.end else {
            return result;
        };

        let mut message = match &result {
            Ok(output) => {
                let mut message = format!("{name}(): OK");
                if self.formats_values() {
                    if end.format_inputs {
                        message.push_str(&format!(". Inputs: {inputs}"));
                    }
                    if end.format_outputs {
                        message.push_str(&format!(". Outputs: {output:?}"));
                    }
                }
                message
            }
            Err(failure) => {
                let mut message = format!("{name}(): Error {}", failure.error_errno().name());
                if self.level == LoggingLevel::Verbose {
                    message.push_str(&format!(" ({})", failure.error_message()));
                }
                message
            }
        };
        if end.log_duration {
            message.push_str(&format!(". Duration: {}ms", started.elapsed().as_millis()));
        }
        emit!(self.log_level, "{message}");
        result
    }
}
