use clap::ValueEnum;
use mcuwire_session::{EventSink, FaultSeverity, SessionEvent};
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info, warn};

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Install the stderr subscriber. Stdout is reserved for command output.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(LevelFilter::from(level))
        .with_ansi(false)
        .with_target(false);

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}

/// Route session log lines, faults and state changes to the subscriber.
/// Sample batches are left to the caller.
pub fn log_session_event(event: &SessionEvent) {
    match event {
        SessionEvent::Log(entry) => {
            info!(category = %entry.category, "{}", entry.message);
        }
        SessionEvent::Fault(fault) => match fault.severity {
            FaultSeverity::Warning => {
                warn!(code = %fault.code, context = %fault.context, "{}", fault.message)
            }
            FaultSeverity::Critical => {
                error!(code = %fault.code, context = %fault.context, "{}", fault.message)
            }
        },
        SessionEvent::State(state) => debug!(%state, "transport state"),
        SessionEvent::WriteResult(result) => {
            debug!(target_addr = %result.target, success = result.success, "{}", result.detail)
        }
        SessionEvent::Samples(_) => {}
    }
}

/// A sink that only logs. For commands that print nothing from events.
pub fn log_sink() -> impl EventSink {
    |event: SessionEvent| {
        log_session_event(&event);
    }
}
