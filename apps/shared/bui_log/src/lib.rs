//! Centralized logging for BridgeUI crates and tools
//!
//! Provides a custom formatter for tracing that:
//! - Formats thread IDs as #N instead of ThreadId(N)
//! - Extracts the `panel` and `bridge` fields to display as `panel::Settings` or
//!   `bridge::Menu->Settings`
//! - Strips the application prefix from targets for cleaner output
//! - Filters external dependency logs based on the `BUI_LOGDEPS` environment variable
//!
//! # Environment Variables
//!
//! - `BUI_LOGDEPS`: Set to `1` to enable logging from external dependencies.
//!   Default is `0` which only shows logs from `bui_*` crates.
//!
//! # Usage
//!
//! ```rust,ignore
//! use bui_log::{init_logging, LogConfig};
//! use tracing::Level;
//!
//! let config = LogConfig::<std::fs::File>::new("bui_graph::").with_level(Level::INFO);
//! init_logging(config)?;
//! ```

use std::fmt as std_fmt;
use std::io::Write;
use tracing::Level;
use tracing::field::Field;
use tracing_subscriber::field::Visit;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::fmt::{self, FmtContext, FormatEvent, FormatFields, format::Writer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

/// Crates whose logs are shown when dependency logging is off
const OWN_TARGETS: &[&str] = &["bui_core", "bui_schema", "bui_log", "bui_graph"];

/// Field extractor for the `panel`, `bridge` and `message` fields
///
/// Lifecycle logs in `bui_core` attach the panel name (or the bridge route) as
/// a structured field; the formatter lifts it in front of the message.
#[derive(Default, Debug)]
pub struct FieldExtractor {
    pub panel: Option<String>,
    pub bridge: Option<String>,
    pub message: Option<String>,
}

impl FieldExtractor {
    fn store(&mut self, field: &Field, value: String) {
        match field.name() {
            "panel" => self.panel = Some(value),
            "bridge" => self.bridge = Some(value),
            "message" => self.message = Some(value),
            _ => {}
        }
    }

    /// The `scope::name` prefix for this event, if it carries one
    pub fn scope(&self) -> Option<String> {
        match (&self.panel, &self.bridge) {
            (Some(panel), _) => Some(format!("panel::{}", panel)),
            (None, Some(bridge)) => Some(format!("bridge::{}", bridge)),
            (None, None) => None,
        }
    }
}

impl Visit for FieldExtractor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.store(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std_fmt::Debug) {
        self.store(field, format!("{:?}", value).trim_matches('"').to_string());
    }
}

/// Custom event formatter for BridgeUI applications
///
/// Panel and bridge logs are printed as `panel::Settings: message`; every other
/// event falls back to `target: fields` with the configured prefix stripped.
pub struct CustomFormatter<T> {
    timer: T,
    ansi: bool,
    /// Prefix to strip from log targets (e.g., "bui_graph::")
    strip_prefix: Option<String>,
}

impl<T> CustomFormatter<T> {
    pub fn new(timer: T, ansi: bool) -> Self {
        Self {
            timer,
            ansi,
            strip_prefix: None,
        }
    }

    /// Set the prefix to strip from log targets
    pub fn with_strip_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.strip_prefix = Some(prefix.into());
        self
    }

    /// Target as displayed: own-code targets lose the prefix, the bare
    /// application name is hidden entirely.
    fn display_target<'a>(&self, target: &'a str) -> Option<&'a str> {
        let Some(prefix) = &self.strip_prefix else {
            return Some(target);
        };
        let app_name = prefix.trim_end_matches("::");
        if target == app_name {
            return None;
        }
        let shown = target.strip_prefix(prefix.as_str()).unwrap_or(target);
        (!shown.is_empty()).then_some(shown)
    }
}

impl<T: Clone> Clone for CustomFormatter<T> {
    fn clone(&self) -> Self {
        Self {
            timer: self.timer.clone(),
            ansi: self.ansi,
            strip_prefix: self.strip_prefix.clone(),
        }
    }
}

impl<S, N, T> FormatEvent<S, N> for CustomFormatter<T>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
    T: fmt::time::FormatTime,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std_fmt::Result {
        let metadata = event.metadata();

        let (dim_start, dim_end) = if self.ansi {
            ("\x1b[2m", "\x1b[0m")
        } else {
            ("", "")
        };
        let (level_color, level_str) = match *metadata.level() {
            Level::ERROR => (if self.ansi { "\x1b[31m" } else { "" }, "ERROR"),
            Level::WARN => (if self.ansi { "\x1b[33m" } else { "" }, " WARN"),
            Level::INFO => (if self.ansi { "\x1b[32m" } else { "" }, " INFO"),
            Level::DEBUG => (if self.ansi { "\x1b[34m" } else { "" }, "DEBUG"),
            Level::TRACE => (if self.ansi { "\x1b[35m" } else { "" }, "TRACE"),
        };
        let color_end = if self.ansi { "\x1b[0m" } else { "" };

        write!(writer, "{}", dim_start)?;
        self.timer.format_time(&mut writer)?;
        write!(writer, "{} ", dim_end)?;

        write!(writer, "{}{}{} ", level_color, level_str, color_end)?;

        let thread_id = format!("{:?}", std::thread::current().id());
        if let Some(num) = thread_id
            .strip_prefix("ThreadId(")
            .and_then(|s| s.strip_suffix(")"))
            .and_then(|s| s.parse::<u64>().ok())
        {
            write!(writer, "#{:03} ", num)?;
        }

        let mut extractor = FieldExtractor::default();
        event.record(&mut extractor);

        if let Some(scope) = extractor.scope() {
            write!(writer, "{}{}{}: ", dim_start, scope, dim_end)?;
            if let Some(msg) = &extractor.message {
                write!(writer, "{}", msg)?;
            }
        } else {
            if let Some(target) = self.display_target(metadata.target()) {
                write!(writer, "{}{}{}: ", dim_start, target, dim_end)?;
            }
            ctx.field_format().format_fields(writer.by_ref(), event)?;
        }

        writeln!(writer)
    }
}

/// Create a timer with the local offset
///
/// Uses format: `[hour]:[minute]:[second].[subsecond digits:4]`
pub fn create_custom_timer()
-> OffsetTime<&'static [time::format_description::BorrowedFormatItem<'static>]> {
    use time::macros::format_description;

    let format = format_description!("[hour]:[minute]:[second].[subsecond digits:4]");
    let offset = time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);
    OffsetTime::new(offset, format)
}

/// Check if dependency logging is enabled via BUI_LOGDEPS
pub fn is_dependency_logging_enabled() -> bool {
    std::env::var("BUI_LOGDEPS")
        .map(|v| v == "1")
        .unwrap_or(false)
}

/// Build the filter directive for the given level
///
/// Without dependency logging only the `bui_*` crates are enabled.
pub fn build_filter_directives(level: Level, log_deps: bool) -> String {
    let level_str = match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    };

    if log_deps {
        return level_str.to_string();
    }

    let mut directives = String::from("off");
    for target in OWN_TARGETS {
        directives.push_str(&format!(",{}={}", target, level_str));
    }
    directives
}

/// Parse a level name as written in config files and CLI flags
pub fn parse_level(name: &str) -> Option<Level> {
    match name.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Detect if ANSI colors should be used based on environment
///
/// Disabled for non-TTY stdout, when NO_COLOR is set, or with TERM=dumb.
pub fn should_use_ansi() -> bool {
    atty::is(atty::Stream::Stdout)
        && std::env::var("NO_COLOR").is_err()
        && std::env::var("TERM").map(|t| t != "dumb").unwrap_or(true)
}

/// Logging configuration
pub struct LogConfig<W: Write + Send + 'static = std::fs::File> {
    /// Prefix to strip from log targets (e.g., "bui_graph::")
    pub strip_prefix: String,
    /// Whether to use ANSI color codes (auto-detected if None)
    pub use_ansi: Option<bool>,
    /// Minimum log level
    pub level: Level,
    /// Optional file to write logs to
    pub log_file: Option<W>,
}

impl<W: Write + Send + 'static> LogConfig<W> {
    pub fn new(strip_prefix: impl Into<String>) -> Self {
        Self {
            strip_prefix: strip_prefix.into(),
            use_ansi: None,
            level: Level::INFO,
            log_file: None,
        }
    }

    pub fn with_ansi(mut self, use_ansi: bool) -> Self {
        self.use_ansi = Some(use_ansi);
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_log_file(mut self, file: W) -> Self {
        self.log_file = Some(file);
        self
    }
}

/// Initialize logging with the given configuration
///
/// `RUST_LOG` overrides the directives derived from `config.level`.
pub fn init_logging<W: Write + Send + 'static>(
    config: LogConfig<W>,
) -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::EnvFilter;

    let timer = create_custom_timer();
    let use_ansi = config.use_ansi.unwrap_or_else(should_use_ansi);
    let filter_directives = build_filter_directives(config.level, is_dependency_logging_enabled());

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&filter_directives));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .event_format(
            CustomFormatter::new(timer.clone(), use_ansi).with_strip_prefix(&config.strip_prefix),
        )
        .with_ansi(use_ansi)
        .with_writer(std::io::stdout);

    // Layer<S> is implemented for Option<L>, so the file layer is simply absent
    // when no file was configured.
    let file_layer = config.log_file.map(|file| {
        tracing_subscriber::fmt::layer()
            .event_format(CustomFormatter::new(timer, false).with_strip_prefix(&config.strip_prefix))
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
    });

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .with(env_filter)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives_without_deps() {
        let directives = build_filter_directives(Level::DEBUG, false);
        assert!(directives.starts_with("off,"));
        assert!(directives.contains("bui_core=debug"));
        assert!(directives.contains("bui_graph=debug"));
    }

    #[test]
    fn test_filter_directives_with_deps() {
        assert_eq!(build_filter_directives(Level::WARN, true), "warn");
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("INFO"), Some(Level::INFO));
        assert_eq!(parse_level("warning"), Some(Level::WARN));
        assert_eq!(parse_level("verbose"), None);
    }

    #[test]
    fn test_scope_prefers_panel() {
        let extractor = FieldExtractor {
            panel: Some("Settings".to_string()),
            bridge: Some("Menu->Settings".to_string()),
            message: None,
        };
        assert_eq!(extractor.scope().as_deref(), Some("panel::Settings"));

        let extractor = FieldExtractor {
            bridge: Some("->Settings".to_string()),
            ..Default::default()
        };
        assert_eq!(extractor.scope().as_deref(), Some("bridge::->Settings"));
    }

    #[test]
    fn test_display_target_stripping() {
        let formatter = CustomFormatter::new((), false).with_strip_prefix("bui_graph::");
        assert_eq!(formatter.display_target("bui_graph::commands"), Some("commands"));
        assert_eq!(formatter.display_target("bui_graph"), None);
        assert_eq!(formatter.display_target("bui_core::bridge"), Some("bui_core::bridge"));
    }
}
