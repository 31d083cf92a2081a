//! Logging through `env_logger`, routed around progress bars on a TTY

use std::io::Write;

use indicatif::MultiProgress;

fn level_label(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "ERROR",
        log::Level::Warn => "WARN ",
        log::Level::Info => "INFO ",
        log::Level::Debug => "DEBUG",
        log::Level::Trace => "TRACE",
    }
}

fn level_color(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "\x1b[31m",
        log::Level::Warn => "\x1b[33m",
        log::Level::Info => "\x1b[32m",
        log::Level::Debug => "\x1b[36m",
        log::Level::Trace => "\x1b[35m",
    }
}

/// Logger that prints through indicatif MultiProgress so lines do not tear bars.
pub struct IndicatifLogger {
    inner: env_logger::Logger,
    multi: MultiProgress,
}

impl IndicatifLogger {
    pub fn new(inner: env_logger::Logger, multi: MultiProgress) -> Self {
        Self { inner, multi }
    }
}

impl log::Log for IndicatifLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if !self.inner.matches(record) {
            return;
        }
        let level = record.level();
        let line = format!(
            "[{}{}\x1b[0m] {}",
            level_color(level),
            level_label(level),
            record.args()
        );
        self.multi.suspend(|| eprintln!("{line}"));
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Default filter: `debug` wins over `quiet`; `RUST_LOG` overrides both.
fn default_level(quiet: bool, debug: bool) -> &'static str {
    if debug {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    }
}

/// Install the global logger.
///
/// With `multi`, lines go through [`IndicatifLogger`]. Otherwise plain
/// timestamped lines without colors, for log files and pipes.
pub fn init_logging(
    quiet: bool,
    debug: bool,
    multi: Option<&MultiProgress>,
) -> Result<(), log::SetLoggerError> {
    let env = env_logger::Env::default().default_filter_or(default_level(quiet, debug));

    if let Some(multi) = multi {
        let logger = env_logger::Builder::from_env(env).build();
        let max_level = logger.filter();
        log::set_boxed_logger(Box::new(IndicatifLogger::new(logger, multi.clone())))?;
        log::set_max_level(max_level);
        Ok(())
    } else {
        env_logger::Builder::from_env(env)
            .format(|buf, record| {
                writeln!(
                    buf,
                    "{} [{}] {}",
                    buf.timestamp_seconds(),
                    level_label(record.level()),
                    record.args()
                )
            })
            .try_init()
    }
}
