use {
    anyhow::Result,
    flexi_logger::{DeferredNow, Logger, LoggerHandle, Record},
};

/// Starts console logging at `info`, or at whatever `RUST_LOG` asks for.
///
/// The returned handle must be kept alive for as long as logging is needed.
pub fn setup() -> Result<LoggerHandle> {
    let handle = Logger::try_with_env_or_str("info")?
        .format(line_format)
        .start()?;
    Ok(handle)
}

/// One line per record: level, time, source location, message.
pub fn line_format(
    w: &mut dyn std::io::Write,
    now: &mut DeferredNow,
    record: &Record,
) -> Result<(), std::io::Error> {
    write!(
        w,
        "{} [{}] [{}:{}] {}",
        record.level(),
        now.format("%H:%M:%S%.6f"),
        record.file().unwrap_or("<unnamed>"),
        record.line().unwrap_or(0),
        record.args()
    )
}
