use {
    std::{path::Path, sync::Mutex},
    tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter},
};

/// Logs to stderr and, if `log_file` is set, appends the same lines to that file.
///
/// The level defaults to `info` and can be changed with `RUST_LOG`.
pub fn init(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?;
    let file_layer = match log_file {
        Some(path) => {
            let file = fs_err::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()?;
    Ok(())
}
