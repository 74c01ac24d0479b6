use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use dirs::data_dir;
use std::env;
use std::path::PathBuf;
use strip_ansi_escapes::Writer;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_error::ErrorLayer;
use tracing_subscriber::fmt::{Layer, MakeWriter};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

const LOG_FILE_NAME: &str = "error.log";

struct MakeFileWriter {
    file_writer: NonBlocking,
}

impl MakeFileWriter {
    const fn new(file_writer: NonBlocking) -> Self {
        Self { file_writer }
    }
}

impl<'a> MakeWriter<'a> for MakeFileWriter {
    type Writer = Writer<NonBlocking>;

    fn make_writer(&'a self) -> Self::Writer {
        Writer::new(self.file_writer.clone())
    }
}

/// Directory the warning log for `app_name` is written into.
pub fn log_dir(app_name: &str) -> Result<PathBuf> {
    let base = match data_dir() {
        Some(dir) => dir,
        None => env::current_dir()?,
    };

    Ok(base.join(app_name))
}

/// Installs a global `tracing` subscriber for hosts which do not bring their own.
///
/// Everything at `info` and above (or whatever `RUST_LOG` asks for) goes to stdout.
/// Warnings and errors are additionally written, without ANSI escapes,
/// to `error.log` inside [`log_dir`].
///
/// The returned guard must be held for as long as file logging should keep flushing.
pub fn install_tracing(app_name: &str) -> Result<WorkerGuard> {
    let fmt_layer = fmt::layer().with_target(true);
    let filter_layer = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    let file_filter_layer =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("warn"))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE_NAME)
        .build(log_dir(app_name)?)
        .wrap_err("Failed to create the log file appender")?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .with(
            Layer::default()
                .with_writer(MakeFileWriter::new(file_writer))
                .with_ansi(false)
                .with_filter(file_filter_layer),
        )
        .try_init()
        .wrap_err("A global tracing subscriber is already installed")?;

    Ok(guard)
}
