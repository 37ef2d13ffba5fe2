use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Initialise logging. Without `debug` the level is forced to `info`; with
/// it the default is `debug` and `RUST_LOG` may override it.
///
/// When `log_file` is given, output is appended to that file instead of
/// stderr. Calling this more than once is harmless.
pub fn init(debug: bool, log_file: Option<PathBuf>) {
    // `RUST_LOG` is ignored without debug so a stray variable in the user's
    // environment cannot make the widget noisy.
    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::new("info")
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let file = log_file.and_then(|path| {
        let name = path.file_name()?.to_owned();
        let dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        Some(tracing_appender::rolling::never(dir, name))
    });

    let _ = match file {
        Some(appender) => builder.with_ansi(false).with_writer(appender).try_init(),
        None => builder.try_init(),
    };
}
