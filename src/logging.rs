//! tracing subscriber setup. Log lines go to stderr so the summary on stdout stays clean.
use std::io;
use tracing::Level;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
pub fn init_logging(level: Level) {
    init_logging_with_writer(level, io::stderr);
}
pub fn init_logging_with_writer<W>(level: Level, writer: W)
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(false)
        .without_time();
    let result = tracing_subscriber::registry()
        .with(build_env_filter(level))
        .with(layer)
        .try_init();
    if let Err(e) = result {
        tracing::debug!(error = %e, "日志订阅器已初始化, 跳过");
    }
}
/// `RUST_LOG` wins over the command-line level; dependencies stay at `warn`.
fn build_env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = level.as_str().to_lowercase();
        EnvFilter::new(format!("warn,bookfill={level}"))
    })
}
