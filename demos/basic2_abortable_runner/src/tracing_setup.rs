use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::EnvFilter;

/// Installs a compact stdout subscriber. `EASERUN_LOG=trace` shows every transition.
pub fn tracing_init() {
    let filter = EnvFilter::try_from_env("EASERUN_LOG").unwrap_or_else(|_| EnvFilter::new("debug"));
    let subscriber = tracing_subscriber::fmt()
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(true)
        .with_target(false)
        .with_env_filter(filter)
        .with_timer(Elapsed::default())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("tracing subscriber already set");
}

/// Milliseconds since the demo started.
#[derive(Debug, Clone, Copy)]
pub struct Elapsed {
    start: chrono::DateTime<chrono::offset::Local>,
}

impl Default for Elapsed {
    fn default() -> Self {
        Self {
            start: chrono::Local::now(),
        }
    }
}

impl FormatTime for Elapsed {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let elapsed = chrono::Local::now() - self.start;
        write!(w, "+{:>6}ms", elapsed.num_milliseconds())
    }
}
