use crate::shared::paths::{ensure_dir, get_log_dir};
use std::collections::HashMap;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Log targets that get their own file. Everything else lands in `system.log`.
pub const LOG_TARGETS: [&str; 2] = ["broadcast", "backend"];

/// Keeps the non-blocking writers alive. Drop it only at shutdown.
pub struct LoggingGuards {
    _guards: Vec<WorkerGuard>,
}

struct TargetWriter {
    writers: HashMap<String, NonBlocking>,
    system_writer: NonBlocking,
}

impl<'a> MakeWriter<'a> for TargetWriter {
    type Writer = Box<dyn std::io::Write + 'a>;

    fn make_writer(&'a self) -> Self::Writer {
        Box::new(self.system_writer.clone())
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        match route_target(meta.target(), self.writers.keys().map(String::as_str)) {
            Some(name) => Box::new(self.writers[name].clone()),
            None => Box::new(self.system_writer.clone()),
        }
    }
}

/// Picks the file a target is written to, matching either the exact name or a `name::` prefix.
fn route_target<'k>(target: &str, names: impl Iterator<Item = &'k str>) -> Option<&'k str> {
    names.into_iter().find(|name| {
        target == *name
            || target
                .strip_prefix(*name)
                .is_some_and(|rest| rest.starts_with("::"))
    })
}

/// Initializes logging into the default log dir.
pub fn init_logging() -> std::io::Result<LoggingGuards> {
    init_logging_in(&get_log_dir())
}

pub fn init_logging_in(log_dir: &Path) -> std::io::Result<LoggingGuards> {
    ensure_dir(log_dir)?;

    let mut guards = Vec::new();
    let mut writers = HashMap::new();

    for target in LOG_TARGETS {
        let appender = RollingFileAppender::new(Rotation::DAILY, log_dir, format!("{}.log", target));
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        writers.insert(target.to_string(), non_blocking);
        guards.push(guard);
    }

    let system_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "system.log");
    let (system_writer, system_guard) = tracing_appender::non_blocking(system_appender);
    guards.push(system_guard);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(TargetWriter {
                writers,
                system_writer,
            })
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false),
    );

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::warn!(target: "system", "Global subscriber already set, keeping existing one");
    }

    tracing::info!(target: "system", "Logging initialized at {:?}", log_dir);

    Ok(LoggingGuards { _guards: guards })
}
