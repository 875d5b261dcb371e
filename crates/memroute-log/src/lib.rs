//! memroute-log — tracing setup for memroute processes.
//!
//! Two outputs:
//!
//! - the access log, which receives only events with target
//!   [`ACCESS_TARGET`], unfiltered
//! - the main log (error file, or stderr when none is configured), which
//!   receives everything else through an `EnvFilter`
//!
//! Both files are [`LogFile`]s, so a running process can reopen them
//! after external rotation via [`LogHandles::reopen`].

pub mod file;

pub use file::LogFile;

use std::io;

use anyhow::Context;
use memroute_core::LogConfig;
use tracing::Subscriber;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, filter, fmt};

/// Target that routes an event to the access log.
pub const ACCESS_TARGET: &str = "memroute::access";

/// Open log files, kept so they can be reopened later.
#[derive(Debug, Clone, Default)]
pub struct LogHandles {
    pub access: Option<LogFile>,
    pub error: Option<LogFile>,
}

impl LogHandles {
    /// Reopen every configured file at its current path.
    pub fn reopen(&self) -> io::Result<()> {
        for file in self.access.iter().chain(self.error.iter()) {
            file.reopen()?;
        }
        Ok(())
    }
}

/// Install the global subscriber described by `config`.
pub fn init(config: &LogConfig) -> anyhow::Result<LogHandles> {
    let (subscriber, handles) = subscriber(config)?;
    subscriber
        .try_init()
        .context("installing tracing subscriber")?;
    Ok(handles)
}

/// Build, without installing, the subscriber described by `config`.
///
/// `RUST_LOG` takes precedence over `log.filter` for the main log.
pub fn subscriber(
    config: &LogConfig,
) -> anyhow::Result<(impl Subscriber + Send + Sync + 'static, LogHandles)> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.filter())
            .with_context(|| format!("invalid log filter {:?}", config.filter()))?,
    };

    let access = config
        .access
        .as_ref()
        .map(|path| {
            LogFile::open(path)
                .with_context(|| format!("opening access log {}", path.display()))
        })
        .transpose()?;
    let error = config
        .error
        .as_ref()
        .map(|path| {
            LogFile::open(path).with_context(|| format!("opening error log {}", path.display()))
        })
        .transpose()?;

    let access_layer = access.clone().map(|file| {
        fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(false)
            .with_filter(filter::filter_fn(|meta| meta.target() == ACCESS_TARGET))
    });

    let main_layer = match error.clone() {
        Some(file) => fmt::layer()
            .with_writer(BoxMakeWriter::new(file))
            .with_ansi(false),
        None => fmt::layer().with_writer(BoxMakeWriter::new(io::stderr)),
    }
    .with_filter(env_filter)
    .with_filter(filter::filter_fn(|meta| meta.target() != ACCESS_TARGET));

    let subscriber = tracing_subscriber::registry()
        .with(access_layer)
        .with(main_layer);

    Ok((subscriber, LogHandles { access, error }))
}
