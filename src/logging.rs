//! Tracing setup: stderr always, optionally mirrored to a log file

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise this crate logs at warn, info, debug
/// or trace depending on `verbosity`.
pub fn init_logging(verbosity: u8, log_file: Option<&Path>) -> io::Result<()> {
    let file_layer = match log_file {
        Some(path) => Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(LogFileWriter::open(path)?),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter(verbosity))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .try_init()
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))
}

fn env_filter(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(verbosity)))
}

fn default_directives(verbosity: u8) -> String {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    format!("warn,sushi_stats_lib={level},sushi_stats={level}")
}

/// Appending writer shared by every event
#[derive(Clone)]
pub struct LogFileWriter {
    file: Arc<Mutex<std::fs::File>>,
}

impl LogFileWriter {
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Arc::new(Mutex::new(file)),
        })
    }
}

impl<'a> MakeWriter<'a> for LogFileWriter {
    type Writer = LogFileWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        LogFileWriterGuard {
            file: self.file.clone(),
        }
    }
}

pub struct LogFileWriterGuard {
    file: Arc<Mutex<std::fs::File>>,
}

impl Write for LogFileWriterGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.file.lock() {
            Ok(mut file) => file.write(buf),
            Err(_) => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.lock() {
            Ok(mut file) => file.flush(),
            Err(_) => Ok(()),
        }
    }
}
