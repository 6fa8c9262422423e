//! Structured logging setup (§1A, §6): reads `MONACO_LOG` for the filter
//! directive, `MONACO_LOG_FORMAT` for json-vs-text, `MONACO_LOG_UTC` for a
//! forced-UTC timestamp, and `MONACO_LOG_TO_FILE` to switch the writer from
//! stderr to `.logs/<unix-nanos>.log` plus a parallel error-only
//! `.logs/<unix-nanos>-errors.log`. Every unrecognized or unusable value
//! falls back to a sane default with a warning rather than failing startup.

use std::fs::OpenOptions;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::time::{SystemTime as FmtSystemTime, UtcTime};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config;

/// Writes to a fixed file, falling back to stderr when no file is configured
/// or the file could not be opened.
struct FileOrStderr {
    file: Option<Mutex<std::fs::File>>,
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FileOrStderr {
    type Writer = Box<dyn std::io::Write + 'a>;

    fn make_writer(&'a self) -> Self::Writer {
        self.file
            .as_ref()
            .and_then(|mutex| mutex.lock().ok())
            .and_then(|file| file.try_clone().ok())
            .map_or_else(|| Box::new(std::io::stderr()) as Self::Writer, |cloned| Box::new(cloned) as Self::Writer)
    }
}

fn open_or_stderr(path: &std::path::Path) -> FileOrStderr {
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => FileOrStderr { file: Some(Mutex::new(file)) },
        Err(e) => {
            // Tracing is not yet initialized; eprintln! is the only output channel available.
            eprintln!("Warning: could not open log file '{}': {e}. Using stderr.", path.display());
            FileOrStderr { file: None }
        }
    }
}

fn build_layer(json: bool, writer: FileOrStderr, utc: bool) -> Box<dyn Layer<Registry> + Send + Sync> {
    if json {
        let layer = tracing_subscriber::fmt::layer().json().with_span_list(false).with_target(true).with_thread_ids(false).with_line_number(true).with_writer(writer);
        if utc {
            layer.with_timer(UtcTime::rfc_3339()).boxed()
        } else {
            layer.with_timer(FmtSystemTime).boxed()
        }
    } else {
        let layer = tracing_subscriber::fmt::layer().pretty().with_span_events(FmtSpan::CLOSE).with_target(false).with_thread_ids(false).with_line_number(false).with_writer(writer);
        if utc {
            layer.with_timer(UtcTime::rfc_3339()).boxed()
        } else {
            layer.with_timer(FmtSystemTime).boxed()
        }
    }
}

/// Initializes the global `tracing` subscriber from the ambient environment.
/// Call once at process startup, before any other module logs.
pub fn init_tracing() {
    let log_level_str = std::env::var("MONACO_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = EnvFilter::try_new(&log_level_str).or_else(|_| EnvFilter::try_new("info")).unwrap_or_else(|_| EnvFilter::new("info"));

    let log_format = std::env::var("MONACO_LOG_FORMAT").map_or_else(|_| "text".to_string(), |s| s.to_lowercase());
    if log_format != "json" && log_format != "text" {
        // Tracing is not yet initialized; eprintln! is the only output channel available.
        eprintln!("Warning: Unrecognized MONACO_LOG_FORMAT '{log_format}'. Valid values: 'json', 'text'. Using 'text'.");
    }
    let json = log_format == "json";
    let utc = config::flag_from_env("MONACO_LOG_UTC");
    let to_file = config::flag_from_env("MONACO_LOG_TO_FILE");

    let (main_writer, error_writer) = if to_file {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos()).unwrap_or(0);
        let dir = std::path::Path::new(".logs");
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("Warning: could not create log directory '{}': {e}. Using stderr.", dir.display());
        }
        let main_path = dir.join(format!("{nanos}.log"));
        let error_path = dir.join(format!("{nanos}-errors.log"));
        (open_or_stderr(&main_path), Some(open_or_stderr(&error_path)))
    } else {
        (FileOrStderr { file: None }, None)
    };

    let main_layer = build_layer(json, main_writer, utc).with_filter(env_filter);
    let registry = tracing_subscriber::registry().with(main_layer);

    if let Some(error_writer) = error_writer {
        let error_layer = build_layer(json, error_writer, utc).with_filter(LevelFilter::ERROR);
        registry.with(error_layer).init();
    } else {
        registry.init();
    }
}
