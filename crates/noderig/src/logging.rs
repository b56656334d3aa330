use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};

/// Append-only log file that is reopened when something deletes it mid-run.
struct LogFile {
    path: PathBuf,
    file: File,
}

impl LogFile {
    fn open(path: PathBuf) -> io::Result<Self> {
        let file = Self::append(&path)?;
        Ok(Self { path, file })
    }

    fn append(path: &Path) -> io::Result<File> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(path)
    }
}

impl Write for LogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.path.exists() {
            self.file = Self::append(&self.path)?;
        }
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Drop the older half of the log, at a line boundary, once it exceeds
/// `max_size` bytes.
fn truncate_oversized(log_path: &Path, max_size: u64) {
    let Ok(metadata) = std::fs::metadata(log_path) else {
        return;
    };
    if metadata.len() <= max_size {
        return;
    }
    let Ok(contents) = std::fs::read(log_path) else {
        return;
    };
    let midpoint = contents.len() / 2;
    let start = contents[midpoint..]
        .iter()
        .position(|&byte| byte == b'\n')
        .map_or(midpoint, |offset| midpoint + offset + 1);
    if let Err(error) = std::fs::write(log_path, &contents[start..]) {
        eprintln!("failed to truncate {}: {error}", log_path.display());
    }
}

fn terminal_config() -> Config {
    ConfigBuilder::new()
        .set_time_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .add_filter_allow_str("noderig")
        .build()
}

fn file_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .add_filter_allow_str("noderig")
        .build()
}

/// Log to stderr and, when `log_path` can be opened, to a file that always
/// records at debug level.
pub fn init_logging(log_path: Option<&Path>, verbose: bool, max_log_size: u64) {
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        terminal_level(verbose),
        terminal_config(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];

    let log_file = log_path.and_then(|path| {
        truncate_oversized(path, max_log_size);
        LogFile::open(path.to_path_buf()).ok()
    });
    if let Some(log_file) = log_file {
        loggers.push(WriteLogger::new(LevelFilter::Debug, file_config(), log_file));
    }

    let _ = CombinedLogger::init(loggers);
}

fn terminal_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}
