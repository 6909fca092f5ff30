use anyhow::Result;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::{self, time::ChronoUtc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Filter directives when `RUST_LOG` is not set
fn default_directives(verbose_level: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose_level {
        0 => "info",
        // reqwest pulls in hyper, whose connection logs drown everything at debug
        1 => "debug,hyper=warn,reqwest::connect=info",
        _ => "trace",
    }
}

fn build_filter(verbose_level: u8, quiet: bool) -> EnvFilter {
    // -q always wins over RUST_LOG
    if quiet {
        return EnvFilter::new("error");
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(verbose_level, quiet)))
}

fn json_requested() -> bool {
    std::env::var("RUST_LOG_JSON")
        .map(|v| v == "true")
        .unwrap_or_else(|_| !io::stdout().is_terminal())
}

/// Rotation prefix from the file name: `sheetsync.log` rotates as `sheetsync.2026-01-17`
fn rotation_target(log_path: &Path) -> Result<(PathBuf, String)> {
    let dir = log_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let prefix = log_path
        .file_stem()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid log file name: {}", log_path.display()))?;
    Ok((dir, prefix.to_string()))
}

fn file_layer(log_path: &Path, json: bool) -> Result<BoxedLayer> {
    let (dir, prefix) = rotation_target(log_path)?;
    std::fs::create_dir_all(&dir)?;
    let appender = RollingFileAppender::new(Rotation::DAILY, dir, prefix);

    let layer = if json {
        fmt::layer()
            .json()
            .with_timer(ChronoUtc::rfc_3339())
            .with_writer(appender)
            .boxed()
    } else {
        fmt::layer()
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(false)
            .with_writer(appender)
            .boxed()
    };
    Ok(layer)
}

fn stderr_layer(json: bool) -> BoxedLayer {
    if json {
        fmt::layer()
            .json()
            .with_timer(ChronoUtc::rfc_3339())
            .with_writer(io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .with_timer(ChronoUtc::rfc_3339())
            .with_writer(io::stderr)
            .boxed()
    }
}

/// Logs go to stderr, and additionally to a daily-rotated file when `log_file` is set
pub fn init_logging_with_file(verbose_level: u8, quiet: bool, log_file: Option<PathBuf>) -> Result<()> {
    let json = json_requested();

    let mut layers: Vec<BoxedLayer> = vec![stderr_layer(json)];
    if let Some(path) = &log_file {
        layers.push(file_layer(path, json)?);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(build_filter(verbose_level, quiet))
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_overrides_verbosity() {
        assert_eq!(default_directives(2, true), "error");
        assert_eq!(default_directives(0, false), "info");
        assert_eq!(default_directives(5, false), "trace");
    }

    #[test]
    fn test_rotation_target_strips_extension() {
        let (dir, prefix) = rotation_target(Path::new("/var/log/sheetsync/sheetsync.log")).unwrap();
        assert_eq!(dir, PathBuf::from("/var/log/sheetsync"));
        assert_eq!(prefix, "sheetsync");
    }

    #[test]
    fn test_bare_file_name_rotates_in_working_dir() {
        let (dir, prefix) = rotation_target(Path::new("run.log")).unwrap();
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(prefix, "run");
    }
}
