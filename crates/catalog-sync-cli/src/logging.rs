use color_eyre::eyre::eyre;
use color_eyre::Result;
use std::io;
use std::io::IsTerminal;
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::{self, time::ChronoUtc};
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

type Filtered = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<Filtered> + Send + Sync>;

/// Rolling files are named `catalog-sync.YYYY-MM-DD`
const LOG_FILE_PREFIX: &str = "catalog-sync";

/// 0 = info, 1 = debug with noisy HTTP internals held back, 2+ = trace.
/// `RUST_LOG` wins over the verbosity flags, `-q` wins over both.
fn env_filter(verbose_level: u8, quiet: bool) -> EnvFilter {
    if quiet {
        return EnvFilter::new("error");
    }
    let default = match verbose_level {
        0 => "info",
        1 => "debug,hyper::proto::h1=warn,hyper::client::pool=warn,chromiumoxide::conn=warn",
        _ => "trace",
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

fn json_requested() -> bool {
    std::env::var("RUST_LOG_JSON")
        .map(|v| v == "true")
        .unwrap_or_else(|_| !io::stdout().is_terminal())
}

/// Log to stderr and, when `log_dir` is given, to a daily rolling file in it
pub fn init_logging(verbose_level: u8, quiet: bool, log_dir: Option<&Path>) -> Result<()> {
    let json = json_requested();
    let mut layers: Vec<BoxedLayer> = Vec::new();

    if json {
        layers.push(
            fmt::layer()
                .json()
                .with_timer(ChronoUtc::rfc_3339())
                .with_writer(io::stderr)
                .boxed(),
        );
    } else {
        layers.push(fmt::layer().with_timer(ChronoUtc::rfc_3339()).with_writer(io::stderr).boxed());
    }

    if let Some(log_dir) = log_dir {
        std::fs::create_dir_all(log_dir)
            .map_err(|e| eyre!("Failed to create log directory {}: {}", log_dir.display(), e))?;
        let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE_PREFIX);

        if json {
            layers.push(
                fmt::layer()
                    .json()
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(file_appender)
                    .boxed(),
            );
        } else {
            layers.push(
                fmt::layer()
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .with_writer(file_appender)
                    .boxed(),
            );
        }
    }

    Registry::default()
        .with(env_filter(verbose_level, quiet))
        .with(layers)
        .try_init()
        .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;
    Ok(())
}
