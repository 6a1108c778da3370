use std::path::PathBuf;
use std::sync::Arc;

use beacon::prelude::*;
use tracing_subscriber::EnvFilter;

fn usage() -> ! {
    eprintln!("Usage: beacon_send [--print] [config.json]");
    eprintln!();
    eprintln!("Example:");
    eprintln!("  RUST_LOG=debug beacon_send --print sender.json");
    std::process::exit(2);
}

/// Prints every packet to stdout.
struct StdoutViewer;

impl DataViewer for StdoutViewer {
    fn name(&self) -> &str {
        "stdout"
    }

    fn receive_data(&self, packet: &[u8]) {
        println!("{}", String::from_utf8_lossy(packet));
    }
}

fn load_config(path: Option<PathBuf>) -> beacon::Result<LogConfiguration> {
    let Some(path) = path else {
        return Ok(LogConfiguration::builder()
            .module_name("EventSender")
            .version("1.0.0")
            .host("EventSender")
            .cache_file_path("storage.db")
            .max_teardown_time(1)
            .build());
    };
    let raw = std::fs::read_to_string(&path)
        .map_err(|e| beacon::Error::Config(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&raw).map_err(|e| beacon::Error::Config(format!("{}: {e}", path.display())))
}

fn run(config: LogConfiguration, print: bool) -> beacon::Result<()> {
    let host = TelemetryHost::new();
    if print {
        host.viewers().register_viewer(Arc::new(StdoutViewer))?;
    }

    let acquired = host.acquire(&config)?;
    tracing::info!(module = %config.module_name, status = ?acquired.status, "instance acquired");

    acquired.instance.submit(EventProperties::new("simple_event"))?;

    host.release(&config)?;
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut print = false;
    let mut config_path = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--print" => print = true,
            "-h" | "--help" => usage(),
            _ if arg.starts_with('-') || config_path.is_some() => usage(),
            _ => config_path = Some(PathBuf::from(&arg)),
        }
    }

    let result = load_config(config_path).and_then(|config| run(config, print));
    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }

    println!("[ DONE ]");
}
