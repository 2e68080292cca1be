use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod controller;
mod domain;
mod engine;
mod inputter;
mod logpanel;
mod model;
mod poller;
mod realtime;
mod record;
mod snapshot;
mod source;
mod ui;

use controller::Controller;
use domain::{DEFAULT_API_URL, DashError, DashboardConfig, LOG_REFRESH_SECS, STATUS_REFRESH_SECS};
use model::{Model, Status};
use realtime::RealtimeChannel;
use source::HttpDataSource;
use ui::DashboardUI;

/// Terminal dashboard for a link health-monitoring backend.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Base url of the monitoring backend
    #[arg(long, default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Websocket url pushing live log events (realtime logs are off without it)
    #[arg(long)]
    ws_url: Option<String>,

    /// Seconds between status refreshes
    #[arg(long, default_value_t = STATUS_REFRESH_SECS)]
    refresh_secs: u64,

    /// Seconds between log refreshes while the log panel is open
    #[arg(long, default_value_t = LOG_REFRESH_SECS)]
    log_refresh_secs: u64,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,

    /// Directory csv exports are written to
    #[arg(long, default_value = ".")]
    export_dir: String,

    /// Log file (the terminal belongs to the ui)
    #[arg(long, default_value = "~/.linkdash.log")]
    log_file: String,

    /// Milliseconds to wait for input per frame
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,
}

impl Args {
    fn config(&self) -> DashboardConfig {
        let mut cfg = DashboardConfig::default()
            .with_api_url(self.api_url.clone())
            .with_refresh_interval(Duration::from_secs(self.refresh_secs.max(1)))
            .with_log_refresh_interval(Duration::from_secs(self.log_refresh_secs.max(1)))
            .with_request_timeout(Duration::from_secs(self.timeout_secs.max(1)))
            .with_export_dir(expand_path(&self.export_dir))
            .with_event_poll_time(self.poll_ms);
        if let Some(ws) = &self.ws_url {
            cfg = cfg.with_ws_url(ws.clone());
        }
        cfg
    }
}

fn expand_path(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(raw),
    }
}

fn init_logging(log_file: &str) -> Result<(), DashError> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(expand_path(log_file))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = init_logging(&args.log_file) {
        eprintln!("Error: cannot open log file {}: {e}", args.log_file);
        return ExitCode::FAILURE;
    }

    let result = run(&args.config());
    ratatui::restore();
    match result {
        Err(e) => {
            error!("Stopped with {e:?}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run(cfg: &DashboardConfig) -> Result<(), DashError> {
    info!("Starting linkdash against {}", cfg.api_url);

    let source = HttpDataSource::new(&cfg.api_url, cfg.request_timeout)?;
    let realtime = match &cfg.ws_url {
        Some(url) => RealtimeChannel::connect(url)?,
        None => RealtimeChannel::disabled(),
    };

    let mut model = Model::init(cfg, Box::new(source), realtime);
    let mut ui = DashboardUI::new();
    let controller = Controller::new(cfg);

    let mut terminal = ratatui::init();

    while model.status != Status::Quitting {
        terminal.draw(|f| ui.draw(&model, f))?;

        // No input within the poll time still ticks the model so background
        // results and schedules are handled
        let message = controller.handle_event(&model)?;
        model.update(message)?;
    }

    info!("Bye");
    Ok(())
}
