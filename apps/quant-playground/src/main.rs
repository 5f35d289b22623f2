use clap::{Parser, ValueEnum};
use playground_application::playground::PlaygroundForm;
use quant_playground::bootstrap::{self, SessionSource};
use quant_playground::headless::{HeadlessArgs, HeadlessMode, EXIT_FAILURE};
use quant_playground::{logging, TuiOpts};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

const ENV_LOG: &str = "QUANTPLAY_LOG";
const LOG_CAPACITY: usize = 5000;

#[derive(Parser, Debug)]
#[command(name = "quant-playground")]
#[command(about = "Quant Playground TUI + optional headless runner.", version)]
struct Cli {
    /// Run without TUI and exit after the selected mode completes.
    #[arg(long)]
    headless: bool,

    /// Headless mode: backtest | generate
    #[arg(long)]
    mode: Option<Mode>,

    /// Config file path (TOML). If omitted, uses env QUANTPLAY_CONFIG.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ticker symbol to backtest.
    #[arg(long)]
    ticker: Option<String>,

    /// Backtest start date (YYYY-MM-DD).
    #[arg(long)]
    start: Option<String>,

    /// Backtest end date (YYYY-MM-DD).
    #[arg(long)]
    end: Option<String>,

    /// File with the strategy code to submit.
    #[arg(long)]
    code_file: Option<PathBuf>,

    /// Strategy description for generate mode.
    #[arg(long)]
    prompt: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Mode {
    Backtest,
    Generate,
}

fn main() {
    let cli = Cli::parse();

    let log_buffer = logging::LogBuffer::shared(LOG_CAPACITY);
    if let Err(err) = init_tracing(cli.headless, log_buffer.clone()) {
        eprintln!("error: {err}");
        std::process::exit(EXIT_FAILURE);
    }
    if let Err(err) = init_metrics() {
        eprintln!("error: {err}");
        std::process::exit(EXIT_FAILURE);
    }

    let config_path = bootstrap::resolve_config_path(cli.config.clone());
    let config = match bootstrap::load_startup_config(config_path.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(EXIT_FAILURE);
        }
    };
    let form = match build_form(&cli, &config.playground) {
        Ok(form) => form,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(EXIT_FAILURE);
        }
    };
    // Kept alive until exit so the blocking HTTP clients are dropped here,
    // outside any async runtime.
    let services = match bootstrap::build_services(&config) {
        Ok(services) => services,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(EXIT_FAILURE);
        }
    };

    match bootstrap::restore_session(&services, |key| std::env::var(key).ok()) {
        Ok(SessionSource::None) => {}
        Ok(source) => tracing::info!(?source, "session restored from environment"),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(EXIT_FAILURE);
        }
    }

    if cli.headless {
        let mode = match cli.mode {
            Some(Mode::Backtest) => HeadlessMode::Backtest,
            Some(Mode::Generate) => HeadlessMode::Generate,
            None => {
                eprintln!("error: --mode is required with --headless");
                std::process::exit(EXIT_FAILURE);
            }
        };

        let result =
            quant_playground::headless::run_headless(HeadlessArgs { mode, form }, &services);
        services.session.close();

        match result {
            Ok(json) => {
                println!(
                    "{}",
                    serde_json::to_string(&json)
                        .unwrap_or_else(|_| "{\"status\":\"error\",\"error\":\"json\"}".to_string())
                );
                std::process::exit(0);
            }
            Err(failure) => {
                eprintln!("error: {failure}");
                std::process::exit(failure.exit_code);
            }
        }
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        git_sha = env!("QUANTPLAY_GIT_SHA"),
        target = env!("QUANTPLAY_TARGET"),
        "starting tui"
    );
    let opts = TuiOpts {
        services: services.clone(),
        form,
        log_buffer,
    };
    let result = quant_playground::run(opts);
    services.session.close();

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(EXIT_FAILURE);
    }
}

fn build_form(
    cli: &Cli,
    config: &playground_application::config::PlaygroundConfig,
) -> Result<PlaygroundForm, String> {
    let mut form = PlaygroundForm::from_config(config);
    if let Some(ticker) = &cli.ticker {
        form.ticker.clone_from(ticker);
    }
    if let Some(start) = &cli.start {
        form.start_date.clone_from(start);
    }
    if let Some(end) = &cli.end {
        form.end_date.clone_from(end);
    }
    if let Some(path) = &cli.code_file {
        form.code = read_code_file(path)?;
    }
    if let Some(prompt) = &cli.prompt {
        form.prompt.clone_from(prompt);
    }
    Ok(form)
}

fn read_code_file(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path)
        .map_err(|err| format!("failed to read code file {}: {err}", path.display()))
}

fn init_tracing(headless: bool, log_buffer: logging::SharedLogBuffer) -> Result<(), String> {
    let filter = std::env::var(ENV_LOG).unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter)
        .map_err(|err| format!("invalid log filter: {err}"))?;

    let builder = tracing_subscriber::fmt().with_env_filter(env_filter);
    if headless {
        // stdout carries the JSON result.
        builder.with_writer(std::io::stderr).init();
    } else {
        builder
            .with_ansi(false)
            .with_writer(logging::BufferMakeWriter::new(log_buffer))
            .init();
    }

    Ok(())
}

#[cfg(feature = "prometheus")]
fn init_metrics() -> Result<Option<SocketAddr>, String> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let Some(raw) = std::env::var("QUANTPLAY_METRICS_ADDR").ok() else {
        return Ok(None);
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }

    let addr: SocketAddr = raw
        .parse()
        .map_err(|err| format!("invalid QUANTPLAY_METRICS_ADDR (expected host:port): {err}"))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|err| format!("failed to install prometheus exporter: {err}"))?;

    tracing::info!(metrics_addr = %addr, "prometheus metrics exporter enabled");
    Ok(Some(addr))
}

#[cfg(not(feature = "prometheus"))]
fn init_metrics() -> Result<Option<SocketAddr>, String> {
    Ok(None)
}
