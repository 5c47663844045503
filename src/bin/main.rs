use clap::Parser;
use resale_harvest::{ChromeDriver, Config, CsvSink, FlowController, Interrupt, Params};
use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use tracing::{error, warn};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "resale-harvest")]
#[command(about = "Harvest comparable resale listings through a sell wizard")]
#[command(version)]
struct Cli {
    /// Config file to run
    config: PathBuf,

    /// Run in headless mode (overrides config)
    #[arg(long)]
    headless: bool,

    /// Set a parameter (can be used multiple times)
    #[arg(short = 'P', long = "param", value_name = "KEY=VALUE")]
    params: Vec<String>,

    /// CSV output path (overrides config)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Stop after this many events (overrides config)
    #[arg(long, value_name = "N")]
    max_events: Option<usize>,

    /// Verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (only errors)
    #[arg(short, long)]
    quiet: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Validate config without running
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) -> resale_harvest::Result<()> {
    // RUST_LOG wins over the flags
    let level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let writer = match cli.log_file {
        Some(ref path) => BoxMakeWriter::new(Mutex::new(File::create(path)?)),
        None => BoxMakeWriter::new(std::io::stderr),
    };

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(cli.log_file.is_none())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
    Ok(())
}

/// Failed units and interrupts still count as a completed run; only errors
/// before or around the harvest itself are returned.
async fn run(cli: Cli) -> resale_harvest::Result<()> {
    let params = Params::from_args(&cli.params)?;
    let mut config = Config::load_with_params(&cli.config, &params)?;

    if cli.check {
        print_check(&config);
        return Ok(());
    }

    if cli.headless {
        config.browser.headless = true;
    }
    if let Some(ref output) = cli.output {
        config.output.path = output.display().to_string();
    }
    if cli.max_events.is_some() {
        config.events.max = cli.max_events;
    }

    println!("Running: {}", config.name);
    println!(
        "  Log in at {} within {}s; the harvest starts once the login is detected.",
        config.login.url,
        config.login.timeout_ms / 1000
    );
    println!("  Output: {}", config.output.path);
    if config.browser.headless {
        warn!("headless mode: manual login is not possible unless the session is already signed in");
    }

    let interrupt = Interrupt::new();
    let on_signal = interrupt.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupt received, finishing the current step and saving...");
            on_signal.trigger();
        }
    });

    let driver = ChromeDriver::launch(&config.browser).await?;
    let mut sink = CsvSink::new(&config.output.path);
    let mut flow = FlowController::new(driver, config, interrupt);

    let result = flow.run(&mut sink).await;
    if let Err(e) = flow.shutdown().await {
        warn!("browser shutdown failed: {}", e);
    }
    let report = result?;

    println!();
    if report.interrupted {
        println!("⚠ Interrupted");
    } else if report.events_failed == 0 {
        println!("✓ Done");
    } else {
        println!("✗ Finished with failures");
    }
    println!("  Rows: {} -> {}", report.rows, sink.path().display());
    println!(
        "  Events: {} found, {} processed, {} failed",
        report.events_found, report.events_processed, report.events_failed
    );
    if report.seats_failed > 0 {
        println!("  Seats failed: {}", report.seats_failed);
    }
    println!("  Duration: {}ms", report.duration_ms);

    Ok(())
}

fn print_check(config: &Config) {
    println!("Config valid: {}", config.name);
    println!("  Login: {}", config.login.url);
    println!("  Setup actions: {}", config.setup.len());
    if !config.params.is_empty() {
        println!("  Parameters: {}", config.params.len());
        for (name, def) in &config.params {
            let req = if def.required { " (required)" } else { "" };
            let desc = def.description.as_deref().unwrap_or("");
            println!("    - {}{}: {}", name, req, desc);
        }
    }
    println!("  Scrape passes: {}", config.events.passes);
    match config.events.max {
        Some(max) => println!("  Max events: {}", max),
        None => println!("  Max events: all"),
    }
    println!("  Output: {}", config.output.path);
    if let Some(ref on_failure) = config.on_failure {
        println!("  Diagnostics: {}", on_failure.dir);
    }
}
