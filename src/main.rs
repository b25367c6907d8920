use clap::Parser;
use anyhow::{Context, Result};
use std::sync::atomic::Ordering;
use std::time::Duration;

use sync_indicator::{
    cli::{Cli, OutputFormat},
    AggregateState, AppEvent, IconSet, IndicatorConfig, PollResult, StateReconciler,
    StatusSampler, StatusWatcher,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(err) = cli.validate() {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }

    cli.setup_logging();

    let mut config = IndicatorConfig::load(cli.config.as_deref())?;
    config.apply_env();
    cli.apply_to(&mut config);

    if let Err(err) = config.validate() {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }

    let log_file = config.presentation.log_file_path();

    if cli.log_path {
        println!("{}", log_file.display());
        return Ok(());
    }

    if cli.open_log {
        tracing::info!("Opening {}", log_file.display());
        open::that(&log_file)
            .with_context(|| format!("Failed to open log file {}", log_file.display()))?;
        return Ok(());
    }

    if cli.raw {
        return run_raw_mode(&config);
    }

    if cli.once {
        let state = run_once_mode(&cli, &config)?;
        std::process::exit(state.exit_code());
    }

    run_watch_mode(&cli, &config)
}

fn run_raw_mode(config: &IndicatorConfig) -> Result<()> {
    let mut sampler = StatusSampler::from_config(&config.sampler);

    match sampler.capture() {
        Some(output) => print!("{}", output),
        None => {
            eprintln!("No output from `{}`", config.sampler.command);
            std::process::exit(2);
        }
    }

    Ok(())
}

fn run_once_mode(cli: &Cli, config: &IndicatorConfig) -> Result<AggregateState> {
    let mut sampler = StatusSampler::from_config(&config.sampler);
    let mut reconciler = StateReconciler::new(config.patterns.classifier()?);

    let lines = sampler.sample();
    let result = reconciler.tick(&lines);
    print_result(&result, cli, None)?;

    Ok(result.state)
}

fn run_watch_mode(cli: &Cli, config: &IndicatorConfig) -> Result<()> {
    let icons = config.presentation.icon_dir.as_ref().map(IconSet::load);
    let watcher = StatusWatcher::new(config)?;

    tracing::info!(
        "Polling `{} {}` every {}s",
        config.sampler.command,
        config.sampler.args.join(" "),
        config.watcher.interval_secs
    );

    let running = watcher.running_flag();
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    while running.load(Ordering::SeqCst) {
        match watcher.recv_timeout(Duration::from_millis(100)) {
            Ok(AppEvent::StateChanged(result)) => print_result(&result, cli, icons.as_ref())?,
            Ok(AppEvent::Polled(_)) => continue,
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    // The poller may be mid-command or asleep; it exits on its next check
    watcher.stop();
    Ok(())
}

fn print_result(result: &PollResult, cli: &Cli, icons: Option<&IconSet>) -> Result<()> {
    match cli.output {
        OutputFormat::Json => println!("{}", serde_json::to_string(result)?),
        OutputFormat::Text => print_text_result(result, cli, icons),
        OutputFormat::Compact => print_compact_result(result),
    }
    Ok(())
}

fn print_text_result(result: &PollResult, cli: &Cli, icons: Option<&IconSet>) {
    let time_str = result.polled_at.format("%H:%M:%S");
    let state = result.state.label();
    let lines = format!("{} status line(s)", result.line_count);

    if cli.no_color {
        println!("[{}] {} {}", time_str, state, lines);
    } else {
        let color = match result.state {
            AggregateState::Ok => "\x1b[32m",     // Green
            AggregateState::Active => "\x1b[33m", // Yellow
            AggregateState::Error => "\x1b[31m",  // Red
        };
        println!("[{}] {}{}\x1b[0m {}", time_str, color, state, lines);
    }

    if let Some(icons) = icons {
        println!("  icon: {}", icons.path_for(result.icon()).display());
    }
}

fn print_compact_result(result: &PollResult) {
    let variant = match result.state {
        AggregateState::Ok if result.alternation => "+",
        AggregateState::Ok => "-",
        _ => " ",
    };
    println!("{}{} {}", result.state.short_code(), variant, result.line_count);
}
