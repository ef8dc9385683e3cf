//! `lifeline` - CLI for the personal-safety alert client.
//!
//! This binary wires the dispatch pipeline to real collaborators (HTTP
//! transport, blob storage, reachability probe) and provides helpers for
//! credential management and detector trace replay.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;

use lifeline::cli::{
    AlertCommand, Cli, Command, ConfigCommand, LoginCommand, ReportCommand, SimulateCommand,
    StatusCommand,
};
use lifeline::dispatch::StaticLocationProvider;
use lifeline::motion::ReplaySource;
use lifeline::reachability::HttpProbe;
use lifeline::{
    init_logging, AuthClient, Config, Coordinates, CredentialStore, Credentials,
    DispatchPipeline, Error, FileCredentialStore, HttpEvidenceStore, HttpTransport, Recording,
    SensorSource, ShakeMonitor,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    // Execute the command
    match cli.command {
        Command::Alert(alert_cmd) => handle_alert(&config, &alert_cmd).await,
        Command::Report(report_cmd) => handle_report(&config, &report_cmd).await,
        Command::Simulate(simulate_cmd) => handle_simulate(&config, &simulate_cmd).await,
        Command::Status(status_cmd) => handle_status(&config, &status_cmd),
        Command::Login(login_cmd) => handle_login(&config, &login_cmd),
        Command::Logout => handle_logout(&config),
        Command::Config(config_cmd) => handle_config(&config, &config_cmd),
    }
}

/// Build the dispatch pipeline against real collaborators, with the
/// position fix pinned to the coordinates supplied on the command line.
fn build_pipeline(
    config: &Config,
    fix: Coordinates,
) -> anyhow::Result<DispatchPipeline<HttpTransport>> {
    let store: Arc<dyn CredentialStore> =
        Arc::new(FileCredentialStore::new(config.credentials_path()));

    let transport = HttpTransport::new(&config.backend.base_url, config.request_timeout())?;
    let client = AuthClient::new(
        transport,
        store,
        Box::new(|| {
            eprintln!("Session expired. Run `lifeline login` to re-authenticate.");
        }),
    );

    let evidence = HttpEvidenceStore::new(
        &config.storage.base_url,
        &config.storage.bucket,
        config.request_timeout(),
    )?;
    let reachability = HttpProbe::new(&config.backend.base_url)?;

    Ok(DispatchPipeline::new(
        client,
        Arc::new(StaticLocationProvider::fixed(fix)),
        Arc::new(evidence),
        Arc::new(reachability),
    ))
}

async fn handle_alert(config: &Config, cmd: &AlertCommand) -> anyhow::Result<()> {
    let fix = Coordinates::new(cmd.latitude, cmd.longitude);
    let pipeline = build_pipeline(config, fix)?;

    match pipeline.send_emergency(&cmd.user).await {
        Ok(receipt) => {
            println!("Alert sent: {}", receipt.message);
            if let Some(reference) = receipt.reference {
                println!("Reference:  {reference}");
            }
            Ok(())
        }
        Err(e) => fail_with_remediation(&e),
    }
}

async fn handle_report(config: &Config, cmd: &ReportCommand) -> anyhow::Result<()> {
    let recording = Recording::from_file(&cmd.audio)?;
    let fix = Coordinates::new(cmd.latitude, cmd.longitude);
    let pipeline = build_pipeline(config, fix)?;

    match pipeline.submit_report(&cmd.user, &recording).await {
        Ok(receipt) => {
            println!("Report submitted: {}", receipt.message);
            Ok(())
        }
        Err(e) => fail_with_remediation(&e),
    }
}

/// Map each dispatch failure to its remediation message before exiting.
fn fail_with_remediation(error: &Error) -> anyhow::Result<()> {
    match error {
        Error::Offline => {
            eprintln!("No connectivity: the alert was NOT submitted.");
            eprintln!("Use the SMS emergency path on your device instead.");
        }
        Error::MissingLocation => {
            eprintln!("No location fix available; an alert is never sent without one.");
        }
        Error::MissingEvidence => {
            eprintln!("The recording is empty. Re-record and try again.");
        }
        Error::EvidenceUpload { .. } => {
            eprintln!("Uploading the recording failed. Retry, or send a bare alert.");
        }
        Error::SessionExpired => {
            eprintln!("Run `lifeline login` with fresh tokens, then retry.");
        }
        _ => {}
    }
    anyhow::bail!("{error}")
}

async fn handle_simulate(config: &Config, cmd: &SimulateCommand) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&cmd.trace)?;
    let mut source = ReplaySource::from_jsonl(&text)?;

    println!("Replaying {} samples...", source.len());

    let (tx, rx) = mpsc::channel(64);
    let mut events = ShakeMonitor::spawn(config.detector.clone(), rx);
    source.start(tx)?;

    let mut count = 0;
    while let Some(event) = events.recv().await {
        count += 1;
        println!(
            "ShakeDetected at {} ({} spikes)",
            event.timestamp, event.spike_count
        );
    }
    println!("{count} trigger(s) detected.");
    Ok(())
}

fn handle_status(config: &Config, cmd: &StatusCommand) -> anyhow::Result<()> {
    let store = FileCredentialStore::new(config.credentials_path());
    let logged_in = store.load()?.is_some();

    if cmd.json {
        let status = serde_json::json!({
            "backend_url": config.backend.base_url,
            "storage_url": config.storage.base_url,
            "credentials_path": config.credentials_path(),
            "logged_in": logged_in,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("lifeline status");
        println!("---------------");
        println!("Backend:       {}", config.backend.base_url);
        println!("Storage:       {}", config.storage.base_url);
        println!("Credentials:   {}", config.credentials_path().display());
        println!(
            "Logged in:     {}",
            if logged_in { "yes" } else { "no" }
        );
    }
    Ok(())
}

fn handle_login(config: &Config, cmd: &LoginCommand) -> anyhow::Result<()> {
    let store = FileCredentialStore::new(config.credentials_path());
    store.store(&Credentials::new(
        cmd.access_token.clone(),
        cmd.refresh_token.clone(),
    ))?;
    println!("Credentials stored at {}", store.path().display());
    Ok(())
}

fn handle_logout(config: &Config) -> anyhow::Result<()> {
    let store = FileCredentialStore::new(config.credentials_path());
    store.purge()?;
    println!("Stored credentials purged.");
    Ok(())
}

fn handle_config(config: &Config, cmd: &ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if *json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Detector]");
                println!("  Threshold:          {}", config.detector.threshold);
                println!("  Window (ms):        {}", config.detector.window_ms);
                println!("  Shakes required:    {}", config.detector.shakes_required);
                println!("  Cooldown (ms):      {}", config.detector.cooldown_ms);
                println!();
                println!("[Backend]");
                println!("  Base URL:           {}", config.backend.base_url);
                println!(
                    "  Request timeout:    {}s",
                    config.backend.request_timeout_secs
                );
                println!();
                println!("[Storage]");
                println!("  Base URL:           {}", config.storage.base_url);
                println!("  Bucket:             {}", config.storage.bucket);
                println!();
                println!("[Credentials]");
                println!("  Path:               {}", config.credentials_path().display());
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.clone().unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
