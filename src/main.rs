//! PneumoStats - statistics for chest X-ray pneumonia analyses
//!
//! A CLI client for the pneumonia prediction API: log in, submit
//! X-ray images, and turn the analysis history into statistics,
//! reports and CSV exports.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (connection, config, invalid input, etc.)
//!   2 - Records were skipped and --fail-on-skipped is set

mod analysis;
mod api;
mod cli;
mod config;
mod models;
mod report;
mod scanner;
mod session;

use analysis::{HistoryFilter, Normalized, StatisticsOptions};
use anyhow::{Context, Result};
use api::{ApiClient, ApiConfig, ApiError, Registration};
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use cli::{Args, OutputFormat};
use config::Config;
use models::{RawRecord, ReportMetadata, StatisticsReport};
use session::{keys, FileStore, SessionStore};
use std::path::Path;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration before logging so the config can set verbosity
    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(&args, &config);

    info!("PneumoStats v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    debug!("Config: {:?}", config);

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .pneumostats.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(config::CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            config::CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", config::CONFIG_FILE);
    println!("   Edit it to set the API URL, time range and export columns.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config: &Config) {
    let level = args.log_level(config.general.verbose);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Dispatch to the requested workflow. Returns the exit code.
async fn run(args: Args, config: Config) -> Result<i32> {
    let mut store = FileStore::open(Path::new(&config.session.path))?;

    if args.logout {
        store.clear()?;
        println!("👋 Logged out.");
        return Ok(0);
    }

    let client = ApiClient::new(ApiConfig::from(&config.api))?;

    if let Some(ref username) = args.login {
        let password = args.password.as_deref().unwrap_or_default();
        handle_login(&client, &mut store, username, password).await?;
        return Ok(0);
    }

    if let Some(ref username) = args.register {
        handle_register(&client, &mut store, &args, username).await?;
        return Ok(0);
    }

    if args.update_profile {
        handle_update_profile(&client, &mut store, &args).await?;
        return Ok(0);
    }

    if args.change_password {
        let token = store.access_token().ok_or(ApiError::MissingToken)?;
        client
            .change_password(
                &token,
                args.password.as_deref().unwrap_or_default(),
                args.new_password.as_deref().unwrap_or_default(),
            )
            .await?;
        println!("✅ Password updated.");
        return Ok(0);
    }

    if let Some(ref dir) = args.upload {
        return handle_upload(&client, &store, &config, dir, args.quiet).await;
    }

    run_statistics(&args, &config, &client, &store).await
}

/// Handle --login: authenticate and store the token and profile.
async fn handle_login(
    client: &ApiClient,
    store: &mut dyn SessionStore,
    username: &str,
    password: &str,
) -> Result<()> {
    let token = client.login(username, password).await?;
    store.set(keys::ACCESS_TOKEN, &token.access_token)?;

    match client.profile(&token.access_token).await {
        Ok(profile) => {
            store.set_profile(&profile.first_name, &profile.last_name, &profile.email)?
        }
        Err(e) => warn!("Could not fetch profile: {}", e),
    }
    store.set(keys::IS_AUTHENTICATED, "true")?;

    let name = store.get(keys::FIRST_NAME).unwrap_or_default();
    if name.is_empty() {
        println!("✅ Logged in as {}.", username);
    } else {
        println!("✅ Logged in. Welcome, {}!", name);
    }
    Ok(())
}

/// Handle --register: create the account and store the new session.
async fn handle_register(
    client: &ApiClient,
    store: &mut dyn SessionStore,
    args: &Args,
    username: &str,
) -> Result<()> {
    let registration = Registration {
        username: username.to_string(),
        password: args.password.clone().unwrap_or_default(),
        profile: api::Profile {
            first_name: args.first_name.clone().unwrap_or_default(),
            last_name: args.last_name.clone().unwrap_or_default(),
            email: args.email.clone().unwrap_or_default(),
        },
    };

    let token = client.register(&registration).await?;
    store.set(keys::ACCESS_TOKEN, &token.access_token)?;
    store.set_profile(
        &registration.profile.first_name,
        &registration.profile.last_name,
        &registration.profile.email,
    )?;
    store.set(keys::IS_AUTHENTICATED, "true")?;

    println!(
        "✅ Account created. Welcome, {}!",
        registration.profile.first_name
    );
    Ok(())
}

/// Handle --update-profile: change only the fields given on the command line.
async fn handle_update_profile(
    client: &ApiClient,
    store: &mut dyn SessionStore,
    args: &Args,
) -> Result<()> {
    let token = store.access_token().ok_or(ApiError::MissingToken)?;

    let current = client.profile(&token).await?;
    let wanted = current.with_changes(
        args.first_name.as_deref(),
        args.last_name.as_deref(),
        args.email.as_deref(),
    );
    debug!("Updating profile: {:?} -> {:?}", current, wanted);

    let updated = client.update_profile(&token, &wanted).await?;
    store.set_profile(&updated.first_name, &updated.last_name, &updated.email)?;

    println!(
        "✅ Profile updated: {} {} <{}>",
        updated.first_name, updated.last_name, updated.email
    );
    Ok(())
}

/// Handle --upload: scan a directory and submit every image.
async fn handle_upload(
    client: &ApiClient,
    store: &dyn SessionStore,
    config: &Config,
    dir: &Path,
    quiet: bool,
) -> Result<i32> {
    let token = store.access_token().ok_or(ApiError::MissingToken)?;

    let scan_config = scanner::ScanConfig::from(&config.scanner);
    let images = scanner::ImageScanner::new(dir.to_path_buf(), scan_config).scan()?;

    if images.is_empty() {
        println!("   No images found in {}.", dir.display());
        return Ok(0);
    }

    println!("📤 Submitting {} images for analysis...", images.len());
    let outcomes = api::upload_images(
        client,
        &token,
        images,
        config.general.concurrency,
        !quiet,
    )
    .await;

    let mut failed = 0;
    println!();
    for outcome in &outcomes {
        match &outcome.result {
            Ok(prediction) => {
                let verdict = prediction
                    .verdict
                    .parse::<models::Verdict>()
                    .map(|v| v.label().to_string())
                    .unwrap_or_else(|_| prediction.verdict.clone());
                println!(
                    "   🩻 {} → {} ({}%, {}) [#{}]",
                    outcome.image.relative,
                    verdict,
                    prediction.probability,
                    prediction.confidence,
                    prediction.id
                );
            }
            Err(e) => {
                failed += 1;
                println!("   ⚠️  {} → {}", outcome.image.relative, e);
            }
        }
    }

    println!(
        "\n✅ {} analyzed, {} failed.",
        outcomes.len() - failed,
        failed
    );
    Ok(if failed > 0 { 1 } else { 0 })
}

/// Fetch history, compute statistics and write the requested output.
async fn run_statistics(
    args: &Args,
    config: &Config,
    client: &ApiClient,
    store: &dyn SessionStore,
) -> Result<i32> {
    let (raw, source) = load_history(args, config, client, store).await?;
    let received = raw.len();

    let normalized = analysis::normalize_records(&raw);
    info!(
        "Loaded {} records ({} skipped) from {}",
        normalized.records.len(),
        normalized.skipped.len(),
        source
    );

    let history = History {
        normalized,
        received,
        source,
    };
    let rendered = render_statistics(
        args,
        config,
        &history,
        Local::now().naive_local(),
        Utc::now(),
    )?;

    // The payload may be stdout, so the console summary goes to stderr.
    if let Some(ref summary) = rendered.console_summary {
        if !args.quiet {
            eprintln!("{}\n", summary);
        }
    }

    write_output(args, config, &rendered.payload)?;

    let skipped = history.normalized.skipped.len();
    if skipped > 0 {
        eprintln!(
            "⚠️  {} of {} records were skipped (invalid verdict, confidence, probability or timestamp).",
            skipped, received
        );
    }

    Ok(rendered.exit_code)
}

/// Normalized history plus where it came from.
struct History {
    normalized: Normalized,
    received: usize,
    source: String,
}

/// Output of a statistics run, before anything is written.
#[derive(Debug)]
struct Rendered {
    payload: String,
    console_summary: Option<String>,
    exit_code: i32,
}

/// Exit code for a run that skipped `skipped` records.
fn exit_code_for(skipped: usize, fail_on_skipped: bool) -> i32 {
    if skipped > 0 && fail_on_skipped {
        2
    } else {
        0
    }
}

/// Build the requested output from normalized history. Touches no I/O.
fn render_statistics(
    args: &Args,
    config: &Config,
    history: &History,
    now: NaiveDateTime,
    generated_at: DateTime<Utc>,
) -> Result<Rendered> {
    let Normalized { records, skipped } = &history.normalized;
    let mut console_summary = None;

    let payload = match args.format {
        OutputFormat::Csv => {
            if config.export.columns.is_empty() {
                anyhow::bail!("No CSV columns selected; check [export.columns] in the config");
            }
            let filter = HistoryFilter {
                search: args.search.clone(),
                verdict: args.verdict.map(Into::into),
            };
            let selected = analysis::filter_for_export(
                &filter.apply(records),
                config.export.date_range,
                now,
            );
            info!("Exporting {} records to CSV", selected.len());
            report::export_csv(&selected, &config.export.columns)
        }
        OutputFormat::Text => {
            let id = args.record.as_deref().unwrap_or_default();
            let record = records
                .iter()
                .find(|r| r.id.to_string() == id)
                .with_context(|| format!("No valid analysis with id {}", id))?;
            report::generate_record_report(record)
        }
        OutputFormat::Markdown | OutputFormat::Json => {
            let options = StatisticsOptions::from(&config.statistics);
            let stats = analysis::compute_statistics(records, &options, now);

            let mut summary = format!("📊 Statistics ({}):", options.time_range);
            for line in analysis::generate_summary_text(&stats.summary).lines() {
                summary.push_str("\n   ");
                summary.push_str(line);
            }
            console_summary = Some(summary);

            let report = StatisticsReport {
                metadata: ReportMetadata {
                    source: history.source.clone(),
                    generated_at,
                    time_range: options.time_range.to_string(),
                    records_received: history.received,
                    records_skipped: skipped.len(),
                    placeholder_timeline: stats.placeholder_timeline,
                },
                summary: stats.summary,
                distribution: stats.distribution,
                timeline: stats.timeline,
                skipped: skipped.clone(),
                detailed_analyses: stats.records,
            };

            if args.format == OutputFormat::Json {
                report::generate_json_report(&report)?
            } else {
                report::generate_markdown_report(&report)
            }
        }
    };

    Ok(Rendered {
        payload,
        console_summary,
        exit_code: exit_code_for(skipped.len(), args.fail_on_skipped),
    })
}

/// Read history from --input or from the API.
async fn load_history(
    args: &Args,
    config: &Config,
    client: &ApiClient,
    store: &dyn SessionStore,
) -> Result<(Vec<RawRecord>, String)> {
    if let Some(ref input) = args.input {
        info!("Reading history from {}", input.display());
        let content = std::fs::read_to_string(input)
            .with_context(|| format!("Failed to read {}", input.display()))?;
        let raw: Vec<RawRecord> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse history file {}", input.display()))?;
        return Ok((raw, input.display().to_string()));
    }

    let token = store.access_token().ok_or(ApiError::MissingToken)?;
    info!("Fetching history from {}", config.api.base_url);
    let raw = client.fetch_history(&token).await?;
    Ok((raw, config.api.base_url.clone()))
}

/// Write to --output, the configured output, or stdout.
fn write_output(args: &Args, config: &Config, output: &str) -> Result<()> {
    let path = args.output.clone().or_else(|| {
        (!config.general.output.is_empty()).then(|| config.general.output.clone().into())
    });

    match path {
        Some(path) => {
            std::fs::write(&path, output)
                .with_context(|| format!("Failed to write output to {}", path.display()))?;
            if !args.quiet {
                println!("✅ Saved to: {}", path.display());
            }
        }
        None => println!("{}", output),
    }

    Ok(())
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is set up, so problems go straight to stderr.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("⚠️  Failed to load {}: {:#}", config::CONFIG_FILE, e);
            Ok(Config::default())
        }
    }
}
