//! Wiring & DI. Entry point: parse the command line, bootstrap adapters, inject into services, run.
//! No business logic here.

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use manhour_sync::adapters::persistence::{SqliteRepo, StateJson};
use manhour_sync::adapters::slack::SlackClient;
use manhour_sync::adapters::ui::tui::{format_case, TuiInputPort};
use manhour_sync::ports::{
    CaseAdmin, CaseRegistry, ChatSource, DeliverySink, IdentityResolver, InputPort, RecordStore,
    WatermarkStore,
};
use manhour_sync::shared::AppConfig;
use manhour_sync::usecases::export_service::current_period;
use manhour_sync::usecases::{ExportService, ImportService, ImportSettings, SchedulerService};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Import man-hour reports from Slack and publish monthly exports.
#[derive(Parser)]
#[command(name = "manhour-sync", version, about)]
struct Cli {
    /// Subcommand to execute (interactive menu when omitted).
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Import new reports from the channel once.
    Import,
    /// Build the monthly export and post it to the channel.
    Export {
        /// Year of the period (default: current).
        #[arg(long)]
        year: Option<i32>,
        /// Month of the period, 1-12 (default: current).
        #[arg(long)]
        month: Option<u32>,
        /// Only write the file locally.
        #[arg(long)]
        no_deliver: bool,
    },
    /// Run the nightly job (import, then export of the current month) once.
    Nightly,
    /// Run the nightly job every day at the configured hour.
    Watch,
    /// Interactive menu.
    Menu,
    /// Manage cases.
    Cases {
        #[command(subcommand)]
        action: CasesCommand,
    },
}

#[derive(Subcommand)]
enum CasesCommand {
    /// Register a case and print its generated key.
    Add { name: String },
    /// List all cases.
    List,
    /// Stop accepting reports for a case.
    Deactivate { key: String },
    /// Accept reports for a case again.
    Activate { key: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let env_loaded = dotenv();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &env_loaded {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(_) => info!(cwd = %cwd.display(), "no .env found (check CWD)"),
    }

    let cfg = AppConfig::load().context("failed to load configuration")?;
    cfg.validate().map_err(|e| anyhow::anyhow!("{}", e))?;

    let data_path = cfg.data_dir_or_default();
    let data_dir_abs = data_path
        .canonicalize()
        .unwrap_or_else(|_| data_path.clone());
    info!(path = %data_dir_abs.display(), "data directory");

    let sqlite_repo = Arc::new(
        SqliteRepo::connect(&data_path)
            .await
            .map_err(|e| anyhow::anyhow!("SQLite connect failed: {}", e))?,
    );
    let case_admin: Arc<dyn CaseAdmin> = Arc::clone(&sqlite_repo) as Arc<dyn CaseAdmin>;

    let command = cli.command.unwrap_or(Command::Menu);
    if let Command::Cases { action } = command {
        return handle_cases(case_admin.as_ref(), action).await;
    }

    let offset = cfg.utc_offset().map_err(|e| anyhow::anyhow!("{}", e))?;
    let slack = match (cfg.slack_bot_token(), cfg.slack_channel_id()) {
        (Some(token), Some(channel)) => {
            info!(channel = %channel, "Slack configured");
            Some(Arc::new(SlackClient::new(
                token,
                channel,
                cfg.fetch_page_size_or_default(),
            )))
        }
        _ => {
            warn!("SLACK_BOT_TOKEN / SLACK_CHANNEL_ID not set; Slack features disabled");
            None
        }
    };

    // --- Export (works without Slack when delivery is off) ---
    let records: Arc<dyn RecordStore> = Arc::clone(&sqlite_repo) as Arc<dyn RecordStore>;
    let sink: Option<Arc<dyn DeliverySink>> = slack
        .as_ref()
        .map(|s| Arc::clone(s) as Arc<dyn DeliverySink>);
    let export_service = Arc::new(ExportService::new(
        Arc::clone(&records),
        sink,
        cfg.reports_dir(),
        cfg.export_sheet_name_or_default(),
    ));

    if let Command::Export {
        year,
        month,
        no_deliver,
    } = command
    {
        let (cur_year, cur_month) = current_period(offset);
        let (year, month) = (year.unwrap_or(cur_year), month.unwrap_or(cur_month));
        let deliver = !no_deliver;
        if deliver && slack.is_none() {
            anyhow::bail!("Set SLACK_BOT_TOKEN and SLACK_CHANNEL_ID to deliver, or pass --no-deliver");
        }
        let outcome = export_service
            .export_and_deliver(year, month, deliver)
            .await
            .map_err(|e| anyhow::anyhow!("{}", e))?;
        println!(
            "{}-{:02}: {} rows, {} h -> {}",
            year,
            month,
            outcome.rows,
            outcome.total_hours,
            outcome.path.display()
        );
        return Ok(());
    }

    // --- Everything below reads the channel ---
    let Some(slack) = slack else {
        anyhow::bail!("Set SLACK_BOT_TOKEN and SLACK_CHANNEL_ID (env or .env)");
    };

    let state_impl = StateJson::new(cfg.state_path());
    state_impl
        .load()
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let watermark: Arc<dyn WatermarkStore> = Arc::new(state_impl);

    let settings = ImportSettings {
        vocabulary: cfg.vocabulary().map_err(|e| anyhow::anyhow!("{}", e))?,
        utc_offset: offset,
        unknown_sender: cfg.unknown_sender_or_default(),
    };
    let import_service = Arc::new(ImportService::new(
        Arc::clone(&slack) as Arc<dyn ChatSource>,
        Arc::clone(&slack) as Arc<dyn IdentityResolver>,
        Arc::clone(&sqlite_repo) as Arc<dyn CaseRegistry>,
        records,
        watermark,
        settings,
    ));
    let scheduler = Arc::new(SchedulerService::new(
        Arc::clone(&import_service),
        Arc::clone(&export_service),
        cfg.schedule_hour_or_default(),
        offset,
    ));

    match command {
        Command::Import => {
            let stats = import_service
                .run_import()
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            println!(
                "Fetched {} messages, {} reports, {} new records ({} already imported).",
                stats.messages_fetched,
                stats.messages_matched,
                stats.records_created,
                stats.duplicates_skipped
            );
        }
        Command::Nightly => {
            let report = scheduler
                .run_nightly()
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            if report.import.is_none() {
                anyhow::bail!(
                    "import failed; export written to {}",
                    report.export.path.display()
                );
            }
        }
        Command::Watch => {
            scheduler
                .run_loop()
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
        }
        Command::Menu => {
            manhour_sync::adapters::ui::init_ui();
            let input_port: Arc<dyn InputPort> = Arc::new(TuiInputPort::new(
                import_service,
                export_service,
                scheduler,
                case_admin,
                offset,
            ));
            input_port
                .run()
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
        }
        Command::Export { .. } | Command::Cases { .. } => {}
    }

    Ok(())
}

/// `cases ...` subcommands. Only need the database.
async fn handle_cases(cases: &dyn CaseAdmin, action: CasesCommand) -> anyhow::Result<()> {
    match action {
        CasesCommand::Add { name } => {
            let case = cases
                .register_case(&name)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            println!("{}", format_case(&case));
        }
        CasesCommand::List => {
            for case in cases
                .list_cases()
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?
            {
                println!("{}", format_case(&case));
            }
        }
        CasesCommand::Deactivate { key } => set_active(cases, &key, false).await?,
        CasesCommand::Activate { key } => set_active(cases, &key, true).await?,
    }
    Ok(())
}

async fn set_active(cases: &dyn CaseAdmin, key: &str, active: bool) -> anyhow::Result<()> {
    let found = cases
        .set_case_active(key, active)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    if !found {
        anyhow::bail!("no case with key {}", key);
    }
    println!(
        "{} is now {}",
        key.trim().to_uppercase(),
        if active { "active" } else { "inactive" }
    );
    Ok(())
}
