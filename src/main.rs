//! MedCenter Desk - clinic administration desktop app.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use eframe::egui;
use medcenter_desk as app;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use app::config::{AppConfig, ConfigLoadResult};
use app::db;
use app::ui::App;

/// Clinic administration: staff, patients, analysis results and reports.
#[derive(Parser)]
#[command(name = "medcenter-desk")]
struct Cli {
    /// Use config.toml from current directory (dev mode)
    #[arg(long)]
    dev: bool,

    /// Path to config.toml (overrides --dev)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Keep the guard alive so buffered log lines are flushed on exit
    let _log_guard = init_logging();

    tracing::info!("MedCenter Desk starting...");

    // Determine config path based on mode
    let config_path = match cli.config {
        Some(path) => path,
        None if cli.dev => {
            tracing::info!("Dev mode: loading config from current directory");
            PathBuf::from("config.toml")
        }
        None => AppConfig::default_path(),
    };
    tracing::info!("Config path: {:?}", config_path);

    let config = match AppConfig::try_load(&config_path) {
        ConfigLoadResult::Loaded(config) => {
            tracing::info!("Config loaded successfully");
            config
        }
        ConfigLoadResult::Missing => {
            tracing::info!("Config missing, writing defaults");
            let config = AppConfig::default();
            if let Err(e) = config.save(&config_path) {
                tracing::warn!("Could not save default config: {}", e);
            }
            config
        }
        ConfigLoadResult::Invalid(e) => {
            tracing::error!("Config invalid: {}", e);
            return Err(anyhow::anyhow!("Invalid config {}: {e}", config_path.display()));
        }
    };

    run_main_app(config)
}

/// Log to stderr and to a daily file in the platform data directory.
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let log_dir = directories::ProjectDirs::from("com", "MedCenter", "MedCenter Desk")
        .map(|dirs| dirs.data_local_dir().join("logs"))
        .filter(|dir| std::fs::create_dir_all(dir).is_ok());

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "medcenter-desk.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(fmt::layer()).init();
            None
        }
    }
}

/// Run the main application.
fn run_main_app(config: AppConfig) -> anyhow::Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("MedCenter Desk")
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([900.0, 600.0]),
        ..Default::default()
    };

    // Create tokio runtime for async operations
    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

    // Connect, bootstrap the schema and load the user roster
    let (pool, users) = rt.block_on(async {
        let conn = db::connect(&config.database.connection_string())
            .await
            .context("Failed to connect to database")?;
        db::test_connection(&conn).await.context("Database is not responding")?;
        db::ensure_schema(&conn).await.context("Failed to prepare database schema")?;

        let seeded = db::user::seed_defaults_if_empty(&conn).await?;
        if seeded > 0 {
            tracing::warn!("Created {} default accounts; change their passwords", seeded);
        }

        if let Ok(counts) = db::get_table_counts(&conn).await {
            tracing::info!(
                "Tables: {} users, {} patients, {} analysis results, {} appointments",
                counts.users,
                counts.patients,
                counts.analysis_results,
                counts.appointments
            );
        }

        let users = db::user::list_all(&conn).await?;
        anyhow::Ok((conn, users))
    })?;

    eframe::run_native(
        "MedCenter Desk",
        options,
        Box::new(|cc| {
            egui_extras::install_image_loaders(&cc.egui_ctx);

            let mut fonts = egui::FontDefinitions::default();
            egui_phosphor::add_to_fonts(&mut fonts, egui_phosphor::Variant::Regular);
            cc.egui_ctx.set_fonts(fonts);

            Ok(Box::new(App::new(pool, config, rt, users)))
        }),
    )
    .map_err(|e| anyhow::anyhow!("GUI error: {e}"))
}
