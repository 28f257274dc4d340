//! po-translate - command line entry point
//!
//! Resolves configuration and credentials, picks a provider and model,
//! checks the connection, then hands the folder to the workflow.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{Level, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use po_translate::cli::Args;
use po_translate::config::Config;
use po_translate::error::TranslatorError;
use po_translate::interrupt::{INTERRUPTED_EXIT_CODE, Interrupt};
use po_translate::provider::{ProviderClients, ProviderRegistry, select_model, select_provider};
use po_translate::translate::{RetryPolicy, TranslationConfig, TranslationService};
use po_translate::workflow::Workflow;

const LOG_FILE_NAME: &str = "po-translate.log";

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _guard = match setup_logging(args.log_level(), args.log_dir.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<TranslatorError>() {
            Some(stop) if stop.is_user_stop() => {
                warn!("{}", stop);
                ExitCode::from(INTERRUPTED_EXIT_CODE)
            }
            _ => {
                error!("{:#}", e);
                ExitCode::FAILURE
            }
        },
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    args.apply_to(&mut config);

    let clients = Arc::new(ProviderClients::from_environment(
        &args.client_overrides(),
        &config.providers,
    )?);
    let registry = ProviderRegistry::with_builtin();
    let kind = select_provider(args.requested_provider(&config)?, &clients)?;
    let provider = registry.get(kind)?;
    info!("Using provider {}", kind);

    if args.list_models {
        let models = provider.get_models(&clients).await;
        println!("\nAvailable {} models:", kind);
        println!("{}", "-".repeat(40));
        for model in models {
            println!("{}", model);
        }
        return Ok(());
    }

    if !provider.is_client_initialized(&clients).await {
        return Err(TranslatorError::NotInitialized(kind.to_string()).into());
    }

    let model = select_model(
        provider.as_ref(),
        &clients,
        args.requested_model(&config, kind).as_deref(),
    )
    .await;

    let interrupt = Interrupt::new();
    let _listener = interrupt.listen_for_ctrl_c();

    let service = TranslationService::new(
        provider,
        clients,
        TranslationConfig {
            provider: kind,
            model,
            flags: args.translation_flags(&config),
            show_progress: config.translation.show_progress,
        },
        RetryPolicy::from_settings(&config.retry),
        interrupt.clone(),
    );
    service.validate_connection().await?;

    let folder = args
        .folder
        .as_deref()
        .ok_or_else(|| TranslatorError::Config("--folder is required".to_string()))?;

    let workflow = Workflow::new(service, config.scan.clone(), interrupt).assume_yes(args.yes);
    let summary = workflow
        .run(folder, &args.languages, &args.detail_languages)
        .await?;

    if !summary.failures.is_empty() {
        warn!("{} files could not be processed", summary.failures.len());
    }
    Ok(())
}

/// Explicit --config, otherwise the nearest project configuration above the folder
fn load_config(args: &Args) -> Result<Config> {
    if let Some(path) = &args.config {
        info!("Loading configuration from {}", path.display());
        return Ok(Config::from_file(path)?);
    }

    let start = args.folder.as_deref().unwrap_or_else(|| Path::new("."));
    match Config::discover(start)? {
        Some((path, config)) => {
            info!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        None => Ok(Config::default()),
    }
}

fn setup_logging(level: Level, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let (writer, guard) = non_blocking(rolling::daily(dir, LOG_FILE_NAME));
            let layer = fmt::layer()
                .with_writer(writer)
                .with_target(false)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    if let Some(dir) = log_dir {
        info!("Logging to {}", dir.join(LOG_FILE_NAME).display());
    }
    Ok(guard)
}
