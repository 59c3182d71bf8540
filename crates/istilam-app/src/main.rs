use std::{process, sync::Arc};

use istilam_server::{DynViolationProvider, EnquiryRequest};
use serde_json::json;
use tracing_subscriber::{filter::LevelFilter, fmt};

use istilam_app::cli::{Cli, Commands, EnquireArgs};
use istilam_app::error::AppError;
use istilam_app::config;
use istilam_app::query::{PortalViolationProvider, run_query};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let log_level = determine_log_level(&cli);
    init_tracing(log_level);

    if let Err(err) = run(cli).await {
        eprintln!("{err}");
        process::exit(1);
    }
}

fn init_tracing(level: LevelFilter) {
    let subscriber = fmt().with_max_level(level).with_target(false).finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::warn!("Tracing subscriber already set; skipping re-initialization.");
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    match cli.command {
        Some(Commands::Serve(_)) => {
            let config = config::load()?;
            let provider: DynViolationProvider = Arc::new(PortalViolationProvider::new(
                config.portal,
                config.classifier,
            ));
            istilam_server::serve(config.server, provider).await?;
        }
        Some(Commands::Enquire(args)) => {
            run_enquire(args).await?;
        }
        None => {
            Cli::print_help();
        }
    }

    Ok(())
}

async fn run_enquire(args: EnquireArgs) -> Result<(), AppError> {
    let mut config = config::load()?;
    if args.headful {
        config.portal.headless = false;
    }
    let request = EnquiryRequest {
        plate_number: args.plate,
        civil_id: args.civil_id,
    };

    let portal = config.portal;
    let classifier = config.classifier;
    let result =
        tokio::task::spawn_blocking(move || run_query(&portal, &classifier, &request)).await??;

    // Same envelope shape as the HTTP surface, for script consumers.
    let envelope = json!({
        "success": true,
        "violations": result.records,
        "confirmedZero": result.confirmed_zero,
    });
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

fn determine_log_level(cli: &Cli) -> LevelFilter {
    match cli.command.as_ref() {
        Some(Commands::Serve(_)) => match cli.verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        },
        // `enquire` prints JSON to stdout; keep logs quiet unless asked.
        Some(Commands::Enquire(_)) | None => match cli.verbose {
            0 => LevelFilter::OFF,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        },
    }
}
