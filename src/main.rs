//! db-ask - Ask natural-language questions about a SQL database.

use std::process::ExitCode;
use std::sync::Arc;

use db_ask::agent::SqlAgentFactory;
use db_ask::cli::Cli;
use db_ask::config::Config;
use db_ask::connection::build_descriptor;
use db_ask::db::DriverConnector;
use db_ask::error::Result;
use db_ask::query::{QueryResult, QueryRunner};
use db_ask::session::{SessionManager, SharedSession};
use db_ask::{llm, logging, tui};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();
    if cli.question().is_some() {
        logging::init_stderr_logging();
    } else {
        logging::init_file_logging();
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}: {}", e.category(), e);
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;
    config.apply_env_overrides()?;
    if let Some(provider) = cli.llm_provider()? {
        config.llm.provider = provider;
    }

    let api_key = config.resolve_api_key()?;
    let llm = llm::create_client(&config.llm, api_key)?;
    info!(provider = %config.llm.provider, model = %config.llm.model, "LLM client ready");

    let factory = SqlAgentFactory::new(llm).with_max_iterations(config.llm.max_iterations);
    let mut manager = SessionManager::new(Arc::new(DriverConnector), Arc::new(factory));
    let (backend, fields) = cli.form_fields(&config)?;

    let Some(question) = cli.question() else {
        tui::run(SharedSession::new(manager), backend, fields).await?;
        return Ok(ExitCode::SUCCESS);
    };

    let descriptor = build_descriptor(backend, &fields)?;
    if let Err(e) = manager.connect(descriptor).await {
        eprintln!("{e}");
        if let Some(tip) = e.troubleshooting() {
            eprintln!("Tip: {tip}");
        }
        return Ok(ExitCode::FAILURE);
    }

    let result = QueryRunner::ask_current(&manager, question).await;
    manager.disconnect().await;

    match result {
        Ok(QueryResult::Answer(answer)) => {
            println!("{answer}");
            Ok(ExitCode::SUCCESS)
        }
        Ok(QueryResult::Failure(reason)) => {
            eprintln!("{reason}");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => {
            eprintln!("{e}");
            Ok(ExitCode::FAILURE)
        }
    }
}
