//! FedQuery - Main CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use fedquery::{
    agent::WorkflowStage,
    cli::{output, Args, Commands, Verbosity},
    config::Config,
    llm,
    logging,
    rag::LexicalReranker,
    search::{DocumentLookup, McpSearchClient},
    EngineConfig, WorkflowEngine,
};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    logging::init_tracing(args.verbosity().log_directive());

    if let Err(e) = run(&args).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(args: &Args) -> Result<()> {
    let config = Config::load(args.config.clone()).context("Failed to load configuration")?;

    match &args.command {
        Commands::Ask {
            question,
            json,
            rerank,
        } => ask(args.verbosity(), &config, question, *json, *rerank).await,
        Commands::Document { id } => show_document(&config, id).await,
        Commands::Config => show_config(&config),
    }
}

/// Answer one question against the corpus
async fn ask(
    verbosity: Verbosity,
    config: &Config,
    question: &str,
    json: bool,
    rerank: bool,
) -> Result<()> {
    // Missing credentials are fatal before any request is served
    config.validate_credentials()?;
    llm::ensure_available(&config.llm).await?;
    let model = llm::from_config(&config.llm)?;

    let search = McpSearchClient::spawn(&config.search)
        .await
        .context("Failed to start the corpus search server")?;

    let progress = (verbosity.show_progress() && !json)
        .then(|| output::spinner(WorkflowStage::ENTRY.display_name()));
    let label_stage = |stage: WorkflowStage| {
        if let Some(pb) = &progress {
            pb.set_message(stage.display_name());
        }
    };

    let reranker = LexicalReranker::new();
    let mut engine = WorkflowEngine::new(model.as_ref(), &search, EngineConfig::from_config(config))
        .with_stage_observer(&label_stage);
    if rerank || config.retrieval.reranker_enabled {
        engine = engine.with_reranker(&reranker);
    }

    let result = engine.run(question).await;
    if let Some(pb) = &progress {
        pb.finish_and_clear();
    }
    search.close().await;

    let outcome = result.map_err(|e| {
        if e.is_search_failure() {
            anyhow::Error::new(e).context("Corpus search failed; no answer was produced")
        } else {
            anyhow::Error::new(e)
        }
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        output::print_outcome(&outcome);
    }
    Ok(())
}

/// Print a full document from the corpus
async fn show_document(config: &Config, id: &str) -> Result<()> {
    let search = McpSearchClient::spawn(&config.search)
        .await
        .context("Failed to start the corpus search server")?;
    let result = search.get_document(id).await;
    search.close().await;

    match result? {
        Some(document) => output::print_document(&document),
        None => println!("{}", format!("Document not found: {}", id).yellow()),
    }
    Ok(())
}

fn show_config(config: &Config) -> Result<()> {
    println!("{}", "FedQuery Configuration".bold());
    if let Some(path) = Config::default_path() {
        println!("{}", format!("Default file: {}", path.display()).dimmed());
    }
    println!();
    print!("{}", config.to_toml()?);
    println!();
    println!(
        "Credential: {}",
        if config.llm.api_key.is_some() {
            "set".green()
        } else {
            "not set".red()
        }
    );
    Ok(())
}
