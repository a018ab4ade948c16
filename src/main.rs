//! ragserve - Main CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ragserve::{
    backends::{GenerationBackend, HttpSearchProvider, OllamaBackend, SearchProvider},
    cli::{Args, Commands, QueryOptions, Verbosity},
    config::Config,
    rag::{PipelineResult, QueryRequest, RagPipeline},
};

fn init_tracing(verbosity: Verbosity) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| verbosity.log_filter().into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = Config::load(args.config.as_deref())?;
    args.apply_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

fn build_pipeline(config: &Config) -> Result<RagPipeline> {
    let provider: Arc<dyn SearchProvider> = Arc::new(
        HttpSearchProvider::new(&config.search).context("Failed to create search client")?,
    );
    let backend: Arc<dyn GenerationBackend> = Arc::new(
        OllamaBackend::new(&config.ollama).context("Failed to create Ollama client")?,
    );
    Ok(RagPipeline::new(provider, backend, config.rag_config()))
}

fn spinner(verbosity: Verbosity) -> Option<ProgressBar> {
    if !verbosity.show_progress() {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message("Buscando en los documentos...");
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

async fn answer(
    pipeline: &RagPipeline,
    request: &QueryRequest,
    verbosity: Verbosity,
) -> Result<PipelineResult> {
    let pb = spinner(verbosity);
    let outcome = pipeline.serve(request).await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    Ok(outcome?)
}

fn print_result(result: &PipelineResult, verbosity: Verbosity) {
    println!("\n{}\n", result.answer);

    if !verbosity.show_details() {
        return;
    }

    if !result.sources.is_empty() {
        println!("{}", "Fuentes:".bold());
        for (idx, source) in result.sources.iter().enumerate() {
            println!(
                "  {}. {} {}",
                idx + 1,
                source.title,
                format!("(#{}, relevancia {:.2})", source.document_id, source.relevance_score)
                    .dimmed()
            );
        }
    }

    let cache = if result.cache_hit {
        "cache".green().to_string()
    } else {
        "fresh".yellow().to_string()
    };
    println!(
        "{}",
        format!(
            "{} · total {}ms · retrieval {}ms · llm {}ms · {} docs",
            cache,
            result.response_time_ms,
            result.retrieval_time_ms,
            result.llm_time_ms,
            result.documents_retrieved
        )
        .dimmed()
    );
}

async fn run_ask(
    args: &Args,
    query: &str,
    options: &QueryOptions,
    json: bool,
) -> Result<()> {
    let config = load_config(args)?;
    let pipeline = build_pipeline(&config)?;
    let request = options.request(query, &config);

    let verbosity = if json { Verbosity::Quiet } else { args.verbosity() };
    let result = answer(&pipeline, &request, verbosity).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result, verbosity);
    }
    Ok(())
}

fn print_stats(pipeline: &RagPipeline) {
    let caches = pipeline.cache_stats();
    let stats = pipeline.telemetry().stats();

    println!("\n{}", "Cache".bold());
    println!("─────────────────────────────────────");
    for (name, tier) in [("retrieval", caches.retrieval), ("response", caches.response)] {
        println!(
            "{:<10} size {}/{}  hits {}  misses {}  evictions {}  hit rate {:.1}%",
            name,
            tier.size,
            tier.max_size,
            tier.hits,
            tier.misses,
            tier.evictions,
            tier.hit_rate * 100.0
        );
    }

    println!("\n{}", "Pipeline".bold());
    println!("─────────────────────────────────────");
    println!("Uptime:            {:?}", pipeline.telemetry().elapsed());
    println!("Cache hits:        {}", stats.cache_hits);
    println!("Answers generated: {}", stats.answers_generated);
    println!("No results:        {}", stats.no_results);
    println!("Degraded:          {}", stats.degraded());
    println!("Mean retrieval:    {:.0}ms", stats.mean_retrieval_ms());
    println!("Mean generation:   {:.0}ms", stats.mean_generation_ms());
    println!();
}

async fn run_repl(args: &Args, options: &QueryOptions) -> Result<()> {
    let config = load_config(args)?;
    let pipeline = build_pipeline(&config)?;
    let verbosity = args.verbosity();

    let mut editor = DefaultEditor::new()?;
    let history_path = Config::config_path()
        .ok()
        .and_then(|p| p.parent().map(|dir| dir.join("history.txt")));
    if let Some(path) = &history_path {
        let _ = editor.load_history(path);
    }

    println!("{}", "ragserve - preguntas sobre documentos internos".bold());
    println!("Comandos: /stats, /reset, /exit\n");

    loop {
        match editor.readline(">ragserve: ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line);

                match line {
                    "/exit" | "/quit" => break,
                    "/stats" => print_stats(&pipeline),
                    "/reset" => {
                        pipeline.reset_caches();
                        println!("Caches cleared");
                    }
                    query => {
                        let request = options.request(query, &config);
                        match answer(&pipeline, &request, verbosity).await {
                            Ok(result) => print_result(&result, verbosity),
                            Err(e) => eprintln!("{} {}", "Error:".red(), e),
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("\nUse /exit to quit gracefully");
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    if let Some(path) = &history_path {
        let _ = editor.save_history(path);
    }
    Ok(())
}

async fn run_health(args: &Args) -> Result<()> {
    let config = load_config(args)?;

    let backend = OllamaBackend::new(&config.ollama)?;
    let backend_ok = backend.health_check().await;
    report("Generation backend", &config.ollama.base_url, backend_ok);

    let provider = HttpSearchProvider::new(&config.search)?;
    let probe = tokio::time::timeout(
        config.retrieval.timeout().max(Duration::from_secs(2)),
        provider.search("health", 1),
    )
    .await;
    let search_ok = matches!(probe, Ok(Ok(_)));
    report("Search provider", &config.search.base_url, search_ok);

    if backend_ok && search_ok {
        Ok(())
    } else {
        anyhow::bail!("one or more dependencies are unavailable")
    }
}

fn report(name: &str, url: &str, ok: bool) {
    let status = if ok { "✓ OK".green() } else { "✗ FAIL".red() };
    println!("{:<20} {:<8} {}", name, status, url.dimmed());
}

fn show_config(args: &Args) -> Result<()> {
    let config = load_config(args)?;
    let path = match &args.config {
        Some(path) => path.clone(),
        None => Config::config_path()?,
    };
    println!("{}", format!("# {}", path.display()).dimmed());
    println!("{}", config.to_toml()?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbosity());

    match &args.command {
        Commands::Ask {
            query,
            options,
            json,
        } => run_ask(&args, query, options, *json).await,
        Commands::Repl { options } => run_repl(&args, options).await,
        Commands::Health => run_health(&args).await,
        Commands::Config => show_config(&args),
    }
}
