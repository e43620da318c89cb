mod config;
mod models;
mod routes;
mod services;
mod utils;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, fmt};

use config::SummarizerArgs;
use services::book::render_markdown;
use services::chapterizer::load_chapters;
use services::profile::{KNOWN_MODELS, ModelProfile};
use services::{experiment, stats};

/// Summarize books chapter by chapter with an LLM.
#[derive(Parser, Debug)]
#[command(name = "booksum", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarize every chapter of an extracted book into a Markdown file.
    Summarize {
        /// Extracted book text, chapters separated by blank lines.
        input: PathBuf,
        /// Defaults to `<input stem>_summary.md`.
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        settings: SummarizerArgs,
    },
    /// Word, token and cost statistics for a book.
    Stats {
        input: PathBuf,
        /// Defaults to `<input stem>_stats.md`.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Summarize one chapter in a single call and append it to a prompting log.
    Experiment {
        input: PathBuf,
        /// 0-based chapter index.
        #[arg(long, default_value_t = 0)]
        chapter: usize,
        #[arg(long, default_value = "gpt-4o")]
        model: String,
        #[arg(long)]
        system_prompt: Option<String>,
        #[arg(long)]
        instruction: Option<String>,
        #[arg(long, default_value = experiment::DEFAULT_LOG)]
        log: PathBuf,
        #[command(flatten)]
        settings: SummarizerArgs,
    },
    /// Serve the HTTP upload API.
    Serve {
        #[arg(long, env = "BOOKSUM_BIND", default_value = "0.0.0.0:3000")]
        bind: String,
        #[arg(long, env = "BOOKSUM_OUTPUT_DIR", default_value = "./output")]
        output_dir: PathBuf,
        #[command(flatten)]
        settings: SummarizerArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    // Initialize tracing
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    match Cli::parse().command {
        Command::Summarize {
            input,
            output,
            settings,
        } => {
            let book = settings.build()?;
            let chapters = load_chapters(&input)?;
            let output = output.unwrap_or_else(|| utils::sibling_path(&input, "_summary.md"));

            let model = book.engine().summarizer();
            let tokens: usize = chapters.iter().map(|c| model.encoder().count(c)).sum();
            tracing::info!(
                model = model.name(),
                tokens,
                estimated_cost = tokens as f64 * model.cost_per_token(),
                "summarizing book"
            );

            let summary = book.summarize_book(chapters).await;
            tokio::fs::write(&output, render_markdown(&summary))
                .await
                .with_context(|| format!("failed to write {}", output.display()))?;
            tracing::info!(
                path = %output.display(),
                summarized = summary.summarized_count(),
                chapters = summary.sections.len(),
                "book summary saved"
            );
        }
        Command::Stats { input, output } => {
            let chapters = load_chapters(&input)?;
            let output = output.unwrap_or_else(|| utils::sibling_path(&input, "_stats.md"));
            let report = stats::analyze(&chapters, KNOWN_MODELS)?;
            tokio::fs::write(&output, stats::render_markdown(&report))
                .await
                .with_context(|| format!("failed to write {}", output.display()))?;
            tracing::info!(path = %output.display(), "word statistics saved");
        }
        Command::Experiment {
            input,
            chapter,
            model,
            system_prompt,
            instruction,
            log,
            settings,
        } => {
            let book = settings.build()?;
            let profile = ModelProfile::from_name(&model, settings.llm.client())?;
            let chapters = load_chapters(&input)?;
            let Some(text) = chapters.get(chapter) else {
                bail!("chapter {chapter} out of range, book has {}", chapters.len());
            };

            let engine = book.engine();
            let system_prompt =
                system_prompt.unwrap_or_else(|| engine.prompts().summarizer_prompt.clone());
            let instruction =
                instruction.unwrap_or_else(|| engine.prompts().summarizer_instruction.clone());

            let record = engine
                .summarize_text(text, &profile, &system_prompt, &instruction)
                .await?;
            println!("{}", record.summary);
            experiment::append_to(&record, &log)?;
            tracing::info!(path = %log.display(), "experiment logged");
        }
        Command::Serve {
            bind,
            output_dir,
            settings,
        } => {
            let summarizer = Arc::new(settings.build()?);
            let state = routes::AppState {
                summarizer,
                output_dir,
            };

            let listener = TcpListener::bind(&bind).await?;
            tracing::info!("Listening on {}", listener.local_addr()?);
            axum::serve(listener, routes::router(state)).await?;
        }
    }

    Ok(())
}
