use anyhow::Context;
use lensrag::chunking::{Chunker, ChunkingStrategy, PageText};
use lensrag::cli::{Cli, Commands, ConfigAction};
use lensrag::config::Config;
use lensrag::context::ServiceContext;
use lensrag::error::{LensError, Result};
use lensrag::retrieval::RetrievalStrategy;
use std::path::{Path, PathBuf};

/// Separates pages in plain-text input
const PAGE_BREAK: char = '\x0c';

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Chunk {
            file,
            strategy,
            json,
        } => {
            let config = load_config(cli.config, cli.profile)
                .context("Failed to load configuration")?;
            cmd_chunk(&config, &file, strategy.as_deref(), json)
                .with_context(|| format!("Failed to chunk {}", file.display()))?;
        }
        Commands::Query {
            file,
            question,
            strategy,
            chunking,
            limit,
            json,
        } => {
            let config = load_config(cli.config, cli.profile)
                .context("Failed to load configuration")?;
            cmd_query(
                config,
                &file,
                &question,
                strategy.as_deref(),
                chunking.as_deref(),
                limit,
                json,
            )
            .await
            .with_context(|| format!("Query against {} failed", file.display()))?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, cli.profile, action).context("Config command failed")?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "lensrag=debug" } else { "lensrag=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_chunk(config: &Config, file: &Path, strategy: Option<&str>, json: bool) -> Result<()> {
    let strategy: ChunkingStrategy = match strategy {
        Some(name) => name.parse()?,
        None => config.chunking.strategy,
    };

    let pages = read_pages(file)?;
    let chunker = Chunker::new(&config.chunking.encoding)?;
    let chunks = chunker.chunk(&doc_id_for(file), &pages, strategy)?;

    if json {
        let out = serde_json::to_string_pretty(&chunks).map_err(|e| LensError::Json {
            source: e,
            context: "Failed to serialize chunks".to_string(),
        })?;
        println!("{}", out);
        return Ok(());
    }

    println!(
        "{} chunks from {} pages ({})",
        chunks.len(),
        pages.len(),
        strategy
    );
    for chunk in &chunks {
        println!(
            "\n[{}] page {} - {} tokens",
            chunk.id, chunk.page, chunk.token_count
        );
        println!("{}", preview(&chunk.text, 160));
    }

    Ok(())
}

async fn cmd_query(
    config: Config,
    file: &Path,
    question: &str,
    strategy: Option<&str>,
    chunking: Option<&str>,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let strategy = strategy
        .map(str::parse::<RetrievalStrategy>)
        .transpose()?;
    let chunking = chunking.map(str::parse::<ChunkingStrategy>).transpose()?;

    let pages = read_pages(file)?;
    let doc_id = doc_id_for(file);

    let context = ServiceContext::from_config(config)?;
    let report = context.ingest(&doc_id, &pages, chunking).await?;
    tracing::info!(
        "Indexed {} chunks into {}",
        report.chunks,
        report.collection
    );

    let results = context.retrieve(&doc_id, question, strategy, limit).await?;

    if json {
        let out = serde_json::to_string_pretty(&results).map_err(|e| LensError::Json {
            source: e,
            context: "Failed to serialize results".to_string(),
        })?;
        println!("{}", out);
        return Ok(());
    }

    if results.is_empty() {
        println!("No relevant chunks found");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!(
            "\n{}. [{}] page {} - score {:.3}",
            i + 1,
            result.chunk.id,
            result.chunk.page,
            result.score
        );
        println!("{}", preview(&result.chunk.text, 240));
    }

    Ok(())
}

fn cmd_config(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Show { section } => {
            let config = load_config(config_path, profile)?;
            let value = serde_json::to_value(&config).map_err(|e| LensError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;

            let shown = match &section {
                Some(name) => value.get(name).cloned().ok_or_else(|| {
                    LensError::Config(format!("Unknown config section '{}'", name))
                })?,
                None => value,
            };

            let json = serde_json::to_string_pretty(&shown).map_err(|e| LensError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;
            println!("{}", json);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| LensError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'lensrag config init' to create one."
        );
        return Config::defaults_with_profile(profile.as_deref());
    }

    match profile {
        Some(profile) => Config::load_with_profile(&path, &profile),
        None => Config::load(&path),
    }
}

/// Read a UTF-8 file as pages split on form feeds
fn read_pages(path: &Path) -> Result<Vec<PageText>> {
    let content = std::fs::read_to_string(path).map_err(|e| LensError::Io {
        source: e,
        context: format!("Failed to read {:?}", path),
    })?;

    Ok(content
        .split(PAGE_BREAK)
        .enumerate()
        .map(|(i, text)| PageText::new(i as u32 + 1, text))
        .collect())
}

fn doc_id_for(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document")
        .to_string()
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat,
    }
}
