mod display;
mod menu;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use docsearch_core::config::{
    DEFAULT_DATABASE_PATH, DEFAULT_EMBEDDING_MODEL, DEFAULT_GEMINI_ENDPOINT, DEFAULT_TOP_K,
};
use docsearch_core::{
    embedding_client, ChunkStore, ChunkingOptions, ConfiguredEmbedder, EmbeddingClient,
    EmbeddingSettings, IndexingPipeline, ProviderKind, SearchPipeline, SearchQuery, Settings,
    SqliteStore, DEFAULT_BATCH_SIZE,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docsearch", version, about = "Index PDF and DOCX files and search them by meaning.")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Show internal logs and full error details.
    #[arg(long, global = true, default_value_t = false)]
    debug: bool,

    /// SQLite database holding indexed chunks
    #[arg(long, env = "DOCSEARCH_DATABASE", default_value = DEFAULT_DATABASE_PATH)]
    database: PathBuf,

    /// Embedding provider: gemini or local
    #[arg(long, env = "EMBEDDING_PROVIDER", default_value = "gemini")]
    provider: ProviderKind,

    /// API key for the Gemini embedding provider
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Embedding model name
    #[arg(long, env = "EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    model: String,

    /// Embedding provider base URL
    #[arg(long, env = "EMBEDDING_ENDPOINT", default_value = DEFAULT_GEMINI_ENDPOINT)]
    endpoint: String,

    /// Texts sent per embedding request
    #[arg(long, env = "EMBEDDING_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Expected embedding dimension
    #[arg(long, env = "EMBEDDING_DIMENSIONS")]
    dimensions: Option<usize>,

    /// Default number of search results
    #[arg(long, env = "DOCSEARCH_TOP_K", default_value_t = DEFAULT_TOP_K)]
    top_k: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Index files, or every PDF/DOCX under a folder.
    Index {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Search indexed documents.
    Search {
        query: String,
        /// Number of results to return.
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Inspect or clean up the database.
    Files {
        #[command(subcommand)]
        action: FilesCommand,
    },
}

#[derive(Subcommand)]
enum FilesCommand {
    /// List indexed files with their chunk counts.
    List,
    /// Remove every chunk of one file.
    Delete { file: String },
    /// Remove every chunk of every file.
    Clear {
        /// Skip the confirmation prompt.
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
}

impl Cli {
    fn settings(&self) -> Settings {
        Settings {
            embedding: EmbeddingSettings {
                provider: self.provider,
                api_key: self.api_key.clone(),
                model: self.model.clone(),
                endpoint: self.endpoint.clone(),
                batch_size: self.batch_size,
                dimensions: self.dimensions,
            },
            database_path: self.database.clone(),
            top_k: self.top_k,
            chunking: ChunkingOptions::default(),
        }
    }
}

pub(crate) struct App {
    settings: Settings,
    embeddings: EmbeddingClient<ConfiguredEmbedder>,
    store: SqliteStore,
    debug: bool,
}

impl App {
    fn new(settings: Settings, debug: bool) -> anyhow::Result<Self> {
        settings.validate().context("invalid configuration")?;
        let embeddings = embedding_client(&settings.embedding)?;
        let store = SqliteStore::open(&settings.database_path).with_context(|| {
            format!("cannot open database {}", settings.database_path.display())
        })?;

        Ok(Self {
            settings,
            embeddings,
            store,
            debug,
        })
    }

    fn indexer(&self) -> IndexingPipeline<'_, ConfiguredEmbedder, SqliteStore> {
        IndexingPipeline::new(&self.embeddings, &self.store, self.settings.chunking)
    }

    fn searcher(&self) -> SearchPipeline<'_, ConfiguredEmbedder, SqliteStore> {
        SearchPipeline::new(&self.embeddings, &self.store, self.settings.chunking)
    }

    pub(crate) fn default_top_k(&self) -> usize {
        self.settings.top_k
    }

    pub(crate) async fn index_path(&self, path: &Path) -> anyhow::Result<()> {
        let path = &resolve(path);
        if path.is_dir() {
            println!("Indexing folder {} ...", path.display());
            let report = self.indexer().index_folder(path).await?;
            display::print_folder_report(&report);
            return Ok(());
        }

        println!("Processing document: {}", path.display());
        let document = self
            .indexer()
            .index_file_with_progress(path, display::print_stage)
            .await?;
        println!(
            "Indexed '{}' ({} chunks).",
            document.file_identifier, document.chunk_count
        );
        Ok(())
    }

    pub(crate) async fn search(&self, query: &str, top_k: usize) -> anyhow::Result<()> {
        let hits = self.searcher().search(&SearchQuery::new(query, top_k)).await?;
        print!("{}", display::format_results(&hits));
        Ok(())
    }

    pub(crate) fn list_files(&self) -> anyhow::Result<Vec<docsearch_core::FileSummary>> {
        let files = self.store.list_files()?;
        display::print_files(&files);
        Ok(files)
    }

    pub(crate) fn delete_file(&self, file: &str) -> anyhow::Result<()> {
        let file = &resolve(Path::new(file)).display().to_string();
        let removed = self.store.delete_file(file)?;
        if removed == 0 {
            println!("'{file}' was not indexed; nothing to delete.");
        } else {
            println!("Deleted {removed} chunks for '{file}'.");
        }
        Ok(())
    }

    pub(crate) fn clear(&self) -> anyhow::Result<()> {
        let removed = self.store.clear_all()?;
        println!("Cleared the database ({removed} chunks removed).");
        Ok(())
    }

    pub(crate) fn report(&self, error: &anyhow::Error) {
        report_error(error, self.debug);
    }
}

/// Absolute form of an existing path so one file always maps to one
/// identifier; paths that do not exist are kept as given.
pub(crate) fn resolve(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn report_error(error: &anyhow::Error, debug: bool) {
    if debug {
        eprintln!("error: {error:?}");
    } else {
        eprintln!("error: {error:#}");
    }
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("docsearch=debug,docsearch_core=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let app = App::new(cli.settings(), cli.debug)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        database = %app.settings.database_path.display(),
        "docsearch boot"
    );

    let Some(command) = cli.command else {
        return menu::run(&app).await;
    };

    match command {
        Command::Index { paths } => {
            let mut failures = 0usize;
            for path in &paths {
                if let Err(error) = app.index_path(path).await {
                    app.report(&error);
                    failures += 1;
                }
            }
            if failures > 0 {
                anyhow::bail!("{failures} of {} paths failed to index", paths.len());
            }
        }
        Command::Search { query, top_k } => {
            app.search(&query, top_k.unwrap_or(app.default_top_k())).await?;
        }
        Command::Files { action } => match action {
            FilesCommand::List => {
                app.list_files()?;
            }
            FilesCommand::Delete { file } => app.delete_file(&file)?,
            FilesCommand::Clear { yes } => {
                if yes || menu::confirm("Delete ALL indexed documents? Type 'yes' to confirm")? {
                    app.clear()?;
                } else {
                    println!("Cancelled.");
                }
            }
        },
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let debug = cli.debug;
    init_logging(debug);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            report_error(&error, debug);
            ExitCode::FAILURE
        }
    }
}
