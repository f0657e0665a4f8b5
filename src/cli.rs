//! codeatlas - CLI for the Code Atlas index.
//!
//! Designed for AI coding assistants and hook scripts:
//! - `--json` outputs machine-readable JSON
//! - errors go to stderr, results to stdout
//! - exit codes: 0 = success, 1 = error

use anyhow::Result;
use clap::{Parser, Subcommand};
use codeatlas::callgraph::{CallGraph, CallerRef};
use codeatlas::query::{self, DeadSymbol, ImpactReport, SuggestResponse};
use codeatlas::semantic::{self, cache::SemanticHit};
use codeatlas::{persist, server, watch, AtlasError, IndexBuilder, IndexConfig, ProjectIndex};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "codeatlas")]
#[command(version)]
#[command(about = "Structural code atlas - repository maps for AI agents")]
#[command(long_about = r#"
codeatlas maintains a machine-readable map of a repository: files, symbols,
imports/exports, dependencies, and call edges, plus semantic search over
symbol names via local embeddings.

Designed for automation: use --json for machine-readable output.
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project root to analyze
    #[arg(short, long, global = true, default_value = ".")]
    root: PathBuf,

    /// Output JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or rebuild the full index
    Index,

    /// Re-index specific files (defaults to a full refresh of known files)
    Update {
        /// Repo-relative paths to refresh
        files: Vec<String>,
    },

    /// Watch the tree and keep the index current
    Watch {
        /// Also serve HTTP while watching
        #[arg(long)]
        daemon: bool,
    },

    /// Show index status
    Status,

    /// Search symbols by name
    Search {
        query: String,

        /// Exact match instead of case-insensitive substring
        #[arg(long)]
        exact: bool,
    },

    /// Semantic search over symbol names
    Semsearch {
        query: String,

        /// Number of results
        #[arg(short, long, default_value = "20")]
        k: usize,

        /// Embedding model identifier
        #[arg(long)]
        model: Option<String>,

        /// Print timing information to stderr
        #[arg(long)]
        profile: bool,
    },

    /// Suggest symbols relevant to a free-text context
    Suggest {
        context: String,
    },

    /// Show dependencies of a file
    Deps {
        /// Repo-relative file path
        file: Option<String>,

        /// Show reverse dependencies (importers)
        #[arg(long)]
        reverse: bool,

        /// List files with no dependency edges at all
        #[arg(long)]
        orphans: bool,
    },

    /// Estimate the blast radius of changing a file
    Impact {
        file: String,

        /// Traversal depth
        #[arg(long, default_value = "2")]
        depth: usize,
    },

    /// Outgoing calls of a symbol
    Calls {
        symbol: String,
    },

    /// Callers of a symbol
    CalledBy {
        symbol: String,
    },

    /// Breadth-first call path between two symbols
    CallChain {
        from: String,
        to: String,

        /// Maximum path length in edges
        #[arg(long, default_value = "5")]
        depth: usize,
    },

    /// Functions and methods that nothing calls
    DeadCode {
        /// Include names starting with underscore
        #[arg(long)]
        include_private: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let default_level = if codeatlas::config::trace_enabled() {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_level.into()),
        )
        .init();

    let cli = Cli::parse();

    match run_command(&cli).await {
        Ok(output) => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print_human_readable(&output);
            }
            Ok(())
        }
        Err(e) => {
            if cli.json {
                eprintln!("{}", serde_json::to_string_pretty(&error_response(&e))?);
            } else {
                eprintln!("Error: {e}");
            }
            std::process::exit(1);
        }
    }
}

async fn run_command(cli: &Cli) -> Result<Output> {
    let config = IndexConfig::for_root(&cli.root)?;
    let builder = IndexBuilder::new(config.clone());

    match &cli.command {
        Commands::Index => {
            let index = builder.full_build().await?;
            persist::save_index(&config.index_path(), &index)?;
            Ok(Output::Index {
                files: index.file_count(),
                symbols: index.symbol_count(),
                root: config.project_root.display().to_string(),
            })
        }

        Commands::Update { files } => {
            let mut index = load_required(&config)?;
            let paths: Vec<String> = if files.is_empty() {
                index.files.keys().cloned().collect()
            } else {
                files.clone()
            };
            let report = builder.update_paths(&mut index, &paths).await?;
            persist::save_index(&config.index_path(), &index)?;
            Ok(Output::Update {
                reindexed: report.reindexed,
                removed: report.removed,
                unchanged: report.unchanged,
                skipped: report.skipped,
            })
        }

        Commands::Watch { daemon } => {
            if *daemon {
                let addr = codeatlas::config::server_addr()?;
                let server_config = config.clone();
                tokio::try_join!(
                    server::run(addr, server_config),
                    watch::watch(&builder, watch::WatchOptions::default()),
                )?;
            } else {
                watch::watch(&builder, watch::WatchOptions::default()).await?;
            }
            Ok(Output::Watch)
        }

        Commands::Status => {
            let index = load_required(&config)?;
            let index_size = std::fs::metadata(config.index_path())
                .map(|m| m.len())
                .unwrap_or(0);
            let vectors = semantic::cache::DocCache::load(&config.vectors_path())
                .unwrap_or(None)
                .map(|c| c.len())
                .unwrap_or(0);
            Ok(Output::Status {
                schema_version: index.schema_version.clone(),
                files: index.file_count(),
                symbols: index.symbol_count(),
                vectors,
                created_at: index.created_at.to_rfc3339(),
                updated_at: index.updated_at.to_rfc3339(),
                index_size_bytes: index_size,
            })
        }

        Commands::Search { query, exact } => {
            let index = load_required(&config)?;
            let results = query::search(&index, query, *exact)
                .into_iter()
                .map(|(name, location)| SearchResult { name, location })
                .collect();
            Ok(Output::Search {
                query: query.clone(),
                results,
            })
        }

        Commands::Semsearch {
            query,
            k,
            model,
            profile,
        } => {
            let index = load_required(&config)?;

            let started = Instant::now();
            let embedder = semantic::embedder(model.as_deref())?;
            let model_ms = started.elapsed().as_millis();

            let cache_start = Instant::now();
            let cache =
                semantic::cache::ensure_cache(&index, &config.vectors_path(), &embedder)?;
            let cache_ms = cache_start.elapsed().as_millis();

            let search_start = Instant::now();
            let results = semantic::cache::semantic_search(query, &cache, *k, &embedder)?;
            let search_ms = search_start.elapsed().as_millis();

            if *profile {
                eprintln!(
                    "model: {model_ms}ms, cache: {cache_ms}ms ({} vectors), search: {search_ms}ms",
                    cache.len()
                );
            }

            Ok(Output::Semsearch {
                query: query.clone(),
                results,
            })
        }

        Commands::Suggest { context } => {
            let index = load_required(&config)?;
            Ok(Output::Suggest {
                context: context.clone(),
                response: query::suggest(&index, context),
            })
        }

        Commands::Deps {
            file,
            reverse,
            orphans,
        } => {
            let index = load_required(&config)?;
            if *orphans {
                return Ok(Output::Orphans {
                    files: query::orphans(&index),
                });
            }
            let Some(file) = file else {
                return Err(AtlasError::Config("deps requires a file (or --orphans)".into()).into());
            };
            let results = query::dependencies(&index, file, *reverse)?;
            Ok(Output::Deps {
                file: file.clone(),
                reverse: *reverse,
                results,
            })
        }

        Commands::Impact { file, depth } => {
            let index = load_required(&config)?;
            let report = query::impact(&index, file, *depth)?;
            Ok(Output::Impact {
                file: file.clone(),
                report,
            })
        }

        Commands::Calls { symbol } => {
            let index = load_required(&config)?;
            let graph = CallGraph::build(&index);
            let entry = graph
                .outgoing(symbol)
                .ok_or_else(|| AtlasError::SymbolNotFound(symbol.clone()))?;
            Ok(Output::Calls {
                symbol: symbol.clone(),
                calls: entry.calls.clone(),
            })
        }

        Commands::CalledBy { symbol } => {
            let index = load_required(&config)?;
            let graph = CallGraph::build(&index);
            Ok(Output::CalledBy {
                symbol: symbol.clone(),
                callers: graph.incoming(symbol),
            })
        }

        Commands::CallChain { from, to, depth } => {
            let index = load_required(&config)?;
            let graph = CallGraph::build(&index);
            Ok(Output::CallChain {
                from: from.clone(),
                to: to.clone(),
                chain: graph.chain(from, to, *depth),
            })
        }

        Commands::DeadCode { include_private } => {
            let index = load_required(&config)?;
            let symbols = query::dead_code(&index, *include_private);
            Ok(Output::DeadCode {
                count: symbols.len(),
                symbols,
            })
        }
    }
}

fn load_required(config: &IndexConfig) -> Result<ProjectIndex> {
    persist::load_index(&config.index_path())?
        .ok_or_else(|| AtlasError::IndexMissing(config.index_path()).into())
}

// ============================================================================
// Output
// ============================================================================

#[derive(serde::Serialize)]
struct SearchResult {
    name: String,
    location: String,
}

#[derive(serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Output {
    Index {
        files: usize,
        symbols: usize,
        root: String,
    },
    Update {
        reindexed: usize,
        removed: usize,
        unchanged: usize,
        skipped: usize,
    },
    Watch,
    Status {
        schema_version: String,
        files: usize,
        symbols: usize,
        vectors: usize,
        created_at: String,
        updated_at: String,
        index_size_bytes: u64,
    },
    Search {
        query: String,
        results: Vec<SearchResult>,
    },
    Semsearch {
        query: String,
        results: Vec<SemanticHit>,
    },
    Suggest {
        context: String,
        #[serde(flatten)]
        response: SuggestResponse,
    },
    Deps {
        file: String,
        reverse: bool,
        results: Vec<String>,
    },
    Orphans {
        files: Vec<String>,
    },
    Impact {
        file: String,
        #[serde(flatten)]
        report: ImpactReport,
    },
    Calls {
        symbol: String,
        calls: Vec<String>,
    },
    CalledBy {
        symbol: String,
        callers: Vec<CallerRef>,
    },
    CallChain {
        from: String,
        to: String,
        chain: Option<Vec<String>>,
    },
    DeadCode {
        count: usize,
        symbols: Vec<DeadSymbol>,
    },
}

#[derive(serde::Serialize)]
struct ErrorResponse {
    ok: bool,
    error: ErrorInfo,
}

#[derive(serde::Serialize)]
struct ErrorInfo {
    code: String,
    message: String,
}

fn error_response(err: &anyhow::Error) -> ErrorResponse {
    let code = err
        .downcast_ref::<AtlasError>()
        .map(|e| e.code())
        .unwrap_or("internal");
    ErrorResponse {
        ok: false,
        error: ErrorInfo {
            code: code.to_string(),
            message: err.to_string(),
        },
    }
}

fn print_human_readable(output: &Output) {
    match output {
        Output::Index {
            files,
            symbols,
            root,
        } => {
            println!("Indexed {files} files, {symbols} symbols");
            println!("Root: {root}");
        }
        Output::Update {
            reindexed,
            removed,
            unchanged,
            skipped,
        } => {
            println!(
                "Reindexed: {reindexed}, removed: {removed}, unchanged: {unchanged}, skipped: {skipped}"
            );
        }
        Output::Watch => {}
        Output::Status {
            schema_version,
            files,
            symbols,
            vectors,
            created_at,
            updated_at,
            index_size_bytes,
        } => {
            println!("Schema:  {schema_version}");
            println!("Files:   {files}");
            println!("Symbols: {symbols}");
            println!("Vectors: {vectors}");
            println!("Created: {created_at}");
            println!("Updated: {updated_at}");
            println!("Size:    {index_size_bytes} bytes");
        }
        Output::Search { query, results } => {
            println!("Search: \"{query}\"");
            println!("Found {} results:", results.len());
            for r in results {
                println!("  {} at {}", r.name, r.location);
            }
        }
        Output::Semsearch { query, results } => {
            println!("Semantic search: \"{query}\"");
            for r in results {
                match r.line {
                    Some(line) => println!("  {:.3} {} at {}:{line}", r.score, r.id, r.file),
                    None => println!("  {:.3} {} at {}", r.score, r.id, r.file),
                }
            }
        }
        Output::Suggest { context, response } => {
            println!("Suggestions for: \"{context}\"");
            println!("Primary:");
            for s in &response.primary {
                println!("  {:.2} {} at {}", s.confidence, s.name, s.location);
            }
            if !response.related.is_empty() {
                println!("Related:");
                for s in &response.related {
                    println!("  {:.2} {} at {}", s.confidence, s.name, s.location);
                }
            }
        }
        Output::Deps {
            file,
            reverse,
            results,
        } => {
            if *reverse {
                println!("Files importing {file}:");
            } else {
                println!("Imports of {file}:");
            }
            for r in results {
                println!("  {r}");
            }
        }
        Output::Orphans { files } => {
            println!("Orphan files ({}):", files.len());
            for f in files {
                println!("  {f}");
            }
        }
        Output::Impact { file, report } => {
            println!("Impact of changing {file}:");
            println!("  high:   {}", report.high.join(", "));
            println!("  medium: {}", report.medium.join(", "));
            println!("  low:    {}", report.low.join(", "));
            if !report.tests.is_empty() {
                println!("  tests:  {}", report.tests.join(", "));
            }
        }
        Output::Calls { symbol, calls } => {
            println!("{symbol} calls:");
            for c in calls {
                println!("  {c}");
            }
        }
        Output::CalledBy { symbol, callers } => {
            println!("Callers of {symbol}:");
            for c in callers {
                println!("  {} at {}:{}", c.caller, c.file, c.line);
            }
        }
        Output::CallChain { from, to, chain } => match chain {
            Some(path) => println!("{}", path.join(" -> ")),
            None => println!("No call chain from {from} to {to}"),
        },
        Output::DeadCode { count, symbols } => {
            println!("Found {count} potentially dead symbols:");
            for s in symbols {
                println!("  {} ({}) at {}:{}", s.name, s.kind.as_str(), s.file, s.line);
            }
        }
    }
}
