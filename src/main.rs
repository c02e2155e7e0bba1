use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use xrefkit::config::{get_xrefkit_dir, load_config, save_config, XrefConfig};
use xrefkit::diagnostics::Severity;
use xrefkit::enumeration::{enumerate_targets, ReferenceState};
use xrefkit::fetch::HttpFetcher;
use xrefkit::pipeline::{ProjectResolution, ResolutionContext};
use xrefkit::project::{load_documents, write_resolved};
use xrefkit::types::TargetDescriptor;

/// Cross-reference and embed resolution for parsed document trees.
#[derive(Parser)]
#[command(
    name = "xrefkit",
    about = "Cross-reference and embed resolution for parsed document trees"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration for a project
    Init {
        /// Project path (default: current directory)
        path: Option<String>,
    },
    /// Resolve every document of a project
    Resolve {
        /// Project path (default: current directory)
        path: Option<String>,
        /// Output directory (default: <path>/_build/resolved)
        #[arg(short, long)]
        out: Option<String>,
    },
    /// List the reference targets each document defines
    Targets {
        /// Project path (default: current directory)
        path: Option<String>,
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

/// Runs a command. Returns `Ok(false)` when resolution reported errors.
async fn run(cli: Cli) -> xrefkit::errors::Result<bool> {
    match cli.command {
        Commands::Init { path } => {
            let project_path = resolve_path(path);
            let config = XrefConfig {
                root_dir: project_path.to_string_lossy().to_string(),
                ..XrefConfig::default()
            };
            save_config(&project_path, &config)?;
            println!(
                "Initialized xrefkit at {}",
                get_xrefkit_dir(&project_path).display()
            );
        }
        Commands::Resolve { path, out } => {
            let project_path = resolve_path(path);
            let config = load_config(&project_path)?;
            let documents = load_documents(&project_path, &config)?;

            let fetcher = HttpFetcher::new(Duration::from_secs(config.fetch_timeout_secs));
            let mut ctx = ResolutionContext::new(config, Arc::new(fetcher));
            ctx.load_external_references().await;
            let resolution = ctx.resolve_project(documents).await;

            let out_dir = match out {
                Some(out) => PathBuf::from(out),
                None => project_path.join("_build").join("resolved"),
            };
            let written = write_resolved(&out_dir, &resolution)?;
            print_diagnostics(&resolution);
            println!(
                "Resolved {} documents into {} in {}ms ({} diagnostics, {} dependency edges)",
                written,
                out_dir.display(),
                resolution.duration_ms,
                resolution.diagnostic_count(),
                resolution.graph.edge_count()
            );
            return Ok(!resolution.has_errors());
        }
        Commands::Targets { path, json } => {
            let project_path = resolve_path(path);
            let config = load_config(&project_path)?;
            let documents = load_documents(&project_path, &config)?;

            let mut listing: Vec<(String, Vec<TargetDescriptor>)> = Vec::new();
            for mut document in documents {
                let mut state = ReferenceState::new(
                    document.path.as_str(),
                    document.page.url.as_str(),
                    config.numbering.clone(),
                );
                if let Some(label) = &document.page.frontmatter.label {
                    state = state.with_file_target(label, document.page.frontmatter.title.clone());
                }
                let mut diagnostics = xrefkit::diagnostics::Diagnostics::new(document.path.as_str());
                enumerate_targets(&mut document.mdast, &mut state, &mut diagnostics);
                listing.push((document.path, state.targets().cloned().collect()));
            }

            if json {
                let map: serde_json::Map<String, serde_json::Value> = listing
                    .into_iter()
                    .map(|(path, targets)| {
                        (path, serde_json::to_value(targets).unwrap_or_default())
                    })
                    .collect();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&map).unwrap_or_default()
                );
            } else {
                for (path, targets) in &listing {
                    println!("{}", path);
                    for target in targets {
                        let number = target.enumerator.as_deref().unwrap_or("-");
                        println!(
                            "  {:<24} {:<9} {:<8} {}",
                            target.identifier,
                            target.kind.as_str(),
                            number,
                            target.url
                        );
                    }
                }
            }
        }
    }
    Ok(true)
}

fn print_diagnostics(resolution: &ProjectResolution) {
    for document in &resolution.documents {
        for diagnostic in document.diagnostics.iter() {
            let level = match diagnostic.severity {
                Severity::Warning => "warning",
                Severity::Error => "error",
            };
            println!(
                "{}: {} [{}] {}",
                document.path,
                level,
                diagnostic.rule_id.as_str(),
                diagnostic.message
            );
            if let Some(note) = &diagnostic.note {
                println!("  note: {}", note);
            }
        }
    }
}

/// Project directory argument, defaulting to the working directory.
fn resolve_path(path: Option<String>) -> PathBuf {
    path.map(PathBuf::from)
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}
