//! CLI entry point for quire

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quire::commands::build::BuildOptions;
use quire::commands::list::ListKind;

#[derive(Parser)]
#[command(name = "quire")]
#[command(version)]
#[command(about = "A static site builder for topic-organized Markdown notes", long_about = None)]
struct Cli {
    /// Site directory (defaults to current directory)
    #[arg(short, long, global = true)]
    source: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scaffold a new site
    Init {
        /// Directory to initialize (defaults to the site directory)
        folder: Option<PathBuf>,
    },

    /// Create a content file from an archetype
    New {
        /// Path inside the content directory, e.g. go/errors.md
        path: String,

        /// Title (defaults to one derived from the file name)
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Build the site into the public directory
    #[command(alias = "b")]
    Build {
        /// Include drafts
        #[arg(short = 'D', long)]
        drafts: bool,

        /// Include pages with a publish date in the future
        #[arg(short = 'F', long)]
        future: bool,

        /// Include expired pages
        #[arg(short = 'E', long)]
        expired: bool,

        /// Override the configured base URL
        #[arg(short, long)]
        base_url: Option<String>,

        /// Rebuild on file changes
        #[arg(short, long)]
        watch: bool,
    },

    /// List content
    List {
        #[arg(value_enum, default_value = "all")]
        kind: ListKind,
    },

    /// Lint front matter, links and headings
    Check {
        /// Lint drafts as published pages
        #[arg(short = 'D', long)]
        drafts: bool,

        /// Fail on warnings too
        #[arg(long)]
        deny_warnings: bool,
    },

    /// Remove the public directory
    Clean,

    /// Build and serve the site with live reload
    #[command(alias = "s")]
    Server {
        /// Port to listen on
        #[arg(short, long, default_value = "1313")]
        port: u16,

        /// Address to bind to
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,

        /// Include drafts
        #[arg(short = 'D', long)]
        drafts: bool,

        /// Serve without watching for changes
        #[arg(long)]
        no_watch: bool,

        /// Open browser automatically
        #[arg(short, long)]
        open: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug { "quire=debug,info" } else { "quire=info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine base directory
    let base_dir = match cli.source {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to read the current directory")?,
    };

    match cli.command {
        Commands::Init { folder } => {
            let target_dir = match folder {
                Some(folder) if folder.is_absolute() => folder,
                Some(folder) => base_dir.join(folder),
                None => base_dir,
            };
            tracing::info!("Initializing site in {:?}", target_dir);
            quire::commands::init::init_site(&target_dir)?;
            println!("Initialized site in {:?}", target_dir);
        }

        Commands::New { path, title } => {
            let site = quire::Quire::new(&base_dir)?;
            let created = quire::commands::new::create_content(&site, &path, title.as_deref())?;
            println!("Created: {:?}", created);
        }

        Commands::Build {
            drafts,
            future,
            expired,
            base_url,
            watch,
        } => {
            let options = BuildOptions {
                drafts,
                future,
                expired,
                base_url,
            };
            let site = options.open(&base_dir)?;
            let summary = site.build()?;
            println!("Built: {}", summary);

            if watch {
                tokio::task::spawn_blocking(move || {
                    quire::commands::build::watch(&base_dir, &options, |summary| {
                        println!("Rebuilt: {}", summary);
                    })
                })
                .await??;
            }
        }

        Commands::List { kind } => {
            let site = quire::Quire::new(&base_dir)?;
            quire::commands::list::run(&site, kind)?;
        }

        Commands::Check {
            drafts,
            deny_warnings,
        } => {
            let mut site = quire::Quire::new(&base_dir)?;
            site.config.build_drafts |= drafts;
            let deny_warnings = deny_warnings || site.config.lint.deny_warnings;

            let report = site.check()?;
            println!("{}", report);
            if report.fails(deny_warnings) {
                std::process::exit(1);
            }
        }

        Commands::Clean => {
            let site = quire::Quire::new(&base_dir)?;
            site.clean()?;
            println!("Cleaned successfully!");
        }

        Commands::Server {
            port,
            bind,
            drafts,
            no_watch,
            open,
        } => {
            let options = BuildOptions {
                drafts,
                base_url: Some(format!("http://{}:{}/", bind, port)),
                ..Default::default()
            };

            // Build first
            let site = options.open(&base_dir)?;
            let summary = site.build()?;
            println!("Built: {}", summary);

            quire::server::start(&base_dir, &options, &bind, port, !no_watch, open).await?;
        }
    }

    Ok(())
}
