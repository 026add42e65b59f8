//! Retriever CLI: find, fetch, and download published datasets.

mod commands;
mod session;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use session::Session;

#[derive(Parser)]
#[command(name = "retriever", version, about = "Find and download published datasets")]
struct Cli {
    /// Settings file (default: <retriever home>/retriever.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Never contact the network
    #[arg(long, global = true)]
    offline: bool,
    /// Show debug output
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the raw files of one or more datasets
    Download {
        /// Dataset name, `all`, or a glob such as `breed-*`
        dataset: String,
        /// Directory to download into
        #[arg(long, default_value = "./")]
        path: PathBuf,
        /// Subdirectory of --path to download into
        #[arg(long)]
        sub_dir: Option<String>,
        /// Suppress progress output
        #[arg(short, long)]
        quiet: bool,
        /// Stop at the first failing dataset
        #[arg(long)]
        debug: bool,
        /// Download raw files again even if present
        #[arg(long)]
        no_cache: bool,
    },
    /// List locally available datasets
    Ls {
        /// Only datasets with any of these keywords
        #[arg(short, long, num_args = 1..)]
        keywords: Vec<String>,
        /// Only datasets under any of these licenses
        #[arg(short, long, num_args = 1..)]
        licenses: Vec<String>,
        /// Show title, keywords, and licenses
        #[arg(long)]
        long: bool,
    },
    /// Search the upstream repository
    Search {
        /// Keywords to search for
        #[arg(short, long, num_args = 1..)]
        keywords: Vec<String>,
        /// Licenses to search for
        #[arg(short, long, num_args = 1..)]
        licenses: Vec<String>,
    },
    /// Rescan script directories
    Reload,
    /// Fetch a single script from upstream into the script cache
    Fetch {
        /// Dataset name
        name: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "debug"
    } else {
        "warn,retriever=info,retriever_registry=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let session = Session::open(cli.config.as_deref(), cli.offline)?;

    match cli.command {
        Commands::Download {
            dataset,
            path,
            sub_dir,
            quiet,
            debug,
            no_cache,
        } => {
            let mut request = retriever_registry::DownloadRequest::new(dataset)
                .path(path)
                .quiet(quiet)
                .debug(debug)
                .use_cache(!no_cache);
            if let Some(sub_dir) = sub_dir {
                request = request.sub_dir(sub_dir);
            }
            commands::download::run(&session, &request)
        }

        Commands::Ls {
            keywords,
            licenses,
            long,
        } => commands::ls::run(&session, &keywords, &licenses, long),

        Commands::Search { keywords, licenses } => {
            commands::search::run(&session, &keywords, &licenses)
        }

        Commands::Reload => commands::reload::run(&session),

        Commands::Fetch { name } => commands::fetch::run(&session, &name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_download_flags() {
        let cli = Cli::parse_from([
            "retriever",
            "download",
            "breed-*",
            "--path",
            "/data",
            "--sub-dir",
            "raw",
            "--no-cache",
            "--debug",
            "--offline",
        ]);
        assert!(cli.offline);
        match cli.command {
            Commands::Download {
                dataset,
                path,
                sub_dir,
                no_cache,
                debug,
                quiet,
            } => {
                assert_eq!(dataset, "breed-*");
                assert_eq!(path, PathBuf::from("/data"));
                assert_eq!(sub_dir.as_deref(), Some("raw"));
                assert!(no_cache && debug && !quiet);
            }
            _ => panic!("expected download"),
        }
    }

    #[test]
    fn parses_ls_filters() {
        let cli = Cli::parse_from(["retriever", "ls", "-k", "birds", "plants", "-l", "CC0-1.0"]);
        match cli.command {
            Commands::Ls {
                keywords,
                licenses,
                long,
            } => {
                assert_eq!(keywords, vec!["birds", "plants"]);
                assert_eq!(licenses, vec!["CC0-1.0"]);
                assert!(!long);
            }
            _ => panic!("expected ls"),
        }
    }

    #[test]
    fn download_path_defaults_to_cwd() {
        let cli = Cli::parse_from(["retriever", "download", "iris"]);
        match cli.command {
            Commands::Download { path, .. } => assert_eq!(path, PathBuf::from("./")),
            _ => panic!("expected download"),
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
