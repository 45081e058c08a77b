//! adt - command-line workbench for ABAP repository objects
//!
//! Reads, searches, creates and updates objects on an SAP system through
//! the ADT REST services.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use adt_client::ConnectionCache;
use adt_core::{ConnectionProfile, NewObject, ObjectKind};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod output;

use commands::CommandOutput;
use config::{ConnectionArgs, FileConfig};

/// Exit status after SIGINT
const EXIT_INTERRUPTED: u8 = 130;

/// adt - ABAP Development Tools client
#[derive(Parser, Debug)]
#[command(name = "adt")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Warnings and errors only
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full handshake and report the session
    Connect,

    /// Show package and application component of a transaction code
    Transaction {
        /// Transaction code
        code: String,
    },

    /// Print the source of an object
    Get {
        /// Object type (PROG, CLAS, FUNC, INCL, INTF, STRU, TABL, DOMA, ...)
        object_type: ObjectKind,
        /// Object name
        name: String,
        /// Extra arguments, e.g. the function group of a function module
        args: Vec<String>,
    },

    /// Quick search by name pattern
    Search {
        /// Name pattern; a trailing `*` is added
        pattern: String,
        /// Only keep these object types
        #[arg(short = 't', long = "type")]
        types: Vec<ObjectKind>,
    },

    /// List packages
    Packages {
        /// Name pattern, all packages when omitted
        pattern: Option<String>,
    },

    /// List the objects of a package
    Package {
        /// Package name
        name: String,
    },

    /// Create an object, set its source and activate it
    Create {
        /// Object type (PROG, CLAS, INCL, INTF)
        object_type: ObjectKind,
        /// Object name
        name: String,
        /// Short description
        #[arg(short, long, default_value = "")]
        description: String,
        /// Target package
        #[arg(short, long, default_value = adt_core::DEFAULT_PACKAGE)]
        package: String,
        /// Source file, `-` for stdin
        #[arg(short, long)]
        source: Option<String>,
    },

    /// Replace the source of an object and activate it
    Update {
        /// Object type (PROG, CLAS, FUNC, INCL, INTF)
        object_type: ObjectKind,
        /// Object name
        name: String,
        /// Source file, `-` for stdin
        source: String,
        /// Function group of a function module
        #[arg(short, long)]
        group: Option<String>,
    },

    /// Show table rows through the data-preview service
    Preview {
        /// Table name
        table: String,
        /// Maximum number of rows
        #[arg(short = 'n', long, default_value = "100")]
        max_rows: usize,
    },

    /// Describe a domain or data element
    TypeInfo {
        /// Type name
        name: String,
    },
}

fn init_tracing(cli: &Cli) {
    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    if cli.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn load_profile(cli: &Cli) -> Result<ConnectionProfile> {
    let file = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    Ok(config::resolve(&cli.connection, &file)?)
}

async fn run(cli: &Cli, cache: &ConnectionCache) -> Result<CommandOutput> {
    let profile = load_profile(cli).context("invalid configuration")?;
    let client = cache
        .get_or_create(&profile)
        .await
        .with_context(|| format!("cannot connect to {}", profile.host()))?;
    let service = client.as_ref();

    match &cli.command {
        Commands::Connect => {
            commands::connect(service, profile.host(), profile.username(), profile.client())
        }
        Commands::Transaction { code } => commands::transaction(service, code).await,
        Commands::Get {
            object_type,
            name,
            args,
        } => commands::get(service, *object_type, name, args).await,
        Commands::Search { pattern, types } => commands::search(service, pattern, types).await,
        Commands::Packages { pattern } => commands::packages(service, pattern.as_deref()).await,
        Commands::Package { name } => commands::package(service, name).await,
        Commands::Create {
            object_type,
            name,
            description,
            package,
            source,
        } => {
            let mut request = NewObject::new(*object_type, name)
                .with_description(description)
                .with_package(package);
            if let Some(location) = source {
                request = request.with_source(commands::read_source(location)?);
            }
            commands::create(service, &request).await
        }
        Commands::Update {
            object_type,
            name,
            source,
            group,
        } => {
            let source = commands::read_source(source)?;
            let args: Vec<String> = group.iter().cloned().collect();
            commands::update(service, *object_type, name, &args, &source).await
        }
        Commands::Preview { table, max_rows } => {
            commands::preview(service, table, *max_rows).await
        }
        Commands::TypeInfo { name } => commands::type_info(service, name).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    let cache = Arc::new(ConnectionCache::new());

    let outcome = tokio::select! {
        outcome = run(&cli, &cache) => Some(outcome),
        _ = tokio::signal::ctrl_c() => None,
    };
    cache.clear().await;

    let Some(outcome) = outcome else {
        tracing::warn!("interrupted");
        return ExitCode::from(EXIT_INTERRUPTED);
    };

    let rendered = outcome.and_then(|result| Ok((output::render(&result, cli.json)?, result)));
    match rendered {
        Ok((text, result)) => {
            print!("{text}");
            if result.has_errors() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_type_aliases_and_flags() {
        let cli = Cli::try_parse_from([
            "adt", "--json", "search", "ZHEL", "--type", "PROG", "-t", "clas",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Search { pattern, types } => {
                assert_eq!(pattern, "ZHEL");
                assert_eq!(types, vec![ObjectKind::Program, ObjectKind::Class]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn get_collects_extra_args() {
        let cli = Cli::try_parse_from(["adt", "get", "FUNC", "Z_FM", "ZGROUP"]).unwrap();
        match cli.command {
            Commands::Get {
                object_type, args, ..
            } => {
                assert_eq!(object_type, ObjectKind::FunctionModule);
                assert_eq!(args, vec!["ZGROUP".to_string()]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_usage_error() {
        let err = Cli::try_parse_from(["adt", "get", "WIDGET", "X"]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn parses_transaction_code() {
        let cli = Cli::try_parse_from(["adt", "transaction", "SE38"]).unwrap();
        assert!(matches!(cli.command, Commands::Transaction { ref code } if code == "SE38"));
    }

    #[test]
    fn create_defaults_to_local_package() {
        let cli = Cli::try_parse_from(["adt", "create", "PROG", "ZNEW"]).unwrap();
        match cli.command {
            Commands::Create {
                package, source, ..
            } => {
                assert_eq!(package, "$TMP");
                assert_eq!(source, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
