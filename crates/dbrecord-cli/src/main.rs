//! dbrecord CLI - schema inference, validation and split planning for database dialects.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use dbrecord::transfer::SplitPlan;
use dbrecord::{
    infer_schema, validate_schema, ColumnMetadata, Config, DialectCatalog, DialectProfile, Field,
    RecordError, SchemaRole,
};
use serde::de::DeserializeOwned;
use tracing::{debug, info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "dbrecord")]
#[command(about = "Cross-dialect schema inference and validation")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dialect name or alias (overrides the configuration file)
    #[arg(short, long)]
    dialect: Option<String>,

    /// Output JSON to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "warn")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Infer a universal schema from column metadata
    Infer {
        /// Column metadata file (JSON or YAML list)
        #[arg(long)]
        columns: PathBuf,
    },

    /// Validate a declared schema against column metadata
    Validate {
        /// Column metadata file (JSON or YAML list)
        #[arg(long)]
        columns: PathBuf,

        /// Declared schema file (JSON or YAML list of fields)
        #[arg(long)]
        schema: PathBuf,

        /// Whether records are read from (source) or written to (sink) the columns
        #[arg(long, value_enum, default_value = "source")]
        role: Role,
    },

    /// Escape identifiers with the dialect's quoting
    Escape {
        /// Schema qualifying every name
        #[arg(long, default_value = "")]
        schema: String,

        /// Identifiers to escape
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Print the split queries of the configured import
    Splits {
        /// Minimum split column value returned by the bounding query
        #[arg(long, allow_negative_numbers = true)]
        min: Option<i64>,

        /// Maximum split column value returned by the bounding query
        #[arg(long, allow_negative_numbers = true)]
        max: Option<i64>,
    },

    /// List the available dialects
    Dialects,
}

#[derive(Clone, Copy, ValueEnum)]
enum Role {
    Source,
    Sink,
}

impl From<Role> for SchemaRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Source => SchemaRole::Source,
            Role::Sink => SchemaRole::Sink,
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

fn run() -> Result<(), RecordError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let catalog = DialectCatalog::with_builtins();
    let config = match &cli.config {
        Some(path) => {
            let config = Config::load(path)?;
            info!("Loaded configuration from {:?}", path);
            Some(config)
        }
        None => None,
    };

    match cli.command {
        Commands::Infer { columns } => {
            let profile = select_profile(&catalog, &cli.dialect, config.as_ref())?;
            let columns: Vec<ColumnMetadata> = read_input(&columns)?;
            let fields = infer_schema(&profile, &columns)?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&fields)?);
            } else {
                for field in &fields {
                    println!("{}: {}", field.name, field.schema);
                }
            }
        }

        Commands::Validate {
            columns,
            schema,
            role,
        } => {
            let profile = select_profile(&catalog, &cli.dialect, config.as_ref())?;
            let columns: Vec<ColumnMetadata> = read_input(&columns)?;
            let fields: Vec<Field> = read_input(&schema)?;
            let failures = validate_schema(&profile, &fields, &columns, role.into());

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&failures)?);
            }
            if !failures.is_empty() {
                return Err(RecordError::Validation(failures));
            }
            if !cli.output_json {
                println!("Schema is valid ({} fields)", fields.len());
            }
        }

        Commands::Escape { schema, names } => {
            let profile = select_profile(&catalog, &cli.dialect, config.as_ref())?;
            let escaped = names
                .iter()
                .map(|name| profile.qualify(&schema, name))
                .collect::<Result<Vec<_>, _>>()?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&escaped)?);
            } else {
                for name in escaped {
                    println!("{}", name);
                }
            }
        }

        Commands::Splits { min, max } => {
            let config = config.ok_or_else(|| {
                RecordError::Config("--config is required for splits".to_string())
            })?;
            let source = config.source.ok_or_else(|| {
                RecordError::Config("the configuration has no source section".to_string())
            })?;

            let plan = SplitPlan::new(
                source.import_query,
                source.split_by.unwrap_or_default(),
                source.num_splits,
            )?
            .with_null_split(source.include_null_split);

            let queries = match (min, max) {
                (Some(min), Some(max)) => plan.queries(min, max),
                (None, None) => plan.queries_without_bounds(),
                _ => {
                    return Err(RecordError::Config(
                        "--min and --max must be given together".to_string(),
                    ))
                }
            };
            debug!(queries = queries.len(), "planned splits");

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&queries)?);
            } else {
                for query in queries {
                    println!("{}", query);
                }
            }
        }

        Commands::Dialects => {
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&catalog.names())?);
            } else {
                for name in catalog.names() {
                    println!("{}", name);
                }
            }
        }
    }

    Ok(())
}

/// The `--dialect` flag wins over the configuration file; `generic` otherwise.
fn select_profile(
    catalog: &DialectCatalog,
    flag: &Option<String>,
    config: Option<&Config>,
) -> Result<Arc<DialectProfile>, RecordError> {
    match (flag, config) {
        (Some(name), _) => catalog.require(name),
        (None, Some(config)) => config.profile(catalog),
        (None, None) => catalog.require("generic"),
    }
}

/// Read a JSON (`.json`) or YAML (anything else) input file.
fn read_input<T: DeserializeOwned>(path: &Path) -> Result<T, RecordError> {
    let content = std::fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        Ok(serde_json::from_str(&content)?)
    } else {
        Ok(serde_yaml::from_str(&content)?)
    }
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so stdout stays parseable.
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
