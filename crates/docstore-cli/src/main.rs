// crates/docstore-cli/src/main.rs
// ============================================================================
// Module: Docstore CLI Entry Point
// Description: Command dispatcher for bootstrap, seeding, and query workflows.
// Purpose: Provide an operator CLI over the typed document access layer.
// Dependencies: clap, docstore-config, docstore-core, serde_json, thiserror.
// ============================================================================

//! ## Overview
//! The docstore CLI loads a config file, opens the configured document store,
//! and runs one access operation per invocation: reconcile the bootstrap user,
//! seed a collection from JSON, run a query template, list or delete records.
//! All user-facing strings are routed through the message catalog. Inputs are
//! untrusted; file reads are size-bounded and query parameters are bound,
//! never spliced into query text.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use docstore_cli::t;
use docstore_config::AccessComponents;
use docstore_config::DocstoreConfig;
use docstore_core::CallContext;
use docstore_core::DeleteMode;
use docstore_core::Document;
use docstore_core::DocumentStore;
use docstore_core::ListFilter;
use docstore_core::ParamValue;
use docstore_core::QueryParameters;
use docstore_core::ReconcileOutcome;
use docstore_core::Record;
use docstore_core::Schema;
use docstore_core::resolve;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of a seed JSON file.
const MAX_SEED_BYTES: usize = 8 * 1024 * 1024;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "docstore", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Config file path (defaults to docstore.toml or `DOCSTORE_CONFIG`).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Reconcile the configured bootstrap user.
    User {
        /// Selected user subcommand.
        #[command(subcommand)]
        command: UserCommand,
    },
    /// Upsert records from a JSON array file.
    Seed(SeedCommand),
    /// Run a query template against a collection.
    Query(QueryCommand),
    /// List a collection ordered by id.
    List(ListCommand),
    /// Delete one record by id and partition key.
    Delete(DeleteCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Bootstrap user subcommands.
#[derive(Subcommand, Debug, Clone, Copy)]
enum UserCommand {
    /// Create the user record if it is absent.
    Create,
    /// Rewrite the user's name and email if the record exists.
    Update,
    /// Delete the user record if it exists.
    Delete,
    /// Print the user record as JSON.
    Show,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate the config file and exit.
    Validate,
}

/// Arguments for seeding.
#[derive(Args, Debug)]
struct SeedCommand {
    /// Target collection name.
    collection: String,
    /// JSON file holding an array of record objects.
    #[arg(value_name = "FILE")]
    file: PathBuf,
}

/// Arguments for queries.
#[derive(Args, Debug)]
struct QueryCommand {
    /// Target collection name.
    collection: String,
    /// Query template; must include `c.collection_name = @collection_name`.
    template: String,
    /// Bound parameter as `@name=value`; values parse as JSON scalars, else text.
    #[arg(long = "param", value_name = "@NAME=VALUE")]
    params: Vec<String>,
}

/// Arguments for listing.
#[derive(Args, Debug)]
struct ListCommand {
    /// Target collection name.
    collection: String,
    /// Include soft-deleted records.
    #[arg(long, action = ArgAction::SetTrue)]
    all: bool,
}

/// Arguments for deletion.
#[derive(Args, Debug)]
struct DeleteCommand {
    /// Target collection name.
    collection: String,
    /// Record id.
    id: String,
    /// Record partition key.
    partition_key: String,
    /// Mark the record deleted instead of removing it.
    #[arg(long, action = ArgAction::SetTrue)]
    soft: bool,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for catalog error messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a catalog message.
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();

    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&t!("main.version", version = version))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    let config_path = cli.config.as_deref();
    match command {
        Commands::Config {
            command: ConfigCommand::Validate,
        } => command_config_validate(config_path),
        Commands::User {
            command,
        } => with_session(config_path, |session| command_user(session, command)),
        Commands::Seed(command) => {
            with_session(config_path, |session| command_seed(session, &command))
        }
        Commands::Query(command) => {
            with_session(config_path, |session| command_query(session, &command))
        }
        Commands::List(command) => {
            with_session(config_path, |session| command_list(session, &command))
        }
        Commands::Delete(command) => {
            with_session(config_path, |session| command_delete(session, &command))
        }
    }
}

/// Prints CLI help output.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(())
}

// ============================================================================
// SECTION: Session
// ============================================================================

/// Loaded config plus wired access components for one invocation.
struct Session {
    /// Validated configuration.
    config: DocstoreConfig,
    /// Access components over the configured store.
    components: AccessComponents,
    /// Deadline shared by every store call in this invocation.
    ctx: CallContext,
}

/// Loads config, opens the store, runs `command`, and closes the store.
fn with_session(
    config_path: Option<&Path>,
    command: impl FnOnce(&Session) -> CliResult<ExitCode>,
) -> CliResult<ExitCode> {
    let config = DocstoreConfig::load(config_path)
        .map_err(|err| CliError::new(t!("config.load_failed", error = err)))?;
    let store = config
        .open_store()
        .map_err(|err| CliError::new(t!("store.open_failed", error = err)))?;
    let audit = match config.audit_sink() {
        Ok(audit) => audit,
        Err(err) => {
            let _ = store.close();
            return Err(CliError::new(t!("audit.open_failed", error = err)));
        }
    };
    let components = AccessComponents::build(&config, store, audit);
    let ctx = config.call_context();
    let session = Session {
        config,
        components,
        ctx,
    };
    let result = command(&session);
    let closed = session.components.store.close();
    let code = result?;
    closed.map_err(|err| CliError::new(t!("store.close_failed", error = err)))?;
    Ok(code)
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Executes the config validation command.
fn command_config_validate(config_path: Option<&Path>) -> CliResult<ExitCode> {
    let _config = DocstoreConfig::load(config_path)
        .map_err(|err| CliError::new(t!("config.load_failed", error = err)))?;
    write_stdout_line(&t!("config.validate.ok"))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: User Commands
// ============================================================================

/// Executes a bootstrap user subcommand.
fn command_user(session: &Session, command: UserCommand) -> CliResult<ExitCode> {
    let identity = session
        .config
        .identity()
        .map_err(|err| CliError::new(t!("user.identity_failed", error = err)))?;
    let reconciler = &session.components.reconciler;
    let ctx = &session.ctx;
    let (action, result) = match command {
        UserCommand::Create => ("create", reconciler.ensure_created(ctx, &identity)),
        UserCommand::Update => ("update", reconciler.ensure_updated(ctx, &identity)),
        UserCommand::Delete => ("delete", reconciler.ensure_removed(ctx, &identity)),
        UserCommand::Show => {
            let user = reconciler
                .show(ctx, &identity)
                .map_err(|err| CliError::new(t!("user.failed", action = "show", error = err)))?;
            return match user {
                Some(user) => {
                    write_record(&user.into_record())?;
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    write_stdout_line(&t!("user.outcome.not_found", user_id = identity.user_id))
                        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
                    Ok(ExitCode::FAILURE)
                }
            };
        }
    };
    let outcome =
        result.map_err(|err| CliError::new(t!("user.failed", action = action, error = err)))?;
    let user_id = identity.user_id.as_str();
    let message = match outcome {
        ReconcileOutcome::Created => t!("user.outcome.created", user_id = user_id),
        ReconcileOutcome::AlreadyPresent => t!("user.outcome.already_present", user_id = user_id),
        ReconcileOutcome::Updated => t!("user.outcome.updated", user_id = user_id),
        ReconcileOutcome::Removed => t!("user.outcome.removed", user_id = user_id),
        ReconcileOutcome::NotFound => t!("user.outcome.not_found", user_id = user_id),
    };
    write_stdout_line(&message).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Record Commands
// ============================================================================

/// Executes the `seed` command.
fn command_seed(session: &Session, command: &SeedCommand) -> CliResult<ExitCode> {
    let collection = resolve(&command.collection)
        .map_err(|err| CliError::new(t!("collection.resolve_failed", error = err)))?;
    let value = read_json_with_limit(&command.file, "seed file", MAX_SEED_BYTES)?;
    let rows = seed_rows(value, &command.file)?;
    let count = session
        .components
        .mutator
        .upsert_raw(&session.ctx, collection, rows)
        .map_err(|err| CliError::new(t!("seed.failed", error = err)))?;
    write_stdout_line(&t!("seed.ok", count = count, collection = collection.as_str()))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the `query` command; prints one JSON document per line.
fn command_query(session: &Session, command: &QueryCommand) -> CliResult<ExitCode> {
    let parameters = parse_params(&command.params)?;
    let records = session
        .components
        .executor
        .execute_named(&session.ctx, &command.collection, &command.template, &parameters)
        .map_err(|err| CliError::new(t!("query.failed", error = err)))?;
    for record in &records {
        write_record(record)?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Executes the `list` command.
fn command_list(session: &Session, command: &ListCommand) -> CliResult<ExitCode> {
    let collection = resolve(&command.collection)
        .map_err(|err| CliError::new(t!("collection.resolve_failed", error = err)))?;
    let filter = if command.all { ListFilter::All } else { ListFilter::Active };
    let records = session
        .components
        .lookup
        .list(&session.ctx, collection, filter)
        .map_err(|err| CliError::new(t!("list.failed", error = err)))?;
    for record in &records {
        write_record(record)?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Executes the `delete` command.
fn command_delete(session: &Session, command: &DeleteCommand) -> CliResult<ExitCode> {
    let collection = resolve(&command.collection)
        .map_err(|err| CliError::new(t!("collection.resolve_failed", error = err)))?;
    let mode = if command.soft { DeleteMode::Soft } else { DeleteMode::Hard };
    session
        .components
        .mutator
        .delete(&session.ctx, collection, &command.id, &command.partition_key, mode)
        .map_err(|err| CliError::new(t!("delete.failed", error = err)))?;
    let message = match mode {
        DeleteMode::Soft => {
            t!("delete.soft_ok", collection = collection.as_str(), id = command.id)
        }
        DeleteMode::Hard => t!("delete.ok", collection = collection.as_str(), id = command.id),
    };
    write_stdout_line(&message).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Input Helpers
// ============================================================================

/// Errors returned by bounded file reads.
#[derive(Debug)]
enum ReadLimitError {
    /// File I/O failure.
    Io(std::io::Error),
    /// File size exceeds the configured limit.
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let metadata = file.metadata().map_err(ReadLimitError::Io)?;
    let size = metadata.len();
    let limit = u64::try_from(max_bytes).map_err(|_| ReadLimitError::TooLarge {
        size,
        limit: max_bytes,
    })?;
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }

    let mut limited = file.take(limit.saturating_add(1));
    let mut bytes = Vec::new();
    limited.read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        let actual = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
        return Err(ReadLimitError::TooLarge {
            size: actual,
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

/// Reads and parses a bounded JSON file.
fn read_json_with_limit(path: &Path, kind: &str, max_bytes: usize) -> CliResult<Value> {
    let bytes = read_bytes_with_limit(path, max_bytes).map_err(|err| match err {
        ReadLimitError::Io(err) => CliError::new(t!(
            "input.read_failed",
            kind = kind,
            path = path.display(),
            error = err
        )),
        ReadLimitError::TooLarge {
            size,
            limit,
        } => CliError::new(t!(
            "input.read_too_large",
            kind = kind,
            path = path.display(),
            size = size,
            limit = limit
        )),
    })?;
    serde_json::from_slice(&bytes).map_err(|err| {
        CliError::new(t!("input.parse_failed", kind = kind, path = path.display(), error = err))
    })
}

/// Splits a seed payload into raw documents.
fn seed_rows(value: Value, path: &Path) -> CliResult<Vec<Document>> {
    let not_array = || CliError::new(t!("seed.not_array", path = path.display()));
    let Value::Array(items) = value else {
        return Err(not_array());
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(document) => Ok(document),
            _ => Err(not_array()),
        })
        .collect()
}

/// Parses repeated `--param @name=value` flags into bound parameters.
fn parse_params(raw: &[String]) -> CliResult<QueryParameters> {
    let mut parameters = QueryParameters::new();
    for entry in raw {
        let (name, value) = parse_param(entry)?;
        parameters
            .insert(name, value)
            .map_err(|err| CliError::new(t!("query.params_failed", error = err)))?;
    }
    Ok(parameters)
}

/// Parses one `@name=value` flag; the value is a JSON scalar or plain text.
fn parse_param(entry: &str) -> CliResult<(String, ParamValue)> {
    let invalid = || CliError::new(t!("query.param_invalid", param = entry));
    let (name, raw_value) = entry.split_once('=').ok_or_else(invalid)?;
    if !name.starts_with('@') || name.len() < 2 {
        return Err(invalid());
    }
    let value = match serde_json::from_str::<Value>(raw_value) {
        Ok(Value::Null) => ParamValue::Null,
        Ok(Value::Bool(flag)) => ParamValue::Bool(flag),
        Ok(Value::Number(number)) => match (number.as_i64(), number.as_f64()) {
            (Some(int), _) => ParamValue::Int(int),
            (None, Some(float)) => ParamValue::Float(float),
            (None, None) => ParamValue::Text(raw_value.to_string()),
        },
        Ok(Value::String(text)) => ParamValue::Text(text),
        Ok(Value::Array(_) | Value::Object(_)) | Err(_) => ParamValue::Text(raw_value.to_string()),
    };
    Ok((name.to_string(), value))
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a record as one line of compact JSON.
fn write_record(record: &Record) -> CliResult<()> {
    let document = record
        .to_document()
        .map_err(|err| CliError::new(t!("record.serialize_failed", error = err)))?;
    let line = serde_json::to_string(&document)
        .map_err(|err| CliError::new(t!("record.serialize_failed", error = err)))?;
    write_stdout_line(&line).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    let stream_label = match stream {
        "stdout" => t!("output.stream.stdout"),
        "stderr" => t!("output.stream.stderr"),
        _ => t!("output.stream.unknown"),
    };
    t!("output.write_failed", stream = stream_label, error = error)
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
