//! xcelsql CLI - resolve sheet SQL and evaluate column expressions

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use xcelsql::prelude::*;
use xcelsql::{is_param_name, list_functions};

#[derive(Parser)]
#[command(name = "xcelsql")]
#[command(
    author,
    version,
    about = "SQL over spreadsheet sheets: query resolution and column expressions"
)]
struct Cli {
    /// Log resolution steps to stderr (repeat for more detail)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// JSON settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the SQL a query resolves to
    Resolve {
        /// Sheet spec `Name[:header_row|auto]`, in scope order
        #[arg(short, long = "sheet", required = true)]
        sheets: Vec<String>,

        /// Query with `{Sheet Name}` placeholders (default: select the first sheet)
        #[arg(short, long)]
        query: Option<String>,

        /// Require placeholders and strict sheet names
        #[arg(long)]
        strict: bool,

        /// SQL parameter `name=value`
        #[arg(short, long = "param")]
        params: Vec<String>,

        /// SQL parameter bound to NULL
        #[arg(long = "null-param")]
        null_params: Vec<String>,

        /// Wrap the query in an outer row limit
        #[arg(short, long)]
        limit: Option<usize>,

        /// Project these columns of the first sheet when no query is given
        #[arg(long = "select")]
        select: Vec<String>,

        /// Also print the identifier for every sheet
        #[arg(long)]
        tables: bool,
    },

    /// Rewrite double-quoted sheet names in session SQL to their aliases
    Rewrite {
        /// Sheet names known to the session
        #[arg(short, long = "sheet", required = true)]
        sheets: Vec<String>,

        /// SQL text
        sql: String,
    },

    /// Evaluate one expression against a row of values
    Eval {
        /// Expression text
        expression: String,

        /// Row value `name=value` (int, float, True/False, None, else string)
        #[arg(short = 's', long = "set")]
        values: Vec<String>,

        /// Fail instead of printing `[Error: ...]`
        #[arg(long)]
        strict: bool,

        /// Enable the permissive fallback evaluator
        #[arg(long)]
        allow_eval: bool,
    },

    /// List available expression functions
    Functions,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    debug!(?config, "effective settings");

    match cli.command {
        Commands::Resolve {
            sheets,
            query,
            strict,
            params,
            null_params,
            limit,
            select,
            tables,
        } => {
            let mut request = QueryRequest::new(parse_sheet_specs(&sheets)?)
                .with_strict(strict || config.strict)
                .with_limit(limit.or(config.limit))
                .with_select_columns(select);
            if let Some(query) = query {
                request = request.with_query(query);
            }
            let params = build_params(&params, &null_params)?;
            if !params.is_empty() {
                request = request.with_params(params);
            }
            resolve(&request, tables)
        }
        Commands::Rewrite { sheets, sql } => {
            let session = Session::with_sheets(config, sheets);
            println!("{}", session.prepare(&sql));
            Ok(())
        }
        Commands::Eval {
            expression,
            values,
            strict,
            allow_eval,
        } => eval(
            &expression,
            &values,
            strict || config.strict,
            allow_eval || config.allow_eval,
        ),
        Commands::Functions => {
            for (name, doc) in list_functions() {
                println!("{}\t{}", name, doc);
            }
            Ok(())
        }
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read '{}'", path.display()))?;
            Config::from_json_str(&text)
                .with_context(|| format!("Invalid settings in '{}'", path.display()))?
        }
        None => Config::default(),
    };
    config.apply_process_env();
    config.validate().context("Invalid settings")?;
    Ok(config)
}

fn parse_sheet_specs(raw: &[String]) -> Result<Vec<SheetSpec>> {
    raw.iter()
        .map(|spec| SheetSpec::parse(spec).with_context(|| format!("Bad --sheet '{}'", spec)))
        .collect()
}

/// Split `name=value`; the value may itself contain `=`
fn parse_assignment(raw: &str) -> Result<(&str, &str)> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim(), value)),
        _ => bail!("Expected name=value, got '{}'", raw),
    }
}

fn build_params(values: &[String], nulls: &[String]) -> Result<SqlParams> {
    let mut params = SqlParams::new();
    for raw in values {
        let (name, value) = parse_assignment(raw)?;
        if !is_param_name(name) {
            bail!("Invalid parameter name '{}'", name);
        }
        params.insert(name.to_string(), Some(value.to_string()));
    }
    for name in nulls {
        if !is_param_name(name) {
            bail!("Invalid parameter name '{}'", name);
        }
        params.insert(name.clone(), None);
    }
    Ok(params)
}

fn resolve(request: &QueryRequest, show_tables: bool) -> Result<()> {
    let mut mapper = IdentifierMapper::new();
    let prepared = prepare_query(request, &mut mapper).context("Query rejected")?;

    if show_tables {
        for (identifier, sheet) in &prepared.tables {
            println!("-- {} <- \"{}\"", identifier, sheet);
        }
    }
    println!("{}", prepared.sql);
    Ok(())
}

fn eval(expression: &str, values: &[String], strict: bool, allow_eval: bool) -> Result<()> {
    let mut row = Row::new();
    for raw in values {
        let (name, value) = parse_assignment(raw)?;
        row.insert(name.to_string(), Value::infer(value));
    }

    let interpreter = Interpreter::new().allow_fallback(allow_eval);
    let value = interpreter
        .evaluate_row(expression, &row, strict)
        .with_context(|| format!("Failed to evaluate '{}'", expression))?;
    println!("{}", value);
    Ok(())
}
