use std::{
    io::{self, Read},
    path::PathBuf,
};

use clap::{Parser as ClapParser, Subcommand};
use saql::{
    ParserOptions,
    cli::{self, CliError, CompileOptions, TestOptions},
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "saql")]
#[command(about = "saql - compile security analytics queries between query strings and JSON")]
#[command(version)]
struct Cli {
    /// Named-entity registry: {"properties": {name: id}, "values": {name: id}}
    #[arg(long, global = true)]
    registry: Option<PathBuf>,

    /// Deepest parenthesis nesting accepted (overrides SAQL_MAX_DEPTH)
    #[arg(long, global = true)]
    max_depth: Option<usize>,

    /// Reduction step ceiling per parse (overrides SAQL_MAX_ITERATIONS)
    #[arg(long, global = true)]
    max_iterations: Option<usize>,

    /// Pretty-print JSON output
    #[arg(short, long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a query string into native JSON
    Parse {
        /// Query string (reads from stdin if not provided)
        query: Option<String>,

        /// Input is a bare condition list rather than a full query
        #[arg(long)]
        conditions: bool,
    },

    /// Render native JSON back into a query string
    Render {
        /// Query JSON (reads from stdin if not provided)
        json: Option<String>,
    },

    /// Test a query's WHERE condition against JSON records
    Test {
        /// Query string
        query: String,

        /// JSON record or array of records (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<String>,

        /// Query is a bare condition list
        #[arg(long)]
        conditions: bool,
    },

    /// Describe what sits under a caret position
    Cursor {
        query: String,

        /// Character offset of the caret
        offset: usize,

        /// Look past a comma under the caret to the token before it
        #[arg(long)]
        skip_commas: bool,
    },

    /// Classify every token for syntax highlighting
    Highlight {
        /// Query string (reads from stdin if not provided)
        query: Option<String>,
    },

    /// List the operator catalog
    Operators,
}

fn main() {
    let filter = EnvFilter::try_from_env("SAQL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let registry = cli::load_registry(cli.registry.as_deref())?;
    let mut options = ParserOptions::from_env();
    if let Some(depth) = cli.max_depth {
        options = options.with_max_depth(depth);
    }
    if let Some(iterations) = cli.max_iterations {
        options = options.with_max_iterations(iterations);
    }
    let pretty = cli.pretty;

    match cli.command {
        Commands::Parse { query, conditions } => {
            let query = required(query)?;
            let compile = CompileOptions { options, conditions };
            print_json(&cli::compile_to_json(&query, &registry, &compile)?, pretty)
        }
        Commands::Render { json } => {
            let json = required(json)?;
            println!("{}", cli::render_from_json(&json, &registry)?);
            Ok(())
        }
        Commands::Test {
            query,
            input,
            conditions,
        } => {
            let options = TestOptions {
                query,
                input: stdin_fallback(input)?,
                conditions,
            };
            let results = cli::execute_test(&options, &registry)?;
            print_json(&Value::from(results), pretty)
        }
        Commands::Cursor {
            query,
            offset,
            skip_commas,
        } => print_json(
            &cli::cursor_to_json(&query, &registry, options, offset, skip_commas)?,
            pretty,
        ),
        Commands::Highlight { query } => {
            let query = required(query)?;
            print_json(&cli::highlight_to_json(&query, &registry, options)?, pretty)
        }
        Commands::Operators => {
            print!("{}", cli::operators_overview());
            Ok(())
        }
    }
}

/// Use the argument, or stdin when it is piped.
fn stdin_fallback(arg: Option<String>) -> Result<Option<String>, CliError> {
    match arg {
        Some(s) => Ok(Some(s)),
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(Some(buffer))
        }
        None => Ok(None),
    }
}

fn required(arg: Option<String>) -> Result<String, CliError> {
    stdin_fallback(arg)?
        .map(|s| s.trim().to_string())
        .ok_or(CliError::NoInput)
}

fn print_json(value: &Value, pretty: bool) -> Result<(), CliError> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }?;
    println!("{}", json);
    Ok(())
}
