//! colmaker - append a computed column to tab-delimited data

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser as ClapParser, ValueEnum};
use colmaker::{run, RunConfig};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Toggle {
    Yes,
    No,
}

impl Toggle {
    fn enabled(self) -> bool {
        self == Toggle::Yes
    }
}

/// Append a column computed from an expression over the columns c1..cN
/// of every row of a tab-delimited file
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Tab-delimited input file
    input: PathBuf,

    /// Output file (created or truncated)
    output: PathBuf,

    /// Expression over c1..cN; __lt__, __gt__, __eq__, __sq__ etc. are unescaped
    #[arg(allow_hyphen_values = true)]
    expression: String,

    /// Round the result to an integer
    #[arg(value_enum)]
    round: Toggle,

    /// Number of columns in the input
    #[arg(allow_hyphen_values = true)]
    columns: String,

    /// Comma-separated column types (int, float, str, list)
    #[arg(allow_hyphen_values = true)]
    column_types: String,

    /// Render the result in positional rather than scientific notation
    #[arg(value_enum)]
    avoid_scientific_notation: Toggle,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn execute(args: Args) -> Result<()> {
    let config = RunConfig::new(
        args.input,
        args.output,
        args.expression,
        args.round.enabled(),
        &args.columns,
        &args.column_types,
        args.avoid_scientific_notation.enabled(),
    )?;

    let report = run(&config)?;
    println!("{}", report);
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match execute(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}
