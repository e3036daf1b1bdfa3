//! Command-line front end for the segment criteria compiler.
#![forbid(unsafe_code)]

mod config;
mod ui;

use std::error::Error;
use std::fs;
use std::io::Read;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use segment_criteria::{
    explain, CriteriaCompiler, CriteriaTree, Dialect, StorageTree, Value,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::config::CliConfig;
use crate::ui::Ui;

#[derive(Parser, Debug)]
#[command(
    name = "segc",
    version,
    about = "Compile customer-segment criteria into canonical trees and SQL",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[arg(
        long,
        global = true,
        env = "SEGC_CONFIG",
        value_name = "PATH",
        help = "Config file (defaults to the user config directory)"
    )]
    config: Option<PathBuf>,

    #[arg(long, global = true, value_enum, help = "SQL dialect override")]
    dialect: Option<DialectArg>,

    #[arg(long, global = true, help = "Reference year for age ranges")]
    year: Option<i32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Show the raw entities found in a sentence")]
    Extract { text: String },

    #[command(about = "Compile a sentence into a storage tree")]
    Compile { text: String },

    #[command(about = "Validate and standardize a criteria tree (JSON)")]
    Normalize(InputArgs),

    #[command(about = "Flatten a criteria tree (JSON) into a storage tree")]
    Canonicalize(InputArgs),

    #[command(about = "Compile a storage tree (JSON) into a SQL predicate")]
    Sql {
        #[command(flatten)]
        input: InputArgs,

        #[arg(long, help = "Wrap the predicate in a full SELECT over customers")]
        select: bool,
    },

    #[command(about = "Describe a storage tree (JSON) in words")]
    Explain(InputArgs),
}

#[derive(Args, Debug)]
struct InputArgs {
    #[arg(value_name = "FILE", default_value = "-", help = "Input file, or - for stdin")]
    input: String,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum DialectArg {
    Postgres,
    Sqlite,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Postgres => Dialect::Postgres,
            DialectArg::Sqlite => Dialect::Sqlite,
        }
    }
}

#[derive(Serialize)]
struct SqlReport<'a> {
    dialect: &'static str,
    sql: &'a str,
    params: &'a [Value],
    inline: String,
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let mut config = CliConfig::load(cli.config.clone())?;
    if let Some(dialect) = cli.dialect {
        config.options_mut().dialect = dialect.into();
    }
    if let Some(year) = cli.year {
        config.options_mut().current_year = Some(year);
    }
    let compiler = CriteriaCompiler::with_store(config.mapping_store()?, config.options().clone());
    let ui = Ui::new();

    match &cli.command {
        Command::Extract { text } => {
            let entities = compiler.extract(text);
            emit(&cli.format, &entities, || {
                ui.numbered(
                    "Entities",
                    entities
                        .iter()
                        .map(|e| serde_json::to_string(e).unwrap_or_default()),
                );
            })?;
        }
        Command::Compile { text } => {
            let tree = compiler.compile_text(text);
            emit(&cli.format, &tree, || print_tree_text(&ui, &tree))?;
        }
        Command::Normalize(args) => {
            let raw: serde_json::Value = serde_json::from_str(&read_input(&args.input)?)?;
            let tree = compiler.normalize(&CriteriaTree::from_json(&raw));
            emit(&cli.format, &tree, || {
                println!("{}", serde_json::to_string_pretty(&tree).unwrap_or_default());
            })?;
        }
        Command::Canonicalize(args) => {
            let raw: serde_json::Value = serde_json::from_str(&read_input(&args.input)?)?;
            let tree = compiler.canonicalize(&CriteriaTree::from_json(&raw));
            emit(&cli.format, &tree, || print_tree_text(&ui, &tree))?;
        }
        Command::Sql { input, select } => {
            let tree = StorageTree::from_json_str(&read_input(&input.input)?)?;
            let compiled = compiler.compile_sql(&tree)?;
            let sql = if *select {
                compiled.select_customers()
            } else {
                compiled.sql.clone()
            };
            let report = SqlReport {
                dialect: compiled.dialect.as_str(),
                sql: &sql,
                params: &compiled.params,
                inline: compiled.inline(),
            };
            emit(&cli.format, &report, || {
                ui.summary("SQL", &[("dialect", report.dialect)]);
                ui.block("Predicate", report.sql);
                ui.numbered(
                    "Parameters",
                    report
                        .params
                        .iter()
                        .map(|p| serde_json::to_string(p).unwrap_or_default()),
                );
            })?;
        }
        Command::Explain(args) => {
            let tree = StorageTree::from_json_str(&read_input(&args.input)?)?;
            let description = explain::describe(&tree);
            emit(&cli.format, &serde_json::json!({ "description": description }), || {
                println!("{description}");
            })?;
        }
    }

    Ok(())
}

fn read_input(source: &str) -> Result<String, Box<dyn Error>> {
    if source == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        Ok(fs::read_to_string(source)?)
    }
}

fn print_tree_text(ui: &Ui, tree: &StorageTree) {
    ui.summary(
        "Segment",
        &[
            ("root", tree.root_operator.to_string()),
            ("size", tree.size.to_string()),
        ],
    );
    ui.numbered(
        "Conditions",
        tree.conditions.iter().map(explain::describe_condition),
    );
    for group in &tree.condition_groups {
        ui.numbered(
            &format!("Group {} ({})", group.id, group.operator),
            group.conditions.iter().map(explain::describe_condition),
        );
    }
}

fn emit<T, F>(format: &OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: Serialize,
    F: Fn(),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}
