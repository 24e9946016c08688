// SettleGrid CLI - order/catalog settlement, headless

mod exit_codes;
mod settle;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use settlegrid_io::IoError;
use settlegrid_recon::ReconError;
use tracing_subscriber::EnvFilter;

use exit_codes::{io_exit_code, recon_exit_code, EXIT_ERROR, EXIT_IO, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "sgrid")]
#[command(about = "Settle group-buy purchase orders against a product catalog")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Debug logging on stderr (RUST_LOG still wins when set)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a settlement config without loading any data
    #[command(after_help = "\
Examples:
  sgrid validate june.settle.toml")]
    Validate {
        /// Path to the .settle.toml config file
        config: PathBuf,
    },

    /// Extract the product table from a catalog sheet as CSV
    #[command(after_help = "\
Examples:
  sgrid extract catalog.xlsx
  sgrid extract catalog.xlsx --sheet 1 -o catalog.csv
  sgrid extract catalog.xlsx --list-sheets")]
    Extract {
        /// Catalog workbook (xlsx, xls, xlsm, ods)
        catalog: PathBuf,

        /// Zero-based sheet index
        #[arg(long, default_value_t = 0)]
        sheet: usize,

        /// Print the workbook's sheet indexes and names instead
        #[arg(long, conflicts_with_all = ["sheet", "output"])]
        list_sheets: bool,

        /// Write CSV to file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// List order and catalog keys and write a prefilled mapping template
    #[command(after_help = "\
Examples:
  sgrid keys june.settle.toml
  sgrid keys june.settle.toml -o mapping.csv
  sgrid keys june.settle.toml --json")]
    Keys {
        /// Path to the .settle.toml config file
        config: PathBuf,

        /// Write the suggested mapping (order_key,catalog_key) to this CSV
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Output JSON to stdout instead of the key listing
        #[arg(long)]
        json: bool,
    },

    /// Settle orders with a reviewed mapping and write the report workbook
    #[command(after_help = "\
Examples:
  sgrid run june.settle.toml --mapping mapping.csv
  sgrid run june.settle.toml -m mapping.csv --output-dir out --date 250630
  sgrid run june.settle.toml -m mapping.csv --json")]
    Run {
        /// Path to the .settle.toml config file
        config: PathBuf,

        /// Reviewed mapping CSV (order_key,catalog_key)
        #[arg(long, short = 'm')]
        mapping: PathBuf,

        /// Directory for the report (default: the config file's directory)
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Report date as YYMMDD (default: today)
        #[arg(long, env = "SGRID_DATE")]
        date: Option<String>,

        /// Also export the settled rows as CSV
        #[arg(long, value_name = "PATH")]
        settled_csv: Option<PathBuf>,

        /// Output JSON to stdout instead of the human summary
        #[arg(long)]
        json: bool,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  settlegrid-recon ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A second init (tests, embedding) is harmless; keep the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Validate { config } => settle::cmd_validate(config),
        Commands::Extract { catalog, sheet, output, list_sheets } => {
            if list_sheets {
                settle::cmd_list_sheets(catalog)
            } else {
                settle::cmd_extract(catalog, sheet, output)
            }
        }
        Commands::Keys { config, output, json } => settle::cmd_keys(config, output, json),
        Commands::Run {
            config,
            mapping,
            output_dir,
            date,
            settled_csv,
            json,
        } => settle::cmd_run(config, mapping, output_dir, date, settled_csv, json),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_IO, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        let hint = match &err {
            ReconError::DuplicateMatchTarget { .. } => {
                Some("a catalog key can be chosen by one order key only; edit the mapping file".to_string())
            }
            ReconError::UnknownCatalogKey(_) => {
                Some("run `sgrid keys <config>` to list the catalog keys".to_string())
            }
            ReconError::FileNaming { .. } => {
                Some("rename the first order file to 발주서_<date>_<seller>_<item>.xlsx".to_string())
            }
            _ => None,
        };
        Self { code: recon_exit_code(&err), message: err.to_string(), hint }
    }
}

impl From<IoError> for CliError {
    fn from(err: IoError) -> Self {
        Self::new(io_exit_code(&err), err.to_string())
    }
}
