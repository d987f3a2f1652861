// fillgrid CLI - render a spreadsheet template from a JSON payload
//
// stdout carries exactly one JSON result object; diagnostics go to stderr.

mod exit_codes;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{ArgAction, Parser};
use fillgrid_render::{render_file, Payload, RenderConfig, RenderRequest};
use serde::Serialize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use exit_codes::{config_exit_code, payload_exit_code, render_exit_code, EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser, Debug)]
#[command(name = "fillgrid")]
#[command(about = "Fill a spreadsheet template with header fields and line items")]
#[command(long_version = long_version())]
#[command(version)]
#[command(after_help = "\
Examples:
  fillgrid --template invoice.xlsx --output out.xlsx --data payload.json
  fillgrid --template invoice.xlsx --output out.xlsx --data '{\"header\":{},\"items\":[]}'

The template marks the repeated row with {#items} and {/items} in the rows
above and below it. {header.field} tokens are filled anywhere, {item.field}
tokens once per item, and a {TOTAL_SUM} cell becomes the total.")]
struct Cli {
    /// Template workbook (xlsx)
    #[arg(long, value_name = "PATH")]
    template: PathBuf,

    /// Where to write the rendered workbook
    #[arg(long, value_name = "PATH")]
    output: PathBuf,

    /// Payload: path to a JSON file, or the JSON text itself
    #[arg(long, value_name = "PATH|JSON")]
    data: String,

    /// Worksheet to render (default: 청구서, Invoice, Invoices, else the first)
    #[arg(long, value_name = "NAME")]
    sheet: Option<String>,

    /// Render settings (TOML)
    #[arg(long, value_name = "PATH", env = "FILLGRID_CONFIG")]
    config: Option<PathBuf>,

    /// More diagnostics on stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// The JSON object printed on stdout
#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
enum RenderResult {
    Success { success: bool, output_path: String },
    Failure { success: bool, error: String },
}

impl RenderResult {
    fn success(path: &Path) -> Self {
        RenderResult::Success {
            success: true,
            output_path: path.display().to_string(),
        }
    }

    fn failure(error: impl Into<String>) -> Self {
        RenderResult::Failure {
            success: false,
            error: error.into(),
        }
    }

    fn emit(&self) {
        let line = serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"success":false,"error":"result serialization failed"}"#.to_string());
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        let _ = writeln!(handle, "{}", line);
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
}

impl CliError {
    pub fn data(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into() }
    }
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nrender:  fillgrid-render ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    // RUST_LOG wins over -v
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr).with_target(false))
        .try_init();
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::from(EXIT_SUCCESS),
                _ => {
                    RenderResult::failure(clap_message(&e)).emit();
                    ExitCode::from(EXIT_USAGE)
                }
            };
        }
    };

    init_tracing(cli.verbose);

    match run(cli) {
        Ok(output) => {
            RenderResult::success(&output).emit();
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(CliError { code, message }) => {
            tracing::error!("{}", message);
            RenderResult::failure(message).emit();
            ExitCode::from(code)
        }
    }
}

/// The clap error up to its usage block, on one line, without `error: `
fn clap_message(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let message = rendered
        .lines()
        .take_while(|line| !line.trim().is_empty())
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(" ");
    message.strip_prefix("error: ").unwrap_or(&message).to_string()
}

fn run(cli: Cli) -> Result<PathBuf, CliError> {
    let config = match &cli.config {
        Some(path) => RenderConfig::from_path(path).map_err(|e| CliError {
            code: config_exit_code(&e),
            message: e.to_string(),
        })?,
        None => RenderConfig::default(),
    };

    let payload = load_payload(&cli.data)?;
    tracing::info!(
        template = %cli.template.display(),
        items = payload.items().len(),
        "payload loaded"
    );

    let request = RenderRequest {
        template: cli.template,
        output: cli.output,
        payload,
        sheet: cli.sheet,
    };
    let outcome = render_file(&request, &config).map_err(|e| CliError {
        code: render_exit_code(&e),
        message: e.to_string(),
    })?;
    Ok(outcome.output_path)
}

/// `--data` names a file when one exists at that path; otherwise it is the
/// JSON text itself.
fn load_payload(data: &str) -> Result<Payload, CliError> {
    if data.trim().is_empty() {
        return Err(CliError::data("--data is empty"));
    }
    let path = Path::new(data);
    let text = if path.is_file() {
        std::fs::read_to_string(path)
            .map_err(|e| CliError::data(format!("cannot read payload '{}': {}", path.display(), e)))?
    } else {
        data.to_string()
    };
    Payload::from_json_str(&text).map_err(|e| CliError {
        code: payload_exit_code(&e),
        message: e.to_string(),
    })
}
