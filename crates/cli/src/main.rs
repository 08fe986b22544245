// GridCalc CLI - headless spreadsheet operations
// `calc` evaluates one formula against TSV data from stdin;
// `run` executes a cell script and prints the resulting grid.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use gridcalc_engine::cell::CellValue;
use gridcalc_engine::formula::Formula;
use gridcalc_engine::position::Position;
use gridcalc_engine::sheet::Sheet;
use log::debug;

const EXIT_SUCCESS: u8 = 0;
const EXIT_EVAL_ERROR: u8 = 1;
const EXIT_ARGS_ERROR: u8 = 2;
const EXIT_IO_ERROR: u8 = 3;
const EXIT_PARSE_ERROR: u8 = 4;

#[derive(Parser)]
#[command(name = "gridcalc")]
#[command(about = "In-memory spreadsheet engine (headless)")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a spreadsheet formula against TSV data read from stdin
    Calc {
        /// Formula to evaluate (must start with =)
        formula: String,
    },

    /// Run a cell script and print the resulting grid
    ///
    /// Script lines: `set <CELL> <text…>`, `clear <CELL>`, blank lines and
    /// `#` comments are skipped.
    Run {
        /// Script file (omit to read from stdin)
        script: Option<PathBuf>,

        /// Print text forms instead of displayed values
        #[arg(long)]
        texts: bool,

        /// Print the grid as JSON rows instead of tab-separated text
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Calc { formula } => cmd_calc(&formula),
        Commands::Run { script, texts, json } => cmd_run(script.as_deref(), texts, json),
    };
    ExitCode::from(code)
}

fn cmd_calc(formula: &str) -> u8 {
    let Some(expr_src) = formula.strip_prefix('=') else {
        eprintln!("error: formula must start with =");
        return EXIT_ARGS_ERROR;
    };

    let formula = match Formula::parse(expr_src) {
        Ok(f) => f,
        Err(msg) => {
            eprintln!("error: {}", msg);
            return EXIT_PARSE_ERROR;
        }
    };

    let mut input = String::new();
    if let Err(err) = io::stdin().read_to_string(&mut input) {
        eprintln!("error: reading stdin: {}", err);
        return EXIT_IO_ERROR;
    }

    let mut sheet = Sheet::new();
    if let Err(code) = load_tsv(&mut sheet, &input) {
        return code;
    }

    match formula.evaluate(&sheet) {
        Ok(n) => {
            println!("{}", CellValue::Number(n));
            EXIT_SUCCESS
        }
        Err(e) => {
            println!("{}", e);
            EXIT_EVAL_ERROR
        }
    }
}

/// Load tab-separated values into the sheet anchored at A1. Empty fields
/// leave their cell absent.
fn load_tsv(sheet: &mut Sheet, input: &str) -> Result<(), u8> {
    for (row, line) in input.lines().enumerate() {
        for (col, field) in line.split('\t').enumerate() {
            if field.is_empty() {
                continue;
            }
            let pos = Position::new(row, col);
            if let Err(err) = sheet.set_cell(pos, field) {
                eprintln!("error: cell {}: {}", pos, err);
                return Err(EXIT_EVAL_ERROR);
            }
        }
    }
    Ok(())
}

fn cmd_run(script: Option<&Path>, texts: bool, json: bool) -> u8 {
    let source = match script {
        Some(path) => match fs::read_to_string(path) {
            Ok(s) => s,
            Err(err) => {
                eprintln!("error: reading {}: {}", path.display(), err);
                return EXIT_IO_ERROR;
            }
        },
        None => {
            let mut s = String::new();
            if let Err(err) = io::stdin().read_to_string(&mut s) {
                eprintln!("error: reading stdin: {}", err);
                return EXIT_IO_ERROR;
            }
            s
        }
    };

    let mut sheet = Sheet::new();
    for (lineno, line) in source.lines().enumerate() {
        if let Err(code) = run_line(&mut sheet, line) {
            eprintln!("  at line {}", lineno + 1);
            return code;
        }
    }

    let mut stdout = io::stdout().lock();
    let printed = if json {
        writeln!(stdout, "{}", grid_json(&sheet))
    } else if texts {
        sheet.print_texts(&mut stdout)
    } else {
        sheet.print_values(&mut stdout)
    };
    if let Err(err) = printed {
        eprintln!("error: writing output: {}", err);
        return EXIT_IO_ERROR;
    }
    EXIT_SUCCESS
}

fn run_line(sheet: &mut Sheet, line: &str) -> Result<(), u8> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(());
    }

    let (verb, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim_start()),
        None => (trimmed, ""),
    };

    match verb {
        "set" => {
            let (cell, text) = match rest.split_once(char::is_whitespace) {
                Some((cell, text)) => (cell, text.trim_start()),
                None => (rest, ""),
            };
            let pos = parse_cell(cell)?;
            debug!("script: set {} {:?}", pos, text);
            sheet.set_cell(pos, text).map_err(|err| {
                eprintln!("error: set {}: {}", pos, err);
                EXIT_EVAL_ERROR
            })
        }
        "clear" => {
            let pos = parse_cell(rest)?;
            debug!("script: clear {}", pos);
            sheet.clear_cell(pos).map_err(|err| {
                eprintln!("error: clear {}: {}", pos, err);
                EXIT_EVAL_ERROR
            })
        }
        other => {
            eprintln!("error: unknown command: {}", other);
            Err(EXIT_PARSE_ERROR)
        }
    }
}

fn parse_cell(s: &str) -> Result<Position, u8> {
    match Position::parse_a1(s) {
        Some(pos) if pos.is_valid() => Ok(pos),
        _ => {
            eprintln!("error: invalid cell address: {}", s);
            Err(EXIT_PARSE_ERROR)
        }
    }
}

fn grid_json(sheet: &Sheet) -> serde_json::Value {
    let size = sheet.printable_size();
    let mut rows = Vec::with_capacity(size.rows);
    for row in 0..size.rows {
        let mut fields = Vec::with_capacity(size.cols);
        for col in 0..size.cols {
            let view = sheet.get_cell(Position::new(row, col)).ok().flatten();
            let value = match view.map(|v| v.value()) {
                Some(CellValue::Number(n)) => serde_json::json!(n),
                Some(CellValue::Text(s)) => serde_json::Value::String(s),
                Some(CellValue::Error(e)) => serde_json::Value::String(e.token().to_string()),
                None => serde_json::Value::String(String::new()),
            };
            fields.push(value);
        }
        rows.push(serde_json::Value::Array(fields));
    }
    serde_json::Value::Array(rows)
}
