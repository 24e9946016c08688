//! `sgrid validate|extract|keys|run`: config-driven order settlement.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;
use settlegrid_io::csv::{export_row_set, read_mapping, write_grid, write_mapping, write_row_set};
use settlegrid_io::xlsx::{load_order_files, read_grid, sheet_names};
use settlegrid_io::ReportAssembler;
use settlegrid_recon::config::RemoteAreaMode;
use settlegrid_recon::extract::extract;
use settlegrid_recon::finance::settlement_total;
use settlegrid_recon::ingest::SourceOutcome;
use settlegrid_recon::model::DataWarning;
use settlegrid_recon::{FinanceRow, Mapping, OrderFileName, Outcome, ReconConfig, ReconSession};

use crate::exit_codes::EXIT_SETTLE_NO_TABLE;
use crate::CliError;

/// Config, loaded data and the per-file ingestion outcomes.
struct Loaded {
    config: ReconConfig,
    base_dir: PathBuf,
    session: ReconSession,
    files: Vec<SourceOutcome>,
}

fn load_config(path: &Path) -> Result<ReconConfig, CliError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::io(format!("cannot read config {}: {e}", path.display())))?;
    Ok(ReconConfig::from_toml(&text)?)
}

/// Load the config, its order files and its catalog table.
fn load(config_path: &Path) -> Result<Loaded, CliError> {
    let config = load_config(config_path)?;

    // Resolve file paths relative to the config file's directory
    let base_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();

    let order_paths: Vec<PathBuf> = config.orders.files.iter().map(|f| base_dir.join(f)).collect();
    let report = load_order_files(&order_paths);

    let catalog_path = base_dir.join(&config.catalog.file);
    let grid = read_grid(&catalog_path, config.catalog.sheet)?;
    let catalog = extract(&grid);
    if catalog.is_empty() {
        return Err(CliError::new(
            EXIT_SETTLE_NO_TABLE,
            format!("no product table found in {}", catalog_path.display()),
        )
        .with_hint(format!("inspect the sheet with `sgrid extract {}`", catalog_path.display())));
    }
    log::info!("catalog: {} rows from {}", catalog.len(), catalog_path.display());

    let session = ReconSession::new(config.settle.clone(), report.rows, catalog)?;
    Ok(Loaded {
        config,
        base_dir,
        session,
        files: report.files,
    })
}

// ============================================================================
// validate
// ============================================================================

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let settle = &config.settle;

    let shipping = match &settle.shipping {
        Some(s) => format!("shipping {} under {}", s.fee, s.condition_amount),
        None => "no shipping".to_string(),
    };
    let remote = match &settle.remote_area {
        Some(r) if r.mode == RemoteAreaMode::Flag => format!("remote area flag on '{}'", r.column),
        Some(r) => format!("remote area raw from '{}'", r.column),
        None => "no remote area".to_string(),
    };
    eprintln!(
        "valid: '{}' with {} order file(s), catalog '{}'; {shipping}, {remote}, seller ratio {}%",
        config.name,
        config.orders.files.len(),
        config.catalog.file,
        settle.ratio(),
    );
    Ok(())
}

// ============================================================================
// extract
// ============================================================================

pub fn cmd_extract(catalog: PathBuf, sheet: usize, output: Option<PathBuf>) -> Result<(), CliError> {
    let grid = read_grid(&catalog, sheet)?;
    let table = extract(&grid);

    let out: Box<dyn Write> = match &output {
        Some(path) => Box::new(
            std::fs::File::create(path)
                .map_err(|e| CliError::io(format!("cannot write {}: {e}", path.display())))?,
        ),
        None => Box::new(std::io::stdout().lock()),
    };

    if table.is_empty() {
        eprintln!("warning: no product table found; showing the raw sheet");
        write_grid(out, &grid)?;
    } else {
        eprintln!("extracted {} rows, {} columns", table.len(), table.columns.len());
        write_row_set(out, &table)?;
    }

    if let Some(path) = output {
        eprintln!("wrote {}", path.display());
    }
    Ok(())
}

pub fn cmd_list_sheets(catalog: PathBuf) -> Result<(), CliError> {
    for (i, name) in sheet_names(&catalog)?.iter().enumerate() {
        println!("{i}\t{name}");
    }
    Ok(())
}

// ============================================================================
// keys
// ============================================================================

#[derive(Serialize)]
struct KeysOutput<'a> {
    order_keys: Vec<String>,
    catalog_keys: Vec<String>,
    suggested: &'a Mapping,
    files: &'a [SourceOutcome],
}

pub fn cmd_keys(config_path: PathBuf, output: Option<PathBuf>, json: bool) -> Result<(), CliError> {
    let loaded = load(&config_path)?;
    let session = &loaded.session;
    let suggested = session.suggest_mapping();

    if let Some(ref path) = output {
        write_mapping(path, &suggested)?;
        eprintln!("wrote {}", path.display());
    }

    if json {
        let out = KeysOutput {
            order_keys: session.order_keys(),
            catalog_keys: session.catalog_keys(),
            suggested: &suggested,
            files: &loaded.files,
        };
        let text = serde_json::to_string_pretty(&out)
            .map_err(|e| CliError::internal(format!("JSON serialization error: {e}")))?;
        println!("{text}");
        return Ok(());
    }

    let order_keys = session.order_keys();
    println!("order keys ({}):", order_keys.len());
    for key in &order_keys {
        match suggested.get(key).and_then(Option::as_deref) {
            Some(target) => println!("  {key}  ->  {target}"),
            None => println!("  {key}  ->  (no suggestion)"),
        }
    }
    let catalog_keys = session.catalog_keys();
    println!("catalog keys ({}):", catalog_keys.len());
    for key in &catalog_keys {
        println!("  {key}");
    }
    Ok(())
}

// ============================================================================
// run
// ============================================================================

#[derive(Serialize)]
struct RunOutput<'a> {
    report: String,
    rows: usize,
    matched_rows: usize,
    matched_keys: usize,
    unmatched_keys: Vec<String>,
    settlement_total: i64,
    summary: &'a [FinanceRow],
    warnings: &'a [DataWarning],
    shipping: &'a Option<Outcome<usize>>,
    remote_area: &'a Option<Outcome<usize>>,
    files: &'a [SourceOutcome],
}

fn parse_date(date: Option<&str>) -> Result<NaiveDate, CliError> {
    match date {
        Some(s) => NaiveDate::parse_from_str(s, "%y%m%d")
            .map_err(|_| CliError::args(format!("invalid --date '{s}' (expected YYMMDD)"))),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

/// `1234567` -> `1,234,567`
fn group_thousands(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut out = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if amount < 0 {
        out.insert(0, '-');
    }
    out
}

pub fn cmd_run(
    config_path: PathBuf,
    mapping_path: PathBuf,
    output_dir: Option<PathBuf>,
    date: Option<String>,
    settled_csv: Option<PathBuf>,
    json: bool,
) -> Result<(), CliError> {
    let date = parse_date(date.as_deref())?;
    let Loaded {
        config,
        base_dir,
        mut session,
        files,
    } = load(&config_path)?;

    // validate() guarantees at least one order file
    let first_order = config.orders.files.first().map(String::as_str).unwrap_or_default();
    let naming = OrderFileName::parse(first_order)?;

    let mapping = read_mapping(&mapping_path)?;
    let matched_keys = session.save_mapping(mapping)?;
    let unmatched_keys: Vec<String> = {
        let table = session.registry().match_table();
        session
            .order_keys()
            .into_iter()
            .filter(|k| !table.iter().any(|p| &p.order_key == k))
            .collect()
    };

    let (settled, summary) = session.results(&naming.product_label());

    let out_dir = output_dir.unwrap_or(base_dir);
    std::fs::create_dir_all(&out_dir)
        .map_err(|e| CliError::io(format!("cannot create {}: {e}", out_dir.display())))?;
    let report_path = out_dir.join(naming.report_file_name(&config.report.prefix, date));
    ReportAssembler::new(config.report.clone()).write(&report_path, summary, settled)?;

    if let Some(ref path) = settled_csv {
        export_row_set(path, &settled.to_row_set())?;
        eprintln!("wrote {}", path.display());
    }

    let matched_rows = settled
        .rows
        .iter()
        .filter(|r| r.matched_catalog_key.is_some())
        .count();
    let total = settlement_total(summary);

    if json {
        let out = RunOutput {
            report: report_path.display().to_string(),
            rows: settled.rows.len(),
            matched_rows,
            matched_keys,
            unmatched_keys,
            settlement_total: total,
            summary,
            warnings: &settled.warnings,
            shipping: &settled.shipping,
            remote_area: &settled.remote_area,
            files: &files,
        };
        let text = serde_json::to_string_pretty(&out)
            .map_err(|e| CliError::internal(format!("JSON serialization error: {e}")))?;
        println!("{text}");
    } else {
        eprintln!(
            "settled {} rows: {matched_rows} matched, {} unmatched",
            settled.rows.len(),
            settled.rows.len() - matched_rows,
        );
        if !unmatched_keys.is_empty() {
            eprintln!("unmatched order keys: {}", unmatched_keys.join(", "));
        }
        eprintln!("settlement total: ₩{}", group_thousands(total));
        eprintln!("wrote {}", report_path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(1234567), "1,234,567");
        assert_eq!(group_thousands(-56500), "-56,500");
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date(Some("250630")).unwrap(),
            NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()
        );
        assert!(parse_date(Some("2025-06-30")).is_err());
        assert!(parse_date(None).is_ok());
    }
}
