//! Export: JSON and CSV artifacts for a run.
//!
//! - **JSON**: full `BacktestResult` round-trip with schema versioning, and the
//!   bare ledger
//! - **CSV**: one row per closed trade for external analysis tools
//!
//! Persisted results carry `schema_version`; newer versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use eventbt_core::engine::Ledger;

use crate::runner::{BacktestResult, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

/// Serialize the ledger as a JSON array of trades.
pub fn export_ledger_json(ledger: &Ledger) -> Result<String> {
    serde_json::to_string_pretty(ledger).context("failed to serialize ledger to JSON")
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export the ledger as CSV, one row per trade in close order.
///
/// Columns: direction, units, entry_bar, entry_date, entry_price, exit_bar,
/// exit_date, exit_price, exit_reason, duration_secs, bars_held, return_pct,
/// log_return, realized_pnl, balance_after
pub fn export_ledger_csv(ledger: &Ledger) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "direction",
        "units",
        "entry_bar",
        "entry_date",
        "entry_price",
        "exit_bar",
        "exit_date",
        "exit_price",
        "exit_reason",
        "duration_secs",
        "bars_held",
        "return_pct",
        "log_return",
        "realized_pnl",
        "balance_after",
    ])?;

    for t in ledger.iter() {
        wtr.write_record([
            &format!("{:?}", t.direction).to_lowercase(),
            &t.units.to_string(),
            &t.entry_bar.to_string(),
            &t.entry_date.to_string(),
            &format!("{:.6}", t.entry_price),
            &t.exit_bar.to_string(),
            &t.exit_date.to_string(),
            &format!("{:.6}", t.exit_price),
            &format!("{:?}", t.exit_reason).to_lowercase(),
            &t.duration.num_seconds().to_string(),
            &t.bars_held.to_string(),
            &format!("{:.6}", t.return_pct),
            &format!("{:.8}", t.log_return),
            &format!("{:.2}", t.realized_pnl),
            &format!("{:.2}", t.balance_after),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a single run.
///
/// Creates a directory named `{strategy}_{run_id prefix}/` under `output_dir`
/// containing:
/// - `result.json`: the full `BacktestResult`
/// - `ledger.json`: the trade ledger
/// - `ledger.csv`: the trade ledger as a table
///
/// Returns the directory path.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let prefix: String = result.run_id.chars().take(12).collect();
    let dir_name = format!("{}_{}", sanitize(&result.report.strategy), prefix);
    let dir = output_dir.join(dir_name);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;

    write_file(&dir.join("result.json"), &export_json(result)?)?;
    write_file(&dir.join("ledger.json"), &export_ledger_json(&result.report.ledger)?)?;
    write_file(&dir.join("ledger.csv"), &export_ledger_csv(&result.report.ledger)?)?;

    Ok(dir)
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

/// Keep names filesystem-friendly (e.g. "rolling_forecast_arima(1,0,0)").
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}
