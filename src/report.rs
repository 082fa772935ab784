//! Per-pool results and the CSV artifact of a run.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use solana_sdk::signature::Signature;
use tracing::info;

/// Rendered wherever a value does not apply.
pub const NOT_APPLICABLE: &str = "N/A";

pub const CSV_HEADER: [&str; 7] = [
    "Timestamp",
    "Pool ID",
    "Pool Name",
    "Staked Amount",
    "Funder Token Account Balance",
    "Total Top-up Amount",
    "Tx Signature",
];

/// How processing of one pool ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolOutcome {
    ToppedUp,
    /// Dry run: prepared and logged, not sent
    Simulated,
    NoTopUpNeeded,
    InsufficientSol,
    InsufficientTokens,
    /// Estimated fee exceeds the funder's native balance
    InsufficientFeeBalance,
    Failed(String),
}

/// One row of the artifact. `None` fields render as [`NOT_APPLICABLE`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolResult {
    pub id: String,
    pub name: String,
    pub current_staked: Option<u128>,
    pub funder_token_balance: Option<u128>,
    pub required_top_up: Option<u128>,
    pub tx_signature: Option<Signature>,
    pub outcome: PoolOutcome,
}

impl PoolResult {
    pub fn is_failure(&self) -> bool {
        !matches!(
            self.outcome,
            PoolOutcome::ToppedUp | PoolOutcome::Simulated | PoolOutcome::NoTopUpNeeded
        )
    }

    fn cells(&self, timestamp: &str) -> [String; 7] {
        [
            timestamp.to_string(),
            self.id.clone(),
            self.name.clone(),
            or_na(self.current_staked),
            or_na(self.funder_token_balance),
            or_na(self.required_top_up),
            or_na(self.tx_signature),
        ]
    }
}

fn or_na<T: ToString>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| NOT_APPLICABLE.to_string())
}

#[derive(Debug, Clone, Default)]
pub struct Report {
    pub results: Vec<PoolResult>,
}

impl Report {
    pub fn new(results: Vec<PoolResult>) -> Self {
        Self { results }
    }

    pub fn failures(&self) -> usize {
        self.results.iter().filter(|r| r.is_failure()).count()
    }

    pub fn render_csv(&self, at: DateTime<Utc>) -> String {
        let timestamp = at.to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut out = csv_line(CSV_HEADER.iter().copied());
        for result in &self.results {
            out.push_str(&csv_line(result.cells(&timestamp).iter().map(String::as_str)));
        }
        out
    }

    pub async fn write_csv(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::write(path, self.render_csv(Utc::now())).await?;
        info!("Results written to {}", path.display());
        Ok(())
    }

    /// Dry runs log the artifact instead of writing it.
    pub fn log_rows(&self) {
        for line in self.render_csv(Utc::now()).lines() {
            info!("Results: {}", line);
        }
    }
}

fn csv_line<'a>(cells: impl Iterator<Item = &'a str>) -> String {
    let mut line = cells.map(escape).collect::<Vec<_>>().join(",");
    line.push('\n');
    line
}

fn escape(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}
