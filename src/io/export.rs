//! CSV export for per-transformer tick snapshots.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::grid::TransformerSnapshot;

/// Schema v1 column header for CSV snapshot export.
const HEADER: &str = "timestamp,transformer_id,kind,buildings,load_kw,capacity_kw,\
                       load_pct,temperature_c,bghi_score,status,is_in_outage,\
                       mismatch_ratio,anomaly_count_24h,peak_risk_ratio";

/// One labelled snapshot row: the tick timestamp plus the transformer state
/// captured at that tick.
pub type SnapshotRow<'a> = (i64, &'a TransformerSnapshot);

/// Exports transformer snapshots to a CSV file at the given path.
///
/// Writes a header row followed by one data row per snapshot using the
/// schema v1 column layout. Produces deterministic output for identical
/// inputs.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(rows: &[SnapshotRow<'_>], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(rows, buf)
}

/// Writes transformer snapshots as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(rows: &[SnapshotRow<'_>], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    // Header
    wtr.write_record(HEADER.split(',').map(str::trim))?;

    // Data rows
    for (ts, s) in rows {
        wtr.write_record(&[
            ts.to_string(),
            s.id.clone(),
            format!("{:?}", s.kind).to_ascii_lowercase(),
            s.buildings.to_string(),
            format!("{:.3}", s.load_kw),
            format!("{:.1}", s.capacity_kw),
            format!("{:.2}", s.load_pct),
            format!("{:.2}", s.temperature_c),
            format!("{:.2}", s.bghi.bghi_score),
            s.bghi.status.to_string(),
            s.is_in_outage.to_string(),
            format!("{:.4}", s.mismatch_ratio),
            s.anomaly_count_24h.to_string(),
            format!("{:.3}", s.peak_risk_ratio),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
