//! Gold table read-back and rendering

use super::db::MedallionReader;
use super::error::PipelineError;
use super::types::{AggregateRecord, GoldDimension};

/// Render one gold table as plain text
///
/// ```text
/// Data from gold_sales_by_region:
///   region | total_sales
///   East | 10.00
/// ```
pub fn render_gold_table(dimension: GoldDimension, records: &[AggregateRecord]) -> String {
    let mut out = format!("Data from {}:\n", dimension.table());
    out.push_str(&format!(
        "  {} | {}\n",
        dimension.key_column(),
        dimension.total_column()
    ));
    for record in records {
        out.push_str(&format!("  {} | {}\n", record.group_key, record.total));
    }
    out
}

/// Read back every gold table and render it, in write order
pub async fn render_gold_report<R: MedallionReader + ?Sized>(
    reader: &R,
) -> Result<String, PipelineError> {
    let mut sections = Vec::with_capacity(GoldDimension::ALL.len());
    for dimension in GoldDimension::ALL {
        let records = reader.read_gold(dimension).await?;
        sections.push(render_gold_table(dimension, &records));
    }
    Ok(sections.join("\n"))
}
