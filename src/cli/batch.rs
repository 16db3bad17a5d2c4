use super::ui;
use crate::core::PricingService;
use crate::core::batch::{BatchEntry, BatchOutcome, BatchResult};
use anyhow::{Context, Result};
use comfy_table::Cell;
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// Reads a YAML (or JSON) list of batch entries.
pub fn load_entries<P: AsRef<Path>>(path: P) -> Result<Vec<BatchEntry>> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read batch file: {}", path.as_ref().display()))?;
    let entries: Vec<BatchEntry> = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse batch file: {}", path.as_ref().display()))?;
    debug!("Loaded {} batch entries", entries.len());
    Ok(entries)
}

pub async fn run(
    service: &PricingService,
    file: &str,
    warehouse_id: Option<&str>,
    json: bool,
) -> Result<()> {
    let entries = load_entries(file)?;
    if entries.is_empty() {
        println!("No products found in {file}.");
        return Ok(());
    }

    let lookups: HashSet<(&str, Option<&str>)> = entries
        .iter()
        .map(|e| (e.product_id.as_str(), e.warehouse_id.as_deref().or(warehouse_id)))
        .collect();
    let pb = ui::new_progress_bar(lookups.len() as u64);
    let result = service
        .compute_batch_margins(&entries, warehouse_id, &|| pb.inc(1))
        .await;
    pb.finish_and_clear();

    if json {
        return ui::print_json(&result);
    }
    display_results(&result);
    Ok(())
}

fn display_results(result: &BatchResult) {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("#"),
        ui::header_cell("Product"),
        ui::header_cell("Warehouse"),
        ui::header_cell("Sell (net)"),
        ui::header_cell("Cost (net)"),
        ui::header_cell("Profit"),
        ui::header_cell("Margin"),
        ui::header_cell("Status"),
    ]);

    for slot in &result.slots {
        let mut row = vec![
            Cell::new(slot.index + 1),
            Cell::new(&slot.product_id),
            Cell::new(slot.warehouse_id.as_deref().unwrap_or("all")),
        ];
        match &slot.outcome {
            BatchOutcome::Priced {
                margin,
                cost,
                meets_minimum,
            } => {
                row.push(ui::amount_cell(margin.sell_net));
                row.push(ui::amount_cell(cost.cost_net));
                row.push(ui::profit_cell(margin));
                row.push(ui::percent_cell(margin.margin_percent, *meets_minimum));
                row.push(Cell::new(if *meets_minimum { "ok" } else { "below minimum" }));
            }
            BatchOutcome::NotFound => {
                row.extend((0..4).map(|_| ui::na_cell(false)));
                row.push(Cell::new("no history"));
            }
            BatchOutcome::Timeout { message } | BatchOutcome::Failed { message } => {
                row.extend((0..4).map(|_| ui::na_cell(true)));
                row.push(Cell::new(ui::style_text(message, ui::StyleType::Error)));
            }
        }
        table.add_row(row);
    }

    println!("{table}");
    println!(
        "{}",
        ui::style_text(
            &format!("{} of {} products priced", result.priced_count(), result.len()),
            ui::StyleType::Subtle
        )
    );
}
