use super::ui;
use crate::core::{Lookup, PricingService, Resolution, ResolutionStrategy, ResolvedCost};
use anyhow::Result;
use comfy_table::Cell;

/// Authoritative cost of a product from the ledger.
pub async fn run_cost(
    service: &PricingService,
    product_id: &str,
    warehouse_id: Option<&str>,
    strategy: Option<ResolutionStrategy>,
    timeframe_days: Option<u32>,
    json: bool,
) -> Result<()> {
    let settings = service.settings();
    let strategy = strategy.unwrap_or(settings.default_strategy);
    let timeframe_days = timeframe_days.unwrap_or(settings.default_timeframe_days);

    let resolution = service
        .resolve_purchase_price(product_id, warehouse_id, strategy, timeframe_days)
        .await?;
    if json {
        return ui::print_json(&resolution);
    }

    match resolution {
        Lookup::Found(cost) => display_costs(&[cost]),
        Lookup::NotFound => {
            println!("No purchase history for {product_id} in the last {timeframe_days} days.")
        }
    }
    Ok(())
}

/// Captures the current cost of each product for later `validate` runs.
pub async fn run_snapshot(
    service: &PricingService,
    product_ids: &[String],
    warehouse_id: Option<&str>,
    json: bool,
) -> Result<()> {
    let pb = ui::new_progress_bar(product_ids.len() as u64);
    let mut captured: Vec<(String, Resolution)> = Vec::with_capacity(product_ids.len());
    for product_id in product_ids {
        let resolution = match service.capture_snapshot(product_id, warehouse_id).await {
            Ok(resolution) => resolution,
            Err(e) => {
                pb.finish_and_clear();
                return Err(e.into());
            }
        };
        pb.inc(1);
        captured.push((product_id.clone(), resolution));
    }
    pb.finish_and_clear();

    if json {
        let rows: Vec<_> = captured
            .iter()
            .map(|(product_id, resolution)| {
                serde_json::json!({ "product_id": product_id, "resolution": resolution })
            })
            .collect();
        return ui::print_json(&rows);
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Product"),
        ui::header_cell("Captured cost"),
        ui::header_cell("Purchases"),
    ]);
    for (product_id, resolution) in &captured {
        match resolution {
            Lookup::Found(cost) => table.add_row(vec![
                Cell::new(product_id),
                ui::amount_cell(cost.cost_net),
                Cell::new(cost.records_considered),
            ]),
            Lookup::NotFound => table.add_row(vec![
                Cell::new(product_id),
                ui::na_cell(false),
                Cell::new(0),
            ]),
        };
    }
    println!("{table}");
    Ok(())
}

fn display_costs(costs: &[ResolvedCost]) {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Product"),
        ui::header_cell("Warehouse"),
        ui::header_cell("Cost (net)"),
        ui::header_cell("Strategy"),
        ui::header_cell("Purchases"),
        ui::header_cell("Days"),
    ]);
    for cost in costs {
        table.add_row(vec![
            Cell::new(&cost.product_id),
            Cell::new(cost.warehouse_id.as_deref().unwrap_or("all")),
            ui::amount_cell(cost.cost_net),
            Cell::new(cost.strategy_used),
            Cell::new(cost.records_considered),
            Cell::new(cost.timeframe_days),
        ]);
    }
    println!("{table}");
}
