use super::ui;
use crate::core::PricingService;
use crate::core::reconcile::{MarginEstimate, ValidationReport, ValidationStatus};
use anyhow::Result;
use comfy_table::Cell;
use rust_decimal::Decimal;

/// Compares the margin over the captured cost with the margin over a fresh
/// ledger lookup.
pub async fn run(
    service: &PricingService,
    product_id: &str,
    sell_net: Decimal,
    warehouse_id: Option<&str>,
    json: bool,
) -> Result<()> {
    let report = service
        .validate_margin(product_id, sell_net, warehouse_id)
        .await?;
    if json {
        return ui::print_json(&report);
    }
    display_report(&report);
    Ok(())
}

fn estimate_row(label: &str, estimate: &MarginEstimate) -> Vec<Cell> {
    let as_of = estimate
        .as_of
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string());
    match (estimate.cost_net, estimate.margin) {
        (Some(cost), Some(margin)) => vec![
            Cell::new(label),
            ui::amount_cell(cost),
            ui::percent_cell(margin.margin_percent, !margin.is_loss()),
            Cell::new(as_of.unwrap_or_default()),
        ],
        _ => vec![
            Cell::new(label),
            ui::na_cell(false),
            ui::na_cell(false),
            Cell::new(as_of.unwrap_or_default()),
        ],
    }
}

fn display_report(report: &ValidationReport) {
    println!(
        "\nProduct: {}",
        ui::style_text(&report.product_id, ui::StyleType::Title)
    );

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Method"),
        ui::header_cell("Cost (net)"),
        ui::header_cell("Margin"),
        ui::header_cell("As of"),
    ]);
    table.add_row(estimate_row("Captured snapshot", &report.method_a));
    table.add_row(estimate_row("Live ledger", &report.method_b));
    println!("{table}");

    let summary = match report.status {
        ValidationStatus::Consistent => ui::style_text(
            &format!(
                "Consistent: {} points apart (tolerance {})",
                report.discrepancy.unwrap_or_default(),
                report.tolerance
            ),
            ui::StyleType::Subtle,
        ),
        ValidationStatus::DivergenceWarning => ui::style_text(
            &format!(
                "Divergence: {} points apart (tolerance {})",
                report.discrepancy.unwrap_or_default(),
                report.tolerance
            ),
            ui::StyleType::Warning,
        ),
        ValidationStatus::Incomplete => ui::style_text(
            "Incomplete: run `margo snapshot` for the same product and warehouse first, or check the purchase history",
            ui::StyleType::Error,
        ),
    };
    println!("{summary}");
}
