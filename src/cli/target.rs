use super::ui;
use crate::core::target::TargetPriceResult;
use crate::core::{Lookup, PricingService};
use anyhow::Result;
use rust_decimal::Decimal;

/// Sell price reaching a target margin, over a given cost or the resolved one.
pub async fn run(
    service: &PricingService,
    product_id: Option<&str>,
    target_margin_percent: Decimal,
    warehouse_id: Option<&str>,
    buy_net: Option<Decimal>,
    json: bool,
) -> Result<()> {
    let result = match (buy_net, product_id) {
        (Some(buy_net), _) => {
            Lookup::Found(service.solve_target_price(buy_net, target_margin_percent)?)
        }
        (None, Some(product_id)) => {
            service
                .compute_target_price(product_id, target_margin_percent, warehouse_id)
                .await?
        }
        (None, None) => anyhow::bail!("Either a product or a cost is required"),
    };
    if json {
        return ui::print_json(&result);
    }

    match result {
        Lookup::Found(target) => display_target(&target),
        Lookup::NotFound => println!(
            "No purchase history for {} in the last {} days.",
            product_id.unwrap_or_default(),
            service.settings().default_timeframe_days
        ),
    }
    Ok(())
}

fn display_target(target: &TargetPriceResult) {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Buy (net)"),
        ui::header_cell("Target margin"),
        ui::header_cell("Required sell (net)"),
    ]);
    table.add_row(vec![
        ui::amount_cell(target.resolved_buy_net),
        ui::percent_cell(target.target_margin_percent, true),
        ui::amount_cell(target.required_sell_net),
    ]);
    println!("{table}");
}
