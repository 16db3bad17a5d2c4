use super::ui;
use crate::core::service::MarginQuote;
use crate::core::{Lookup, MarginResult, PricingService, ResolutionStrategy};
use anyhow::Result;
use rust_decimal::Decimal;

/// Margin between two known prices, without a ledger lookup.
pub fn run_margin(
    service: &PricingService,
    sell_net: Decimal,
    buy_net: Decimal,
    json: bool,
) -> Result<()> {
    let margin = service.compute_margin(sell_net, buy_net)?;
    if json {
        return ui::print_json(&margin);
    }

    display_margin(&margin, service.meets_minimum(sell_net, buy_net)?);
    if margin.is_zero() {
        println!(
            "{}",
            ui::style_text(
                "Both prices must be positive; reported as zero margin.",
                ui::StyleType::Subtle
            )
        );
    }
    Ok(())
}

/// Margin of a product against the cost resolved from its purchase history.
pub async fn run_quote(
    service: &PricingService,
    product_id: &str,
    sell_net: Decimal,
    warehouse_id: Option<&str>,
    strategy: Option<ResolutionStrategy>,
    json: bool,
) -> Result<()> {
    let quote = service
        .resolve_product_margin(product_id, sell_net, warehouse_id, strategy)
        .await?;
    if json {
        return ui::print_json(&quote);
    }

    match quote {
        Lookup::Found(quote) => display_quote(&quote),
        Lookup::NotFound => println!(
            "No purchase history for {} in the last {} days.",
            product_id,
            service.settings().default_timeframe_days
        ),
    }
    Ok(())
}

fn display_margin(margin: &MarginResult, meets_minimum: bool) {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Sell (net)"),
        ui::header_cell("Buy (net)"),
        ui::header_cell("Profit"),
        ui::header_cell("Margin"),
        ui::header_cell("Markup"),
    ]);
    table.add_row(vec![
        ui::amount_cell(margin.sell_net),
        ui::amount_cell(margin.buy_net),
        ui::profit_cell(margin),
        ui::percent_cell(margin.margin_percent, meets_minimum),
        ui::percent_cell(margin.markup_percent, true),
    ]);
    println!("{table}");
}

fn display_quote(quote: &MarginQuote) {
    println!(
        "\nProduct: {}",
        ui::style_text(&quote.cost.product_id, ui::StyleType::Title)
    );
    println!(
        "{}",
        ui::style_text(
            &format!(
                "Cost {} from {} purchase(s), {} strategy over {} days",
                quote.cost.cost_net,
                quote.cost.records_considered,
                quote.cost.strategy_used,
                quote.cost.timeframe_days
            ),
            ui::StyleType::Subtle
        )
    );
    display_margin(&quote.margin, quote.meets_minimum);
    if !quote.meets_minimum {
        println!(
            "{}",
            ui::style_text("Below the minimum acceptable margin", ui::StyleType::Warning)
        );
    }
}
