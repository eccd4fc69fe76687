use clap::Subcommand;
use reqwest::Method;
use serde_json::Value;

use crate::cli::utils::{api_request, output_value};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum OrderCommands {
    #[command(about = "Show one order with its items and history")]
    Show {
        #[arg(help = "Order id")]
        id: String,
    },
}

pub async fn handle(cmd: OrderCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        OrderCommands::Show { id } => {
            let order = api_request(Method::GET, &format!("/api/orders/{}", id), None, true).await?;
            match output_format {
                OutputFormat::Json => output_value(&output_format, &order),
                OutputFormat::Text => {
                    print_order(&order);
                    Ok(())
                }
            }
        }
    }
}

fn print_order(order: &Value) {
    let text = |key: &str| order[key].as_str().unwrap_or_default().to_string();
    println!("Order {}  [{}]", text("order_number"), text("status"));
    println!("Placed:   {}", text("created_at"));
    if let Some(items) = order["items"].as_array() {
        for item in items {
            println!(
                "  {} x {:<32} {}",
                item["quantity"],
                item["name"].as_str().unwrap_or_default(),
                item["subtotal"].as_str().unwrap_or_default()
            );
        }
    }
    println!("Subtotal: {}", text("subtotal"));
    println!("Tax:      {}", text("tax"));
    println!("Shipping: {}", text("shipping_fee"));
    println!("Total:    {}", text("total"));
    if let Some(history) = order["status_history"].as_array() {
        println!("History:");
        for entry in history {
            println!(
                "  {}  {}",
                entry["changed_at"].as_str().unwrap_or_default(),
                entry["status"].as_str().unwrap_or_default()
            );
        }
    }
}
