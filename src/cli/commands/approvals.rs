use clap::Subcommand;
use reqwest::Method;
use serde_json::{json, Value};

use crate::cli::utils::{api_request, output_empty_collection, output_success, output_value};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum ApprovalCommands {
    #[command(about = "List approvals (pending by default)")]
    List {
        #[arg(long, default_value = "pending", help = "pending, approved or rejected")]
        status: String,
        #[arg(long, help = "seller, product or travel_listing")]
        kind: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },

    #[command(about = "Approve an item")]
    Approve {
        id: String,
        #[arg(long)]
        notes: Option<String>,
    },

    #[command(about = "Reject an item (notes are required)")]
    Reject {
        id: String,
        #[arg(long)]
        notes: String,
    },
}

pub async fn handle(cmd: ApprovalCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ApprovalCommands::List { status, kind, limit } => {
            let mut path = format!("/api/admin/approvals?status={}&limit={}", status, limit);
            if let Some(kind) = kind {
                path.push_str(&format!("&item_kind={}", kind));
            }
            let page = api_request(Method::GET, &path, None, true).await?;
            let items = page.get("items").and_then(Value::as_array).cloned().unwrap_or_default();
            if items.is_empty() {
                return output_empty_collection(&output_format, "approvals", &format!("No {} approvals", status));
            }
            match output_format {
                OutputFormat::Json => output_value(&output_format, &page),
                OutputFormat::Text => {
                    for item in &items {
                        println!(
                            "{}  {:<15} {}  {}",
                            item["id"].as_str().unwrap_or_default(),
                            item["item_kind"].as_str().unwrap_or_default(),
                            item["item_id"].as_str().unwrap_or_default(),
                            item["created_at"].as_str().unwrap_or_default()
                        );
                    }
                    println!("{} of {}", items.len(), page["total"]);
                    Ok(())
                }
            }
        }
        ApprovalCommands::Approve { id, notes } => {
            let approval = api_request(
                Method::POST,
                &format!("/api/admin/approvals/{}/approve", id),
                Some(json!({ "notes": notes })),
                true,
            )
            .await?;
            output_success(&output_format, &format!("Approval {} approved", id), Some(json!({ "approval": approval })))
        }
        ApprovalCommands::Reject { id, notes } => {
            let approval = api_request(
                Method::POST,
                &format!("/api/admin/approvals/{}/reject", id),
                Some(json!({ "notes": notes })),
                true,
            )
            .await?;
            output_success(&output_format, &format!("Approval {} rejected", id), Some(json!({ "approval": approval })))
        }
    }
}
