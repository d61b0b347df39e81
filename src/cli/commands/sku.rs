//! Sku command - normalize pricing tier codes

use super::CommandContext;
use anyhow::Result;
use azure_webapp::modules::cloud::azure::sku::{get_sku_name, normalize_sku};
use clap::Parser;
use serde::Serialize;

/// Arguments for the sku command
#[derive(Parser, Debug, Clone)]
pub struct SkuArgs {
    /// Pricing tier codes, e.g. S1, free, P2V2
    #[arg(required = true)]
    pub codes: Vec<String>,
}

#[derive(Debug, Serialize)]
struct SkuRow {
    input: String,
    sku: String,
    tier: String,
}

impl SkuArgs {
    /// Execute the sku command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let mut rows = Vec::new();
        let mut invalid = 0;

        for code in &self.codes {
            let sku = normalize_sku(code);
            match get_sku_name(&sku) {
                Ok(tier) => rows.push(SkuRow {
                    input: code.clone(),
                    sku: sku.to_uppercase(),
                    tier: tier.to_string(),
                }),
                Err(e) => {
                    ctx.output.error(&e.to_string());
                    invalid += 1;
                }
            }
        }

        ctx.output.emit(&rows);
        let table: Vec<Vec<String>> = rows
            .iter()
            .map(|r| vec![r.input.clone(), r.sku.clone(), r.tier.clone()])
            .collect();
        ctx.output.table(&["INPUT", "SKU", "TIER"], &table);

        Ok(if invalid == 0 { 0 } else { 1 })
    }
}
