//! One-shot CLI: generate a plan for a goal given on the command line and
//! print the result with cache and usage statistics.

use anyhow::Result;
use planpilot::logging::init_logging;
use planpilot::service::{GenerateOptions, PlanService};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let goal = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if goal.trim().is_empty() {
        eprintln!("usage: planpilot <goal>");
        std::process::exit(2);
    }

    let service = PlanService::from_env()?;
    let response = service
        .generate_plan(&goal, &GenerateOptions::default())
        .await;
    service.record_success(200);

    let output = json!({
        "plan": response,
        "cache": service.cache_stats(),
        "analytics": service.metrics_snapshot(),
        "costs": service.estimate_costs(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
