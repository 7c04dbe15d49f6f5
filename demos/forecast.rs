use anyhow::Result;
use bigml::{CancelToken, PollingPolicy, ResourceClient, ResourceKind};
use serde_json::json;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // RUST_LOG=bigml=debug shows every request.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bigml=info")),
        )
        .with_target(false)
        .init();

    // Configure authentication via env vars or a `.bigmlrc` file.
    let forecasts = ResourceClient::from_env(ResourceKind::FORECAST)?;

    let time_series = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "timeseries/5af06df94e17277501000010".to_string());
    let input = json!({"000005": {"horizon": 10}});
    let args = json!({"name": "demo forecast"});

    let created = forecasts.create(
        &time_series,
        input.as_object(),
        args.as_object(),
        Some(PollingPolicy::new(Duration::from_secs(3), 10)),
    )?;

    let finished = forecasts.wait_ready(
        bigml::resource_id(&created).unwrap_or_default(),
        Some(PollingPolicy::new(Duration::from_secs(2), 30)),
        &CancelToken::new(),
    )?;

    println!("{}", serde_json::to_string_pretty(&finished)?);
    Ok(())
}
