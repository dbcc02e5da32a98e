//! Probes a memory service: health, capability contract and one write.
//!
//! Configuration comes from the environment (`AIONIS_BASE_URL`, `API_KEY`,
//! `AUTH_BEARER`, `ADMIN_TOKEN`).
//!
//! Run with: `cargo run --example capability_probe`

use aionis_client::{capability, ClientBuilder, Error, RequestOptions, RetryOverride};
use serde_json::json;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("aionis_client=debug,capability_probe=info")
        .init();

    let client = ClientBuilder::from_env()?
        .timeout(Duration::from_secs(5))
        .retry(RetryOverride::new().max_retries(3))
        .build()?;

    println!("Probing {}", client.base_url());

    let health = client.health(RequestOptions::default()).await?;
    println!(
        "backend={:?} ok={} ({} attempt(s), request {})",
        health.memory_store_backend, health.ok, health.attempts, health.request_id
    );

    let contract = client.capability_contract(RequestOptions::default()).await?;
    for name in contract.capabilities() {
        let enabled = health.capability_enabled(name);
        match contract.spec(name) {
            Some(spec) => println!(
                "  {:<18} enabled={:?} failure_mode={} degraded={:?}",
                name,
                enabled,
                spec.failure_mode.as_str(),
                spec.degraded_modes
            ),
            None => println!("  {:<18} enabled={:?} (unrecognized contract)", name, enabled),
        }
    }

    let export = client
        .pack_export(
            &json!({ "tenant_id": "default", "scope": "default", "limit": 1 }),
            RequestOptions::new().with_retry(RetryOverride::new().max_retries(0)),
        )
        .await;

    match export {
        Ok(response) => println!("pack export ok: {}", response.data),
        Err(err) if capability::is_backend_capability_unsupported(&err) => {
            if let Some(details) = err.as_api().and_then(|e| e.capability_details()) {
                println!(
                    "pack export unavailable: capability={} backend={:?} degraded_mode={:?}",
                    details.capability, details.backend, details.degraded_mode
                );
            }
        }
        Err(err) => {
            eprintln!("pack export failed: {} (request {:?})", err, err.request_id());
        }
    }

    Ok(())
}
