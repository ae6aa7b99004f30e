use std::time::Duration;

use retry_requests::{Payload, RequestConfig};
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let url =
        std::env::var("REQUESTS_DEMO_URL").unwrap_or_else(|_| "https://httpbin.org".to_owned());

    let mut http = RequestConfig::from_env()?
        .with_retry(3)
        .with_retry_delay(Duration::from_millis(500))
        .with_header("Accept", "application/json")?;

    http.get(&format!("{url}/get")).await?;
    if let Some(response) = http.response() {
        println!("GET {} -> {} bytes", response.status(), response.body().len());
    }

    http.post(&format!("{url}/post"), Payload::serialize(&json!({"name": "Kit"}))?)
        .await?;
    let echoed = http.decode_json()?;
    println!("POST echoed keys: {:?}", echoed.keys().collect::<Vec<_>>());

    Ok(())
}
