use gretch::{create, GretchOptions, RetryOptions};
use serde_json::Value;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let base_url = std::env::var("GRETCH_BASE_URL")?;

    let api = create(
        GretchOptions::new()
            .base_url(base_url)
            .timeout_ms(5_000)
            .retry(RetryOptions::default().attempts(3)),
    );

    let result = api
        .request("todos/1", GretchOptions::new())?
        .json::<Value, Value>()
        .await;

    println!("{} {}", result.status, result.url);
    match result.into_result()? {
        Some(data) => println!("{data:#}"),
        None => println!("no content"),
    }

    Ok(())
}
