//! PIX transfer example.
//!
//! This example shows how to:
//! - Configure a client from `PIXBANK_*` environment variables
//! - Register the tracing and metrics hooks
//! - Send a PIX payment with a caller-chosen idempotency key and a deadline
//! - Handle the typed errors the API can return
//!
//! Run with:
//! `PIXBANK_BASE_URL=https://sandbox.example.com PIXBANK_API_KEY=... cargo run --example pix_transfer`

use pixbank::{CallContext, Client, ClientBuilder, Error, MetricsHook, TracingHook, Verb};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct PixPayment {
    key: String,
    amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Payment {
    #[serde(rename = "endToEndId")]
    end_to_end_id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct Balance {
    available: f64,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("pixbank=debug,pix_transfer=info")
        .init();

    let client: Client = ClientBuilder::from_env()?
        .hook(TracingHook)
        .hook(MetricsHook)
        .trace_propagation(true)
        .build()?;

    println!("=== Balance ===");
    let balance = client.get::<Balance>("/banking/balance").await?;
    println!("Available: {:.2}", balance.data.available);
    println!("Attempts: {}, latency: {:?}", balance.attempts, balance.latency);
    println!();

    println!("=== PIX payment ===");
    let payment = PixPayment {
        key: "alice@example.com".to_string(),
        amount: 42.0,
        description: Some("Lunch".to_string()),
    };
    // Reusing the key on a later run makes the server return the original payment
    let ctx = CallContext::new()
        .with_idempotency_key("demo-lunch-0001")
        .with_timeout(Duration::from_secs(10));

    match client
        .execute::<_, Payment>(Verb::Post, "/banking/pix/payments", Some(&payment), &ctx)
        .await
    {
        Ok(response) => {
            println!("Payment {} is {}", response.data.end_to_end_id, response.data.status);
        }
        Err(Error::Validation { fields, .. }) => {
            for field in fields {
                println!("Invalid {:?}: {}", field.field, field.message);
            }
        }
        Err(Error::InsufficientFunds {
            required,
            available,
            ..
        }) => {
            println!("Insufficient funds: need {:?}, have {:?}", required, available);
        }
        Err(e) if e.is_transport() => {
            println!("No response from the bank ({}); safe to retry with the same key", e);
        }
        Err(e) => {
            println!("Payment failed [{}]: {}", e.kind(), e);
            if let Some(raw) = e.raw_response() {
                println!("Raw response: {}", raw);
            }
        }
    }

    client.shutdown();
    Ok(())
}
