//! # Pixbank - a resilient client for a banking HTTP/JSON API
//!
//! Every API operation (PIX transfers, boletos, balances, webhooks) goes
//! through one executor that serializes the request, retries transient
//! failures for safe verbs, classifies error responses into typed errors, and
//! deserializes the result. Each logical call yields exactly one terminal
//! result, including when something panics along the way.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pixbank::{CallContext, Client, Verb};
//! use serde::{Deserialize, Serialize};
//! use std::time::Duration;
//!
//! #[derive(Serialize)]
//! struct PixPayment {
//!     key: String,
//!     amount: f64,
//! }
//!
//! #[derive(Deserialize)]
//! struct Payment {
//!     end_to_end_id: String,
//! }
//!
//! #[derive(Deserialize)]
//! struct Balance {
//!     available: f64,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), pixbank::Error> {
//!     let client = Client::builder()
//!         .base_url("https://api.example.com/banking")?
//!         .api_key("secret")
//!         .timeout(Duration::from_secs(30))
//!         .build()?;
//!
//!     // GET is retried up to 3 times on transport errors and 429/5xx
//!     let balance = client.get::<Balance>("/balance").await?;
//!     println!("Available: {}", balance.data.available);
//!
//!     // POST gets one attempt and an automatic idempotency key
//!     let payment = PixPayment { key: "alice@example.com".into(), amount: 10.0 };
//!     let ctx = CallContext::new().with_idempotency_key("invoice-2291");
//!     let created = client
//!         .execute::<_, Payment>(Verb::Post, "/pix/payments", Some(&payment), &ctx)
//!         .await?;
//!     println!("Sent: {}", created.data.end_to_end_id);
//!
//!     client.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Error statuses are mapped to one variant per meaning; the raw body is kept:
//!
//! ```no_run
//! use pixbank::{Client, Error};
//!
//! # async fn example() -> Result<(), Error> {
//! # let client = Client::builder().base_url("https://api.example.com")?.api_key("k").build()?;
//! match client.post::<_, serde_json::Value>("/pix/payments", &serde_json::json!({})).await {
//!     Ok(response) => println!("Created: {:?}", response.data),
//!     Err(Error::Validation { fields, .. }) => {
//!         for field in fields {
//!             eprintln!("{:?}: {}", field.field, field.message);
//!         }
//!     }
//!     Err(Error::InsufficientFunds { available, .. }) => {
//!         eprintln!("Not enough funds, available: {:?}", available);
//!     }
//!     Err(e) if e.is_transport() => eprintln!("No response: {}", e),
//!     Err(e) => eprintln!("{} error: {}", e.kind(), e),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Hooks
//!
//! Register [`Hook`]s to observe every physical attempt. [`TracingHook`] and
//! [`MetricsHook`] ship with the crate.
//!
//! ```no_run
//! use pixbank::{Client, MetricsHook, TracingHook};
//!
//! # fn example() -> Result<(), pixbank::Error> {
//! let client = Client::builder()
//!     .base_url("https://api.example.com")?
//!     .api_key("secret")
//!     .hook(TracingHook)
//!     .hook(MetricsHook)
//!     .trace_propagation(true)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

pub mod classify;
mod client;
pub mod context;
mod error;
mod fault;
pub mod hooks;
pub mod idempotency;
pub mod propagation;
pub mod request;
mod response;
pub mod retry;
pub mod telemetry;
pub mod tls;

pub use classify::classify;
pub use client::{
    Client, ClientBuilder, API_KEY_HEADER, ENV_API_KEY, ENV_BASE_URL, ENV_TIMEOUT_SECS,
    ENV_USER_AGENT, IDEMPOTENCY_KEY_HEADER,
};
pub use context::{CallContext, CancellationToken};
pub use error::{ApiError, Error, ErrorKind, FieldError, Result};
pub use hooks::{Hook, Hooks, TracingHook};
pub use idempotency::IdempotencyKey;
pub use request::{join_url, RequestSpec, Verb};
pub use response::Response;
pub use retry::RetryPolicy;
pub use telemetry::MetricsHook;
pub use tls::{TlsConfig, TlsVersion};
