//! # rttp-idempotency
//!
//! An async HTTP/1.1 framework with request idempotency: retried POST and
//! DELETE requests carrying the same `Idempotency-Key` get the first
//! response back instead of running the handler again.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rttp_idempotency::idempotency::{IdempotencyEngine, IdempotencyMiddleware};
//! use rttp_idempotency::{App, Response, Router, Server, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = IdempotencyEngine::builder()
//!         .connection_string("redis://127.0.0.1/")
//!         .build()
//!         .await?;
//!
//!     let mut router = Router::new();
//!     router.idempotent_post("/payments", |_ctx| async {
//!         Response::new(StatusCode::CREATED).body("charged")
//!     });
//!
//!     let app = App::new(router).wrap(IdempotencyMiddleware::opt_in(engine));
//!     Server::bind("127.0.0.1:8080").await?.serve(app).await?;
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod cache;
pub mod context;
pub mod http;
pub mod idempotency;
pub mod middleware;
pub mod router;
pub mod server;

pub use app::App;
pub use http::{Body, Headers, Method, Request, Response, StatusCode};
pub use router::Router;
pub use server::{Server, ServerError};
