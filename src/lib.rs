//! Property Offload - background processing for property listings
//!
//! Moves CPU-bound list processing (filtering, sorting and feature
//! extraction over property records) off the caller's async context onto an
//! isolated background worker, correlates the results back to each caller,
//! enforces a deadline per task and falls back to in-process execution when
//! no worker can be started.
//!
//! # Overview
//!
//! - [`protocol`]: record model and the JSON envelopes exchanged with workers
//! - [`processing`]: the reference algorithms, also used as the fallback
//! - [`worker`]: worker traits and the OS-thread implementation
//! - [`dispatch`]: the dispatcher, its registry and pending task futures
//! - [`config`], [`error`], [`observability`]: configuration, errors, logging and metrics
//!
//! # Quick Start
//!
//! ```rust
//! use property_offload::{Dispatcher, DispatcherConfig, ProcessingOptions, Record, SortDirection};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), property_offload::OffloadError> {
//! let dispatcher = Dispatcher::new(&DispatcherConfig::default());
//!
//! let records = vec![
//!     Record::new().with_id("a").with_price(420_000.0).with_transaction_type("Venda"),
//!     Record::new().with_id("b").with_price(2_500.0).with_transaction_type("Aluguel"),
//!     Record::new().with_id("c").with_price(310_000.0).with_transaction_type("Venda"),
//! ];
//!
//! let result = dispatcher
//!     .process_properties(
//!         records.clone(),
//!         ProcessingOptions::new()
//!             .filter_by_type("Venda")
//!             .sort_by_price(SortDirection::Asc),
//!     )
//!     .await?;
//! assert_eq!(result.metadata.filtered_count, 2);
//! assert_eq!(result.properties[0].id.as_deref(), Some("c"));
//!
//! let features = dispatcher.extract_features(records).await?;
//! assert_eq!(features.max_price, 420_000.0);
//!
//! dispatcher.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod observability;
pub mod processing;
pub mod protocol;
pub mod testing;
pub mod worker;

pub use config::*;
pub use dispatch::{Dispatcher, PendingTask};
pub use error::{OffloadError, OffloadResult};
pub use protocol::*;
