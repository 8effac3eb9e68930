//! Typed MongoDB configuration and CRUD passthrough
//!
//! This crate turns a declarative [`MongoConfig`] into driver client options,
//! connects and pings the deployment, and exposes a small CRUD surface on
//! [`DocumentClient`].
//!
//! # Features
//! - Sparse option merge: zero-valued settings keep the driver default
//! - Distinct errors for "could not connect" and "connected but ping failed"
//! - Not-found reads return `Ok(None)` instead of an error
//! - Cursors are always released before a read returns
//!
//! # Example
//!
//! ```no_run
//! use bson::{doc, Document};
//! use docstore_mongodb::{connect, MongoConfig};
//!
//! # async fn example() -> docstore_mongodb::Result<()> {
//! let config = MongoConfig::new(["localhost:27017"], "testdb");
//! let client = connect(&config).await?;
//!
//! client.create_one("widgets", &doc! { "_id": 1, "name": "a" }).await?;
//! let widget: Option<Document> = client.read_one("widgets", doc! { "_id": 1 }).await?;
//! assert!(widget.is_some());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod store;

pub use client::DocumentClient;
pub use config::{ConnectionTuning, MongoConfig};
pub use connection::connect;
pub use error::{Error, Result};
pub use store::{DocumentCursor, DocumentStore, DriverResult, MongoCursor, MongoStore};
