//! docstore CLI - smoke-test a MongoDB deployment through the docstore facade
//!
//! Usage:
//!   docstore ping                                   Connect and ping
//!   docstore insert <collection> <document>         Insert one document
//!   docstore get <collection> <filter>              Find one document
//!   docstore find <collection> <filter> [--projection <json>]
//!   docstore update <collection> <filter> <update>  Update one document
//!   docstore delete <collection> <filter>           Delete one document
//!
//! Documents, filters and projections are (extended) JSON. Without --config
//! the connection is read from DOCSTORE_* environment variables.

use anyhow::{Context, Result};
use bson::{Bson, Document};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use docstore_mongodb::{connect, MongoConfig};

#[derive(Parser)]
#[command(name = "docstore")]
#[command(about = "MongoDB CRUD passthrough CLI", long_about = None)]
#[command(version)]
struct Cli {
    /// YAML configuration file (defaults to DOCSTORE_* environment variables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and run the liveness probe
    Ping,
    /// Insert a single document
    Insert {
        collection: String,
        /// Document as JSON
        document: String,
    },
    /// Find the first document matching a filter
    Get {
        collection: String,
        /// Filter as JSON
        #[arg(default_value = "{}")]
        filter: String,
    },
    /// Find all documents matching a filter
    Find {
        collection: String,
        /// Filter as JSON
        #[arg(default_value = "{}")]
        filter: String,
        /// Fields to include or exclude, as JSON
        #[arg(short, long)]
        projection: Option<String>,
    },
    /// Update the first document matching a filter
    Update {
        collection: String,
        /// Filter as JSON
        filter: String,
        /// Update document as JSON, e.g. '{"$set": {"name": "b"}}'
        update: String,
    },
    /// Delete the first document matching a filter
    Delete {
        collection: String,
        /// Filter as JSON
        filter: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let config = match &cli.config {
        Some(path) => MongoConfig::from_file(path)?,
        None => MongoConfig::from_env()?,
    };

    let client = connect(&config)
        .await
        .with_context(|| format!("Cannot reach MongoDB at {:?}", config.hosts))?;

    match cli.command {
        Commands::Ping => {
            println!("ok: {} ({})", config.hosts.join(","), config.database);
        }
        Commands::Insert { collection, document } => {
            let document = parse_document(&document)?;
            client.create_one(&collection, &document).await?;
            println!("inserted 1 document into {}", collection);
        }
        Commands::Get { collection, filter } => {
            let found: Option<Document> = client.read_one(&collection, parse_document(&filter)?).await?;
            match found {
                Some(doc) => println!("{}", render(doc)?),
                None => println!("null"),
            }
        }
        Commands::Find { collection, filter, projection } => {
            let filter = parse_document(&filter)?;
            let found: Option<Vec<Document>> = match projection {
                Some(p) => client.read_with_projection(&collection, filter, parse_document(&p)?).await?,
                None => client.read(&collection, filter).await?,
            };
            for doc in found.unwrap_or_default() {
                println!("{}", render(doc)?);
            }
        }
        Commands::Update { collection, filter, update } => {
            client
                .update_one(&collection, parse_document(&filter)?, parse_document(&update)?)
                .await?;
            println!("update sent to {}", collection);
        }
        Commands::Delete { collection, filter } => {
            let count = client.delete_one(&collection, parse_document(&filter)?).await?;
            println!("deleted {} document(s) from {}", count, collection);
        }
    }

    Ok(())
}

/// Parse a JSON object (canonical or relaxed extended JSON) into BSON
fn parse_document(raw: &str) -> Result<Document> {
    let json: serde_json::Value =
        serde_json::from_str(raw).with_context(|| format!("Invalid JSON: {}", raw))?;
    match Bson::try_from(json).context("Invalid extended JSON")? {
        Bson::Document(doc) => Ok(doc),
        other => anyhow::bail!("Expected a JSON object, got {}", other),
    }
}

fn render(doc: Document) -> Result<String> {
    Ok(serde_json::to_string(&Bson::Document(doc).into_relaxed_extjson())?)
}

/// Initialize logging based on log level
fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .ok(); // Ignore error if already initialized
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{doc, oid::ObjectId};

    #[test]
    fn test_parse_plain_object() {
        let doc = parse_document(r#"{"_id": 1, "name": "a"}"#).unwrap();
        assert_eq!(doc, doc! { "_id": 1, "name": "a" });
    }

    #[test]
    fn test_parse_extended_json() {
        let doc = parse_document(r#"{"_id": {"$oid": "65a1b2c3d4e5f60718293a4b"}}"#).unwrap();
        let expected = ObjectId::parse_str("65a1b2c3d4e5f60718293a4b").unwrap();
        assert_eq!(doc.get_object_id("_id").unwrap(), expected);
    }

    #[test]
    fn test_parse_rejects_non_object() {
        assert!(parse_document("[1, 2, 3]").is_err());
        assert!(parse_document("not json").is_err());
    }

    #[test]
    fn test_render_relaxed() {
        let rendered = render(doc! { "_id": 1, "name": "a" }).unwrap();
        assert_eq!(rendered, r#"{"_id":1,"name":"a"}"#);
    }

    #[test]
    fn test_example_config_parses() {
        let config = MongoConfig::from_yaml_str(include_str!("../docstore.example.yaml")).unwrap();
        assert_eq!(config.hosts, vec!["localhost:27017".to_string()]);
        assert_eq!(config.database, "testdb");
        assert!(!config.tls_insecure_skip_verify);
        assert!(config.client_options().is_ok());
    }

    #[test]
    fn test_cli_parses_find_with_projection() {
        let cli = Cli::try_parse_from([
            "docstore",
            "--config",
            "docstore.yaml",
            "find",
            "widgets",
            r#"{"color":"red"}"#,
            "--projection",
            r#"{"name":1}"#,
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("docstore.yaml")));
        match cli.command {
            Commands::Find { collection, projection, .. } => {
                assert_eq!(collection, "widgets");
                assert_eq!(projection.as_deref(), Some(r#"{"name":1}"#));
            }
            _ => panic!("expected find"),
        }
    }
}
