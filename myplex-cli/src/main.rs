//! CLI entry point for myplex

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use myplex::builder::Limit;
use myplex::{Client, ClientConfig, Criteria, OrderBy, Params, QueryResult, Select, Value};

#[derive(Parser)]
#[command(name = "myplex")]
#[command(about = "Run queries through a tagged MySQL connection pool")]
#[command(version)]
struct Cli {
    /// Path to configuration file (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only use connections carrying this tag (repeatable)
    #[arg(short, long = "tag")]
    tags: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a statement and print its result
    Query {
        /// SQL with optional :name placeholders
        sql: String,

        /// Placeholder value as name=json, e.g. --param id=7 --param title='"Foo"'
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, serde_json::Value)>,

        /// Dispatch without waiting, then pick the result up
        #[arg(long = "async")]
        dispatch: bool,
    },
    /// Select rows from a table
    Select {
        table: String,

        /// Criteria as JSON, e.g. '{"id": {"$gt": 2}}'
        #[arg(short = 'w', long = "where")]
        filter: Option<String>,

        /// Comma separated columns
        #[arg(short, long, value_delimiter = ',')]
        fields: Vec<String>,

        /// field, field:asc or field:desc (repeatable)
        #[arg(short, long)]
        order: Vec<OrderBy>,

        #[arg(short, long)]
        limit: Option<u64>,

        #[arg(long)]
        offset: Option<u64>,
    },
    /// Open every configured connection
    Ping,
    /// Validate the configuration
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (before logging, so we can use config.log_level)
    let config = ClientConfig::load(cli.config.as_deref())?;

    // Initialize logging
    // Priority: RUST_LOG env var > config.log_level > default (debug for dev, info for release)
    let default_level = if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    };
    let log_level = config.log_level.as_deref().unwrap_or(default_level);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .init();

    config.validate()?;

    if let Commands::Check = cli.command {
        println!(
            "Configuration OK: {} connection(s)",
            config.connections.len()
        );
        return Ok(());
    }

    let client = Client::from_config(&config).await?;
    let outcome = run(&client, &cli).await;
    client.disconnect().await;
    outcome
}

async fn run(client: &Client, cli: &Cli) -> Result<()> {
    let tagged = client.tagged(cli.tags.clone());

    match &cli.command {
        Commands::Query {
            sql,
            params,
            dispatch,
        } => {
            let params: Params = params
                .iter()
                .map(|(name, value)| (name.as_str(), Value::from_json(value)))
                .collect();
            let result = if *dispatch {
                let pending = tagged.async_query(sql, &params).await?;
                debug!(sql = pending.sql(), "dispatched, waiting for result");
                pending.into_result().await?
            } else {
                tagged.query(sql, &params).await?
            };
            print_result(&result)
        }
        Commands::Select {
            table,
            filter,
            fields,
            order,
            limit,
            offset,
        } => {
            let mut select = Select::new().fields(fields.iter().map(String::as_str));
            if let Some(filter) = filter {
                let json: serde_json::Value =
                    serde_json::from_str(filter).context("--where is not valid JSON")?;
                select = select.filter(Criteria::from_json(&json)?);
            }
            for order in order {
                select = select.order_by(order.clone());
            }
            match (limit, offset) {
                (Some(count), offset) => {
                    select = select.limit(Limit::new(*count).offset(offset.unwrap_or(0)))
                }
                (None, Some(_)) => bail!("--offset requires --limit"),
                (None, None) => {}
            }
            let rows = tagged.table(table.as_str(), "id").select(&select).await?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
            Ok(())
        }
        Commands::Ping => {
            for connection in client.pool().connections() {
                if !connection.tags().matches(tagged.tags()) {
                    continue;
                }
                connection
                    .connect()
                    .await
                    .with_context(|| format!("connection {} failed", connection.id()))?;
                println!(
                    "{} {} {} ok",
                    connection.id(),
                    connection.address(),
                    connection.tags()
                );
            }
            info!("all connections answered");
            Ok(())
        }
        Commands::Check => Ok(()),
    }
}

fn print_result(result: &QueryResult) -> Result<()> {
    if result.rows().is_empty() {
        let summary = serde_json::json!({
            "affected_rows": result.affected_rows(),
            "inserted_id": result.inserted_id(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", serde_json::to_string_pretty(result.rows())?);
    }
    Ok(())
}

fn parse_param(s: &str) -> std::result::Result<(String, serde_json::Value), String> {
    let (name, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", s))?;
    let name = name.trim_start_matches(':');
    if name.is_empty() {
        return Err(format!("empty parameter name in '{}'", s));
    }
    // bare words are taken as strings
    let value = serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::from(raw));
    Ok((name.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param() {
        assert_eq!(
            parse_param("id=7").unwrap(),
            ("id".to_string(), serde_json::json!(7))
        );
        assert_eq!(
            parse_param(":title=\"Foo\"").unwrap(),
            ("title".to_string(), serde_json::json!("Foo"))
        );
        assert_eq!(
            parse_param("title=Foo").unwrap(),
            ("title".to_string(), serde_json::json!("Foo"))
        );
        assert!(parse_param("nothing").is_err());
        assert!(parse_param("=1").is_err());
    }

    #[test]
    fn test_cli_parses_select() {
        let cli = Cli::try_parse_from([
            "myplex", "--tag", "replica", "select", "foobar", "--fields", "id,title", "--order",
            "id:desc", "--limit", "2",
        ])
        .unwrap();
        assert_eq!(cli.tags, vec!["replica"]);
        match cli.command {
            Commands::Select {
                table,
                fields,
                order,
                limit,
                ..
            } => {
                assert_eq!(table, "foobar");
                assert_eq!(fields, vec!["id", "title"]);
                assert_eq!(order, vec![OrderBy::desc("id")]);
                assert_eq!(limit, Some(2));
            }
            _ => panic!("expected select"),
        }
    }
}
