//! restkit CLI
//!
//! Issue a single rate-limited, retried request and print the JSON result.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use restkit::logging::{self, LogFormat};
use restkit::{ApiClient, ConfigLoader, RequestOptions};
use reqwest::Method;
use serde_json::Value;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "restkit", version, about = "Rate-limited JSON REST client")]
struct Cli {
    /// Config file (defaults to $RESTKIT_CONFIG, ./restkit.json, then user dirs)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Base URL, overriding the config file
    #[arg(long, env = "RESTKIT_BASE_URL")]
    base_url: Option<String>,

    /// Bearer token, overriding the config file
    #[arg(long, env = "RESTKIT_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// GET an endpoint
    Get(RequestArgs),
    /// POST to an endpoint
    Post(RequestArgs),
    /// PUT to an endpoint
    Put(RequestArgs),
    /// DELETE an endpoint
    Delete(RequestArgs),
}

#[derive(Debug, clap::Args)]
struct RequestArgs {
    /// Endpoint path appended to the base URL, e.g. /users/1
    endpoint: String,

    /// Query parameter as key=value (repeatable)
    #[arg(long = "query", short = 'q')]
    query: Vec<String>,

    /// Header as name:value (repeatable)
    #[arg(long = "header", short = 'H')]
    headers: Vec<String>,

    /// JSON request body
    #[arg(long, short)]
    data: Option<String>,
}

impl Command {
    fn split(self) -> (Method, RequestArgs) {
        match self {
            Command::Get(args) => (Method::GET, args),
            Command::Post(args) => (Method::POST, args),
            Command::Put(args) => (Method::PUT, args),
            Command::Delete(args) => (Method::DELETE, args),
        }
    }
}

impl RequestArgs {
    fn options(&self) -> anyhow::Result<RequestOptions> {
        let mut options = RequestOptions::new();

        for pair in &self.query {
            let Some((key, value)) = pair.split_once('=') else {
                bail!("query parameter {:?} must look like key=value", pair);
            };
            options = options.query(key, value);
        }

        for pair in &self.headers {
            let Some((name, value)) = pair.split_once(':') else {
                bail!("header {:?} must look like name:value", pair);
            };
            options = options.header(name.trim(), value.trim());
        }

        if let Some(data) = &self.data {
            let body: Value = serde_json::from_str(data).context("--data is not valid JSON")?;
            options = options.json(body);
        }

        Ok(options)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    if let Err(e) = logging::init(format, "restkit=info") {
        eprintln!("Warning: {e}");
    }

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut loader = match &cli.config {
        Some(path) => ConfigLoader::from_path(path)?,
        None => ConfigLoader::new()?,
    };
    if let Some(base_url) = cli.base_url {
        loader = loader.with_base_url(base_url);
    }
    let mut config = loader.into_config()?;
    if let Some(key) = cli.api_key {
        config.api_key = Some(key);
    }

    let client = ApiClient::new(config)?;
    let (method, args) = cli.command.split();
    let options = args.options()?;

    let value = client
        .request(method, &args.endpoint, options)
        .await
        .with_context(|| format!("request to {} failed", args.endpoint))?;

    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_request_args() {
        let cli = Cli::try_parse_from([
            "restkit",
            "--base-url",
            "https://api.example.com",
            "post",
            "/items",
            "-q",
            "page=2",
            "-H",
            "X-Tenant: acme",
            "--data",
            r#"{"name": "widget"}"#,
        ])
        .unwrap();

        let (method, args) = cli.command.split();
        assert_eq!(method, Method::POST);
        assert_eq!(args.endpoint, "/items");

        let options = args.options().unwrap();
        assert_eq!(options.query, vec![("page".to_string(), "2".to_string())]);
        assert_eq!(options.headers.get("X-Tenant").map(String::as_str), Some("acme"));
        assert_eq!(options.body, Some(serde_json::json!({"name": "widget"})));
    }

    #[test]
    fn test_rejects_malformed_pairs() {
        let args = RequestArgs {
            endpoint: "/x".to_string(),
            query: vec!["novalue".to_string()],
            headers: Vec::new(),
            data: None,
        };
        assert!(args.options().is_err());

        let args = RequestArgs {
            endpoint: "/x".to_string(),
            query: Vec::new(),
            headers: Vec::new(),
            data: Some("{not json".to_string()),
        };
        assert!(args.options().is_err());
    }
}
