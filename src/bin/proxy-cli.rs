use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use url::Url;

use rewrite_proxy::canonical::Canonicalizer;

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Path tools and management CLI for the rewriting proxy", long_about = None)]
struct Cli {
    /// Base URL of a running proxy
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    /// Admin API key
    #[arg(short, long, default_value = "")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the proxy path for a target URL
    Encode {
        target: String,
        #[arg(long, default_value = "/proxy/")]
        prefix: String,
    },
    /// Print the target URL of a proxy path
    Decode {
        path: String,
        #[arg(long, default_value = "/proxy/")]
        prefix: String,
    },
    /// Fetch a target through the running proxy
    Fetch { target: String },
    /// Show response cache statistics
    CacheStats,
    /// Empty the response cache
    CacheClear,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Encode { target, prefix } => {
            let canonicalizer = Canonicalizer::new(prefix, "/ws/");
            let url = Url::parse(&target).or_else(|_| Url::parse(&format!("https://{}", target)))?;
            println!("{}", canonicalizer.encode(&url));
        }
        Commands::Decode { path, prefix } => {
            let canonicalizer = Canonicalizer::new(prefix, "/ws/");
            println!("{}", canonicalizer.decode(&path)?);
        }
        Commands::Fetch { target } => {
            let canonicalizer = Canonicalizer::default();
            let url = Url::parse(&target).or_else(|_| Url::parse(&format!("https://{}", target)))?;
            let base = cli.url.trim_end_matches('/');
            let endpoint = format!("{}{}", base, canonicalizer.encode(&url));
            let res = reqwest::get(endpoint).await?;

            let status = res.status();
            let cache = res
                .headers()
                .get("x-cache")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_string();
            let content_type = res
                .headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_string();
            let body = res.bytes().await?;

            println!("status:       {}", status);
            println!("x-cache:      {}", cache);
            println!("content-type: {}", content_type);
            println!("body bytes:   {}", body.len());
        }
        Commands::CacheStats => {
            let client = reqwest::Client::new();
            let res = client
                .get(format!("{}/admin/cache", cli.url))
                .headers(admin_headers(&cli.key)?)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::CacheClear => {
            let client = reqwest::Client::new();
            let res = client
                .delete(format!("{}/admin/cache", cli.url))
                .headers(admin_headers(&cli.key)?)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

fn admin_headers(key: &str) -> Result<HeaderMap, Box<dyn std::error::Error>> {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", key))?);
    Ok(headers)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Details: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
