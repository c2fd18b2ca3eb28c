mod args;
mod client;
mod output;

use anyhow::Result;
use clap::Parser;
use futures_util::StreamExt;
use reqwest::Client;

use crate::args::{Args, Command};
use crate::client::base_url;
use crate::output::{print_launch_result, print_recipes};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let client = Client::new();
    let base = base_url(&args.server_url);

    match args.command {
        Command::List => {
            let resp = client.get(format!("{base}/recipes")).send().await?;
            if resp.status().is_success() {
                let recipes: Vec<serde_json::Value> = resp.json().await?;
                print_recipes(&recipes);
            } else {
                eprintln!("✗ Failed to list recipes: {}", resp.text().await?);
            }
        }
        Command::Show { id } => {
            let resp = client.get(format!("{base}/recipes/{id}")).send().await?;
            if resp.status().is_success() {
                let recipe: serde_json::Value = resp.json().await?;
                println!("{}", serde_json::to_string_pretty(&recipe)?);
            } else {
                eprintln!("✗ Recipe '{id}' not found: {}", resp.text().await?);
            }
        }
        Command::Launch { id } => {
            let resp = client.post(format!("{base}/launch/{id}")).send().await?;
            let result: serde_json::Value = resp.json().await?;
            print_launch_result(&result);
        }
        Command::Cancel { id } => {
            let resp = client
                .post(format!("{base}/launch/{id}/cancel"))
                .send()
                .await?;
            if resp.status().is_success() {
                println!("✓ Cancelled launch for '{id}'");
            } else {
                eprintln!("✗ Failed to cancel '{id}': {}", resp.text().await?);
            }
        }
        Command::Evict { port, force } => {
            let resp = client
                .post(format!("{base}/evict?port={port}&force={force}"))
                .send()
                .await?;
            if resp.status().is_success() {
                println!("✓ Evicted process on port {port}");
            } else {
                eprintln!("✗ Failed to evict port {port}: {}", resp.text().await?);
            }
        }
        Command::WaitReady { id, timeout } => {
            let mut url = format!("{base}/wait-ready?id={id}");
            if let Some(t) = timeout {
                url.push_str(&format!("&timeout={t}"));
            }
            let resp = client.get(url).send().await?;
            if resp.status().is_success() {
                println!("✓ '{id}' is ready");
            } else {
                eprintln!("✗ '{id}' did not become ready: {}", resp.text().await?);
            }
        }
        Command::Events => {
            let resp = client.get(format!("{base}/events")).send().await?;
            let mut stream = resp.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                print!("{}", String::from_utf8_lossy(&chunk));
            }
        }
        Command::Metrics => {
            let resp = client.get(format!("{base}/metrics")).send().await?;
            println!("{}", resp.text().await?);
        }
    }

    Ok(())
}
