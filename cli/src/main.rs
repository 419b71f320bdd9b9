//! cfxrpc CLI — query a Conflux node from the terminal.
//!
//! Usage:
//! ```bash
//! # Node status and latency
//! cfxrpc status --url https://test.confluxrpc.com
//!
//! # Raw JSON-RPC call; params are a JSON array
//! cfxrpc call --method cfx_getBalance --params '["cfxtest:aa…"]'
//!
//! # Receipt lookup, or wait until the transaction is executed
//! cfxrpc receipt --hash 0x…
//! cfxrpc wait --hash 0x… --timeout 120
//! ```
//!
//! `--url` falls back to `CFXRPC_URL`. `ws://` and `wss://` URLs use the
//! WebSocket transport.

use std::env;
use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant};

use alloy_primitives::B256;
use anyhow::{anyhow, bail, Context};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use cfxrpc_client::{CfxClient, ConfirmationTracker, Outcome, TrackerConfig};
use cfxrpc_core::{ClientConfig, RetryConfig, RpcParam, RpcTransport};
use cfxrpc_http::HttpTransport;
use cfxrpc_ws::{WsClientConfig, WsTransport};

#[tokio::main]
async fn main() {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "status" => cmd_status(&args[2..]).await,
        "call" => cmd_call(&args[2..]).await,
        "receipt" => cmd_receipt(&args[2..]).await,
        "wait" => cmd_wait(&args[2..]).await,
        "version" | "--version" | "-V" => {
            println!("cfxrpc {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn print_usage() {
    println!("cfxrpc {}", env!("CARGO_PKG_VERSION"));
    println!("Query a Conflux node over JSON-RPC\n");
    println!("USAGE:");
    println!("    cfxrpc <COMMAND> [FLAGS]\n");
    println!("COMMANDS:");
    println!("    status     Network id, epoch and latency");
    println!("    call       Send a raw JSON-RPC call");
    println!("    receipt    Look up a transaction receipt");
    println!("    wait       Poll until a transaction is executed");
    println!("    version    Print version");
    println!("    help       Print this help\n");
    println!("FLAGS:");
    println!("    --url <URL>        Node endpoint [default: $CFXRPC_URL]");
    println!("    --retries <N>      Retries per request [default: 0]");
    println!("    --method <NAME>    (call) RPC method");
    println!("    --params <JSON>    (call) JSON array of parameters");
    println!("    --hash <HASH>      (receipt, wait) transaction hash");
    println!("    --timeout <SECS>   (wait) give up after SECS [default: 3600]");
}

async fn connect(args: &[String]) -> anyhow::Result<CfxClient> {
    let url = parse_flag(args, "--url")
        .or_else(|| env::var("CFXRPC_URL").ok())
        .ok_or_else(|| anyhow!("--url or CFXRPC_URL is required"))?;
    let retries = match parse_flag(args, "--retries") {
        Some(n) => n.parse().context("--retries must be a number")?,
        None => 0,
    };

    let transport: Arc<dyn RpcTransport> = if url.starts_with("ws://") || url.starts_with("wss://") {
        Arc::new(WsTransport::connect(&url, WsClientConfig::default()).await?)
    } else {
        Arc::new(HttpTransport::default_for(&url)?)
    };
    let config = ClientConfig {
        retry: RetryConfig::fixed(retries, Duration::from_secs(1)),
        ..Default::default()
    };
    CfxClient::connect(transport, config)
        .await
        .with_context(|| format!("connecting to {url}"))
}

fn parse_hash(args: &[String]) -> anyhow::Result<B256> {
    let hash = parse_flag(args, "--hash").ok_or_else(|| anyhow!("--hash is required"))?;
    hash.parse().with_context(|| format!("invalid transaction hash {hash:?}"))
}

async fn cmd_status(args: &[String]) -> anyhow::Result<()> {
    let cfx = connect(args).await?;

    let start = Instant::now();
    let status = cfx.status().await?;
    let latency = start.elapsed();
    let version = cfx.client_version().await.unwrap_or_else(|_| "unknown".into());

    println!("  Endpoint:     {}", cfx.rpc().url());
    println!("  Client:       {version}");
    println!("  Network id:   {}", status.network_id);
    println!("  Chain id:     {}", status.chain_id);
    println!("  Epoch:        {}", status.epoch_number);
    println!("  Latency:      {}ms", latency.as_millis());

    cfx.close().await;
    Ok(())
}

async fn cmd_call(args: &[String]) -> anyhow::Result<()> {
    let method = parse_flag(args, "--method").ok_or_else(|| anyhow!("--method is required"))?;
    let params: Vec<Value> = match parse_flag(args, "--params") {
        Some(raw) => serde_json::from_str(&raw).context("--params must be a JSON array")?,
        None => Vec::new(),
    };
    let params: Vec<RpcParam> = params.into_iter().map(RpcParam::from).collect();

    let cfx = connect(args).await?;
    let result: Value = cfx.rpc().call(&method, &params).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    cfx.close().await;
    Ok(())
}

async fn cmd_receipt(args: &[String]) -> anyhow::Result<()> {
    let hash = parse_hash(args)?;
    let cfx = connect(args).await?;

    match cfx.transaction_receipt(hash).await? {
        Some(receipt) => println!("{}", serde_json::to_string_pretty(&receipt)?),
        None => println!("no receipt for {hash} yet"),
    }

    cfx.close().await;
    Ok(())
}

async fn cmd_wait(args: &[String]) -> anyhow::Result<()> {
    let hash = parse_hash(args)?;
    let mut config = TrackerConfig::default();
    if let Some(secs) = parse_flag(args, "--timeout") {
        config.timeout = Duration::from_secs(secs.parse().context("--timeout must be seconds")?);
    }
    let cfx = Arc::new(connect(args).await?);

    println!("Waiting for {hash}...");
    let outcome = ConfirmationTracker::new(cfx.clone(), config).wait_for_receipt(hash).await;
    cfx.close().await;

    match outcome {
        Outcome::Confirmed(receipt) => {
            println!("  Status:       executed");
            println!("  Epoch:        {}", receipt.epoch_number.unwrap_or_default());
            println!("  Gas used:     {}", receipt.gas_used);
            if let Some(created) = receipt.contract_created {
                println!("  Contract:     {created}");
            }
            Ok(())
        }
        Outcome::Failed { message, .. } => bail!("transaction {hash} failed: {message}"),
        Outcome::TimedOut => bail!("transaction {hash} not executed before the deadline"),
    }
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).cloned()
}
