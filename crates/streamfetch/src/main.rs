//! Call a console API from the command line.
//!
//! The base URL comes from `--base-url` or `STREAMFETCH_BASE_URL`; the bearer
//! token from `--token` or `STREAMFETCH_TOKEN`. Log verbosity follows
//! `RUST_LOG` (default `warn`).
//!
//! # Examples
//!
//! ```sh
//! # Plain GET with query parameters
//! streamfetch get /apps --query page=1 --query limit=20
//!
//! # POST a JSON body, print status and headers too
//! streamfetch post /apps --body '{"name":"demo"}' --raw
//!
//! # Form-encoded login
//! streamfetch post /login --form email=a@b.c --form password=secret
//!
//! # Stream an answer as it arrives (Ctrl-C aborts)
//! streamfetch stream /chat-messages --body '{"query":"hi","inputs":{}}'
//! ```

use std::io::{self, Write};
use std::process;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use reqwest::Method;
use streamfetch::api::{AbortHandle, ClientOptions, RequestSpec, ResponseBody, StreamHandlers};
use streamfetch::auth::{MemoryStore, StoredToken};
use streamfetch::notify::LoggingNotifier;
use streamfetch::{Client, ClientConfig, ClientError};
use tracing_subscriber::EnvFilter;

/// Call a console API from the command line.
#[derive(Parser)]
#[command(name = "streamfetch", version)]
struct Cli {
    /// API base URL (overrides STREAMFETCH_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Bearer token sent with every request
    #[arg(long, env = "STREAMFETCH_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,

    /// Do not report failures through the notifier
    #[arg(long, global = true)]
    silent: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send a GET request
    Get(UnaryArgs),
    /// Send a POST request
    Post(UnaryArgs),
    /// Send a PUT request
    Put(UnaryArgs),
    /// Send a PATCH request
    Patch(UnaryArgs),
    /// Send a DELETE request
    Delete(UnaryArgs),
    /// POST and print streamed answer fragments as they arrive
    Stream(StreamArgs),
}

#[derive(Args)]
struct RequestArgs {
    /// Path relative to the base URL, or an absolute URL
    path: String,

    /// JSON request body
    #[arg(long, conflicts_with = "form")]
    body: Option<String>,

    /// Form field as key=value (repeatable)
    #[arg(long, value_parser = parse_pair)]
    form: Vec<(String, String)>,

    /// Query parameter as key=value (repeatable)
    #[arg(long, value_parser = parse_pair)]
    query: Vec<(String, String)>,

    /// Extra header as name=value (repeatable)
    #[arg(long, value_parser = parse_pair)]
    header: Vec<(String, String)>,
}

#[derive(Args)]
struct UnaryArgs {
    #[command(flatten)]
    request: RequestArgs,

    /// Print the status line and headers along with the body
    #[arg(long)]
    raw: bool,
}

#[derive(Args)]
struct StreamArgs {
    #[command(flatten)]
    request: RequestArgs,
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
        _ => Err(format!("expected key=value, got '{s}'")),
    }
}

fn build_spec(args: &RequestArgs) -> Result<RequestSpec, String> {
    let mut spec = RequestSpec::new();
    for (name, value) in &args.header {
        spec = spec.header(name, value);
    }
    for (key, value) in &args.query {
        spec = spec.query(key, value);
    }
    if let Some(body) = &args.body {
        let value: serde_json::Value =
            serde_json::from_str(body).map_err(|e| format!("--body is not valid JSON: {e}"))?;
        spec = spec.json(value);
    } else if !args.form.is_empty() {
        spec = spec.form(&args.form);
    }
    Ok(spec)
}

fn build_client(cli: &Cli) -> Result<Client, ClientError> {
    let mut config = ClientConfig::from_env();
    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url);
    }

    let token = StoredToken::with_key(MemoryStore::new(), config.token_key.clone());
    if let Some(value) = &cli.token {
        token.set(value);
    }

    Client::new(config, Arc::new(token), Arc::new(LoggingNotifier))
}

/// Abort `handle` when the user presses Ctrl-C.
fn abort_on_ctrl_c(handle: AbortHandle) {
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if result.is_ok() {
                    handle.abort();
                }
            }
            _ = handle.aborted() => {}
        }
    });
}

fn base_options(cli: &Cli) -> ClientOptions {
    let options = ClientOptions::default();
    if cli.silent { options.silent() } else { options }
}

async fn run_unary(
    client: &Client,
    cli: &Cli,
    method: Method,
    args: &UnaryArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let spec = build_spec(&args.request)?;
    let mut options = base_options(cli).with_abort_sink(abort_on_ctrl_c);
    if args.raw {
        options = options.with_all_response_content();
    }

    let body = client
        .request(method, &args.request.path, &spec, &options)
        .await?;

    let mut stdout = io::stdout().lock();
    match body {
        ResponseBody::Json(value) => {
            writeln!(stdout, "{}", serde_json::to_string_pretty(&value)?)?;
        }
        ResponseBody::Binary(bytes) => stdout.write_all(&bytes)?,
        ResponseBody::Raw(response) => {
            writeln!(stdout, "HTTP {}", response.status)?;
            for (name, value) in &response.headers {
                writeln!(stdout, "{name}: {}", value.to_str().unwrap_or("<binary>"))?;
            }
            writeln!(stdout)?;
            writeln!(stdout, "{}", String::from_utf8_lossy(&response.body))?;
        }
    }
    Ok(())
}

async fn run_stream(
    client: &Client,
    cli: &Cli,
    args: &StreamArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let spec = build_spec(&args.request)?;
    let options = base_options(cli);

    let mut failure: Option<String> = None;
    let handlers = StreamHandlers::new()
        .on_abort_handle(abort_on_ctrl_c)
        .on_message(|fragment| {
            let mut stdout = io::stdout().lock();
            let _ = stdout.write_all(fragment.text.as_bytes());
            let _ = stdout.flush();
        })
        .on_completed(|had_error, message| {
            println!();
            if had_error {
                failure = Some(message.unwrap_or("stream failed").to_string());
            }
        });

    client
        .streaming_call(&args.request.path, &spec, &options, handlers)
        .await;

    match failure {
        Some(message) => Err(message.into()),
        None => Ok(()),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let client = match build_client(&cli) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let result = match &cli.command {
        Command::Get(args) => run_unary(&client, &cli, Method::GET, args).await,
        Command::Post(args) => run_unary(&client, &cli, Method::POST, args).await,
        Command::Put(args) => run_unary(&client, &cli, Method::PUT, args).await,
        Command::Patch(args) => run_unary(&client, &cli, Method::PATCH, args).await,
        Command::Delete(args) => run_unary(&client, &cli, Method::DELETE, args).await,
        Command::Stream(args) => run_stream(&client, &cli, args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
