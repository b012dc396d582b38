mod config;
mod error;

use std::path::{Path, PathBuf};
use std::time::Duration;

use batch::{BatchRunner, BatchSummary};
use clap::{Parser, Subcommand};
use mcp::{Client, CloseReason, StreamItem, extract};
use tracing_subscriber::EnvFilter;

use config::{BASE_URL_ENV, Config};
use error::{Error, Result};

const CONFIG_FILE: &str = "imagegen.toml";

#[derive(Parser)]
#[command(name = "imagegen")]
#[command(about = "Drive an MCP image-generation service", long_about = None)]
#[command(version)]
struct Cli {
    /// Base URL of the service (overrides IMAGEGEN_BASE_URL and the config file)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Config file to load instead of ./imagegen.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the service is up
    Health,
    /// List the tools the service offers
    Tools,
    /// Generate one image
    Generate {
        prompt: String,
        /// Also fetch the image status afterwards
        #[arg(long)]
        status: bool,
    },
    /// Show the status of a generated image
    Status { image_id: String },
    /// Generate images for several prompts, one at a time
    Batch {
        prompts: Vec<String>,
        /// Read prompts from a file, one per line ('#' starts a comment)
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Pause between prompts in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,
    },
    /// Print events from the service's event stream
    Watch {
        /// Stop after this many seconds (default: until Ctrl-C)
        #[arg(long)]
        seconds: Option<u64>,
    },
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?
        .with_overrides(std::env::var(BASE_URL_ENV).ok(), cli.base_url);
    let client = config.client()?;
    tracing::debug!(base_url = client.base_url(), "using image service");

    match cli.command {
        Commands::Health => cmd_health(&client).await,
        Commands::Tools => cmd_tools(&client).await,
        Commands::Generate { prompt, status } => cmd_generate(&client, &prompt, status).await,
        Commands::Status { image_id } => cmd_status(&client, &image_id).await,
        Commands::Batch {
            prompts,
            file,
            delay_ms,
        } => {
            let delay = delay_ms.map_or_else(|| config.delay(), Duration::from_millis);
            cmd_batch(client, prompts, file.as_deref(), delay).await
        }
        Commands::Watch { seconds } => cmd_watch(&client, seconds.map(Duration::from_secs)).await,
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) if !path.exists() => Err(Error::ConfigNotFound {
            path: path.to_path_buf(),
        }),
        Some(path) => Ok(Config::load(path)?),
        None if Path::new(CONFIG_FILE).exists() => Ok(Config::load(CONFIG_FILE)?),
        None => Ok(Config::default()),
    }
}

async fn cmd_health(client: &Client) -> Result<()> {
    client.health().await?;
    println!("{} is healthy", client.base_url());
    Ok(())
}

async fn cmd_tools(client: &Client) -> Result<()> {
    let tools = client.list_tools().await?.tools()?;
    println!("Found {} tools:", tools.len());
    for tool in tools {
        match tool.description {
            Some(description) => println!("  {:<20}  {description}", tool.name),
            None => println!("  {}", tool.name),
        }
    }
    Ok(())
}

async fn cmd_generate(client: &Client, prompt: &str, status: bool) -> Result<()> {
    let result = client.generate_image(prompt).await?;
    let extracted = extract::extract(&result);

    let Some(image_id) = extracted.image_id else {
        return Err(Error::MissingImageId {
            text: result.first_text().to_string(),
        });
    };

    println!("Image ID:  {image_id}");
    if let Some(url) = extracted.image_url {
        println!("Image URL: {url}");
    }

    if status {
        let status = client.get_image_status(&image_id).await?;
        println!("Status:    {}", status.first_text());
    }
    Ok(())
}

async fn cmd_status(client: &Client, image_id: &str) -> Result<()> {
    let status = client.get_image_status(image_id).await?;
    let text = status.first_text();
    if text.is_empty() {
        println!("{}", status.as_value());
    } else {
        println!("{text}");
    }
    Ok(())
}

async fn cmd_batch(
    client: Client,
    mut prompts: Vec<String>,
    file: Option<&Path>,
    delay: Duration,
) -> Result<()> {
    if let Some(path) = file {
        prompts.extend(read_prompts(&std::fs::read_to_string(path)?));
    }
    if prompts.is_empty() {
        return Err(Error::NoPrompts);
    }

    let total = prompts.len();
    let runner = BatchRunner::new(client).with_delay(delay);
    let items = runner.run(prompts).await;

    for (index, item) in items.iter().enumerate() {
        let position = index + 1;
        println!("[{position}/{total}] {}", item.prompt);
        match item.error() {
            None => {
                println!("    id:  {}", item.image_id.as_deref().unwrap_or("-"));
                println!("    url: {}", item.image_url.as_deref().unwrap_or("-"));
            }
            Some(e) => println!("    failed: {e}"),
        }
    }

    println!("\nBatch complete: {}", BatchSummary::from_items(&items));
    Ok(())
}

fn read_prompts(content: &str) -> impl Iterator<Item = String> + '_ {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
}

async fn cmd_watch(client: &Client, limit: Option<Duration>) -> Result<()> {
    let mut events = client.events().await?;
    eprintln!("Listening on {}/mcp/sse (Ctrl-C to stop)", client.base_url());

    let deadline = async {
        match limit {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = &mut deadline => break,
            item = events.next() => match item {
                Some(StreamItem::Event(event)) => match event.event {
                    Some(name) => println!("{name}: {}", event.payload),
                    None => println!("{}", event.payload),
                },
                Some(StreamItem::Fault(e)) => tracing::warn!(error = %e, "skipping frame"),
                None => break,
            },
        }
    }

    events.close();
    match events.take_close_reason() {
        Some(CloseReason::Failed(e)) => Err(e.into()),
        Some(CloseReason::EndOfStream) => {
            eprintln!("Stream ended by server");
            Ok(())
        }
        _ => Ok(()),
    }
}
