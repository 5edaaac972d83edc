//! Ollastream - stream a chat from an Ollama server

use clap::{Parser, Subcommand};
use futures::StreamExt;
use ollastream_core::{ChatRequest, Message, ProviderConfig};
use ollastream_llm::{with_retry, LlmProvider, OllamaProvider, RetryPolicy, StreamEvent, Usage};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "ollastream",
    about = "Ollastream - Ollama chat as a canonical event stream"
)]
struct Cli {
    /// Config file (default: ~/.ollastream/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one prompt and stream the reply to stdout
    Chat {
        /// Model to use (overrides config)
        #[arg(short, long)]
        model: Option<String>,
        /// System prompt
        #[arg(short, long, default_value = "You are a helpful assistant.")]
        system: String,
        /// Total attempts before giving up
        #[arg(long, default_value = "3")]
        retries: u32,
        /// Prompt text
        #[arg(required = true)]
        prompt: Vec<String>,
    },
    /// Print the resolved model id and metadata
    Model,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = match &cli.config {
        Some(path) => ProviderConfig::load(path)?,
        None => ProviderConfig::discover(),
    }
    .with_env_overrides();

    match cli.command {
        Commands::Chat {
            model,
            system,
            retries,
            prompt,
        } => {
            let config = match model {
                Some(m) => config.with_model(m),
                None => config,
            };
            run_chat(config, system, prompt.join(" "), retries).await
        }
        Commands::Model => {
            let provider = OllamaProvider::new(config);
            println!("{}", serde_json::to_string_pretty(&provider.model())?);
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ollastream=info,ollastream_llm=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run_chat(
    config: ProviderConfig,
    system: String,
    prompt: String,
    attempts: u32,
) -> anyhow::Result<()> {
    let provider = Arc::new(OllamaProvider::new(config));
    let model = provider.model();
    if !model.is_resolved() {
        anyhow::bail!("no model configured; pass --model or set OLLAMA_MODEL");
    }
    tracing::info!("Model: {} (context window {})", model.id, model.info.context_window);

    let request = ChatRequest::new(system).with_message(Message::user(prompt));
    let policy = RetryPolicy::default().with_max_attempts(attempts);

    let mut stream = with_retry(policy, move || {
        let provider = provider.clone();
        let request = request.clone();
        async move { provider.complete_stream(request).await }
    });

    let mut usage = Usage::default();
    let mut stdout = std::io::stdout();
    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::TextDelta(text) => {
                stdout.write_all(text.as_bytes())?;
                stdout.flush()?;
            }
            StreamEvent::Usage(u) => usage = u,
        }
    }
    writeln!(stdout)?;

    eprintln!(
        "tokens: {} in / {} out",
        usage.input_tokens, usage.output_tokens
    );
    Ok(())
}
