//! Command-line front end for the client library.
//!
//! Reads the API key from `--config <yaml>` or the `GROQ_API_KEY` environment
//! variable. Logs go to stderr; set `RUST_LOG` to change the level.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use groq_client::agent_core::Tool;
use groq_client::inference::{
    load_client_config, simple_chat_request, vision_request, AudioRequest, ClientConfig,
    GroqClient, ImageSource, DEFAULT_AUDIO_MODEL,
};

const DEFAULT_CHAT_MODEL: &str = "llama-3.3-70b-versatile";
const DEFAULT_VISION_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";

/// Groq API client.
#[derive(Parser, Debug)]
#[command(name = "groq", version, about = "Talk to Groq's OpenAI-compatible API")]
struct Cli {
    /// YAML client config (defaults to the environment).
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one chat message.
    Chat {
        /// User message.
        prompt: String,
        #[arg(long, short = 'm', default_value = DEFAULT_CHAT_MODEL)]
        model: String,
        /// Optional system prompt.
        #[arg(long, short = 's')]
        system: Option<String>,
        #[arg(long, short = 't')]
        temperature: Option<f64>,
        /// Print tokens as they arrive.
        #[arg(long)]
        stream: bool,
    },
    /// List available models.
    Models,
    /// Transcribe an audio file.
    Transcribe {
        file: PathBuf,
        #[arg(long, short = 'm', default_value = DEFAULT_AUDIO_MODEL)]
        model: String,
        /// ISO-639-1 code of the spoken language.
        #[arg(long, short = 'l')]
        language: Option<String>,
        #[arg(long)]
        prompt: Option<String>,
        /// `json`, `verbose_json` or `text`.
        #[arg(long)]
        response_format: Option<String>,
    },
    /// Translate an audio file to English text.
    Translate {
        file: PathBuf,
        #[arg(long, short = 'm', default_value = DEFAULT_AUDIO_MODEL)]
        model: String,
        #[arg(long)]
        prompt: Option<String>,
        #[arg(long)]
        response_format: Option<String>,
    },
    /// Ask a question about an image (URL or local file).
    Vision {
        image: String,
        #[arg(default_value = "Describe this image.")]
        prompt: String,
        #[arg(long, short = 'm', default_value = DEFAULT_VISION_MODEL)]
        model: String,
    },
    /// Answer a question with a local arithmetic tool available.
    Tools {
        prompt: String,
        #[arg(long, short = 'm', default_value = DEFAULT_CHAT_MODEL)]
        model: String,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("groq_client=info,warn"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&Path>) -> Result<ClientConfig> {
    let config = match path {
        Some(path) => load_client_config(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ClientConfig::from_env().context("GROQ_API_KEY is not set")?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let client = GroqClient::new(load_config(cli.config.as_deref())?)?;
    let result = run(&client, cli.command).await;
    client.close();
    result
}

async fn run(client: &GroqClient, command: Command) -> Result<()> {
    match command {
        Command::Chat {
            prompt,
            model,
            system,
            temperature,
            stream,
        } => {
            let request = simple_chat_request(&model, &prompt, system.as_deref(), temperature);
            if stream {
                let fragments = client.content_stream(&request).await?;
                futures::pin_mut!(fragments);
                let mut stdout = std::io::stdout();
                while let Some(fragment) = fragments.next().await {
                    write!(stdout, "{}", fragment?)?;
                    stdout.flush()?;
                }
                writeln!(stdout)?;
            } else {
                let response = client.chat_completion(&request).await?;
                println!("{}", response.first_content().unwrap_or_default());
            }
        }
        Command::Models => {
            let models = client.models().await?;
            for model in &models.data {
                match model.owned_by.as_deref() {
                    Some(owner) => println!("{}\t{owner}", model.id),
                    None => println!("{}", model.id),
                }
            }
        }
        Command::Transcribe {
            file,
            model,
            language,
            prompt,
            response_format,
        } => {
            let mut request = AudioRequest::from_file(&file, model).await?;
            request.language = language;
            request.prompt = prompt;
            request.response_format = response_format;
            print_audio_result(&client.create_transcription(request).await?);
        }
        Command::Translate {
            file,
            model,
            prompt,
            response_format,
        } => {
            let mut request = AudioRequest::from_file(&file, model).await?;
            request.prompt = prompt;
            request.response_format = response_format;
            print_audio_result(&client.create_translation(request).await?);
        }
        Command::Vision {
            image,
            prompt,
            model,
        } => {
            let body = if image.starts_with("http://") || image.starts_with("https://") {
                let request = vision_request(&ImageSource::Url(image), &prompt, &model, None);
                client.create_vision_completion(&request).await?
            } else {
                client
                    .vision_request_from_file(Path::new(&image), &prompt, &model, None)
                    .await?
            };
            println!(
                "{}",
                body.pointer("/choices/0/message/content")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
            );
        }
        Command::Tools { prompt, model } => {
            let answer = client
                .run_conversation_with_tools(
                    &prompt,
                    &[calculator_tool()],
                    &model,
                    "You are a helpful assistant. Use the calculate tool for arithmetic.",
                )
                .await?;
            println!("{answer}");
        }
    }
    Ok(())
}

fn print_audio_result(body: &Value) {
    match body {
        Value::String(text) => println!("{text}"),
        other => println!(
            "{}",
            other.get("text").and_then(Value::as_str).unwrap_or_default()
        ),
    }
}

fn calculator_tool() -> Tool {
    Tool::new(
        "calculate",
        "Apply an arithmetic operation to two numbers",
        json!({
            "type": "object",
            "properties": {
                "operation": {"type": "string", "enum": ["add", "subtract", "multiply", "divide"]},
                "a": {"type": "number"},
                "b": {"type": "number"}
            },
            "required": ["operation", "a", "b"]
        }),
        |args| {
            let args: Value = serde_json::from_str(args)?;
            let a = args["a"].as_f64().context("missing number 'a'")?;
            let b = args["b"].as_f64().context("missing number 'b'")?;
            let result = match args["operation"].as_str() {
                Some("add") => a + b,
                Some("subtract") => a - b,
                Some("multiply") => a * b,
                Some("divide") if b == 0.0 => bail!("division by zero"),
                Some("divide") => a / b,
                other => bail!("unknown operation: {other:?}"),
            };
            Ok(json!({ "result": result }).to_string())
        },
    )
}
