//! Skiff CLI
//!
//! Terminal front-end for the skiff stream client: follow a session's
//! coalesced event feed, send prompts, stop sessions.

mod config;
mod logging;
mod render;

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tokio::sync::mpsc;

use skiff_client::{
    ClientConfig, ConnectionState, PromptOptions, SessionEvent, SessionStreamClient,
};
use skiff_protocol::ImageInput;

use crate::render::Renderer;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Parser)]
#[command(name = "skiff", version, about = "Follow and drive AI coding sessions")]
struct Cli {
    /// Server WebSocket URL (overrides ~/.skiff/config.toml)
    #[arg(long, global = true, env = "SKIFF_URL")]
    url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow a session's event stream until it ends or Ctrl-C
    Tail {
        session_id: String,
        /// Emit raw JSON events instead of formatted output
        #[arg(long)]
        json: bool,
    },
    /// Send a prompt to a session, starting it if needed
    Send {
        session_id: String,
        prompt: String,
        /// Working directory for a newly started session
        #[arg(long, short = 'C')]
        working_dir: Option<String>,
        /// Model override for a newly started session
        #[arg(long)]
        model: Option<String>,
        /// Hide the prompt from the session transcript
        #[arg(long)]
        hidden: bool,
        /// Attach an image file (repeatable)
        #[arg(long = "image")]
        images: Vec<String>,
        /// Exit after sending instead of following the turn
        #[arg(long)]
        detach: bool,
    },
    /// Ask the backend to stop a session
    Stop { session_id: String },
    /// Generate shell completions
    Completions { shell: Shell },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "skiff", &mut std::io::stdout());
        return Ok(());
    }

    let _guard = logging::init_logging()?;
    let file_config = config::load()?;
    let url = config::resolve_url(cli.url, &file_config);

    let client = SessionStreamClient::new(ClientConfig::new(url.clone()));
    connect(&client).await?;
    tracing::info!(
        component = "cli",
        event = "cli.connected",
        url = %url,
        "Connected to server"
    );

    match cli.command {
        Commands::Tail { session_id, json } => tail(&client, &session_id, json).await,
        Commands::Send {
            session_id,
            prompt,
            working_dir,
            model,
            hidden,
            images,
            detach,
        } => {
            let working_dir = match working_dir {
                Some(dir) => dir,
                None => std::env::current_dir()
                    .context("cannot resolve current directory")?
                    .to_string_lossy()
                    .into_owned(),
            };
            let mut options = PromptOptions::new(working_dir);
            options.model = model;
            options.hidden = hidden;
            for path in &images {
                options.images.push(load_image(path)?);
            }
            send(&client, &session_id, prompt, options, detach).await
        }
        Commands::Stop { session_id } => {
            client.stop_session(&session_id);
            // Give the frame a moment to leave before tearing down.
            tokio::time::sleep(Duration::from_millis(200)).await;
            println!("Stop requested for {session_id}");
            Ok(())
        }
        Commands::Completions { .. } => unreachable!("handled before connecting"),
    }
}

/// Connect and wait for the socket to open.
async fn connect(client: &SessionStreamClient) -> anyhow::Result<()> {
    client.connect();
    let mut watch = client.connection_watch();
    tokio::time::timeout(CONNECT_TIMEOUT, async {
        loop {
            if *watch.borrow() == ConnectionState::Connected {
                return Ok(());
            }
            watch
                .changed()
                .await
                .map_err(|_| anyhow::anyhow!("client shut down while connecting"))?;
        }
    })
    .await
    .map_err(|_| anyhow::anyhow!("timed out connecting to the server"))?
}

fn subscribe_stream(
    client: &SessionStreamClient,
    session_id: &str,
) -> (skiff_client::Subscription, mpsc::UnboundedReceiver<SessionEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sub = client.subscribe(session_id, move |event| {
        let _ = tx.send(event.clone());
    });
    (sub, rx)
}

async fn tail(client: &SessionStreamClient, session_id: &str, json: bool) -> anyhow::Result<()> {
    let (_sub, mut events) = subscribe_stream(client, session_id);
    let mut renderer = Renderer::new(json);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                renderer.finish();
                return Ok(());
            }
            event = events.recv() => match event {
                None => return Ok(()),
                Some(event) => {
                    let ended = matches!(event, SessionEvent::Ended { .. });
                    renderer.render(&event);
                    if ended {
                        renderer.finish();
                        return Ok(());
                    }
                }
            }
        }
    }
}

async fn send(
    client: &SessionStreamClient,
    session_id: &str,
    prompt: String,
    options: PromptOptions,
    detach: bool,
) -> anyhow::Result<()> {
    if detach {
        client.send_prompt(session_id, prompt, options);
        // Let the frame drain before the process exits.
        tokio::time::sleep(Duration::from_millis(200)).await;
        return Ok(());
    }

    let (_sub, mut events) = subscribe_stream(client, session_id);
    client.send_prompt(session_id, prompt, options);

    let mut renderer = Renderer::new(false);
    let mut saw_working = false;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                None => break,
                Some(event) => {
                    match &event {
                        SessionEvent::Working(true) => saw_working = true,
                        SessionEvent::Working(false) if saw_working => {
                            renderer.render(&event);
                            break;
                        }
                        SessionEvent::Ended { .. } | SessionEvent::SessionError { .. } => {
                            renderer.render(&event);
                            break;
                        }
                        _ => {}
                    }
                    renderer.render(&event);
                }
            }
        }
    }
    renderer.finish();
    Ok(())
}

fn load_image(path: &str) -> anyhow::Result<ImageInput> {
    let bytes = std::fs::read(path).with_context(|| format!("cannot read image {path}"))?;
    let mime = match Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => anyhow::bail!("unsupported image type: {path}"),
    };
    let encoded = BASE64.encode(&bytes);
    Ok(ImageInput::data_uri(format!("data:{mime};base64,{encoded}")))
}
