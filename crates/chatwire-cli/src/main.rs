//! Chatwire CLI - talk to a chat backend from the terminal.
//!
//! This is the entry point for the `chatwire` binary. Reply text goes to
//! stdout; logs go to stderr.

mod render;

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use chatwire_client::{
    ClientConfig, ConversationStore, RemoteConversationStore, ReplyCoordinator, ReplyEvent,
};
use chatwire_core::ConversationId;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Chatwire CLI - stream chat replies from the terminal.
#[derive(Parser, Debug)]
#[command(name = "chatwire")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Backend base URL. Overrides the configuration file.
    #[arg(long, env = "CHATWIRE_BASE_URL")]
    base_url: Option<String>,

    /// JSON configuration file.
    #[arg(long, env = "CHATWIRE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List available models.
    Models,

    /// List conversations.
    List {
        /// Page size.
        #[arg(long)]
        limit: Option<u32>,

        /// Cursor from a previous page.
        #[arg(long)]
        cursor: Option<String>,
    },

    /// Show a conversation's messages.
    History {
        /// Conversation ID.
        id: ConversationId,

        /// Page size.
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Send a message and stream the reply.
    Send {
        /// Conversation ID.
        id: ConversationId,

        /// Message text.
        text: String,
    },

    /// Start a conversation and stream the reply to its first message.
    New {
        /// Model to use.
        #[arg(long)]
        model: String,

        /// Message text.
        text: String,
    },

    /// Delete a conversation.
    Delete {
        /// Conversation ID.
        id: ConversationId,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.debug {
        "chatwire_client=debug,chatwire_cli=debug,warn"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&args)?;
    tracing::debug!(base_url = %config.base_url, "Using backend");

    let coordinator =
        ReplyCoordinator::from_config(&config).context("failed to create chat client")?;

    run(args.command, &config, &coordinator).await
}

fn load_config(args: &Args) -> anyhow::Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::from_env()?,
    };
    if let Some(base_url) = &args.base_url {
        config.base_url.clone_from(base_url);
    }
    Ok(config)
}

async fn run(
    command: Command,
    config: &ClientConfig,
    coordinator: &ReplyCoordinator<RemoteConversationStore>,
) -> anyhow::Result<()> {
    let store = coordinator.store();

    match command {
        Command::Models => {
            for model in store.list_models().await? {
                println!("{}", render::model_line(&model));
            }
        }
        Command::List { limit, cursor } => {
            let limit = limit.unwrap_or(config.conversation_page_size);
            let page = store.list_conversations(limit, cursor.as_deref()).await?;
            for meta in &page.items {
                println!("{}", render::conversation_line(meta));
            }
            if let Some(next) = page.next_cursor {
                println!("\nmore: --cursor {next}");
            }
        }
        Command::History { id, limit } => {
            let limit = limit.unwrap_or(config.message_page_size);
            let page = store.list_messages(&id, limit, None).await?;
            for message in &page.items {
                println!("{}", render::message_block(message));
            }
        }
        Command::Send { id, text } => {
            let (tx, rx) = mpsc::unbounded_channel();
            if coordinator.stream_reply(id, &text, tx).await.is_some() {
                print_reply(coordinator, rx).await?;
            } else {
                drain_error(rx).await?;
            }
        }
        Command::New { model, text } => {
            let (tx, rx) = mpsc::unbounded_channel();
            match coordinator.submit_new(&model, &text, tx).await {
                Some(id) => {
                    eprintln!("conversation {id}");
                    print_reply(coordinator, rx).await?;
                }
                None => drain_error(rx).await?,
            }
        }
        Command::Delete { id } => {
            coordinator.delete_conversation(&id).await?;
            eprintln!("deleted {id}");
        }
    }

    Ok(())
}

/// Print deltas until the run resolves. Ctrl-C stops every stream.
async fn print_reply(
    coordinator: &ReplyCoordinator<RemoteConversationStore>,
    mut rx: mpsc::UnboundedReceiver<ReplyEvent>,
) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout();

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(ReplyEvent::Delta(text)) => {
                    write!(stdout, "{text}")?;
                    stdout.flush()?;
                }
                Some(ReplyEvent::Done) | None => {
                    writeln!(stdout)?;
                    return Ok(());
                }
                Some(ReplyEvent::Error(err)) => {
                    writeln!(stdout)?;
                    return Err(err).context("reply failed");
                }
            },
            signal = tokio::signal::ctrl_c() => {
                signal?;
                coordinator.stop_all();
                writeln!(stdout)?;
                eprintln!("stopped");
                return Ok(());
            }
        }
    }
}

/// Surface the error of a run that never started, if one was reported.
async fn drain_error(mut rx: mpsc::UnboundedReceiver<ReplyEvent>) -> anyhow::Result<()> {
    match rx.recv().await {
        Some(ReplyEvent::Error(err)) => Err(err).context("failed to send message"),
        _ => anyhow::bail!("nothing to send"),
    }
}
