// SPDX-FileCopyrightText: 2026 Tutordesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tutordesk - support desk for an online-tutoring platform.
//!
//! This is the admin command-line entry point over the support subsystem.

mod commands;
mod health;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tutordesk_config::model::TutordeskConfig;
use tutordesk_core::{ConversationStatus, SenderType};

/// Tutordesk - support desk for an online-tutoring platform.
#[derive(Parser, Debug)]
#[command(name = "tutordesk", version, about, long_about = None)]
struct Cli {
    /// Load configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print records as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// List conversations, most recent activity first.
    Conversations {
        /// Only show conversations in this status.
        #[arg(long)]
        status: Option<ConversationStatus>,
    },
    /// Show one conversation.
    Show { id: String },
    /// Start a new conversation for a guest.
    Open {
        guest_id: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        name: Option<String>,
    },
    /// Assign a conversation to an agent (status becomes in-progress).
    Assign { id: String, agent: String },
    /// Close a conversation.
    Close { id: String },
    /// Set a conversation's status directly.
    Status {
        id: String,
        status: ConversationStatus,
        #[arg(long)]
        agent: Option<String>,
    },
    /// List a conversation's messages, oldest first.
    Messages { id: String },
    /// Send a message into a conversation.
    Send {
        id: String,
        body: String,
        /// Sender type: guest, admin or system.
        #[arg(long = "as", default_value = "admin")]
        sender: SenderType,
        #[arg(long)]
        sender_id: Option<String>,
        #[arg(long)]
        sender_name: Option<String>,
    },
    /// Mark messages read.
    MarkRead {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Count unread guest messages in a conversation.
    Unread { id: String },
    /// Delete a conversation and its messages.
    Delete { id: String },
    /// Check configuration and storage.
    Health,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => tutordesk_config::load_and_validate_path(path),
        None => tutordesk_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            tutordesk_config::render_errors(&errors);
            std::process::exit(1);
        }
    };
    init_tracing(&config.logging.level);

    let Some(command) = cli.command else {
        println!("tutordesk: use --help for available commands");
        return;
    };

    if let Err(e) = run(command, &config, cli.json).await {
        eprintln!("tutordesk: error: {e}");
        std::process::exit(1);
    }
}

async fn run(
    command: Commands,
    config: &TutordeskConfig,
    json: bool,
) -> Result<(), tutordesk_core::TutordeskError> {
    if let Commands::Health = command {
        return health::run_health(config).await;
    }

    let desk = commands::Desk::open(config, json).await?;
    let result = match command {
        Commands::Conversations { status } => desk.conversations(status).await,
        Commands::Show { id } => desk.show(&id).await,
        Commands::Open {
            guest_id,
            email,
            name,
        } => {
            desk.open_conversation(&guest_id, email.as_deref(), name.as_deref())
                .await
        }
        Commands::Assign { id, agent } => desk.assign(&id, &agent).await,
        Commands::Close { id } => desk.close(&id).await,
        Commands::Status { id, status, agent } => {
            desk.set_status(&id, status, agent.as_deref()).await
        }
        Commands::Messages { id } => desk.messages(&id).await,
        Commands::Send {
            id,
            body,
            sender,
            sender_id,
            sender_name,
        } => {
            desk.send(&id, &body, sender, sender_id, sender_name)
                .await
        }
        Commands::MarkRead { ids } => desk.mark_read(&ids).await,
        Commands::Unread { id } => desk.unread(&id).await,
        Commands::Delete { id } => desk.delete(&id).await,
        Commands::Health => Ok(()),
    };
    desk.shutdown().await;
    result
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tutordesk={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}
