use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use colored::*;
use dialoguer::Input;
use std::net::SocketAddr;
use std::sync::Arc;
use tandem::model::IceServerConfig;
use tandem::server::StoreService;
use tandem::session::{
    CallHandle, Coordinator, MediaConstraints, RemoteStore, SessionConfig, SessionState,
    SessionStatus,
};
use tandem::RoomId;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tandem", version, about = "Two-party calls signaled through a shared store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the signaling store server.
    Serve {
        #[arg(long, env = "TANDEM_LISTEN", default_value = "127.0.0.1:7700")]
        listen: SocketAddr,
    },
    /// Start a call and print its join code.
    Create(CallArgs),
    /// Join a call by its code.
    Join {
        /// Prompted for when omitted.
        code: Option<String>,

        #[command(flatten)]
        call: CallArgs,
    },
}

#[derive(Args)]
struct CallArgs {
    #[arg(long, env = "TANDEM_STORE", default_value = "ws://127.0.0.1:7700/store")]
    store: String,

    /// STUN/TURN server, repeatable. Defaults to public STUN servers.
    #[arg(long = "ice-server", value_name = "URL")]
    ice_servers: Vec<String>,

    /// Seconds to wait for an answer; 0 waits forever.
    #[arg(long, default_value_t = 120)]
    answer_timeout: u64,

    #[arg(long)]
    no_audio: bool,

    #[arg(long)]
    no_video: bool,
}

impl CallArgs {
    fn session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::default();
        if !self.ice_servers.is_empty() {
            config.ice_servers = vec![IceServerConfig::new(self.ice_servers.clone())];
        }
        config.answer_timeout_secs = (self.answer_timeout > 0).then_some(self.answer_timeout);
        config
    }

    fn constraints(&self) -> MediaConstraints {
        MediaConstraints {
            audio: !self.no_audio,
            video: !self.no_video,
        }
    }

    async fn coordinator(&self) -> Result<Coordinator> {
        let store = RemoteStore::connect(&self.store)
            .await
            .with_context(|| format!("Failed to reach the signaling store at {}", self.store))?;

        Ok(Coordinator::with_webrtc(
            self.session_config(),
            Arc::new(store),
            self.constraints(),
        ))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("warn,tandem_session=info,tandem_server=info")
        }))
        .init();

    match Cli::parse().command {
        Commands::Serve { listen } => {
            let listener = TcpListener::bind(listen)
                .await
                .with_context(|| format!("Failed to bind {listen}"))?;
            println!(
                "{} ws://{}/store",
                "Signaling store listening on".green().bold(),
                listen
            );
            tandem::server::serve(listener, StoreService::in_memory()).await?;
        }

        Commands::Create(args) => {
            let coordinator = args.coordinator().await?;
            println!("{}", "Publishing offer...".cyan());

            let call = coordinator
                .create_call()
                .await
                .context("Failed to start the call")?;

            println!("{}", "Room created. Share this join code:".green().bold());
            println!("   {}", call.room_id().to_string().yellow().bold());
            stay_in_call(call).await?;
        }

        Commands::Join { code, call: args } => {
            let code = match code {
                Some(code) => code,
                None => Input::<String>::new()
                    .with_prompt("Join code")
                    .interact_text()
                    .context("Failed to read the join code")?,
            };
            let room_id = RoomId::from(code);
            if room_id.as_str().is_empty() {
                bail!("The join code is empty");
            }

            let coordinator = args.coordinator().await?;
            println!("{} {}", "Answering room".cyan(), room_id);

            let call = match coordinator.join_call(room_id).await {
                Ok(call) => call,
                Err(e @ tandem::session::SessionError::RoomNotFound(_)) => {
                    println!("{}", "No call is waiting under that code.".red().bold());
                    return Err(e.into());
                }
                Err(e @ tandem::session::SessionError::RoomOccupied(_)) => {
                    println!("{}", "That call already has two participants.".red().bold());
                    return Err(e.into());
                }
                Err(e) => return Err(e).context("Failed to join the call"),
            };
            stay_in_call(call).await?;
        }
    }

    Ok(())
}

/// Prints state changes until the call ends or Ctrl-C hangs it up.
async fn stay_in_call(call: CallHandle) -> Result<()> {
    println!("{}", "Press Ctrl-C to hang up.".dimmed());

    let mut status = call.subscribe();
    let mut shown = status.borrow().state;
    print_status(&status.borrow());

    loop {
        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = status.borrow_and_update().clone();
                if current.state != shown {
                    shown = current.state;
                    print_status(&current);
                }
                if current.state.is_terminal() {
                    break;
                }
            }

            _ = tokio::signal::ctrl_c() => {
                println!("{}", "Hanging up...".yellow());
                call.hang_up().await;
                info!("Hung up room {}", call.room_id());
                break;
            }
        }
    }

    let last = call.status();
    if let Some(reason) = last.error {
        bail!("Call failed: {reason}");
    }
    println!("{}", "Call ended, room removed.".green());
    Ok(())
}

fn print_status(status: &SessionStatus) {
    let label = format!("{:?}", status.state);
    let line = match status.state {
        SessionState::Connected => label.green().bold(),
        SessionState::Failed => label.red().bold(),
        SessionState::Disconnected => label.yellow(),
        _ => label.cyan(),
    };
    println!("   state: {}", line);

    if status.state == SessionState::Connected {
        for track in &status.remote_tracks {
            println!("   receiving {:?} track {}", track.kind, track.id);
        }
    }
}
