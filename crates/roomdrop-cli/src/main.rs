//! roomdrop: send and receive files through a roomdrop relay from the
//! command line.
//!
//! `send` holds the room's offerer seat and streams one file to every
//! receiver the relay admits. `receive` queues as an answerer and saves the
//! first file that arrives.

mod endpoint;
mod error;
mod peer;
mod receive;
mod send;
mod signaling;


use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use roomdrop_common::{ClientId, RoomId};
use roomdrop_transfer::{RoomKey, TransferOptions};

use crate::endpoint::{parse_room_arg, Endpoint};
use crate::error::ClientError;
use crate::peer::PeerSettings;

#[derive(Parser)]
#[command(name = "roomdrop", about = "Peer-to-peer file drops through a roomdrop relay")]
struct Cli {
    /// Relay URL. Falls back to $ROOMDROP_ENDPOINT, then http://127.0.0.1:8787.
    #[arg(long, global = true)]
    endpoint: Option<String>,

    #[command(flatten)]
    peer: PeerArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct PeerArgs {
    /// STUN/TURN server URL. Repeat for several; none given uses a public STUN server.
    #[arg(long = "ice-server", global = true)]
    ice_servers: Vec<String>,

    /// Gather loopback candidates too, for peers on the same machine.
    #[arg(long, global = true)]
    loopback: bool,

    /// Seconds to wait for ICE gathering.
    #[arg(long, global = true, default_value_t = 10)]
    gather_timeout: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Offer a file to everyone who joins the room.
    Send {
        #[arg(long)]
        file: PathBuf,

        /// Existing room code or link. Without one a new room is created
        /// that only this sender may offer in.
        #[arg(long)]
        room_id: Option<String>,

        /// Concurrent receivers for a newly created room.
        #[arg(long)]
        max_concurrent: Option<u32>,

        #[command(flatten)]
        key: KeyArgs,

        /// Generate a room key and encrypt every chunk with it.
        #[arg(long, conflicts_with_all = ["key", "passphrase"])]
        encrypt: bool,

        /// Exit after this many receivers got the file.
        #[arg(long)]
        count: Option<usize>,
    },

    /// Receive one file from the room's sender.
    Receive {
        /// Room code or share link. A link's `#k=` fragment supplies the key.
        #[arg(long)]
        room_id: String,

        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        #[command(flatten)]
        key: KeyArgs,
    },
}

#[derive(Args)]
struct KeyArgs {
    /// Room key, base64url.
    #[arg(long, conflicts_with = "passphrase")]
    key: Option<String>,

    /// Passphrase the room key is derived from.
    #[arg(long)]
    passphrase: Option<String>,
}

impl KeyArgs {
    /// An explicit key or passphrase wins over one carried by a link.
    fn resolve(&self, room: &RoomId, from_link: Option<RoomKey>) -> Result<Option<RoomKey>, ClientError> {
        if let Some(encoded) = &self.key {
            return Ok(Some(RoomKey::from_base64url(encoded)?));
        }
        if let Some(passphrase) = &self.passphrase {
            return Ok(Some(RoomKey::derive_from_passphrase(passphrase, room)));
        }
        Ok(from_link)
    }
}

impl PeerArgs {
    fn settings(&self) -> PeerSettings {
        let defaults = PeerSettings::default();
        PeerSettings {
            ice_servers: if self.ice_servers.is_empty() {
                defaults.ice_servers
            } else {
                self.ice_servers.clone()
            },
            include_loopback: self.loopback,
            gather_timeout: Duration::from_secs(self.gather_timeout.max(1)),
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roomdrop=info,roomdrop_transfer=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), ClientError> {
    let endpoint = Endpoint::resolve(cli.endpoint.as_deref())?;
    let peer = cli.peer.settings();
    let client_id = ClientId::random();

    match cli.command {
        Command::Send {
            file,
            room_id,
            max_concurrent,
            key,
            encrypt,
            count,
        } => {
            let (room_id, link_key) = match room_id {
                Some(arg) => parse_room_arg(&arg)?,
                None => (endpoint.create_room(max_concurrent, Some(&client_id)).await?, None),
            };
            let key = match key.resolve(&room_id, link_key)? {
                Some(key) => Some(key),
                None if encrypt => Some(RoomKey::generate()),
                None => None,
            };

            println!("room: {room_id}");
            println!("link: {}", endpoint.share_link(&room_id, key.as_ref()));
            let summary = send::run(
                &endpoint,
                send::SendJob {
                    room_id,
                    client_id,
                    file,
                    key,
                    limit: count,
                    peer,
                    options: TransferOptions::default(),
                },
            )
            .await?;
            println!("sent to {} receiver(s)", summary.completed);
        }
        Command::Receive {
            room_id,
            output_dir,
            key,
        } => {
            let (room_id, link_key) = parse_room_arg(&room_id)?;
            let key = key.resolve(&room_id, link_key)?;
            let path = receive::run(
                &endpoint,
                receive::ReceiveJob {
                    room_id,
                    client_id,
                    output_dir,
                    key,
                    peer,
                },
            )
            .await?;
            println!("saved: {}", path.display());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    tokio::select! {
        result = run(cli) => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("roomdrop: {e}");
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted");
            ExitCode::FAILURE
        }
    }
}
