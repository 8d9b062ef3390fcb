use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::thread;
use tracing::{info, warn};

use rdt_abstract::{ChannelConfig, ChannelConfigOverride, RECEIVER_PORT, SENDER_PORT};
use rdt_codec::{
    ChatMessage, Request, Response, decode_request, decode_response, encode_request,
    encode_response,
};
use rdt_core::{RdtSocket, TraceLog};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Drive a reliable-transport endpoint pair over an impaired loopback channel"
)]
struct Args {
    /// Probability that the channel drops an outbound datagram.
    #[arg(long)]
    loss: Option<f64>,

    /// Probability that the channel corrupts an outbound payload.
    #[arg(long)]
    corrupt: Option<f64>,

    /// Impairment RNG seed.
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    min_delay_ms: Option<u64>,
    #[arg(long)]
    max_delay_ms: Option<u64>,

    /// Switch every simulated impairment off.
    #[arg(long, default_value_t = false)]
    ideal: bool,

    /// TOML file with channel settings, applied before the individual flags.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Packet trace output, truncated at startup.
    #[arg(long, default_value = "logs/trace.log")]
    trace: PathBuf,

    /// Log protocol internals, not just the exchange.
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = args.channel_config()?;
    info!(
        loss = config.loss_prob,
        corrupt = config.corrupt_prob,
        seed = config.seed,
        "channel configured"
    );

    let trace = TraceLog::create(&args.trace)
        .with_context(|| format!("creating trace log {}", args.trace.display()))?;

    let server_addr: SocketAddr = format!("127.0.0.1:{RECEIVER_PORT}").parse()?;
    let client_addr: SocketAddr = format!("127.0.0.1:{SENDER_PORT}").parse()?;

    let mut server = RdtSocket::bind(server_addr, config.clone(), trace.clone())
        .context("binding server endpoint")?;
    let mut client =
        RdtSocket::bind(client_addr, config, trace).context("binding client endpoint")?;
    server.connect(client_addr)?;
    client.connect(server_addr)?;

    let server_handle = thread::spawn(move || run_server(server));

    let script = script();
    let total = script.len();
    let mut acknowledged = 0;
    for request in script {
        info!(command = ?request, "client sending");
        let bytes = encode_request(&request)?;
        if !client.send(&bytes) {
            warn!(command = ?request, "request was never acknowledged");
            continue;
        }
        acknowledged += 1;

        if request.expects_response() {
            match client.recv() {
                Some(bytes) => match decode_response(&bytes) {
                    Ok(response) => info!(?response, "server replied"),
                    Err(err) => warn!(%err, "undecodable response"),
                },
                None => warn!("no response before the deadline"),
            }
        }
    }

    let served = server_handle.join().expect("server thread panicked");
    client.close();

    info!(
        acknowledged,
        total, served, "demo finished; packet trace at {}", args.trace.display()
    );
    Ok(())
}

/// Answer requests until a logout arrives or the line goes quiet.
fn run_server(mut socket: RdtSocket) -> usize {
    let mut directory = DemoDirectory::default();
    let mut served = 0;

    loop {
        let Some(bytes) = socket.recv() else {
            warn!("server: no request before the deadline, shutting down");
            break;
        };
        let request = match decode_request(&bytes) {
            Ok(request) => request,
            Err(err) => {
                warn!(%err, "server: undecodable request");
                continue;
            }
        };
        info!(user = request.user(), command = ?request, "server handling");
        served += 1;

        if let Some(response) = directory.handle(&request) {
            match encode_response(&response) {
                Ok(bytes) => {
                    if !socket.send(&bytes) {
                        warn!("server: response was never acknowledged");
                    }
                }
                Err(err) => warn!(%err, "server: response did not encode"),
            }
        }

        if matches!(request, Request::Logout { .. }) {
            info!("server: client logged out, shutting down");
            break;
        }
    }

    socket.close();
    served
}

/// Just enough application state to answer the scripted session; the real
/// chat service lives elsewhere.
#[derive(Default)]
struct DemoDirectory {
    users: Vec<String>,
    messages: Vec<ChatMessage>,
}

impl DemoDirectory {
    fn handle(&mut self, request: &Request) -> Option<Response> {
        match request {
            Request::Login { user } => {
                if !self.users.contains(user) {
                    self.users.push(user.clone());
                }
                None
            }
            Request::Logout { .. } => None,
            Request::ListUsers { .. } => Some(Response::Users(self.users.clone())),
            Request::ListFriends { .. } => Some(Response::Users(Vec::new())),
            Request::ListMyGroups { .. } => Some(Response::MyGroups(Vec::new())),
            Request::ListGroups { .. } => Some(Response::Groups(Vec::new())),
            Request::ChatFriend { user, message, .. }
            | Request::ChatGroup { user, message, .. } => {
                self.messages.push(ChatMessage {
                    sender: user.clone(),
                    content: message.clone(),
                    timestamp: String::new(),
                });
                Some(Response::Ack(true))
            }
            Request::ListMessages { .. } => Some(Response::Messages(self.messages.clone())),
            Request::Ban { .. } => Some(Response::Ack(false)),
            _ => Some(Response::Ack(true)),
        }
    }
}

fn script() -> Vec<Request> {
    let user = "alice".to_string();
    vec![
        Request::Login { user: user.clone() },
        Request::Follow {
            user: user.clone(),
            friend: "bob".into(),
        },
        Request::ChatFriend {
            user: user.clone(),
            friend: "bob".into(),
            message: "hello over a lossy wire".into(),
        },
        Request::ListUsers { user: user.clone() },
        Request::ListMessages {
            user: user.clone(),
            chat: "alice_bob".into(),
        },
        Request::Logout { user },
    ]
}

impl Args {
    fn channel_config(&self) -> Result<ChannelConfig> {
        let mut config = if self.ideal {
            ChannelConfig::ideal()
        } else {
            ChannelConfig::default()
        };

        if let Some(path) = &self.config {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let overrides: ChannelConfigOverride =
                toml::from_str(&text).context("parsing channel config")?;
            overrides.apply_to(&mut config);
        }

        if let Some(v) = self.loss {
            config.loss_prob = v;
        }
        if let Some(v) = self.corrupt {
            config.corrupt_prob = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.min_delay_ms {
            config.min_delay_ms = v;
        }
        if let Some(v) = self.max_delay_ms {
            config.max_delay_ms = v;
        }
        Ok(config)
    }
}
