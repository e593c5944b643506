//! `gossip` — drive a session over loopback accounts from the command line.

use std::{path::PathBuf, sync::Arc, time::Duration};

use {
    anyhow::{Result, bail},
    clap::{Parser, Subcommand},
    tokio::time::{sleep, timeout},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    gossip_accounts::{Account, AccountId, AccountManager, ProtocolKind, store::AccountStore},
    gossip_common::Message,
    gossip_protocol::BackendFactory,
    gossip_session::{Session, SessionEvent},
};

#[derive(Parser)]
#[command(name = "gossip", about = "Gossip — multi-account messaging session core")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the accounts file.
    #[arg(long, global = true, default_value = "accounts.toml")]
    accounts_file: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Account management.
    Accounts {
        #[command(subcommand)]
        action: AccountAction,
    },
    /// Show the aggregate connection tally.
    Status,
    /// Connect accounts and stream session events for a while.
    Connect {
        /// Connect only this account.
        #[arg(long)]
        account: Option<String>,
        /// Honor per-account auto-connect flags, as at startup.
        #[arg(long, default_value_t = false)]
        startup: bool,
    },
    /// Send a message (loopback accounts echo it back).
    Send {
        #[arg(long)]
        to: String,
        #[arg(short, long)]
        message: String,
    },
}

#[derive(Subcommand)]
enum AccountAction {
    List,
    Add {
        id: String,
        /// Protocol kind (currently: loopback).
        #[arg(long, default_value = "loopback")]
        protocol: String,
        #[arg(long, default_value = "localhost")]
        server: String,
        /// Include this account in startup bulk connects.
        #[arg(long, default_value_t = true)]
        auto_connect: bool,
    },
    Remove {
        id: String,
    },
}

fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.json_logs);

    let store = AccountStore::new(cli.accounts_file.clone());
    match cli.command {
        Commands::Accounts { action } => accounts_command(&store, action),
        Commands::Status => status_command(&store).await,
        Commands::Connect { account, startup } => {
            connect_command(&store, account.map(AccountId::from), startup).await
        },
        Commands::Send { to, message } => send_command(&store, &to, &message).await,
    }
}

async fn build_session(store: &AccountStore) -> Arc<Session> {
    let manager = Arc::new(AccountManager::with_accounts(store.load()));
    Session::new(manager, BackendFactory::with_loopback()).await
}

fn accounts_command(store: &AccountStore, action: AccountAction) -> Result<()> {
    match action {
        AccountAction::List => {
            let accounts = store.load();
            if accounts.is_empty() {
                println!("no accounts configured");
                return Ok(());
            }
            for account in accounts {
                println!(
                    "{:<16} {:<10} {:<24} auto-connect: {}",
                    account.id, account.protocol, account.server, account.auto_connect
                );
            }
            Ok(())
        },
        AccountAction::Add {
            id,
            protocol,
            server,
            auto_connect,
        } => {
            let protocol = match protocol.as_str() {
                "loopback" => ProtocolKind::Loopback,
                "jabber" => ProtocolKind::Jabber,
                other => bail!("unknown protocol: {other}"),
            };
            let mut accounts = store.load();
            if accounts.iter().any(|a| a.id.as_str() == id) {
                bail!("account {id} already exists");
            }
            accounts.push(
                Account::new(id.as_str(), id.as_str(), protocol)
                    .with_server(server, 0)
                    .with_auto_connect(auto_connect),
            );
            store.save(&accounts)?;
            println!("added {id}");
            Ok(())
        },
        AccountAction::Remove { id } => {
            let mut accounts = store.load();
            let before = accounts.len();
            accounts.retain(|a| a.id.as_str() != id);
            if accounts.len() == before {
                bail!("no such account: {id}");
            }
            store.save(&accounts)?;
            println!("removed {id}");
            Ok(())
        },
    }
}

async fn status_command(store: &AccountStore) -> Result<()> {
    let session = build_session(store).await;
    let counts = session.count_accounts().await;
    println!(
        "accounts: {} connected, {} connecting, {} disconnected",
        counts.connected, counts.connecting, counts.disconnected
    );
    Ok(())
}

async fn connect_command(
    store: &AccountStore,
    account: Option<AccountId>,
    startup: bool,
) -> Result<()> {
    let session = build_session(store).await;
    let mut events = session.subscribe();

    session.connect(account.as_ref(), startup).await;

    // Stream events until the backends settle.
    let settle = sleep(Duration::from_millis(500));
    tokio::pin!(settle);
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => report(&event),
                Err(_) => break,
            },
            () = &mut settle => break,
        }
    }

    let counts = session.count_accounts().await;
    println!(
        "{} connected, {} connecting, {} disconnected",
        counts.connected, counts.connecting, counts.disconnected
    );
    Ok(())
}

async fn send_command(store: &AccountStore, to: &str, text: &str) -> Result<()> {
    let session = build_session(store).await;
    let mut events = session.subscribe();

    session.connect(None, false).await;
    wait_connected(&session).await?;

    session.send_message(&Message::to(to, text)).await;

    // Loopback echoes the message back as an inbound event.
    let reply = timeout(Duration::from_secs(2), async {
        loop {
            match events.recv().await {
                Ok(SessionEvent::NewMessage(message)) => break Some(message),
                Ok(_) => continue,
                Err(_) => break None,
            }
        }
    })
    .await;

    match reply {
        Ok(Some(message)) => {
            println!(
                "{}: {}",
                message.from.as_deref().unwrap_or("<unknown>"),
                message.body
            );
            Ok(())
        },
        _ => bail!("no reply within 2s (is any account connected?)"),
    }
}

async fn wait_connected(session: &Session) -> Result<()> {
    for _ in 0..50 {
        if session.is_connected(None).await {
            return Ok(());
        }
        sleep(Duration::from_millis(20)).await;
    }
    bail!("no account came up; check `gossip accounts list`")
}

fn report(event: &SessionEvent) {
    match event {
        SessionEvent::Connecting => info!("connecting..."),
        SessionEvent::Connected => info!("session online"),
        SessionEvent::Disconnecting => info!("disconnecting..."),
        SessionEvent::Disconnected => info!("session offline"),
        SessionEvent::ProtocolConnecting(account) => info!(account = %account.id, "connecting"),
        SessionEvent::ProtocolConnected(account) => info!(account = %account.id, "connected"),
        SessionEvent::ProtocolDisconnecting(account) => {
            info!(account = %account.id, "disconnecting");
        },
        SessionEvent::ProtocolDisconnected(account) => {
            info!(account = %account.id, "disconnected");
        },
        SessionEvent::ProtocolError { account, error } => {
            info!(account = %account.id, %error, "protocol error");
        },
        SessionEvent::NewMessage(message) => {
            info!(from = message.from.as_deref().unwrap_or(""), body = %message.body, "message");
        },
        SessionEvent::PresenceChanged(presence) => info!(state = ?presence.state, "presence"),
        SessionEvent::ContactAdded(contact) => info!(contact = %contact.id, "contact added"),
        SessionEvent::ContactUpdated(contact) => info!(contact = %contact.id, "contact updated"),
        SessionEvent::ContactPresenceUpdated(contact) => {
            info!(contact = %contact.id, "contact presence");
        },
        SessionEvent::ContactRemoved(contact) => info!(contact = %contact.id, "contact removed"),
        SessionEvent::Composing {
            contact_id,
            composing,
        } => info!(contact = %contact_id, composing, "composing"),
        SessionEvent::Chatroom { account, event } => {
            info!(account = %account.id, ?event, "chatroom");
        },
    }
}
