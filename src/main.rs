//! Command line interface for the badge client. Supports issuing and
//! awarding badge definitions, browsing and accepting awards, and the badge
//! request workflow (request, withdraw, deny, revoke, grant).

mod address;
mod aggregate;
mod badges;
mod config;
mod error;
mod event;
mod model;
mod profile;
mod proof;
mod publish;
mod relay;
mod requests;
mod signer;
#[cfg(test)]
mod testing;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};

use address::Address;
use config::Settings;
use error::Error;
use model::{ProofKind, ProofRef};
use publish::Published;
use relay::RelaySet;

/// Command line interface entry point.
#[derive(Parser)]
#[command(name = "badgr", author, version, about = "Multi-relay Nostr badge client")]
struct Cli {
    /// Path to the `.env` configuration file.
    #[arg(long, default_value = ".env")]
    env: String,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Create or update a badge definition.
    Define {
        /// Definition identifier (the `d` tag), e.g. `early-adopter`.
        identifier: String,
        /// Display name.
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        image: String,
    },
    /// Award a badge definition to one or more recipients.
    Award {
        /// Definition address `30009:<issuer>:<identifier>`.
        address: String,
        /// Recipient public keys (hex).
        #[arg(required = true)]
        recipients: Vec<String>,
    },
    /// Browse the badge definitions published by an issuer.
    Browse {
        /// Issuer public key (hex).
        issuer: String,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// List who holds a badge.
    Owners {
        /// Definition address.
        address: String,
    },
    /// Show pending and accepted badges for a recipient.
    Inbox {
        /// Recipient public key; defaults to the configured key's.
        #[arg(long)]
        pubkey: Option<String>,
    },
    /// Accept a pending award into the profile badge list.
    Accept {
        /// Definition address.
        address: String,
        /// Award event id.
        award_id: String,
    },
    /// Remove an accepted award from the profile badge list.
    Remove {
        /// Definition address.
        address: String,
        /// Award event id.
        award_id: String,
    },
    /// Request a badge from its issuer.
    Request {
        /// Definition address.
        address: String,
        /// Free-text motivation.
        #[arg(long, default_value = "")]
        message: String,
        /// Proof references as `<event_id>` or `<event_id>:<note|zap>`.
        #[arg(long = "proof")]
        proofs: Vec<String>,
    },
    /// Withdraw a previously published request.
    Withdraw {
        /// Definition address of the request to withdraw.
        address: String,
    },
    /// List incoming or outgoing badge requests.
    Requests {
        direction: Direction,
        /// Subject public key; defaults to the configured key's.
        #[arg(long)]
        pubkey: Option<String>,
    },
    /// Deny a badge request.
    Deny {
        /// Request event id.
        request_id: String,
        /// Definition address of the request.
        address: String,
        /// Requester public key.
        requester: String,
        #[arg(long, default_value = "")]
        reason: String,
    },
    /// Revoke a prior denial, re-opening the request.
    Revoke {
        /// Request event id.
        request_id: String,
        /// Definition address of the request.
        address: String,
        /// Requester public key.
        requester: String,
    },
    /// Fulfill a request by awarding the badge to the requester.
    Grant {
        /// Definition address of the request.
        address: String,
        /// Requester public key.
        requester: String,
    },
    /// Derive the lifecycle state of a request.
    State {
        /// Request event id.
        request_id: String,
    },
}

/// Request listing direction.
#[derive(Clone, Copy, ValueEnum)]
enum Direction {
    /// Requests for badges this key issues.
    Incoming,
    /// Requests this key has sent.
    Outgoing,
}

/// Execute the selected CLI subcommand.
async fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = Settings::from_env(&cli.env)?;
    let relays = cfg.relay_set();
    match cli.command {
        Commands::Define {
            identifier,
            name,
            description,
            image,
        } => {
            let keys = cfg.keys()?;
            let published =
                badges::create_definition(&relays, &keys, &identifier, &name, &description, &image)
                    .await?;
            let address = Address {
                kind: event::KIND_BADGE_DEFINITION,
                author: keys.pubkey.clone(),
                identifier,
            };
            println!("definition {address}");
            print_published(&published);
        }
        Commands::Award { address, recipients } => {
            let keys = cfg.keys()?;
            let address = Address::parse(&address)?;
            let published = badges::award_badge(&relays, &keys, &address, &recipients).await?;
            println!("awarded {} to {} recipient(s)", address, recipients.len());
            print_published(&published);
        }
        Commands::Browse { issuer, limit } => {
            let defs = badges::definitions_by_issuer(&relays, &issuer, limit).await;
            println!("{} definition(s)", defs.len());
            for def in defs {
                println!("  {} — {} ({})", def.address, def.name, def.description);
            }
        }
        Commands::Owners { address } => {
            let address = Address::parse(&address)?;
            let awards = badges::awards_of(&relays, &address).await;
            println!("{} award(s) of {}", awards.len(), address);
            for award in awards {
                for recipient in &award.recipients {
                    println!("  {} (award {})", recipient, award.id);
                }
            }
        }
        Commands::Inbox { pubkey } => {
            let pubkey = subject_pubkey(&cfg, pubkey)?;
            print_inbox(&relays, &pubkey).await;
        }
        Commands::Accept { address, award_id } => {
            let keys = cfg.keys()?;
            let address = Address::parse(&address)?;
            let published = badges::accept_badge(&relays, &keys, &address, &award_id).await?;
            println!("accepted {address}");
            print_published(&published);
        }
        Commands::Remove { address, award_id } => {
            let keys = cfg.keys()?;
            let address = Address::parse(&address)?;
            let published = badges::remove_badge(&relays, &keys, &address, &award_id).await?;
            println!("removed {address}");
            print_published(&published);
        }
        Commands::Request {
            address,
            message,
            proofs,
        } => {
            let keys = cfg.keys()?;
            let address = Address::parse(&address)?;
            let proofs = parse_proof_args(&proofs);
            let published =
                requests::create_request(&relays, &keys, &address, &message, &proofs).await?;
            println!("requested {address}");
            print_published(&published);
        }
        Commands::Withdraw { address } => {
            let keys = cfg.keys()?;
            let address = Address::parse(&address)?;
            let published = requests::withdraw_request(&relays, &keys, &address).await?;
            println!("withdrew request for {address}");
            print_published(&published);
        }
        Commands::Requests { direction, pubkey } => {
            let pubkey = subject_pubkey(&cfg, pubkey)?;
            let views = match direction {
                Direction::Incoming => requests::incoming_requests(&relays, &pubkey).await,
                Direction::Outgoing => requests::outgoing_requests(&relays, &pubkey).await,
            };
            println!("{} request(s)", views.len());
            for view in views {
                let badge_name = view
                    .badge
                    .as_ref()
                    .map(|b| b.name.as_str())
                    .unwrap_or("(unknown badge)");
                println!(
                    "  [{}] {} — {} from {}",
                    view.state, view.request.id, badge_name, view.peer.name
                );
                for proof in &view.proofs {
                    let status = if proof.verified() { "verified" } else { "unverified" };
                    println!(
                        "        proof {} ({}): {}",
                        proof.event_id,
                        proof.kind.label(),
                        status
                    );
                }
                if let Some(denial) = &view.denial {
                    println!("        denied: {}", denial.reason);
                }
            }
        }
        Commands::Deny {
            request_id,
            address,
            requester,
            reason,
        } => {
            let keys = cfg.keys()?;
            let address = Address::parse(&address)?;
            let published =
                requests::deny_request(&relays, &keys, &request_id, &address, &requester, &reason)
                    .await?;
            println!("denied request {request_id}");
            print_published(&published);
        }
        Commands::Revoke {
            request_id,
            address,
            requester,
        } => {
            let keys = cfg.keys()?;
            let address = Address::parse(&address)?;
            let published =
                requests::revoke_denial(&relays, &keys, &request_id, &address, &requester).await?;
            println!("revoked denial of {request_id}");
            print_published(&published);
        }
        Commands::Grant { address, requester } => {
            let keys = cfg.keys()?;
            let address = Address::parse(&address)?;
            let published =
                requests::award_from_request(&relays, &keys, &address, &requester).await?;
            println!("granted {address} to {requester}");
            print_published(&published);
        }
        Commands::State { request_id } => {
            let request = requests::fetch_request(&relays, &request_id)
                .await
                .ok_or_else(|| Error::NotFound(format!("request {request_id}")))?;
            let state = requests::request_state(&relays, &request).await;
            println!("{state}");
        }
    }
    Ok(())
}

/// Resolve the subject pubkey from the flag or the configured key.
fn subject_pubkey(cfg: &Settings, flag: Option<String>) -> anyhow::Result<String> {
    if let Some(pk) = flag {
        return Ok(pk);
    }
    cfg.keys()
        .map(|k| k.pubkey)
        .context("pass --pubkey or set SECRET_KEY")
}

/// Parse `--proof <id>[:<kind>]` arguments.
fn parse_proof_args(args: &[String]) -> Vec<ProofRef> {
    args.iter()
        .map(|arg| match arg.split_once(':') {
            Some((id, kind)) => ProofRef {
                event_id: id.to_string(),
                kind: ProofKind::parse(Some(kind)),
            },
            None => ProofRef {
                event_id: arg.clone(),
                kind: ProofKind::Note,
            },
        })
        .collect()
}

fn print_published(published: &Published) {
    println!(
        "event {} accepted by {}/{} relay(s)",
        published.event_id, published.accepted, published.total
    );
}

/// Print the pending and accepted badges for a recipient, enriched with
/// definition and issuer info.
async fn print_inbox(relays: &RelaySet, pubkey: &str) {
    let pending = badges::pending_awards(relays, pubkey).await;
    println!("Pending badges: {}", pending.len());
    for award in &pending {
        let def = badges::resolve_definition(relays, &award.definition).await;
        let issuer = profile::fetch_profile(relays, &award.issuer).await;
        let name = def
            .as_ref()
            .map(|d| d.name.as_str())
            .unwrap_or("(unknown badge)");
        println!("  {} — from {} (award {})", name, issuer.name, award.id);
    }
    let accepted = badges::accepted_list(relays, pubkey).await;
    println!("Accepted badges: {}", accepted.pairs.len());
    for (address, award_id) in &accepted.pairs {
        let def = badges::resolve_definition(relays, address).await;
        let name = def
            .as_ref()
            .map(|d| d.name.as_str())
            .unwrap_or("(unknown badge)");
        println!("  {} — {} (award {})", name, address, award_id);
    }
}

#[cfg(not(test))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("badgr=info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    run(cli).await
}
