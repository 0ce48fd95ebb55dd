//! Postback simulator - drives a funnel server the way a partner network would.
//!
//! Usage:
//!   cargo run --bin postback-sim -- --url http://localhost:8080 register player42
//!   cargo run --bin postback-sim -- deposit player42 --amount 10
//!   cargo run --bin postback-sim -- guide https://funnel.example

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use funnel_client::Client;
use funnel_types::api::{ApiStatus, PostbackResponse};
use funnel_types::EventKind;
use serde::Serialize;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Simulate partner postbacks against a funnel server")]
struct Args {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a registration postback.
    Register { player_id: String },
    /// Send a first-deposit postback.
    Deposit {
        player_id: String,
        #[arg(long, default_value_t = 10.0)]
        amount: f64,
    },
    /// Send a recurring-deposit postback.
    Redeposit {
        player_id: String,
        #[arg(long, default_value_t = 5.0)]
        amount: f64,
    },
    /// Delete the player's record.
    Clear { player_id: String },
    /// Run the login gate for a player.
    Verify { player_id: String },
    /// Spend one prediction credit.
    Consume { player_id: String },
    /// Print the postback URLs to configure in the partner panel.
    Guide { domain: String },
}

/// Postback URL templates for `domain`, one per supported event.
fn guide(domain: &str) -> Vec<(&'static str, String)> {
    let base = format!("{}/api/postback", domain.trim_end_matches('/'));
    vec![
        (
            "Registration",
            format!(
                "{base}?user_id={{user_id}}&event_type={}",
                EventKind::Registration.as_str()
            ),
        ),
        (
            "First deposit",
            format!(
                "{base}?user_id={{user_id}}&event_type={}&amount={{amount}}",
                EventKind::FirstDeposit.as_str()
            ),
        ),
        (
            "Recurring deposit",
            format!(
                "{base}?user_id={{user_id}}&event_type={}&amount={{amount}}",
                EventKind::RecurringDeposit.as_str()
            ),
        ),
    ]
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to encode response")?
    );
    Ok(())
}

fn report_postback(player_id: &str, event: EventKind, response: &PostbackResponse) -> Result<()> {
    if response.success && response.status == ApiStatus::Applied {
        info!(player_id, event = event.as_str(), "postback applied");
    }
    print_json(response)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    if let Command::Guide { domain } = &args.command {
        for (title, url) in guide(domain) {
            println!("{title}:\n  {url}\n");
        }
        println!("If your network passes the player in sub1, use user_id={{sub1}} instead.");
        println!("Networks that name the event parameter `event` are accepted as well.");
        return Ok(());
    }

    let client = Client::new(&args.url).context("invalid server url")?;
    match args.command {
        Command::Register { player_id } => {
            let response = client.register(&player_id).await?;
            report_postback(&player_id, EventKind::Registration, &response)?;
        }
        Command::Deposit { player_id, amount } => {
            let response = client.first_deposit(&player_id, amount).await?;
            report_postback(&player_id, EventKind::FirstDeposit, &response)?;
        }
        Command::Redeposit { player_id, amount } => {
            let response = client.recurring_deposit(&player_id, amount).await?;
            report_postback(&player_id, EventKind::RecurringDeposit, &response)?;
        }
        Command::Clear { player_id } => print_json(&client.clear_user(&player_id).await?)?,
        Command::Verify { player_id } => print_json(&client.verify(&player_id).await?)?,
        Command::Consume { player_id } => {
            print_json(&client.use_prediction(&player_id).await?)?
        }
        Command::Guide { .. } => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subcommands() {
        let args = Args::parse_from(["postback-sim", "deposit", "player42", "--amount", "25"]);
        assert_eq!(args.url, "http://localhost:8080");
        match args.command {
            Command::Deposit { player_id, amount } => {
                assert_eq!(player_id, "player42");
                assert_eq!(amount, 25.0);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let args = Args::parse_from(["postback-sim", "--url", "http://funnel:9000", "redeposit", "p1"]);
        assert_eq!(args.url, "http://funnel:9000");
        assert!(matches!(args.command, Command::Redeposit { amount, .. } if amount == 5.0));
    }

    #[test]
    fn guide_lists_every_event() {
        let urls = guide("https://funnel.example/");
        assert_eq!(urls.len(), 3);
        assert_eq!(
            urls[0].1,
            "https://funnel.example/api/postback?user_id={user_id}&event_type=registration"
        );
        assert!(urls[1].1.ends_with("event_type=first_deposit&amount={amount}"));
        assert!(urls[2].1.contains("event_type=recurring_deposit"));
    }
}
