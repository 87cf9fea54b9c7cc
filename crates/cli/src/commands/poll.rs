//! Poll commands.
//!
//! # Usage
//!
//! ```bash
//! fb-cli --user alice poll create -d "Office or weekend?" --fit-a i1,i2,i3 --fit-b i4,i5,i6
//! fb-cli poll recent --limit 5
//! fb-cli --user bob poll next --synthesize
//! fb-cli --user bob poll vote 0f0e... b
//! fb-cli poll close 0f0e...
//! ```

use serde::Serialize;
use tracing::info;

use fit_battler_core::{Choice, FitDraft, Item, Poll, PollDraft, PollId, UserId};
use fit_battler_engine::BattlerConfig;
use fit_battler_engine::catalog::{CachedCatalog, StaticCatalog, resolve_fit};
use fit_battler_engine::services::RandomBattle;

use super::open;
use crate::output::{print_json, print_line};

/// A poll with its fits resolved to catalog items.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PollDetails {
    #[serde(flatten)]
    poll: Poll,
    percentages: Percentages,
    items_a: Vec<Option<Item>>,
    items_b: Vec<Option<Item>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "UPPERCASE")]
struct Percentages {
    a: u8,
    b: u8,
}

impl From<(u8, u8)> for Percentages {
    fn from((a, b): (u8, u8)) -> Self {
        Self { a, b }
    }
}

/// Build a draft from command-line arguments.
pub fn draft(
    description: String,
    (name_a, items_a): (String, Vec<String>),
    (name_b, items_b): (String, Vec<String>),
) -> PollDraft {
    PollDraft {
        description,
        fit_a: FitDraft::new(name_a, items_a),
        fit_b: FitDraft::new(name_b, items_b),
    }
}

/// Publish a poll authored by `user`.
///
/// # Errors
///
/// Returns an error if the draft is invalid or the store fails.
pub async fn create(
    config: &BattlerConfig,
    user: &UserId,
    draft: &PollDraft,
) -> Result<(), Box<dyn std::error::Error>> {
    let battler = open(config).await?;
    let poll = battler.polls().create_poll(draft, user).await?;
    info!(poll_id = %poll.id, "Poll published");
    print_json(&poll)?;
    Ok(())
}

/// Show one poll with its items and vote split.
///
/// # Errors
///
/// Returns an error if the poll does not exist, the store fails or the
/// catalog file cannot be parsed.
pub async fn show(config: &BattlerConfig, poll_id: PollId) -> Result<(), Box<dyn std::error::Error>> {
    let battler = open(config).await?;
    let poll = battler.polls().get_poll(poll_id).await?;
    let catalog = StaticCatalog::load(&config.catalog_path).await?;

    let details = PollDetails {
        percentages: poll.votes.percentages().into(),
        items_a: resolve_fit(&catalog, &poll.fit_a).await,
        items_b: resolve_fit(&catalog, &poll.fit_b).await,
        poll,
    };
    print_json(&details)?;
    Ok(())
}

/// List recent polls, newest first.
///
/// # Errors
///
/// Returns an error if the store fails.
pub async fn recent(
    config: &BattlerConfig,
    limit: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let battler = open(config).await?;
    let polls = battler.polls().recent_polls(limit).await?;
    print_json(&polls)?;
    Ok(())
}

/// Show the next poll for `user`, optionally synthesizing one from the catalog.
///
/// # Errors
///
/// Returns an error if the store or catalog cannot be opened. Failures while
/// picking a poll are reported as "no polls left".
pub async fn next(
    config: &BattlerConfig,
    user: &UserId,
    synthesize: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let battler = open(config).await?;

    let poll = if synthesize {
        let catalog = CachedCatalog::new(StaticCatalog::load(&config.catalog_path).await?);
        let synthesizer = RandomBattle::new(catalog);
        battler.polls().next_unvoted_poll_with(user, &synthesizer).await
    } else {
        battler.polls().next_unvoted_poll(user).await
    };

    match poll {
        Some(poll) => print_json(&poll)?,
        None => print_line("No polls left to vote on"),
    }
    Ok(())
}

/// Vote on a poll and print the resulting tally.
///
/// # Errors
///
/// Returns an error if the poll does not exist, is closed, or the store fails.
pub async fn vote(
    config: &BattlerConfig,
    user: &UserId,
    poll_id: PollId,
    choice: Choice,
) -> Result<(), Box<dyn std::error::Error>> {
    let battler = open(config).await?;
    let receipt = battler
        .polls()
        .submit_vote(poll_id, user, choice, battler.tallies())
        .await?;

    print_json(&receipt)?;
    let (a, b) = receipt.tally.percentages();
    print_line(&format!("A {a}% / B {b}%"));
    Ok(())
}

/// Close a poll.
///
/// # Errors
///
/// Returns an error if the poll does not exist or the store fails.
pub async fn close(config: &BattlerConfig, poll_id: PollId) -> Result<(), Box<dyn std::error::Error>> {
    let battler = open(config).await?;
    battler.polls().close_poll(poll_id).await?;
    print_line(&format!("Poll {poll_id} closed"));
    Ok(())
}
