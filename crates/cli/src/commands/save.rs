//! Saved-fit commands.

use serde_json::json;

use fit_battler_core::{FitId, PollId, UserId};
use fit_battler_engine::BattlerConfig;

use super::open;
use crate::output::print_json;

/// Save a fit, or unsave it if `user` already saved it.
///
/// # Errors
///
/// Returns an error if the poll or fit does not exist or the store fails.
pub async fn toggle(
    config: &BattlerConfig,
    user: &UserId,
    poll_id: PollId,
    fit_id: FitId,
) -> Result<(), Box<dyn std::error::Error>> {
    let battler = open(config).await?;
    let state = battler.saves().toggle_save(user, poll_id, fit_id).await?;
    print_json(&json!({
        "pollId": poll_id,
        "fitId": fit_id,
        "state": state,
    }))?;
    Ok(())
}

/// List everything `user` has saved, newest first.
///
/// # Errors
///
/// Returns an error if the store fails.
pub async fn list(config: &BattlerConfig, user: &UserId) -> Result<(), Box<dyn std::error::Error>> {
    let battler = open(config).await?;
    let entries = battler.saves().saved_entries(user).await?;
    print_json(&entries)?;
    Ok(())
}
