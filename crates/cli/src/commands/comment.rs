//! Fit comment commands.

use fit_battler_core::{FitId, UserId};
use fit_battler_engine::BattlerConfig;

use super::open;
use crate::output::print_json;

/// Comment on a fit as `user`.
///
/// # Errors
///
/// Returns an error if the body is blank, the fit does not exist or the store
/// fails.
pub async fn add(
    config: &BattlerConfig,
    user: &UserId,
    fit_id: FitId,
    body: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let battler = open(config).await?;
    let comment = battler.comments().add_comment(fit_id, user, body).await?;
    print_json(&comment)?;
    Ok(())
}

/// List comments on a fit, oldest first.
///
/// # Errors
///
/// Returns an error if the store fails.
pub async fn list(config: &BattlerConfig, fit_id: FitId) -> Result<(), Box<dyn std::error::Error>> {
    let battler = open(config).await?;
    let comments = battler.comments().list_comments(fit_id).await?;
    print_json(&comments)?;
    Ok(())
}
