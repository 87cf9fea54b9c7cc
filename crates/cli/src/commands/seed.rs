//! Seed the configured store with catalog items, polls and saved fits.
//!
//! # Usage
//!
//! ```bash
//! # A directory holding catalog / polls / saved files (JSON or YAML)
//! fb-cli seed ./data/seed
//!
//! # A single file with `catalog`, `polls` and `saved` keys
//! fb-cli --user user_local seed ./seed.yaml
//! ```
//!
//! # Seed Format
//!
//! Polls use the mobile app's shape: string ids, `createdAt` in epoch
//! milliseconds (RFC 3339 is accepted too) and a `voters` map of user id to
//! `"A"` / `"B"`. Non-UUID ids are mapped to stable v5 UUIDs, so seeding the
//! same files twice skips what is already there. Voters become ledger
//! entries; tallies are counted from them and any stored `votes` that
//! disagree are ignored with a warning.
//!
//! Saved entries reference their poll by `id` and belong to `--user` unless
//! they carry a `userId`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use fit_battler_core::{
    Choice, Fit, FitDraft, FitId, Item, ItemId, Poll, PollDraft, PollId, PollStatus, SavedEntry,
    Tally, UserId, ValidationError, VoteRecord,
};
use fit_battler_engine::BattlerConfig;
use fit_battler_engine::db::{Backend, Store, StoreError, VoteInsert};

use crate::output::print_json;

/// File stems tried, in order, for each collection in a seed directory.
const CATALOG_STEMS: &[&str] = &["catalog", "catalog2"];
const POLL_STEMS: &[&str] = &["polls", "polls2"];
const SAVED_STEMS: &[&str] = &["saved"];
const EXTENSIONS: &[&str] = &["json", "yaml", "yml"];

/// Errors raised while reading seed files.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("seed path not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// Everything one seed run loads.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SeedBundle {
    pub catalog: Vec<Item>,
    pub polls: Vec<SeedPoll>,
    pub saved: Vec<SeedSaved>,
}

/// A timestamp in epoch milliseconds or RFC 3339.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum SeedTime {
    Millis(i64),
    Rfc3339(DateTime<Utc>),
}

impl SeedTime {
    fn to_datetime(self) -> DateTime<Utc> {
        match self {
            Self::Millis(ms) => Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now),
            Self::Rfc3339(at) => at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedFit {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub item_ids: Vec<ItemId>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedPoll {
    pub id: String,
    pub author_id: UserId,
    pub description: String,
    pub fit_a: SeedFit,
    pub fit_b: SeedFit,
    pub created_at: SeedTime,
    #[serde(default)]
    pub status: PollStatus,
    #[serde(default)]
    pub votes: Option<Tally>,
    #[serde(default)]
    pub voters: BTreeMap<UserId, Choice>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedSaved {
    /// The poll the fit belongs to.
    #[serde(alias = "pollId")]
    pub id: String,
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub fit: SeedFit,
    pub saved_at: SeedTime,
}

/// Counts printed after a seed run.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedReport {
    pub items: usize,
    pub polls: usize,
    pub polls_skipped: usize,
    pub polls_invalid: usize,
    pub votes: usize,
    pub saved: usize,
    pub saved_skipped: usize,
}

/// A seed id as a UUID: parsed when it already is one, otherwise derived
/// deterministically from `scope` and the raw id.
fn seed_uuid(scope: &str, raw: &str) -> Uuid {
    Uuid::parse_str(raw.trim()).unwrap_or_else(|_| {
        let name = format!("fit-battler/{scope}/{raw}");
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
    })
}

fn poll_id(raw: &str) -> PollId {
    PollId::new(seed_uuid("poll", raw))
}

/// Fit ids are scoped by poll; seed files reuse short fit ids across polls.
fn fit_id(poll_raw: &str, fit_raw: &str) -> FitId {
    FitId::new(seed_uuid(&format!("fit/{poll_raw}"), fit_raw))
}

impl SeedFit {
    fn to_draft(&self) -> FitDraft {
        FitDraft::new(self.name.as_str(), self.item_ids.iter().map(ItemId::as_str))
    }

    fn to_fit(&self, poll_raw: &str) -> Fit {
        Fit {
            id: fit_id(poll_raw, &self.id),
            name: self.name.clone(),
            item_ids: self.item_ids.clone(),
        }
    }
}

impl SeedPoll {
    /// Apply the publishing rules: a description and at least one item per
    /// fit, with no blank slots.
    fn validate(&self) -> Result<(), ValidationError> {
        PollDraft {
            description: self.description.clone(),
            fit_a: self.fit_a.to_draft(),
            fit_b: self.fit_b.to_draft(),
        }
        .validate(1)
    }

    /// The poll as first published (open, no votes) and its ledger entries.
    fn into_parts(self) -> (Poll, Vec<VoteRecord>) {
        let created_at = self.created_at.to_datetime();
        let poll = Poll {
            id: poll_id(&self.id),
            author_id: self.author_id,
            description: self.description.trim().to_owned(),
            fit_a: self.fit_a.to_fit(&self.id),
            fit_b: self.fit_b.to_fit(&self.id),
            created_at,
            status: PollStatus::Open,
            votes: Tally::default(),
        };
        let votes = self
            .voters
            .into_iter()
            .map(|(user_id, choice)| VoteRecord {
                poll_id: poll.id,
                user_id,
                choice,
                cast_at: created_at,
            })
            .collect();
        (poll, votes)
    }
}

fn parse_file<T: DeserializeOwned>(path: &Path, raw: &str) -> Result<T, SeedError> {
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
    if is_yaml {
        serde_yaml::from_str(raw).map_err(|source| SeedError::Yaml {
            path: path.to_owned(),
            source,
        })
    } else {
        serde_json::from_str(raw).map_err(|source| SeedError::Json {
            path: path.to_owned(),
            source,
        })
    }
}

async fn read_file<T: DeserializeOwned>(path: &Path) -> Result<T, SeedError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SeedError::Io {
            path: path.to_owned(),
            source,
        })?;
    parse_file(path, &raw)
}

/// The first `<stem>.<ext>` that exists in `dir`.
fn find_collection(dir: &Path, stems: &[&str]) -> Option<PathBuf> {
    stems
        .iter()
        .flat_map(|stem| EXTENSIONS.iter().map(move |ext| dir.join(format!("{stem}.{ext}"))))
        .find(|candidate| candidate.is_file())
}

async fn read_collection<T: DeserializeOwned>(dir: &Path, stems: &[&str]) -> Result<Vec<T>, SeedError> {
    match find_collection(dir, stems) {
        Some(path) => {
            info!(path = %path.display(), "Reading seed file");
            read_file(&path).await
        }
        None => Ok(Vec::new()),
    }
}

/// Read a seed directory or a single seed file.
///
/// # Errors
///
/// Returns `SeedError` if the path does not exist or a file cannot be parsed.
pub async fn load_bundle(path: &Path) -> Result<SeedBundle, SeedError> {
    if path.is_dir() {
        return Ok(SeedBundle {
            catalog: read_collection(path, CATALOG_STEMS).await?,
            polls: read_collection(path, POLL_STEMS).await?,
            saved: read_collection(path, SAVED_STEMS).await?,
        });
    }
    if path.is_file() {
        return read_file(path).await;
    }
    Err(SeedError::NotFound(path.to_owned()))
}

/// Load `bundle`'s polls and saved entries into `store`.
///
/// Polls already present are skipped along with their voters. Polls that
/// could not be published (blank description, empty or blank item slots,
/// fit ids shared with another poll) are skipped and counted as invalid.
/// Saved entries whose poll or fit is unknown are skipped.
///
/// # Errors
///
/// Returns `StoreError` on the first store failure other than a duplicate.
pub async fn import<S: Store>(
    store: &S,
    bundle: SeedBundle,
    default_user: &UserId,
) -> Result<SeedReport, StoreError> {
    let mut report = SeedReport {
        items: bundle.catalog.len(),
        ..SeedReport::default()
    };

    for seed in bundle.polls {
        let raw_id = seed.id.clone();
        let closed = seed.status == PollStatus::Closed;
        let stored_votes = seed.votes;
        if let Err(e) = seed.validate() {
            warn!(seed_id = %raw_id, error = %e, "Seed poll cannot be published, skipping");
            report.polls_invalid += 1;
            continue;
        }
        let (poll, votes) = seed.into_parts();

        if store.get_poll(poll.id).await?.is_some() {
            info!(seed_id = %raw_id, "Poll already seeded, skipping");
            report.polls_skipped += 1;
            continue;
        }
        match store.insert_poll(&poll).await {
            Ok(()) => report.polls += 1,
            Err(StoreError::Conflict(reason)) => {
                warn!(seed_id = %raw_id, %reason, "Seed poll reuses fit ids, skipping");
                report.polls_invalid += 1;
                continue;
            }
            Err(e) => return Err(e),
        }

        let mut tally = Tally::default();
        for vote in &votes {
            match store.record_vote(vote).await? {
                VoteInsert::Recorded(current) => {
                    tally = current;
                    report.votes += 1;
                }
                VoteInsert::Duplicate { tally: current, .. } => tally = current,
                VoteInsert::PollClosed | VoteInsert::PollMissing => {
                    return Err(StoreError::DataCorruption(format!(
                        "poll {} rejected a seeded vote",
                        poll.id
                    )));
                }
            }
        }
        if let Some(stored) = stored_votes.filter(|stored| *stored != tally) {
            warn!(
                seed_id = %raw_id,
                stored_a = stored.a,
                stored_b = stored.b,
                counted_a = tally.a,
                counted_b = tally.b,
                "Seed vote counts disagree with voters, using voters"
            );
        }

        if closed {
            store.set_poll_status(poll.id, PollStatus::Closed).await?;
        }
    }

    for seed in bundle.saved {
        let poll_id = poll_id(&seed.id);
        let fit_id = fit_id(&seed.id, &seed.fit.id);
        let Some(poll) = store.get_poll(poll_id).await? else {
            warn!(seed_id = %seed.id, "Saved entry references an unknown poll, skipping");
            report.saved_skipped += 1;
            continue;
        };
        let Some(side) = poll.side_of(fit_id) else {
            warn!(seed_id = %seed.id, fit = %seed.fit.id, "Saved fit is not part of its poll, skipping");
            report.saved_skipped += 1;
            continue;
        };

        let entry = SavedEntry {
            poll_id,
            user_id: seed.user_id.unwrap_or_else(|| default_user.clone()),
            author_id: poll.author_id.clone(),
            fit: poll.fit(side).clone(),
            saved_at: seed.saved_at.to_datetime(),
        };
        match store.insert_saved(&entry).await {
            Ok(()) => report.saved += 1,
            Err(StoreError::Conflict(_)) => report.saved_skipped += 1,
            Err(e) => return Err(e),
        }
    }

    Ok(report)
}

/// Write the seed catalog where the catalog provider reads it.
async fn write_catalog(path: &Path, items: &[Item]) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let rendered = serde_json::to_string_pretty(items)?;
    tokio::fs::write(path, rendered).await?;
    info!(path = %path.display(), items = items.len(), "Catalog written");
    Ok(())
}

/// Seed the configured store from `path`.
///
/// # Errors
///
/// Returns an error if the seed files cannot be read, the catalog cannot be
/// written or the store fails.
pub async fn run(
    config: &BattlerConfig,
    path: &Path,
    default_user: &UserId,
) -> Result<(), Box<dyn std::error::Error>> {
    info!(path = %path.display(), "Loading seed data");
    let mut bundle = load_bundle(path).await?;
    info!(
        items = bundle.catalog.len(),
        polls = bundle.polls.len(),
        saved = bundle.saved.len(),
        "Parsed seed data"
    );

    let catalog = std::mem::take(&mut bundle.catalog);
    if !catalog.is_empty() {
        write_catalog(&config.catalog_path, &catalog).await?;
    }

    let store = Backend::open(config).await?;
    let mut report = import(&store, bundle, default_user).await?;
    report.items = catalog.len();

    info!(?report, "Seeding complete");
    print_json(&report)?;
    Ok(())
}
