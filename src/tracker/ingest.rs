//! Issue and pull request ingestion

use chrono::{DateTime, Utc};
use log::{debug, info};
use std::collections::HashSet;

use super::github::GHOST_LOGIN;
use super::retry::RetryPolicy;
use super::{ItemType, RawItem, TrackerClient, TrackerError, TrackerTarget};
use crate::error::PipelineResult;
use crate::pipeline::StageOutcome;
use crate::store::{IssueKind, ItemKind, PullRequestKind, Store, TrackedItem};

/// An item kind the tracker can list
pub trait Fetchable: ItemKind {
    const ITEM_TYPE: ItemType;
}

impl Fetchable for IssueKind {
    const ITEM_TYPE: ItemType = ItemType::Issue;
}

impl Fetchable for PullRequestKind {
    const ITEM_TYPE: ItemType = ItemType::PullRequest;
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestSettings {
    pub page_size: u32,
    pub retry: RetryPolicy,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            page_size: 100,
            retry: RetryPolicy::default(),
        }
    }
}

/// Page through every item of kind `K`, retrying each page per the policy
pub async fn fetch_all<K: Fetchable>(
    client: &dyn TrackerClient,
    target: &TrackerTarget,
    settings: &IngestSettings,
) -> Result<Vec<TrackedItem<K>>, TrackerError> {
    let mut items = Vec::new();
    let mut seen = HashSet::new();
    let mut cursor: Option<String> = None;
    let mut page_number = 0u32;

    loop {
        page_number += 1;
        let after = cursor.as_deref();
        let page_size = settings.page_size;
        let description = format!("fetching {} page {} of {}", K::LABEL, page_number, target);
        let page = settings
            .retry
            .run(&description, move || client.fetch_page(target, K::ITEM_TYPE, after, page_size))
            .await?;

        debug!("Page {}: {} {}s", page_number, page.items.len(), K::LABEL);
        for raw in page.items {
            if seen.insert(raw.id.clone()) {
                items.push(normalize::<K>(raw)?);
            }
        }

        if !page.has_next_page {
            break;
        }
        match page.end_cursor {
            Some(next) => cursor = Some(next),
            None => {
                return Err(TrackerError::Decode(
                    "page reports more results but carries no end cursor".to_string(),
                ))
            }
        }
    }

    Ok(items)
}

fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, TrackerError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| TrackerError::Decode(format!("{} '{}': {}", field, value, e)))
}

/// Convert a raw tracker item into its record form
pub fn normalize<K: ItemKind>(raw: RawItem) -> Result<TrackedItem<K>, TrackerError> {
    let created_at = parse_timestamp("createdAt", &raw.created_at)?;
    let closed_at = raw
        .closed_at
        .as_deref()
        .map(|value| parse_timestamp("closedAt", value))
        .transpose()?;

    Ok(TrackedItem::new(
        raw.id,
        raw.number,
        raw.author.unwrap_or_else(|| GHOST_LOGIN.to_string()),
        created_at,
        closed_at,
        raw.state.to_uppercase(),
        raw.labels,
    ))
}

/// Fetch every item of kind `K` and append the ones not stored yet
pub async fn ingest<K: Fetchable>(
    store: &mut Store,
    client: &dyn TrackerClient,
    target: &TrackerTarget,
    settings: &IngestSettings,
) -> PipelineResult<StageOutcome> {
    info!("Fetching {}s of {}", K::LABEL, target);
    let items = fetch_all::<K>(client, target, settings).await?;

    let known = store.distinct_text(K::schema(), "id")?;
    let fetched = items.len();
    let new_items: Vec<_> = items.into_iter().filter(|i| !known.contains(&i.id)).collect();
    info!(
        "Fetched {} {}s, {} new",
        fetched,
        K::LABEL,
        new_items.len()
    );

    let written = store.append(&new_items)?;
    Ok(StageOutcome::new()
        .wrote(K::schema().name, written)
        .skipped(fetched - new_items.len()))
}
