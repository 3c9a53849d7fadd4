//! Reviewer load: the pending-review counter and the annual quota.
//!
//! Both are derived from the record store on every check, so removals,
//! submitted reviews and papers leaving the active pool are reflected
//! without bookkeeping. Callers hold the reviewer's lock across the check
//! and the commit of the new edge.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

use quillflow_core::config::VenueConfig;
use quillflow_core::error::{QuillflowError, Result};
use quillflow_core::model::{AssignmentRole, NoteKind};
use quillflow_core::traits::RecordStore;
use quillflow_core::types::PaperId;

/// Active reviewer assignments of `reviewer` on active papers with no
/// review submitted by them.
pub fn pending_reviews(store: &dyn RecordStore, reviewer: &str) -> Result<u32> {
    let mut states: HashMap<PaperId, bool> = HashMap::new();
    let mut count = 0;
    for edge in store.edges_for_person(reviewer)? {
        if !edge.is_active() || !edge.is_assignment(AssignmentRole::Reviewer) {
            continue;
        }
        let active = match states.get(&edge.paper_id) {
            Some(active) => *active,
            None => {
                let active = store.paper(&edge.paper_id)?.state.is_active();
                states.insert(edge.paper_id.clone(), active);
                active
            }
        };
        if !active {
            continue;
        }
        let reviewed = store
            .notes_for(&edge.paper_id)?
            .iter()
            .any(|n| n.kind == NoteKind::Review && n.signature == reviewer);
        if !reviewed {
            count += 1;
        }
    }
    Ok(count)
}

/// Reviewer assignments created for `reviewer` inside the trailing window
/// that were not removed.
pub fn annual_assignments(
    store: &dyn RecordStore,
    reviewer: &str,
    now: DateTime<Utc>,
    window_days: i64,
) -> Result<u32> {
    let since = now - Duration::days(window_days);
    Ok(store
        .edges_for_person(reviewer)?
        .iter()
        .filter(|e| e.is_active() && e.is_assignment(AssignmentRole::Reviewer) && e.cdate > since)
        .count() as u32)
}

/// Fail with `QuotaExceeded` if one more assignment would push the
/// reviewer past either ceiling.
pub fn check_quota(
    store: &dyn RecordStore,
    reviewer: &str,
    config: &VenueConfig,
    now: DateTime<Utc>,
) -> Result<()> {
    let pending = pending_reviews(store, reviewer)?;
    if pending + 1 > config.reviewing.max_pending_reviews {
        return Err(QuillflowError::QuotaExceeded(format!(
            "{reviewer} already has {pending} pending review(s), the maximum is {}",
            config.reviewing.max_pending_reviews
        )));
    }
    let annual = annual_assignments(store, reviewer, now, config.reviewing.annual_window_days)?;
    if annual >= config.reviewing.reviewers_max_papers {
        return Err(QuillflowError::QuotaExceeded(format!(
            "{reviewer} reached the maximum of {} papers in {} days",
            config.reviewing.reviewers_max_papers, config.reviewing.annual_window_days
        )));
    }
    Ok(())
}
