//! Anonymous identity groups: one stable pseudonymous handle per
//! (paper, role, person).

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

use quillflow_core::groups::GroupIds;
use quillflow_core::model::{AnonymousBinding, AssignmentRole, Group, Paper};

use quillflow_lifecycle::visibility::anonymous_group_readers;

/// Unambiguous uppercase alphabet, no 0/O or 1/I.
const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const SUFFIX_LEN: usize = 4;

/// Four-character suffix derived from the binding and an attempt counter.
pub fn anon_suffix(paper: &Paper, role: AssignmentRole, person: &str, attempt: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(paper.id.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(format!("{role:?}").as_bytes());
    hasher.update(b"|");
    hasher.update(person.as_bytes());
    hasher.update(b"|");
    hasher.update(attempt.to_le_bytes());
    hasher
        .finalize()
        .iter()
        .take(SUFFIX_LEN)
        .map(|b| ALPHABET[(*b as usize) % ALPHABET.len()] as char)
        .collect()
}

pub fn group_id(paper: &Paper, role: AssignmentRole, suffix: &str, ids: &GroupIds) -> String {
    match role {
        AssignmentRole::Reviewer => ids.anonymous_reviewer(paper.number, suffix),
        AssignmentRole::ActionEditor => ids.anonymous_action_editor(paper.number, suffix),
    }
}

/// The anonymous group bound to `person` on this paper, if any.
pub fn find_binding<'g>(groups: &'g [Group], role: AssignmentRole, person: &str) -> Option<&'g Group> {
    groups.iter().find(|g| {
        g.anonymous
            .as_ref()
            .is_some_and(|b| b.role == role && b.person == person)
    })
}

/// Existing binding, or a fresh group whose id collides with none of the
/// paper's groups. The flag is true for a fresh group.
pub fn ensure_group(
    paper: &Paper,
    existing: &[Group],
    role: AssignmentRole,
    person: &str,
    released: bool,
    ids: &GroupIds,
    at: DateTime<Utc>,
) -> (Group, bool) {
    if let Some(group) = find_binding(existing, role, person) {
        return (group.clone(), false);
    }
    let taken: BTreeSet<&str> = existing.iter().map(|g| g.id.as_str()).collect();
    let mut attempt = 0;
    let id = loop {
        let candidate = group_id(paper, role, &anon_suffix(paper, role, person, attempt), ids);
        if !taken.contains(candidate.as_str()) {
            break candidate;
        }
        attempt += 1;
    };
    let readers = anonymous_group_readers(
        paper.number,
        &id,
        released && role == AssignmentRole::Reviewer,
        ids,
    );
    let group = Group {
        id,
        paper_id: Some(paper.id.clone()),
        members: [person.to_string()].into_iter().collect(),
        readers,
        anonymous: Some(AnonymousBinding {
            role,
            person: person.to_string(),
        }),
        cdate: at,
        version: 0,
    };
    (group, true)
}
