//! Reader and writer sets derived from paper state.
//!
//! Papers are world-readable once reviewing starts, except desk rejections,
//! which stay with the venue, the editors and the authors. Author identity
//! fields stay restricted until the paper is accepted or the authors choose
//! to reveal themselves.

use quillflow_core::groups::{EVERYONE, GroupIds};
use quillflow_core::model::{Paper, Readers, readers};
use quillflow_core::types::PaperState;

/// Fields that identify the authors.
pub const IDENTITY_FIELDS: [&str; 2] = ["authors", "authorids"];

/// The venue, its editors-in-chief, the paper's action editors and authors.
pub fn editorial_readers(number: u32, groups: &GroupIds) -> Readers {
    readers([
        groups.venue(),
        groups.editors_in_chief(),
        groups.action_editors(number),
        groups.authors(number),
    ])
}

pub fn paper_readers(paper: &Paper, groups: &GroupIds) -> Readers {
    if paper.state.is_public() {
        readers([EVERYONE])
    } else {
        editorial_readers(paper.number, groups)
    }
}

/// Authors may edit while the paper is in the active pool; after that only
/// the venue writes.
pub fn paper_writers(paper: &Paper, groups: &GroupIds) -> Readers {
    if paper.state.is_active() {
        readers([groups.venue(), groups.authors(paper.number)])
    } else {
        readers([groups.venue()])
    }
}

pub fn identity_revealed(paper: &Paper) -> bool {
    paper.authors_revealed || paper.state == PaperState::Accepted
}

/// Recompute paper readers, writers and the identity-field overrides.
pub fn refresh(paper: &mut Paper, groups: &GroupIds) {
    paper.readers = paper_readers(paper, groups);
    paper.writers = paper_writers(paper, groups);
    let hidden = if identity_revealed(paper) {
        None
    } else {
        Some(editorial_readers(paper.number, groups))
    };
    for name in IDENTITY_FIELDS {
        if let Some(field) = paper.content.get_mut(name) {
            field.readers = hidden.clone();
        }
    }
}

/// Readers of a reply that is not public: the editors and the signer's
/// group.
pub fn private_note_readers(number: u32, signer_group: &str, groups: &GroupIds) -> Readers {
    readers([
        groups.venue(),
        groups.editors_in_chief(),
        groups.action_editors(number),
        signer_group.to_string(),
    ])
}

/// Anonymous group readers; other reviewers join once reviews are released.
pub fn anonymous_group_readers(number: u32, anon_id: &str, released: bool, groups: &GroupIds) -> Readers {
    let mut r = readers([
        groups.venue(),
        groups.editors_in_chief(),
        groups.action_editors(number),
        anon_id.to_string(),
    ]);
    if released {
        r.insert(groups.reviewers(number));
    }
    r
}
