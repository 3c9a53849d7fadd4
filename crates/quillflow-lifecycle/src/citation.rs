//! Canonical citation string, recomputed on every transition.

use chrono::Datelike;
use quillflow_core::config::VenueConfig;
use quillflow_core::model::Paper;
use quillflow_core::types::PaperState;

use crate::visibility::identity_revealed;

/// Content field holding the citation.
pub const CITATION_FIELD: &str = "_bibtex";

pub fn citation(paper: &Paper, config: &VenueConfig) -> String {
    let year = paper.cdate.year();
    let revealed = identity_revealed(paper);
    let names = paper.author_names();

    let author = if revealed && !names.is_empty() {
        names.join(" and ")
    } else {
        "Anonymous".to_string()
    };

    let first_word: String = paper
        .title()
        .split_whitespace()
        .next()
        .unwrap_or("paper")
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    let surname = match names.first() {
        Some(name) if revealed => name
            .split_whitespace()
            .last()
            .unwrap_or("anonymous")
            .to_lowercase(),
        _ => "anonymous".to_string(),
    };
    let key = format!("{surname}{year}{first_word}");

    let journal = if paper.state == PaperState::Accepted {
        config.name.clone()
    } else {
        format!("Submitted to {}", config.name)
    };

    let note = match paper.state {
        PaperState::Submitted | PaperState::UnderReview | PaperState::DecisionPending => {
            "Under review".to_string()
        }
        PaperState::Accepted if paper.certifications.is_empty() => String::new(),
        PaperState::Accepted => paper.certifications.join(", "),
        PaperState::Rejected => "Rejected".to_string(),
        PaperState::DeskRejected => "Desk rejected".to_string(),
        PaperState::Withdrawn => "Withdrawn".to_string(),
        PaperState::Retracted => "Retracted after acceptance".to_string(),
    };

    let mut out = format!(
        "@article{{\n{key},\ntitle={{{}}},\nauthor={{{author}}},\njournal={{{journal}}},\nyear={{{year}}},\nurl={{{}/forum?id={}}}",
        paper.title(),
        config.website.trim_end_matches('/'),
        paper.id,
    );
    if !note.is_empty() {
        out.push_str(&format!(",\nnote={{{note}}}"));
    }
    out.push_str("\n}");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use quillflow_core::model::{CameraReady, Content, FieldValue, Readers};
    use quillflow_core::types::PaperId;
    use serde_json::json;

    fn paper(state: PaperState) -> Paper {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let mut content = Content::new();
        content.insert("title".into(), FieldValue::public(json!("Sparse Attention Revisited")));
        content.insert("authors".into(), FieldValue::public(json!(["Ada Lovelace", "Alan Turing"])));
        Paper {
            id: PaperId::from("p1"),
            number: 1,
            state,
            content,
            assigned_action_editor: None,
            pending: None,
            certifications: vec![],
            camera_ready: CameraReady::default(),
            authors_revealed: false,
            readers: Readers::new(),
            writers: Readers::new(),
            cdate: at,
            mdate: at,
            state_changed_at: at,
            version: 1,
        }
    }

    #[test]
    fn test_under_review_is_anonymous() {
        let cfg = VenueConfig::default();
        let c = citation(&paper(PaperState::UnderReview), &cfg);
        assert!(c.starts_with("@article{\nanonymous2026sparse,"));
        assert!(c.contains("author={Anonymous}"));
        assert!(c.contains("journal={Submitted to Transactions on Machine Learning Research}"));
        assert!(c.contains("note={Under review}"));
    }

    #[test]
    fn test_accepted_names_authors_and_certifications() {
        let cfg = VenueConfig::default();
        let mut p = paper(PaperState::Accepted);
        p.certifications = vec!["Featured Certification".into()];
        let c = citation(&p, &cfg);
        assert!(c.contains("lovelace2026sparse"));
        assert!(c.contains("author={Ada Lovelace and Alan Turing}"));
        assert!(c.contains("journal={Transactions on Machine Learning Research}"));
        assert!(c.contains("note={Featured Certification}"));
    }

    #[test]
    fn test_accepted_without_certification_has_no_note() {
        let cfg = VenueConfig::default();
        let c = citation(&paper(PaperState::Accepted), &cfg);
        assert!(!c.contains("note="));
    }
}
