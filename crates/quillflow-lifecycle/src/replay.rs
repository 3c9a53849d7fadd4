//! Rebuild a paper by folding its edit history through the state machine.

use serde_json::Value;

use quillflow_core::config::VenueConfig;
use quillflow_core::error::{QuillflowError, Result};
use quillflow_core::model::{Edit, EditKind, Paper};
use quillflow_core::types::PaperId;

use crate::transition::{Transition, apply, submit};

/// Payload key carrying the paper number on the submission edit.
pub const NUMBER_KEY: &str = "number";
/// Payload key carrying the action editor on paper assignment edits.
pub const ACTION_EDITOR_KEY: &str = "assigned_action_editor";

/// Fold a paper's edits, oldest first. The first transition must be the
/// submission; assignment edits on the paper set its action editor.
pub fn replay(edits: &[Edit], config: &VenueConfig) -> Result<Paper> {
    let mut paper: Option<Paper> = None;

    for edit in edits {
        match edit.kind {
            EditKind::Transition => {
                let transition: Transition = serde_json::from_value(edit.payload.clone())?;
                paper = Some(match (paper.take(), transition) {
                    (None, Transition::Submit { content }) => {
                        let number = edit
                            .payload
                            .get(NUMBER_KEY)
                            .and_then(Value::as_u64)
                            .and_then(|n| u32::try_from(n).ok())
                            .ok_or_else(|| {
                                QuillflowError::store(format!(
                                    "submission edit {} has no paper number",
                                    edit.id
                                ))
                            })?;
                        submit(
                            PaperId(edit.entity_id.clone()),
                            number,
                            content,
                            &edit.actor,
                            edit.at,
                            config,
                        )?
                    }
                    (None, other) => {
                        return Err(QuillflowError::store(format!(
                            "history of {} starts with a {} instead of a submission",
                            edit.entity_id,
                            other.name()
                        )));
                    }
                    (Some(current), transition) => {
                        apply(&current, &transition, &edit.actor, edit.at, config)?.paper
                    }
                });
            }
            EditKind::Assignment | EditKind::Unassignment => {
                if let Some(current) = paper.as_mut() {
                    current.assigned_action_editor = edit
                        .payload
                        .get(ACTION_EDITOR_KEY)
                        .and_then(Value::as_str)
                        .map(str::to_string);
                }
            }
            _ => {}
        }
    }

    paper.ok_or_else(|| QuillflowError::not_found("submission edit"))
}

/// Whether two papers agree on everything but the store version.
pub fn same_lifecycle(a: &Paper, b: &Paper) -> bool {
    let mut a = a.clone();
    let mut b = b.clone();
    a.version = 0;
    b.version = 0;
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::ReviewVerdict;
    use chrono::{Duration, Utc};
    use quillflow_core::model::{Content, FieldValue};
    use quillflow_core::types::{Actor, PaperState};
    use serde_json::json;

    fn content() -> Content {
        let mut c = Content::new();
        c.insert("title".into(), FieldValue::public(json!("Sparse Attention")));
        c.insert("authors".into(), FieldValue::public(json!(["Ada Author"])));
        c.insert("authorids".into(), FieldValue::public(json!(["~Ada_Author1"])));
        c
    }

    #[test]
    fn test_replay_matches_forward_application() {
        let cfg = VenueConfig::default();
        let t0 = Utc::now();
        let author = Actor::author("~Ada_Author1");
        let ae = Actor::action_editor("~Alan_Editor1");

        let submission = Transition::Submit { content: content() };
        let mut payload = submission.to_payload();
        payload[NUMBER_KEY] = json!(7);
        let mut edits = vec![Edit::new("p1", EditKind::Transition, &author, payload, t0)];

        let mut forward = submit(PaperId::from("p1"), 7, content(), &author, t0, &cfg).unwrap();

        let t1 = t0 + Duration::days(1);
        edits.push(Edit::new(
            "p1",
            EditKind::Assignment,
            &Actor::venue(),
            json!({ ACTION_EDITOR_KEY: "~Alan_Editor1" }),
            t1,
        ));
        forward.assigned_action_editor = Some("~Alan_Editor1".into());

        let t2 = t0 + Duration::days(2);
        let approve = Transition::ReviewApproval {
            verdict: ReviewVerdict::AppropriateForReview,
        };
        edits.push(Edit::new("p1", EditKind::Transition, &ae, approve.to_payload(), t2));
        forward = apply(&forward, &approve, &ae, t2, &cfg).unwrap().paper;

        let t3 = t0 + Duration::days(3);
        edits.push(Edit::new("p1", EditKind::Transition, &author, Transition::Withdraw.to_payload(), t3));
        forward = apply(&forward, &Transition::Withdraw, &author, t3, &cfg).unwrap().paper;

        let replayed = replay(&edits, &cfg).unwrap();
        assert_eq!(replayed.state, PaperState::Withdrawn);
        assert!(same_lifecycle(&replayed, &forward));
    }

    #[test]
    fn test_replay_requires_submission_first() {
        let cfg = VenueConfig::default();
        let edits = vec![Edit::new(
            "p1",
            EditKind::Transition,
            &Actor::author("~Ada_Author1"),
            Transition::Withdraw.to_payload(),
            Utc::now(),
        )];
        assert!(replay(&edits, &cfg).is_err());
        assert!(replay(&[], &cfg).is_err());
    }
}
