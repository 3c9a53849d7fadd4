//! Transitions of the paper state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use quillflow_core::config::VenueConfig;
use quillflow_core::error::{QuillflowError, Result};
use quillflow_core::groups::GroupIds;
use quillflow_core::model::{
    CameraReady, Content, Decision, FieldValue, Paper, PendingApproval, PendingKind, Readers,
};
use quillflow_core::types::{Actor, PaperId, PaperState, Role};

use crate::citation::{CITATION_FIELD, citation};
use crate::decision::{check_certifications, validate_decision};
use crate::visibility;

pub const REPLY_CAP: &str = "maximum number (1) of replies reached";

/// Outcome of the action editor's (or an editor-in-chief's) first look.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewVerdict {
    AppropriateForReview,
    DeskReject { comment: String },
}

/// An edit that moves a paper through its lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "transition", rename_all = "snake_case")]
pub enum Transition {
    Submit {
        content: Content,
    },
    Revise {
        content: Content,
    },
    ReviewApproval {
        verdict: ReviewVerdict,
    },
    DeskRejectionApproval {
        approve: bool,
    },
    Decide {
        decision: Decision,
    },
    DecisionApproval {
        approve: bool,
        /// Replaces the certifications proposed by the action editor.
        #[serde(default)]
        certifications: Option<Vec<String>>,
    },
    Withdraw,
    RequestRetraction {
        reason: String,
    },
    RetractionApproval {
        approve: bool,
    },
    CameraReady {
        content: Content,
    },
    VerifyCameraReady,
    Deanonymize,
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Transition::Submit { .. } => "submission",
            Transition::Revise { .. } => "revision",
            Transition::ReviewApproval { .. } => "review approval",
            Transition::DeskRejectionApproval { .. } => "desk rejection approval",
            Transition::Decide { .. } => "decision",
            Transition::DecisionApproval { .. } => "decision approval",
            Transition::Withdraw => "withdrawal",
            Transition::RequestRetraction { .. } => "retraction",
            Transition::RetractionApproval { .. } => "retraction approval",
            Transition::CameraReady { .. } => "camera ready revision",
            Transition::VerifyCameraReady => "camera ready verification",
            Transition::Deanonymize => "authors deanonymization",
        }
    }

    pub fn to_payload(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Result of an accepted transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub paper: Paper,
    pub previous: PaperState,
}

impl Outcome {
    pub fn state_changed(&self) -> bool {
        self.previous != self.paper.state
    }

    /// The paper was active before and is terminal now.
    pub fn left_active_pool(&self) -> bool {
        self.previous.is_active() && self.paper.state.is_terminal()
    }

    pub fn readers(&self) -> &Readers {
        &self.paper.readers
    }
}

pub fn is_editor_in_chief(actor: &Actor, config: &VenueConfig) -> bool {
    match actor.role {
        Role::Venue => true,
        Role::EditorInChief => {
            config.editors_in_chief.is_empty() || config.editors_in_chief.contains(&actor.id)
        }
        _ => false,
    }
}

pub fn is_assigned_editor(paper: &Paper, actor: &Actor) -> bool {
    actor.role == Role::ActionEditor && paper.assigned_action_editor.as_deref() == Some(actor.id.as_str())
}

fn require_editor_in_chief(actor: &Actor, config: &VenueConfig, what: &str) -> Result<()> {
    if is_editor_in_chief(actor, config) {
        Ok(())
    } else {
        Err(QuillflowError::invalid(format!(
            "{} {} is not allowed to post a {what}",
            actor.role, actor.id
        )))
    }
}

fn require_handling_editor(paper: &Paper, actor: &Actor, config: &VenueConfig, what: &str) -> Result<()> {
    if is_assigned_editor(paper, actor) || is_editor_in_chief(actor, config) {
        Ok(())
    } else {
        Err(QuillflowError::invalid(format!(
            "{} {} is not the action editor of paper {}, cannot post a {what}",
            actor.role, actor.id, paper.number
        )))
    }
}

fn require_author(paper: &Paper, actor: &Actor, what: &str) -> Result<()> {
    if actor.role == Role::Venue || (actor.role == Role::Author && paper.is_author(&actor.id)) {
        Ok(())
    } else {
        Err(QuillflowError::invalid(format!(
            "only authors of paper {} can post a {what}",
            paper.number
        )))
    }
}

fn require_state(paper: &Paper, allowed: &[PaperState], what: &str) -> Result<()> {
    if allowed.contains(&paper.state) {
        Ok(())
    } else {
        Err(QuillflowError::invalid(format!(
            "cannot post a {what} while paper {} is {}",
            paper.number, paper.state
        )))
    }
}

fn string_list(content: &Content, name: &str) -> Vec<String> {
    content
        .get(name)
        .and_then(|f| f.value.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

fn validate_content(content: &Content) -> Result<()> {
    let title = content
        .get("title")
        .and_then(|f| f.value.as_str())
        .unwrap_or("");
    if title.trim().is_empty() {
        return Err(QuillflowError::invalid("submission must have a title"));
    }
    if string_list(content, "authors").is_empty() {
        return Err(QuillflowError::invalid("submission must list its authors"));
    }
    if string_list(content, "authorids").is_empty() {
        return Err(QuillflowError::invalid("submission must list its author ids"));
    }
    Ok(())
}

fn merge_content(paper: &mut Paper, update: &Content) {
    for (name, field) in update {
        if name.starts_with('_') {
            continue;
        }
        paper.content.insert(
            name.clone(),
            FieldValue {
                value: field.value.clone(),
                readers: None,
            },
        );
    }
}

/// Readers, writers and citation follow the state.
fn finalize(paper: &mut Paper, config: &VenueConfig) {
    visibility::refresh(paper, &GroupIds::new(&config.venue_id));
    let bibtex = citation(paper, config);
    paper
        .content
        .insert(CITATION_FIELD.to_string(), FieldValue::public(json!(bibtex)));
}

/// Create a paper from its first submission.
pub fn submit(
    id: PaperId,
    number: u32,
    content: Content,
    actor: &Actor,
    at: DateTime<Utc>,
    config: &VenueConfig,
) -> Result<Paper> {
    validate_content(&content)?;
    let authorids = string_list(&content, "authorids");
    match actor.role {
        Role::Author if authorids.contains(&actor.id) => {}
        Role::Venue => {}
        _ => {
            return Err(QuillflowError::invalid(format!(
                "{} must be listed among the authors to submit",
                actor.id
            )));
        }
    }

    let mut paper = Paper {
        id,
        number,
        state: PaperState::Submitted,
        content: Content::new(),
        assigned_action_editor: None,
        pending: None,
        certifications: Vec::new(),
        camera_ready: CameraReady::default(),
        authors_revealed: false,
        readers: Readers::new(),
        writers: Readers::new(),
        cdate: at,
        mdate: at,
        state_changed_at: at,
        version: 0,
    };
    merge_content(&mut paper, &content);
    finalize(&mut paper, config);
    Ok(paper)
}

/// Validate and execute a transition. On error nothing changed.
pub fn apply(
    paper: &Paper,
    transition: &Transition,
    actor: &Actor,
    at: DateTime<Utc>,
    config: &VenueConfig,
) -> Result<Outcome> {
    let what = transition.name();
    let mut next = paper.clone();

    match transition {
        Transition::Submit { .. } => {
            return Err(QuillflowError::invalid(format!(
                "paper {} has already been submitted",
                paper.number
            )));
        }

        Transition::Revise { content } => {
            require_author(paper, actor, what)?;
            if !matches!(paper.state, PaperState::Submitted | PaperState::UnderReview) {
                return Err(QuillflowError::PaperNotEditable(format!(
                    "paper {} is {}",
                    paper.number, paper.state
                )));
            }
            merge_content(&mut next, content);
            validate_content(&next.content)?;
        }

        Transition::ReviewApproval { verdict } => {
            require_handling_editor(paper, actor, config, what)?;
            require_state(paper, &[PaperState::Submitted], what)?;
            if paper.pending.is_some() {
                return Err(QuillflowError::invalid(REPLY_CAP));
            }
            match verdict {
                ReviewVerdict::AppropriateForReview => next.state = PaperState::UnderReview,
                ReviewVerdict::DeskReject { .. } if is_editor_in_chief(actor, config) => {
                    next.state = PaperState::DeskRejected;
                }
                ReviewVerdict::DeskReject { comment } => {
                    next.pending = Some(PendingApproval {
                        kind: PendingKind::DeskRejection {
                            comment: comment.clone(),
                        },
                        requested_by: actor.id.clone(),
                        requested_at: at,
                    });
                }
            }
        }

        Transition::DeskRejectionApproval { approve } => {
            require_editor_in_chief(actor, config, what)?;
            require_state(paper, &[PaperState::Submitted], what)?;
            if !matches!(
                paper.pending.as_ref().map(|p| &p.kind),
                Some(PendingKind::DeskRejection { .. })
            ) {
                return Err(QuillflowError::invalid(format!(
                    "paper {} has no desk rejection awaiting approval",
                    paper.number
                )));
            }
            next.pending = None;
            if *approve {
                next.state = PaperState::DeskRejected;
            }
        }

        Transition::Decide { decision } => {
            if !is_assigned_editor(paper, actor) {
                return Err(QuillflowError::invalid(format!(
                    "only the action editor of paper {} can post a decision",
                    paper.number
                )));
            }
            if paper.state == PaperState::DecisionPending {
                return Err(QuillflowError::invalid(REPLY_CAP));
            }
            require_state(paper, &[PaperState::UnderReview], what)?;
            validate_decision(decision, config)?;
            next.state = PaperState::DecisionPending;
            next.pending = Some(PendingApproval {
                kind: PendingKind::Decision(decision.clone()),
                requested_by: actor.id.clone(),
                requested_at: at,
            });
        }

        Transition::DecisionApproval {
            approve,
            certifications,
        } => {
            require_editor_in_chief(actor, config, what)?;
            require_state(paper, &[PaperState::DecisionPending], what)?;
            let decision = match paper.pending.as_ref().map(|p| &p.kind) {
                Some(PendingKind::Decision(d)) => d.clone(),
                _ => {
                    return Err(QuillflowError::invalid(format!(
                        "paper {} has no decision awaiting approval",
                        paper.number
                    )));
                }
            };
            next.pending = None;
            if !*approve {
                next.state = PaperState::UnderReview;
            } else if decision.recommendation.is_accept() {
                let certs = certifications.clone().unwrap_or(decision.certifications);
                check_certifications(&certs, config)?;
                next.certifications = certs;
                next.state = PaperState::Accepted;
            } else {
                if certifications.as_ref().is_some_and(|c| !c.is_empty()) {
                    return Err(QuillflowError::invalid(
                        "Reject decision cannot have certifications",
                    ));
                }
                next.state = PaperState::Rejected;
            }
        }

        Transition::Withdraw => {
            require_author(paper, actor, what)?;
            require_state(
                paper,
                &[
                    PaperState::Submitted,
                    PaperState::UnderReview,
                    PaperState::DecisionPending,
                ],
                what,
            )?;
            next.pending = None;
            next.state = PaperState::Withdrawn;
        }

        Transition::RequestRetraction { reason } => {
            require_author(paper, actor, what)?;
            require_state(paper, &[PaperState::Accepted], what)?;
            if paper.pending.is_some() {
                return Err(QuillflowError::invalid(REPLY_CAP));
            }
            next.pending = Some(PendingApproval {
                kind: PendingKind::Retraction {
                    reason: reason.clone(),
                },
                requested_by: actor.id.clone(),
                requested_at: at,
            });
        }

        Transition::RetractionApproval { approve } => {
            require_editor_in_chief(actor, config, what)?;
            require_state(paper, &[PaperState::Accepted], what)?;
            if !matches!(
                paper.pending.as_ref().map(|p| &p.kind),
                Some(PendingKind::Retraction { .. })
            ) {
                return Err(QuillflowError::invalid(format!(
                    "paper {} has no retraction awaiting approval",
                    paper.number
                )));
            }
            next.pending = None;
            if *approve {
                next.state = PaperState::Retracted;
            }
        }

        Transition::CameraReady { content } => {
            require_author(paper, actor, what)?;
            require_state(paper, &[PaperState::Accepted], what)?;
            merge_content(&mut next, content);
            validate_content(&next.content)?;
            next.camera_ready = CameraReady {
                submitted_at: Some(at),
                verified_at: None,
            };
        }

        Transition::VerifyCameraReady => {
            require_handling_editor(paper, actor, config, what)?;
            require_state(paper, &[PaperState::Accepted], what)?;
            if paper.camera_ready.submitted_at.is_none() {
                return Err(QuillflowError::invalid(format!(
                    "paper {} has no camera ready revision to verify",
                    paper.number
                )));
            }
            if paper.camera_ready.verified_at.is_some() {
                return Err(QuillflowError::invalid(REPLY_CAP));
            }
            next.camera_ready.verified_at = Some(at);
        }

        Transition::Deanonymize => {
            require_author(paper, actor, what)?;
            require_state(paper, &[PaperState::Rejected], what)?;
            if paper.authors_revealed {
                return Err(QuillflowError::invalid(REPLY_CAP));
            }
            next.authors_revealed = true;
        }
    }

    if next.state == PaperState::Accepted {
        next.authors_revealed = true;
    }
    next.mdate = at;
    if next.state != paper.state {
        next.state_changed_at = at;
    }
    finalize(&mut next, config);

    Ok(Outcome {
        paper: next,
        previous: paper.state,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use quillflow_core::groups::EVERYONE;
    use quillflow_core::model::{Recommendation, YesNo};

    fn config() -> VenueConfig {
        VenueConfig {
            editors_in_chief: vec!["~Eve_Chief1".into()],
            ..VenueConfig::default()
        }
    }

    fn content() -> Content {
        let mut c = Content::new();
        c.insert("title".into(), FieldValue::public(json!("Sparse Attention")));
        c.insert("authors".into(), FieldValue::public(json!(["Ada Author"])));
        c.insert("authorids".into(), FieldValue::public(json!(["~Ada_Author1"])));
        c
    }

    fn submitted() -> Paper {
        let mut p = submit(
            PaperId::from("p1"),
            1,
            content(),
            &Actor::author("~Ada_Author1"),
            Utc::now(),
            &config(),
        )
        .unwrap();
        p.assigned_action_editor = Some("~Alan_Editor1".into());
        p
    }

    fn under_review() -> Paper {
        apply(
            &submitted(),
            &Transition::ReviewApproval {
                verdict: ReviewVerdict::AppropriateForReview,
            },
            &Actor::action_editor("~Alan_Editor1"),
            Utc::now(),
            &config(),
        )
        .unwrap()
        .paper
    }

    fn accept_decision() -> Decision {
        Decision {
            claims_and_evidence: YesNo::Yes,
            audience: YesNo::Yes,
            recommendation: Recommendation::AcceptAsIs,
            certifications: vec!["Featured Certification".into()],
            comment: "Solid work".into(),
        }
    }

    #[test]
    fn test_submit_requires_listed_author() {
        let err = submit(
            PaperId::from("p1"),
            1,
            content(),
            &Actor::author("~Mallory1"),
            Utc::now(),
            &config(),
        )
        .unwrap_err();
        assert!(matches!(err, QuillflowError::InvalidTransition(_)));

        let p = submitted();
        assert_eq!(p.state, PaperState::Submitted);
        assert!(!p.readers.contains(EVERYONE));
        assert!(p.field(CITATION_FIELD).is_some());
    }

    #[test]
    fn test_appropriate_for_review_opens_paper() {
        let out = apply(
            &submitted(),
            &Transition::ReviewApproval {
                verdict: ReviewVerdict::AppropriateForReview,
            },
            &Actor::action_editor("~Alan_Editor1"),
            Utc::now(),
            &config(),
        )
        .unwrap();
        assert_eq!(out.paper.state, PaperState::UnderReview);
        assert!(out.state_changed());
        assert!(out.readers().contains(EVERYONE));
    }

    #[test]
    fn test_unassigned_editor_is_rejected() {
        let before = submitted();
        let err = apply(
            &before,
            &Transition::ReviewApproval {
                verdict: ReviewVerdict::AppropriateForReview,
            },
            &Actor::action_editor("~Other_Editor1"),
            Utc::now(),
            &config(),
        )
        .unwrap_err();
        assert!(err.is_rejection());
        assert_eq!(before.state, PaperState::Submitted);
    }

    #[test]
    fn test_desk_rejection_needs_approval() {
        let cfg = config();
        let eic = Actor::editor_in_chief("~Eve_Chief1");
        let pending = apply(
            &submitted(),
            &Transition::ReviewApproval {
                verdict: ReviewVerdict::DeskReject {
                    comment: "Out of scope".into(),
                },
            },
            &Actor::action_editor("~Alan_Editor1"),
            Utc::now(),
            &cfg,
        )
        .unwrap()
        .paper;
        assert_eq!(pending.state, PaperState::Submitted);
        assert!(pending.pending.is_some());

        let declined = apply(&pending, &Transition::DeskRejectionApproval { approve: false }, &eic, Utc::now(), &cfg)
            .unwrap();
        assert_eq!(declined.paper.state, PaperState::Submitted);
        assert!(declined.paper.pending.is_none());

        let approved = apply(&pending, &Transition::DeskRejectionApproval { approve: true }, &eic, Utc::now(), &cfg)
            .unwrap();
        assert_eq!(approved.paper.state, PaperState::DeskRejected);
        assert!(approved.left_active_pool());
        assert!(!approved.paper.readers.contains(EVERYONE));
    }

    #[test]
    fn test_second_decision_hits_reply_cap() {
        let cfg = config();
        let ae = Actor::action_editor("~Alan_Editor1");
        let decided = apply(
            &under_review(),
            &Transition::Decide {
                decision: accept_decision(),
            },
            &ae,
            Utc::now(),
            &cfg,
        )
        .unwrap()
        .paper;
        assert_eq!(decided.state, PaperState::DecisionPending);

        let err = apply(
            &decided,
            &Transition::Decide {
                decision: accept_decision(),
            },
            &ae,
            Utc::now(),
            &cfg,
        )
        .unwrap_err();
        assert!(err.to_string().contains("maximum number (1) of replies"));
    }

    #[test]
    fn test_decision_approval_accepts_and_reveals() {
        let cfg = config();
        let decided = apply(
            &under_review(),
            &Transition::Decide {
                decision: accept_decision(),
            },
            &Actor::action_editor("~Alan_Editor1"),
            Utc::now(),
            &cfg,
        )
        .unwrap()
        .paper;
        let out = apply(
            &decided,
            &Transition::DecisionApproval {
                approve: true,
                certifications: None,
            },
            &Actor::editor_in_chief("~Eve_Chief1"),
            Utc::now(),
            &cfg,
        )
        .unwrap();
        assert_eq!(out.paper.state, PaperState::Accepted);
        assert_eq!(out.paper.certifications, vec!["Featured Certification".to_string()]);
        assert!(out.paper.authors_revealed);
        let bib = out.paper.field(CITATION_FIELD).and_then(Value::as_str).unwrap();
        assert!(bib.contains("Ada Author"));
    }

    #[test]
    fn test_declined_decision_returns_to_review() {
        let cfg = config();
        let decided = apply(
            &under_review(),
            &Transition::Decide {
                decision: accept_decision(),
            },
            &Actor::action_editor("~Alan_Editor1"),
            Utc::now(),
            &cfg,
        )
        .unwrap()
        .paper;
        let out = apply(
            &decided,
            &Transition::DecisionApproval {
                approve: false,
                certifications: None,
            },
            &Actor::editor_in_chief("~Eve_Chief1"),
            Utc::now(),
            &cfg,
        )
        .unwrap();
        assert_eq!(out.paper.state, PaperState::UnderReview);
        assert!(out.paper.pending.is_none());
    }

    #[test]
    fn test_non_chief_cannot_approve() {
        let cfg = config();
        let decided = apply(
            &under_review(),
            &Transition::Decide {
                decision: accept_decision(),
            },
            &Actor::action_editor("~Alan_Editor1"),
            Utc::now(),
            &cfg,
        )
        .unwrap()
        .paper;
        let err = apply(
            &decided,
            &Transition::DecisionApproval {
                approve: true,
                certifications: None,
            },
            &Actor::editor_in_chief("~Not_A_Chief1"),
            Utc::now(),
            &cfg,
        )
        .unwrap_err();
        assert!(matches!(err, QuillflowError::InvalidTransition(_)));
    }

    #[test]
    fn test_withdraw_only_by_author_and_only_while_active() {
        let cfg = config();
        let p = under_review();
        assert!(apply(&p, &Transition::Withdraw, &Actor::reviewer("~Rita1"), Utc::now(), &cfg).is_err());
        let out = apply(&p, &Transition::Withdraw, &Actor::author("~Ada_Author1"), Utc::now(), &cfg).unwrap();
        assert_eq!(out.paper.state, PaperState::Withdrawn);
        assert!(out.left_active_pool());
        assert!(
            apply(&out.paper, &Transition::Withdraw, &Actor::author("~Ada_Author1"), Utc::now(), &cfg).is_err()
        );
    }

    #[test]
    fn test_revision_blocked_after_terminal_state() {
        let cfg = config();
        let author = Actor::author("~Ada_Author1");
        let mut update = Content::new();
        update.insert("abstract".into(), FieldValue::public(json!("Shorter")));
        let revised = apply(
            &under_review(),
            &Transition::Revise {
                content: update.clone(),
            },
            &author,
            Utc::now(),
            &cfg,
        )
        .unwrap();
        assert_eq!(revised.paper.field("abstract"), Some(&json!("Shorter")));
        assert!(!revised.state_changed());

        let withdrawn = apply(&revised.paper, &Transition::Withdraw, &author, Utc::now(), &cfg)
            .unwrap()
            .paper;
        let err = apply(&withdrawn, &Transition::Revise { content: update }, &author, Utc::now(), &cfg)
            .unwrap_err();
        assert!(matches!(err, QuillflowError::PaperNotEditable(_)));
    }

    #[test]
    fn test_transition_payload_is_tagged() {
        let t = Transition::DecisionApproval {
            approve: true,
            certifications: None,
        };
        let v = t.to_payload();
        assert_eq!(v["transition"], "decision_approval");
        let back: Transition = serde_json::from_value(v).unwrap();
        assert_eq!(back, t);
    }
}
