//! Notification policy: workflow events in, rendered messages out.
//!
//! `events_to_messages` is pure. It reads the event and the configuration
//! and never touches the store, so the same event always yields the same
//! messages (modulo generated message ids).

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use quillflow_core::config::{EscalationAudience, PeriodsConfig, VenueConfig};
use quillflow_core::groups::GroupIds;
use quillflow_core::message::Message;
use quillflow_core::model::{AssignmentRole, InviteLabel, TaskKind};
use quillflow_core::types::{PaperId, PaperState, Role};

use crate::escalation::ReminderKey;
use crate::events::{ApprovalSubject, EventKind, WorkflowEvent};
use crate::templates::{self, Params, Template};

/// Read-only inputs of the policy besides the event itself.
#[derive(Debug, Clone)]
pub struct PolicyContext<'a> {
    pub config: &'a VenueConfig,
    pub ids: GroupIds,
    /// Reply-to address for messages sent on behalf of the action editor.
    pub action_editor_email: Option<String>,
}

impl<'a> PolicyContext<'a> {
    pub fn new(config: &'a VenueConfig) -> Self {
        Self {
            config,
            ids: GroupIds::new(&config.venue_id),
            action_editor_email: None,
        }
    }

    pub fn with_action_editor_email(mut self, email: Option<String>) -> Self {
        self.action_editor_email = email;
        self
    }
}

/// Key of the "assignment pending" notice sent to an invitee without a profile.
pub fn pending_sign_up_key(paper_id: &PaperId, invitee: &str) -> String {
    format!("invite_pending:{paper_id}:{invitee}")
}

/// `~Rita_Reviewer1` → `Rita Reviewer`. Emails pass through.
pub fn display_name(id: &str) -> String {
    match id.strip_prefix('~') {
        Some(rest) => rest
            .trim_end_matches(|c: char| c.is_ascii_digit())
            .replace('_', " "),
        None => id.to_string(),
    }
}

fn fmt_date(at: DateTime<Utc>) -> String {
    at.format("%b %d %Y").to_string()
}

fn names(ids: &[String]) -> String {
    ids.iter().map(|id| display_name(id)).collect::<Vec<_>>().join(", ")
}

fn audience_slug(audience: EscalationAudience) -> &'static str {
    match audience {
        EscalationAudience::Assignee => "assignee",
        EscalationAudience::NextRoleUp => "next_role_up",
        EscalationAudience::TopRole => "top_role",
    }
}

pub fn events_to_messages(event: &WorkflowEvent, ctx: &PolicyContext<'_>) -> Vec<Message> {
    let mut c = Composer {
        ctx,
        event,
        out: Vec::new(),
    };
    c.compose();
    c.out
}

struct Composer<'a> {
    ctx: &'a PolicyContext<'a>,
    event: &'a WorkflowEvent,
    out: Vec<Message>,
}

impl Composer<'_> {
    fn periods(&self) -> &PeriodsConfig {
        &self.ctx.config.periods
    }

    fn due_in(&self, days: i64) -> String {
        fmt_date(self.event.at + PeriodsConfig::days(days))
    }

    fn key(&self, suffix: impl std::fmt::Display) -> String {
        format!("{}:{}:{suffix}", self.event.name(), self.event.paper.id)
    }

    fn chiefs(&self) -> Vec<String> {
        if self.ctx.config.editors_in_chief.is_empty() {
            vec![self.ctx.ids.editors_in_chief()]
        } else {
            self.ctx.config.editors_in_chief.clone()
        }
    }

    fn authors(&self) -> Vec<String> {
        self.event.paper.author_ids()
    }

    fn action_editor(&self) -> Vec<String> {
        self.event.paper.assigned_action_editor.iter().cloned().collect()
    }

    fn editor_or_chiefs(&self) -> Vec<String> {
        match &self.event.paper.assigned_action_editor {
            Some(ae) => vec![ae.clone()],
            None => self.chiefs(),
        }
    }

    /// Action editor and reviewers, the people who handled the paper.
    fn editorial(&self) -> Vec<String> {
        let mut out = self.action_editor();
        out.extend(self.event.reviewers.iter().cloned());
        out
    }

    /// Task assignees may be group ids; resolve the ones we can.
    fn expand(&self, assignee: &str) -> Vec<String> {
        let ids = &self.ctx.ids;
        if assignee == ids.editors_in_chief() {
            self.chiefs()
        } else if assignee == ids.authors(self.event.paper.number) {
            self.authors()
        } else {
            vec![assignee.to_string()]
        }
    }

    fn signature(&self) -> String {
        let actor = &self.event.actor;
        match actor.role {
            Role::ActionEditor => format!("{}\nAction Editor, {}", display_name(&actor.id), self.ctx.config.short_name),
            _ => format!("The {} Editors-in-Chief", self.ctx.config.short_name),
        }
    }

    fn params(&self, name: String) -> Params {
        let paper = &self.event.paper;
        let mut p = Params::new();
        p.insert("venue", self.ctx.config.short_name.clone());
        p.insert("title", paper.title().to_string());
        p.insert("number", paper.number.to_string());
        p.insert("name", name);
        p
    }

    fn author_params(&self) -> Params {
        let paper = &self.event.paper;
        let listed = paper.author_names();
        let name = if listed.is_empty() {
            names(&paper.author_ids())
        } else {
            listed.join(", ")
        };
        self.params(name)
    }

    fn build(&self, key: String, recipients: Vec<String>, template: &Template, params: &Params) -> Option<Message> {
        if recipients.is_empty() {
            return None;
        }
        let (subject, body) = template.render(params);
        let mut message = Message::new(key, recipients, subject, body)
            .for_paper(&self.event.paper.id)
            .at(self.event.at);
        if self.event.actor.role == Role::ActionEditor {
            if let Some(email) = &self.ctx.action_editor_email {
                message = message.reply_to(email.clone());
            }
        }
        Some(message)
    }

    fn push(&mut self, key: String, recipients: Vec<String>, template: &Template, params: &Params) {
        if let Some(m) = self.build(key, recipients, template, params) {
            self.out.push(m);
        }
    }

    /// Send `template` to `recipients`, naming them in the greeting.
    fn notify(&mut self, suffix: &str, recipients: Vec<String>, template: &Template, extra: &[(&'static str, String)]) {
        let mut p = self.params(names(&recipients));
        p.extend(extra.iter().cloned());
        let key = self.key(suffix);
        self.push(key, recipients, template, &p);
    }

    fn notify_authors(&mut self, suffix: &str, template: &Template, extra: &[(&'static str, String)]) {
        let mut p = self.author_params();
        p.extend(extra.iter().cloned());
        let key = self.key(suffix);
        self.push(key, self.authors(), template, &p);
    }

    fn compose(&mut self) {
        let event = self.event;
        let paper = &event.paper;
        let at = event.at.timestamp();
        match &event.kind {
            EventKind::Submitted => {
                self.notify_authors("authors", &templates::SUBMITTED_AUTHORS, &[]);
                let due = self.due_in(self.periods().ae_assignment);
                self.notify("chiefs", self.chiefs(), &templates::SUBMITTED_CHIEFS, &[("due", due)]);
            }
            EventKind::Revised => {
                let suffix = paper.mdate.timestamp().to_string();
                self.notify(&suffix, self.action_editor(), &templates::REVISED, &[]);
            }
            EventKind::StateChanged { previous } => self.state_changed(*previous),
            EventKind::ApprovalRequested { subject } => {
                let days = match subject {
                    ApprovalSubject::DeskRejection => self.periods().desk_rejection_approval,
                    ApprovalSubject::Decision => self.periods().decision_approval,
                    ApprovalSubject::Retraction => self.periods().retraction_approval,
                };
                let extra = [("what", subject.label().to_string()), ("due", self.due_in(days))];
                self.notify(&at.to_string(), self.chiefs(), &templates::APPROVAL_REQUESTED, &extra);
            }
            EventKind::ApprovalDeclined { subject, requested_by } => {
                let extra = [("what", subject.label().to_string())];
                self.notify(&at.to_string(), vec![requested_by.clone()], &templates::APPROVAL_DECLINED, &extra);
            }
            EventKind::CameraReadySubmitted => {
                let due = self.due_in(self.periods().camera_ready_verification);
                self.notify("editor", self.editor_or_chiefs(), &templates::CAMERA_READY_SUBMITTED, &[("due", due)]);
            }
            EventKind::CameraReadyVerified => {
                self.notify_authors("authors", &templates::CAMERA_READY_VERIFIED, &[]);
            }
            EventKind::Assigned { role, person, anon_id } => {
                let suffix = format!("{}:{person}:{at}", role.role());
                match role {
                    AssignmentRole::Reviewer => {
                        let review = self.periods().review;
                        let extra = [
                            ("review_weeks", (review / 7).max(1).to_string()),
                            ("due", self.due_in(review)),
                            ("ack_due", self.due_in(self.periods().assignment_acknowledgement)),
                            ("anon", anon_id.clone()),
                            ("signature", self.signature()),
                        ];
                        self.notify(&suffix, vec![person.clone()], &templates::REVIEWER_ASSIGNED, &extra);
                    }
                    AssignmentRole::ActionEditor => {
                        let due = self.due_in(self.periods().review_approval);
                        self.notify(&suffix, vec![person.clone()], &templates::EDITOR_ASSIGNED, &[("due", due)]);
                    }
                }
            }
            EventKind::Unassigned { role, person, .. } => {
                let extra = [("role", role.to_string().to_lowercase())];
                let suffix = format!("{person}:{at}");
                self.notify(&suffix, vec![person.clone()], &templates::UNASSIGNED, &extra);
            }
            EventKind::Invited { invitee, .. } => {
                let mut p = self.params(String::new());
                p.insert("signature", self.signature());
                let key = self.key(invitee);
                self.push(key, vec![invitee.clone()], &templates::INVITED, &p);
            }
            EventKind::InvitationAnswered { invitee, label } => {
                let extra = [
                    ("invitee", display_name(invitee)),
                    ("label", label.to_string().to_lowercase()),
                ];
                self.notify(invitee, self.editor_or_chiefs(), &templates::INVITATION_ANSWERED, &extra);
                if *label == InviteLabel::PendingSignUp {
                    let p = self.params(String::new());
                    let key = pending_sign_up_key(&paper.id, invitee);
                    self.push(key, vec![invitee.clone()], &templates::PENDING_SIGN_UP, &p);
                }
            }
            EventKind::SignUpCompleted { invitee, person } => {
                let p = self.params(display_name(person));
                let key = self.key(person);
                if let Some(m) = self.build(key, vec![person.clone()], &templates::SIGN_UP_CONFIRMED, &p) {
                    self.out.push(m.superseding(pending_sign_up_key(&paper.id, invitee)));
                }
            }
            EventKind::SignUpBlocked { invitee, person, reason } => {
                let extra = [
                    ("invitee", display_name(invitee)),
                    ("person", display_name(person)),
                    ("reason", reason.clone()),
                ];
                self.notify(invitee, self.editor_or_chiefs(), &templates::SIGN_UP_BLOCKED, &extra);
            }
            EventKind::SolicitationPosted { person } => {
                let extra = [
                    ("person", display_name(person)),
                    ("due", self.due_in(self.periods().solicitation_response)),
                ];
                self.notify(person, self.editor_or_chiefs(), &templates::SOLICITATION_POSTED, &extra);
            }
            EventKind::SolicitationAnswered { person, approved } => {
                let outcome = if *approved { "approved" } else { "declined" };
                self.notify(person, vec![person.clone()], &templates::SOLICITATION_ANSWERED, &[("outcome", outcome.into())]);
            }
            EventKind::ReviewSubmitted { reviewer, count } => {
                let extra = [
                    ("count", count.to_string()),
                    ("needed", self.ctx.config.reviewing.number_of_reviewers.to_string()),
                ];
                self.notify(reviewer, self.editor_or_chiefs(), &templates::REVIEW_SUBMITTED, &extra);
            }
            EventKind::DiscussionStarted {
                recommendation_opens,
                recommendation_due,
            } => {
                let count = ("count", self.ctx.config.reviewing.review_publication_threshold.to_string());
                self.notify_authors("authors", &templates::DISCUSSION_AUTHORS, &[count.clone()]);
                let extra = [
                    count.clone(),
                    ("opens", fmt_date(*recommendation_opens)),
                    ("due", fmt_date(*recommendation_due)),
                ];
                self.notify("reviewers", event.reviewers.clone(), &templates::DISCUSSION_REVIEWERS, &extra);
                self.notify("editor", self.editor_or_chiefs(), &templates::DISCUSSION_EDITOR, &[count]);
            }
            EventKind::AllRecommendationsIn { decision_due } => {
                let suffix = decision_due.timestamp().to_string();
                let extra = [("due", fmt_date(*decision_due))];
                self.notify(&suffix, self.editor_or_chiefs(), &templates::ALL_RECOMMENDATIONS_IN, &extra);
            }
            EventKind::TooManyReviewers { missing } => {
                let extra = [
                    ("needed", self.ctx.config.reviewing.number_of_reviewers.to_string()),
                    ("missing", names(missing)),
                ];
                let suffix = missing.join(",");
                self.notify(&suffix, self.editor_or_chiefs(), &templates::TOO_MANY_REVIEWERS, &extra);
            }
            EventKind::TaskScheduled {
                task,
                cdate,
                duedate,
                status_changed,
            } => {
                if *status_changed && *task == TaskKind::OfficialRecommendation {
                    let suffix = format!("{}:{}", task.slug(), cdate.timestamp());
                    let extra = [("due", fmt_date(*duedate))];
                    self.notify(&suffix, event.reviewers.clone(), &templates::RECOMMENDATION_OPEN, &extra);
                }
            }
            EventKind::TaskLate {
                task,
                threshold,
                wording,
                audiences,
                ..
            } => {
                let role = task.target_role();
                let base = ReminderKey::new(task, *threshold).encode();
                let mut reached = BTreeSet::new();
                for audience in audiences {
                    let (mut recipients, template) = match audience {
                        EscalationAudience::Assignee => (self.expand(&task.assignee), &templates::LATE_ASSIGNEE),
                        EscalationAudience::NextRoleUp => match role.next_up() {
                            Some(Role::ActionEditor) => (self.editor_or_chiefs(), &templates::LATE_ESCALATION),
                            Some(Role::EditorInChief) => (self.chiefs(), &templates::LATE_ESCALATION),
                            _ => continue,
                        },
                        EscalationAudience::TopRole => (self.chiefs(), &templates::LATE_ESCALATION),
                    };
                    recipients.retain(|r| reached.insert(r.clone()));
                    let mut p = self.params(names(&recipients));
                    p.insert("task", task.kind.to_string());
                    p.insert("due", fmt_date(task.due));
                    p.insert("wording", wording.clone());
                    p.insert("role", role.to_string());
                    let key = format!("{base}:{}", audience_slug(*audience));
                    self.push(key, recipients, template, &p);
                }
            }
            EventKind::Acknowledged { .. }
            | EventKind::ReviewsReleased { .. }
            | EventKind::RecommendationSubmitted { .. }
            | EventKind::TasksExpired { .. } => {}
        }
    }

    fn state_changed(&mut self, previous: PaperState) {
        let event = self.event;
        let paper = &event.paper;
        let state = ("state", paper.state.to_string());
        match paper.state {
            PaperState::UnderReview if previous == PaperState::Submitted => {
                self.notify_authors("authors", &templates::UNDER_REVIEW, &[]);
            }
            PaperState::DeskRejected => {
                self.notify_authors("authors", &templates::DESK_REJECTED, &[]);
                self.notify("editorial", self.action_editor(), &templates::DECIDED_EDITORIAL, &[state]);
            }
            PaperState::Accepted => {
                let certifications = if paper.certifications.is_empty() {
                    String::new()
                } else {
                    format!(" with {}", paper.certifications.join(", "))
                };
                let extra = [
                    ("certifications", certifications),
                    ("due", self.due_in(self.periods().camera_ready)),
                ];
                self.notify_authors("authors", &templates::ACCEPTED, &extra);
                self.notify("editorial", self.editorial(), &templates::DECIDED_EDITORIAL, &[state]);
            }
            PaperState::Rejected => {
                self.notify_authors("authors", &templates::REJECTED, &[]);
                self.notify("editorial", self.editorial(), &templates::DECIDED_EDITORIAL, &[state]);
            }
            PaperState::Withdrawn => {
                let mut recipients = self.editorial();
                recipients.extend(self.chiefs());
                self.notify("editorial", recipients, &templates::WITHDRAWN, &[]);
            }
            PaperState::Retracted => {
                let mut recipients = self.authors();
                recipients.extend(self.action_editor());
                recipients.extend(self.chiefs());
                self.notify("all", recipients, &templates::RETRACTED, &[]);
            }
            _ => {}
        }
    }
}
