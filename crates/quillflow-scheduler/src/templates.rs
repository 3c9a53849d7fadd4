//! Message templates and `{{param}}` rendering.

use std::collections::BTreeMap;

pub type Params = BTreeMap<&'static str, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    pub subject: &'static str,
    pub body: &'static str,
}

impl Template {
    /// Render subject and body. Unknown placeholders are left in place.
    pub fn render(&self, params: &Params) -> (String, String) {
        (render(self.subject, params), render(self.body, params))
    }
}

pub fn render(template: &str, params: &Params) -> String {
    params
        .iter()
        .fold(template.to_string(), |acc, (name, value)| {
            acc.replace(&format!("{{{{{name}}}}}"), value)
        })
}

pub const SUBMITTED_AUTHORS: Template = Template {
    subject: "[{{venue}}] Suggest candidate Action Editor for your new {{venue}} submission",
    body: "Hi {{name}},\n\nThanks for submitting your work titled \"{{title}}\" to {{venue}}.\n\nYour submission is number {{number}}. The editors-in-chief will assign an action editor shortly.\n\nThe {{venue}} Editors-in-Chief",
};

pub const SUBMITTED_CHIEFS: Template = Template {
    subject: "[{{venue}}] New submission {{number}}: {{title}}",
    body: "A new submission was received: \"{{title}}\" (paper {{number}}). Please assign an action editor by {{due}}.",
};

pub const REVISED: Template = Template {
    subject: "[{{venue}}] Revision of submission {{number}}: {{title}}",
    body: "The authors of submission {{number}} posted a revised version.",
};

pub const UNDER_REVIEW: Template = Template {
    subject: "[{{venue}}] Your submission {{number}} is now under review",
    body: "Hi {{name}},\n\nYour submission \"{{title}}\" was found appropriate for review. Reviewers will now be assigned.\n\nThe {{venue}} Editors-in-Chief",
};

pub const DESK_REJECTED: Template = Template {
    subject: "[{{venue}}] Decision on submission {{number}}: {{title}}",
    body: "Hi {{name}},\n\nWe are sorry to inform you that your submission \"{{title}}\" was desk rejected.\n\nThe {{venue}} Editors-in-Chief",
};

pub const ACCEPTED: Template = Template {
    subject: "[{{venue}}] Decision for your {{venue}} submission {{number}}: {{title}}",
    body: "Hi {{name}},\n\nWe are happy to inform you that your submission \"{{title}}\" was accepted{{certifications}}.\n\nPlease submit a camera-ready revision by {{due}}.\n\nThe {{venue}} Editors-in-Chief",
};

pub const REJECTED: Template = Template {
    subject: "[{{venue}}] Decision for your {{venue}} submission {{number}}: {{title}}",
    body: "Hi {{name}},\n\nWe are sorry to inform you that your submission \"{{title}}\" was rejected.\n\nThe {{venue}} Editors-in-Chief",
};

pub const DECIDED_EDITORIAL: Template = Template {
    subject: "[{{venue}}] Decision on submission {{number}}: {{title}}",
    body: "The decision on submission {{number}} was approved: {{state}}. Thank you for your work on this paper.",
};

pub const WITHDRAWN: Template = Template {
    subject: "[{{venue}}] Submission {{number}} withdrawn",
    body: "The authors withdrew submission {{number}} (\"{{title}}\"). No further action is needed.",
};

pub const RETRACTED: Template = Template {
    subject: "[{{venue}}] Paper {{number}} retracted",
    body: "The retraction of paper {{number}} (\"{{title}}\") was approved.",
};

pub const APPROVAL_REQUESTED: Template = Template {
    subject: "[{{venue}}] Approve the {{what}} of submission {{number}}",
    body: "A {{what}} was requested for submission {{number}} (\"{{title}}\"). Please review it by {{due}}.",
};

pub const APPROVAL_DECLINED: Template = Template {
    subject: "[{{venue}}] The {{what}} of submission {{number}} was not approved",
    body: "The editors-in-chief did not approve the {{what}} requested for submission {{number}} (\"{{title}}\").",
};

pub const CAMERA_READY_SUBMITTED: Template = Template {
    subject: "[{{venue}}] Camera-ready revision of paper {{number}} to verify",
    body: "The authors of paper {{number}} posted their camera-ready revision. Please verify it by {{due}}.",
};

pub const CAMERA_READY_VERIFIED: Template = Template {
    subject: "[{{venue}}] Camera-ready revision of paper {{number}} verified",
    body: "Hi {{name}},\n\nThe camera-ready revision of \"{{title}}\" was verified. Your paper is ready for publication.",
};

pub const REVIEWER_ASSIGNED: Template = Template {
    subject: "[{{venue}}] Assignment to review new {{venue}} submission {{number}}: {{title}}",
    body: "Hi {{name}},\n\nWith this email, we request that you submit, within {{review_weeks}} weeks ({{due}}) a review for the submission \"{{title}}\".\n\nPlease acknowledge the assignment by {{ack_due}}. Your anonymous reviewer id is {{anon}}.\n\n{{signature}}",
};

pub const EDITOR_ASSIGNED: Template = Template {
    subject: "[{{venue}}] Assignment to new {{venue}} submission {{number}}: {{title}}",
    body: "Hi {{name}},\n\nYou were assigned as action editor of submission {{number}} (\"{{title}}\"). Please decide whether it is appropriate for review by {{due}}.\n\nThe {{venue}} Editors-in-Chief",
};

pub const UNASSIGNED: Template = Template {
    subject: "[{{venue}}] You were removed from submission {{number}}",
    body: "Hi {{name}},\n\nYou are no longer a {{role}} of submission {{number}} (\"{{title}}\"). No further action is needed.",
};

pub const INVITED: Template = Template {
    subject: "[{{venue}}] Invitation to review paper titled \"{{title}}\"",
    body: "Hi,\n\nYou were invited to review the paper \"{{title}}\" for {{venue}}. Please accept or decline the invitation.\n\n{{signature}}",
};

pub const INVITATION_ANSWERED: Template = Template {
    subject: "[{{venue}}] Reviewer {{invitee}} {{label}} to review submission {{number}}",
    body: "{{invitee}} answered the invitation to review submission {{number}} (\"{{title}}\"): {{label}}.",
};

pub const PENDING_SIGN_UP: Template = Template {
    subject: "[{{venue}}] Reviewer Invitation accepted for paper {{number}}, assignment pending",
    body: "Hi,\n\nThank you for accepting the invitation to review \"{{title}}\". The assignment will be made once you finish creating your profile.",
};

pub const SIGN_UP_CONFIRMED: Template = Template {
    subject: "[{{venue}}] Reviewer Assignment confirmed for paper {{number}}",
    body: "Hi {{name}},\n\nYour profile is active and you are now assigned to review \"{{title}}\".",
};

pub const SIGN_UP_BLOCKED: Template = Template {
    subject: "[{{venue}}] Invitation closed for {{invitee}} on submission {{number}}",
    body: "{{invitee}} accepted the invitation to review submission {{number}} (\"{{title}}\") and finished signing up as {{person}}, but could not be assigned: {{reason}}. The invitation has been closed.",
};

pub const SOLICITATION_POSTED: Template = Template {
    subject: "[{{venue}}] Request to review submission {{number}}",
    body: "{{person}} asked to review submission {{number}} (\"{{title}}\"). Please approve or decline by {{due}}.",
};

pub const SOLICITATION_ANSWERED: Template = Template {
    subject: "[{{venue}}] Your request to review submission {{number}} was {{outcome}}",
    body: "Hi {{name}},\n\nYour request to review \"{{title}}\" was {{outcome}} by the action editor.",
};

pub const REVIEW_SUBMITTED: Template = Template {
    subject: "[{{venue}}] Review posted on submission {{number}}: {{title}}",
    body: "A review was posted on submission {{number}}. {{count}} of {{needed}} reviews are in.",
};

pub const DISCUSSION_AUTHORS: Template = Template {
    subject: "[{{venue}}] Start of author discussion for {{venue}} submission {{number}}: {{title}}",
    body: "Hi {{name}},\n\nNow that {{count}} reviews have been submitted for your submission \"{{title}}\", all reviews have been made public. You may now discuss them with the reviewers.",
};

pub const DISCUSSION_REVIEWERS: Template = Template {
    subject: "[{{venue}}] Start of author discussion for {{venue}} submission {{number}}: {{title}}",
    body: "Now that {{count}} reviews have been submitted for submission \"{{title}}\", all reviews have been made public. Please read them and engage with the authors. Official recommendations open on {{opens}} and are due {{due}}.",
};

pub const DISCUSSION_EDITOR: Template = Template {
    subject: "[{{venue}}] Start of author discussion for {{venue}} submission {{number}}: {{title}}",
    body: "Now that {{count}} reviews have been submitted for submission \"{{title}}\", all reviews have been made public. Please read them and encourage the discussion with the authors.",
};

pub const RECOMMENDATION_OPEN: Template = Template {
    subject: "[{{venue}}] Submit official recommendation for {{venue}} submission {{number}}: {{title}}",
    body: "Hi {{name}},\n\nPlease submit your official recommendation for \"{{title}}\" by {{due}}.",
};

pub const ALL_RECOMMENDATIONS_IN: Template = Template {
    subject: "[{{venue}}] Evaluate reviewers and submit decision for {{venue}} submission {{number}}: {{title}}",
    body: "Hi {{name}},\n\nAll reviewers have submitted their official recommendation. Please submit your decision by {{due}}.",
};

pub const TOO_MANY_REVIEWERS: Template = Template {
    subject: "[{{venue}}] You have assigned more reviewers than required for submission {{number}}",
    body: "Hi {{name}},\n\nSubmission {{number}} (\"{{title}}\") has more than {{needed}} reviewers. Some reviewers did not submit an official recommendation: {{missing}}. Please unassign them or ask them to submit before the decision can be prompted.",
};

pub const LATE_ASSIGNEE: Template = Template {
    subject: "[{{venue}}] You are late in performing a task for submission {{number}}: {{title}}",
    body: "Hi {{name}},\n\nOur records show that you are late on the current {{task}} task, which was due on {{due}}. You are {{wording}} late.\n\nThe {{venue}} Editors-in-Chief",
};

pub const LATE_ESCALATION: Template = Template {
    subject: "[{{venue}}] {{role}} {{wording}} late in performing a task for submission {{number}}: {{title}}",
    body: "Hi,\n\nOur records show that the {{role}} of submission {{number}} is {{wording}} late on the {{task}} task, which was due on {{due}}. Please follow up.\n\nThe {{venue}} Editors-in-Chief",
};
