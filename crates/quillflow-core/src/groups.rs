//! Group id naming for a venue.

/// The public reader.
pub const EVERYONE: &str = "everyone";

/// Builds the group ids used in reader lists and recipient sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupIds {
    venue: String,
}

impl GroupIds {
    pub fn new(venue_id: impl Into<String>) -> Self {
        Self {
            venue: venue_id.into(),
        }
    }

    pub fn venue(&self) -> String {
        self.venue.clone()
    }

    pub fn editors_in_chief(&self) -> String {
        format!("{}/Editors_In_Chief", self.venue)
    }

    pub fn paper(&self, number: u32) -> String {
        format!("{}/Paper{number}", self.venue)
    }

    pub fn authors(&self, number: u32) -> String {
        format!("{}/Authors", self.paper(number))
    }

    pub fn action_editors(&self, number: u32) -> String {
        format!("{}/Action_Editors", self.paper(number))
    }

    pub fn reviewers(&self, number: u32) -> String {
        format!("{}/Reviewers", self.paper(number))
    }

    /// Reviewers of the paper who have submitted a review.
    pub fn reviewers_submitted(&self, number: u32) -> String {
        format!("{}/Submitted", self.reviewers(number))
    }

    pub fn anonymous_reviewer(&self, number: u32, suffix: &str) -> String {
        format!("{}/Reviewer_{suffix}", self.paper(number))
    }

    pub fn anonymous_action_editor(&self, number: u32, suffix: &str) -> String {
        format!("{}/Action_Editor_{suffix}", self.paper(number))
    }
}
