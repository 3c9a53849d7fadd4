//! Decision content rules.

use quillflow_core::config::VenueConfig;
use quillflow_core::error::{QuillflowError, Result};
use quillflow_core::model::{Decision, Recommendation, YesNo};

/// Check a decision against the venue's content rules:
///
/// - both criteria answered "Yes" must recommend an accept;
/// - any "No" must not recommend "Accept as is";
/// - a reject carries no certifications;
/// - certifications must be ones the venue offers.
pub fn validate_decision(decision: &Decision, config: &VenueConfig) -> Result<()> {
    let both_yes = decision.claims_and_evidence == YesNo::Yes && decision.audience == YesNo::Yes;

    if both_yes && !decision.recommendation.is_accept() {
        return Err(QuillflowError::invalid(
            "Decision should be \"Accept as is\" or \"Accept with minor revision\" if you answered \"Yes\" to both evaluation criteria",
        ));
    }
    if !both_yes && decision.recommendation == Recommendation::AcceptAsIs {
        return Err(QuillflowError::invalid(
            "Decision should be \"Reject\" or \"Accept with minor revision\" if you answered \"No\" to either of the evaluation criteria",
        ));
    }
    if decision.recommendation == Recommendation::Reject && !decision.certifications.is_empty() {
        return Err(QuillflowError::invalid(
            "Reject decision cannot have certifications",
        ));
    }
    check_certifications(&decision.certifications, config)
}

pub fn check_certifications(certifications: &[String], config: &VenueConfig) -> Result<()> {
    match certifications.iter().find(|c| !config.is_certification(c)) {
        Some(unknown) => Err(QuillflowError::invalid(format!(
            "Unknown certification: {unknown}"
        ))),
        None => Ok(()),
    }
}
