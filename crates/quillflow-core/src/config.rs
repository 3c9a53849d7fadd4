//! Quillflow venue configuration.
//!
//! One `VenueConfig` describes a venue: its editors-in-chief, task periods,
//! reviewing quotas, escalation ladder and the runtime knobs of the daemon.
//! The engine receives it as an immutable `Arc<VenueConfig>`.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{QuillflowError, Result};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    #[serde(default = "default_venue_id")]
    pub venue_id: String,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_short_name")]
    pub short_name: String,
    #[serde(default = "default_contact_email")]
    pub contact_email: String,
    #[serde(default = "default_website")]
    pub website: String,
    /// Profile ids of the editors-in-chief.
    #[serde(default)]
    pub editors_in_chief: Vec<String>,
    /// Certifications an accepted paper may carry.
    #[serde(default = "default_certifications")]
    pub certifications: Vec<String>,
    #[serde(default)]
    pub periods: PeriodsConfig,
    #[serde(default)]
    pub reviewing: ReviewingConfig,
    #[serde(default)]
    pub escalation: EscalationConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_venue_id() -> String { "TMLR".into() }
fn default_name() -> String { "Transactions on Machine Learning Research".into() }
fn default_short_name() -> String { "TMLR".into() }
fn default_contact_email() -> String { "tmlr@jmlr.org".into() }
fn default_website() -> String { "https://jmlr.org/tmlr".into() }
fn default_certifications() -> Vec<String> {
    vec![
        "Featured Certification".into(),
        "Outstanding Certification".into(),
        "Expert Certification".into(),
        "Survey Certification".into(),
        "Reproducibility Certification".into(),
    ]
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            venue_id: default_venue_id(),
            name: default_name(),
            short_name: default_short_name(),
            contact_email: default_contact_email(),
            website: default_website(),
            editors_in_chief: Vec::new(),
            certifications: default_certifications(),
            periods: PeriodsConfig::default(),
            reviewing: ReviewingConfig::default(),
            escalation: EscalationConfig::default(),
            scheduler: SchedulerConfig::default(),
            storage: StorageConfig::default(),
            notify: NotifyConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl VenueConfig {
    /// Load config from the default path (~/.quillflow/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| QuillflowError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| QuillflowError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the given path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| QuillflowError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Quillflow home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".quillflow")
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.venue_id.trim().is_empty() {
            return Err(QuillflowError::Config("venue_id must not be empty".into()));
        }
        if self.reviewing.number_of_reviewers == 0 {
            return Err(QuillflowError::Config(
                "reviewing.number_of_reviewers must be at least 1".into(),
            ));
        }
        if self.reviewing.review_publication_threshold == 0 {
            return Err(QuillflowError::Config(
                "reviewing.review_publication_threshold must be at least 1".into(),
            ));
        }
        let mut last = i64::MIN;
        for step in &self.escalation.steps {
            if step.days_late < 0 || step.days_late <= last {
                return Err(QuillflowError::Config(
                    "escalation.steps must have strictly increasing, non-negative days_late".into(),
                ));
            }
            last = step.days_late;
        }
        Ok(())
    }

    pub fn is_certification(&self, name: &str) -> bool {
        self.certifications.iter().any(|c| c == name)
    }
}

/// Task periods, in days.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodsConfig {
    #[serde(default = "one_week")]
    pub ae_assignment: i64,
    #[serde(default = "one_week")]
    pub review_approval: i64,
    #[serde(default = "one_week")]
    pub desk_rejection_approval: i64,
    #[serde(default = "one_week")]
    pub reviewer_assignment: i64,
    #[serde(default = "default_ack_period")]
    pub assignment_acknowledgement: i64,
    #[serde(default = "two_weeks")]
    pub review: i64,
    /// Delay between the last review and the opening of recommendations.
    #[serde(default = "two_weeks")]
    pub discussion: i64,
    #[serde(default = "two_weeks")]
    pub recommendation: i64,
    #[serde(default = "one_week")]
    pub decision: i64,
    #[serde(default = "one_week")]
    pub decision_approval: i64,
    #[serde(default = "four_weeks")]
    pub camera_ready: i64,
    #[serde(default = "one_week")]
    pub camera_ready_verification: i64,
    #[serde(default = "one_week")]
    pub retraction_approval: i64,
    #[serde(default = "one_week")]
    pub solicitation_response: i64,
    /// Tasks stay open this long past their due date unless closed earlier.
    #[serde(default = "default_expiry_grace")]
    pub expiry_grace: i64,
}

fn one_week() -> i64 { 7 }
fn two_weeks() -> i64 { 14 }
fn four_weeks() -> i64 { 28 }
fn default_ack_period() -> i64 { 2 }
fn default_expiry_grace() -> i64 { 90 }

impl Default for PeriodsConfig {
    fn default() -> Self {
        Self {
            ae_assignment: one_week(),
            review_approval: one_week(),
            desk_rejection_approval: one_week(),
            reviewer_assignment: one_week(),
            assignment_acknowledgement: default_ack_period(),
            review: two_weeks(),
            discussion: two_weeks(),
            recommendation: two_weeks(),
            decision: one_week(),
            decision_approval: one_week(),
            camera_ready: four_weeks(),
            camera_ready_verification: one_week(),
            retraction_approval: one_week(),
            solicitation_response: one_week(),
            expiry_grace: default_expiry_grace(),
        }
    }
}

impl PeriodsConfig {
    pub fn days(days: i64) -> Duration {
        Duration::days(days)
    }

    pub fn expiry_grace(&self) -> Duration {
        Duration::days(self.expiry_grace)
    }
}

/// Reviewer pool and quota settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewingConfig {
    #[serde(default = "default_number_of_reviewers")]
    pub number_of_reviewers: usize,
    /// Submitted reviews needed before reviews become public.
    #[serde(default = "default_number_of_reviewers")]
    pub review_publication_threshold: usize,
    /// Pending reviews a reviewer may carry when receiving a new assignment.
    #[serde(default = "default_max_pending_reviews")]
    pub max_pending_reviews: u32,
    /// Assignments a reviewer may receive per annual window.
    #[serde(default = "default_reviewers_max_papers")]
    pub reviewers_max_papers: u32,
    #[serde(default = "default_annual_window_days")]
    pub annual_window_days: i64,
}

fn default_number_of_reviewers() -> usize { 3 }
fn default_max_pending_reviews() -> u32 { 1 }
fn default_reviewers_max_papers() -> u32 { 6 }
fn default_annual_window_days() -> i64 { 365 }

impl Default for ReviewingConfig {
    fn default() -> Self {
        Self {
            number_of_reviewers: default_number_of_reviewers(),
            review_publication_threshold: default_number_of_reviewers(),
            max_pending_reviews: default_max_pending_reviews(),
            reviewers_max_papers: default_reviewers_max_papers(),
            annual_window_days: default_annual_window_days(),
        }
    }
}

/// Who receives an escalation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationAudience {
    /// The actor who owes the task.
    Assignee,
    /// One role up: AE for reviewer/author tasks, EIC for AE tasks.
    NextRoleUp,
    /// The editors-in-chief.
    TopRole,
}

/// One rung of the escalation ladder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EscalationStep {
    pub days_late: i64,
    /// Rendered into messages, e.g. "one week".
    pub wording: String,
    pub audiences: Vec<EscalationAudience>,
}

impl EscalationStep {
    pub fn new(days_late: i64, wording: &str, audiences: &[EscalationAudience]) -> Self {
        Self {
            days_late,
            wording: wording.to_string(),
            audiences: audiences.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationConfig {
    #[serde(default = "default_escalation_steps")]
    pub steps: Vec<EscalationStep>,
}

fn default_escalation_steps() -> Vec<EscalationStep> {
    use EscalationAudience::*;
    vec![
        EscalationStep::new(0, "now", &[Assignee]),
        EscalationStep::new(5, "five days", &[Assignee]),
        EscalationStep::new(7, "one week", &[Assignee, NextRoleUp]),
        EscalationStep::new(14, "two weeks", &[Assignee, NextRoleUp]),
        EscalationStep::new(30, "one month", &[Assignee, NextRoleUp, TopRole]),
    ]
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            steps: default_escalation_steps(),
        }
    }
}

/// Daemon timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_dispatch_interval")]
    pub dispatch_interval_secs: u64,
}

fn default_sweep_interval() -> u64 { 3600 }
fn default_dispatch_interval() -> u64 { 30 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval(),
            dispatch_interval_secs: default_dispatch_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Profiles and conflicts for the built-in identity directory.
    #[serde(default = "default_directory_path")]
    pub directory_path: String,
    /// Reminder ledger and notification log.
    #[serde(default = "default_scheduler_db_path")]
    pub scheduler_db_path: String,
}

fn default_db_path() -> String { "~/.quillflow/quillflow.db".into() }
fn default_directory_path() -> String { "~/.quillflow/profiles.toml".into() }
fn default_scheduler_db_path() -> String { "~/.quillflow/scheduler.db".into() }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            directory_path: default_directory_path(),
            scheduler_db_path: default_scheduler_db_path(),
        }
    }
}

/// Delivery sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// "log", "webhook" or "smtp".
    #[serde(default = "default_sink")]
    pub sink: String,
    #[serde(default)]
    pub webhook_url: String,
    #[serde(default)]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_user: String,
    #[serde(default)]
    pub smtp_password: String,
    #[serde(default = "default_from_address")]
    pub from_address: String,
}

fn default_sink() -> String { "log".into() }
fn default_smtp_port() -> u16 { 587 }
fn default_from_address() -> String { "noreply@quillflow.local".into() }

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            sink: default_sink(),
            webhook_url: String::new(),
            smtp_host: String::new(),
            smtp_port: default_smtp_port(),
            smtp_user: String::new(),
            smtp_password: String::new(),
            from_address: default_from_address(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String { "info".into() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
