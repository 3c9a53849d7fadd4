//! In-process identity directory.
//!
//! Backs the identity oracle for tests and for single-venue deployments
//! that load their profiles from a file.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::{QuillflowError, Result};
use crate::locks::lock;
use crate::traits::{IdentityOracle, ProfileStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub emails: Vec<String>,
    #[serde(default = "default_status")]
    pub status: ProfileStatus,
}

fn default_status() -> ProfileStatus {
    ProfileStatus::Active
}

/// On-disk form of a directory.
///
/// ```toml
/// conflicts = [["~Ada_Author1", "rita@inst.org"]]
///
/// [[profiles]]
/// id = "~Ada_Author1"
/// emails = ["ada@uni.edu"]
/// ```
#[derive(Debug, Default, Deserialize)]
struct DirectoryFile {
    #[serde(default)]
    profiles: Vec<Profile>,
    #[serde(default)]
    conflicts: Vec<(String, String)>,
}

#[derive(Debug, Default)]
pub struct StaticDirectory {
    profiles: Mutex<HashMap<String, Profile>>,
    /// Unordered pairs of profile ids or emails.
    conflicts: Mutex<BTreeSet<(String, String)>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load profiles and conflicts from a TOML file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| QuillflowError::Config(format!("Failed to read directory: {e}")))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let file: DirectoryFile = toml::from_str(content)
            .map_err(|e| QuillflowError::Config(format!("Failed to parse directory: {e}")))?;
        let dir = Self::new();
        {
            let mut profiles = lock(&dir.profiles);
            for mut p in file.profiles {
                p.emails = p.emails.iter().map(|e| e.to_lowercase()).collect();
                profiles.insert(p.id.clone(), p);
            }
        }
        for (a, b) in &file.conflicts {
            dir.add_conflict(a, b);
        }
        tracing::debug!("📇 Loaded {} profile(s)", lock(&dir.profiles).len());
        Ok(dir)
    }

    /// Register an active profile.
    pub fn add_profile(&self, id: &str, email: &str) {
        self.insert(id, email, ProfileStatus::Active);
    }

    /// Register a profile that signed up but is not active yet.
    pub fn add_pending_profile(&self, id: &str, email: &str) {
        self.insert(id, email, ProfileStatus::Pending);
    }

    fn insert(&self, id: &str, email: &str, status: ProfileStatus) {
        lock(&self.profiles).insert(
            id.to_string(),
            Profile {
                id: id.to_string(),
                emails: vec![email.to_lowercase()],
                status,
            },
        );
    }

    pub fn activate(&self, id: &str) {
        if let Some(p) = lock(&self.profiles).get_mut(id) {
            p.status = ProfileStatus::Active;
        }
    }

    pub fn add_conflict(&self, a: &str, b: &str) {
        lock(&self.conflicts).insert(ordered(a, b));
    }

    fn find(&self, email_or_id: &str) -> Option<Profile> {
        let key = email_or_id.to_lowercase();
        let profiles = lock(&self.profiles);
        profiles.get(email_or_id).cloned().or_else(|| {
            profiles
                .values()
                .find(|p| p.emails.iter().any(|e| *e == key))
                .cloned()
        })
    }

    /// Every name `who` is known under: the raw value, the profile id and
    /// its emails.
    fn aliases(&self, who: &str) -> Vec<String> {
        let mut names = vec![who.to_string()];
        if let Some(p) = self.find(who) {
            names.push(p.id);
            names.extend(p.emails);
        }
        names
    }
}

fn ordered(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

impl IdentityOracle for StaticDirectory {
    fn has_conflict(&self, a: &str, b: &str) -> bool {
        let left = self.aliases(a);
        let right = self.aliases(b);
        let conflicts = lock(&self.conflicts);
        left.iter()
            .any(|x| right.iter().any(|y| conflicts.contains(&ordered(x, y))))
    }

    fn profile_status(&self, email_or_id: &str) -> ProfileStatus {
        self.find(email_or_id)
            .map(|p| p.status)
            .unwrap_or(ProfileStatus::NoProfile)
    }

    fn resolve(&self, email_or_id: &str) -> Option<String> {
        self.find(email_or_id)
            .filter(|p| p.status == ProfileStatus::Active)
            .map(|p| p.id)
    }

    fn preferred_email(&self, id: &str) -> Option<String> {
        self.find(id).and_then(|p| p.emails.first().cloned())
    }
}
