//! Engine fixtures: a venue with one editor-in-chief, two action editors
//! and a bench of reviewers, on a manual clock.

use chrono::{TimeZone, Utc};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

use quillflow_core::clock::ManualClock;
use quillflow_core::config::VenueConfig;
use quillflow_core::directory::StaticDirectory;
use quillflow_core::model::{AssignmentRole, Content, FieldValue, Paper};
use quillflow_core::types::Actor;
use quillflow_lifecycle::{ReviewVerdict, Transition};
use quillflow_store::MemoryStore;

use crate::engine::Engine;

pub const REVIEWERS: [&str; 4] = ["~Rita_Reviewer1", "~Ravi_Reviewer1", "~Rosa_Reviewer1", "~Remy_Reviewer1"];

pub fn eic() -> Actor {
    Actor::editor_in_chief("~Eve_Chief1")
}

pub fn author() -> Actor {
    Actor::author("~Ada_Author1")
}

pub fn editor() -> Actor {
    Actor::action_editor("~Alan_Editor1")
}

pub fn content(title: &str) -> Content {
    let mut c = Content::new();
    c.insert("title".into(), FieldValue::public(json!(title)));
    c.insert("abstract".into(), FieldValue::public(json!("We study attention.")));
    c.insert("authors".into(), FieldValue::public(json!(["Ada Author"])));
    c.insert("authorids".into(), FieldValue::public(json!(["~Ada_Author1"])));
    c
}

pub fn review() -> BTreeMap<String, Value> {
    let mut c = BTreeMap::new();
    c.insert("summary_of_contributions".into(), json!("A sparse attention scheme."));
    c.insert("strengths_and_weaknesses".into(), json!("Clear, limited baselines."));
    c
}

pub fn recommendation(value: &str) -> BTreeMap<String, Value> {
    let mut c = BTreeMap::new();
    c.insert("decision_recommendation".into(), json!(value));
    c
}

pub struct Setup {
    pub engine: Engine,
    pub directory: Arc<StaticDirectory>,
    pub clock: Arc<ManualClock>,
}

impl Setup {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(tweak: impl FnOnce(&mut VenueConfig)) -> Self {
        let mut config = VenueConfig::default();
        config.editors_in_chief = vec!["~Eve_Chief1".into()];
        tweak(&mut config);

        let directory = Arc::new(StaticDirectory::new());
        directory.add_profile("~Ada_Author1", "ada@uni.edu");
        directory.add_profile("~Eve_Chief1", "eve@venue.org");
        directory.add_profile("~Alan_Editor1", "alan@lab.org");
        directory.add_profile("~Bea_Editor1", "bea@lab.org");
        directory.add_profile("~Rita_Reviewer1", "rita@inst.org");
        directory.add_profile("~Ravi_Reviewer1", "ravi@inst.org");
        directory.add_profile("~Rosa_Reviewer1", "rosa@inst.org");
        directory.add_profile("~Remy_Reviewer1", "remy@inst.org");

        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()));
        let engine = Engine::new(
            Arc::new(MemoryStore::new()),
            directory.clone(),
            Arc::new(config),
            clock.clone(),
        );
        Self {
            engine,
            directory,
            clock,
        }
    }

    pub fn submit(&self, title: &str) -> Paper {
        self.engine.submit(content(title), &author()).unwrap()
    }

    /// A submitted paper with Alan as action editor.
    pub fn under_editor(&self, title: &str) -> Paper {
        let paper = self.submit(title);
        self.engine
            .assign(&paper.id, "~Alan_Editor1", AssignmentRole::ActionEditor, &eic())
            .unwrap();
        self.engine.paper(&paper.id).unwrap()
    }

    /// A paper approved for review by its action editor.
    pub fn under_review(&self, title: &str) -> Paper {
        let paper = self.under_editor(title);
        self.engine
            .apply_transition(
                &paper.id,
                Transition::ReviewApproval {
                    verdict: ReviewVerdict::AppropriateForReview,
                },
                &editor(),
            )
            .unwrap()
    }

    /// Under review with the first `n` reviewers assigned by the editor.
    pub fn with_reviewers(&self, title: &str, n: usize) -> Paper {
        let paper = self.under_review(title);
        for person in &REVIEWERS[..n] {
            self.engine
                .assign(&paper.id, person, AssignmentRole::Reviewer, &editor())
                .unwrap();
        }
        self.engine.paper(&paper.id).unwrap()
    }

    /// Keys of every queued or delivered message.
    pub fn keys(&self) -> Vec<String> {
        self.engine.messages().into_iter().map(|m| m.key).collect()
    }
}
