//! Shared fixtures for the assignment tests.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;

use quillflow_core::config::VenueConfig;
use quillflow_core::directory::StaticDirectory;
use quillflow_core::model::{Content, Entity, FieldValue, Note, NoteKind, readers};
use quillflow_core::traits::{Batch, RecordStore};
use quillflow_core::types::{Actor, PaperId, PaperState, generate_id};
use quillflow_lifecycle::submit;
use quillflow_store::MemoryStore;

use crate::assigner::Assigner;

pub fn eic() -> Actor {
    Actor::editor_in_chief("~Eve_Chief1")
}

pub fn author() -> Actor {
    Actor::author("~Ada_Author1")
}

pub struct Fixture {
    pub store: MemoryStore,
    pub directory: StaticDirectory,
    pub config: VenueConfig,
    pub now: DateTime<Utc>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(tweak: impl FnOnce(&mut VenueConfig)) -> Self {
        let mut config = VenueConfig::default();
        config.editors_in_chief = vec!["~Eve_Chief1".into()];
        tweak(&mut config);
        let directory = StaticDirectory::new();
        directory.add_profile("~Ada_Author1", "ada@uni.edu");
        directory.add_profile("~Alan_Editor1", "alan@lab.org");
        directory.add_profile("~Bea_Editor1", "bea@lab.org");
        directory.add_profile("~Rita_Reviewer1", "rita@inst.org");
        Self {
            store: MemoryStore::new(),
            directory,
            config,
            now: Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
        }
    }

    pub fn assigner(&self) -> Assigner<'_> {
        Assigner::new(&self.store, &self.directory, &self.config)
    }

    /// A stored paper by Ada, forced into `state`.
    pub fn paper(&self, state: PaperState) -> quillflow_core::model::Paper {
        let mut content = Content::new();
        content.insert("title".into(), FieldValue::public(json!("Sparse Attention")));
        content.insert("authors".into(), FieldValue::public(json!(["Ada Author"])));
        content.insert("authorids".into(), FieldValue::public(json!(["~Ada_Author1"])));
        let number = self.store.next_paper_number().unwrap();
        let mut paper = submit(PaperId::generate(), number, content, &author(), self.now, &self.config).unwrap();
        paper.state = state;
        let mut batch = Batch::new();
        batch.put(Entity::Paper(paper.clone()));
        self.store.commit(batch).unwrap();
        self.store.paper(&paper.id).unwrap()
    }

    pub fn set_state(&self, id: &PaperId, state: PaperState) {
        let mut paper = self.store.paper(id).unwrap();
        paper.state = state;
        let mut batch = Batch::new();
        batch.put(Entity::Paper(paper));
        self.store.commit(batch).unwrap();
    }

    pub fn add_review(&self, paper: &quillflow_core::model::Paper, reviewer: &str) {
        let note = Note {
            id: generate_id("note"),
            paper_id: paper.id.clone(),
            kind: NoteKind::Review,
            signature: reviewer.to_string(),
            anon_id: None,
            content: Default::default(),
            readers: readers(["TMLR"]),
            cdate: self.now,
            mdate: self.now,
            version: 0,
        };
        let mut batch = Batch::new();
        batch.put(Entity::Note(note));
        self.store.commit(batch).unwrap();
    }
}
