//! Record store trait: durable, versioned, append-only entities.

use crate::error::{QuillflowError, Result};
use crate::model::{Edge, Edit, Entity, EntityKind, Group, Note, Paper, Query, TaskWindow};
use crate::types::PaperId;

/// Entities and edits written together. A store applies a batch all or
/// nothing; readers never see half of one.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub entities: Vec<Entity>,
    pub edits: Vec<Edit>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, entity: Entity) -> &mut Self {
        // Later writes of the same id in one batch win.
        self.entities.retain(|e| e.id() != entity.id());
        self.entities.push(entity);
        self
    }

    pub fn record(&mut self, edit: Edit) -> &mut Self {
        self.edits.push(edit);
        self
    }

    pub fn extend(&mut self, other: Batch) {
        for entity in other.entities {
            self.put(entity);
        }
        self.edits.extend(other.edits);
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.edits.is_empty()
    }
}

/// Storage substrate consumed by the engine.
///
/// Stores assign versions: every committed entity is stored with the
/// previous version plus one, and older versions stay readable through
/// the edit history only.
pub trait RecordStore: Send + Sync {
    /// Backend name, for logs.
    fn name(&self) -> &str;

    fn get_entity(&self, id: &str) -> Result<Option<Entity>>;

    fn query(&self, query: &Query) -> Result<Vec<Entity>>;

    /// Accepted edits touching `entity_id`, oldest first.
    fn edit_history(&self, entity_id: &str) -> Result<Vec<Edit>>;

    /// Apply a batch atomically.
    fn commit(&self, batch: Batch) -> Result<()>;

    /// Next free paper number of the venue, starting at 1.
    fn next_paper_number(&self) -> Result<u32>;

    /// Create a single entity together with the edit that created it.
    fn create_entity(&self, entity: Entity, edit: Edit) -> Result<()> {
        if self.get_entity(entity.id())?.is_some() {
            return Err(QuillflowError::store(format!(
                "entity {} already exists",
                entity.id()
            )));
        }
        let mut batch = Batch::new();
        batch.put(entity).record(edit);
        self.commit(batch)
    }

    fn paper(&self, id: &PaperId) -> Result<Paper> {
        match self.get_entity(id.as_str())? {
            Some(Entity::Paper(p)) => Ok(p),
            _ => Err(QuillflowError::not_found(format!("paper {id}"))),
        }
    }

    fn papers(&self) -> Result<Vec<Paper>> {
        Ok(self
            .query(&Query::kind(EntityKind::Paper))?
            .into_iter()
            .filter_map(|e| match e {
                Entity::Paper(p) => Some(p),
                _ => None,
            })
            .collect())
    }

    fn notes_for(&self, paper_id: &PaperId) -> Result<Vec<Note>> {
        Ok(self
            .query(&Query::kind(EntityKind::Note).paper(paper_id))?
            .into_iter()
            .filter_map(|e| match e {
                Entity::Note(n) => Some(n),
                _ => None,
            })
            .collect())
    }

    fn edges_for(&self, paper_id: &PaperId) -> Result<Vec<Edge>> {
        Ok(self
            .query(&Query::kind(EntityKind::Edge).paper(paper_id))?
            .into_iter()
            .filter_map(|e| match e {
                Entity::Edge(e) => Some(e),
                _ => None,
            })
            .collect())
    }

    /// Every edge whose tail is `person`, across papers.
    fn edges_for_person(&self, person: &str) -> Result<Vec<Edge>> {
        Ok(self
            .query(&Query::kind(EntityKind::Edge).person(person))?
            .into_iter()
            .filter_map(|e| match e {
                Entity::Edge(e) => Some(e),
                _ => None,
            })
            .collect())
    }

    fn groups_for(&self, paper_id: &PaperId) -> Result<Vec<Group>> {
        Ok(self
            .query(&Query::kind(EntityKind::Group).paper(paper_id))?
            .into_iter()
            .filter_map(|e| match e {
                Entity::Group(g) => Some(g),
                _ => None,
            })
            .collect())
    }

    fn group(&self, id: &str) -> Result<Option<Group>> {
        Ok(match self.get_entity(id)? {
            Some(Entity::Group(g)) => Some(g),
            _ => None,
        })
    }

    fn windows_for(&self, paper_id: &PaperId) -> Result<Vec<TaskWindow>> {
        Ok(self
            .query(&Query::kind(EntityKind::Window).paper(paper_id))?
            .into_iter()
            .filter_map(|e| match e {
                Entity::Window(w) => Some(w),
                _ => None,
            })
            .collect())
    }
}
