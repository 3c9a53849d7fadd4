//! Paper snapshots for unit tests.

use chrono::{DateTime, Duration, TimeZone, Utc};

use quillflow_core::model::{
    AssignmentRole, CameraReady, Content, Edge, EdgeKind, FieldValue, Note, NoteKind, Paper, Readers,
};
use quillflow_core::types::{EdgeId, PaperId, PaperState};

use crate::tasks::PaperSnapshot;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap()
}

pub fn snapshot(state: PaperState) -> PaperSnapshot {
    let mut content = Content::new();
    content.insert(
        "authorids".into(),
        FieldValue::public(serde_json::json!(["~Ada_Author1"])),
    );
    PaperSnapshot {
        paper: Paper {
            id: PaperId::from("p1"),
            number: 1,
            state,
            content,
            assigned_action_editor: Some("~Alan_Editor1".into()),
            pending: None,
            certifications: vec![],
            camera_ready: CameraReady::default(),
            authors_revealed: false,
            readers: Readers::new(),
            writers: Readers::new(),
            cdate: t0(),
            mdate: t0(),
            state_changed_at: t0(),
            version: 1,
        },
        edges: vec![edge("~Alan_Editor1", AssignmentRole::ActionEditor)],
        notes: vec![],
        windows: vec![],
    }
}

pub fn edge(tail: &str, role: AssignmentRole) -> Edge {
    Edge {
        id: EdgeId::generate(),
        paper_id: PaperId::from("p1"),
        tail: tail.into(),
        kind: EdgeKind::Assignment(role),
        weight: 1,
        label: None,
        created_by: "~Eve_Chief1".into(),
        cdate: t0(),
        deletion_time: None,
        version: 1,
    }
}

pub fn note(kind: NoteKind, signer: &str) -> Note {
    Note {
        id: format!("note-{signer}-{kind:?}"),
        paper_id: PaperId::from("p1"),
        kind,
        signature: signer.into(),
        anon_id: None,
        content: Default::default(),
        readers: Readers::new(),
        cdate: t0() + Duration::days(3),
        mdate: t0() + Duration::days(3),
        version: 1,
    }
}
