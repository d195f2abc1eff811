//! The versioned layout snapshot.
//!
//! Snapshots record structure, not content: pane ids, working directories,
//! relative sizes, recency and activation. Restoring respawns panes from the
//! recorded tree. Unknown top-level versions are rejected rather than
//! half-read.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use core_events::{RenderHandle, Size};
use core_layout::{ChildOwned, ChildRef, Direction, LayoutGroup, MAX_LAYOUT_PRECISION};
use core_pane::{CreatePaneArgs, Pane, PaneError};

use crate::session::Session;
use crate::state::LayoutState;
use crate::tab::Tab;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("malformed layout snapshot")]
    Malformed(#[from] serde_json::Error),
    #[error("snapshot pane could not be spawned")]
    Spawn(#[from] PaneError),
}

/// Top-level, versioned. Readers reject variants they do not know.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum LayoutSnapshot {
    V1(v1::LayoutState),
}

pub mod v1 {
    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
    pub enum Node {
        Pane(PaneNode),
        Internal(InternalNode),
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
    pub struct PaneNode {
        pub relative_size: i64,
        pub id: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub cwd: Option<PathBuf>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
    pub struct InternalNode {
        pub children: Vec<Node>,
        pub relative_size: i64,
        pub direction: DirectionRepr,
    }

    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
    pub enum DirectionRepr {
        None,
        Horizontal,
        Vertical,
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
    pub struct Tab {
        pub pane_layout: InternalNode,
        pub pane_ids_by_recency: Vec<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub active_pane_id: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub full_screen_pane_id: Option<u64>,
        pub name: String,
        pub id: u64,
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
    pub struct Session {
        pub tabs: Vec<Tab>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub active_tab_id: Option<u64>,
        pub name: String,
        pub id: u64,
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
    pub struct LayoutState {
        pub sessions: Vec<Session>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub active_session_id: Option<u64>,
    }
}

impl From<Direction> for v1::DirectionRepr {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::None => v1::DirectionRepr::None,
            Direction::Horizontal => v1::DirectionRepr::Horizontal,
            Direction::Vertical => v1::DirectionRepr::Vertical,
        }
    }
}

impl From<v1::DirectionRepr> for Direction {
    fn from(direction: v1::DirectionRepr) -> Self {
        match direction {
            v1::DirectionRepr::None => Direction::None,
            v1::DirectionRepr::Horizontal => Direction::Horizontal,
            v1::DirectionRepr::Vertical => Direction::Vertical,
        }
    }
}

fn internal_from_group(group: &LayoutGroup<Pane>, relative_size: i64) -> v1::InternalNode {
    let mut children = Vec::new();
    group.visit_children(&mut |child, share| match child {
        ChildRef::Pane(pane) => {
            children.push(v1::Node::Pane(v1::PaneNode {
                relative_size: share,
                id: pane.id(),
                cwd: pane.cwd().cloned(),
            }));
        }
        ChildRef::Group(group) => {
            children.push(v1::Node::Internal(internal_from_group(group, share)));
        }
    });
    v1::InternalNode {
        children,
        relative_size,
        direction: group.direction().into(),
    }
}

impl LayoutSnapshot {
    pub fn capture(state: &LayoutState) -> LayoutSnapshot {
        let sessions = state
            .sessions()
            .iter()
            .map(|session| v1::Session {
                tabs: session
                    .tabs()
                    .iter()
                    .map(|tab| v1::Tab {
                        pane_layout: internal_from_group(tab.layout_root(), MAX_LAYOUT_PRECISION),
                        pane_ids_by_recency: tab.panes_by_recency().iter().copied().collect(),
                        active_pane_id: tab.active_pane_id(),
                        full_screen_pane_id: tab.full_screen_pane_id(),
                        name: tab.name().to_owned(),
                        id: tab.id(),
                    })
                    .collect(),
                active_tab_id: session.active_tab_id(),
                name: session.name().to_owned(),
                id: session.id(),
            })
            .collect();
        LayoutSnapshot::V1(v1::LayoutState {
            sessions,
            active_session_id: state.active_session_id(),
        })
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<LayoutSnapshot, SnapshotError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Rebuild a layout state, spawning every recorded pane with `command`
    /// in its recorded working directory. Panes that fail to spawn are
    /// skipped; a snapshot that yields nothing yields an empty state.
    pub fn restore(
        &self,
        size: Size,
        show_status_bar: bool,
        command: &[String],
        render: &RenderHandle,
    ) -> Result<LayoutState, SnapshotError> {
        let LayoutSnapshot::V1(snapshot) = self;
        let mut state = LayoutState::new(size, show_status_bar);

        for session_snapshot in &snapshot.sessions {
            let mut session = Session::new(session_snapshot.id, session_snapshot.name.clone());
            state.bump_ids(0, 0, session_snapshot.id);

            for tab_snapshot in &session_snapshot.tabs {
                state.bump_ids(0, tab_snapshot.id, 0);
                let mut spawn = |pane: &v1::PaneNode| -> Result<Pane, PaneError> {
                    let hooks = crate::state::LayoutState::make_hooks(
                        session_snapshot.id,
                        tab_snapshot.id,
                        pane.id,
                        render,
                    );
                    Pane::create(
                        pane.id,
                        CreatePaneArgs {
                            command: command.to_vec(),
                            cwd: pane.cwd.clone(),
                        },
                        size,
                        hooks,
                    )
                };

                let root = restore_group(&tab_snapshot.pane_layout, &mut spawn, &mut state)?;
                let mut tab = Tab::restore(
                    tab_snapshot.id,
                    tab_snapshot.name.clone(),
                    root,
                    tab_snapshot.pane_ids_by_recency.iter().copied().collect(),
                    tab_snapshot.active_pane_id,
                    tab_snapshot.full_screen_pane_id,
                );
                if tab.is_empty() {
                    continue;
                }
                tab.layout(size, 0, 0);
                session.add_tab(tab);
            }

            if session.is_empty() {
                continue;
            }
            if let Some(active_tab) = session_snapshot.active_tab_id {
                session.set_active_tab(Some(active_tab));
            }
            state.insert_restored_session(session);
        }

        if let Some(active_session) = snapshot.active_session_id {
            state.set_active_session(Some(active_session));
        }
        state.layout(None);
        Ok(state)
    }
}

fn restore_group(
    node: &v1::InternalNode,
    spawn: &mut dyn FnMut(&v1::PaneNode) -> Result<Pane, PaneError>,
    state: &mut LayoutState,
) -> Result<LayoutGroup<Pane>, SnapshotError> {
    let mut children = Vec::new();
    for child in &node.children {
        match child {
            v1::Node::Pane(pane_node) => {
                state.bump_ids(pane_node.id, 0, 0);
                match spawn(pane_node) {
                    Ok(pane) => {
                        children.push((ChildOwned::Pane(Box::new(pane)), pane_node.relative_size));
                    }
                    Err(error) => {
                        tracing::warn!(
                            target: "state",
                            pane = pane_node.id,
                            ?error,
                            "skipping unrestorable pane"
                        );
                    }
                }
            }
            v1::Node::Internal(internal) => {
                let group = restore_group(internal, spawn, state)?;
                if !group.is_empty() {
                    children.push((ChildOwned::Group(group), internal.relative_size));
                }
            }
        }
    }
    Ok(LayoutGroup::from_children(node.direction.into(), children))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn json_round_trip() {
        let snapshot = LayoutSnapshot::V1(v1::LayoutState {
            sessions: vec![v1::Session {
                tabs: vec![v1::Tab {
                    pane_layout: v1::InternalNode {
                        children: vec![
                            v1::Node::Pane(v1::PaneNode {
                                relative_size: 60_000,
                                id: 1,
                                cwd: Some(PathBuf::from("/tmp")),
                            }),
                            v1::Node::Internal(v1::InternalNode {
                                children: vec![
                                    v1::Node::Pane(v1::PaneNode {
                                        relative_size: 50_000,
                                        id: 2,
                                        cwd: None,
                                    }),
                                    v1::Node::Pane(v1::PaneNode {
                                        relative_size: 50_000,
                                        id: 3,
                                        cwd: None,
                                    }),
                                ],
                                relative_size: 40_000,
                                direction: v1::DirectionRepr::Vertical,
                            }),
                        ],
                        relative_size: MAX_LAYOUT_PRECISION,
                        direction: v1::DirectionRepr::Horizontal,
                    },
                    pane_ids_by_recency: vec![2, 1, 3],
                    active_pane_id: Some(2),
                    full_screen_pane_id: None,
                    name: "build".to_owned(),
                    id: 4,
                }],
                active_tab_id: Some(4),
                name: "work".to_owned(),
                id: 9,
            }],
            active_session_id: Some(9),
        });

        let text = snapshot.to_json().unwrap();
        assert_eq!(LayoutSnapshot::from_json(&text).unwrap(), snapshot);
    }

    #[test]
    fn unknown_version_is_rejected() {
        let error = LayoutSnapshot::from_json(r#"{"V9": {"sessions": []}}"#);
        assert!(error.is_err());
    }
}
