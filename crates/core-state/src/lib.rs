//! The composition layer: sessions contain tabs, tabs contain a pane layout
//! and at most one popup.
//!
//! One mutex around [`LayoutState`] guards the whole tree. The ownership
//! chain is `LayoutState -> Session -> Tab -> LayoutGroup -> Pane`; every
//! other reference is an id resolved under the lock. Removal APIs return the
//! owned pane so callers drop it (joining its threads) outside the lock.

mod layout_json;
mod popup;
mod save_layout;
mod session;
mod state;
mod tab;

pub use layout_json::{LayoutSnapshot, SnapshotError};
pub use popup::{Popup, PopupAlignment, PopupLayout, PopupSize};
pub use save_layout::SaveLayoutThread;
pub use session::Session;
pub use state::{LayoutState, RemovedPane};
pub use tab::Tab;
