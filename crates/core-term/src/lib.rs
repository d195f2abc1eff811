//! Terminal emulation: the screen model and the escape-sequence dispatcher.
//!
//! The data model deduplicates cell attributes through per-row-group id maps
//! so a cell is a handful of small integers; rows own their text as one UTF-8
//! string indexed by per-cell byte sizes. Scroll-back is a chain of row
//! groups bounded by total cell count.
//!
//! [`Terminal`] drives a [`Screen`] from parser events and owns everything
//! that is not grid content: modes, tab stops, the alternate screen, the
//! kitty key-flag stack, and the outgoing reply queue.

pub mod escapes;

mod cell;
mod cursor;
mod id_map;
mod rendition;
mod row;
mod row_group;
mod screen;
mod scroll_back;
mod selection;
mod terminal;

pub use cell::{Cell, CellFlags, Hyperlink, MultiCellInfo, MAX_TEXT_SIZE};
pub use cursor::{Cursor, CursorStyle, SavedCursor};
pub use id_map::{IdMap, IdMapValue};
pub use rendition::{Color, BlinkMode, FontWeight, GraphicsRendition, UnderlineMode};
pub use row::Row;
pub use row_group::{IdMaps, RowGroup};
pub use screen::{AutoWrapMode, OriginMode, Screen, ScrollBackEnabled, ScrollRegion};
pub use scroll_back::{ScrollBack, CELLS_PER_GROUP, DEFAULT_MAX_CELLS};
pub use selection::{Selection, SelectionPoint};
pub use terminal::{Terminal, TerminalEvent};
