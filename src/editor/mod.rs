//! The source-code editor core.
//!
//! A UTF-8-aware, tab-expanding line/column text buffer with
//! selection, an undo/redo journal, syntax colorization driven by the
//! DLX lexer, error markers and breakpoints, host-independent input
//! mapping and a per-frame render model. The GUI contract the host
//! must satisfy lives in [host].

pub mod buffer;
pub mod core;
pub mod host;
pub mod input;
pub mod palette;
pub mod render;
pub mod undo;

pub use self::buffer::{Coordinates, Glyph, TextBuffer};
pub use self::core::{CodeEditor, EditorState, ParseCallback, SelectionMode};
pub use self::host::{Clipboard, DrawCmd, DrawList, FrameContext, TextMetrics, Vec2};
pub use self::input::{InputMapper, InputSnapshot, Key};
pub use self::palette::{Palette, PaletteIndex};
pub use self::render::{Frame, Renderer};
pub use self::undo::{UndoLog, UndoRecord};
