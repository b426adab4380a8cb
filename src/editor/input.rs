//! Translation of host input events into editor operations.
//!
//! The host fills an [InputSnapshot] per frame; [InputMapper::process]
//! applies the chord table and routes text input through
//! [CodeEditor::enter_character]. Invalid scalar values in
//! `input_chars` (surrogate halves, NUL, control characters other than
//! newline) are dropped at ingest.

use super::core::{CodeEditor, SelectionMode};
use super::host::{Clipboard, FrameContext, TextMetrics, Vec2};
use super::render;

/// Keys the editor reacts to. Printable input arrives through
/// [InputSnapshot::input_chars] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    PageUp,
    PageDown,
    Home,
    End,
    Delete,
    Backspace,
    Insert,
    Enter,
    Tab,
    A,
    C,
    V,
    X,
    Y,
    Z,
}

/// One frame's worth of input, as observed by the host.
#[derive(Debug, Clone, Default)]
pub struct InputSnapshot {
    /// Keys that went down this frame.
    pub pressed: Vec<Key>,
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    /// Queued character input as raw scalar values.
    pub input_chars: Vec<u32>,
    pub mouse_pos: Vec2,
    pub mouse_clicked: bool,
    pub mouse_double_clicked: bool,
    pub mouse_down: bool,
    pub mouse_dragging: bool,
    /// Frame timestamp in milliseconds, for triple-click detection.
    pub time_ms: u64,
}

/// Stateful key/mouse to editor-operation translator.
pub struct InputMapper {
    last_click_ms: Option<u64>,
    /// Two clicks closer than this count as a multi-click.
    pub double_click_ms: u64,
}

impl InputMapper {
    pub fn new() -> InputMapper {
        InputMapper {
            last_click_ms: None,
            double_click_ms: 350,
        }
    }

    /// Applies one frame of input to the editor.
    pub fn process(
        &mut self,
        editor: &mut CodeEditor,
        input: &InputSnapshot,
        clipboard: &mut dyn Clipboard,
        metrics: &dyn TextMetrics,
        ctx: &FrameContext,
    ) {
        self.handle_keys(editor, input, clipboard, metrics, ctx);
        self.handle_mouse(editor, input, metrics, ctx);
        self.handle_text(editor, input);
    }

    fn handle_keys(
        &mut self,
        editor: &mut CodeEditor,
        input: &InputSnapshot,
        clipboard: &mut dyn Clipboard,
        metrics: &dyn TextMetrics,
        ctx: &FrameContext,
    ) {
        let shift = input.shift;
        let ctrl = input.ctrl;
        let alt = input.alt;

        let page = page_size(ctx, metrics).saturating_sub(4).max(1);

        for &key in &input.pressed {
            match key {
                Key::Z if ctrl && !shift && !alt => editor.undo(1),
                Key::Backspace if alt && !ctrl && !shift => editor.undo(1),
                Key::Y if ctrl && !shift && !alt => editor.redo(1),

                Key::Up if !ctrl && !alt => editor.move_up(1, shift),
                Key::Down if !ctrl && !alt => editor.move_down(1, shift),
                Key::Left if !alt => editor.move_left(1, shift, ctrl),
                Key::Right if !alt => editor.move_right(1, shift, ctrl),

                Key::PageUp if !alt => editor.move_up(page, shift),
                Key::PageDown if !alt => editor.move_down(page, shift),

                Key::Home if ctrl && !alt => editor.move_top(shift),
                Key::End if ctrl && !alt => editor.move_bottom(shift),
                Key::Home if !ctrl && !alt => editor.move_home(shift),
                Key::End if !ctrl && !alt => editor.move_end(shift),

                Key::Delete if !ctrl && !shift && !alt => editor.delete(),
                Key::Backspace if !ctrl && !shift && !alt => editor.backspace(),

                Key::Insert if !ctrl && !shift && !alt => editor.toggle_overwrite(),
                Key::Insert if ctrl && !shift && !alt => editor.copy(clipboard),
                Key::Insert if shift && !ctrl && !alt => editor.paste(clipboard),

                Key::C if ctrl && !shift && !alt => editor.copy(clipboard),
                Key::V if ctrl && !shift && !alt => editor.paste(clipboard),
                Key::X if ctrl && !shift && !alt => editor.cut(clipboard),
                Key::Delete if shift && !ctrl && !alt => editor.cut(clipboard),

                Key::A if ctrl && !shift && !alt => editor.select_all(),

                Key::Enter if !ctrl && !alt => editor.enter_character('\n', false),
                Key::Tab if !ctrl && !alt => editor.enter_character('\t', shift),

                _ => {}
            }
        }
    }

    fn handle_mouse(
        &mut self,
        editor: &mut CodeEditor,
        input: &InputSnapshot,
        metrics: &dyn TextMetrics,
        ctx: &FrameContext,
    ) {
        if input.shift || input.alt {
            return;
        }

        let coords = render::screen_to_coordinates(editor, metrics, ctx, input.mouse_pos);

        let triple_click = input.mouse_clicked
            && !input.mouse_double_clicked
            && self
                .last_click_ms
                .map(|last| input.time_ms.saturating_sub(last) < self.double_click_ms)
                .unwrap_or(false);

        if triple_click {
            if !input.ctrl {
                editor.place_cursor(coords, SelectionMode::Line);
            }
            self.last_click_ms = None;
        } else if input.mouse_double_clicked {
            if !input.ctrl {
                // A second double-click while in word mode grows to the
                // whole line.
                let mode = if editor.selection_mode() == SelectionMode::Word {
                    SelectionMode::Line
                } else {
                    SelectionMode::Word
                };
                editor.place_cursor(coords, mode);
            }
            self.last_click_ms = Some(input.time_ms);
        } else if input.mouse_clicked {
            let mode = if input.ctrl {
                SelectionMode::Word
            } else {
                SelectionMode::Normal
            };
            editor.place_cursor(coords, mode);
            self.last_click_ms = Some(input.time_ms);
        } else if input.mouse_dragging && input.mouse_down {
            editor.drag_cursor(coords);
        }
    }

    fn handle_text(&mut self, editor: &mut CodeEditor, input: &InputSnapshot) {
        for &scalar in &input.input_chars {
            // from_u32 rejects surrogate halves; the range check drops
            // NUL and control characters.
            let character = match char::from_u32(scalar) {
                Some(c) if c == '\n' || c >= ' ' => c,
                _ => continue,
            };

            editor.enter_character(character, input.shift);
        }
    }
}

impl Default for InputMapper {
    fn default() -> InputMapper {
        InputMapper::new()
    }
}

/// Visible lines per page for PageUp/PageDown.
pub fn page_size(ctx: &FrameContext, metrics: &dyn TextMetrics) -> u32 {
    let line_height = metrics.line_height(ctx.font_size).max(1.0);
    (((ctx.size.y - 20.0) / line_height).floor()).max(1.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::host::{MonospaceMetrics, TestClipboard};

    fn mapper_parts() -> (CodeEditor, InputMapper, TestClipboard, MonospaceMetrics, FrameContext) {
        (
            CodeEditor::standalone(),
            InputMapper::new(),
            TestClipboard::new(),
            MonospaceMetrics::new(8.0),
            FrameContext::default(),
        )
    }

    fn press(key: Key, shift: bool, ctrl: bool) -> InputSnapshot {
        InputSnapshot {
            pressed: vec![key],
            shift,
            ctrl,
            ..InputSnapshot::default()
        }
    }

    #[test]
    fn typed_characters_reach_the_buffer() {
        let (mut editor, mut mapper, mut clipboard, metrics, ctx) = mapper_parts();

        let input = InputSnapshot {
            input_chars: vec!['h' as u32, 'i' as u32],
            ..InputSnapshot::default()
        };
        mapper.process(&mut editor, &input, &mut clipboard, &metrics, &ctx);

        assert_eq!(editor.get_text(), "hi");
    }

    #[test]
    fn surrogates_and_controls_are_dropped() {
        let (mut editor, mut mapper, mut clipboard, metrics, ctx) = mapper_parts();

        let input = InputSnapshot {
            input_chars: vec![0xD800, 0x0000, 0x0007, 'a' as u32],
            ..InputSnapshot::default()
        };
        mapper.process(&mut editor, &input, &mut clipboard, &metrics, &ctx);

        assert_eq!(editor.get_text(), "a");
    }

    #[test]
    fn ctrl_z_undoes() {
        let (mut editor, mut mapper, mut clipboard, metrics, ctx) = mapper_parts();
        editor.insert_text("abc");

        mapper.process(
            &mut editor,
            &press(Key::Z, false, true),
            &mut clipboard,
            &metrics,
            &ctx,
        );

        assert_eq!(editor.get_text(), "");
    }

    #[test]
    fn copy_without_selection_takes_the_line() {
        let (mut editor, mut mapper, mut clipboard, metrics, ctx) = mapper_parts();
        editor.set_text("line one\nline two");

        mapper.process(
            &mut editor,
            &press(Key::C, false, true),
            &mut clipboard,
            &metrics,
            &ctx,
        );

        assert_eq!(clipboard.content(), "line one");
    }

    #[test]
    fn click_places_the_cursor() {
        let (mut editor, mut mapper, mut clipboard, metrics, ctx) = mapper_parts();
        editor.set_text("hello\nworld");

        let line_height = metrics.line_height(ctx.font_size);
        let input = InputSnapshot {
            mouse_clicked: true,
            mouse_pos: Vec2::new(ctx.origin.x + 200.0, ctx.origin.y + line_height * 1.5),
            time_ms: 1000,
            ..InputSnapshot::default()
        };
        mapper.process(&mut editor, &input, &mut clipboard, &metrics, &ctx);

        assert_eq!(editor.cursor_position().line, 1);
    }
}
