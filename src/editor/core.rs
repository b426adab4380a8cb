//! The editor core: edit operations, selection, undo, colorization
//! and error markers, glued to the DLX front-end through a reparse
//! callback.
//!
//! Everything here is synchronous and single-threaded. Any operation
//! that changes text re-lexes, re-parses and re-colors the buffer
//! before it returns, so an observer never sees glyph colors that
//! disagree with the text. Mutating operations are no-ops in
//! read-only mode; out-of-range coordinates are sanitized, never
//! rejected.

use std::collections::{BTreeMap, BTreeSet};

use crate::program::ParsedProgram;

use super::buffer::{
    is_utf8_continuation, utf8_length, Coordinates, Glyph, TextBuffer,
};
use super::host::Clipboard;
use super::palette::{Palette, PaletteIndex, DARK_PALETTE};
use super::undo::{BytePosition, RecordedState, UndoLog, UndoRecord};
use crate::lexer::{Token, TokenKind};

/// Re-parses the buffer contents after every text change. Injected at
/// construction so the embedding emulator can observe every program.
pub type ParseCallback = Box<dyn FnMut(&str) -> ParsedProgram>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    #[default]
    Normal,
    Word,
    Line,
}

/// Cursor and selection in visual coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EditorState {
    pub cursor: Coordinates,
    pub selection_start: Coordinates,
    pub selection_end: Coordinates,
}

pub struct CodeEditor {
    buffer: TextBuffer,
    state: EditorState,
    interactive_start: Coordinates,
    interactive_end: Coordinates,
    selection_mode: SelectionMode,
    undo: UndoLog,
    program: ParsedProgram,
    on_text_changed: ParseCallback,
    error_markers: BTreeMap<u32, String>,
    breakpoints: BTreeSet<u32>,
    overwrite: bool,
    read_only: bool,
    colorizer_enabled: bool,
    show_whitespaces: bool,
    palette: Palette,
    text_changed: bool,
    cursor_position_changed: bool,
    scroll_to_top: bool,
    scroll_to_cursor: bool,
    within_render: bool,
}

impl CodeEditor {
    /// `on_text_changed` is invoked with the full buffer text after
    /// every mutation; the returned program drives colorization and
    /// error markers.
    pub fn new(on_text_changed: ParseCallback) -> CodeEditor {
        let mut editor = CodeEditor {
            buffer: TextBuffer::new(),
            state: EditorState::default(),
            interactive_start: Coordinates::default(),
            interactive_end: Coordinates::default(),
            selection_mode: SelectionMode::Normal,
            undo: UndoLog::new(),
            program: ParsedProgram::default(),
            on_text_changed,
            error_markers: BTreeMap::new(),
            breakpoints: BTreeSet::new(),
            overwrite: false,
            read_only: false,
            colorizer_enabled: true,
            show_whitespaces: false,
            palette: DARK_PALETTE,
            text_changed: true,
            cursor_position_changed: false,
            scroll_to_top: false,
            scroll_to_cursor: false,
            within_render: false,
        };

        editor.refresh_after_text_change();
        editor
    }

    /// An editor wired straight to the crate's own parser.
    pub fn standalone() -> CodeEditor {
        CodeEditor::new(Box::new(|source| ParsedProgram::parse(source)))
    }

    // Whole-buffer operations. These reset the undo log.

    pub fn set_text(&mut self, text: &str) {
        self.buffer.set_text(text);
        self.reset_state();

        self.undo.clear();
        self.text_changed = true;
        self.scroll_to_top = true;

        self.refresh_after_text_change();
    }

    pub fn set_text_lines<S: AsRef<str>>(&mut self, lines: &[S]) {
        let joined = lines
            .iter()
            .map(|line| line.as_ref())
            .collect::<Vec<_>>()
            .join("\n");

        self.set_text(&joined);
    }

    pub fn get_text(&self) -> String {
        self.buffer.text()
    }

    pub fn get_text_lines(&self) -> Vec<String> {
        self.buffer.text_lines()
    }

    pub fn get_selected_text(&self) -> String {
        self.buffer
            .text_range(self.state.selection_start, self.state.selection_end)
    }

    pub fn get_current_line_text(&self) -> String {
        self.buffer.line_text(self.cursor_position().line as usize)
    }

    pub fn total_lines(&self) -> usize {
        self.buffer.line_count()
    }

    /// Empties the buffer, journaling the removed content.
    pub fn clear_text(&mut self) {
        if self.read_only || self.buffer.is_empty() {
            return;
        }

        let mut record = self.begin_record();
        record.removed = self.get_text();
        record.removed_start = BytePosition::new(0, 0);
        let last_line = self.buffer.line_count() - 1;
        record.removed_end =
            BytePosition::new(last_line, self.buffer.line(last_line).map_or(0, |l| l.len()));

        self.buffer.set_text("");
        self.reset_state();
        self.text_changed = true;

        self.finish_record(record);
        self.refresh_after_text_change();
    }

    /// Inserts `text` at the cursor, journaling one record.
    pub fn insert_text(&mut self, text: &str) {
        if self.read_only {
            return;
        }

        let text = TextBuffer::sanitize_input(text);
        if text.is_empty() {
            return;
        }

        let mut record = self.begin_record();

        let position = self.cursor_position();
        record.added = text.clone();
        record.added_start = self.byte_position(position);

        let end = self.insert_text_internal(position, &text);
        record.added_end = self.byte_position(end);

        self.set_selection(end, end, SelectionMode::Normal);
        self.set_cursor_position(end);

        self.finish_record(record);
        self.refresh_after_text_change();
    }

    /// Types one scalar: replaces the selection, honors overwrite mode
    /// and auto-indents after a newline. A tab with a multi-line
    /// selection indents (or, with `shift`, outdents) the covered
    /// lines instead.
    pub fn enter_character(&mut self, character: char, shift: bool) {
        if self.read_only || character == '\0' {
            return;
        }
        if character != '\n' && character != '\t' && (character as u32) < 0x20 {
            return;
        }

        let mut record = self.begin_record();
        let had_selection = self.has_selection();

        if had_selection {
            let block_indent = character == '\t'
                && (self.state.selection_start.column == 0
                    || self.state.selection_start.line != self.state.selection_end.line);

            if block_indent {
                self.indent_selection(shift, record);
                return;
            }

            record.removed = self.get_selected_text();
            record.removed_start = self.byte_position(self.state.selection_start);
            record.removed_end = self.byte_position(self.state.selection_end);
            self.delete_selection();
        }

        let coord = self.cursor_position();
        record.added_start = self.byte_position(coord);

        if character == '\n' {
            let line_index = coord.line as usize;
            let cursor_index = self.buffer.char_index(coord);

            // The new line inherits the leading whitespace before the
            // cursor.
            let mut inserted = String::from("\n");
            if let Some(line) = self.buffer.line(line_index) {
                for glyph in line.iter().take(cursor_index) {
                    if glyph.byte == b' ' || glyph.byte == b'\t' {
                        inserted.push(glyph.byte as char);
                    } else {
                        break;
                    }
                }
            }

            record.added = inserted.clone();
            let end = self.insert_text_internal(coord, &inserted);
            self.set_cursor_position(end);
            self.set_selection(end, end, SelectionMode::Normal);
        } else {
            let mut encoded = [0u8; 4];
            let encoded = character.encode_utf8(&mut encoded);

            let line_index = coord.line as usize;
            let cursor_index = self.buffer.char_index(coord);

            // Overwrite replaces the scalar under the cursor; over a
            // tab that shrinks the line visually, no padding happens.
            // Replacing a selection already removed text, so overwrite
            // does not apply on top of it.
            if self.overwrite && !had_selection {
                if let Some(line) = self.buffer.line(line_index) {
                    if cursor_index < line.len() {
                        let width = utf8_length(line[cursor_index].byte);
                        let removed: Vec<u8> = line
                            [cursor_index..(cursor_index + width).min(line.len())]
                            .iter()
                            .map(|glyph| glyph.byte)
                            .collect();

                        record.removed = String::from_utf8_lossy(&removed).into_owned();
                        record.removed_start = BytePosition::new(line_index, cursor_index);
                        record.removed_end =
                            BytePosition::new(line_index, cursor_index + removed.len());

                        self.buffer.delete_range_bytes(
                            line_index,
                            cursor_index,
                            line_index,
                            cursor_index + removed.len(),
                        );
                    }
                }
            }

            record.added = encoded.to_string();
            let mut line = line_index;
            let mut index = cursor_index;
            self.buffer.insert_text_at(&mut line, &mut index, encoded);

            let end = Coordinates::new(line as i32, self.buffer.char_column(line, index));
            self.set_cursor_position(end);
        }

        self.text_changed = true;
        record.added_end = self.byte_position(self.cursor_position());

        self.finish_record(record);
        self.ensure_cursor_visible();
        self.refresh_after_text_change();
    }

    /// Deletes the selection, or one scalar to the left, joining lines
    /// at column 0.
    pub fn backspace(&mut self) {
        if self.read_only {
            return;
        }

        let mut record = self.begin_record();

        if self.has_selection() {
            record.removed = self.get_selected_text();
            record.removed_start = self.byte_position(self.state.selection_start);
            record.removed_end = self.byte_position(self.state.selection_end);
            self.delete_selection();
        } else {
            let position = self.cursor_position();
            self.set_cursor_position(position);

            if position.column == 0 {
                if position.line == 0 {
                    return;
                }

                let line_index = position.line as usize;
                let previous_length = self.buffer.line(line_index - 1).map_or(0, |l| l.len());
                let previous_column = self.buffer.line_max_column(line_index - 1);

                record.removed = String::from("\n");
                record.removed_start = BytePosition::new(line_index - 1, previous_length);
                record.removed_end = BytePosition::new(line_index, 0);

                self.buffer
                    .delete_range_bytes(line_index - 1, previous_length, line_index, 0);
                self.shift_annotations_on_remove(line_index, 1);

                self.state.cursor = Coordinates::new(position.line - 1, previous_column);
            } else {
                let line_index = position.line as usize;
                let cursor_index = self.buffer.char_index(position);
                debug_assert!(cursor_index > 0);

                let mut start = cursor_index - 1;
                if let Some(line) = self.buffer.line(line_index) {
                    while start > 0 && is_utf8_continuation(line[start].byte) {
                        start -= 1;
                    }

                    let removed: Vec<u8> = line[start..cursor_index]
                        .iter()
                        .map(|glyph| glyph.byte)
                        .collect();
                    record.removed = String::from_utf8_lossy(&removed).into_owned();
                }
                record.removed_start = BytePosition::new(line_index, start);
                record.removed_end = BytePosition::new(line_index, cursor_index);

                self.buffer
                    .delete_range_bytes(line_index, start, line_index, cursor_index);

                self.state.cursor =
                    Coordinates::new(position.line, self.buffer.char_column(line_index, start));
            }

            self.text_changed = true;
            self.sanitize_selection();
            self.ensure_cursor_visible();
        }

        self.finish_record(record);
        self.refresh_after_text_change();
    }

    /// Deletes the selection, or one scalar to the right, joining the
    /// next line at line end.
    pub fn delete(&mut self) {
        if self.read_only {
            return;
        }

        let mut record = self.begin_record();

        if self.has_selection() {
            record.removed = self.get_selected_text();
            record.removed_start = self.byte_position(self.state.selection_start);
            record.removed_end = self.byte_position(self.state.selection_end);
            self.delete_selection();
        } else {
            let position = self.cursor_position();
            self.set_cursor_position(position);
            let line_index = position.line as usize;

            if position.column == self.buffer.line_max_column(line_index) {
                if line_index + 1 >= self.buffer.line_count() {
                    return;
                }

                let line_length = self.buffer.line(line_index).map_or(0, |l| l.len());
                record.removed = String::from("\n");
                record.removed_start = BytePosition::new(line_index, line_length);
                record.removed_end = BytePosition::new(line_index + 1, 0);

                self.buffer
                    .delete_range_bytes(line_index, line_length, line_index + 1, 0);
                self.shift_annotations_on_remove(line_index + 1, 1);
            } else {
                let cursor_index = self.buffer.char_index(position);
                let width = self
                    .buffer
                    .line(line_index)
                    .and_then(|line| line.get(cursor_index))
                    .map(|glyph| utf8_length(glyph.byte));

                let width = match width {
                    Some(width) => width,
                    None => return,
                };

                if let Some(line) = self.buffer.line(line_index) {
                    let removed: Vec<u8> = line
                        [cursor_index..(cursor_index + width).min(line.len())]
                        .iter()
                        .map(|glyph| glyph.byte)
                        .collect();
                    record.removed = String::from_utf8_lossy(&removed).into_owned();
                }
                record.removed_start = BytePosition::new(line_index, cursor_index);
                record.removed_end = BytePosition::new(line_index, cursor_index + width);

                self.buffer.delete_range_bytes(
                    line_index,
                    cursor_index,
                    line_index,
                    cursor_index + width,
                );
            }

            self.text_changed = true;
            self.sanitize_selection();
        }

        self.finish_record(record);
        self.refresh_after_text_change();
    }

    // Clipboard.

    /// Copies the selection, or the current line when nothing is
    /// selected.
    pub fn copy(&self, clipboard: &mut dyn Clipboard) {
        if self.has_selection() {
            clipboard.set(&self.get_selected_text());
        } else {
            clipboard.set(&self.get_current_line_text());
        }
    }

    /// Copy plus delete. Degrades to a plain copy in read-only mode;
    /// without a selection it is a no-op.
    pub fn cut(&mut self, clipboard: &mut dyn Clipboard) {
        if self.read_only {
            self.copy(clipboard);
            return;
        }
        if !self.has_selection() {
            return;
        }

        let mut record = self.begin_record();
        record.removed = self.get_selected_text();
        record.removed_start = self.byte_position(self.state.selection_start);
        record.removed_end = self.byte_position(self.state.selection_end);

        self.copy(clipboard);
        self.delete_selection();

        self.finish_record(record);
        self.refresh_after_text_change();
    }

    /// Inserts the clipboard at the cursor, replacing any selection.
    pub fn paste(&mut self, clipboard: &mut dyn Clipboard) {
        if self.read_only {
            return;
        }

        let text = TextBuffer::sanitize_input(&clipboard.get());
        if text.is_empty() {
            return;
        }

        let mut record = self.begin_record();

        if self.has_selection() {
            record.removed = self.get_selected_text();
            record.removed_start = self.byte_position(self.state.selection_start);
            record.removed_end = self.byte_position(self.state.selection_end);
            self.delete_selection();
        }

        let position = self.cursor_position();
        record.added = text.clone();
        record.added_start = self.byte_position(position);

        let end = self.insert_text_internal(position, &text);
        record.added_end = self.byte_position(end);

        self.set_selection(end, end, SelectionMode::Normal);
        self.set_cursor_position(end);

        self.finish_record(record);
        self.refresh_after_text_change();
    }

    // Undo / redo.

    pub fn can_undo(&self) -> bool {
        !self.read_only && self.undo.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        !self.read_only && self.undo.can_redo()
    }

    pub fn undo(&mut self, steps: u32) {
        for _ in 0..steps {
            if !self.can_undo() {
                break;
            }

            let record = self.undo.back().expect("checked by can_undo");
            self.apply_undo(&record);
        }

        self.refresh_after_text_change();
    }

    pub fn redo(&mut self, steps: u32) {
        for _ in 0..steps {
            if !self.can_redo() {
                break;
            }

            let record = self.undo.forward().expect("checked by can_redo");
            self.apply_redo(&record);
        }

        self.refresh_after_text_change();
    }

    fn apply_undo(&mut self, record: &UndoRecord) {
        if !record.added.is_empty() {
            self.buffer.delete_range_bytes(
                record.added_start.line,
                record.added_start.index,
                record.added_end.line,
                record.added_end.index,
            );

            let removed_lines = record.added_end.line - record.added_start.line;
            if removed_lines > 0 {
                self.shift_annotations_on_remove(record.added_start.line + 1, removed_lines);
            }
            self.text_changed = true;
        }

        if !record.removed.is_empty() {
            let mut line = record.removed_start.line;
            let mut index = record.removed_start.index;
            let added = self.buffer.insert_text_at(&mut line, &mut index, &record.removed);

            if added > 0 {
                self.shift_annotations_on_insert(record.removed_start.line + 1, added);
            }
            self.text_changed = true;
        }

        self.apply_recorded_state(record.before);
        self.ensure_cursor_visible();
    }

    fn apply_redo(&mut self, record: &UndoRecord) {
        if !record.removed.is_empty() {
            self.buffer.delete_range_bytes(
                record.removed_start.line,
                record.removed_start.index,
                record.removed_end.line,
                record.removed_end.index,
            );

            let removed_lines = record.removed_end.line - record.removed_start.line;
            if removed_lines > 0 {
                self.shift_annotations_on_remove(record.removed_start.line + 1, removed_lines);
            }
            self.text_changed = true;
        }

        if !record.added.is_empty() {
            let mut line = record.added_start.line;
            let mut index = record.added_start.index;
            let added = self.buffer.insert_text_at(&mut line, &mut index, &record.added);

            if added > 0 {
                self.shift_annotations_on_insert(record.added_start.line + 1, added);
            }
            self.text_changed = true;
        }

        self.apply_recorded_state(record.after);
        self.ensure_cursor_visible();
    }

    // Cursor movement. With `select`, the interactive endpoint the
    // cursor came from follows it.

    pub fn move_up(&mut self, amount: u32, select: bool) {
        if amount == 0 {
            return;
        }

        let old = self.state.cursor;
        let last_line = self.buffer.line_count() as i32 - 1;
        self.state.cursor.line = (old.line - amount as i32).clamp(0, last_line);

        // Past the first line the cursor lands at the line start.
        if amount as i32 > old.line {
            self.state.cursor.column = 0;
        }

        self.track_interactive(old, select, SelectionMode::Normal);
    }

    pub fn move_down(&mut self, amount: u32, select: bool) {
        if amount == 0 {
            return;
        }

        let old = self.state.cursor;
        let last_line = self.buffer.line_count() as i32 - 1;
        self.state.cursor.line = (old.line + amount as i32).clamp(0, last_line);

        // Past the last line the cursor lands at the line end.
        if old.line == last_line {
            self.state.cursor.column = self.buffer.line_max_column(last_line as usize);
        }

        self.track_interactive(old, select, SelectionMode::Normal);
    }

    pub fn move_left(&mut self, amount: u32, select: bool, word_mode: bool) {
        if amount == 0 {
            return;
        }

        let old = self.state.cursor;
        self.state.cursor = self.cursor_position();

        let mut line = self.state.cursor.line as usize;
        let mut index = self.buffer.char_index(self.state.cursor);

        for _ in 0..amount {
            if index == 0 {
                if line > 0 {
                    line -= 1;
                    index = self.buffer.line(line).map_or(0, |l| l.len());
                }
            } else {
                index -= 1;
                if let Some(current) = self.buffer.line(line) {
                    while index > 0 && is_utf8_continuation(current[index].byte) {
                        index -= 1;
                    }
                }
            }

            self.state.cursor =
                Coordinates::new(line as i32, self.buffer.char_column(line, index));

            if word_mode {
                self.state.cursor = self
                    .buffer
                    .find_word_start(self.state.cursor, self.colorizer_enabled);
                index = self.buffer.char_index(self.state.cursor);
            }
        }

        let mode = if select && word_mode {
            SelectionMode::Word
        } else {
            SelectionMode::Normal
        };
        self.track_interactive(old, select, mode);
    }

    pub fn move_right(&mut self, amount: u32, select: bool, word_mode: bool) {
        if amount == 0 || self.state.cursor.line as usize >= self.buffer.line_count() {
            return;
        }

        let old = self.state.cursor;
        self.state.cursor = self.cursor_position();

        let mut index = self.buffer.char_index(self.state.cursor);

        for _ in 0..amount {
            let line = self.state.cursor.line as usize;
            let line_length = self.buffer.line(line).map_or(0, |l| l.len());

            if index >= line_length {
                if line + 1 >= self.buffer.line_count() {
                    break;
                }
                self.state.cursor = Coordinates::new(line as i32 + 1, 0);
                index = 0;
            } else {
                let byte = self.buffer.line(line).expect("in range")[index].byte;
                index += utf8_length(byte);
                self.state.cursor =
                    Coordinates::new(line as i32, self.buffer.char_column(line, index));

                if word_mode {
                    self.state.cursor = self.buffer.find_next_word(self.state.cursor);
                    index = self.buffer.char_index(self.state.cursor);
                }
            }
        }

        let mode = if select && word_mode {
            SelectionMode::Word
        } else {
            SelectionMode::Normal
        };
        self.track_interactive(old, select, mode);
    }

    pub fn move_top(&mut self, select: bool) {
        let old = self.state.cursor;
        self.set_cursor_position(Coordinates::new(0, 0));

        if select {
            self.interactive_start = self.state.cursor;
            self.interactive_end = old;
        } else {
            self.interactive_start = self.state.cursor;
            self.interactive_end = self.state.cursor;
        }
        self.set_selection(self.interactive_start, self.interactive_end, SelectionMode::Normal);
        self.ensure_cursor_visible();
    }

    pub fn move_bottom(&mut self, select: bool) {
        let old = self.state.cursor;
        let last_line = self.buffer.line_count() - 1;
        let target = Coordinates::new(last_line as i32, self.buffer.line_max_column(last_line));
        self.set_cursor_position(target);

        if select {
            self.interactive_start = old;
            self.interactive_end = target;
        } else {
            self.interactive_start = target;
            self.interactive_end = target;
        }
        self.set_selection(self.interactive_start, self.interactive_end, SelectionMode::Normal);
        self.ensure_cursor_visible();
    }

    pub fn move_home(&mut self, select: bool) {
        let old = self.state.cursor;
        self.set_cursor_position(Coordinates::new(old.line, 0));
        self.track_interactive(old, select, SelectionMode::Normal);
    }

    pub fn move_end(&mut self, select: bool) {
        let old = self.state.cursor;
        let column = self.buffer.line_max_column(old.line.max(0) as usize);
        self.set_cursor_position(Coordinates::new(old.line, column));
        self.track_interactive(old, select, SelectionMode::Normal);
    }

    fn track_interactive(&mut self, old: Coordinates, select: bool, mode: SelectionMode) {
        if select {
            if old == self.interactive_start {
                self.interactive_start = self.state.cursor;
            } else if old == self.interactive_end {
                self.interactive_end = self.state.cursor;
            } else if old < self.state.cursor {
                self.interactive_start = old;
                self.interactive_end = self.state.cursor;
            } else {
                self.interactive_start = self.state.cursor;
                self.interactive_end = old;
            }
        } else {
            self.interactive_start = self.state.cursor;
            self.interactive_end = self.state.cursor;
        }

        self.set_selection(self.interactive_start, self.interactive_end, mode);
        self.ensure_cursor_visible();
    }

    // Selection.

    pub fn set_selection(&mut self, start: Coordinates, end: Coordinates, mode: SelectionMode) {
        let old_start = self.state.selection_start;
        let old_end = self.state.selection_end;

        self.state.selection_start = self.buffer.sanitize(start);
        self.state.selection_end = self.buffer.sanitize(end);
        if self.state.selection_start > self.state.selection_end {
            std::mem::swap(&mut self.state.selection_start, &mut self.state.selection_end);
        }

        match mode {
            SelectionMode::Normal => {}
            SelectionMode::Word => {
                self.state.selection_start = self
                    .buffer
                    .find_word_start(self.state.selection_start, self.colorizer_enabled);

                if !self
                    .buffer
                    .is_on_word_boundary(self.state.selection_end, self.colorizer_enabled)
                {
                    let start = self
                        .buffer
                        .find_word_start(self.state.selection_end, self.colorizer_enabled);
                    self.state.selection_end =
                        self.buffer.find_word_end(start, self.colorizer_enabled);
                }
            }
            SelectionMode::Line => {
                self.state.selection_start =
                    Coordinates::new(self.state.selection_start.line, 0);
                let line = self.state.selection_end.line;
                self.state.selection_end =
                    Coordinates::new(line, self.buffer.line_max_column(line.max(0) as usize));
            }
        }

        if self.state.selection_start != old_start || self.state.selection_end != old_end {
            self.cursor_position_changed = true;
        }
    }

    pub fn set_selection_start(&mut self, position: Coordinates) {
        self.state.selection_start = self.buffer.sanitize(position);
        if self.state.selection_start > self.state.selection_end {
            std::mem::swap(&mut self.state.selection_start, &mut self.state.selection_end);
        }
    }

    pub fn set_selection_end(&mut self, position: Coordinates) {
        self.state.selection_end = self.buffer.sanitize(position);
        if self.state.selection_start > self.state.selection_end {
            std::mem::swap(&mut self.state.selection_start, &mut self.state.selection_end);
        }
    }

    pub fn select_all(&mut self) {
        self.set_selection(
            Coordinates::new(0, 0),
            Coordinates::new(self.buffer.line_count() as i32, 0),
            SelectionMode::Normal,
        );
    }

    pub fn select_word_under_cursor(&mut self) {
        let cursor = self.cursor_position();
        let start = self.buffer.find_word_start(cursor, self.colorizer_enabled);
        let end = self.buffer.find_word_end(cursor, self.colorizer_enabled);
        self.set_selection(start, end, SelectionMode::Normal);
    }

    pub fn clear_selection(&mut self) {
        self.set_selection(
            Coordinates::new(0, 0),
            Coordinates::new(0, 0),
            SelectionMode::Normal,
        );
    }

    pub fn has_selection(&self) -> bool {
        self.state.selection_end > self.state.selection_start
    }

    pub fn selection_start(&self) -> Coordinates {
        self.state.selection_start
    }

    pub fn selection_end(&self) -> Coordinates {
        self.state.selection_end
    }

    pub fn selection_mode(&self) -> SelectionMode {
        self.selection_mode
    }

    pub fn set_selection_mode(&mut self, mode: SelectionMode) {
        self.selection_mode = mode;
    }

    /// Places cursor and both interactive endpoints, as a mouse click
    /// does.
    pub fn place_cursor(&mut self, position: Coordinates, mode: SelectionMode) {
        let position = self.buffer.sanitize(position);
        self.state.cursor = position;
        self.interactive_start = position;
        self.interactive_end = position;
        self.selection_mode = mode;
        self.set_selection(position, position, mode);
        self.cursor_position_changed = true;
    }

    /// Extends the interactive selection to `position`, as a mouse
    /// drag does.
    pub fn drag_cursor(&mut self, position: Coordinates) {
        let position = self.buffer.sanitize(position);
        self.state.cursor = position;
        self.interactive_end = position;
        self.set_selection(self.interactive_start, self.interactive_end, self.selection_mode);
    }

    // Cursor.

    /// The sanitized cursor position.
    pub fn cursor_position(&self) -> Coordinates {
        self.buffer.sanitize(self.state.cursor)
    }

    pub fn set_cursor_position(&mut self, position: Coordinates) {
        let position = self.buffer.sanitize(position);

        if self.state.cursor != position {
            self.state.cursor = position;
            self.cursor_position_changed = true;
            self.ensure_cursor_visible();
        }
    }

    pub fn state(&self) -> EditorState {
        EditorState {
            cursor: self.cursor_position(),
            selection_start: self.state.selection_start,
            selection_end: self.state.selection_end,
        }
    }

    // Error markers and breakpoints, both keyed by 1-based line.

    pub fn add_error_marker(&mut self, line: u32, message: &str) {
        self.error_markers
            .entry(line)
            .and_modify(|existing| {
                existing.push('\n');
                existing.push_str(message);
            })
            .or_insert_with(|| message.to_string());
    }

    pub fn clear_error_markers(&mut self) {
        self.error_markers.clear();
    }

    pub fn error_markers(&self) -> &BTreeMap<u32, String> {
        &self.error_markers
    }

    pub fn set_error_markers(&mut self, markers: BTreeMap<u32, String>) {
        self.error_markers = markers;
    }

    pub fn add_breakpoint(&mut self, line: u32) -> bool {
        self.breakpoints.insert(line)
    }

    pub fn remove_breakpoint(&mut self, line: u32) -> bool {
        self.breakpoints.remove(&line)
    }

    pub fn toggle_breakpoint(&mut self, line: u32) -> bool {
        if !self.breakpoints.remove(&line) {
            self.breakpoints.insert(line);
            return true;
        }
        false
    }

    pub fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
    }

    pub fn breakpoints(&self) -> &BTreeSet<u32> {
        &self.breakpoints
    }

    pub fn set_breakpoints(&mut self, breakpoints: BTreeSet<u32>) {
        self.breakpoints = breakpoints;
    }

    // Options.

    pub fn tab_size(&self) -> u8 {
        self.buffer.tab_size()
    }

    /// Changes the tab size, keeping cursor and selection on the same
    /// glyphs (their byte positions survive, their columns change).
    pub fn set_tab_size(&mut self, tab_size: u8) {
        let cursor = self.byte_position(self.state.cursor);
        let start = self.byte_position(self.state.selection_start);
        let end = self.byte_position(self.state.selection_end);

        self.buffer.set_tab_size(tab_size);

        self.state.cursor = self.visual_position(cursor);
        self.state.selection_start = self.visual_position(start);
        self.state.selection_end = self.visual_position(end);
    }

    pub fn is_overwrite(&self) -> bool {
        self.overwrite
    }

    pub fn set_overwrite(&mut self, overwrite: bool) {
        self.overwrite = overwrite;
    }

    pub fn toggle_overwrite(&mut self) {
        self.overwrite = !self.overwrite;
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn is_colorizer_enabled(&self) -> bool {
        self.colorizer_enabled
    }

    pub fn set_colorizer_enabled(&mut self, enabled: bool) {
        self.colorizer_enabled = enabled;
    }

    pub fn is_showing_whitespaces(&self) -> bool {
        self.show_whitespaces
    }

    pub fn set_show_whitespaces(&mut self, show: bool) {
        self.show_whitespaces = show;
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn set_palette(&mut self, palette: Palette) {
        self.palette = palette;
    }

    // Words.

    pub fn get_word_under_cursor(&self) -> String {
        self.get_word_at(self.cursor_position())
    }

    pub fn get_word_at(&self, position: Coordinates) -> String {
        let start = self.buffer.find_word_start(position, self.colorizer_enabled);
        let end = self.buffer.find_word_end(position, self.colorizer_enabled);
        self.buffer.text_range(start, end)
    }

    // Projections.

    pub fn buffer(&self) -> &TextBuffer {
        &self.buffer
    }

    /// The program parsed from the current buffer contents.
    pub fn program(&self) -> &ParsedProgram {
        &self.program
    }

    pub fn is_cursor_position_changed(&self) -> bool {
        self.cursor_position_changed
    }

    pub fn undo_log(&self) -> &UndoLog {
        &self.undo
    }

    // Render bookkeeping.

    pub(crate) fn set_within_render(&mut self, within: bool) {
        self.within_render = within;
        if within {
            self.cursor_position_changed = false;
        }
    }

    pub(crate) fn take_scroll_to_top(&mut self) -> bool {
        std::mem::take(&mut self.scroll_to_top)
    }

    pub(crate) fn take_scroll_to_cursor(&mut self) -> bool {
        std::mem::take(&mut self.scroll_to_cursor)
    }

    fn ensure_cursor_visible(&mut self) {
        // Outside a render pass the scroll correction is deferred to
        // the next frame.
        if !self.within_render {
            self.scroll_to_cursor = true;
        }
    }

    // Internals.

    fn reset_state(&mut self) {
        self.state = EditorState::default();
        self.interactive_start = Coordinates::default();
        self.interactive_end = Coordinates::default();
        self.selection_mode = SelectionMode::Normal;
    }

    fn byte_position(&self, position: Coordinates) -> BytePosition {
        let position = self.buffer.sanitize(position);
        BytePosition::new(position.line as usize, self.buffer.char_index(position))
    }

    fn visual_position(&self, position: BytePosition) -> Coordinates {
        Coordinates::new(
            position.line as i32,
            self.buffer.char_column(position.line, position.index),
        )
    }

    fn recorded_state(&self) -> RecordedState {
        RecordedState {
            cursor: self.byte_position(self.state.cursor),
            selection_start: self.byte_position(self.state.selection_start),
            selection_end: self.byte_position(self.state.selection_end),
        }
    }

    fn apply_recorded_state(&mut self, state: RecordedState) {
        self.state.cursor = self.buffer.sanitize(self.visual_position(state.cursor));
        self.state.selection_start = self
            .buffer
            .sanitize(self.visual_position(state.selection_start));
        self.state.selection_end = self
            .buffer
            .sanitize(self.visual_position(state.selection_end));

        if self.state.selection_start > self.state.selection_end {
            std::mem::swap(&mut self.state.selection_start, &mut self.state.selection_end);
        }

        self.interactive_start = self.state.selection_start;
        self.interactive_end = self.state.selection_end;
        self.cursor_position_changed = true;
    }

    fn begin_record(&self) -> UndoRecord {
        UndoRecord {
            before: self.recorded_state(),
            ..UndoRecord::default()
        }
    }

    fn finish_record(&mut self, mut record: UndoRecord) {
        if record.is_empty() {
            return;
        }

        record.after = self.recorded_state();
        self.undo.add(record);
    }

    fn sanitize_selection(&mut self) {
        self.state.selection_start = self.buffer.sanitize(self.state.selection_start);
        self.state.selection_end = self.buffer.sanitize(self.state.selection_end);
        if self.state.selection_start > self.state.selection_end {
            std::mem::swap(&mut self.state.selection_start, &mut self.state.selection_end);
        }
    }

    /// Inserts pre-sanitized text at a visual position, returning the
    /// end of the insertion.
    fn insert_text_internal(&mut self, position: Coordinates, text: &str) -> Coordinates {
        let start = self.byte_position(position);
        let mut line = start.line;
        let mut index = start.index;

        let added = self.buffer.insert_text_at(&mut line, &mut index, text);
        if added > 0 {
            self.shift_annotations_on_insert(start.line + 1, added);
        }

        self.text_changed = true;
        Coordinates::new(line as i32, self.buffer.char_column(line, index))
    }

    fn delete_selection(&mut self) {
        if !self.has_selection() {
            return;
        }

        let start = self.byte_position(self.state.selection_start);
        let end = self.byte_position(self.state.selection_end);

        self.buffer
            .delete_range_bytes(start.line, start.index, end.line, end.index);

        if end.line > start.line {
            self.shift_annotations_on_remove(start.line + 1, end.line - start.line);
        }

        let anchor = self.visual_position(start);
        self.set_selection(anchor, anchor, SelectionMode::Normal);
        self.set_cursor_position(anchor);
        self.text_changed = true;
    }

    /// Block indent / outdent for a tab typed over a multi-line
    /// selection. Consumes and journals `record`.
    fn indent_selection(&mut self, outdent: bool, mut record: UndoRecord) {
        let original_end = self.state.selection_end;

        let start = Coordinates::new(self.state.selection_start.line, 0);
        let mut end = self.state.selection_end;

        // A selection ending at column 0 does not cover that line.
        if end.column == 0 && end.line > 0 {
            end.line -= 1;
        }
        let last_line = self.buffer.line_count() as i32 - 1;
        end.line = end.line.min(last_line);
        end.column = self.buffer.line_max_column(end.line as usize);

        record.removed = self.buffer.text_range(start, end);
        record.removed_start = self.byte_position(start);
        record.removed_end = self.byte_position(end);

        let mut modified = false;
        let tab_size = self.buffer.tab_size() as usize;

        for line_index in start.line as usize..=end.line as usize {
            let line = match self.buffer.line_mut(line_index) {
                Some(line) => line,
                None => continue,
            };

            if outdent {
                if line.is_empty() {
                    continue;
                }

                if line[0].byte == b'\t' {
                    line.remove(0);
                    modified = true;
                } else {
                    let mut removed = 0;
                    while removed < tab_size && !line.is_empty() && line[0].byte == b' ' {
                        line.remove(0);
                        removed += 1;
                        modified = true;
                    }
                }
            } else {
                line.insert(0, Glyph::new(b'\t', PaletteIndex::Default));
                modified = true;
            }
        }

        if !modified {
            return;
        }

        let new_end = Coordinates::new(end.line, self.buffer.line_max_column(end.line as usize));
        record.added = self.buffer.text_range(start, new_end);
        record.added_start = self.byte_position(start);
        record.added_end = self.byte_position(new_end);

        self.state.selection_start = start;
        self.state.selection_end = if original_end.column != 0 {
            new_end
        } else {
            Coordinates::new(original_end.line, 0)
        };
        self.state.cursor = self.buffer.sanitize(self.state.cursor);

        self.text_changed = true;
        self.finish_record(record);
        self.ensure_cursor_visible();
        self.refresh_after_text_change();
    }

    /// 1-based marker/breakpoint lines shift when buffer lines appear.
    /// `first_new_line` is the 0-based index of the first added line.
    fn shift_annotations_on_insert(&mut self, first_new_line: usize, count: usize) {
        let threshold = first_new_line as u32 + 1;
        let count = count as u32;

        self.error_markers = std::mem::take(&mut self.error_markers)
            .into_iter()
            .map(|(line, message)| {
                if line >= threshold {
                    (line + count, message)
                } else {
                    (line, message)
                }
            })
            .collect();

        self.breakpoints = std::mem::take(&mut self.breakpoints)
            .into_iter()
            .map(|line| if line >= threshold { line + count } else { line })
            .collect();
    }

    /// `first_removed_line` is the 0-based index of the first removed
    /// line; annotations on removed lines are dropped.
    fn shift_annotations_on_remove(&mut self, first_removed_line: usize, count: usize) {
        let first = first_removed_line as u32 + 1;
        let count = count as u32;

        self.error_markers = std::mem::take(&mut self.error_markers)
            .into_iter()
            .filter_map(|(line, message)| {
                if line < first {
                    Some((line, message))
                } else if line < first + count {
                    None
                } else {
                    Some((line - count, message))
                }
            })
            .collect();

        self.breakpoints = std::mem::take(&mut self.breakpoints)
            .into_iter()
            .filter_map(|line| {
                if line < first {
                    Some(line)
                } else if line < first + count {
                    None
                } else {
                    Some(line - count)
                }
            })
            .collect();
    }

    /// Reparses and recolors after a text change; called at the end of
    /// every mutating operation so render-time state is consistent.
    fn refresh_after_text_change(&mut self) {
        if !self.text_changed {
            return;
        }

        let text = self.buffer.text();
        self.program = (self.on_text_changed)(&text);

        self.colorize();

        self.error_markers.clear();
        let markers: Vec<(u32, String)> = self
            .program
            .parse_errors
            .iter()
            .map(|error| (error.line, error.construct_message()))
            .collect();
        for (line, message) in markers {
            self.add_error_marker(line, &message);
        }

        self.text_changed = false;
    }

    /// Repaints every glyph from the current token stream. A pure
    /// function of the buffer text; tolerant of tokens that do not
    /// line up with the glyphs.
    pub fn colorize(&mut self) {
        for line in self.buffer.lines_mut() {
            for glyph in line.iter_mut() {
                glyph.color = PaletteIndex::Default;
            }
        }

        let CodeEditor {
            buffer, program, ..
        } = self;

        for token in &program.tokens {
            paint_token(buffer, token);
        }
    }
}

fn paint_token(buffer: &mut TextBuffer, token: &Token) {
    let color = match token.kind {
        TokenKind::Comment => PaletteIndex::Comment,
        TokenKind::ImmediateInteger | TokenKind::IntegerLiteral => PaletteIndex::IntegerLiteral,
        TokenKind::OpCode => PaletteIndex::OpCode,
        TokenKind::RegisterInt | TokenKind::RegisterFloat | TokenKind::RegisterStatus => {
            PaletteIndex::Register
        }
        TokenKind::NewLine => return,
        _ => return,
    };

    if token.line == 0 || token.column == 0 {
        return;
    }

    let line = match buffer.line_mut(token.line as usize - 1) {
        Some(line) => line,
        None => return,
    };

    let start = token.column as usize - 1;
    let end = (start + token.length as usize).min(line.len());

    for glyph in line.get_mut(start..end).into_iter().flatten() {
        glyph.color = color;
    }
}
