//! The glyph buffer and its three coordinate spaces.
//!
//! A [TextBuffer] stores lines of [Glyph]s, one glyph per UTF-8 byte;
//! a scalar of N bytes occupies N adjacent glyphs sharing a color.
//! Three coordinate spaces must be kept apart:
//!
//! * **byte index** — physical position of a byte within its line;
//! * **character index** — byte index snapped to a UTF-8 lead byte;
//! * **visual column** — tab-expanded column, what every public
//!   [Coordinates] value means.
//!
//! The buffer always contains at least one line; the empty document is
//! one empty line.

use std::fmt;

use super::palette::PaletteIndex;

pub const MIN_TAB_SIZE: u8 = 1;
pub const MAX_TAB_SIZE: u8 = 32;

/// A visual `(line, column)` position, tab-expanded, both 0-based.
/// Ordered lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Coordinates {
    pub line: i32,
    pub column: i32,
}

impl Coordinates {
    pub const fn new(line: i32, column: i32) -> Coordinates {
        Coordinates { line, column }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.line, self.column)
    }
}

/// One UTF-8 byte paired with a color index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Glyph {
    pub byte: u8,
    pub color: PaletteIndex,
}

impl Glyph {
    pub fn new(byte: u8, color: PaletteIndex) -> Glyph {
        Glyph { byte, color }
    }
}

pub type Line = Vec<Glyph>;

/// Byte length of the UTF-8 sequence starting with `byte`. This is the
/// single scalar-walking primitive; everything else steps through it.
/// Surrogate halves cannot occur: they are rejected at input ingest and
/// `char` cannot encode them.
pub(crate) fn utf8_length(byte: u8) -> usize {
    if byte & 0xF8 == 0xF0 {
        4
    } else if byte & 0xF0 == 0xE0 {
        3
    } else if byte & 0xE0 == 0xC0 {
        2
    } else {
        1
    }
}

pub(crate) fn is_utf8_continuation(byte: u8) -> bool {
    byte & 0xC0 == 0x80
}

fn is_blank_byte(byte: u8) -> bool {
    byte == b' ' || byte == b'\t'
}

/// Character class used for word boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Space,
    Word,
    Colored(PaletteIndex),
}

fn class_of(glyph: Glyph, use_colors: bool) -> CharClass {
    if is_blank_byte(glyph.byte) {
        CharClass::Space
    } else if use_colors {
        CharClass::Colored(glyph.color)
    } else {
        CharClass::Word
    }
}

#[derive(Debug, Clone)]
pub struct TextBuffer {
    lines: Vec<Line>,
    tab_size: u8,
}

impl TextBuffer {
    pub fn new() -> TextBuffer {
        TextBuffer {
            lines: vec![Line::new()],
            tab_size: 4,
        }
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line(&self, line: usize) -> Option<&Line> {
        self.lines.get(line)
    }

    pub(crate) fn line_mut(&mut self, line: usize) -> Option<&mut Line> {
        self.lines.get_mut(line)
    }

    pub(crate) fn lines_mut(&mut self) -> &mut Vec<Line> {
        &mut self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.len() == 1 && self.lines[0].is_empty()
    }

    pub fn tab_size(&self) -> u8 {
        self.tab_size
    }

    /// Clamped to `[MIN_TAB_SIZE, MAX_TAB_SIZE]`. Only the visual
    /// column space changes; byte contents are untouched.
    pub fn set_tab_size(&mut self, tab_size: u8) {
        self.tab_size = tab_size.clamp(MIN_TAB_SIZE, MAX_TAB_SIZE);
    }

    /// How many columns a tab at `column` advances.
    pub fn tab_columns_at(&self, column: i32) -> i32 {
        let tab = self.tab_size as i32;
        tab - column.rem_euclid(tab)
    }

    /// Drops CR and every C0 control byte except `\n` and `\t`.
    pub(crate) fn sanitize_input(text: &str) -> String {
        text.chars()
            .filter(|&ch| ch == '\n' || ch == '\t' || ch >= ' ')
            .collect()
    }

    /// Replaces the whole buffer. `text` is sanitized on ingest.
    pub fn set_text(&mut self, text: &str) {
        self.lines.clear();
        self.lines.push(Line::new());

        for byte in Self::sanitize_input(text).bytes() {
            if byte == b'\n' {
                self.lines.push(Line::new());
            } else {
                self.lines
                    .last_mut()
                    .expect("buffer never empty")
                    .push(Glyph::new(byte, PaletteIndex::Default));
            }
        }
    }

    pub fn text(&self) -> String {
        let mut bytes = Vec::new();

        for (index, line) in self.lines.iter().enumerate() {
            if index > 0 {
                bytes.push(b'\n');
            }
            bytes.extend(line.iter().map(|glyph| glyph.byte));
        }

        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub fn line_text(&self, line: usize) -> String {
        let bytes: Vec<u8> = self
            .lines
            .get(line)
            .map(|line| line.iter().map(|glyph| glyph.byte).collect())
            .unwrap_or_default();

        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub fn text_lines(&self) -> Vec<String> {
        (0..self.lines.len())
            .map(|line| self.line_text(line))
            .collect()
    }

    /// Byte index within `at.line` of the glyph at visual column
    /// `at.column`, snapping into lead bytes.
    pub fn char_index(&self, at: Coordinates) -> usize {
        let line = match self.lines.get(at.line.max(0) as usize) {
            Some(line) => line,
            None => return 0,
        };

        let mut index = 0;
        let mut column = 0;

        while index < line.len() && column < at.column {
            if line[index].byte == b'\t' {
                column += self.tab_columns_at(column);
            } else {
                column += 1;
            }
            index += utf8_length(line[index].byte);
        }

        index.min(line.len())
    }

    /// Visual column of byte `index` within `line`.
    pub fn char_column(&self, line: usize, index: usize) -> i32 {
        let line = match self.lines.get(line) {
            Some(line) => line,
            None => return 0,
        };

        let mut column = 0;
        let mut i = 0;

        while i < index && i < line.len() {
            let byte = line[i].byte;
            if byte == b'\t' {
                column += self.tab_columns_at(column);
            } else {
                column += 1;
            }
            i += utf8_length(byte);
        }

        column
    }

    /// Number of codepoints on `line`.
    pub fn line_char_count(&self, line: usize) -> usize {
        let line = match self.lines.get(line) {
            Some(line) => line,
            None => return 0,
        };

        let mut count = 0;
        let mut i = 0;
        while i < line.len() {
            i += utf8_length(line[i].byte);
            count += 1;
        }

        count
    }

    /// The last reachable visual column on `line`.
    pub fn line_max_column(&self, line: usize) -> i32 {
        let index = self.lines.get(line).map(|l| l.len()).unwrap_or(0);
        self.char_column(line, index)
    }

    /// Clamps `at` into the buffer and snaps the column *down* to the
    /// nearest reachable column on its line.
    pub fn sanitize(&self, at: Coordinates) -> Coordinates {
        if at.line < 0 {
            return Coordinates::new(0, 0);
        }

        let last_line = self.lines.len() as i32 - 1;
        if at.line > last_line {
            return Coordinates::new(last_line, self.line_max_column(last_line as usize));
        }

        let line = &self.lines[at.line as usize];
        let mut column = 0;
        let mut index = 0;

        while index < line.len() {
            let width = if line[index].byte == b'\t' {
                self.tab_columns_at(column)
            } else {
                1
            };

            if column + width > at.column {
                break;
            }

            column += width;
            index += utf8_length(line[index].byte);
        }

        Coordinates::new(at.line, column)
    }

    /// One codepoint forward, wrapping to the next line at a line end.
    pub fn advance(&self, at: Coordinates) -> Coordinates {
        if (at.line as usize) >= self.lines.len() {
            return at;
        }

        let line = &self.lines[at.line as usize];
        let index = self.char_index(at);

        if index < line.len() {
            let next = index + utf8_length(line[index].byte);
            Coordinates::new(at.line, self.char_column(at.line as usize, next))
        } else if (at.line as usize) + 1 < self.lines.len() {
            Coordinates::new(at.line + 1, 0)
        } else {
            at
        }
    }

    /// The text between two visual coordinates, `\n`-joined across
    /// lines. Both endpoints are sanitized first.
    pub fn text_range(&self, start: Coordinates, end: Coordinates) -> String {
        let start = self.sanitize(start);
        let end = self.sanitize(end);

        if start >= end {
            return String::new();
        }

        let mut bytes = Vec::new();
        let mut line = start.line as usize;
        let mut index = self.char_index(start);
        let end_line = end.line as usize;
        let end_index = self.char_index(end);

        while line < end_line || (line == end_line && index < end_index) {
            let current = &self.lines[line];

            if index < current.len() {
                bytes.push(current[index].byte);
                index += 1;
            } else {
                line += 1;
                index = 0;
                bytes.push(b'\n');
            }
        }

        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Inserts sanitized text at a byte position, splitting lines at
    /// `\n`. `line`/`index` are updated to the end of the insertion.
    /// Returns the number of lines added.
    pub(crate) fn insert_text_at(
        &mut self,
        line: &mut usize,
        index: &mut usize,
        text: &str,
    ) -> usize {
        let mut lines_added = 0;

        for byte in text.bytes() {
            if byte == b'\n' {
                let tail: Line = {
                    let current = &mut self.lines[*line];
                    let at = (*index).min(current.len());
                    current.split_off(at)
                };
                self.lines.insert(*line + 1, tail);

                *line += 1;
                *index = 0;
                lines_added += 1;
            } else {
                let current = &mut self.lines[*line];
                let at = (*index).min(current.len());
                current.insert(at, Glyph::new(byte, PaletteIndex::Default));
                *index += 1;
            }
        }

        lines_added
    }

    /// Deletes the byte range between two `(line, index)` positions,
    /// joining the boundary lines when the range spans lines.
    pub(crate) fn delete_range_bytes(
        &mut self,
        start_line: usize,
        start_index: usize,
        end_line: usize,
        end_index: usize,
    ) {
        if start_line >= self.lines.len() {
            return;
        }
        let end_line = end_line.min(self.lines.len() - 1);

        if start_line == end_line {
            let line = &mut self.lines[start_line];
            let start = start_index.min(line.len());
            let end = end_index.min(line.len());
            if start < end {
                line.drain(start..end);
            }
            return;
        }

        let tail: Line = {
            let last = &self.lines[end_line];
            last[end_index.min(last.len())..].to_vec()
        };

        let first = &mut self.lines[start_line];
        first.truncate(start_index.min(first.len()));
        first.extend(tail);

        self.lines.drain(start_line + 1..=end_line);

        debug_assert!(!self.lines.is_empty());
    }

    // Word boundaries.

    /// True at line edges and wherever the character class changes.
    pub fn is_on_word_boundary(&self, at: Coordinates, use_colors: bool) -> bool {
        if at.line < 0 || at.line as usize >= self.lines.len() || at.column == 0 {
            return true;
        }

        let line = &self.lines[at.line as usize];
        let index = self.char_index(at);
        if index == 0 || index >= line.len() {
            return true;
        }

        let mut prev = index - 1;
        while prev > 0 && is_utf8_continuation(line[prev].byte) {
            prev -= 1;
        }

        class_of(line[index], use_colors) != class_of(line[prev], use_colors)
    }

    /// Walks left from `from` while the character class is stable.
    pub fn find_word_start(&self, from: Coordinates, use_colors: bool) -> Coordinates {
        let line = match self.lines.get(from.line.max(0) as usize) {
            Some(line) => line,
            None => return from,
        };

        let mut index = self.char_index(from);
        if index >= line.len() {
            if line.is_empty() {
                return from;
            }
            index = line.len() - 1;
            while index > 0 && is_utf8_continuation(line[index].byte) {
                index -= 1;
            }
        }

        let class = class_of(line[index], use_colors);

        while index > 0 {
            let mut prev = index - 1;
            while prev > 0 && is_utf8_continuation(line[prev].byte) {
                prev -= 1;
            }

            if class_of(line[prev], use_colors) != class {
                break;
            }
            index = prev;
        }

        Coordinates::new(from.line, self.char_column(from.line as usize, index))
    }

    /// Walks right from `from` while the character class is stable.
    pub fn find_word_end(&self, from: Coordinates, use_colors: bool) -> Coordinates {
        let line = match self.lines.get(from.line.max(0) as usize) {
            Some(line) => line,
            None => return from,
        };

        let mut index = self.char_index(from);
        if index >= line.len() {
            return from;
        }

        let class = class_of(line[index], use_colors);

        while index < line.len() && class_of(line[index], use_colors) == class {
            index += utf8_length(line[index].byte);
        }

        Coordinates::new(from.line, self.char_column(from.line as usize, index))
    }

    /// Skips the current word, then whitespace and punctuation, to the
    /// start of the next word, wrapping across lines.
    pub fn find_next_word(&self, from: Coordinates) -> Coordinates {
        let mut line = from.line.max(0) as usize;
        if line >= self.lines.len() {
            return from;
        }

        let mut index = self.char_index(from);

        let is_word_byte = |byte: u8| (byte as char).is_ascii_alphanumeric();

        // Leave the word under the cursor first.
        while index < self.lines[line].len() && is_word_byte(self.lines[line][index].byte) {
            index += utf8_length(self.lines[line][index].byte);
        }

        loop {
            let current = &self.lines[line];
            if index >= current.len() {
                line += 1;
                index = 0;

                if line >= self.lines.len() {
                    let last = self.lines.len() - 1;
                    return Coordinates::new(last as i32, self.line_max_column(last));
                }
                continue;
            }

            if is_word_byte(current[index].byte) {
                return Coordinates::new(line as i32, self.char_column(line, index));
            }

            index += utf8_length(current[index].byte);
        }
    }
}

impl Default for TextBuffer {
    fn default() -> TextBuffer {
        TextBuffer::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_with(text: &str) -> TextBuffer {
        let mut buffer = TextBuffer::new();
        buffer.set_text(text);
        buffer
    }

    #[test]
    fn empty_document_is_one_empty_line() {
        let buffer = TextBuffer::new();
        assert_eq!(buffer.line_count(), 1);
        assert!(buffer.is_empty());
        assert_eq!(buffer.text(), "");
    }

    #[test]
    fn set_text_drops_cr_and_controls() {
        let buffer = buffer_with("a\r\nb\x07c\td");
        assert_eq!(buffer.text(), "a\nbc\td");
        assert_eq!(buffer.line_count(), 2);
    }

    #[test]
    fn text_round_trips() {
        let text = "ADD R1, R2, R3\n\tJ loop\n";
        let buffer = buffer_with(text);
        assert_eq!(buffer.text(), text);
        assert_eq!(buffer.text_lines(), vec!["ADD R1, R2, R3", "\tJ loop", ""]);
        // I5: text == join('\n', lines).
        assert_eq!(buffer.text(), buffer.text_lines().join("\n"));
    }

    #[test]
    fn tab_expansion_in_columns() {
        let buffer = buffer_with("\tx");
        // Tab size 4: the tab spans columns 0..4, 'x' sits at 4.
        assert_eq!(buffer.char_column(0, 1), 4);
        assert_eq!(buffer.line_max_column(0), 5);

        let mut narrow = buffer_with("\tx");
        narrow.set_tab_size(2);
        assert_eq!(narrow.char_column(0, 1), 2);
    }

    #[test]
    fn char_index_column_round_trip() {
        let buffer = buffer_with("a\tbä c");

        // I6: every reachable coordinate round-trips exactly.
        let line_len = buffer.line(0).unwrap().len();
        let mut index = 0;
        while index <= line_len {
            let column = buffer.char_column(0, index);
            let coords = Coordinates::new(0, column);
            assert_eq!(buffer.char_index(coords), index.min(line_len));
            assert_eq!(buffer.char_column(0, buffer.char_index(coords)), column);
            if index == line_len {
                break;
            }
            index += utf8_length(buffer.line(0).unwrap()[index].byte);
        }
    }

    #[test]
    fn sanitize_clamps_and_snaps_down() {
        let buffer = buffer_with("\tx\nshort");

        // Past the last line.
        assert_eq!(
            buffer.sanitize(Coordinates::new(7, 0)),
            Coordinates::new(1, 5)
        );
        // Negative.
        assert_eq!(
            buffer.sanitize(Coordinates::new(-1, 3)),
            Coordinates::new(0, 0)
        );
        // Inside a tab: snapped down to the tab's start.
        assert_eq!(
            buffer.sanitize(Coordinates::new(0, 2)),
            Coordinates::new(0, 0)
        );
        // Exactly reachable columns survive.
        assert_eq!(
            buffer.sanitize(Coordinates::new(0, 4)),
            Coordinates::new(0, 4)
        );
        // Past the line end.
        assert_eq!(
            buffer.sanitize(Coordinates::new(0, 99)),
            Coordinates::new(0, 5)
        );
    }

    #[test]
    fn text_range_spans_lines() {
        let buffer = buffer_with("abc\ndef\nghi");

        assert_eq!(
            buffer.text_range(Coordinates::new(0, 1), Coordinates::new(2, 1)),
            "bc\ndef\ng"
        );
        assert_eq!(
            buffer.text_range(Coordinates::new(1, 0), Coordinates::new(1, 3)),
            "def"
        );
        // Inverted ranges are empty.
        assert_eq!(
            buffer.text_range(Coordinates::new(2, 0), Coordinates::new(0, 0)),
            ""
        );
    }

    #[test]
    fn insert_and_delete_bytes() {
        let mut buffer = buffer_with("hello");

        let mut line = 0;
        let mut index = 5;
        let added = buffer.insert_text_at(&mut line, &mut index, " world\n!");
        assert_eq!(added, 1);
        assert_eq!(buffer.text(), "hello world\n!");
        assert_eq!((line, index), (1, 1));

        buffer.delete_range_bytes(0, 5, 1, 0);
        assert_eq!(buffer.text(), "hello!");
    }

    #[test]
    fn multibyte_glyphs_share_cells() {
        let buffer = buffer_with("ä");
        // Two bytes, one codepoint, one column.
        assert_eq!(buffer.line(0).unwrap().len(), 2);
        assert_eq!(buffer.line_char_count(0), 1);
        assert_eq!(buffer.line_max_column(0), 1);
    }

    #[test]
    fn word_boundaries_without_colors() {
        let buffer = buffer_with("foo bar");

        assert_eq!(
            buffer.find_word_start(Coordinates::new(0, 5), false),
            Coordinates::new(0, 4)
        );
        assert_eq!(
            buffer.find_word_end(Coordinates::new(0, 4), false),
            Coordinates::new(0, 7)
        );
        assert!(buffer.is_on_word_boundary(Coordinates::new(0, 4), false));
        assert!(!buffer.is_on_word_boundary(Coordinates::new(0, 5), false));
    }

    #[test]
    fn find_next_word_crosses_lines() {
        let buffer = buffer_with("one\n  two");

        assert_eq!(
            buffer.find_next_word(Coordinates::new(0, 0)),
            Coordinates::new(1, 2)
        );
        // From the last word: end of buffer.
        assert_eq!(
            buffer.find_next_word(Coordinates::new(1, 2)),
            Coordinates::new(1, 5)
        );
    }
}
