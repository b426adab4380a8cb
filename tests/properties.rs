use proptest::prelude::*;

use dlx::editor::{buffer::Coordinates, core::CodeEditor};

fn document() -> impl Strategy<Value = String> {
    prop::collection::vec("[ -~\t]{0,12}", 0..6).prop_map(|lines| lines.join("\n"))
}

proptest! {
    /// Printable documents survive `set_text` byte-exact.
    #[test]
    fn set_text_round_trips(doc in document()) {
        let mut ed = CodeEditor::standalone();
        ed.set_text(&doc);
        prop_assert_eq!(ed.get_text(), doc);
    }

    /// The full text always equals the newline-join of the lines.
    #[test]
    fn text_matches_joined_lines(doc in document()) {
        let mut ed = CodeEditor::standalone();
        ed.set_text(&doc);
        prop_assert_eq!(ed.get_text(), ed.get_text_lines().join("\n"));
    }

    /// Inserting and undoing is the identity on the text; redo brings
    /// the insertion back.
    #[test]
    fn insert_undo_redo_round_trips(
        doc in document(),
        snippet in "[ -~\t\n]{0,16}",
        line in 0..8i32,
        column in 0..24i32,
    ) {
        let mut ed = CodeEditor::standalone();
        ed.set_text(&doc);
        ed.set_cursor_position(Coordinates::new(line, column));

        ed.insert_text(&snippet);
        let after = ed.get_text();

        ed.undo(1);
        prop_assert_eq!(ed.get_text(), doc);

        ed.redo(1);
        prop_assert_eq!(ed.get_text(), after);
    }

    /// Any sequence of edits unwinds completely.
    #[test]
    fn edit_sequences_unwind(
        doc in document(),
        ops in prop::collection::vec(0u8..13, 0..24),
    ) {
        let mut ed = CodeEditor::standalone();
        ed.set_text(&doc);

        for op in ops {
            match op {
                0..=4 => ed.enter_character((b'a' + op) as char, false),
                5 => ed.backspace(),
                6 => ed.delete(),
                7 => ed.enter_character('\n', false),
                8 => ed.enter_character('\t', false),
                9 => ed.move_left(1, false, false),
                10 => ed.move_right(1, false, false),
                11 => ed.move_up(1, false),
                _ => ed.move_down(1, false),
            }
        }

        ed.undo(64);
        prop_assert_eq!(ed.get_text(), doc);
    }

    /// Byte index and visual column conversions invert each other on
    /// every reachable position.
    #[test]
    fn index_column_conversions_invert(doc in document()) {
        let mut ed = CodeEditor::standalone();
        ed.set_text(&doc);
        let buffer = ed.buffer();

        for line in 0..buffer.line_count() {
            let length = buffer.line(line).unwrap().len();

            for index in 0..=length {
                let column = buffer.char_column(line, index);
                let round_trip =
                    buffer.char_index(Coordinates::new(line as i32, column));
                prop_assert_eq!(round_trip, index);
            }
        }
    }
}
