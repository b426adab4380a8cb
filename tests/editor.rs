use dlx::editor::{
    buffer::Coordinates,
    core::{CodeEditor, SelectionMode},
    host::TestClipboard,
    palette::PaletteIndex,
};

fn editor() -> CodeEditor {
    CodeEditor::standalone()
}

fn editor_with(text: &str) -> CodeEditor {
    let mut ed = editor();
    ed.set_text(text);
    ed
}

#[test]
fn test_undo_restores_text_and_cursor() {
    let mut ed = editor();

    ed.insert_text("abc");
    assert_eq!(ed.get_text(), "abc");
    assert_eq!(ed.cursor_position(), Coordinates::new(0, 3));

    ed.undo(1);
    assert_eq!(ed.get_text(), "");
    assert_eq!(ed.cursor_position(), Coordinates::new(0, 0));
    assert!(!ed.has_selection());
    assert!(ed.can_redo());

    ed.redo(1);
    assert_eq!(ed.get_text(), "abc");
    assert_eq!(ed.cursor_position(), Coordinates::new(0, 3));
}

#[test]
fn test_tab_expansion_survives_tab_size_change() {
    let mut ed = editor();
    ed.set_tab_size(4);
    ed.set_text("\tx");

    // The x sits at column 4 under tab size 4.
    assert_eq!(ed.buffer().char_column(0, 1), 4);
    ed.set_cursor_position(Coordinates::new(0, 4));
    assert_eq!(ed.cursor_position().column, 4);

    ed.set_tab_size(2);
    assert_eq!(ed.cursor_position().column, 2);
    assert_eq!(ed.get_text(), "\tx");
}

#[test]
fn test_multi_line_indent_and_undo() {
    let mut ed = editor_with("a\nb\nc\n");
    ed.set_selection(
        Coordinates::new(0, 0),
        Coordinates::new(2, 1),
        SelectionMode::Normal,
    );

    ed.enter_character('\t', false);
    assert_eq!(ed.get_text(), "\ta\n\tb\n\tc\n");

    ed.undo(1);
    assert_eq!(ed.get_text(), "a\nb\nc\n");
    assert_eq!(ed.selection_start(), Coordinates::new(0, 0));
    assert_eq!(ed.selection_end(), Coordinates::new(2, 1));
}

#[test]
fn test_multi_line_outdent() {
    let mut ed = editor_with("\ta\n    b\nc\n");
    ed.set_selection(
        Coordinates::new(0, 0),
        Coordinates::new(2, 1),
        SelectionMode::Normal,
    );

    // Shift+Tab removes one tab or up to tab-size leading spaces.
    ed.enter_character('\t', true);
    assert_eq!(ed.get_text(), "a\nb\nc\n");

    ed.undo(1);
    assert_eq!(ed.get_text(), "\ta\n    b\nc\n");
}

#[test]
fn test_undo_journal_survives_tab_size_changes() {
    let mut ed = editor();
    ed.set_tab_size(4);
    ed.insert_text("\tabc");

    // Replaying under a different tab size still removes exactly the
    // inserted bytes.
    ed.set_tab_size(8);
    ed.undo(1);
    assert_eq!(ed.get_text(), "");

    ed.redo(1);
    assert_eq!(ed.get_text(), "\tabc");
    assert_eq!(ed.cursor_position(), Coordinates::new(0, 11));
}

#[test]
fn test_undo_redo_identity_over_an_edit_sequence() {
    let mut ed = editor();

    // Every operation journals exactly one record; no cursor moves
    // happen in between, so states round-trip exactly too.
    let mut snapshots = vec![(ed.get_text(), ed.state())];

    ed.insert_text("start");
    snapshots.push((ed.get_text(), ed.state()));

    ed.enter_character('!', false);
    snapshots.push((ed.get_text(), ed.state()));

    ed.enter_character('\n', false);
    snapshots.push((ed.get_text(), ed.state()));

    ed.insert_text("ADD R1, R2, R3");
    snapshots.push((ed.get_text(), ed.state()));

    ed.backspace();
    snapshots.push((ed.get_text(), ed.state()));

    // Walk all the way back, checking each snapshot, then forward
    // again.
    for snapshot in snapshots.iter().rev().skip(1) {
        ed.undo(1);
        assert_eq!(ed.get_text(), snapshot.0);
        assert_eq!(ed.state(), snapshot.1);
    }

    for snapshot in snapshots.iter().skip(1) {
        ed.redo(1);
        assert_eq!(ed.get_text(), snapshot.0);
        assert_eq!(ed.state(), snapshot.1);
    }
}

#[test]
fn test_set_text_is_idempotent_after_sanitizing() {
    let mut ed = editor();

    ed.set_text("a\r\nb\x01c\td\x00");
    let sanitized = ed.get_text();
    assert_eq!(sanitized, "a\nbc\td");

    ed.set_text(&sanitized);
    assert_eq!(ed.get_text(), sanitized);
}

#[test]
fn test_text_equals_joined_lines() {
    let ed = editor_with("one\n\tтwo\n\nfour");
    assert_eq!(ed.get_text(), ed.get_text_lines().join("\n"));
}

#[test]
fn test_clear_text_journals_the_content() {
    let mut ed = editor_with("ADD R1, R2, R3\nNOP\n");

    ed.clear_text();
    assert_eq!(ed.get_text(), "");
    assert_eq!(ed.total_lines(), 1);

    ed.undo(1);
    assert_eq!(ed.get_text(), "ADD R1, R2, R3\nNOP\n");
}

#[test]
fn test_colorization_is_idempotent() {
    let mut ed = editor_with("ADDI R1, R0, #5 ; five\nJ missing\n");

    let colors = |ed: &CodeEditor| -> Vec<Vec<PaletteIndex>> {
        (0..ed.total_lines())
            .map(|line| {
                ed.buffer()
                    .line(line)
                    .unwrap()
                    .iter()
                    .map(|glyph| glyph.color)
                    .collect()
            })
            .collect()
    };

    let first = colors(&ed);
    ed.colorize();
    let second = colors(&ed);

    assert_eq!(first, second);
    // Spot checks: opcode, register, immediate, comment.
    assert_eq!(first[0][0], PaletteIndex::OpCode);
    assert_eq!(first[0][5], PaletteIndex::Register);
    assert_eq!(first[0][13], PaletteIndex::IntegerLiteral);
    assert_eq!(first[0][16], PaletteIndex::Comment);
}

#[test]
fn test_error_markers_follow_the_parse() {
    let mut ed = editor_with("ADD R1\n");
    assert_eq!(ed.error_markers().len(), 1);
    assert!(ed.error_markers().contains_key(&1));

    // Fixing the line clears the marker on the next refresh.
    ed.clear_text();
    ed.insert_text("ADD R1, R2, R3");
    assert!(ed.error_markers().is_empty());
}

#[test]
fn test_error_markers_append_on_duplicate_lines() {
    let mut ed = editor();
    ed.add_error_marker(3, "first");
    ed.add_error_marker(3, "second");

    assert_eq!(ed.error_markers().get(&3).unwrap(), "first\nsecond");
}

#[test]
fn test_breakpoints_are_a_set() {
    let mut ed = editor_with("a\nb\nc");

    assert!(ed.add_breakpoint(2));
    assert!(!ed.add_breakpoint(2));
    assert!(ed.toggle_breakpoint(3));
    assert!(!ed.toggle_breakpoint(3));
    assert!(ed.remove_breakpoint(2));
    assert!(!ed.remove_breakpoint(2));
    assert!(ed.breakpoints().is_empty());
}

#[test]
fn test_cut_copy_paste() {
    let mut ed = editor_with("hello world");
    let mut clipboard = TestClipboard::new();

    // Copy without a selection takes the whole line.
    ed.copy(&mut clipboard);
    assert_eq!(clipboard.content(), "hello world");

    ed.set_selection(
        Coordinates::new(0, 0),
        Coordinates::new(0, 6),
        SelectionMode::Normal,
    );
    ed.cut(&mut clipboard);
    assert_eq!(clipboard.content(), "hello ");
    assert_eq!(ed.get_text(), "world");

    // Paste replaces the selection.
    ed.set_selection(
        Coordinates::new(0, 0),
        Coordinates::new(0, 5),
        SelectionMode::Normal,
    );
    ed.paste(&mut clipboard);
    assert_eq!(ed.get_text(), "hello ");

    // Undo unwinds the paste including the replaced text.
    ed.undo(1);
    assert_eq!(ed.get_text(), "world");
}

#[test]
fn test_cut_without_selection_is_a_noop() {
    let mut ed = editor_with("keep me");
    let mut clipboard = TestClipboard::with_content("old");

    ed.cut(&mut clipboard);
    assert_eq!(ed.get_text(), "keep me");
    assert_eq!(clipboard.content(), "old");
}

#[test]
fn test_read_only_cut_degrades_to_copy() {
    let mut ed = editor_with("secret");
    ed.set_selection(
        Coordinates::new(0, 0),
        Coordinates::new(0, 6),
        SelectionMode::Normal,
    );
    ed.set_read_only(true);

    let mut clipboard = TestClipboard::new();
    ed.cut(&mut clipboard);

    assert_eq!(clipboard.content(), "secret");
    assert_eq!(ed.get_text(), "secret");
}

#[test]
fn test_paste_of_an_empty_clipboard_is_a_noop() {
    let mut ed = editor_with("text");
    let mut clipboard = TestClipboard::new();

    ed.paste(&mut clipboard);
    assert_eq!(ed.get_text(), "text");
    assert!(!ed.can_undo());
}

#[test]
fn test_selection_modes() {
    let mut ed = editor_with("ADD R1, R2, R3");

    ed.set_selection(
        Coordinates::new(0, 1),
        Coordinates::new(0, 2),
        SelectionMode::Word,
    );
    assert_eq!(ed.get_selected_text(), "ADD");

    ed.set_selection(
        Coordinates::new(0, 5),
        Coordinates::new(0, 5),
        SelectionMode::Line,
    );
    assert_eq!(ed.get_selected_text(), "ADD R1, R2, R3");
}

#[test]
fn test_word_under_cursor_uses_token_colors() {
    let mut ed = editor_with("ADDI R12, R0, #5");

    ed.set_cursor_position(Coordinates::new(0, 6));
    assert_eq!(ed.get_word_under_cursor(), "R12");

    ed.set_cursor_position(Coordinates::new(0, 1));
    assert_eq!(ed.get_word_under_cursor(), "ADDI");
}

#[test]
fn test_moves_clamp_at_the_edges() {
    let mut ed = editor_with("ab\ncd");

    ed.move_bottom(false);
    assert_eq!(ed.cursor_position(), Coordinates::new(1, 2));

    ed.move_down(5, false);
    assert_eq!(ed.cursor_position(), Coordinates::new(1, 2));

    ed.move_top(false);
    assert_eq!(ed.cursor_position(), Coordinates::new(0, 0));

    ed.move_up(3, false);
    assert_eq!(ed.cursor_position(), Coordinates::new(0, 0));
}

#[test]
fn test_move_right_wraps_lines() {
    let mut ed = editor_with("ab\ncd");

    ed.move_right(3, false, false);
    assert_eq!(ed.cursor_position(), Coordinates::new(1, 0));

    ed.move_left(1, false, false);
    assert_eq!(ed.cursor_position(), Coordinates::new(0, 2));
}

#[test]
fn test_selecting_with_movement() {
    let mut ed = editor_with("one two");

    ed.move_right(3, true, false);
    assert!(ed.has_selection());
    assert_eq!(ed.get_selected_text(), "one");

    // Word-mode movement skips the next word entirely.
    ed.move_right(1, true, true);
    assert_eq!(ed.selection_start(), Coordinates::new(0, 0));
    assert_eq!(ed.selection_end(), Coordinates::new(0, 7));
}

#[test]
fn test_invariants_after_random_edits() {
    let mut ed = editor_with("ADDI R1, R0, #5\nADD R3, R1, R2\n");

    ed.set_cursor_position(Coordinates::new(1, 3));
    ed.backspace();
    ed.enter_character('x', false);
    ed.delete();
    ed.move_end(true);
    ed.enter_character('\t', false);

    // I1: at least one line, ordered selection, reachable cursor.
    assert!(ed.total_lines() >= 1);
    assert!(ed.selection_start() <= ed.selection_end());
    let cursor = ed.cursor_position();
    assert_eq!(ed.buffer().sanitize(cursor), cursor);
}

#[test]
fn test_overwrite_over_a_tab_shrinks_the_line() {
    let mut ed = editor_with("\tend");
    ed.set_overwrite(true);
    ed.set_cursor_position(Coordinates::new(0, 0));

    ed.enter_character('X', false);
    // The tab byte is gone, no padding is inserted.
    assert_eq!(ed.get_text(), "Xend");
    assert_eq!(ed.buffer().line_max_column(0), 4);

    ed.undo(1);
    assert_eq!(ed.get_text(), "\tend");
}

#[test]
fn test_enter_splits_and_indents() {
    let mut ed = editor_with("    code");
    ed.set_cursor_position(Coordinates::new(0, 8));

    ed.enter_character('\n', false);
    assert_eq!(ed.get_text(), "    code\n    ");
    assert_eq!(ed.cursor_position(), Coordinates::new(1, 4));

    ed.undo(1);
    assert_eq!(ed.get_text(), "    code");
}
