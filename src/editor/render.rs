//! Per-frame projection of the editor state into drawing commands.
//!
//! The renderer owns no editor state beyond the cursor-blink anchor;
//! it reads the editor and emits a [Frame]: background, selection
//! rectangles, breakpoint and error-marker fills (with a tooltip when
//! hovered), right-aligned line numbers, color-batched text runs, the
//! blinking cursor and optional whitespace glyphs.

use super::buffer::{utf8_length, Coordinates};
use super::core::CodeEditor;
use super::host::{DrawCmd, DrawList, FrameContext, TextMetrics, Vec2};
use super::palette::PaletteIndex;

const WHITESPACE_COLOR: u32 = 0x90909090;
const CURSOR_BLINK_ON_MS: u64 = 400;
const CURSOR_BLINK_PERIOD_MS: u64 = 800;

/// One frame's output.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub draw: DrawList,
    /// Scroll correction the host should apply before drawing.
    pub scroll: Option<Vec2>,
    /// Total content extent, for the host's scrollbars.
    pub content_size: Vec2,
    pub text_start: f32,
    pub char_advance: Vec2,
}

pub struct Renderer {
    pub line_spacing: f32,
    pub left_margin: f32,
    blink_anchor_ms: u64,
}

impl Renderer {
    pub fn new() -> Renderer {
        Renderer {
            line_spacing: 1.0,
            left_margin: 10.0,
            blink_anchor_ms: 0,
        }
    }

    pub fn render(
        &mut self,
        editor: &mut CodeEditor,
        metrics: &dyn TextMetrics,
        ctx: &FrameContext,
    ) -> Frame {
        editor.set_within_render(true);

        let palette = *editor.palette();
        let color = |index: PaletteIndex| palette[index.index()];

        let char_advance = Vec2::new(
            metrics.measure(ctx.font_size, "#"),
            metrics.line_height(ctx.font_size) * self.line_spacing,
        );
        let text_start = text_start(editor, metrics, ctx, self.left_margin);

        let mut scroll = ctx.scroll;
        let mut scroll_changed = false;

        if editor.take_scroll_to_top() {
            scroll.y = 0.0;
            scroll_changed = true;
        }
        if editor.take_scroll_to_cursor() {
            scroll_changed |= scroll_cursor_into_view(
                editor, metrics, ctx, &mut scroll, char_advance, text_start,
            );
        }

        let mut draw = DrawList::new();

        // Background.
        draw.rect_filled(
            ctx.origin,
            Vec2::new(ctx.origin.x + ctx.size.x, ctx.origin.y + ctx.size.y),
            color(PaletteIndex::Background),
        );

        let line_count = editor.total_lines();
        let first_line = (scroll.y / char_advance.y).floor().max(0.0) as usize;
        let last_line =
            (((scroll.y + ctx.size.y) / char_advance.y).ceil() as usize).min(line_count - 1);

        let selection_start = editor.selection_start();
        let selection_end = editor.selection_end();
        let cursor = editor.cursor_position();
        let mut longest = text_start;

        for line_no in first_line..=last_line {
            let line_start = Vec2::new(
                ctx.origin.x - scroll.x,
                ctx.origin.y + line_no as f32 * char_advance.y - scroll.y,
            );
            let text_pos = Vec2::new(line_start.x + text_start, line_start.y);
            let line_max_column = editor.buffer().line_max_column(line_no);

            longest = longest.max(
                text_start
                    + line_distance(
                        editor,
                        metrics,
                        ctx,
                        Coordinates::new(line_no as i32, line_max_column),
                    ),
            );

            // Selection rectangle for this line's segment.
            let line_start_coord = Coordinates::new(line_no as i32, 0);
            let line_end_coord = Coordinates::new(line_no as i32, line_max_column);

            let mut select_begin = -1.0f32;
            let mut select_end = -1.0f32;

            if selection_start <= line_end_coord {
                select_begin = if selection_start > line_start_coord {
                    line_distance(editor, metrics, ctx, selection_start)
                } else {
                    0.0
                };
            }
            if selection_end > line_start_coord {
                let clamped = if selection_end < line_end_coord {
                    selection_end
                } else {
                    line_end_coord
                };
                select_end = line_distance(editor, metrics, ctx, clamped);

                // The selection visually swallows the newline.
                if selection_end.line > line_no as i32 {
                    select_end += char_advance.x;
                }
            }

            if select_begin >= 0.0 && select_end >= 0.0 && select_begin < select_end {
                draw.rect_filled(
                    Vec2::new(text_pos.x + select_begin, line_start.y),
                    Vec2::new(text_pos.x + select_end, line_start.y + char_advance.y),
                    color(PaletteIndex::Selection),
                );
            }

            let marker_line = line_no as u32 + 1;
            let full_width_end = Vec2::new(
                ctx.origin.x + ctx.size.x,
                line_start.y + char_advance.y,
            );
            let gutter_start = Vec2::new(ctx.origin.x, line_start.y);

            if editor.breakpoints().contains(&marker_line) {
                draw.rect_filled(gutter_start, full_width_end, color(PaletteIndex::Breakpoint));
            }

            if let Some(message) = editor.error_markers().get(&marker_line) {
                draw.rect_filled(gutter_start, full_width_end, color(PaletteIndex::ErrorMarker));

                let hovered = ctx.mouse_pos.x >= gutter_start.x
                    && ctx.mouse_pos.x <= full_width_end.x
                    && ctx.mouse_pos.y >= line_start.y
                    && ctx.mouse_pos.y <= full_width_end.y;
                if hovered {
                    draw.push(DrawCmd::Tooltip {
                        title: format!("Error at line {}:", marker_line),
                        text: message.clone(),
                    });
                }
            }

            // Right-aligned line number.
            let number = format!("{}  ", line_no + 1);
            let number_width = metrics.measure(ctx.font_size, &number);
            draw.text(
                Vec2::new(line_start.x + text_start - number_width, line_start.y),
                color(PaletteIndex::LineNumber),
                number,
            );

            if cursor.line == line_no as i32 {
                // Highlight the cursor's line when nothing is selected.
                if !editor.has_selection() {
                    let fill = if ctx.focused {
                        PaletteIndex::CurrentLineFill
                    } else {
                        PaletteIndex::CurrentLineFillInactive
                    };
                    draw.rect_filled(gutter_start, full_width_end, color(fill));
                    draw.rect(gutter_start, full_width_end, color(PaletteIndex::CurrentLineEdge));
                }

                if ctx.focused {
                    self.draw_cursor(
                        editor, metrics, ctx, &mut draw, cursor, text_pos, char_advance,
                        color(PaletteIndex::Cursor),
                    );
                }
            }

            self.draw_line_text(editor, metrics, ctx, &mut draw, line_no, text_pos, &palette);
        }

        let content_size = Vec2::new(longest + 2.0, line_count as f32 * char_advance.y);

        editor.set_within_render(false);

        Frame {
            draw,
            scroll: scroll_changed.then_some(scroll),
            content_size,
            text_start,
            char_advance,
        }
    }

    fn draw_cursor(
        &mut self,
        editor: &CodeEditor,
        metrics: &dyn TextMetrics,
        ctx: &FrameContext,
        draw: &mut DrawList,
        cursor: Coordinates,
        text_pos: Vec2,
        char_advance: Vec2,
        color: u32,
    ) {
        let elapsed = ctx.clock_ms.saturating_sub(self.blink_anchor_ms);
        if elapsed <= CURSOR_BLINK_ON_MS {
            return;
        }

        let cx = line_distance(editor, metrics, ctx, cursor);
        let mut width = 1.0;

        // In overwrite mode the cursor covers the glyph it would
        // replace.
        if editor.is_overwrite() {
            let line_index = cursor.line as usize;
            let byte_index = editor.buffer().char_index(cursor);
            if let Some(line) = editor.buffer().line(line_index) {
                if byte_index < line.len() {
                    width = if line[byte_index].byte == b'\t' {
                        let space = metrics.measure(ctx.font_size, " ");
                        let tab = editor.tab_size() as f32 * space;
                        ((1.0 + cx) / tab).floor() * tab + tab - cx
                    } else {
                        let length = utf8_length(line[byte_index].byte);
                        let bytes: Vec<u8> = line
                            [byte_index..(byte_index + length).min(line.len())]
                            .iter()
                            .map(|glyph| glyph.byte)
                            .collect();
                        metrics.measure(ctx.font_size, &String::from_utf8_lossy(&bytes))
                    };
                }
            }
        }

        draw.rect_filled(
            Vec2::new(text_pos.x + cx, text_pos.y),
            Vec2::new(text_pos.x + cx + width, text_pos.y + char_advance.y),
            color,
        );

        if elapsed > CURSOR_BLINK_PERIOD_MS {
            self.blink_anchor_ms = ctx.clock_ms;
        }
    }

    /// Emits one line's glyphs as text runs batched by color, plus the
    /// whitespace dots and tab arrows when enabled.
    fn draw_line_text(
        &self,
        editor: &CodeEditor,
        metrics: &dyn TextMetrics,
        ctx: &FrameContext,
        draw: &mut DrawList,
        line_no: usize,
        text_pos: Vec2,
        palette: &super::palette::Palette,
    ) {
        let line = match editor.buffer().line(line_no) {
            Some(line) => line,
            None => return,
        };

        let space_size = metrics.measure(ctx.font_size, " ");
        let tab_width = editor.tab_size() as f32 * space_size;
        let colorized = editor.is_colorizer_enabled();

        let mut run: Vec<u8> = Vec::new();
        let mut run_color = palette[PaletteIndex::Default.index()];
        let mut run_start_x = 0.0f32;
        let mut offset_x = 0.0f32;

        let mut flush =
            |draw: &mut DrawList, run: &mut Vec<u8>, start_x: f32, color: u32| -> f32 {
                if run.is_empty() {
                    return 0.0;
                }
                let text = String::from_utf8_lossy(run).into_owned();
                let width = metrics.measure(ctx.font_size, &text);
                draw.text(Vec2::new(text_pos.x + start_x, text_pos.y), color, text);
                run.clear();
                width
            };

        let mut index = 0;
        while index < line.len() {
            let glyph = line[index];
            let glyph_color = if colorized {
                palette[glyph.color.index()]
            } else {
                palette[PaletteIndex::Default.index()]
            };

            if (glyph_color != run_color || glyph.byte == b'\t' || glyph.byte == b' ')
                && !run.is_empty()
            {
                offset_x = run_start_x + flush(draw, &mut run, run_start_x, run_color);
                run_start_x = offset_x;
            }
            run_color = glyph_color;

            if glyph.byte == b'\t' {
                let old_x = offset_x;
                offset_x = ((1.0 + offset_x) / tab_width).floor() * tab_width + tab_width;
                index += 1;

                if editor.is_showing_whitespaces() {
                    let s = ctx.font_size;
                    let x1 = text_pos.x + old_x + 1.0;
                    let x2 = text_pos.x + offset_x - 1.0;
                    let y = text_pos.y + s * 0.5;
                    draw.line(Vec2::new(x1, y), Vec2::new(x2, y), WHITESPACE_COLOR);
                    draw.line(
                        Vec2::new(x2, y),
                        Vec2::new(x2 - s * 0.2, y - s * 0.2),
                        WHITESPACE_COLOR,
                    );
                    draw.line(
                        Vec2::new(x2, y),
                        Vec2::new(x2 - s * 0.2, y + s * 0.2),
                        WHITESPACE_COLOR,
                    );
                }
                run_start_x = offset_x;
            } else if glyph.byte == b' ' {
                if editor.is_showing_whitespaces() {
                    draw.circle_filled(
                        Vec2::new(
                            text_pos.x + offset_x + space_size * 0.5,
                            text_pos.y + ctx.font_size * 0.5,
                        ),
                        1.5,
                        WHITESPACE_COLOR,
                    );
                }
                offset_x += space_size;
                index += 1;
                run_start_x = offset_x;
            } else {
                let length = utf8_length(glyph.byte);
                for _ in 0..length {
                    if index < line.len() {
                        run.push(line[index].byte);
                        index += 1;
                    }
                }
            }
        }

        flush(draw, &mut run, run_start_x, run_color);
    }
}

impl Default for Renderer {
    fn default() -> Renderer {
        Renderer::new()
    }
}

/// Gutter width: the widest line number plus the left margin.
fn text_start(
    editor: &CodeEditor,
    metrics: &dyn TextMetrics,
    ctx: &FrameContext,
    left_margin: f32,
) -> f32 {
    let label = format!(" {} ", editor.total_lines());
    metrics.measure(ctx.font_size, &label) + left_margin
}

/// Pixel distance from the line start to `position`, tab-aware.
fn line_distance(
    editor: &CodeEditor,
    metrics: &dyn TextMetrics,
    ctx: &FrameContext,
    position: Coordinates,
) -> f32 {
    let buffer = editor.buffer();
    let line = match buffer.line(position.line.max(0) as usize) {
        Some(line) => line,
        None => return 0.0,
    };

    let space_size = metrics.measure(ctx.font_size, " ");
    let tab_width = editor.tab_size() as f32 * space_size;
    let end_index = buffer.char_index(position);

    let mut distance = 0.0f32;
    let mut index = 0;

    while index < line.len() && index < end_index {
        if line[index].byte == b'\t' {
            distance = ((1.0 + distance) / tab_width).floor() * tab_width + tab_width;
            index += 1;
        } else {
            let length = utf8_length(line[index].byte);
            let bytes: Vec<u8> = line[index..(index + length).min(line.len())]
                .iter()
                .map(|glyph| glyph.byte)
                .collect();
            distance += metrics.measure(ctx.font_size, &String::from_utf8_lossy(&bytes));
            index += length;
        }
    }

    distance
}

/// Maps a screen position to buffer coordinates, snapping into the
/// nearest glyph. Used for mouse interaction.
pub fn screen_to_coordinates(
    editor: &CodeEditor,
    metrics: &dyn TextMetrics,
    ctx: &FrameContext,
    position: Vec2,
) -> Coordinates {
    let char_advance_y = metrics.line_height(ctx.font_size);
    let start = text_start(editor, metrics, ctx, 10.0);

    let local_x = position.x - ctx.origin.x + ctx.scroll.x;
    let local_y = position.y - ctx.origin.y + ctx.scroll.y;

    let line_no = (local_y / char_advance_y).floor().max(0.0) as usize;

    let mut column = 0i32;

    if let Some(line) = editor.buffer().line(line_no) {
        let space_size = metrics.measure(ctx.font_size, " ");
        let tab_size = editor.tab_size() as i32;
        let tab_width = tab_size as f32 * space_size;

        let mut index = 0;
        let mut column_x = 0.0f32;

        while index < line.len() {
            let width;

            if line[index].byte == b'\t' {
                let new_x = ((1.0 + column_x) / tab_width).floor() * tab_width + tab_width;
                width = new_x - column_x;

                if start + column_x + width * 0.5 > local_x {
                    break;
                }

                column_x = new_x;
                column = (column / tab_size) * tab_size + tab_size;
                index += 1;
            } else {
                let length = utf8_length(line[index].byte);
                let bytes: Vec<u8> = line[index..(index + length).min(line.len())]
                    .iter()
                    .map(|glyph| glyph.byte)
                    .collect();
                width = metrics.measure(ctx.font_size, &String::from_utf8_lossy(&bytes));

                if start + column_x + width * 0.5 > local_x {
                    break;
                }

                column_x += width;
                column += 1;
                index += length;
            }
        }
    }

    editor
        .buffer()
        .sanitize(Coordinates::new(line_no as i32, column))
}

/// Adjusts `scroll` so the cursor is inside the viewport, mirroring
/// the four-line margin of the original behavior. Returns whether the
/// scroll changed.
fn scroll_cursor_into_view(
    editor: &CodeEditor,
    metrics: &dyn TextMetrics,
    ctx: &FrameContext,
    scroll: &mut Vec2,
    char_advance: Vec2,
    text_start: f32,
) -> bool {
    let cursor = editor.cursor_position();
    let distance = line_distance(editor, metrics, ctx, cursor);

    let top = 1.0 + (scroll.y / char_advance.y).ceil();
    let bottom = ((scroll.y + ctx.size.y) / char_advance.y).ceil();
    let left = (scroll.x / char_advance.x).ceil();
    let right = ((scroll.x + ctx.size.x) / char_advance.x).ceil();

    let line = cursor.line as f32;
    let mut changed = false;

    if line < top {
        scroll.y = ((line - 1.0) * char_advance.y).max(0.0);
        changed = true;
    }
    if line > bottom - 4.0 {
        scroll.y = ((line + 4.0) * char_advance.y - ctx.size.y).max(0.0);
        changed = true;
    }
    if distance + text_start < (left + 4.0) * char_advance.x {
        scroll.x = (distance + text_start - 4.0).max(0.0);
        changed = true;
    }
    if distance + text_start > (right - 4.0) * char_advance.x {
        scroll.x = (distance + text_start + 4.0 - ctx.size.x).max(0.0);
        changed = true;
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::host::MonospaceMetrics;

    fn setup(text: &str) -> (CodeEditor, Renderer, MonospaceMetrics, FrameContext) {
        let mut editor = CodeEditor::standalone();
        editor.set_text(text);
        (
            editor,
            Renderer::new(),
            MonospaceMetrics::new(8.0),
            FrameContext::default(),
        )
    }

    fn texts(frame: &Frame) -> Vec<String> {
        frame
            .draw
            .commands()
            .iter()
            .filter_map(|cmd| match cmd {
                DrawCmd::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn renders_line_numbers_and_text() {
        let (mut editor, mut renderer, metrics, ctx) = setup("NOP\nHALT");
        let frame = renderer.render(&mut editor, &metrics, &ctx);

        let texts = texts(&frame);
        assert!(texts.iter().any(|t| t.trim() == "1"));
        assert!(texts.iter().any(|t| t.trim() == "2"));
        assert!(texts.iter().any(|t| t == "NOP"));
        assert!(texts.iter().any(|t| t == "HALT"));
    }

    #[test]
    fn background_is_the_first_command() {
        let (mut editor, mut renderer, metrics, ctx) = setup("");
        let frame = renderer.render(&mut editor, &metrics, &ctx);

        assert!(matches!(
            frame.draw.commands().first(),
            Some(DrawCmd::RectFilled { .. })
        ));
    }

    #[test]
    fn error_lines_are_filled() {
        let (mut editor, mut renderer, metrics, ctx) = setup("ADD R1\n");
        assert!(!editor.error_markers().is_empty());

        let frame = renderer.render(&mut editor, &metrics, &ctx);
        let error_color = editor.palette()[PaletteIndex::ErrorMarker.index()];
        assert!(frame.draw.commands().iter().any(|cmd| matches!(
            cmd,
            DrawCmd::RectFilled { color, .. } if *color == error_color
        )));
    }

    #[test]
    fn set_text_scrolls_to_top() {
        let (mut editor, mut renderer, metrics, mut ctx) = setup("a\nb\nc");
        ctx.scroll = Vec2::new(0.0, 500.0);

        // set_text in setup() queued the scroll reset.
        let frame = renderer.render(&mut editor, &metrics, &ctx);
        assert_eq!(frame.scroll.map(|s| s.y), Some(0.0));
    }

    #[test]
    fn screen_round_trip_hits_the_line() {
        let (editor, _renderer, metrics, ctx) = setup("alpha\nbeta\ngamma");
        let line_height = metrics.line_height(ctx.font_size);

        let coords = screen_to_coordinates(
            &editor,
            &metrics,
            &ctx,
            Vec2::new(ctx.origin.x, ctx.origin.y + 2.2 * line_height),
        );
        assert_eq!(coords.line, 2);
        assert_eq!(coords.column, 0);
    }
}
