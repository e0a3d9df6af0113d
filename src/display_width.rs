use unicode_width::UnicodeWidthStr;

/// Approximate pixel advance of one display column in diagram viewers.
pub const CHAR_WIDTH_PX: usize = 7;

pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Pixel width a label needs on a single line, wide glyphs counted twice.
pub fn label_width_px(s: &str) -> usize {
    display_width(s.trim()) * CHAR_WIDTH_PX
}
