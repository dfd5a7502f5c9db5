use super::font::TextFace;

/// Greedy word wrap against a pixel width.
///
/// Returns slices of `text`. Whitespace at a break stays at the end of the
/// line before it, so `lines.concat() == text` for every input. A word wider
/// than `max_width_px` is never split; it gets a line of its own.
pub fn wrap_text<'a>(face: &TextFace, text: &'a str, max_width_px: f32, size_px: f32) -> Vec<&'a str> {
    let mut lines = Vec::new();
    let mut line_start = 0;
    let mut line_end = 0;

    for (seg_start, seg_end, word_end) in segments(text) {
        if line_end > line_start {
            let candidate = &text[line_start..word_end];
            if face.measure_px(candidate, size_px) > max_width_px {
                lines.push(&text[line_start..line_end]);
                line_start = seg_start;
            }
        }
        line_end = seg_end;
    }
    if line_end > line_start {
        lines.push(&text[line_start..line_end]);
    }
    lines
}

/// Splits into `(start, end, word_end)` runs of word + trailing whitespace.
/// Leading whitespace of the text belongs to the first run.
fn segments(text: &str) -> Vec<(usize, usize, usize)> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < text.len() {
        let rest = &text[i..];
        let word_start = i + (rest.len() - rest.trim_start().len());
        let word_len = text[word_start..]
            .find(char::is_whitespace)
            .unwrap_or(text.len() - word_start);
        let word_end = word_start + word_len;
        let tail = &text[word_end..];
        let seg_end = word_end + (tail.len() - tail.trim_start().len());
        out.push((i, seg_end, word_end));
        i = seg_end;
    }
    out
}
