// Horizontal looping marquee for the info bar.
//
// The text is drawn at `left - offset`; once its tail is on screen a second
// copy follows `GAP` pixels behind it, so wrapping the offset modulo
// `text_width + GAP` is seamless.

use crate::structs;

pub const STEP: i32 = 2;
pub const GAP: i32 = 50;

pub fn needs_scrolling(text_width: i32, view_width: i32) -> bool {
    return text_width > view_width;
}

pub fn advance(offset: i32, text_width: i32) -> i32 {
    let period = text_width + GAP;
    if period <= 0 {
        return 0;
    }
    return (offset + STEP).rem_euclid(period);
}

/// X positions of the first copy and, if it is needed, the trailing copy.
pub fn placements(offset: i32, text_width: i32, left: i32, canvas_width: i32) -> (i32, Option<i32>) {
    let x = left - offset;
    if x + text_width < canvas_width {
        return (x, Some(x + text_width + GAP));
    }
    return (x, None);
}

/// Flags whether `record`'s info line scrolls and says where to draw it.
/// The view is the canvas minus `left` on both sides.
pub fn lay_out(record: &mut structs::DepartureRecord, text_width: i32, left: i32, canvas_width: i32) -> (i32, Option<i32>) {
    record.needs_scrolling = needs_scrolling(text_width, canvas_width - 2 * left);
    if !record.needs_scrolling {
        return (left, None);
    }
    return placements(record.scroll_offset, text_width, left, canvas_width);
}

/// One scroll step, only for lines that don't fit.
pub fn tick(record: &mut structs::DepartureRecord, text_width: i32) {
    if record.needs_scrolling {
        record.scroll_offset = advance(record.scroll_offset, text_width);
    }
}
