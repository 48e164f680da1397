//! Redis-style index windows

/// Resolve `[start, stop]` against a collection of `len` items
///
/// Negative indices count from the end (`-1` is the last item). A start
/// before the beginning clamps to 0 and a stop past the end clamps to the
/// last item. Returns `None` when the resolved window is empty.
pub(crate) fn normalize(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = i64::try_from(len).unwrap_or(i64::MAX);

    let start = if start < 0 { (start + len).max(0) } else { start };
    let mut stop = if stop < 0 { stop + len } else { stop };

    if start > stop || start >= len {
        return None;
    }
    if stop >= len {
        stop = len - 1;
    }

    Some((start as usize, stop as usize))
}
