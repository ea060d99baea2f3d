//! Fitting outbound text into protocol-sized pieces.

use leetbot_proto::MAX_LINE_LEN;

/// Appended to the last line when a response is cut short.
pub const TRUNCATION_MARKER: &str = "...";

/// `!user@host` the server may insert when relaying our line
/// (USERLEN 10, HOSTLEN 63).
const RELAY_MASK_LEN: usize = 1 + 10 + 1 + 63;

/// Floor for the payload budget, so absurdly long targets still make progress.
const MIN_PAYLOAD: usize = 64;

/// Bytes available for message text so the line stays within
/// [`MAX_LINE_LEN`] even after the server prepends our full source mask.
///
/// Accounts for `:nick!user@host COMMAND target :` plus the CR-LF.
pub fn payload_budget(command: &str, target: &str, nickname: &str) -> usize {
    let overhead = 1 + nickname.len() + RELAY_MASK_LEN + 1 + command.len() + 1 + target.len() + 2 + 2;
    MAX_LINE_LEN.saturating_sub(overhead).max(MIN_PAYLOAD)
}

/// Largest char boundary in `s` that is `<= index`.
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Split text on line breaks, then wrap each line to at most `limit` bytes.
///
/// Lines break at the last space inside the limit (the space is consumed);
/// a run with no space is cut at a character boundary. Blank lines are
/// dropped since IRC cannot carry empty messages.
pub fn split_text(text: &str, limit: usize) -> Vec<String> {
    let mut parts = Vec::new();
    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.trim().is_empty() {
            continue;
        }
        wrap_line(line, limit, &mut parts);
    }
    parts
}

fn wrap_line(line: &str, limit: usize, out: &mut Vec<String>) {
    let mut rest = line;
    while rest.len() > limit {
        let mut cut = floor_char_boundary(rest, limit);
        if cut == 0 {
            // A single character wider than the limit still has to go somewhere.
            cut = rest.char_indices().nth(1).map_or(rest.len(), |(i, _)| i);
        }

        let (head, tail) = if rest.as_bytes().get(cut) == Some(&b' ') {
            (&rest[..cut], &rest[cut + 1..])
        } else {
            match rest[..cut].rfind(' ') {
                Some(space) if space > 0 => (&rest[..space], &rest[space + 1..]),
                _ => (&rest[..cut], &rest[cut..]),
            }
        };
        out.push(head.to_owned());
        rest = tail;
    }
    if !rest.is_empty() {
        out.push(rest.to_owned());
    }
}

/// [`split_text`], capped at `max_lines`.
///
/// When the cap cuts lines off, the last kept line ends with
/// [`TRUNCATION_MARKER`] and still fits the limit.
pub fn shape_response(text: &str, limit: usize, max_lines: usize) -> Vec<String> {
    let mut parts = split_text(text, limit);
    if parts.len() > max_lines {
        parts.truncate(max_lines);
        if let Some(last) = parts.last_mut() {
            let keep = floor_char_boundary(last, limit.saturating_sub(TRUNCATION_MARKER.len()));
            last.truncate(keep);
            last.push_str(TRUNCATION_MARKER);
        }
    }
    parts
}
