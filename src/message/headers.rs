//! In-place header splicing on raw RFC 5322 messages.
//!
//! Only the header being changed is touched. Every other header line, the
//! blank separator and the body are copied through byte for byte.

/// Line terminator used by `raw`, defaulting to CRLF.
pub fn line_ending(raw: &[u8]) -> &'static str {
    if raw.windows(2).any(|w| w == b"\r\n") {
        "\r\n"
    } else if raw.contains(&b'\n') {
        "\n"
    } else {
        "\r\n"
    }
}

/// Replace every occurrence of header `name` (continuation lines included)
/// with `rendered`.
///
/// `rendered` holds complete CRLF-terminated header lines; they are converted
/// to the message's own line ending. The replacement goes where the first
/// occurrence was, or at the end of the header block if there was none.
pub fn replace_header(raw: &[u8], name: &str, rendered: &str) -> Vec<u8> {
    let newline = line_ending(raw);
    let rendered = if newline == "\r\n" {
        rendered.to_string()
    } else {
        rendered.replace("\r\n", newline)
    };

    let mut out = Vec::with_capacity(raw.len() + rendered.len());
    let mut inserted = false;
    let mut skipping = false;
    let mut pos = 0;

    while pos < raw.len() {
        let end = line_end(raw, pos);
        let line = &raw[pos..end];
        if is_blank(line) {
            break;
        }

        if is_continuation(line) {
            if !skipping {
                out.extend_from_slice(line);
            }
        } else if header_name_is(line, name) {
            skipping = true;
            if !inserted {
                out.extend_from_slice(rendered.as_bytes());
                inserted = true;
            }
        } else {
            skipping = false;
            out.extend_from_slice(line);
        }
        pos = end;
    }

    if !inserted {
        if !out.is_empty() && !out.ends_with(b"\n") {
            out.extend_from_slice(newline.as_bytes());
        }
        out.extend_from_slice(rendered.as_bytes());
    }
    out.extend_from_slice(&raw[pos..]);
    out
}

/// Offer the value of every occurrence of header `name` to `rewrite`, in
/// order, and splice in whatever it returns.
///
/// The value is the text after the colon, folded lines included, without the
/// final line terminator. Occurrences for which `rewrite` returns `None`, or
/// whose value is not UTF-8, are left as they are.
pub fn rewrite_header(
    raw: &[u8],
    name: &str,
    mut rewrite: impl FnMut(&str) -> Option<String>,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut pos = 0;

    while pos < raw.len() {
        let end = line_end(raw, pos);
        let line = &raw[pos..end];
        if is_blank(line) {
            break;
        }

        let value_start = (!is_continuation(line))
            .then(|| value_offset(line, name))
            .flatten();
        let Some(offset) = value_start else {
            out.extend_from_slice(line);
            pos = end;
            continue;
        };

        let mut field_end = end;
        while field_end < raw.len() {
            let next = line_end(raw, field_end);
            if !is_continuation(&raw[field_end..next]) {
                break;
            }
            field_end = next;
        }

        let value = &raw[pos + offset..field_end];
        let body_len = value.len() - terminator_len(value);
        let replaced = std::str::from_utf8(&value[..body_len])
            .ok()
            .and_then(|text| rewrite(text));
        match replaced {
            Some(text) => {
                out.extend_from_slice(&raw[pos..pos + offset]);
                out.extend_from_slice(text.as_bytes());
                out.extend_from_slice(&value[body_len..]);
            }
            None => out.extend_from_slice(&raw[pos..field_end]),
        }
        pos = field_end;
    }

    out.extend_from_slice(&raw[pos..]);
    out
}

fn line_end(raw: &[u8], pos: usize) -> usize {
    raw[pos..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(raw.len(), |i| pos + i + 1)
}

fn terminator_len(line: &[u8]) -> usize {
    if line.ends_with(b"\r\n") {
        2
    } else if line.ends_with(b"\n") {
        1
    } else {
        0
    }
}

fn is_continuation(line: &[u8]) -> bool {
    matches!(line.first(), Some(b' ' | b'\t'))
}

/// Offset just past the colon when `line` starts header `name`.
fn value_offset(line: &[u8], name: &str) -> Option<usize> {
    let colon = line.iter().position(|&b| b == b':')?;
    line[..colon]
        .trim_ascii_end()
        .eq_ignore_ascii_case(name.as_bytes())
        .then_some(colon + 1)
}

fn is_blank(line: &[u8]) -> bool {
    line == b"\r\n" || line == b"\n"
}

fn header_name_is(line: &[u8], name: &str) -> bool {
    value_offset(line, name).is_some()
}
