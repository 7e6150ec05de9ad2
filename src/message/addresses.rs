//! Address lists as written in a header value.
//!
//! Works on the raw text so that a mailbox can be swapped without
//! re-encoding its neighbours. Quoted strings, comments, angle addresses and
//! groups (`name: a, b;`) are recognised; nothing is validated.

use std::ops::Range;

/// One mailbox inside a header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Byte range of the mailbox text, surrounding whitespace excluded.
    pub span: Range<usize>,
    /// The bare `local@domain` part.
    pub address: String,
}

/// Split an address-list value into its mailboxes. Group names and empty
/// slots are skipped.
pub fn entries(value: &str) -> Vec<Entry> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;
    let mut comment = 0usize;
    let mut angle = false;

    for (i, c) in value.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if quoted || comment > 0 => escaped = true,
            '"' if comment == 0 => quoted = !quoted,
            _ if quoted => {}
            '(' => comment += 1,
            ')' if comment > 0 => comment -= 1,
            _ if comment > 0 => {}
            '<' => angle = true,
            '>' => angle = false,
            _ if angle => {}
            ',' | ';' => {
                push_entry(&mut out, value, start..i);
                start = i + 1;
            }
            // Group display name.
            ':' => start = i + 1,
            _ => {}
        }
    }
    push_entry(&mut out, value, start..value.len());
    out
}

/// Replace every mailbox whose address satisfies `is_match` with
/// `replacement`, leaving all other text as it was.
///
/// Returns `None` when nothing matched.
pub fn replace_matching(
    value: &str,
    is_match: impl Fn(&str) -> bool,
    replacement: &str,
) -> Option<String> {
    let hits: Vec<Entry> = entries(value)
        .into_iter()
        .filter(|e| is_match(&e.address))
        .collect();
    if hits.is_empty() {
        return None;
    }

    let mut out = value.to_string();
    for hit in hits.iter().rev() {
        out.replace_range(hit.span.clone(), replacement);
    }
    Some(out)
}

fn push_entry(out: &mut Vec<Entry>, value: &str, range: Range<usize>) {
    let text = &value[range.clone()];
    let lead = text.len() - text.trim_start().len();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return;
    }
    let start = range.start + lead;
    out.push(Entry {
        span: start..start + trimmed.len(),
        address: addr_spec(trimmed),
    });
}

/// `Name <addr>` → `addr`; `addr (comment)` → `addr`.
fn addr_spec(mailbox: &str) -> String {
    let mut plain = String::new();
    let mut angled: Option<String> = None;
    let mut in_angle = false;
    let mut quoted = false;
    let mut escaped = false;
    let mut comment = 0usize;

    for c in mailbox.chars() {
        if escaped {
            escaped = false;
        } else if c == '\\' && (quoted || comment > 0) {
            escaped = true;
        } else if c == '"' && comment == 0 {
            quoted = !quoted;
        } else if !quoted && c == '(' {
            comment += 1;
            continue;
        } else if !quoted && c == ')' && comment > 0 {
            comment -= 1;
            continue;
        } else if !quoted && comment == 0 && c == '<' {
            in_angle = true;
            angled = Some(String::new());
            continue;
        } else if !quoted && comment == 0 && c == '>' {
            in_angle = false;
            continue;
        }

        if comment > 0 {
            continue;
        }
        match angled.as_mut() {
            Some(addr) if in_angle => addr.push(c),
            _ => plain.push(c),
        }
    }

    angled.unwrap_or(plain).trim().to_string()
}
