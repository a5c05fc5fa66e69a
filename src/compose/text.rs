//! Line-level edits that keep the surrounding YAML byte-for-byte.

fn split_eol(line: &str) -> (&str, &str) {
    let body = line.trim_end_matches(['\n', '\r']);
    (body, &line[body.len()..])
}

fn indent_of(body: &str) -> usize {
    body.len() - body.trim_start_matches(' ').len()
}

/// Replace `token` wherever both neighbours satisfy `boundary` (or are the
/// start/end of text). Returns the new text and the number of replacements.
pub fn replace_token(
    text: &str,
    token: &str,
    repl: &str,
    boundary: impl Fn(char) -> bool,
) -> (String, usize) {
    let mut out = String::with_capacity(text.len());
    let mut count = 0;
    let mut rest = text;
    let mut prev: Option<char> = None;

    while let Some(pos) = rest.find(token) {
        let before = rest[..pos].chars().last().or(prev);
        let after = rest[pos + token.len()..].chars().next();
        out.push_str(&rest[..pos]);
        if before.map_or(true, &boundary) && after.map_or(true, &boundary) {
            out.push_str(repl);
            count += 1;
        } else {
            out.push_str(token);
        }
        prev = token.chars().last();
        rest = &rest[pos + token.len()..];
    }
    out.push_str(rest);

    (out, count)
}

/// Rewrite a short-syntax port scalar on a block (`- "80:80"`) or flow
/// (`ports: ["80:80"]`) sequence line, keeping its quoting.
pub fn rewrite_short(line: &str, from: &str, to: &str) -> Option<String> {
    let (body, eol) = split_eol(line);

    if let Some(rewritten) = rewrite_list_item(body, from, to) {
        return Some(format!("{}{}", rewritten, eol));
    }

    if !body.contains('[') {
        return None;
    }

    let mut out = body.to_string();
    let mut count = 0;
    for (quoted_from, quoted_to) in [
        (format!("\"{}\"", from), format!("\"{}\"", to)),
        (format!("'{}'", from), format!("'{}'", to)),
    ] {
        let hits = out.matches(quoted_from.as_str()).count();
        if hits > 0 {
            out = out.replace(&quoted_from, &quoted_to);
            count += hits;
        }
    }
    let (out, bare) = replace_token(&out, from, to, |c| matches!(c, '[' | ']' | ',' | ' '));
    count += bare;

    (count > 0).then(|| format!("{}{}", out, eol))
}

fn rewrite_list_item(body: &str, from: &str, to: &str) -> Option<String> {
    let indent = indent_of(body);
    let rest = body[indent..].strip_prefix("- ")?;

    let (scalar, comment) = match rest.find(" #") {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, ""),
    };
    let lead = scalar.len() - scalar.trim_start().len();
    let core = scalar.trim();
    let tail = &scalar[lead + core.len()..];

    let replaced = if core == from {
        to.to_string()
    } else if core == format!("\"{}\"", from) {
        format!("\"{}\"", to)
    } else if core == format!("'{}'", from) {
        format!("'{}'", to)
    } else {
        return None;
    };

    Some(format!(
        "{}- {}{}{}{}",
        &body[..indent],
        &scalar[..lead],
        replaced,
        tail,
        comment
    ))
}

/// Column of the `published:` key if the line publishes port 80
fn published_80_col(body: &str) -> Option<usize> {
    let indent = indent_of(body);
    let rest = &body[indent..];
    let (col, kv) = match rest.strip_prefix("- ") {
        Some(r) => (indent + 2 + (r.len() - r.trim_start().len()), r.trim_start()),
        None => (indent, rest),
    };

    let value = kv.strip_prefix("published:")?;
    let value = value.split(" #").next().unwrap_or_default().trim();
    matches!(value, "80" | "\"80\"" | "'80'").then_some(col)
}

/// Line starts a sequence item whose keys sit at `col`
fn item_starts_at(body: &str, col: usize) -> bool {
    col >= 2 && indent_of(body) == col - 2 && body.trim_start().starts_with("- ")
}

/// Lines `[start, end)` of the mapping that contains line `i`
fn mapping_block(lines: &[String], i: usize, col: usize) -> (usize, usize) {
    let mut start = i;
    if !item_starts_at(split_eol(&lines[i]).0, col) {
        let mut j = i;
        while j > 0 {
            j -= 1;
            let body = split_eol(&lines[j]).0;
            if body.trim().is_empty() {
                continue;
            }
            if item_starts_at(body, col) {
                start = j;
                break;
            }
            let indent = indent_of(body);
            if indent > col || (indent == col && !body.trim_start().starts_with("- ")) {
                start = j;
                continue;
            }
            break;
        }
    }

    let mut end = i + 1;
    while end < lines.len() {
        let body = split_eol(&lines[end]).0;
        let indent = indent_of(body);
        let continues = body.trim().is_empty()
            || indent > col
            || (indent == col && !body.trim_start().starts_with("- "));
        if !continues {
            break;
        }
        end += 1;
    }

    (start, end)
}

/// Rewrite every long-syntax `published: 80` to the internal port and bind
/// it to `host_ip`, replacing an existing `host_ip` in the same mapping.
pub fn rewrite_long(lines: &mut Vec<String>, internal_port: u16, host_ip: &str) -> usize {
    let mut count = 0;
    let mut i = 0;

    while i < lines.len() {
        let (body, eol) = split_eol(&lines[i]);
        let Some(col) = published_80_col(body) else {
            i += 1;
            continue;
        };

        let eol = if eol.is_empty() { "\n" } else { eol }.to_string();
        let had_eol = !split_eol(&lines[i]).1.is_empty();
        lines[i] = format!("{}published: {}{}", &body[..col], internal_port, eol);
        count += 1;

        let (start, end) = mapping_block(lines, i, col);
        let existing = (start..end).find(|&k| {
            split_eol(&lines[k])
                .0
                .get(col..)
                .is_some_and(|key| key.starts_with("host_ip:"))
        });

        match existing {
            Some(k) => {
                let (body, line_eol) = split_eol(&lines[k]);
                lines[k] = format!("{}host_ip: {}{}", &body[..col], host_ip, line_eol);
                if !had_eol && k != i {
                    let (published, _) = split_eol(&lines[i]);
                    lines[i] = published.to_string();
                }
            }
            None => {
                let trailing = if had_eol { eol.clone() } else { String::new() };
                lines.insert(i + 1, format!("{}host_ip: {}{}", " ".repeat(col), host_ip, trailing));
                i += 1;
            }
        }

        i += 1;
    }

    count
}
