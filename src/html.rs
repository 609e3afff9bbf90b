//! Plain-text rendering of HTML for local `.html` files and scraped pages.

/// Strip markup from `html`: `<script>`, `<style>` and comment bodies are
/// dropped, every tag becomes a space, common entities are decoded and runs
/// of whitespace collapse to one space.
pub fn strip_tags(html: &str) -> String {
    let chars: Vec<char> = html.chars().collect();
    let mut out = String::with_capacity(html.len() / 2);
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '<' {
            out.push(chars[i]);
            i += 1;
            continue;
        }

        if starts_with_ci(&chars, i, "<!--") {
            i = find_ci(&chars, i + 4, "-->").map_or(chars.len(), |p| p + 3);
        } else if let Some(tag) = ["script", "style"]
            .into_iter()
            .find(|t| is_open_tag(&chars, i, t))
        {
            let close = format!("</{}", tag);
            i = match find_ci(&chars, i + 1, &close) {
                Some(p) => skip_tag(&chars, p),
                None => chars.len(),
            };
        } else {
            i = skip_tag(&chars, i);
        }
        out.push(' ');
    }

    collapse_whitespace(&decode_entities(&out))
}

/// Text of the first `<title>` element, if non-empty.
pub fn extract_title(html: &str) -> Option<String> {
    let chars: Vec<char> = html.chars().collect();
    let start = (0..chars.len()).find(|&i| is_open_tag(&chars, i, "title"))?;
    let body_start = skip_tag(&chars, start);
    let body_end = find_ci(&chars, body_start, "</title")?;
    let raw: String = chars[body_start..body_end].iter().collect();
    let title = collapse_whitespace(&decode_entities(&raw));
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

/// Decode the handful of entities that show up in ordinary pages, plus
/// numeric references.
pub fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| decode_entity(&tail[1..semi]).map(|c| (c, semi + 1)));
        match decoded {
            Some((c, len)) => {
                out.push(c);
                rest = &tail[len..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" | "#39" => Some('\''),
        "nbsp" => Some(' '),
        "mdash" => Some('\u{2014}'),
        "ndash" => Some('\u{2013}'),
        "hellip" => Some('\u{2026}'),
        "copy" => Some('\u{a9}'),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn starts_with_ci(chars: &[char], at: usize, pat: &str) -> bool {
    let mut idx = at;
    for p in pat.chars() {
        match chars.get(idx) {
            Some(c) if c.eq_ignore_ascii_case(&p) => idx += 1,
            _ => return false,
        }
    }
    true
}

fn find_ci(chars: &[char], from: usize, pat: &str) -> Option<usize> {
    (from..chars.len()).find(|&i| starts_with_ci(chars, i, pat))
}

/// `<name` followed by whitespace, `>` or `/`.
fn is_open_tag(chars: &[char], at: usize, name: &str) -> bool {
    chars.get(at) == Some(&'<')
        && starts_with_ci(chars, at + 1, name)
        && matches!(
            chars.get(at + 1 + name.len()),
            Some(c) if c.is_whitespace() || *c == '>' || *c == '/'
        )
}

/// Index just past the `>` closing the tag that starts at `at`.
fn skip_tag(chars: &[char], at: usize) -> usize {
    (at..chars.len())
        .find(|&i| chars[i] == '>')
        .map_or(chars.len(), |p| p + 1)
}
