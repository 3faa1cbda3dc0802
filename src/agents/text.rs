// Text helpers shared by the agents: truncation, chunking, and pulling
// structured bodies out of free-form model replies.

use serde_json::Value;

/// Cut `text` to at most `max_chars` characters
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Split `text` into at most `max_chunks` pieces of at most `max_chars`
/// characters, breaking on line boundaries where possible.
pub fn chunk_text(text: &str, max_chars: usize, max_chunks: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    fn flush(current: &mut String, current_len: &mut usize, chunks: &mut Vec<String>) {
        let trimmed = current.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
        current.clear();
        *current_len = 0;
    }

    for line in text.lines() {
        let mut rest = line;
        loop {
            let rest_len = rest.chars().count();
            let needed = if current_len == 0 { rest_len } else { rest_len + 1 };

            if current_len + needed <= max_chars {
                if current_len > 0 {
                    current.push('\n');
                }
                current.push_str(rest);
                current_len += needed;
                break;
            }

            if current_len > 0 {
                flush(&mut current, &mut current_len, &mut chunks);
                continue;
            }

            // A single line longer than a whole chunk gets a hard split
            let head = truncate_chars(rest, max_chars);
            current.push_str(head);
            rest = &rest[head.len()..];
            flush(&mut current, &mut current_len, &mut chunks);
            if rest.is_empty() {
                break;
            }
        }

        if chunks.len() >= max_chunks {
            break;
        }
    }

    if chunks.len() < max_chunks {
        flush(&mut current, &mut current_len, &mut chunks);
    }
    chunks.truncate(max_chunks);
    chunks
}

/// Whether `line` reads like a heading carrying `title`
fn is_heading_for(line: &str, title: &str) -> bool {
    let heading = line.trim().trim_start_matches('#').trim().to_lowercase();
    let title = title.trim().to_lowercase();
    !title.is_empty()
        && heading.contains(&title)
        && heading.chars().count() <= title.chars().count() + 20
}

/// Text under the heading that names `title`, up to the heading for
/// `next_title` or `max_chars` characters. `None` when no line in the
/// document looks like that heading.
pub fn section_text(
    text: &str,
    title: &str,
    next_title: Option<&str>,
    max_chars: usize,
) -> Option<String> {
    let mut lines = text.lines().skip_while(|line| !is_heading_for(line, title));
    lines.next()?;

    let mut kept: Vec<&str> = Vec::new();
    let mut kept_chars = 0usize;
    for line in lines {
        if next_title.is_some_and(|next| is_heading_for(line, next)) {
            break;
        }
        kept_chars += line.chars().count() + 1;
        kept.push(line);
        if kept_chars > max_chars {
            break;
        }
    }

    let body = kept.join("\n");
    let body = truncate_chars(body.trim(), max_chars).trim();
    (!body.is_empty()).then(|| body.to_string())
}

/// Body of the first fenced code block, if any
pub fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

/// The fenced body when present, otherwise the trimmed text
pub fn strip_code_fences(text: &str) -> &str {
    fenced_block(text).unwrap_or_else(|| text.trim())
}

/// Remove every fenced code block, keeping the surrounding prose
pub fn without_fenced_blocks(text: &str) -> String {
    let mut kept = Vec::new();
    let mut in_fence = false;
    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if !in_fence {
            kept.push(line);
        }
    }
    kept.join("\n")
}

/// Non-whitespace characters of `text` that did not make it into `chunks`
pub fn dropped_chars(text: &str, chunks: &[String]) -> usize {
    let visible = |s: &str| s.chars().filter(|c| !c.is_whitespace()).count();
    let kept: usize = chunks.iter().map(|chunk| visible(chunk)).sum();
    visible(text).saturating_sub(kept)
}

/// Locate a JSON array or object in a model reply.
///
/// A fenced block wins when it holds JSON. Otherwise every `[` or `{` is
/// tried as a start and the longest complete value is returned, so
/// bracketed asides in the surrounding prose are skipped.
pub fn extract_json(text: &str) -> Option<&str> {
    if let Some(found) = fenced_block(text).and_then(longest_json_value) {
        return Some(found);
    }
    longest_json_value(text)
}

fn longest_json_value(text: &str) -> Option<&str> {
    let mut best: Option<&str> = None;
    let mut pos = 0;

    while let Some(offset) = text[pos..].find(|c: char| c == '[' || c == '{') {
        let start = pos + offset;
        let mut values = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();

        match values.next() {
            Some(Ok(_)) => {
                let end = start + values.byte_offset();
                let candidate = &text[start..end];
                if best.map_or(true, |b| candidate.len() > b.len()) {
                    best = Some(candidate);
                }
                pos = end;
            }
            _ => pos = start + 1,
        }
    }

    best
}
