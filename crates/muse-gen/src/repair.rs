//! Lenient decoding of model output.
//!
//! Models asked for strict JSON still produce near misses: Markdown code
//! fences, prose around the object, JavaScript-style unquoted keys and
//! trailing commas. `repair_json` rewrites those into valid JSON without
//! touching the contents of string literals; `parse_captions` then decodes
//! and cleans the caption list.

use crate::error::{GenerationError, Result};
use muse_core::Caption;
use serde_json::Value;

/// Caption text used when the model omitted it.
pub const FALLBACK_TEXT: &str = "...";
/// Tone label used when the model omitted it.
pub const FALLBACK_TONE: &str = "vibe";

/// Decoded captions and hashtags, before a timestamp and model are attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCaptions {
    pub captions: Vec<Caption>,
    pub hashtags: Vec<String>,
}

/// Rewrite a near-miss JSON payload into valid JSON.
pub fn repair_json(raw: &str) -> String {
    let unfenced = raw.replace("```json", "").replace("```", "");
    let body = match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => &unfenced[start..=end],
        _ => unfenced.as_str(),
    };

    let chars: Vec<char> = body.chars().collect();
    let mut out = String::with_capacity(body.len() + 16);
    let mut in_string = false;
    let mut escaped = false;
    // last non-whitespace char emitted outside a string
    let mut last_structural: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
                last_structural = Some('"');
            }
            i += 1;
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
                i += 1;
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                    last_structural = Some(c);
                }
                i += 1;
            }
            c if is_key_char(c) && matches!(last_structural, Some('{') | Some(',')) => {
                let start = i;
                while i < chars.len() && is_key_char(chars[i]) {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let after = chars[i..].iter().position(|ch| !ch.is_whitespace());
                let is_key = after.is_some_and(|offset| chars[i + offset] == ':');
                if is_key {
                    out.push('"');
                    out.push_str(&word);
                    out.push('"');
                } else {
                    out.push_str(&word);
                }
                last_structural = word.chars().last();
            }
            c => {
                out.push(c);
                if !c.is_whitespace() {
                    last_structural = Some(c);
                }
                i += 1;
            }
        }
    }
    out
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Decode model output into cleaned captions.
///
/// `id_prefix` makes caption ids unique per result (`<prefix>-<index>`).
pub fn parse_captions(raw: &str, id_prefix: &str) -> Result<ParsedCaptions> {
    if raw.trim().is_empty() {
        return Err(GenerationError::MalformedResponse("empty response".into()));
    }
    let repaired = repair_json(raw);
    let value: Value = serde_json::from_str(&repaired).map_err(|err| {
        log::debug!("unparseable payload after repair: {repaired}");
        GenerationError::MalformedResponse(format!("invalid JSON format: {err}"))
    })?;

    let captions: Vec<Caption> = value
        .get("captions")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .enumerate()
                .map(|(index, entry)| clean_caption(entry, format!("{id_prefix}-{index}")))
                .collect()
        })
        .unwrap_or_default();

    if captions.is_empty() {
        return Err(GenerationError::MalformedResponse(
            "invalid JSON structure: missing captions".into(),
        ));
    }

    let hashtags = value
        .get("hashtags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(ParsedCaptions { captions, hashtags })
}

fn field<'a>(entry: &'a Value, key: &str) -> Option<&'a str> {
    entry.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Normalize one caption: the emoji is removed from the text, wrapping
/// quotes are stripped and trailing quote characters trimmed.
fn clean_caption(entry: &Value, id: String) -> Caption {
    let emoji = field(entry, "emoji").unwrap_or_default().to_string();
    let mut text = field(entry, "text").unwrap_or(FALLBACK_TEXT).to_string();

    if !emoji.is_empty() {
        text = text.replace(&emoji, "").trim().to_string();
    }
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        text = text[1..text.len() - 1].trim().to_string();
    }
    let text = text.trim_end_matches(['"', '\'']).trim().to_string();

    Caption {
        id,
        text,
        translation: field(entry, "translation").unwrap_or_default().to_string(),
        emoji,
        tone: field(entry, "tone").unwrap_or(FALLBACK_TONE).to_string(),
    }
}
