/// Pure text utilities shared by the store sanitizer and the embedding
/// input path.
///
/// These functions contain NO side effects - they take inputs and return
/// outputs without touching databases, making API calls, or performing I/O.
use lazy_static::lazy_static;
use regex::{Captures, Regex};

/// Maximum characters fed to the embedder; longer descriptions are truncated.
pub const MAX_EMBED_TEXT_LENGTH: usize = 10_000;

lazy_static! {
    static ref HTML_DETECTION: Regex = Regex::new(r"<[a-zA-Z][^>]*>").unwrap();
    static ref BLOCK_ELEMENTS: Regex = Regex::new(r"(?i)</(div|p|br|h[1-6]|li|tr)>").unwrap();
    static ref LIST_ITEMS: Regex = Regex::new(r"(?i)<li[^>]*>").unwrap();
    static ref HTML_TAGS: Regex = Regex::new(r"<[^>]*>").unwrap();
    static ref SPACES_TABS: Regex = Regex::new(r"[ \t]+").unwrap();
    static ref BLANK_LINES: Regex = Regex::new(r"\n\s*\n").unwrap();
    static ref ENTITIES: Regex = Regex::new(r"&(#x?[0-9a-fA-F]+|[a-zA-Z][a-zA-Z0-9]*);").unwrap();
}

/// Clean and prepare text for embedding or storage.
///
/// Converts HTML to plain text when the input looks like markup, truncates to
/// `max_length` characters when `max_length > 0`, and trims surrounding
/// whitespace. Returns the cleaned text and whether HTML was detected.
pub fn preprocess_text(text: &str, max_length: usize) -> (String, bool) {
    if text.is_empty() {
        return (String::new(), false);
    }

    let mut was_html = false;
    let mut text = if HTML_DETECTION.is_match(text) {
        was_html = true;
        convert_html_to_text(text)
    } else {
        text.to_string()
    };

    if max_length > 0 && text.len() > max_length {
        let end = floor_char_boundary(&text, max_length);
        text.truncate(end);
    }

    (text.trim().to_string(), was_html)
}

/// Convert HTML content to plain text.
///
/// Block-level closing tags become line breaks, list items become bullets,
/// remaining tags are stripped and whitespace is collapsed.
pub fn convert_html_to_text(html: &str) -> String {
    let text = unescape_entities(html);
    let text = BLOCK_ELEMENTS.replace_all(&text, "\n");
    let text = LIST_ITEMS.replace_all(&text, "\n\u{2022} ");
    let text = HTML_TAGS.replace_all(&text, " ");
    let text = SPACES_TABS.replace_all(&text, " ");
    let text = BLANK_LINES.replace_all(&text, "\n");
    text.trim().to_string()
}

/// Decode HTML entities: the named entities that appear in job-board payloads
/// plus all numeric character references.
fn unescape_entities(text: &str) -> String {
    ENTITIES
        .replace_all(text, |caps: &Captures| {
            let entity = &caps[1];
            if let Some(code) = entity.strip_prefix('#') {
                let parsed = if let Some(hex) = code.strip_prefix('x').or(code.strip_prefix('X')) {
                    u32::from_str_radix(hex, 16).ok()
                } else {
                    code.parse::<u32>().ok()
                };
                return match parsed.and_then(char::from_u32) {
                    Some(c) => c.to_string(),
                    None => caps[0].to_string(),
                };
            }
            match entity {
                "amp" => "&".to_string(),
                "lt" => "<".to_string(),
                "gt" => ">".to_string(),
                "quot" => "\"".to_string(),
                "apos" => "'".to_string(),
                "nbsp" => " ".to_string(),
                "ndash" => "\u{2013}".to_string(),
                "mdash" => "\u{2014}".to_string(),
                "lsquo" => "\u{2018}".to_string(),
                "rsquo" => "\u{2019}".to_string(),
                "ldquo" => "\u{201C}".to_string(),
                "rdquo" => "\u{201D}".to_string(),
                "hellip" => "\u{2026}".to_string(),
                "bull" => "\u{2022}".to_string(),
                "middot" => "\u{00B7}".to_string(),
                "copy" => "\u{00A9}".to_string(),
                "reg" => "\u{00AE}".to_string(),
                "trade" => "\u{2122}".to_string(),
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Largest index `<= max` that falls on a UTF-8 character boundary.
fn floor_char_boundary(text: &str, max: usize) -> usize {
    let mut end = max.min(text.len());
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    end
}
