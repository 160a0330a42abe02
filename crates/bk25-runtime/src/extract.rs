//! Fenced-code extraction for chat responses.
//!
//! Only the first fenced block is extracted; the visible text gets a short
//! placeholder notice in its place.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedCode {
    pub language: String,
    pub code: String,
    pub filename: String,
}

/// Pull the first fenced code block out of `text`.
///
/// Returns the extracted code and the rewritten visible text, or `None` when
/// no complete fenced block exists. The fence's info string becomes the
/// language (default `script`).
pub fn extract_first_code_block(text: &str) -> Option<(ExtractedCode, String)> {
    let start = text.find("```")?;
    let end_rel = text[start + 3..].find("```")?;
    let end = start + 3 + end_rel;

    let section = &text[start + 3..end];
    let (info_line, body) = match section.split_once('\n') {
        Some((first, rest)) => (first.trim(), rest),
        None => ("", section),
    };

    let language = if !info_line.is_empty() && info_line.chars().all(|c| c.is_alphabetic()) {
        info_line.to_lowercase()
    } else {
        "script".to_string()
    };
    // An info string that is not a language label is part of the code.
    let code = if language == "script" && !info_line.is_empty() {
        section.trim()
    } else {
        body.trim()
    };

    let extracted = ExtractedCode {
        filename: format!("Generated {} Script", capitalize(&language)),
        code: code.to_string(),
        language: language.clone(),
    };

    let notice = format!(
        "[{} script generated - see the extracted code]",
        language.to_uppercase()
    );
    let rewritten = format!("{}{}{}", &text[..start], notice, &text[end + 3..]);
    Some((extracted, rewritten))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
