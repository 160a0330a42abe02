//! Post-generation output parsing: fence stripping, documentation block
//! extraction, and filename inference.

use bk25_core::types::Platform;

/// Parsed generator output.
#[derive(Debug, Clone)]
pub struct ParsedScript {
    pub script: String,
    pub filename: String,
    pub documentation: Option<String>,
}

/// Parse raw LLM or template output into its final shape.
pub fn parse_generated(raw: &str, description: &str, platform: Platform) -> ParsedScript {
    let script = strip_markdown_fences(raw);
    let documentation = extract_documentation(&script, platform);
    let filename = infer_filename(&script, description, platform);
    ParsedScript {
        script,
        filename,
        documentation,
    }
}

/// Remove markdown code fencing the LLM may have wrapped around the script.
///
/// Handles a fully fenced body (with or without an info string) and stray
/// fence lines; unfenced text passes through unchanged.
pub fn strip_markdown_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.contains("```") {
        return trimmed.to_string();
    }

    if trimmed.starts_with("```") {
        // Drop the opening fence line (``` or ```lang) and a trailing fence.
        let after_open = match trimmed.split_once('\n') {
            Some((_, rest)) => rest,
            None => return String::new(),
        };
        let body = after_open
            .rfind("```")
            .map(|pos| &after_open[..pos])
            .unwrap_or(after_open);
        return body.trim().to_string();
    }

    // Mixed content: keep everything except fence lines.
    trimmed
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn comment_prefix(platform: Platform) -> &'static str {
    match platform {
        Platform::PowerShell | Platform::Bash => "#",
        Platform::AppleScript => "--",
    }
}

/// Trailing run of comment lines, with markers removed. Returns `None` when
/// the script does not end in a comment block.
pub fn extract_documentation(script: &str, platform: Platform) -> Option<String> {
    let prefix = comment_prefix(platform);
    let mut doc_lines: Vec<&str> = Vec::new();

    for line in script.lines().rev() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if doc_lines.is_empty() {
                continue; // trailing blank lines before the block
            }
            break;
        }
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            // shebang lines are not documentation
            if trimmed.starts_with("#!") {
                break;
            }
            doc_lines.push(rest.trim());
        } else {
            break;
        }
    }

    if doc_lines.is_empty() {
        return None;
    }
    doc_lines.reverse();
    Some(doc_lines.join("\n"))
}

/// Derive a filename from the first meaningful declaration, falling back to a
/// slug of the description's first line.
pub fn infer_filename(script: &str, description: &str, platform: Platform) -> String {
    let ext = platform.file_extension();

    if let Some(name) = first_declaration(script, platform) {
        return format!("{}.{}", name, ext);
    }

    let first_line = description.lines().next().unwrap_or(description);
    let slug = slugify(first_line);
    if slug.is_empty() {
        format!("script.{}", ext)
    } else {
        format!("{}.{}", slug, ext)
    }
}

fn first_declaration(script: &str, platform: Platform) -> Option<String> {
    for line in script.lines() {
        let trimmed = line.trim();
        match platform {
            Platform::PowerShell | Platform::Bash => {
                if let Some(rest) = trimmed.strip_prefix("function ") {
                    let name: String = rest
                        .chars()
                        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
                        .collect();
                    if !name.is_empty() {
                        return Some(name);
                    }
                }
                if platform == Platform::Bash {
                    // `name() {` style declaration
                    if let Some(paren) = trimmed.find("()") {
                        let name = &trimmed[..paren];
                        if !name.is_empty()
                            && name
                                .chars()
                                .all(|c| c.is_ascii_alphanumeric() || c == '_')
                        {
                            return Some(name.to_string());
                        }
                    }
                }
            }
            Platform::AppleScript => {
                if let Some(rest) = trimmed.strip_prefix("on ") {
                    let name: String = rest
                        .chars()
                        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                        .collect();
                    if !name.is_empty() && name != "run" && name != "error" {
                        return Some(name);
                    }
                }
            }
        }
    }
    None
}

fn slugify(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_end_matches('-').to_string()
}
