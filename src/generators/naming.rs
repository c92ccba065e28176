//! Target directory name generator.
//!
//! Templates use `{Name}`, `{Version}`, `{Vendor}` and `{Id}` tokens
//! (case-insensitive). Tokens with no value are dropped together with the
//! separators around them.

use crate::models::software::SoftwareEntry;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// A named template offered to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingTemplate {
    pub name: String,
    pub pattern: String,
    pub description: String,
}

/// Renders a target directory name for a software entry.
pub trait NamingEngine: Send + Sync {
    /// Render `pattern` for `entry`. Pure.
    fn generate_name(&self, entry: &SoftwareEntry, pattern: &str) -> String;

    /// Built-in templates.
    fn preset_templates(&self) -> Vec<NamingTemplate>;
}

/// Default token-substitution engine.
#[derive(Debug, Default, Clone)]
pub struct TemplateNamingEngine;

fn token_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\{(name|version|vendor|id)\}").ok())
        .as_ref()
}

fn empty_group_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(\s*\)|\[\s*\]").ok()).as_ref()
}

impl NamingEngine for TemplateNamingEngine {
    fn generate_name(&self, entry: &SoftwareEntry, pattern: &str) -> String {
        let mut rendered = pattern.to_string();
        if let Some(re) = token_regex() {
            rendered = re
                .replace_all(pattern, |caps: &Captures| {
                    let value = match caps[1].to_lowercase().as_str() {
                        "name" => Some(entry.name.as_str()),
                        "version" => entry.version.as_deref(),
                        "vendor" => entry.vendor.as_deref(),
                        "id" => Some(entry.id.as_str()),
                        _ => None,
                    };
                    value.map(sanitize_filename).unwrap_or_default()
                })
                .into_owned();
        }
        if let Some(re) = empty_group_regex() {
            rendered = re.replace_all(&rendered, "").into_owned();
        }

        let cleaned = tidy_separators(&rendered);
        let cleaned = sanitize_filename(&cleaned);

        if cleaned.is_empty() {
            let fallback = sanitize_filename(entry.name.trim());
            if fallback.is_empty() {
                "Software".to_string()
            } else {
                fallback
            }
        } else {
            cleaned
        }
    }

    fn preset_templates(&self) -> Vec<NamingTemplate> {
        vec![
            NamingTemplate {
                name: "Name".to_string(),
                pattern: "{Name}".to_string(),
                description: "Software name only".to_string(),
            },
            NamingTemplate {
                name: "Name and version".to_string(),
                pattern: "{Name} {Version}".to_string(),
                description: "Name followed by version".to_string(),
            },
            NamingTemplate {
                name: "Vendor and name".to_string(),
                pattern: "{Vendor} - {Name}".to_string(),
                description: "Publisher, then name".to_string(),
            },
            NamingTemplate {
                name: "Full".to_string(),
                pattern: "{Vendor} - {Name} {Version}".to_string(),
                description: "Publisher, name and version".to_string(),
            },
        ]
    }
}

/// Collapse whitespace and strip separators left dangling by empty tokens.
fn tidy_separators(s: &str) -> String {
    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut out = collapsed
        .trim_matches(|c: char| c == '-' || c == '_' || c == '.' || c.is_whitespace())
        .to_string();
    while out.contains("- -") {
        out = out.replace("- -", "-");
    }
    out
}

/// Sanitize a string for use as a single path component.
pub fn sanitize_filename(s: &str) -> String {
    let mapped: String = s
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            _ => c,
        })
        .collect();
    // Windows rejects trailing dots and spaces.
    mapped
        .trim_end_matches(|c| c == '.' || c == ' ')
        .trim_start()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> SoftwareEntry {
        SoftwareEntry::new("app-1", "App", "C:\\App")
    }

    #[test]
    fn test_generate_name_basic() {
        let engine = TemplateNamingEngine;
        assert_eq!(engine.generate_name(&entry(), "{Name}"), "App");
        assert_eq!(engine.generate_name(&entry(), "{name}"), "App");
    }

    #[test]
    fn test_missing_tokens_are_dropped() {
        let engine = TemplateNamingEngine;
        assert_eq!(engine.generate_name(&entry(), "{Vendor} - {Name} {Version}"), "App");
        assert_eq!(engine.generate_name(&entry(), "{Name} ({Version})"), "App");

        let full = entry().with_vendor("Acme").with_version("2.1");
        assert_eq!(
            engine.generate_name(&full, "{Vendor} - {Name} {Version}"),
            "Acme - App 2.1"
        );
    }

    #[test]
    fn test_values_are_sanitized() {
        let engine = TemplateNamingEngine;
        let odd = SoftwareEntry::new("x", "Tools: A/B?", "C:\\Tools");
        assert_eq!(engine.generate_name(&odd, "{Name}"), "Tools_ A_B");
    }

    #[test]
    fn test_empty_render_falls_back_to_name() {
        let engine = TemplateNamingEngine;
        assert_eq!(engine.generate_name(&entry(), "{Vendor}"), "App");
        assert_eq!(engine.generate_name(&entry(), ""), "App");
    }

    #[test]
    fn test_presets_render() {
        let engine = TemplateNamingEngine;
        for preset in engine.preset_templates() {
            assert!(!engine.generate_name(&entry(), &preset.pattern).is_empty());
        }
    }
}
