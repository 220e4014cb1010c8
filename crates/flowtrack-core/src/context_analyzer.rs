//! Refines a work category into a sub-category and a human-readable label.
//!
//! Priority:
//! 1. User-configured rules for the category (named groups feed the label)
//! 2. Built-in title parsing for common apps (email subjects, documents, files)
//! 3. The window title with the trailing app name stripped
//! 4. The category itself

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

/// Longest label kept before truncation
const MAX_LABEL_CHARS: usize = 80;

/// Labels too generic to describe a piece of work
const GENERIC_LABELS: &[&str] = &[
    "new tab", "untitled", "google", "search", "home", "about:blank", "loading", "gmail",
    "inbox", "mail", "outlook", "calendar", "google chrome", "firefox", "safari", "edge",
    "brave", "arc", "electron", "code", "terminal", "finder", "desktop",
];

// Dash variants seen in window titles: hyphen, en dash, em dash.
const DASH: &str = r"[-\x{2013}\x{2014}]";
const DASH_CHARS: [char; 3] = ['-', '\u{2013}', '\u{2014}'];

const STRIP_SUFFIXES: &[&str] = &[
    "Google Chrome|Firefox|Safari|Microsoft Edge|Brave|Arc|Opera",
    "Microsoft Word|Microsoft Excel|Microsoft PowerPoint",
    "Google Docs|Google Sheets|Google Slides",
    "Pages|Numbers|Keynote",
    "Visual Studio Code|VS Code|Code",
    "Sublime Text|Atom|Vim|Neovim|Emacs",
    "Slack|Discord|Microsoft Teams",
    "Outlook|Mail|Thunderbird",
    r"Figma|Sketch|Adobe \w+",
    "Notion|Obsidian|Bear|Evernote",
    "Terminal|iTerm2?|Warp|Alacritty|Hyper",
    "Quip|Confluence|Coda",
];

/// (category, label template, patterns) for the built-in title parser.
/// `{name}` placeholders are filled from named capture groups; `~` stands for a dash.
const SMART_PATTERNS: &[(&str, &str, &[&str])] = &[
    (
        "Email & Communication",
        "Emailing: {subject}",
        &[
            r"(?i)(?:re:\s*|fw:\s*|fwd:\s*)*(?P<subject>.+?)\s*~\s*(?P<recipient>[^-\x{2013}\x{2014}]+@[^-\x{2013}\x{2014}]+)",
            r"(?i)(?:re:\s*|fw:\s*|fwd:\s*)*(?P<subject>.+?)(?:\s*~|$)",
        ],
    ),
    (
        "Email & Communication",
        "Reading emails",
        &[r"(?i)^(inbox|mail|all mail|sent|drafts|spam|trash|junk)\b"],
    ),
    (
        "Email & Communication",
        "Chat: {channel}",
        &[
            r"(?P<channel>.+?)\s*~\s*(?:Slack|Discord)",
            r"(?i)(?:slack|discord)\s*~\s*(?P<channel>.+)",
        ],
    ),
    (
        "Meetings",
        "Meeting: {subject}",
        &[
            r"(?i)(?P<subject>.+?)\s*~\s*(?:zoom|teams|webex|google meet|meet)",
            r"(?i)(?:zoom|teams|webex|meet)\s*~\s*(?P<subject>.+)",
        ],
    ),
    (
        "Document Editing",
        "Writing: {doc}",
        &[
            r"(?P<doc>.+?)\s*~\s*(?:Google Docs|Quip|Notion|Pages)",
            r"(?P<doc>.+?)\s*~\s*(?:Microsoft Word|Word)",
            r"(?P<doc>.+?)\.docx?\b",
            r"(?P<doc>.+?)\.md\b",
        ],
    ),
    (
        "Spreadsheets",
        "Spreadsheet: {doc}",
        &[
            r"(?P<doc>.+?)\s*~\s*(?:Google Sheets|Microsoft Excel|Numbers)",
            r"(?P<doc>.+?)\.xlsx?\b",
        ],
    ),
    (
        "Presentations",
        "Presentation: {doc}",
        &[
            r"(?P<doc>.+?)\s*~\s*(?:Google Slides|Microsoft PowerPoint|Keynote)",
            r"(?P<doc>.+?)\.pptx?\b",
        ],
    ),
    (
        "Development",
        "Coding: {file}",
        &[
            r"(?P<file>[^\s]+\.\w{1,5})\s*~\s*(?P<project>.+)",
            r"(?P<project>.+?)\s*~\s*(?:Visual Studio|VS Code|Code|IntelliJ|PyCharm|WebStorm)",
        ],
    ),
    (
        "Research & Browsing",
        "Browsing: {page}",
        &[r"(?P<page>.+?)\s*~\s*(?:Google Chrome|Firefox|Safari|Edge|Brave|Arc)"],
    ),
    (
        "Project Management",
        "Task: {item}",
        &[
            r"(?P<item>.+?)\s*~\s*(?:Jira|Asana|Trello|Linear|ClickUp)",
            r"(?i)(?:jira|asana|trello|linear)\s*~\s*(?P<item>.+)",
        ],
    ),
    (
        "Creative Tools",
        "Designing: {file}",
        &[r"(?P<file>.+?)\s*~\s*(?:Figma|Sketch|Adobe \w+|Canva)"],
    ),
];

/// A user rule refining one category into a fixed sub-category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextRule {
    pub category: String,
    #[serde(default)]
    pub title_patterns: Vec<String>,
    pub sub_category: String,
}

/// Derived classification of one observation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryResult {
    pub category: String,
    pub sub_category: String,
    pub label: String,
}

impl CategoryResult {
    fn plain(category: &str, sub_category: String) -> Self {
        Self {
            category: category.to_string(),
            label: sub_category.clone(),
            sub_category,
        }
    }
}

struct CompiledContextRule {
    category: String,
    patterns: Vec<Regex>,
    sub_category: String,
}

struct SmartPattern {
    category: &'static str,
    template: &'static str,
    patterns: Vec<Regex>,
}

/// Pure, non-failing title analyzer
pub struct ContextAnalyzer {
    rules: Vec<CompiledContextRule>,
    smart: Vec<SmartPattern>,
    suffixes: Vec<Regex>,
}

impl ContextAnalyzer {
    #[must_use]
    pub fn new(rules: &[ContextRule]) -> Self {
        let rules = rules
            .iter()
            .map(|rule| CompiledContextRule {
                category: rule.category.clone(),
                patterns: rule
                    .title_patterns
                    .iter()
                    .filter_map(|p| Regex::new(p).ok())
                    .collect(),
                sub_category: rule.sub_category.clone(),
            })
            .collect();

        let smart = SMART_PATTERNS
            .iter()
            .map(|&(category, template, patterns)| SmartPattern {
                category,
                template,
                patterns: patterns
                    .iter()
                    .filter_map(|p| Regex::new(&p.replace('~', DASH)).ok())
                    .collect(),
            })
            .collect();

        let suffixes = STRIP_SUFFIXES
            .iter()
            .filter_map(|names| Regex::new(&format!(r"(?i)\s*{DASH}\s*(?:{names})$")).ok())
            .collect();

        Self {
            rules,
            smart,
            suffixes,
        }
    }

    /// Refine `category` using the window title. Never fails; falls back to the category.
    #[must_use]
    pub fn analyze(&self, _app_name: &str, window_title: &str, category: &str) -> CategoryResult {
        for rule in self.rules.iter().filter(|r| r.category == category) {
            let matched = rule
                .patterns
                .iter()
                .find_map(|re| re.captures(window_title).map(|caps| (re, caps)));
            if let Some((re, caps)) = matched {
                return CategoryResult {
                    category: category.to_string(),
                    sub_category: rule.sub_category.clone(),
                    label: rule_label(&rule.sub_category, re, &caps),
                };
            }
        }

        if let Some(sub) = self.smart_parse(window_title, category) {
            return CategoryResult::plain(category, sub);
        }

        let clean = self.clean_title(window_title);
        if clean.chars().count() > 4
            && !is_generic(&clean)
            && !clean.eq_ignore_ascii_case(category)
        {
            return CategoryResult::plain(category, clean);
        }

        CategoryResult::plain(category, category.to_string())
    }

    fn smart_parse(&self, window_title: &str, category: &str) -> Option<String> {
        for smart in self.smart.iter().filter(|s| s.category == category) {
            for re in &smart.patterns {
                let Some(caps) = re.captures(window_title) else {
                    continue;
                };
                let mut sub = smart.template.to_string();
                for name in re.capture_names().flatten() {
                    if let Some(value) = caps.name(name) {
                        let value = value
                            .as_str()
                            .trim()
                            .trim_end_matches(|c: char| c == ' ' || DASH_CHARS.contains(&c));
                        if !value.is_empty() {
                            sub = sub.replace(&format!("{{{name}}}"), value);
                        }
                    }
                }
                let sub = remove_placeholders(&sub);
                let sub = sub.trim_matches(|c: char| c == ':' || c == ' ');
                if sub.chars().count() < 3 || is_generic(sub) {
                    continue;
                }
                return Some(truncate_label(sub));
            }
        }
        None
    }

    fn clean_title(&self, window_title: &str) -> String {
        let mut cleaned = window_title.to_string();
        for re in &self.suffixes {
            cleaned = re.replace(&cleaned, "").into_owned();
        }
        cleaned
            .trim_matches(|c: char| c == ' ' || DASH_CHARS.contains(&c))
            .to_string()
    }
}

fn rule_label(sub_category: &str, re: &Regex, caps: &Captures<'_>) -> String {
    let parts = re
        .capture_names()
        .flatten()
        .filter_map(|name| caps.name(name))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();
    if parts.is_empty() {
        sub_category.to_string()
    } else {
        format!("{sub_category}: {}", parts.join(" "))
    }
}

/// Drop `{name}` placeholders left unfilled by the template
fn remove_placeholders(template: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        match rest[open..].find('}') {
            Some(close) => rest = &rest[open + close + 1..],
            None => {
                rest = &rest[open..];
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

fn is_generic(label: &str) -> bool {
    let lowered = label.trim().to_lowercase();
    GENERIC_LABELS.contains(&lowered.as_str())
}

fn truncate_label(label: &str) -> String {
    if label.chars().count() > MAX_LABEL_CHARS {
        let kept: String = label.chars().take(MAX_LABEL_CHARS - 3).collect();
        format!("{kept}...")
    } else {
        label.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> ContextAnalyzer {
        ContextAnalyzer::new(&[])
    }

    #[test]
    fn test_user_rule_takes_priority() {
        let analyzer = ContextAnalyzer::new(&[ContextRule {
            category: "Document Editing".to_string(),
            title_patterns: vec![r"(?P<case>\w+ v\. \w+)".to_string()],
            sub_category: "Contract Draft".to_string(),
        }]);
        let result = analyzer.analyze("Word", "Smith v. Jones - Word", "Document Editing");
        assert_eq!(result.sub_category, "Contract Draft");
        assert_eq!(result.label, "Contract Draft: Smith v. Jones");
    }

    #[test]
    fn test_user_rule_only_applies_to_its_category() {
        let analyzer = ContextAnalyzer::new(&[ContextRule {
            category: "Meetings".to_string(),
            title_patterns: vec!["(?i)report".to_string()],
            sub_category: "Report review".to_string(),
        }]);
        let result = analyzer.analyze("Word", "Quarterly report.docx", "Document Editing");
        assert_eq!(result.sub_category, "Writing: Quarterly report");
    }

    #[test]
    fn test_development_file_is_extracted() {
        let result = analyzer().analyze(
            "Code",
            "parser.rs - flowtrack - Visual Studio Code",
            "Development",
        );
        assert_eq!(result.sub_category, "Coding: parser.rs");
        assert_eq!(result.label, result.sub_category);
    }

    #[test]
    fn test_browser_page_with_en_dash() {
        let result = analyzer().analyze(
            "Google Chrome",
            "Tokio tutorial \u{2013} Google Chrome",
            "Research & Browsing",
        );
        assert_eq!(result.sub_category, "Browsing: Tokio tutorial");
    }

    #[test]
    fn test_generic_browser_tab_falls_back_to_category() {
        let result = analyzer().analyze("Safari", "New Tab", "Research & Browsing");
        assert_eq!(result.sub_category, "Research & Browsing");
    }

    #[test]
    fn test_clean_title_strips_app_suffix() {
        let result = analyzer().analyze("Figma", "Onboarding flow v2", "Other");
        assert_eq!(result.sub_category, "Onboarding flow v2");

        let result = analyzer().analyze("Obsidian", "Weekly planning - Obsidian", "Other");
        assert_eq!(result.sub_category, "Weekly planning");
    }

    #[test]
    fn test_short_title_falls_back_to_category() {
        let result = analyzer().analyze("Solitaire", "Game", "Other");
        assert_eq!(result.sub_category, "Other");
        assert_eq!(result.label, "Other");
    }

    #[test]
    fn test_unfilled_placeholders_are_removed() {
        assert_eq!(remove_placeholders("Coding: {file}"), "Coding: ");
        assert_eq!(remove_placeholders("Reading emails"), "Reading emails");
        assert_eq!(remove_placeholders("odd {open"), "odd {open");
    }

    #[test]
    fn test_email_subject_strips_reply_prefix() {
        let result = analyzer().analyze(
            "Outlook",
            "RE: Budget approval - alice@example.com - Outlook",
            "Email & Communication",
        );
        assert_eq!(result.sub_category, "Emailing: Budget approval");
    }

    #[test]
    fn test_long_labels_are_truncated() {
        let title = format!("{} - Google Chrome", "a".repeat(120));
        let result = analyzer().analyze("Google Chrome", &title, "Research & Browsing");
        assert_eq!(result.sub_category.chars().count(), MAX_LABEL_CHARS);
        assert!(result.sub_category.ends_with("..."));
    }
}
