use regex::Regex;
use serde::{Deserialize, Serialize};

/// Category returned when no rule matches
pub const DEFAULT_CATEGORY: &str = "Other";

/// A rule mapping app-name / window-title patterns to a work category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRule {
    #[serde(default)]
    pub app_patterns: Vec<String>,
    #[serde(default)]
    pub title_patterns: Vec<String>,
    pub category: String,
}

impl ClassificationRule {
    fn new(app_patterns: &[&str], title_patterns: &[&str], category: &str) -> Self {
        Self {
            app_patterns: app_patterns.iter().map(ToString::to_string).collect(),
            title_patterns: title_patterns.iter().map(ToString::to_string).collect(),
            category: category.to_string(),
        }
    }
}

/// Classification result with metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    pub category: String,
    pub source: ClassificationSource,
}

/// Where the classification came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationSource {
    /// Matched the app name of the rule at this position
    AppPattern(usize),
    /// Matched the window title of the rule at this position
    TitlePattern(usize),
    /// No match, using default
    Default,
}

struct CompiledRule {
    app_patterns: Vec<Regex>,
    title_patterns: Vec<Regex>,
    category: String,
}

/// Ordered regex rules; the first matching rule wins
pub struct Classifier {
    rules: Vec<CompiledRule>,
}

impl Classifier {
    /// Compile the rules; patterns that fail to compile are skipped with a warning
    #[must_use]
    pub fn new(rules: &[ClassificationRule]) -> Self {
        let rules = rules
            .iter()
            .map(|rule| CompiledRule {
                app_patterns: compile_all(&rule.app_patterns),
                title_patterns: compile_all(&rule.title_patterns),
                category: rule.category.clone(),
            })
            .collect::<Vec<_>>();
        log::info!("Loaded {} classification rules", rules.len());
        Self { rules }
    }

    /// Classify an observation into a work category. Never fails.
    #[must_use]
    pub fn classify(&self, app_name: &str, window_title: &str) -> String {
        self.classify_full(app_name, window_title).category
    }

    /// Classify with full result metadata
    #[must_use]
    pub fn classify_full(&self, app_name: &str, window_title: &str) -> ClassificationResult {
        for (index, rule) in self.rules.iter().enumerate() {
            if rule.app_patterns.iter().any(|re| re.is_match(app_name)) {
                log::debug!("Classified app '{app_name}' as '{}'", rule.category);
                return ClassificationResult {
                    category: rule.category.clone(),
                    source: ClassificationSource::AppPattern(index),
                };
            }
            if rule.title_patterns.iter().any(|re| re.is_match(window_title)) {
                log::debug!(
                    "Classified by window title '{window_title}' as '{}'",
                    rule.category
                );
                return ClassificationResult {
                    category: rule.category.clone(),
                    source: ClassificationSource::TitlePattern(index),
                };
            }
        }

        log::debug!("'{app_name}' not matched, using '{DEFAULT_CATEGORY}'");
        ClassificationResult {
            category: DEFAULT_CATEGORY.to_string(),
            source: ClassificationSource::Default,
        }
    }
}

fn compile_all(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| match Regex::new(pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                log::warn!("Skipping invalid pattern '{pattern}': {e}");
                None
            }
        })
        .collect()
}

/// Built-in rules covering common desktop applications
#[must_use]
pub fn default_rules() -> Vec<ClassificationRule> {
    vec![
        ClassificationRule::new(
            &["Microsoft Word", "Google Docs", "Pages", "Quip", "Notion", "Obsidian", "Bear"],
            &[r"(?i)\.docx?\b", r"(?i)\.md\b"],
            "Document Editing",
        ),
        ClassificationRule::new(
            &["Outlook", "Gmail", "Thunderbird", "Mail"],
            &[r"(?i)\binbox\b", r"(?i)\bcompose\b", r"(?i)\breply\b"],
            "Email & Communication",
        ),
        ClassificationRule::new(
            &["Slack", "Discord", "Microsoft Teams", "Messages"],
            &[],
            "Email & Communication",
        ),
        ClassificationRule::new(
            &["Zoom", "Teams", "Webex", "Google Meet", "FaceTime"],
            &[r"(?i)\bmeeting\b", r"(?i)\bcall\b"],
            "Meetings",
        ),
        ClassificationRule::new(
            &["Microsoft Excel", "Google Sheets", "Numbers"],
            &[r"(?i)\.xlsx?\b"],
            "Spreadsheets",
        ),
        ClassificationRule::new(
            &["Microsoft PowerPoint", "Google Slides", "Keynote"],
            &[r"(?i)\.pptx?\b"],
            "Presentations",
        ),
        ClassificationRule::new(
            &["Jira", "Asana", "Trello", "Linear", "ClickUp"],
            &[],
            "Project Management",
        ),
        ClassificationRule::new(
            &["Figma", "Sketch", "Adobe Photoshop", "Adobe Illustrator", "Canva"],
            &[],
            "Creative Tools",
        ),
        ClassificationRule::new(
            &[
                "Visual Studio Code", "Code", "IntelliJ", "PyCharm", "WebStorm", "Xcode",
                "Sublime Text", "Vim", "Neovim", "Terminal", "iTerm", "Warp", "Alacritty",
                "kitty", "Hyper",
            ],
            &[],
            "Development",
        ),
        ClassificationRule::new(
            &["Chrome", "Firefox", "Safari", "Edge", "Brave", "Arc", "Opera"],
            &[],
            "Research & Browsing",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_matching_rule_wins() {
        let classifier = Classifier::new(&default_rules());
        assert_eq!(classifier.classify("Code", "main.rs - flowtrack"), "Development");
        assert_eq!(classifier.classify("Slack", "#general"), "Email & Communication");
        assert_eq!(
            classifier.classify("Google Chrome", "Rust docs"),
            "Research & Browsing"
        );
    }

    #[test]
    fn test_title_pattern_matches_when_app_unknown() {
        let classifier = Classifier::new(&default_rules());
        let result = classifier.classify_full("LibreOffice", "budget.xlsx");
        assert_eq!(result.category, "Spreadsheets");
        assert!(matches!(result.source, ClassificationSource::TitlePattern(_)));
    }

    #[test]
    fn test_unmatched_falls_back_to_other() {
        let classifier = Classifier::new(&default_rules());
        let result = classifier.classify_full("Solitaire", "Klondike");
        assert_eq!(result.category, DEFAULT_CATEGORY);
        assert_eq!(result.source, ClassificationSource::Default);
    }

    #[test]
    fn test_invalid_pattern_is_skipped() {
        let rules = vec![
            ClassificationRule::new(&["(broken"], &[], "Broken"),
            ClassificationRule::new(&["Code"], &[], "Development"),
        ];
        let classifier = Classifier::new(&rules);
        assert_eq!(classifier.classify("Code", ""), "Development");
    }

    #[test]
    fn test_empty_rules_classify_everything_as_other() {
        let classifier = Classifier::new(&[]);
        assert_eq!(classifier.classify("Code", "main.rs"), DEFAULT_CATEGORY);
    }
}
