//! Mission briefing text shown beside the players.
//!
//! Status markers (`Critical`, `Danger`, `Healthy`) are picked out of plain
//! text so the panel can colour them.

use anyhow::{Context, Result};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

const FALLBACK_TITLE: &str = "Briefing";

fn marker_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        // "Critical:" and "Critical):" open a labelled subsection; a bare
        // "Critical" is a passing mention
        Regex::new(r"\b(Critical|Danger|Healthy)\b(\)?:\s*)?").expect("marker pattern is valid")
    })
}

fn assessment_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?i)\b(critical|danger|healthy)\b").expect("assessment pattern is valid")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Critical,
    Danger,
    Healthy,
}

impl Marker {
    fn from_word(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "critical" => Some(Self::Critical),
            "danger" => Some(Self::Danger),
            "healthy" => Some(Self::Healthy),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL:",
            Self::Danger => "DANGER:",
            Self::Healthy => "HEALTHY:",
        }
    }

    pub fn color(self) -> [u8; 3] {
        match self {
            Self::Critical => [0xef, 0x44, 0x44],
            Self::Danger => [0xf9, 0x73, 0x16],
            Self::Healthy => [0x22, 0xc5, 0x5e],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Plain(String),
    /// Opens a subsection, rendered as the marker's label.
    Label(Marker),
    Mention(Marker, String),
}

/// Split `text` into plain runs and highlighted status markers.
pub fn annotate(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut plain = String::new();
    let mut cursor = 0;

    for caps in marker_regex().captures_iter(text) {
        let (Some(whole), Some(word)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let Some(marker) = Marker::from_word(word.as_str()) else {
            continue;
        };

        let segment = if caps.get(2).is_some() {
            Segment::Label(marker)
        } else if text[whole.end()..].starts_with(')') {
            // "Critical)" without a colon is left alone
            continue;
        } else {
            Segment::Mention(marker, word.as_str().to_string())
        };

        plain.push_str(&text[cursor..whole.start()]);
        if !plain.is_empty() {
            segments.push(Segment::Plain(std::mem::take(&mut plain)));
        }
        segments.push(segment);
        cursor = whole.end();
    }

    plain.push_str(&text[cursor..]);
    if !plain.is_empty() {
        segments.push(Segment::Plain(plain));
    }
    segments
}

/// First status marker mentioned anywhere, in any case, taken as the
/// overall assessment.
pub fn overall_marker(text: &str) -> Option<Marker> {
    assessment_regex()
        .find_iter(text)
        .find_map(|m| Marker::from_word(m.as_str()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Briefing {
    pub sections: Vec<Section>,
    pub assessment: Option<Marker>,
}

impl Briefing {
    /// Split on `## ` headers. Text that has none is kept whole under a
    /// single section rather than dropped.
    pub fn parse(text: &str) -> Self {
        let mut sections = Vec::new();
        let mut title = FALLBACK_TITLE.to_string();
        let mut body = String::new();

        for line in text.lines() {
            if let Some(header) = line.strip_prefix("## ") {
                push_section(&mut sections, &title, &body);
                title = header.trim().to_string();
                body.clear();
            } else {
                body.push_str(line);
                body.push('\n');
            }
        }
        push_section(&mut sections, &title, &body);

        Self {
            sections,
            assessment: overall_marker(text),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read briefing {:?}", path))?;
        Ok(Self::parse(&text))
    }
}

fn push_section(sections: &mut Vec<Section>, title: &str, body: &str) {
    let body = body.trim();
    if body.is_empty() && title == FALLBACK_TITLE {
        return;
    }
    sections.push(Section {
        title: title.to_string(),
        segments: annotate(body),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(s: &str) -> Segment {
        Segment::Plain(s.to_string())
    }

    #[test]
    fn test_labels_and_mentions() {
        let segments = annotate("Overall Danger. Critical): budget gone. Healthy: morale");
        assert_eq!(
            segments,
            vec![
                plain("Overall "),
                Segment::Mention(Marker::Danger, "Danger".to_string()),
                plain(". "),
                Segment::Label(Marker::Critical),
                plain("budget gone. "),
                Segment::Label(Marker::Healthy),
                plain("morale"),
            ]
        );
    }

    #[test]
    fn test_unmarked_text_is_one_segment() {
        assert_eq!(annotate("all quiet"), vec![plain("all quiet")]);
        assert!(annotate("").is_empty());
    }

    #[test]
    fn test_matching_is_case_and_word_sensitive() {
        assert_eq!(annotate("critical Dangerous"), vec![plain("critical Dangerous")]);
        assert_eq!(annotate("(Critical)"), vec![plain("(Critical)")]);
    }

    #[test]
    fn test_overall_marker_is_first_mention() {
        assert_eq!(overall_marker("Healthy now, Critical later"), Some(Marker::Healthy));
        assert_eq!(overall_marker("nothing to report"), None);
    }

    #[test]
    fn test_overall_marker_ignores_case() {
        assert_eq!(overall_marker("critical risk ahead"), Some(Marker::Critical));
        assert_eq!(overall_marker("Status: HEALTHY"), Some(Marker::Healthy));
        assert_eq!(overall_marker("a dangerous climb"), None);

        // highlighting stays case-sensitive
        let briefing = Briefing::parse("critical risk ahead");
        assert_eq!(briefing.assessment, Some(Marker::Critical));
        assert_eq!(briefing.sections[0].segments, vec![plain("critical risk ahead")]);
    }

    #[test]
    fn test_sections_split_on_headers() {
        let briefing = Briefing::parse("intro\n## The Human Problem\nDanger: drift\n## Core Idea\nclimb\n");
        let titles: Vec<&str> = briefing.sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Briefing", "The Human Problem", "Core Idea"]);
        assert_eq!(briefing.sections[1].segments[0], Segment::Label(Marker::Danger));
        assert_eq!(briefing.assessment, Some(Marker::Danger));
    }

    #[test]
    fn test_unstructured_text_falls_back_to_single_section() {
        let briefing = Briefing::parse("raw payload with no headers");
        assert_eq!(briefing.sections.len(), 1);
        assert_eq!(briefing.sections[0].title, "Briefing");
        assert_eq!(
            briefing.sections[0].segments,
            vec![plain("raw payload with no headers")]
        );
        assert!(Briefing::parse("  \n").sections.is_empty());
    }
}
