//! Keyword severity classification and highlight markup.
//!
//! Markup is plain HTML-escaped text with matched keywords wrapped in
//! `<span class="keyword-{tier}">`. Because the text is escaped before any tag
//! is inserted, every `<` in the markup belongs to a highlight tag, which is
//! what lets [`strip_markup`] and [`markup_segments`] read it back without a
//! full HTML parser.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::config::KeywordConfig;

/// Replaces transcripts that are only a tone-out or dead air.
pub const NO_AUDIO_SENTINEL: &str = "-- FIRE TONE OR NO AUDIO --";

const NO_AUDIO_PATTERN: &str = r"thanks\s*for\s*watching|thank\s*you\s*for\s*watching";

/// Severity tier. Ordering follows urgency: `Red > Yellow > Orange > None`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    None,
    Orange,
    Yellow,
    Red,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Orange => "orange",
            Severity::Yellow => "yellow",
            Severity::Red => "red",
        }
    }

    /// Class attribute used on highlight spans. `None` is never highlighted.
    pub fn highlight_class(self) -> Option<&'static str> {
        match self {
            Severity::None => None,
            Severity::Orange => Some("keyword-orange"),
            Severity::Yellow => Some("keyword-yellow"),
            Severity::Red => Some("keyword-red"),
        }
    }

    fn from_highlight_class(class: &str) -> Option<Self> {
        match class {
            "keyword-orange" => Some(Severity::Orange),
            "keyword-yellow" => Some(Severity::Yellow),
            "keyword-red" => Some(Severity::Red),
            _ => None,
        }
    }
}

/// Result of classifying one transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Text after boilerplate substitution; what the markup was built from.
    pub text: String,
    pub severity: Severity,
    pub markup: String,
}

struct Tier {
    severity: Severity,
    patterns: Vec<Regex>,
}

pub struct KeywordClassifier {
    tiers: Vec<Tier>,
    no_audio: Regex,
}

impl KeywordClassifier {
    pub fn new(keywords: &KeywordConfig) -> anyhow::Result<Self> {
        let tiers = vec![
            Tier::build(Severity::Red, &keywords.red)?,
            Tier::build(Severity::Yellow, &keywords.yellow)?,
            Tier::build(Severity::Orange, &keywords.orange)?,
        ];
        let no_audio = RegexBuilder::new(NO_AUDIO_PATTERN)
            .case_insensitive(true)
            .build()?;
        Ok(Self { tiers, no_audio })
    }

    /// True when the raw transcript is recognised as audio-free boilerplate.
    pub fn is_no_audio(&self, raw: &str) -> bool {
        raw == NO_AUDIO_SENTINEL || self.no_audio.is_match(raw)
    }

    pub fn classify(&self, raw: &str) -> Classification {
        if self.is_no_audio(raw) {
            return Classification {
                text: NO_AUDIO_SENTINEL.to_string(),
                severity: Severity::None,
                markup: escape_html(NO_AUDIO_SENTINEL),
            };
        }
        Classification {
            text: raw.to_string(),
            severity: self.severity_of(raw),
            markup: self.highlight(raw),
        }
    }

    /// Highest tier with at least one keyword present anywhere in `text`.
    pub fn severity_of(&self, text: &str) -> Severity {
        self.tiers
            .iter()
            .find(|tier| tier.patterns.iter().any(|re| re.is_match(text)))
            .map(|tier| tier.severity)
            .unwrap_or(Severity::None)
    }

    /// Escape `text` and wrap every keyword occurrence in its tier's span.
    ///
    /// Overlapping matches are resolved in tier order, then list order: the
    /// first keyword to claim a byte range keeps it.
    pub fn highlight(&self, text: &str) -> String {
        let mut claimed: Vec<(usize, usize, Severity)> = Vec::new();
        for tier in &self.tiers {
            for re in &tier.patterns {
                for m in re.find_iter(text) {
                    let overlaps = claimed
                        .iter()
                        .any(|&(start, end, _)| m.start() < end && start < m.end());
                    if !overlaps {
                        claimed.push((m.start(), m.end(), tier.severity));
                    }
                }
            }
        }
        claimed.sort_by_key(|&(start, _, _)| start);

        let mut out = String::with_capacity(text.len() + claimed.len() * 32);
        let mut pos = 0;
        for (start, end, severity) in claimed {
            let Some(class) = severity.highlight_class() else {
                continue;
            };
            out.push_str(&escape_html(&text[pos..start]));
            out.push_str("<span class=\"");
            out.push_str(class);
            out.push_str("\">");
            out.push_str(&escape_html(&text[start..end]));
            out.push_str("</span>");
            pos = end;
        }
        out.push_str(&escape_html(&text[pos..]));
        out
    }
}

impl Tier {
    fn build(severity: Severity, keywords: &[String]) -> anyhow::Result<Self> {
        let mut patterns = Vec::with_capacity(keywords.len());
        for kw in keywords {
            // Whitespace is significant ("mba " must not match "mbase") but a
            // blank entry would match everything.
            if kw.trim().is_empty() {
                continue;
            }
            patterns.push(
                RegexBuilder::new(&regex::escape(kw))
                    .case_insensitive(true)
                    .build()?,
            );
        }
        Ok(Self { severity, patterns })
    }
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Inverse of [`escape_html`]. Unknown entities are passed through verbatim.
pub fn unescape_html(s: &str) -> String {
    const ENTITIES: [(&str, char); 5] = [
        ("&amp;", '&'),
        ("&lt;", '<'),
        ("&gt;", '>'),
        ("&quot;", '"'),
        ("&#39;", '\''),
    ];
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        match ENTITIES.iter().find(|(entity, _)| rest.starts_with(entity)) {
            Some((entity, c)) => {
                out.push(*c);
                rest = &rest[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// A run of transcript text with the tier it is highlighted in, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub highlight: Option<Severity>,
}

/// Split highlight markup back into plain-text runs.
pub fn markup_segments(markup: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current: Option<Severity> = None;
    let mut rest = markup;

    while let Some(lt) = rest.find('<') {
        push_segment(&mut segments, &rest[..lt], current);
        let Some(gt) = rest[lt..].find('>') else {
            // Unterminated tag; keep the remainder as text.
            push_segment(&mut segments, &rest[lt..], current);
            return segments;
        };
        let tag = &rest[lt + 1..lt + gt];
        current = if tag.starts_with('/') {
            None
        } else {
            tag.split('"')
                .nth(1)
                .and_then(Severity::from_highlight_class)
        };
        rest = &rest[lt + gt + 1..];
    }
    push_segment(&mut segments, rest, current);
    segments
}

fn push_segment(segments: &mut Vec<Segment>, raw: &str, highlight: Option<Severity>) {
    if !raw.is_empty() {
        segments.push(Segment {
            text: unescape_html(raw),
            highlight,
        });
    }
}

/// Markup with every tag removed and entities decoded.
pub fn strip_markup(markup: &str) -> String {
    markup_segments(markup)
        .into_iter()
        .map(|s| s.text)
        .collect()
}
