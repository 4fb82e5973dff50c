//! Directory listing parsing.

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

/// One candidate transcript file found in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub url: String,
    pub filename: String,
}

impl DirectoryEntry {
    /// Same directory, `.json` swapped for `.mp3`.
    pub fn audio_link(&self) -> String {
        let dir = match self.url.rfind('/') {
            Some(i) => &self.url[..=i],
            None => "",
        };
        let stem = self
            .filename
            .rsplit('/')
            .next()
            .unwrap_or(&self.filename);
        let stem = stem.strip_suffix(".json").unwrap_or(stem);
        format!("{}{}.mp3", dir, stem)
    }
}

/// Extract every `<a href>` ending in `.json` from an autoindex page.
///
/// Hrefs are joined to `base_url` verbatim; subdirectories are not followed.
pub fn parse_listing(base_url: &str, html: &str) -> Vec<DirectoryEntry> {
    let document = Html::parse_document(html);
    let Ok(anchors) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&anchors)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| href.ends_with(".json"))
        .map(|href| DirectoryEntry {
            url: format!("{}{}", base_url, href),
            filename: href.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://archive.example/law1/2024/3/15/";

    #[test]
    fn extracts_json_links_only() {
        let html = r#"
            <html><head><title>Index of /law1/2024/3/15/</title></head>
            <body><h1>Index of /law1/2024/3/15/</h1><hr><pre>
            <a href="../">../</a>
            <a href="law1_20240315_143022.json">law1_20240315_143022.json</a>   15-Mar-2024 14:30   812
            <a href="law1_20240315_143022.mp3">law1_20240315_143022.mp3</a>    15-Mar-2024 14:30   90112
            <a href="law1_20240315_150101.json">law1_20240315_150101.json</a>   15-Mar-2024 15:01   640
            <a href="notes/">notes/</a>
            <a>no href</a>
            </pre><hr></body></html>
        "#;
        let entries = parse_listing(BASE, html);
        assert_eq!(
            entries,
            vec![
                DirectoryEntry {
                    url: format!("{BASE}law1_20240315_143022.json"),
                    filename: "law1_20240315_143022.json".into(),
                },
                DirectoryEntry {
                    url: format!("{BASE}law1_20240315_150101.json"),
                    filename: "law1_20240315_150101.json".into(),
                },
            ]
        );
    }

    #[test]
    fn tolerates_garbage() {
        assert!(parse_listing(BASE, "").is_empty());
        assert!(parse_listing(BASE, "not html at all").is_empty());
    }

    #[test]
    fn audio_link_swaps_extension_in_same_directory() {
        let entry = DirectoryEntry {
            url: format!("{BASE}call_20240315_143022.json"),
            filename: "call_20240315_143022.json".into(),
        };
        assert_eq!(
            entry.audio_link(),
            format!("{BASE}call_20240315_143022.mp3")
        );
    }
}
