use lazy_static::lazy_static;
use regex::Regex;

pub mod parsing;

// Helpers for cleaning up catalog text fields
pub mod catalog_text {
    const SUBTITLE_CHARS: usize = 50;

    /// Undo the HTML apostrophe entity the catalog leaves in titles.
    pub fn unescape(s: &str) -> String {
        s.replace("&#39;", "'")
    }

    /// First 50 characters of a synopsis, unescaped.
    pub fn subtitle(s: &str) -> String {
        unescape(&s.chars().take(SUBTITLE_CHARS).collect::<String>())
    }

    /// `Title (2019)`, or just the title when no year is known.
    pub fn title_with_year(title: &str, year: &str) -> String {
        let title = unescape(title);
        if year.is_empty() {
            title
        } else {
            format!("{} ({})", title, year)
        }
    }

    /// Zero-padded `S01E02: ` prefix for an episode title.
    pub fn episode_prefix(season: u32, episode: u32) -> String {
        format!("S{:02}E{:02}: ", season, episode)
    }
}

/// Opening and closing markers of the metadata block in a landing page.
pub const METADATA_OPEN: &str = "<script type=\"application/ld+json\">{";
pub const METADATA_CLOSE: &str = "}</script>";

lazy_static! {
    static ref METADATA_RE: Regex = Regex::new(&format!(
        "(?s){}(.+?){}",
        regex::escape(METADATA_OPEN),
        regex::escape(METADATA_CLOSE)
    ))
    .unwrap();
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
}

/// Pull the embedded metadata object out of a landing page. Only the first
/// block is used. `@` is stripped and whitespace collapsed so the result
/// parses with plain field names (`@type` becomes `type`). Returns `None`
/// when the markers are absent.
pub fn extract_metadata(document: &str) -> Option<String> {
    let inner = METADATA_RE.captures(document)?.get(1)?.as_str();
    let raw = format!("{{{}}}", inner).replace('@', "");
    Some(WHITESPACE_RE.replace_all(raw.trim(), " ").into_owned())
}
