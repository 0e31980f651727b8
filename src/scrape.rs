//! Resolves the device's recently-viewed history into browsable items.
//!
//! The device reports history as free text with one `netflix://title/<id>`
//! reference per entry. Each entry needs its landing page fetched and the
//! embedded metadata parsed. Entries are taken from the tail of the queue one
//! at a time; the driver must not request the next step before the current
//! page has been applied.

use tracing::{debug, warn};

use crate::models::{BrowseItem, BrowseList, ItemType, LandingMetadata};
use crate::utils::extract_metadata;
use crate::RemoteError;

pub const HISTORY_MARKER: &str = "netflix://title/";
/// Title id the device reports for entries it cannot resolve.
pub const INVALID_TITLE_ID: &str = "-1";
pub const HISTORY_DUMP_COMMAND: &str = "pm dump com.netflix.ninja | grep netflix://title/";
const ID_TERMINATOR: &str = " flg";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry(String);

impl HistoryEntry {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn raw(&self) -> &str {
        &self.0
    }

    /// The id following the marker, up to ` flg` or the first separator.
    pub fn title_id(&self) -> Option<&str> {
        let start = self.0.find(HISTORY_MARKER)? + HISTORY_MARKER.len();
        let rest = &self.0[start..];
        let end = rest
            .find(ID_TERMINATOR)
            .or_else(|| rest.find(|c: char| c.is_whitespace() || c == ',' || c == '"'))
            .unwrap_or(rest.len());
        let id = rest[..end].trim();
        if id.is_empty() {
            None
        } else {
            Some(id)
        }
    }
}

/// Destructively drained list of history entries, consumed tail-first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryQueue {
    entries: Vec<HistoryEntry>,
}

impl HistoryQueue {
    /// Split a raw dump into one entry per marker occurrence, dropping exact
    /// duplicates and keeping the reported order. An entry never extends past
    /// the end of its line, so text ahead of the marker on the next line
    /// stays out of it.
    pub fn parse(dump: &str) -> Self {
        let mut entries: Vec<HistoryEntry> = Vec::new();
        for line in dump.lines() {
            let starts: Vec<usize> = line.match_indices(HISTORY_MARKER).map(|(i, _)| i).collect();
            for (n, &start) in starts.iter().enumerate() {
                let end = starts.get(n + 1).copied().unwrap_or(line.len());
                let text = line[start..end]
                    .trim()
                    .trim_end_matches(',')
                    .trim_end()
                    .to_string();
                let entry = HistoryEntry(text);
                if !entries.contains(&entry) {
                    entries.push(entry);
                }
            }
        }
        Self { entries }
    }

    pub fn from_entries(entries: Vec<HistoryEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Remove and return the most recently appended entry.
    pub fn pop_last(&mut self) -> Option<HistoryEntry> {
        self.entries.pop()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// What the driver should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryStep {
    /// Entry had no usable id or the invalid sentinel; nothing to fetch.
    Skip(HistoryEntry),
    /// Fetch `url` and hand the page to [`ScrapePipeline::apply_page`].
    Fetch {
        entry: HistoryEntry,
        title_id: String,
        url: String,
    },
    /// Queue exhausted.
    Done,
}

pub struct ScrapePipeline {
    queue: HistoryQueue,
    list: BrowseList,
    landing_page_base: String,
    fetched: usize,
    skipped: usize,
}

impl ScrapePipeline {
    pub fn new(queue: HistoryQueue, landing_page_base: &str) -> Self {
        Self {
            queue,
            list: BrowseList::with_open_header("adb_recent", "Recently viewed shows", ItemType::Show),
            landing_page_base: landing_page_base.to_string(),
            fetched: 0,
            skipped: 0,
        }
    }

    /// Fix the list title up front; landing pages then only fill the image.
    pub fn with_title(self, title: &str) -> Self {
        if !title.is_empty() {
            self.list.title.set(title.to_string());
        }
        self
    }

    /// Use `image_url` for the header when no landing page supplied one.
    pub fn finish_header(&mut self, image_url: &str) {
        if !image_url.is_empty() {
            self.list.image_url.set(image_url.to_string());
        }
    }

    pub fn landing_page_url(&self, title_id: &str) -> String {
        format!("{}title/{}", self.landing_page_base, title_id)
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    pub fn is_finished(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn fetched(&self) -> usize {
        self.fetched
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn list(&self) -> &BrowseList {
        &self.list
    }

    pub fn into_list(self) -> BrowseList {
        self.list
    }

    /// Take the tail entry off the queue and classify it.
    pub fn next_step(&mut self) -> HistoryStep {
        let entry = match self.queue.pop_last() {
            Some(entry) => entry,
            None => {
                self.queue.clear();
                return HistoryStep::Done;
            }
        };
        match entry.title_id().map(ToString::to_string) {
            Some(id) if id != INVALID_TITLE_ID => {
                self.fetched += 1;
                let url = self.landing_page_url(&id);
                HistoryStep::Fetch {
                    entry,
                    title_id: id,
                    url,
                }
            }
            _ => {
                debug!(entry = entry.raw(), "Discarding invalid history entry");
                self.skipped += 1;
                HistoryStep::Skip(entry)
            }
        }
    }

    /// Turn a landing page into an item and append it. A page without a
    /// metadata block still yields an item, with blank fields.
    pub fn apply_page(&mut self, title_id: &str, page: &str) -> Result<&BrowseList, RemoteError> {
        let metadata = match extract_metadata(page) {
            Some(raw) => serde_json::from_str::<LandingMetadata>(&raw)?,
            None => {
                warn!(title_id, "No metadata block in landing page");
                LandingMetadata::default()
            }
        };

        // First response with a value supplies the list header
        if !metadata.image.is_empty() {
            self.list.image_url.set(metadata.image.clone());
        }
        if !metadata.name.is_empty() {
            self.list.title.set(metadata.name.clone());
        }

        let id = metadata
            .title_path()
            .unwrap_or_else(|| format!("title/{}", title_id));
        debug!(id = %id, name = %metadata.name, "Resolved history entry");
        self.list.push(BrowseItem::new(
            id,
            metadata.name.clone(),
            metadata.description.clone(),
            metadata.item_type(),
            metadata.image.clone(),
        ));
        Ok(&self.list)
    }
}
