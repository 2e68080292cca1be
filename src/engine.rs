use std::cmp::Ordering;

use rayon::prelude::*;
use tracing::trace;

use crate::record::LinkRecord;

pub const PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Url,
    Status,
    Layout,
    Pattern,
    Timestamp,
}

impl SortKey {
    pub const ALL: [SortKey; 5] = [
        SortKey::Url,
        SortKey::Status,
        SortKey::Layout,
        SortKey::Pattern,
        SortKey::Timestamp,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            SortKey::Url => "URL",
            SortKey::Status => "Status",
            SortKey::Layout => "Layout OK",
            SortKey::Pattern => "Pattern OK",
            SortKey::Timestamp => "Checked at",
        }
    }

    fn compare(&self, a: &LinkRecord, b: &LinkRecord) -> Ordering {
        match self {
            SortKey::Url => a.url.to_lowercase().cmp(&b.url.to_lowercase()),
            SortKey::Status => a.status.compare(&b.status),
            SortKey::Layout => a.layout_ok.cmp(&b.layout_ok),
            SortKey::Pattern => a.pattern_ok.cmp(&b.pattern_ok),
            // Unparseable timestamps rank after every valid one
            SortKey::Timestamp => match (a.checked_at(), b.checked_at()) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    fn flipped(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    fn apply(self, ord: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    }
}

/// One page of the working set, ready for rendering.
#[derive(Debug, PartialEq)]
pub struct PageSlice<'a> {
    pub records: Vec<&'a LinkRecord>,
    pub current_page: usize,
    pub total_pages: usize,
    pub matching: usize,
}

/// Filter, sort and pagination state over the latest record snapshot.
///
/// The working set is kept as a mapping from view position to an index into
/// the full set and is rebuilt from the full set whenever the data, the filter
/// term or the sort changes. Sorting is stable, so equal keys keep ingestion
/// order and re-sorting is idempotent. Until a sort key is chosen the working
/// set stays in ingestion order.
#[derive(Debug)]
pub struct TableViewEngine {
    full: Vec<LinkRecord>,
    rows: Vec<usize>,
    filter_term: String,
    sort_key: Option<SortKey>,
    sort_direction: SortDirection,
    current_page: usize,
    page_size: usize,
}

impl Default for TableViewEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TableViewEngine {
    pub fn new() -> Self {
        Self::with_page_size(PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        TableViewEngine {
            full: Vec::new(),
            rows: Vec::new(),
            filter_term: String::new(),
            sort_key: None,
            sort_direction: SortDirection::Ascending,
            current_page: 1,
            page_size: page_size.max(1),
        }
    }

    /// Snapshot replacement: the whole record set is swapped, filter and sort
    /// are reapplied, and the page is clamped into the new range.
    pub fn replace_data_set(&mut self, records: Vec<LinkRecord>) {
        self.full = records;
        self.recompute();
        self.clamp_page();
    }

    pub fn set_filter(&mut self, term: &str) {
        self.filter_term = term.to_lowercase();
        self.recompute();
        self.current_page = 1;
    }

    pub fn set_sort(&mut self, key: SortKey) {
        if self.sort_key == Some(key) {
            self.sort_direction = self.sort_direction.flipped();
        } else {
            self.sort_key = Some(key);
            self.sort_direction = SortDirection::Ascending;
        }
        self.recompute();
    }

    pub fn set_page(&mut self, page: i64) {
        let last = self.total_pages().max(1) as i64;
        self.current_page = page.clamp(1, last) as usize;
    }

    pub fn next_page(&mut self) {
        self.set_page(self.current_page as i64 + 1);
    }

    pub fn prev_page(&mut self) {
        self.set_page(self.current_page as i64 - 1);
    }

    pub fn first_page(&mut self) {
        self.set_page(1);
    }

    pub fn last_page(&mut self) {
        self.set_page(self.total_pages() as i64);
    }

    pub fn page_slice(&self) -> PageSlice<'_> {
        let begin = (self.current_page - 1) * self.page_size;
        let end = std::cmp::min(begin + self.page_size, self.rows.len());
        let records = self
            .rows
            .get(begin..end)
            .unwrap_or(&[])
            .iter()
            .map(|&idx| &self.full[idx])
            .collect();

        PageSlice {
            records,
            current_page: self.current_page,
            total_pages: self.total_pages(),
            matching: self.rows.len(),
        }
    }

    pub fn total_pages(&self) -> usize {
        self.rows.len().div_ceil(self.page_size)
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn filter_term(&self) -> &str {
        &self.filter_term
    }

    pub fn sort_key(&self) -> Option<SortKey> {
        self.sort_key
    }

    pub fn sort_direction(&self) -> SortDirection {
        self.sort_direction
    }

    /// Number of records in the full set.
    pub fn len(&self) -> usize {
        self.full.len()
    }

    pub fn is_empty(&self) -> bool {
        self.full.is_empty()
    }

    /// Number of records in the working set.
    pub fn matching(&self) -> usize {
        self.rows.len()
    }

    fn recompute(&mut self) {
        let term = self.filter_term.as_str();
        let mut rows: Vec<usize> = self
            .full
            .par_iter()
            .enumerate()
            .filter(|(_, rec)| rec.matches(term))
            .map(|(idx, _)| idx)
            .collect();

        let direction = self.sort_direction;
        let full = &self.full;
        if let Some(key) = self.sort_key {
            rows.sort_by(|&a, &b| direction.apply(key.compare(&full[a], &full[b])));
        }

        trace!(
            "Working set: {} of {} records, filter {:?}, sort {:?} {:?}",
            rows.len(),
            full.len(),
            term,
            self.sort_key,
            direction
        );
        self.rows = rows;
    }

    fn clamp_page(&mut self) {
        self.set_page(self.current_page as i64);
    }
}
