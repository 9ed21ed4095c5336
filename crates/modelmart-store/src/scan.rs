//! Lazy, paged iteration over an event index.

use std::collections::VecDeque;

use modelmart_core::{TimeRange, UsageEvent};

use crate::{EventIndex, EventQuery, Result, UsageEventStore, DEFAULT_PAGE_SIZE};

/// Iterator over every event of an index within a time window.
///
/// Pages are fetched on demand, so a scan over a long window holds at most
/// one page in memory. A store error is yielded once and ends the scan.
pub struct EventScan<'a> {
    store: &'a dyn UsageEventStore,
    index: EventIndex,
    query: EventQuery,
    buffer: VecDeque<UsageEvent>,
    exhausted: bool,
}

impl<'a> EventScan<'a> {
    /// Scan `index` over `range` with the default page size.
    #[must_use]
    pub fn new(store: &'a dyn UsageEventStore, index: EventIndex, range: TimeRange) -> Self {
        Self::with_page_size(store, index, range, DEFAULT_PAGE_SIZE)
    }

    /// Scan `index` over `range`, fetching `page_size` events per round trip.
    #[must_use]
    pub fn with_page_size(
        store: &'a dyn UsageEventStore,
        index: EventIndex,
        range: TimeRange,
        page_size: usize,
    ) -> Self {
        Self {
            store,
            index,
            query: EventQuery::new(range).limit(page_size.max(1)),
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    fn fill(&mut self) -> Result<()> {
        let page = self.store.query_events(&self.index, &self.query)?;
        self.exhausted = page.next.is_none();
        self.query.after = page.next;
        self.buffer.extend(page.events);
        Ok(())
    }
}

impl Iterator for EventScan<'_> {
    type Item = Result<UsageEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.buffer.is_empty() {
            if self.exhausted {
                return None;
            }
            if let Err(e) = self.fill() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}
