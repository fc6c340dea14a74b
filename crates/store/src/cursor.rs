//! Pull-based, paged iteration over a stream.

use std::collections::VecDeque;

use evstore_core::{Event, StreamId};

use crate::error::StoreResult;
use crate::repository::EventRepository;

/// Iterator over `from..=to` of one stream, fetching `page_size` events per
/// repository call.
///
/// Pages are read lazily, so a cursor sees events appended after it was
/// created as long as they fall inside its range. Purged versions are simply
/// absent. A backend error is yielded once and ends the iteration.
pub struct EventCursor<'a, R: ?Sized> {
    repo: &'a R,
    stream: StreamId,
    next: u64,
    to: u64,
    page_size: usize,
    buffer: VecDeque<Event>,
    exhausted: bool,
}

impl<'a, R> EventCursor<'a, R>
where
    R: EventRepository + ?Sized,
{
    pub(crate) fn new(repo: &'a R, stream: StreamId, from: u64, to: u64, page_size: usize) -> Self {
        Self {
            repo,
            stream,
            next: from,
            to,
            page_size: page_size.max(1),
            buffer: VecDeque::new(),
            exhausted: from > to,
        }
    }

    /// An exhausted cursor (for streams without readable events).
    pub(crate) fn empty(repo: &'a R, stream: StreamId) -> Self {
        let mut c = Self::new(repo, stream, 0, 0, 1);
        c.exhausted = true;
        c
    }

    pub fn stream_id(&self) -> &StreamId {
        &self.stream
    }

    fn fill(&mut self) -> StoreResult<()> {
        let page = self
            .repo
            .events(&self.stream, self.next, self.to, self.page_size)?;

        match page.last() {
            Some(last) if page.len() == self.page_size && last.version < self.to => {
                self.next = last.version + 1;
            }
            _ => self.exhausted = true,
        }

        self.buffer.extend(page);
        Ok(())
    }
}

impl<R> Iterator for EventCursor<'_, R>
where
    R: EventRepository + ?Sized,
{
    type Item = StoreResult<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(e) = self.fill() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}

impl<R: ?Sized> std::fmt::Debug for EventCursor<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventCursor")
            .field("stream", &self.stream)
            .field("next", &self.next)
            .field("to", &self.to)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}
