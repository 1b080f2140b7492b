//! Routing from record tags to record handlers
//!
//! A [`DispatchTable`] maps each tag a visitor understands to a plain
//! function. Records whose tag has no entry go to the fallback handler if
//! one is set; otherwise the walker seeks over their payload without
//! reading it.

use std::collections::HashMap;
use std::fmt;

use crate::record::Record;
use crate::tag::Tag;
use crate::walker::ContainerVisitor;

/// What a handler did with a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The record was consumed and counts towards the walk's result
    Relevant,
    /// The record was read but the handler had no use for it
    Ignored,
}

/// A record handler for visitor type `V`
pub type RecordHandler<V> = fn(&mut V, Record) -> Result<RecordOutcome, <V as ContainerVisitor>::Error>;

/// Tag to handler table for one visitor type
pub struct DispatchTable<V: ContainerVisitor> {
    handlers: HashMap<Tag, RecordHandler<V>>,
    fallback: Option<RecordHandler<V>>,
}

impl<V: ContainerVisitor> DispatchTable<V> {
    /// Empty table; every record is skipped
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            fallback: None,
        }
    }

    /// Table that sends every record to `handler`
    pub fn with_fallback(handler: RecordHandler<V>) -> Self {
        Self {
            handlers: HashMap::new(),
            fallback: Some(handler),
        }
    }

    /// Register `handler` for `tag`, returning the previous handler
    pub fn register(&mut self, tag: Tag, handler: RecordHandler<V>) -> Option<RecordHandler<V>> {
        self.handlers.insert(tag, handler)
    }

    /// Builder form of [`DispatchTable::register`]
    #[must_use]
    pub fn with(mut self, tag: Tag, handler: RecordHandler<V>) -> Self {
        self.handlers.insert(tag, handler);
        self
    }

    /// Set the handler for tags without an entry
    pub fn set_fallback(&mut self, handler: Option<RecordHandler<V>>) {
        self.fallback = handler;
    }

    /// Handler for `tag`, if any
    ///
    /// `None` means records with this tag are skipped unread.
    pub fn handler(&self, tag: Tag) -> Option<RecordHandler<V>> {
        self.handlers.get(&tag).copied().or(self.fallback)
    }

    /// Whether records tagged `tag` will be read
    pub fn handles(&self, tag: Tag) -> bool {
        self.handler(tag).is_some()
    }

    /// Tags with an explicit entry
    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        self.handlers.keys().copied()
    }
}

impl<V: ContainerVisitor> Default for DispatchTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: ContainerVisitor> fmt::Debug for DispatchTable<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.handlers.keys().collect();
        tags.sort();
        f.debug_struct("DispatchTable")
            .field("tags", &tags)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::FormatError;
    use crate::form_id::FormId;
    use crate::record::RecordHeader;

    #[derive(Default)]
    struct Counter {
        weapons: usize,
        other: usize,
    }

    impl ContainerVisitor for Counter {
        type Error = FormatError;
    }

    fn count_weapon(v: &mut Counter, _record: Record) -> Result<RecordOutcome, FormatError> {
        v.weapons += 1;
        Ok(RecordOutcome::Relevant)
    }

    fn count_other(v: &mut Counter, _record: Record) -> Result<RecordOutcome, FormatError> {
        v.other += 1;
        Ok(RecordOutcome::Ignored)
    }

    fn sample(tag: &[u8; 4]) -> Record {
        Record::new(RecordHeader::new(Tag::new(*tag), FormId::new(1)), vec![]).unwrap()
    }

    #[test]
    fn test_lookup_and_fallback() {
        let mut table = DispatchTable::<Counter>::new().with(Tag::new(*b"WEAP"), count_weapon);
        assert!(table.handles(Tag::new(*b"WEAP")));
        assert!(!table.handles(Tag::new(*b"ARMO")));

        table.set_fallback(Some(count_other));
        assert!(table.handles(Tag::new(*b"ARMO")));

        let mut counter = Counter::default();
        for tag in [b"WEAP", b"ARMO", b"WEAP"] {
            let handler = table.handler(Tag::new(*tag)).unwrap();
            handler(&mut counter, sample(tag)).unwrap();
        }
        assert_eq!(counter.weapons, 2);
        assert_eq!(counter.other, 1);
        assert_eq!(table.tags().collect::<Vec<_>>(), vec![Tag::new(*b"WEAP")]);
    }
}
