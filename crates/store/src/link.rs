//! Cross-stream correlation via link events.

use evstore_core::{Event, EventPackage, Stream, StreamId};
use tracing::debug;

use crate::error::StoreResult;
use crate::repository::EventRepository;

/// Stages one link event per linked stream, to be committed in the same
/// write as the origin event.
///
/// The link carries the origin stream id, origin version and origin event
/// type; the payload is not copied. Deleted (or purging) linked streams are
/// skipped, missing ones are created at version 0. The origin stream itself
/// and repeated ids are ignored.
#[derive(Debug, Copy, Clone, Default)]
pub struct LinkPropagator;

impl LinkPropagator {
    /// Callers must hold the write locks of every linked stream.
    pub fn stage<R>(repo: &R, origin: &Event) -> StoreResult<Vec<EventPackage>>
    where
        R: EventRepository + ?Sized,
    {
        let mut packages: Vec<EventPackage> = Vec::with_capacity(origin.linked_streams.len());

        for target in Self::targets(origin) {
            let (mut stream, version) = match repo.stream(target)? {
                Some(s) if !s.is_writable() => {
                    debug!(stream_id = %target, origin = %origin.stream_id, "skipping link to deleted stream");
                    continue;
                }
                Some(s) => {
                    let next = s.version + 1;
                    (s, next)
                }
                None => (Stream::new(target.clone()), 0),
            };

            stream.version = version;
            let link = Event::link_to(origin, target.clone(), version);
            packages.push(EventPackage::new(stream, vec![link]));
        }

        Ok(packages)
    }

    /// Distinct linked stream ids, excluding the origin stream.
    pub fn targets(origin: &Event) -> Vec<&StreamId> {
        let mut seen: Vec<&StreamId> = Vec::with_capacity(origin.linked_streams.len());
        for id in &origin.linked_streams {
            if *id != origin.stream_id && !seen.contains(&id) {
                seen.push(id);
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryEventRepository;
    use evstore_core::{EventId, NewEvent, Payload};

    fn sid(s: &str) -> StreamId {
        StreamId::new(s).unwrap()
    }

    fn origin(links: &[&str]) -> Event {
        let new = NewEvent::new(sid("orders-1"), "OrderCreated", Payload::new())
            .with_links(links.iter().map(|l| sid(l)));
        Event::stored(EventId::generate(), new, 4)
    }

    #[test]
    fn creates_missing_streams_at_version_zero() {
        let repo = InMemoryEventRepository::new();
        let pkgs = LinkPropagator::stage(&repo, &origin(&["app_log"])).unwrap();

        assert_eq!(pkgs.len(), 1);
        let link = &pkgs[0].events[0];
        assert_eq!(link.version, 0);
        assert_eq!(link.event_type, "OrderCreated");
        assert_eq!(link.link.as_ref().unwrap().version, 4);
        assert!(pkgs[0].validate().is_ok());
    }

    #[test]
    fn skips_deleted_origin_and_repeated_targets() {
        let repo = InMemoryEventRepository::new();
        let seed = LinkPropagator::stage(&repo, &origin(&["gone-1", "app_log"])).unwrap();
        repo.commit(&seed).unwrap();

        let mut gone = repo.stream(&sid("gone-1")).unwrap().unwrap();
        gone.deleted = true;
        repo.save_stream(&gone).unwrap();

        let pkgs =
            LinkPropagator::stage(&repo, &origin(&["gone-1", "orders-1", "app_log", "app_log"])).unwrap();
        assert_eq!(pkgs.len(), 1);
        assert_eq!(pkgs[0].stream.id, sid("app_log"));
        assert_eq!(pkgs[0].events[0].version, 1);
    }
}
