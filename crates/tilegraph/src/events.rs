//! Event types and sinks for observing a generation session.
//!
//! This module defines [`SessionEvent`] and a set of sinks to drop, collect, or forward
//! events emitted by [`crate::session::Session::tick_with_events`].
use crate::coord::Coord;
use crate::graph::value::SinkKind;

/// Describes events emitted while a session deploys, generates and applies chunks.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A chunk object was created for a coordinate.
    ChunkCreated { coord: Coord },

    /// An unused chunk object was moved to a new coordinate.
    ChunkRelocated { from: Coord, to: Coord },

    /// A chunk was destroyed and its backend data released.
    ChunkRetired { coord: Coord },

    /// A background or inline generation pass was started for a chunk.
    GenerationStarted { coord: Coord },

    /// A generation pass finished; the chunk's products wait for apply.
    GenerationCompleted { coord: Coord },

    /// A generation pass failed. The chunk is retried after the configured delay.
    GenerationFailed {
        coord: Coord,
        /// Human-readable failure, from the generator error or the panic payload.
        message: String,
    },

    /// Every product of a chunk was handed to the backend.
    ApplyCompleted {
        coord: Coord,
        /// Sink kinds applied in this cycle.
        kinds: Vec<SinkKind>,
    },

    /// Backend data of a sink kind that no longer exists was removed.
    Purged {
        kind: SinkKind,
        /// Number of chunks the purge was issued for.
        chunks: usize,
    },
}

impl SessionEvent {
    pub fn kind(&self) -> SessionEventKind {
        match self {
            SessionEvent::ChunkCreated { .. } => SessionEventKind::ChunkCreated,
            SessionEvent::ChunkRelocated { .. } => SessionEventKind::ChunkRelocated,
            SessionEvent::ChunkRetired { .. } => SessionEventKind::ChunkRetired,
            SessionEvent::GenerationStarted { .. } => SessionEventKind::GenerationStarted,
            SessionEvent::GenerationCompleted { .. } => SessionEventKind::GenerationCompleted,
            SessionEvent::GenerationFailed { .. } => SessionEventKind::GenerationFailed,
            SessionEvent::ApplyCompleted { .. } => SessionEventKind::ApplyCompleted,
            SessionEvent::Purged { .. } => SessionEventKind::Purged,
        }
    }
}

/// Discriminant of [`SessionEvent`], used to filter events before building them.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionEventKind {
    ChunkCreated,
    ChunkRelocated,
    ChunkRetired,
    GenerationStarted,
    GenerationCompleted,
    GenerationFailed,
    ApplyCompleted,
    Purged,
}

/// A generic event sink that accepts [`SessionEvent`]s.
pub trait EventSink {
    /// Whether the sink wants events of `kind`. The session skips building unwanted events.
    #[inline]
    fn wants(&self, _kind: SessionEventKind) -> bool {
        true
    }

    fn send(&mut self, event: SessionEvent);
}

/// A no-op event sink.
impl EventSink for () {
    #[inline]
    fn wants(&self, _kind: SessionEventKind) -> bool {
        false
    }

    #[inline]
    fn send(&mut self, _event: SessionEvent) {}
}

/// An event sink that forwards to a user-provided closure.
pub struct FnSink<F>
where
    F: FnMut(SessionEvent),
{
    f: F,
}

impl<F> FnSink<F>
where
    F: FnMut(SessionEvent),
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> EventSink for FnSink<F>
where
    F: FnMut(SessionEvent),
{
    #[inline]
    fn send(&mut self, event: SessionEvent) {
        (self.f)(event);
    }
}

/// An event sink that collects events in a `Vec`, optionally only some kinds.
#[derive(Default)]
pub struct VecSink {
    events: Vec<SessionEvent>,
    only: Option<Vec<SessionEventKind>>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect only events of the given kinds.
    pub fn only(kinds: impl IntoIterator<Item = SessionEventKind>) -> Self {
        Self {
            events: Vec::new(),
            only: Some(kinds.into_iter().collect()),
        }
    }

    pub fn into_inner(self) -> Vec<SessionEvent> {
        self.events
    }

    pub fn as_slice(&self) -> &[SessionEvent] {
        &self.events
    }

    /// Number of collected events of `kind`.
    pub fn count(&self, kind: SessionEventKind) -> usize {
        self.events.iter().filter(|e| e.kind() == kind).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventSink for VecSink {
    #[inline]
    fn wants(&self, kind: SessionEventKind) -> bool {
        self.only.as_ref().is_none_or(|kinds| kinds.contains(&kind))
    }

    #[inline]
    fn send(&mut self, event: SessionEvent) {
        self.events.push(event);
    }
}

/// Fan-out sink that forwards each event to all contained sinks that want it.
pub struct MultiSink<S: EventSink> {
    pub(crate) sinks: Vec<S>,
}

impl<S: EventSink> MultiSink<S> {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn with_sinks(sinks: Vec<S>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: S) {
        self.sinks.push(sink);
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }
}

impl<S: EventSink> Default for MultiSink<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: EventSink> EventSink for MultiSink<S> {
    fn wants(&self, kind: SessionEventKind) -> bool {
        self.sinks.iter().any(|s| s.wants(kind))
    }

    fn send(&mut self, event: SessionEvent) {
        let kind = event.kind();
        for sink in &mut self.sinks {
            if sink.wants(kind) {
                sink.send(event.clone());
            }
        }
    }
}

/// Send an event built by `make` if the sink wants its kind.
#[inline]
pub(crate) fn emit(
    sink: &mut dyn EventSink,
    kind: SessionEventKind,
    make: impl FnOnce() -> SessionEvent,
) {
    if sink.wants(kind) {
        sink.send(make());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_sink_filters_kinds() {
        let mut sink = VecSink::only([SessionEventKind::Purged]);
        emit(&mut sink, SessionEventKind::ChunkCreated, || {
            SessionEvent::ChunkCreated { coord: Coord(0, 0) }
        });
        emit(&mut sink, SessionEventKind::Purged, || SessionEvent::Purged {
            kind: SinkKind::Objects,
            chunks: 3,
        });
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.count(SessionEventKind::Purged), 1);
        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn unit_sink_wants_nothing() {
        let mut built = false;
        emit(&mut (), SessionEventKind::ChunkRetired, || {
            built = true;
            SessionEvent::ChunkRetired { coord: Coord(1, 1) }
        });
        assert!(!built);
    }

    #[test]
    fn multi_sink_fans_out_events() {
        let mut multi = MultiSink::with_sinks(vec![
            VecSink::new(),
            VecSink::only([SessionEventKind::ApplyCompleted]),
        ]);
        assert!(multi.wants(SessionEventKind::ChunkCreated));
        multi.send(SessionEvent::ChunkCreated { coord: Coord(2, 0) });
        multi.send(SessionEvent::ApplyCompleted {
            coord: Coord(2, 0),
            kinds: vec![SinkKind::Height],
        });
        assert_eq!(multi.len(), 2);
        assert_eq!(multi.sinks[0].len(), 2);
        assert_eq!(multi.sinks[1].len(), 1);
        assert!(matches!(
            multi.sinks[1].as_slice()[0],
            SessionEvent::ApplyCompleted { .. }
        ));
    }

    #[test]
    fn fn_sink_invokes_callback() {
        let mut count = 0;
        let mut sink = FnSink::new(|_event| {
            count += 1;
        });
        sink.send(SessionEvent::GenerationStarted { coord: Coord(0, 0) });
        assert_eq!(count, 1);
    }
}
