//! Background generation threads.
//!
//! A worker owns one chunk while it runs. It evaluates every enabled sink against the
//! newest graph snapshot, then either loops (a new start was requested meanwhile) or
//! clears `running` and reports its exit to the session over a channel. Errors and
//! panics inside generators end the pass and are reported, never propagated.
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use tracing::debug;

use crate::chunk::evaluate::{run_pass, Flow, PassContext};
use crate::chunk::Chunk;
use crate::config::SessionConfig;
use crate::coord::Coord;
use crate::error::{Error, Result};
use crate::graph::{Graph, SharedGraph};

/// How a worker's last pass ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkerOutcome {
    Completed,
    Stopped,
    Failed(String),
}

/// Report sent when a worker leaves its chunk.
#[derive(Debug)]
pub struct WorkerExit {
    pub chunk: Chunk,
    /// Coordinate the last pass was generated for.
    pub coord: Coord,
    pub outcome: WorkerOutcome,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "generator panicked".to_string()
    }
}

/// Run one pass, converting errors and panics into an outcome.
pub fn run_guarded(graph: &Graph, chunk: &Chunk, pass: &PassContext) -> WorkerOutcome {
    match panic::catch_unwind(AssertUnwindSafe(|| run_pass(graph, chunk, pass))) {
        Ok(Ok(Flow::Done)) => WorkerOutcome::Completed,
        Ok(Ok(Flow::Stopped)) => WorkerOutcome::Stopped,
        Ok(Err(err)) => WorkerOutcome::Failed(err.to_string()),
        Err(payload) => WorkerOutcome::Failed(panic_message(payload.as_ref())),
    }
}

/// Claim a start-requested chunk for a worker. Returns false if it was not startable.
pub(crate) fn claim(chunk: &Chunk) -> bool {
    let mut inner = chunk.lock();
    let flags = &mut inner.flags;
    if !flags.start || flags.running || flags.applying {
        return false;
    }
    flags.start = false;
    flags.stop = false;
    flags.running = true;
    flags.complete = false;
    inner.retry_at = None;
    true
}

/// Run passes until no restart is pending, then release the chunk.
///
/// The chunk must have been claimed with [`claim`].
pub(crate) fn run_claimed(chunk: &Chunk, graph: &SharedGraph, config: &SessionConfig) -> WorkerExit {
    loop {
        let snapshot = graph.snapshot();
        let coord = chunk.coord();
        let outcome = run_guarded(&snapshot, chunk, &PassContext::new(coord, config));

        let mut inner = chunk.lock();
        if inner.flags.start {
            debug!("Restarting generation for chunk {}.", inner.coord);
            inner.flags.start = false;
            inner.flags.stop = false;
            continue;
        }
        inner.flags.running = false;
        inner.flags.stop = false;
        return WorkerExit {
            chunk: chunk.clone(),
            coord,
            outcome,
        };
    }
}

/// Spawn a named worker thread for a claimed chunk.
pub(crate) fn spawn(
    chunk: Chunk,
    graph: SharedGraph,
    config: Arc<SessionConfig>,
    exits: Sender<WorkerExit>,
) -> Result<JoinHandle<()>> {
    let coord = chunk.coord();
    thread::Builder::new()
        .name(format!("tilegraph-chunk-{}-{}", coord.0, coord.1))
        .spawn(move || {
            let exit = run_claimed(&chunk, &graph, &config);
            // The session may already be gone; nothing is left to report to.
            let _ = exits.send(exit);
        })
        .map_err(|err| Error::Other(format!("failed to spawn worker for chunk {coord}: {err}")))
}
