//! Chunk life-cycle flags and the state they describe.

/// Observable life-cycle state of a chunk, derived from its flags and apply queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChunkState {
    /// Nothing requested and nothing produced.
    Clear,
    /// Waiting for a worker slot.
    StartRequested,
    /// A worker is evaluating the graph for this chunk.
    Running,
    /// Products are queued and wait for the apply phase.
    ReadyToApply,
    /// Products are being handed to the backend.
    Applying,
    /// Every product was applied.
    Complete,
}

/// Raw flags shared between a chunk's worker and the session driver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChunkFlags {
    /// Generation was requested and not yet picked up.
    pub start: bool,
    /// The running worker should leave the evaluator at the next check.
    pub stop: bool,
    /// A worker owns the chunk.
    pub running: bool,
    /// The chunk's products are being applied.
    pub applying: bool,
    /// The last requested generation was fully applied.
    pub complete: bool,
}

impl ChunkFlags {
    /// State described by these flags, given whether products are queued for apply.
    pub fn state(&self, has_products: bool) -> ChunkState {
        if self.running {
            ChunkState::Running
        } else if self.start {
            ChunkState::StartRequested
        } else if self.applying {
            ChunkState::Applying
        } else if has_products {
            ChunkState::ReadyToApply
        } else if self.complete {
            ChunkState::Complete
        } else {
            ChunkState::Clear
        }
    }

    /// Whether the chunk may enter the apply phase.
    pub fn can_apply(&self) -> bool {
        !self.start && !self.stop && !self.running && !self.applying
    }

    /// Request a fresh generation. A running worker is asked to stop and loop.
    pub fn request_restart(&mut self) {
        self.start = true;
        self.complete = false;
        if self.running {
            self.stop = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_follows_life_cycle() {
        let mut flags = ChunkFlags::default();
        assert_eq!(flags.state(false), ChunkState::Clear);
        flags.request_restart();
        assert_eq!(flags.state(false), ChunkState::StartRequested);
        assert!(!flags.stop);
        flags.start = false;
        flags.running = true;
        assert_eq!(flags.state(false), ChunkState::Running);
        flags.running = false;
        assert_eq!(flags.state(true), ChunkState::ReadyToApply);
        assert!(flags.can_apply());
        flags.applying = true;
        assert_eq!(flags.state(false), ChunkState::Applying);
        flags.applying = false;
        flags.complete = true;
        assert_eq!(flags.state(false), ChunkState::Complete);
    }

    #[test]
    fn restart_while_running_requests_stop() {
        let mut flags = ChunkFlags {
            running: true,
            complete: true,
            ..Default::default()
        };
        flags.request_restart();
        assert!(flags.start && flags.stop && !flags.complete);
        assert!(!flags.can_apply());
    }
}
