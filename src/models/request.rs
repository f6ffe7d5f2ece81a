use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Identifies a route dump request and its replies.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RequestContext {
    /// Sequence number echoed by the kernel in every reply frame.
    pub sequence: u32,
    /// Netlink port id of the sender, usually the process id.
    pub port_id: u32,
}

impl RequestContext {
    pub fn new(sequence: u32, port_id: u32) -> Self {
        Self { sequence, port_id }
    }

    /// Build a context for the calling process with a random starting sequence.
    pub fn for_current_process() -> Self {
        Self {
            sequence: SmallRng::from_entropy().gen(),
            port_id: std::process::id(),
        }
    }
}
