// Errors raised while flattening and serializing track data.

use thiserror::Error;

use crate::events::Pulse;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SerializeError {
    /// An event's timestamp is earlier than the running time of the
    /// track being written, which cannot be expressed as an SMF
    /// delta-time. Indicates corrupted ordering upstream; the write is
    /// abandoned rather than silently reordered.
    #[error("event at pulse {timestamp} precedes running time {previous}")]
    NegativeDelta { timestamp: Pulse, previous: Pulse },

    /// A trigger segment whose end precedes its start.
    #[error("trigger segment [{tick_start}, {tick_end}] is inverted")]
    MalformedTrigger { tick_start: Pulse, tick_end: Pulse },

    /// A value does not fit the variable-length quantity domain.
    #[error("value {0} exceeds the variable-length quantity maximum")]
    VarinumOverflow(u64),
}
