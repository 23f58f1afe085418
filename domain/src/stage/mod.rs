//! Stage protocol
//!
//! ```text
//! Opening ──▶ Analysis ──▶ Refinement ──▶ LockIn ──▶ Final
//!  conf 0.0    conf 0.5     conf 0.6       conf 0.7   conf 0.75
//! ```
//!
//! Every discussion walks the whole sequence. A stage passes when the
//! similarity of its responses reaches the protocol threshold and their
//! average confidence reaches the stage's required confidence; only the
//! result of the last stage decides the outcome.

pub mod protocol;
pub mod stage_type;

pub use protocol::{DEFAULT_SIMILARITY_THRESHOLD, ProtocolConfig, StageSettings};
pub use stage_type::StageType;
