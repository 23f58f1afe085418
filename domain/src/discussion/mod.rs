//! Discussion records
//!
//! ```text
//! Discussion ──owns ids──▶ Stage ──owns ids──▶ Response
//!      ▲                     │  ▲                  │
//!      └──── discussion_id ──┘  └──── stage_id ────┘
//! ```

pub mod entities;
pub mod ids;
pub mod transcript;

pub use entities::{Discussion, Response, Stage};
pub use ids::{DiscussionId, ResponseId, StageId};
pub use transcript::{DiscussionTranscript, StageTranscript};
