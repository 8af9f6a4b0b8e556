//! Interview engine — a chat-style questionnaire driven by a state machine.
//!
//! Questions are registered into an ordered [`Catalog`]; the interview asks
//! the first unanswered one, runs the answer through its transform and
//! validation (either may complete later), and records everything in an
//! append-only [`Transcript`]. When no unanswered question is left the
//! interview completes with the collected [`Answers`].

pub mod catalog;
pub mod coordinator;
pub mod declarations;
pub mod question;
pub mod reducer;
pub mod render;
pub mod runtime;
pub mod state;
pub mod transcript;
pub mod watcher;

pub use catalog::{Catalog, CatalogEntry, Registrar, find_first_unanswered};
pub use declarations::{Declaration, Declarations, Roster, RosterChange};
pub use question::{Choice, QuestionId, QuestionSpec, StepOutcome, stringify};
pub use reducer::{current_question, reduce};
pub use render::{RenderView, Renderer, Submitter, TranscriptItem, assemble};
pub use runtime::Interview;
pub use state::{Answers, Event, InterviewState, Phase};
pub use transcript::{LogEntry, Transcript};
pub use watcher::{CompletionLatch, Verdict, evaluate};
