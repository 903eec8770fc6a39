pub mod answer;
pub mod attachment;
pub mod chain;
pub mod extraction;
pub mod outcome;
pub mod task;

pub use answer::{Confidence, SynthesizedAnswer, TypedValue};
pub use attachment::{AttachmentContent, AttachmentKind, DecodedAttachment, TableData};
pub use chain::{AbsorbedFailure, ChainFailure, ChainResult, ChainState, ChainSuccess, FailureKind, TaskReport};
pub use extraction::{ExtractionResult, PayloadSource, ProblemSource, StructuredPayload};
pub use outcome::{Classification, SubmissionOutcome};
pub use task::{Identity, Task};
