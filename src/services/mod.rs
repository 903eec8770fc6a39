//! 业务能力层
//!
//! 每个服务只负责一项能力，不关心链的流程。

pub mod answer_synthesizer;
pub mod attachment_decoder;
pub mod normalizer;
pub mod submission_interpreter;

pub use answer_synthesizer::{AnswerSynthesizer, RefinementHint};
pub use attachment_decoder::AttachmentDecoder;
pub use normalizer::normalize;
pub use submission_interpreter::SubmissionInterpreter;
