pub mod line_classifier;
pub mod annotations;
pub mod state_machine;
pub mod script_parser;

pub use line_classifier::{classify, ClassifiedLine, LineKind};
pub use annotations::{extract_annotations, LineAnnotations};
pub use state_machine::{transition, BlockState, Emit, IndentContext, IndentJump, IndentTracker, Layout};
pub use script_parser::{ParseOutput, SceneNumbering, ScriptParser};
