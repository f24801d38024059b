pub mod script_token;
pub mod vfx;
pub mod entity;
pub mod document;
pub mod conf;
pub mod error;

pub use script_token::ScriptToken;
pub use vfx::{VfxLevel, VfxTag};
pub use entity::{entity_key, Entity, EntityKind, EntityRegistry, MentionMatcher};
pub use document::{attr, parse_spans, AttrValue, Block, BlockClass, Document, EntityDecl, Span};
pub use conf::{Conf, ExportMode};
pub use error::{BreakdownError, BreakdownResult, ParseLineError};
