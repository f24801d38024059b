pub mod converter;

pub use converter::{tokens_to_document, DocumentConverter};
