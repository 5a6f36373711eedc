//! arXiv search client used by the research stage.

pub mod arxiv;

pub use arxiv::client::{ArxivClient, DEFAULT_BASE};
pub use arxiv::types::PaperCard;
