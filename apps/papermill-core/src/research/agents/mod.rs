pub mod editor;
pub mod plagiarism;
pub mod researcher;
pub mod writer;
