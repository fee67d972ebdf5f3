pub mod extraction;
pub mod intake;
pub mod summary;
pub mod sentiment;
pub mod engines;
pub mod processor; // upload → extract → summarize → sentiment → export
