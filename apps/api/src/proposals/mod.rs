// Proposals: asks the language model for keywords and edits, and turns its
// loosely structured replies into a validated batch of changes.

pub mod handlers;
pub mod parser;
pub mod prompts;
pub mod service;
