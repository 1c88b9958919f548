pub mod clusters;
pub mod events;
pub mod prompts;
