//! Pure domain logic for the EduVision animation service.
//!
//! Nothing in this crate touches the filesystem, the network, or child
//! processes; those live in `eduvision-pipeline` and `eduvision-llm`.

pub mod error;
pub mod scene;
pub mod script;
pub mod topic;
pub mod types;
