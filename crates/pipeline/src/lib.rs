//! Render-and-publish pipeline.
//!
//! Turns generated script text into a single published video file:
//!
//! 1. [`workspace`] materializes the script in a per-run directory.
//! 2. [`render`] runs the rendering engine against it as a child process.
//! 3. [`locate`] finds the rendered video in the engine's output tree.
//! 4. [`publish`] copies it to its published path(s).
//! 5. The workspace is removed on every exit path.
//!
//! [`pipeline::RenderPipeline`] sequences the steps.

pub mod error;
pub mod locate;
pub mod pipeline;
pub mod publish;
pub mod render;
pub mod workspace;

pub use error::PipelineError;
pub use pipeline::{PipelineConfig, PublishedArtifact, RenderPipeline};
