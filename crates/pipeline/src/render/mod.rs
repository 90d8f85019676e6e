//! Rendering engine invocation.
//!
//! [`engine::RenderEngine`] is the seam between the pipeline and the external
//! renderer; [`manim::ManimEngine`] is the production implementation. All
//! process handling (capture, timeout, cancellation) lives in [`subprocess`].

pub mod engine;
pub mod manim;
pub mod subprocess;

pub use engine::{RenderEngine, RenderError, RenderOutput, RenderRequest};
pub use manim::{ManimEngine, RenderQuality};
