//! Template rendering.

pub mod template;

pub use template::render_template;
