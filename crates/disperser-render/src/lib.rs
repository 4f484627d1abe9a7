//! disperser-render: Offline WAV rendering through the disperser
//!
//! Drives [`disperser_dsp::Disperser`] the way a host would: prepare once,
//! then feed fixed-size blocks. Used by the `disperser-render` binary and by
//! tests that need whole-file output.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use disperser_render::{RenderSettings, render_file};
//!
//! let settings = RenderSettings { stages: 64.0, reverse: true, ..Default::default() };
//! let report = render_file("in.wav".as_ref(), "out.wav".as_ref(), &settings)?;
//! ```

mod decoder;
mod encoder;
mod error;
mod pipeline;

pub use decoder::*;
pub use encoder::*;
pub use error::*;
pub use pipeline::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
