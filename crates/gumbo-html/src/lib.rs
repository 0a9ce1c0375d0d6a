//! Gumbo HTML Engine Boundary
//!
//! Record layouts, closed enumerations and the decoder for the output of a
//! gumbo-style HTML engine, plus the engines that produce it: a built-in one
//! running html5ever and, with the `system-gumbo` feature, the C library.

pub mod blob;
pub mod decode;
pub mod diagnostic;
pub mod engine;
mod error;
pub mod ffi;
mod options;
mod parser;
mod source;
#[cfg(feature = "system-gumbo")]
mod system;
mod tag;
mod types;

pub use diagnostic::{ErrorDetail, ParseDiagnostic};
pub use engine::Engine;
pub use error::{DecodeError, EngineError};
pub use ffi::SourcePosition;
pub use options::{FragmentContext, ParseOptions};
pub use parser::BuiltinEngine;
#[cfg(feature = "system-gumbo")]
pub use system::{OptionsRecord, SystemEngine};
pub use tag::Tag;
pub use types::{
    AttrNamespace, ErrorType, InsertionMode, Namespace, NodeType, ParseFlags, QuirksMode,
    TokenType, TokenizerState,
};

/// Parse `html` with the built-in engine and return the output blob.
///
/// The blob may point into `html`; keep it alive until the blob is freed
/// with [`Engine::destroy_output`].
pub fn parse(
    html: &[u8],
    options: &ParseOptions,
) -> Result<std::ptr::NonNull<ffi::OutputRecord>, EngineError> {
    BuiltinEngine.parse(html, options)
}
