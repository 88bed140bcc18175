//! Photo retrieval and decoding.

pub(crate) mod decode;
/// Concurrent photo loading.
pub mod loader;
/// Source references and byte retrieval.
pub mod source;
