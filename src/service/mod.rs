//! Service layer.
//!
//! Application handlers that plug into the MCP dispatcher. The bundled
//! tea catalog serves as the default handler of the binary.

pub mod tea;

pub use tea::TeaHandler;
