// THEORY:
// `veer_drishti_server` is the thin transport around the engine. It holds no
// invariants of its own: every handler is a read of a producer snapshot, or a single
// call to `force_emergency`. The binary in `src/bin/server.rs` is the composition
// root. It builds one pipeline and one simulator, starts them, and passes their
// handles to the router.

pub mod config;
pub mod error;
pub mod routes;

pub use config::{ConfigError, ServerConfig};
pub use error::ApiError;
pub use routes::{AppState, router};
