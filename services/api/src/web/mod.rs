pub mod rest;
pub mod state;

// Re-export the route handlers to make them easily accessible
// to the binary that will build the web server router.
pub use rest::{chat_handler, summary_handler};
