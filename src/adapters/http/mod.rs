//! HTTP adapters - Clients for other services.

mod post_directory;

pub use post_directory::HttpPostDirectory;
