//! Platform identification and live-status resolution.
//!
//! [`platform`] maps a room URL to a platform identity without touching the
//! network. [`resolver`] holds the per-platform [`PlatformResolver`]
//! implementations that ask a platform whether a room is live and which
//! stream URL to capture.

pub mod client;
pub mod error;
pub mod extractor;
pub mod headers;
pub mod media;
pub mod platform;
pub mod platforms;
pub mod resolver;
pub mod utils;

pub use client::{build_client, default_client, install_rustls_provider};
pub use error::{ErrorKind, ResolverError};
pub use media::{Credentials, Quality, StreamInfo, StreamTarget};
pub use platform::{PlatformMatch, identify, resolve};
pub use resolver::{PlatformResolver, ResolverRegistry};
