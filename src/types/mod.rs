// ABOUTME: Validated domain types shared across modules.
// ABOUTME: Image names, session identity, and the clamped worker count.

mod concurrency;
mod image_name;
mod session_key;

pub use concurrency::{Concurrency, DEFAULT_CONCURRENCY, MAX_CONCURRENCY};
pub use image_name::{ImageName, ImageNameError};
pub use session_key::SessionKey;
