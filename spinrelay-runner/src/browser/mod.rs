mod bridge;
mod session;

pub use bridge::PageFetchBridge;
pub use session::{BrowserConfig, BrowserKind, new_session};
