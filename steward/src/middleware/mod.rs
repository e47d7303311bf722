//! Middleware
//!
//! Tower layers the toolkit ships; currently the cookie-based session
//! layer every steward route runs behind.

mod session;

pub use session::{SameSite, SessionConfig, SessionLayer, SessionMiddleware, SESSION_COOKIE_NAME};
