//! # Session Guard Cell
//!
//! Enforces an upper bound on unattended authenticated sessions. Recognized
//! user interaction keeps a session alive; after a period of inactivity the
//! user gets a warning window with a live countdown and can either extend
//! the session or be signed out.
//!
//! ## Architecture
//!
//! ```text
//! +-----------------------------------------------------+
//! |                 Session Guard Cell                  |
//! +-----------------------------------------------------+
//! |  handlers.rs      |  HTTP endpoint handlers         |
//! |  router.rs        |  Route definitions              |
//! |  models.rs        |  States, events, notices        |
//! |  services/                                          |
//! |    machine.rs     |  Pure transition function       |
//! |    timers.rs      |  Cancellable timer handles      |
//! |    guard.rs       |  Event loop driving the machine |
//! |    collaborators.rs| Sign-out and notification seams|
//! |    registry.rs    |  One guard per signed-in user   |
//! +-----------------------------------------------------+
//! ```
//!
//! ## API Endpoints
//!
//! - `POST /session/activity` - Report a user interaction
//! - `POST /session/extend` - Extend the session from the warning window
//! - `POST /session/sign-out` - End the session now
//! - `GET /session/status` - Current state and remaining time
//!
//! ## Configuration
//!
//! - `SESSION_TIMEOUT_MINUTES` - Total inactivity budget (default 22)
//! - `SESSION_WARNING_MINUTES` - Warning lead time before timeout (default 2)

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{
    ActivityKind, ExpiryReason, SessionEvent, SessionGuardError, SessionGuardSettings,
    SessionNotice, SessionSnapshot, SessionState,
};

pub use services::{
    SessionAuth, SessionGuard, SessionGuardRegistry, SessionMachine, SessionNotifier,
    SupabaseSessionAuth, TimerSet,
};

pub use router::session_guard_routes;
