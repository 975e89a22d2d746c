pub mod collaborators;
pub mod guard;
pub mod machine;
pub mod registry;
pub mod timers;

pub use collaborators::{SessionAuth, SessionNotifier, SupabaseSessionAuth};
pub use guard::SessionGuard;
pub use machine::SessionMachine;
pub use registry::SessionGuardRegistry;
pub use timers::TimerSet;
