pub mod google;
pub mod recurrence;
pub mod store;
pub mod sync;
pub mod tokens;

pub use google::GoogleCalendarClient;
pub use recurrence::{describe_recurrence, recurrence_rule};
pub use store::{CalendarHandleStore, SupabaseCalendarStore};
pub use sync::{
    insert_chronologically, meeting_link, merge_created, plan_cancellation, validate_intent,
    AppointmentSyncService, CalendarSettings,
};
pub use tokens::{ProviderTokenSource, SupabaseProviderTokens};
