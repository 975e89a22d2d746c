use chrono::NaiveDate;

use crate::models::RecurrenceType;

impl RecurrenceType {
    fn rrule_base(&self) -> Option<&'static str> {
        match self {
            RecurrenceType::Daily => Some("FREQ=DAILY"),
            RecurrenceType::Weekly => Some("FREQ=WEEKLY"),
            RecurrenceType::Biweekly => Some("FREQ=WEEKLY;INTERVAL=2"),
            RecurrenceType::Monthly => Some("FREQ=MONTHLY"),
            RecurrenceType::Yearly => Some("FREQ=YEARLY"),
            RecurrenceType::None => None,
        }
    }
}

/// Provider-native recurrence rules for an appointment. The series ends on
/// the last second of `until` (UTC).
pub fn recurrence_rule(kind: RecurrenceType, until: Option<NaiveDate>) -> Option<Vec<String>> {
    let base = kind.rrule_base()?;

    let rule = match until {
        Some(date) => format!("RRULE:{};UNTIL={}", base, date.format("%Y%m%dT235959Z")),
        None => format!("RRULE:{}", base),
    };

    Some(vec![rule])
}

/// Short label for a recurrence rule list, as shown next to an appointment.
pub fn describe_recurrence(rules: &[String]) -> Option<&'static str> {
    let rule = rules.first()?;

    let label = if rule.contains("FREQ=DAILY") {
        "Daily"
    } else if rule.contains("FREQ=WEEKLY") {
        if rule.contains("INTERVAL=2") {
            "Bi-weekly"
        } else {
            "Weekly"
        }
    } else if rule.contains("FREQ=MONTHLY") {
        "Monthly"
    } else if rule.contains("FREQ=YEARLY") {
        "Yearly"
    } else {
        "Recurring"
    };

    Some(label)
}
