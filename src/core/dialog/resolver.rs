//! Slot-filling decision table.
//!
//! Each turn is resolved from scratch: the merged session is reduced to a
//! [`SlotPresence`] tuple and the first matching rule of the cascade wins.
//! Tool results are folded back in through [`after_availability`] and
//! [`after_booking`], which keeps every decision a pure function.

use serde_json::Value;

use super::types::Intent;
use crate::core::booking::{
    AvailabilityOutcome, AvailabilityRequest, BookingOutcome, BookingRequest, appointment_start,
};
use crate::core::business::BusinessProfile;
use crate::core::session::{CallSession, DialogStep};

/// Timezone used when neither the caller nor the business supplies one.
pub const DEFAULT_TIMEZONE: &str = "America/New_York";

/// Reply used whenever a branch would otherwise produce no text.
pub const FALLBACK_REPLY: &str =
    "I had trouble processing that. Could you tell me what you'd like to book and when?";

const MAX_LISTED_SERVICES: usize = 2;

/// Which of the required slots are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPresence {
    pub asks_services: bool,
    pub service: bool,
    pub date_time: bool,
    pub name: bool,
    pub contact: bool,
}

impl SlotPresence {
    pub fn of(session: &CallSession, intent: Intent) -> Self {
        Self {
            asks_services: intent == Intent::AskServices,
            service: session.service.is_some(),
            date_time: session.date.is_some() && session.time.is_some(),
            name: session.name.is_some(),
            contact: session.has_contact(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    ListServices,
    OfferServices,
    AskDateTime,
    AskContact,
    CheckAvailability,
}

/// The priority cascade.
pub fn next_step(presence: SlotPresence) -> NextStep {
    let SlotPresence {
        asks_services,
        service,
        date_time,
        name,
        contact,
    } = presence;

    match (asks_services, service, date_time, name && contact) {
        (true, _, _, _) => NextStep::ListServices,
        (false, false, _, _) => NextStep::OfferServices,
        (false, true, false, _) => NextStep::AskDateTime,
        (false, true, true, false) => NextStep::AskContact,
        (false, true, true, true) => NextStep::CheckAvailability,
    }
}

/// Text answer for the caller plus what to do with the session afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub step: Option<DialogStep>,
    pub clear_session: bool,
}

impl Reply {
    fn new(text: String, step: DialogStep) -> Self {
        Self {
            text: non_empty_or_fallback(text),
            step: Some(step),
            clear_session: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Reply(Reply),
    CheckAvailability(AvailabilityRequest),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AfterAvailability {
    Reply(Reply),
    Book(BookingRequest),
}

/// Inputs that do not change within a turn.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    pub business_id: &'a str,
    pub profile: &'a BusinessProfile,
    pub default_timezone: &'a str,
}

impl ResolveContext<'_> {
    /// Caller's timezone, then the business default, then the global default.
    pub fn timezone_for(&self, session: &CallSession) -> String {
        session
            .timezone
            .as_deref()
            .or(self.profile.timezone.as_deref())
            .filter(|tz| !tz.trim().is_empty())
            .unwrap_or(self.default_timezone)
            .to_string()
    }
}

pub fn non_empty_or_fallback(text: String) -> String {
    if text.trim().is_empty() {
        FALLBACK_REPLY.to_string()
    } else {
        text
    }
}

/// "A", "A or B"; at most two names.
fn service_choice(profile: &BusinessProfile) -> Option<String> {
    let names: Vec<&str> = profile
        .service_names()
        .into_iter()
        .take(MAX_LISTED_SERVICES)
        .collect();
    (!names.is_empty()).then(|| names.join(" or "))
}

/// First pass of a turn: either answer directly or ask for an availability check.
pub fn resolve(session: &CallSession, intent: Intent, ctx: &ResolveContext<'_>) -> Decision {
    let step = next_step(SlotPresence::of(session, intent));

    let text = match step {
        NextStep::ListServices => match service_choice(ctx.profile) {
            Some(choice) => format!("We offer {choice}. Which one would you like to book?"),
            None => "Which service would you like to book?".to_string(),
        },
        NextStep::OfferServices => match service_choice(ctx.profile) {
            Some(choice) => format!("Would you like to book {choice}?"),
            None => "What service would you like to book today?".to_string(),
        },
        NextStep::AskDateTime => "What day and time work best for you?".to_string(),
        NextStep::AskContact => {
            "Can I get your name and either an email address or phone number for the booking?"
                .to_string()
        }
        NextStep::CheckAvailability => {
            return match (&session.service, &session.date) {
                (Some(service), Some(date)) => Decision::CheckAvailability(AvailabilityRequest {
                    business_id: ctx.business_id.to_string(),
                    date: date.clone(),
                    timezone: ctx.timezone_for(session),
                    duration_minutes: ctx.profile.duration_for(service),
                }),
                _ => Decision::Reply(Reply::new(String::new(), DialogStep::AskDatetime)),
            };
        }
    };

    let tag = match step {
        NextStep::ListServices | NextStep::OfferServices => DialogStep::AskService,
        NextStep::AskDateTime => DialogStep::AskDatetime,
        NextStep::AskContact | NextStep::CheckAvailability => DialogStep::AskContact,
    };
    Decision::Reply(Reply::new(text, tag))
}

/// Second pass: booking is only attempted on an explicit `available: true`.
pub fn after_availability(
    session: &CallSession,
    availability: &Value,
    ctx: &ResolveContext<'_>,
) -> AfterAvailability {
    match AvailabilityOutcome::from_value(availability) {
        AvailabilityOutcome::Available => match (&session.date, &session.time, &session.name) {
            (Some(date), Some(time), Some(name)) => AfterAvailability::Book(BookingRequest {
                business_id: ctx.business_id.to_string(),
                start: appointment_start(date, time),
                timezone: ctx.timezone_for(session),
                service: session.service.clone(),
                guest_name: name.clone(),
                guest_email: session.email.clone(),
                guest_phone: session.phone.clone(),
            }),
            _ => AfterAvailability::Reply(Reply::new(String::new(), DialogStep::AskContact)),
        },
        AvailabilityOutcome::Unavailable { error } => {
            let reason = error.map(|e| format!(" ({e})")).unwrap_or_default();
            AfterAvailability::Reply(Reply::new(
                format!(
                    "Sorry, that time isn't available{reason}. Is there another day or time that works for you?"
                ),
                DialogStep::Unavailable,
            ))
        }
    }
}

/// Final pass: confirm and clear on success, keep slots on failure.
pub fn after_booking(session: &CallSession, booking: &Value) -> Reply {
    match BookingOutcome::from_value(booking) {
        BookingOutcome::Booked => {
            let service = session.service.as_deref().unwrap_or("appointment");
            let date = session.date.as_deref().unwrap_or_default();
            let time = session.time.as_deref().unwrap_or_default();
            let name = session.name.as_deref().unwrap_or_default();
            Reply {
                text: format!(
                    "You're all set! I've booked your {service} on {date} at {time} for {name}. Is there anything else I can help with?"
                ),
                step: Some(DialogStep::Booked),
                clear_session: true,
            }
        }
        BookingOutcome::Failed { error } => {
            let reason = error.map(|e| format!(" ({e})")).unwrap_or_default();
            Reply::new(
                format!(
                    "Sorry, I couldn't complete the booking{reason}. Would you like me to try again?"
                ),
                DialogStep::BookingFailed,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::business::ServiceOffering;
    use serde_json::json;

    fn profile(names: &[&str]) -> BusinessProfile {
        BusinessProfile {
            id: Some("waismofit".to_string()),
            name: Some("Waismo Fitness".to_string()),
            timezone: None,
            services: names
                .iter()
                .map(|n| ServiceOffering {
                    name: n.to_string(),
                    duration_minutes: Some(60),
                    price: None,
                })
                .collect(),
        }
    }

    fn ctx(profile: &BusinessProfile) -> ResolveContext<'_> {
        ResolveContext {
            business_id: "waismofit",
            profile,
            default_timezone: DEFAULT_TIMEZONE,
        }
    }

    fn full_session() -> CallSession {
        CallSession {
            step: None,
            service: Some("Yoga".to_string()),
            date: Some("2025-07-01".to_string()),
            time: Some("10:00".to_string()),
            name: Some("Ana".to_string()),
            email: None,
            phone: Some("+15550002222".to_string()),
            timezone: None,
        }
    }

    fn reply_text(decision: Decision) -> String {
        match decision {
            Decision::Reply(reply) => reply.text,
            other => panic!("expected reply, got {other:?}"),
        }
    }

    #[test]
    fn test_cascade_table() {
        let p = |asks, service, date_time, name, contact| SlotPresence {
            asks_services: asks,
            service,
            date_time,
            name,
            contact,
        };
        assert_eq!(next_step(p(true, true, true, true, true)), NextStep::ListServices);
        assert_eq!(next_step(p(false, false, true, true, true)), NextStep::OfferServices);
        assert_eq!(next_step(p(false, true, false, true, true)), NextStep::AskDateTime);
        assert_eq!(next_step(p(false, true, true, false, true)), NextStep::AskContact);
        assert_eq!(next_step(p(false, true, true, true, false)), NextStep::AskContact);
        assert_eq!(next_step(p(false, true, true, true, true)), NextStep::CheckAvailability);
    }

    #[test]
    fn test_presence_requires_both_date_and_time() {
        let session = CallSession {
            service: Some("Yoga".to_string()),
            date: Some("2025-07-01".to_string()),
            ..Default::default()
        };
        assert_eq!(
            next_step(SlotPresence::of(&session, Intent::Book)),
            NextStep::AskDateTime
        );
    }

    #[test]
    fn test_ask_services_lists_two_joined_by_or() {
        let profile = profile(&["Yoga", "Pilates", "Spin"]);
        let text = reply_text(resolve(&CallSession::default(), Intent::AskServices, &ctx(&profile)));
        assert_eq!(text, "We offer Yoga or Pilates. Which one would you like to book?");
    }

    #[test]
    fn test_missing_service_offers_choice() {
        let profile = profile(&["Yoga"]);
        let decision = resolve(&CallSession::default(), Intent::Book, &ctx(&profile));
        match decision {
            Decision::Reply(reply) => {
                assert_eq!(reply.text, "Would you like to book Yoga?");
                assert_eq!(reply.step, Some(DialogStep::AskService));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_empty_catalog_still_replies() {
        let profile = profile(&[]);
        for intent in [Intent::AskServices, Intent::Other] {
            let text = reply_text(resolve(&CallSession::default(), intent, &ctx(&profile)));
            assert!(!text.is_empty());
        }
    }

    #[test]
    fn test_service_known_asks_for_day_and_time() {
        let profile = profile(&["Yoga"]);
        let session = CallSession {
            service: Some("Yoga".to_string()),
            ..Default::default()
        };
        let text = reply_text(resolve(&session, Intent::Book, &ctx(&profile)));
        assert_eq!(text, "What day and time work best for you?");
    }

    #[test]
    fn test_email_or_phone_satisfies_contact() {
        let profile = profile(&["Yoga"]);
        let mut session = full_session();
        session.phone = None;
        assert!(matches!(
            resolve(&session, Intent::Book, &ctx(&profile)),
            Decision::Reply(_)
        ));
        session.email = Some("ana@example.com".to_string());
        assert!(matches!(
            resolve(&session, Intent::Book, &ctx(&profile)),
            Decision::CheckAvailability(_)
        ));
    }

    #[test]
    fn test_check_availability_uses_duration_and_timezone_fallbacks() {
        let mut profile = profile(&["Yoga"]);
        let session = full_session();

        match resolve(&session, Intent::Book, &ctx(&profile)) {
            Decision::CheckAvailability(req) => {
                assert_eq!(req.duration_minutes, 60);
                assert_eq!(req.timezone, DEFAULT_TIMEZONE);
                assert_eq!(req.date, "2025-07-01");
            }
            other => panic!("unexpected {other:?}"),
        }

        profile.timezone = Some("America/Denver".to_string());
        let mut unknown_service = session.clone();
        unknown_service.service = Some("Underwater basket weaving".to_string());
        match resolve(&unknown_service, Intent::Book, &ctx(&profile)) {
            Decision::CheckAvailability(req) => {
                assert_eq!(req.duration_minutes, 30);
                assert_eq!(req.timezone, "America/Denver");
            }
            other => panic!("unexpected {other:?}"),
        }

        let mut caller_tz = session;
        caller_tz.timezone = Some("Europe/Paris".to_string());
        match resolve(&caller_tz, Intent::Book, &ctx(&profile)) {
            Decision::CheckAvailability(req) => assert_eq!(req.timezone, "Europe/Paris"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unavailable_apologizes_and_cites_error() {
        let profile = profile(&["Yoga"]);
        let session = full_session();
        match after_availability(
            &session,
            &json!({"available": false, "error": "Fully booked"}),
            &ctx(&profile),
        ) {
            AfterAvailability::Reply(reply) => {
                assert!(reply.text.starts_with("Sorry"));
                assert!(reply.text.contains("Fully booked"));
                assert!(reply.text.contains("another day or time"));
                assert!(!reply.clear_session);
                assert_eq!(reply.step, Some(DialogStep::Unavailable));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_malformed_availability_is_unavailable() {
        let profile = profile(&["Yoga"]);
        for value in [json!(null), json!("yes"), json!([true]), json!({"available": "true"})] {
            assert!(matches!(
                after_availability(&full_session(), &value, &ctx(&profile)),
                AfterAvailability::Reply(_)
            ));
        }
    }

    #[test]
    fn test_available_builds_booking_request() {
        let profile = profile(&["Yoga"]);
        match after_availability(&full_session(), &json!({"available": true}), &ctx(&profile)) {
            AfterAvailability::Book(req) => {
                assert_eq!(req.start, "2025-07-01T10:00:00");
                assert_eq!(req.guest_name, "Ana");
                assert_eq!(req.guest_phone.as_deref(), Some("+15550002222"));
                assert!(req.guest_email.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_booking_success_confirms_and_clears() {
        let reply = after_booking(&full_session(), &json!({"ok": true}));
        assert!(reply.clear_session);
        for part in ["Yoga", "2025-07-01", "10:00", "Ana"] {
            assert!(reply.text.contains(part), "missing {part} in {}", reply.text);
        }
    }

    #[test]
    fn test_booking_failure_keeps_slots() {
        let reply = after_booking(&full_session(), &json!({"ok": false, "error": "Calendar locked"}));
        assert!(!reply.clear_session);
        assert!(reply.text.contains("Calendar locked"));
        assert!(reply.text.contains("try again"));
    }

    #[test]
    fn test_fallback_reply() {
        assert_eq!(non_empty_or_fallback("  ".to_string()), FALLBACK_REPLY);
        assert_eq!(non_empty_or_fallback("hi".to_string()), "hi");
    }
}
