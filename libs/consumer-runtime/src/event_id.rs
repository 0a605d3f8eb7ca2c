use event_bus::InboundRecord;

/// Builds the key the idempotency store dedups on. Prefers a business
/// identity (`channel + eventType + aggregateId`) so that redeliveries with
/// a different transport offset still collide; falls back to the
/// transport identity when the handler can't supply one.
pub fn compute_event_id(channel: &str, business_identity: Option<(String, String)>, record: &InboundRecord) -> String {
    match business_identity {
        Some((event_type, aggregate_id)) => format!("{channel}:{event_type}:{aggregate_id}"),
        None => format!("{}-{}-{}", record.topic, record.partition, record.offset),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> InboundRecord {
        InboundRecord {
            topic: "application.created".into(),
            partition: 3,
            offset: 17,
            key: "42".into(),
            payload: vec![],
        }
    }

    #[test]
    fn prefers_business_identity_when_available() {
        let id = compute_event_id("email", Some(("APPLICATION_CREATED".into(), "42".into())), &record());
        assert_eq!(id, "email:APPLICATION_CREATED:42");
    }

    #[test]
    fn falls_back_to_transport_identity() {
        let id = compute_event_id("email", None, &record());
        assert_eq!(id, "application.created-3-17");
    }

    #[test]
    fn redelivery_with_a_different_offset_collides_under_business_identity() {
        let mut redelivered = record();
        redelivered.offset = 9999;
        let a = compute_event_id("email", Some(("APPLICATION_CREATED".into(), "42".into())), &record());
        let b = compute_event_id("email", Some(("APPLICATION_CREATED".into(), "42".into())), &redelivered);
        assert_eq!(a, b);
    }
}
