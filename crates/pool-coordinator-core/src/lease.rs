//! Helpers for reading node heartbeat `Lease` objects.

use std::time::Duration;

use chrono::{DateTime, Utc};
use k8s_openapi::api::coordination::v1::Lease;

use crate::constants::{ANNOTATION_DELEGATE_HEARTBEAT, DELEGATE_HEARTBEAT_TRUE};

/// Whether the last renewal of this lease was performed by a delegate.
///
/// Anything other than the literal `"true"` counts as not delegated.
#[must_use]
pub fn lease_is_delegated(lease: &Lease) -> bool {
    lease
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(ANNOTATION_DELEGATE_HEARTBEAT))
        .is_some_and(|v| v == DELEGATE_HEARTBEAT_TRUE)
}

/// When the lease was last renewed, falling back to its creation time.
#[must_use]
pub fn lease_timestamp(lease: &Lease) -> Option<DateTime<Utc>> {
    lease
        .spec
        .as_ref()
        .and_then(|s| s.renew_time.as_ref())
        .map(|t| t.0)
        .or_else(|| lease.metadata.creation_timestamp.as_ref().map(|t| t.0))
}

/// Whether the lease was renewed less than `window` before `now`.
///
/// A lease with no timestamp at all is never alive. A window too large to
/// represent never expires.
#[must_use]
pub fn lease_is_alive(lease: &Lease, now: DateTime<Utc>, window: Duration) -> bool {
    let Some(stamp) = lease_timestamp(lease) else {
        return false;
    };
    let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
    now.signed_duration_since(stamp) < window
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::LEASE_LIVENESS_WINDOW;
    use k8s_openapi::api::coordination::v1::LeaseSpec;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{MicroTime, ObjectMeta, Time};
    use std::collections::BTreeMap;

    fn lease(annotation: Option<&str>) -> Lease {
        Lease {
            metadata: ObjectMeta {
                name: Some("edge-1".to_string()),
                annotations: annotation.map(|v| {
                    BTreeMap::from([(ANNOTATION_DELEGATE_HEARTBEAT.to_string(), v.to_string())])
                }),
                ..Default::default()
            },
            spec: None,
        }
    }

    #[test]
    fn delegation_flag() {
        assert!(lease_is_delegated(&lease(Some("true"))));
        assert!(!lease_is_delegated(&lease(Some("false"))));
        assert!(!lease_is_delegated(&lease(Some("TRUE "))));
        assert!(!lease_is_delegated(&lease(None)));
    }

    #[test]
    fn renew_time_preferred_over_creation() {
        let now = Utc::now();
        let mut l = lease(None);
        l.metadata.creation_timestamp = Some(Time(now - chrono::Duration::hours(1)));
        assert_eq!(lease_timestamp(&l), Some(now - chrono::Duration::hours(1)));

        l.spec = Some(LeaseSpec {
            renew_time: Some(MicroTime(now)),
            ..Default::default()
        });
        assert_eq!(lease_timestamp(&l), Some(now));
    }

    #[test]
    fn liveness_boundary() {
        let now = Utc::now();
        let mut l = lease(None);

        l.metadata.creation_timestamp = Some(Time(now - chrono::Duration::milliseconds(39_999)));
        assert!(lease_is_alive(&l, now, LEASE_LIVENESS_WINDOW));

        l.metadata.creation_timestamp = Some(Time(now - chrono::Duration::milliseconds(40_001)));
        assert!(!lease_is_alive(&l, now, LEASE_LIVENESS_WINDOW));
    }

    #[test]
    fn oversized_window_never_expires() {
        let now = Utc::now();
        let mut l = lease(None);
        l.metadata.creation_timestamp = Some(Time(now - chrono::Duration::days(3650)));

        assert!(!lease_is_alive(&l, now, LEASE_LIVENESS_WINDOW));
        assert!(lease_is_alive(&l, now, Duration::from_secs(u64::MAX)));
    }

    #[test]
    fn lease_without_timestamp_is_dead() {
        assert!(!lease_is_alive(&lease(None), Utc::now(), LEASE_LIVENESS_WINDOW));
    }
}
