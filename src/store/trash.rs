use time::{Duration, OffsetDateTime};

/// Estimated time before the server purges a trashed note. Display only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrashCountdown {
    pub label: String,
    pub days_left: Option<i64>,
    pub expired: bool,
    pub indefinite: bool,
}

pub fn countdown(
    deleted_at: OffsetDateTime,
    retention_days: u32,
    now: OffsetDateTime,
) -> TrashCountdown {
    if retention_days == 0 {
        return TrashCountdown {
            label: "manual purge only".into(),
            days_left: None,
            expired: false,
            indefinite: true,
        };
    }

    let purge_at = deleted_at + Duration::days(i64::from(retention_days));
    let remaining = purge_at - now;
    if remaining <= Duration::ZERO {
        return TrashCountdown {
            label: "expired".into(),
            days_left: Some(0),
            expired: true,
            indefinite: false,
        };
    }

    let label = if remaining >= Duration::days(1) {
        format!("{}d left", remaining.whole_days())
    } else if remaining >= Duration::hours(1) {
        format!("{}h left", remaining.whole_hours())
    } else {
        format!("{}m left", remaining.whole_minutes().max(1))
    };

    TrashCountdown {
        label,
        days_left: Some(remaining.whole_days()),
        expired: false,
        indefinite: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn reports_whole_days_remaining() {
        let deleted = datetime!(2024-05-01 12:00 UTC);
        let now = datetime!(2024-05-03 13:00 UTC);
        let status = countdown(deleted, 30, now);
        assert_eq!(status.label, "27d left");
        assert_eq!(status.days_left, Some(27));
        assert!(!status.expired);
    }

    #[test]
    fn switches_to_hours_and_minutes_on_the_last_day() {
        let deleted = datetime!(2024-05-01 12:00 UTC);
        assert_eq!(
            countdown(deleted, 1, datetime!(2024-05-02 07:00 UTC)).label,
            "5h left"
        );
        assert_eq!(
            countdown(deleted, 1, datetime!(2024-05-02 11:30 UTC)).label,
            "30m left"
        );
    }

    #[test]
    fn past_window_is_expired_and_zero_retention_is_indefinite() {
        let deleted = datetime!(2024-05-01 12:00 UTC);
        let expired = countdown(deleted, 1, datetime!(2024-05-05 00:00 UTC));
        assert!(expired.expired);
        assert_eq!(expired.label, "expired");

        let manual = countdown(deleted, 0, datetime!(2030-01-01 00:00 UTC));
        assert!(manual.indefinite);
        assert_eq!(manual.days_left, None);
    }
}
