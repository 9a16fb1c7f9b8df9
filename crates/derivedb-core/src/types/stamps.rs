use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

///
/// Stamps
///
/// Embedded created/modified audit component. Entities carry this as a
/// plain field; the session populates it through the entity's lifecycle
/// hook at save/update time. The engine core never reads a clock itself.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Stamps {
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl Stamps {
    /// Record a lifecycle transition. Creation sets both stamps; every
    /// later touch moves only `modified_at`.
    pub fn touch(&mut self, now: DateTime<Utc>, created: bool) {
        if created {
            self.created_at = Some(now);
        }
        self.modified_at = Some(now);
    }

    /// Millisecond projections used by row codecs.
    #[must_use]
    pub fn created_millis(&self) -> Option<i64> {
        self.created_at.map(|ts| ts.timestamp_millis())
    }

    #[must_use]
    pub fn modified_millis(&self) -> Option<i64> {
        self.modified_at.map(|ts| ts.timestamp_millis())
    }

    /// Rebuild from millisecond projections, dropping unrepresentable values.
    #[must_use]
    pub fn from_millis(created: Option<i64>, modified: Option<i64>) -> Self {
        Self {
            created_at: created.and_then(DateTime::from_timestamp_millis),
            modified_at: modified.and_then(DateTime::from_timestamp_millis),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touch_sets_created_only_on_creation() {
        let mut stamps = Stamps::default();
        let t0 = Utc::now();
        stamps.touch(t0, true);
        assert_eq!(stamps.created_at, Some(t0));
        assert_eq!(stamps.modified_at, Some(t0));

        let t1 = t0 + chrono::Duration::seconds(5);
        stamps.touch(t1, false);
        assert_eq!(stamps.created_at, Some(t0));
        assert_eq!(stamps.modified_at, Some(t1));
    }

    #[test]
    fn millis_round_trip() {
        let mut stamps = Stamps::default();
        stamps.touch(Utc::now(), true);
        let back = Stamps::from_millis(stamps.created_millis(), stamps.modified_millis());
        assert_eq!(back.created_millis(), stamps.created_millis());
        assert_eq!(back.modified_millis(), stamps.modified_millis());
    }
}
