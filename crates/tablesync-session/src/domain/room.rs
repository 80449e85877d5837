//! Session room membership.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tablesync_core::id::{Identity, UserId};

/// Membership and activity of one session's room.
///
/// Membership is keyed by user, not connection: a user with several open
/// tabs is one member until their last connection leaves.
#[derive(Debug, Clone)]
pub struct SessionRoom {
    members: BTreeMap<UserId, Identity>,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    idle_since: Option<DateTime<Utc>>,
}

impl SessionRoom {
    /// An empty room. It counts as idle until the first join.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            members: BTreeMap::new(),
            created_at: now,
            last_activity: now,
            idle_since: Some(now),
        }
    }

    /// When the room was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Last accepted mutation or membership change.
    #[must_use]
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// Adds `identity`. Returns `true` if the user was not yet a member.
    pub fn join(&mut self, identity: &Identity, now: DateTime<Utc>) -> bool {
        self.touch(now);
        self.idle_since = None;
        self.members
            .insert(identity.user_id, identity.clone())
            .is_none()
    }

    /// Removes `user_id`, returning their identity if they were a member.
    /// The room starts its idle window when the last member leaves.
    pub fn leave(&mut self, user_id: UserId, now: DateTime<Utc>) -> Option<Identity> {
        let removed = self.members.remove(&user_id)?;
        self.touch(now);
        if self.members.is_empty() {
            self.idle_since = Some(now);
        }
        Some(removed)
    }

    /// Whether `user_id` is in the room.
    #[must_use]
    pub fn is_member(&self, user_id: UserId) -> bool {
        self.members.contains_key(&user_id)
    }

    /// Members in stable (user id) order.
    pub fn members(&self) -> impl Iterator<Item = &Identity> {
        self.members.values()
    }

    /// Member user ids.
    #[must_use]
    pub fn member_ids(&self) -> Vec<UserId> {
        self.members.keys().copied().collect()
    }

    /// Whether the room has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Records activity at `now`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_activity {
            self.last_activity = now;
        }
    }

    /// Whether the room has been empty for at least `threshold` as of `now`.
    #[must_use]
    pub fn is_idle_for(&self, threshold: Duration, now: DateTime<Utc>) -> bool {
        match self.idle_since {
            Some(since) if self.members.is_empty() => {
                (now - since).to_std().unwrap_or(Duration::ZERO) >= threshold
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
    }

    fn later(secs: i64) -> DateTime<Utc> {
        t0() + chrono::Duration::seconds(secs)
    }

    #[test]
    fn test_join_is_idempotent_per_user() {
        let mut room = SessionRoom::new(t0());
        let aria = Identity::new(UserId::new(), "Aria");
        assert!(room.join(&aria, t0()));
        assert!(!room.join(&aria, later(1)));
        assert_eq!(room.member_ids(), vec![aria.user_id]);
        assert_eq!(room.last_activity(), later(1));
    }

    #[test]
    fn test_leave_unknown_user_is_noop() {
        let mut room = SessionRoom::new(t0());
        assert!(room.leave(UserId::new(), later(5)).is_none());
        assert_eq!(room.last_activity(), t0());
    }

    #[test]
    fn test_idle_window_starts_when_last_member_leaves() {
        let mut room = SessionRoom::new(t0());
        let aria = Identity::new(UserId::new(), "Aria");
        room.join(&aria, t0());
        assert!(!room.is_idle_for(Duration::ZERO, later(1000)));

        room.leave(aria.user_id, later(10));
        assert!(room.is_empty());
        assert!(!room.is_idle_for(Duration::from_secs(300), later(309)));
        assert!(room.is_idle_for(Duration::from_secs(300), later(310)));
    }

    #[test]
    fn test_rejoin_cancels_idle_window() {
        let mut room = SessionRoom::new(t0());
        let aria = Identity::new(UserId::new(), "Aria");
        room.join(&aria, t0());
        room.leave(aria.user_id, later(10));
        room.join(&aria, later(20));
        assert!(!room.is_idle_for(Duration::ZERO, later(10_000)));
    }

    #[test]
    fn test_fresh_room_is_idle_until_joined() {
        let room = SessionRoom::new(t0());
        assert!(room.is_idle_for(Duration::from_secs(60), later(60)));
    }
}
