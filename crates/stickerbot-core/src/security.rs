use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use crate::{
    domain::{CanonicalId, UserId},
    errors::Error,
    Result,
};

// ============== Owner check ==============

/// Owner-only commands compare canonical identities, never raw strings.
pub fn is_owner(sender: &UserId, owner: Option<&CanonicalId>) -> bool {
    let Some(owner) = owner else {
        return false;
    };
    owner.matches(sender)
}

// ============== Rate Limiter (fixed window) ==============

#[derive(Clone, Copy, Debug)]
struct RateWindow {
    count: u32,
    reset_at: Instant,
}

/// Per-sender command quota.
///
/// Fixed-window counter: the window starts on the first command after the
/// previous one lapsed, and a sender may burst up to twice the quota across a
/// window boundary.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    enabled: bool,
    max: u32,
    window: Duration,
    windows: HashMap<UserId, RateWindow>,
}

impl RateLimiter {
    pub fn new(enabled: bool, max: u32, window: Duration) -> Self {
        Self {
            enabled,
            max,
            window,
            windows: HashMap::new(),
        }
    }

    pub fn check(&mut self, sender: &UserId) -> Result<()> {
        self.check_at(sender, Instant::now())
    }

    pub fn check_at(&mut self, sender: &UserId, now: Instant) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let window = self.window;
        let slot = self.windows.entry(sender.clone()).or_insert(RateWindow {
            count: 0,
            reset_at: now + window,
        });

        if now > slot.reset_at {
            slot.count = 0;
            slot.reset_at = now + window;
        }

        if slot.count >= self.max {
            return Err(Error::RateLimited {
                retry_after: slot.reset_at.saturating_duration_since(now),
            });
        }

        slot.count += 1;
        Ok(())
    }

    /// Commands still allowed in the sender's current window.
    pub fn remaining_at(&self, sender: &UserId, now: Instant) -> u32 {
        match self.windows.get(sender) {
            Some(w) if now <= w.reset_at => self.max.saturating_sub(w.count),
            _ => self.max,
        }
    }

    /// Drop windows that have lapsed; a sender's next command starts fresh anyway.
    pub fn prune_at(&mut self, now: Instant) {
        self.windows.retain(|_, w| now <= w.reset_at);
    }

    pub fn tracked_senders(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> UserId {
        UserId(id.to_string())
    }

    #[test]
    fn sixth_command_in_window_is_rejected() {
        let start = Instant::now();
        let mut rl = RateLimiter::new(true, 5, Duration::from_secs(60));
        let u = user("1");

        for i in 0..5 {
            assert!(rl.check_at(&u, start + Duration::from_secs(i)).is_ok());
        }
        let err = rl.check_at(&u, start + Duration::from_secs(10)).unwrap_err();
        match err {
            Error::RateLimited { retry_after } => assert_eq!(retry_after, Duration::from_secs(50)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejection_does_not_extend_or_reset_window() {
        let start = Instant::now();
        let mut rl = RateLimiter::new(true, 5, Duration::from_secs(60));
        let u = user("1");

        for _ in 0..5 {
            rl.check_at(&u, start).unwrap();
        }
        for s in [1, 20, 59, 60] {
            assert!(rl.check_at(&u, start + Duration::from_secs(s)).is_err());
        }
        assert_eq!(rl.remaining_at(&u, start + Duration::from_secs(60)), 0);

        // Strictly after the boundary the window resets.
        assert!(rl
            .check_at(&u, start + Duration::from_secs(60) + Duration::from_millis(1))
            .is_ok());
    }

    #[test]
    fn senders_are_limited_independently() {
        let start = Instant::now();
        let mut rl = RateLimiter::new(true, 1, Duration::from_secs(60));
        assert!(rl.check_at(&user("a"), start).is_ok());
        assert!(rl.check_at(&user("a"), start).is_err());
        assert!(rl.check_at(&user("b"), start).is_ok());
    }

    #[test]
    fn disabled_limiter_always_allows() {
        let start = Instant::now();
        let mut rl = RateLimiter::new(false, 1, Duration::from_secs(60));
        for _ in 0..10 {
            assert!(rl.check_at(&user("a"), start).is_ok());
        }
        assert_eq!(rl.tracked_senders(), 0);
    }

    #[test]
    fn prune_forgets_lapsed_windows() {
        let start = Instant::now();
        let mut rl = RateLimiter::new(true, 5, Duration::from_secs(60));
        rl.check_at(&user("a"), start).unwrap();
        rl.check_at(&user("b"), start + Duration::from_secs(30)).unwrap();

        rl.prune_at(start + Duration::from_secs(61));
        assert_eq!(rl.tracked_senders(), 1);
    }

    #[test]
    fn owner_check_normalizes_both_sides() {
        let owner = CanonicalId::parse("+55 11 99999-9999").unwrap();
        assert!(is_owner(&user("5511999999999:4@s.whatsapp.net"), Some(&owner)));
        assert!(!is_owner(&user("5511888888888@s.whatsapp.net"), Some(&owner)));
        assert!(!is_owner(&user("5511999999999"), None));
    }
}
