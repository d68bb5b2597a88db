//! Time-bounded cache of group rosters.
//!
//! Entries expire a fixed TTL after they were fetched, no matter how often
//! they are read; expiry is checked lazily on read. Concurrent lookups of the
//! same group share one fetch through a per-group lock.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::sync::Mutex;

use crate::{
    domain::{CanonicalId, ChatId, UserId},
    messaging::{port::MessagingPort, types::Participant},
    Result,
};

pub const GROUP_ROSTER_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Clone, Debug)]
pub struct GroupRoster {
    pub participants: Vec<Participant>,
    pub cached_at: Instant,
}

impl GroupRoster {
    fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.cached_at) < ttl
    }

    pub fn admins(&self) -> Vec<UserId> {
        self.participants
            .iter()
            .filter(|p| p.is_admin)
            .map(|p| p.id.clone())
            .collect()
    }
}

type Slot = Arc<Mutex<Option<GroupRoster>>>;

pub struct GroupDirectory {
    messenger: Arc<dyn MessagingPort>,
    ttl: Duration,
    slots: Mutex<HashMap<ChatId, Slot>>,
}

impl GroupDirectory {
    pub fn new(messenger: Arc<dyn MessagingPort>) -> Self {
        Self::with_ttl(messenger, GROUP_ROSTER_TTL)
    }

    pub fn with_ttl(messenger: Arc<dyn MessagingPort>, ttl: Duration) -> Self {
        Self {
            messenger,
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    async fn slot(&self, group: &ChatId) -> Slot {
        let mut map = self.slots.lock().await;
        map.entry(group.clone())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    pub async fn roster(&self, group: &ChatId) -> Result<GroupRoster> {
        self.roster_at(group, Instant::now()).await
    }

    /// Cached roster, refetched from the transport when absent or older than the TTL.
    pub async fn roster_at(&self, group: &ChatId, now: Instant) -> Result<GroupRoster> {
        let slot = self.slot(group).await;
        let mut entry = slot.lock().await;

        if let Some(cached) = entry.as_ref() {
            if cached.is_fresh(now, self.ttl) {
                return Ok(cached.clone());
            }
        }

        let participants = self.messenger.fetch_group_roster(group).await?;
        tracing::debug!(group = %group, members = participants.len(), "group roster fetched");
        let roster = GroupRoster {
            participants,
            cached_at: now,
        };
        *entry = Some(roster.clone());
        Ok(roster)
    }

    pub async fn admins(&self, group: &ChatId) -> Result<Vec<UserId>> {
        Ok(self.roster(group).await?.admins())
    }

    pub async fn admins_at(&self, group: &ChatId, now: Instant) -> Result<Vec<UserId>> {
        Ok(self.roster_at(group, now).await?.admins())
    }

    pub async fn is_admin(&self, group: &ChatId, user: &UserId) -> Result<bool> {
        let Ok(who) = CanonicalId::parse(&user.0) else {
            return Ok(false);
        };
        Ok(self.admins(group).await?.iter().any(|a| who.matches(a)))
    }

    pub async fn is_member(&self, group: &ChatId, user: &UserId) -> Result<bool> {
        let Ok(who) = CanonicalId::parse(&user.0) else {
            return Ok(false);
        };
        Ok(self
            .roster(group)
            .await?
            .participants
            .iter()
            .any(|p| who.matches(&p.id)))
    }

    /// Whether the bot itself holds admin rights, ignoring its session suffix.
    pub async fn is_bot_admin(&self, group: &ChatId) -> Result<bool> {
        self.is_admin(group, &self.messenger.self_id()).await
    }
}
