use chrono::{DateTime, Duration, Utc};

use crosspost_types::models::{ChannelBinding, Post, PostStatus, SetupToken};

use crate::{Result, StoreError};

/// Query surface shared by the linking, channel and ingestion components.
///
/// Every method is one atomic unit: it either commits fully before returning
/// `Ok` or leaves the store untouched. Nothing here retries.
pub trait Store: Send + Sync {
    // -- Setup tokens --

    fn save_token(&self, token: &str, owner_id: i64, issued_at: DateTime<Utc>) -> Result<()>;

    fn get_token(&self, token: &str) -> Result<Option<SetupToken>>;

    fn delete_token(&self, token: &str) -> Result<()>;

    /// Remove `token` and hand back what it held, as one step. Of any number
    /// of concurrent callers for the same token at most one gets `Some`.
    fn take_token(&self, token: &str) -> Result<Option<SetupToken>>;

    /// Delete every token whose age at `now` exceeds `ttl`. Returns how many went.
    fn cleanup_expired_tokens(&self, ttl: Duration, now: DateTime<Utc>) -> Result<usize>;

    // -- Account bindings --

    /// Replaces any binding holding the same Telegram id or the same owner.
    fn save_account_binding(
        &self,
        telegram_user_id: i64,
        owner_id: i64,
        now: DateTime<Utc>,
    ) -> Result<()>;

    fn get_owner_by_telegram_id(&self, telegram_user_id: i64) -> Result<Option<i64>>;

    fn get_telegram_id_by_owner(&self, owner_id: i64) -> Result<Option<i64>>;

    fn remove_account_binding(&self, owner_id: i64) -> Result<()>;

    /// Account binding plus every channel of the owner, in one transaction.
    fn remove_all_bindings(&self, owner_id: i64) -> Result<()>;

    // -- Channel bindings --

    fn save_channel_binding(
        &self,
        owner_id: i64,
        channel_id: i64,
        channel_title: &str,
        now: DateTime<Utc>,
    ) -> Result<()>;

    fn get_channel(&self, channel_id: i64) -> Result<Option<ChannelBinding>>;

    fn list_channels(&self, owner_id: i64) -> Result<Vec<ChannelBinding>>;

    fn remove_channel_binding(&self, owner_id: i64) -> Result<()>;

    fn has_channel(&self, owner_id: i64) -> Result<bool>;

    fn list_channel_ids(&self) -> Result<Vec<i64>>;

    // -- Posts --

    /// Returns `false` without writing when the message is already stored.
    fn save_post(
        &self,
        channel_id: i64,
        message_id: i64,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    fn posts_for_channel(&self, channel_id: i64) -> Result<Vec<Post>>;

    /// Oldest pending posts first.
    fn pending_posts(&self, limit: usize) -> Result<Vec<Post>>;

    fn set_post_status(&self, post_id: i64, status: PostStatus) -> Result<bool>;
}

pub(crate) fn validate_owner_id(owner_id: i64) -> Result<()> {
    if owner_id <= 0 {
        return Err(StoreError::InvalidOwner(owner_id));
    }
    Ok(())
}

/// Behaviour every `Store` implementation must share. Each backend's test
/// module calls these against a fresh instance.
#[cfg(test)]
pub(crate) mod conformance {
    use super::*;
    use chrono::TimeZone;
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    pub fn token_roundtrip(store: &dyn Store) {
        store.save_token("abc", 666, t0()).unwrap();

        let token = store.get_token("abc").unwrap().unwrap();
        assert_eq!(token.owner_id, 666);
        assert_eq!(token.issued_at, t0());

        store.delete_token("abc").unwrap();
        assert!(store.get_token("abc").unwrap().is_none());
        // deleting again is harmless
        store.delete_token("abc").unwrap();
    }

    pub fn take_token_consumes_once(store: &dyn Store) {
        store.save_token("abc", 666, t0()).unwrap();

        let taken = store.take_token("abc").unwrap().unwrap();
        assert_eq!(taken.owner_id, 666);
        assert_eq!(taken.issued_at, t0());
        assert!(store.get_token("abc").unwrap().is_none());
        assert!(store.take_token("abc").unwrap().is_none());
        assert!(store.take_token("never-issued").unwrap().is_none());
    }

    pub fn concurrent_takes_have_one_winner(store: Arc<dyn Store>) {
        const RACERS: usize = 8;
        store.save_token("contested", 666, t0()).unwrap();

        let barrier = Arc::new(Barrier::new(RACERS));
        let handles: Vec<_> = (0..RACERS)
            .map(|_| {
                let store = store.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    store.take_token("contested").unwrap().is_some()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    pub fn rejects_non_positive_owner(store: &dyn Store) {
        for bad in [0, -5] {
            assert!(matches!(
                store.save_token("t", bad, t0()),
                Err(StoreError::InvalidOwner(id)) if id == bad
            ));
            assert!(store.save_account_binding(1, bad, t0()).unwrap_err().is_validation());
            assert!(
                store
                    .save_channel_binding(bad, 100, "c", t0())
                    .unwrap_err()
                    .is_validation()
            );
        }
        assert!(store.get_token("t").unwrap().is_none());
        assert!(store.list_channel_ids().unwrap().is_empty());
    }

    pub fn cleanup_uses_strict_age(store: &dyn Store) {
        let ttl = Duration::seconds(600);
        let now = t0() + ttl;

        store.save_token("exactly", 1, t0()).unwrap();
        store
            .save_token("older", 1, t0() - Duration::milliseconds(1))
            .unwrap();
        store.save_token("fresh", 1, now).unwrap();

        assert_eq!(store.cleanup_expired_tokens(ttl, now).unwrap(), 1);
        assert!(store.get_token("older").unwrap().is_none());
        assert!(store.get_token("exactly").unwrap().is_some());
        assert!(store.get_token("fresh").unwrap().is_some());
    }

    pub fn account_binding_upserts(store: &dyn Store) {
        store.save_account_binding(42, 666, t0()).unwrap();
        assert_eq!(store.get_owner_by_telegram_id(42).unwrap(), Some(666));
        assert_eq!(store.get_telegram_id_by_owner(666).unwrap(), Some(42));

        // Same owner, new Telegram identity: the old one is dropped.
        store.save_account_binding(43, 666, t0()).unwrap();
        assert_eq!(store.get_telegram_id_by_owner(666).unwrap(), Some(43));
        assert_eq!(store.get_owner_by_telegram_id(42).unwrap(), None);

        // Same Telegram identity moved to another owner.
        store.save_account_binding(43, 777, t0()).unwrap();
        assert_eq!(store.get_owner_by_telegram_id(43).unwrap(), Some(777));
        assert_eq!(store.get_telegram_id_by_owner(666).unwrap(), None);

        store.remove_account_binding(777).unwrap();
        assert_eq!(store.get_owner_by_telegram_id(43).unwrap(), None);
        store.remove_account_binding(777).unwrap();
    }

    pub fn channel_binding_upserts(store: &dyn Store) {
        store.save_channel_binding(666, -100, "First", t0()).unwrap();
        store.save_channel_binding(777, -100, "Renamed", t0()).unwrap();

        let channel = store.get_channel(-100).unwrap().unwrap();
        assert_eq!(channel.owner_id, 777);
        assert_eq!(channel.channel_title, "Renamed");
        assert!(!store.has_channel(666).unwrap());
        assert!(store.has_channel(777).unwrap());
        assert_eq!(store.list_channel_ids().unwrap(), vec![-100]);
    }

    pub fn removing_channels_is_scoped_to_owner(store: &dyn Store) {
        store.save_channel_binding(666, 1, "a", t0()).unwrap();
        store.save_channel_binding(666, 2, "b", t0()).unwrap();
        store.save_channel_binding(777, 3, "c", t0()).unwrap();
        assert_eq!(store.list_channels(666).unwrap().len(), 2);

        store.remove_channel_binding(666).unwrap();
        assert!(!store.has_channel(666).unwrap());
        assert_eq!(store.list_channel_ids().unwrap(), vec![3]);
    }

    pub fn remove_all_clears_account_and_channels(store: &dyn Store) {
        store.save_account_binding(42, 666, t0()).unwrap();
        store.save_channel_binding(666, 100, "My Channel", t0()).unwrap();
        store.save_account_binding(50, 777, t0()).unwrap();

        store.remove_all_bindings(666).unwrap();
        assert_eq!(store.get_owner_by_telegram_id(42).unwrap(), None);
        assert!(!store.has_channel(666).unwrap());
        assert_eq!(store.get_owner_by_telegram_id(50).unwrap(), Some(777));

        store.remove_all_bindings(666).unwrap();
    }

    pub fn save_post_is_idempotent(store: &dyn Store) {
        assert!(store.save_post(100, 7, "hello", t0()).unwrap());
        assert!(!store.save_post(100, 7, "hello again", t0()).unwrap());
        assert!(store.save_post(101, 7, "other channel", t0()).unwrap());

        let posts = store.posts_for_channel(100).unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].content, "hello");
        assert_eq!(posts[0].status, PostStatus::Pending);
    }

    pub fn pending_queue_follows_status(store: &dyn Store) {
        store.save_post(100, 1, "one", t0()).unwrap();
        store.save_post(100, 2, "two", t0()).unwrap();
        store.save_post(100, 3, "three", t0()).unwrap();

        let pending = store.pending_posts(10).unwrap();
        let contents: Vec<_> = pending.iter().map(|p| p.content.as_str()).collect();
        assert_eq!(contents, ["one", "two", "three"]);

        assert!(store.set_post_status(pending[0].id, PostStatus::Published).unwrap());
        assert!(!store.set_post_status(9999, PostStatus::Failed).unwrap());

        let pending = store.pending_posts(1).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].content, "two");
    }
}
