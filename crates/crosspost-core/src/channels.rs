use std::sync::Arc;

use tracing::{info, warn};

use crosspost_db::Store;
use crosspost_types::models::ChannelBinding;

use crate::{Clock, Error, Result};

/// Owner ↔ channel associations.
///
/// Callers must already have confirmed that both the acting Telegram user and
/// the bot administer the channel; nothing here talks to Telegram.
#[derive(Clone)]
pub struct ChannelRegistry {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl ChannelRegistry {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Bind `channel_id` to whichever owner `telegram_user_id` is linked to.
    /// Returns that owner.
    pub fn link_channel(
        &self,
        telegram_user_id: i64,
        channel_id: i64,
        channel_title: &str,
    ) -> Result<i64> {
        let Some(owner_id) = self.store.get_owner_by_telegram_id(telegram_user_id)? else {
            warn!(telegram_user_id, channel_id, "channel link from unlinked telegram user");
            return Err(Error::UnknownUser);
        };

        self.store
            .save_channel_binding(owner_id, channel_id, channel_title, self.clock.now())?;
        info!(owner_id, channel_id, channel_title, "channel linked");
        Ok(owner_id)
    }

    /// The owner a Telegram user is linked to, if any.
    pub fn owner_of(&self, telegram_user_id: i64) -> Result<Option<i64>> {
        Ok(self.store.get_owner_by_telegram_id(telegram_user_id)?)
    }

    pub fn has_channel_for_owner(&self, owner_id: i64) -> Result<bool> {
        Ok(self.store.has_channel(owner_id)?)
    }

    pub fn channels_for_owner(&self, owner_id: i64) -> Result<Vec<ChannelBinding>> {
        Ok(self.store.list_channels(owner_id)?)
    }

    pub fn disconnect_channel(&self, owner_id: i64) -> Result<()> {
        self.store.remove_channel_binding(owner_id)?;
        Ok(())
    }

    pub fn disconnect_all_for_owner(&self, owner_id: i64) -> Result<()> {
        self.store.remove_all_bindings(owner_id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SystemClock;
    use chrono::Utc;
    use crosspost_db::memory::MemoryStore;

    fn setup() -> (ChannelRegistry, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store.save_account_binding(42, 666, Utc::now()).unwrap();
        (
            ChannelRegistry::new(store.clone(), Arc::new(SystemClock)),
            store,
        )
    }

    #[test]
    fn link_channel_resolves_owner() {
        let (registry, store) = setup();

        assert_eq!(registry.link_channel(42, -100123, "My Channel").unwrap(), 666);
        assert!(registry.has_channel_for_owner(666).unwrap());

        let channel = store.get_channel(-100123).unwrap().unwrap();
        assert_eq!(channel.owner_id, 666);
        assert_eq!(channel.channel_title, "My Channel");
    }

    #[test]
    fn link_channel_requires_linked_account() {
        let (registry, store) = setup();

        assert!(matches!(
            registry.link_channel(7, 100, "Nope"),
            Err(Error::UnknownUser)
        ));
        assert!(store.list_channel_ids().unwrap().is_empty());
    }

    #[test]
    fn relinking_updates_title() {
        let (registry, _) = setup();
        registry.link_channel(42, 100, "Old").unwrap();
        registry.link_channel(42, 100, "New").unwrap();

        let channels = registry.channels_for_owner(666).unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].channel_title, "New");
    }

    #[test]
    fn disconnect_channel_keeps_account() {
        let (registry, store) = setup();
        registry.link_channel(42, 100, "c").unwrap();

        registry.disconnect_channel(666).unwrap();
        registry.disconnect_channel(666).unwrap();

        assert!(!registry.has_channel_for_owner(666).unwrap());
        assert_eq!(store.get_owner_by_telegram_id(42).unwrap(), Some(666));
    }

    #[test]
    fn disconnect_all_drops_account_too() {
        let (registry, store) = setup();
        registry.link_channel(42, 100, "c").unwrap();

        registry.disconnect_all_for_owner(666).unwrap();

        assert!(!registry.has_channel_for_owner(666).unwrap());
        assert_eq!(store.get_owner_by_telegram_id(42).unwrap(), None);
    }
}
