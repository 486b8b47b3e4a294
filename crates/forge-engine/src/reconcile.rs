//! Startup reconciliation: rebind every persisted dynamic command.

use tracing::{info, warn};

use forge_llm::TextGenerator;
use forge_store::RecordStore;

use crate::registrar::Registrar;
use crate::registry::CommandRegistry;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub guilds: usize,
    pub bound: usize,
    pub skipped: usize,
}

impl<S, R, G> Registrar<S, R, G>
where
    S: RecordStore,
    R: CommandRegistry,
    G: TextGenerator,
{
    /// Replay registration for every entry persisted under every guild in
    /// the root index. A failing entry is logged and skipped; it never
    /// aborts the rest of the guild or the run. Each guild with at least
    /// one rebound command gets one sync, and one global sync closes out
    /// the run.
    pub async fn reconcile_all(&self) -> ReconcileSummary {
        let guilds = self.repo().root_index().await.guilds();
        let mut summary = ReconcileSummary {
            guilds: guilds.len(),
            ..Default::default()
        };

        for guild in guilds {
            let record = self.repo().load_guild_record(guild).await;
            let mut bound_here = 0usize;
            for (name, entry) in &record.dynamic_commands {
                match self.rebind(guild, name, entry).await {
                    Ok(()) => {
                        bound_here += 1;
                        summary.bound += 1;
                    }
                    Err(fault) => {
                        warn!(%guild, %name, %fault, "skipping persisted command");
                        summary.skipped += 1;
                    }
                }
            }
            if bound_here > 0 {
                if let Err(reason) = self.registry().sync_guild(guild).await {
                    warn!(%guild, %reason, "guild command sync failed");
                }
            }
        }

        if let Err(reason) = self.registry().sync_global().await {
            warn!(%reason, "global command sync failed");
        }
        info!(
            guilds = summary.guilds,
            bound = summary.bound,
            skipped = summary.skipped,
            "reconciliation complete"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use forge_llm::{CodeGenerator, MockGenerator};
    use forge_store::{GuildRepository, MemoryRecordStore};
    use forge_types::{DynamicCommandEntry, GuildId, StorageConfig};

    use crate::mocks::MockRegistry;
    use crate::registrar::Registrar;

    type TestRegistrar = Registrar<MemoryRecordStore, MockRegistry, MockGenerator>;

    async fn seeded_registrar(
        store: &MemoryRecordStore,
        registry: &MockRegistry,
    ) -> TestRegistrar {
        let repo = Arc::new(GuildRepository::new(store.clone(), "root", "root-master"));
        Registrar::new(
            repo,
            registry.clone(),
            CodeGenerator::new(MockGenerator::new()),
        )
    }

    async fn persist_entry(store: &MemoryRecordStore, guild: GuildId, name: &str, code: &str) {
        let repo = GuildRepository::new(store.clone(), "root", "root-master");
        if repo.storage_config(guild).await.is_none() {
            let config = StorageConfig {
                record_key: format!("guild-{guild}"),
                master_key: "mk".to_string(),
            };
            assert!(repo.set_storage_config(guild, config).await);
        }
        let entry = DynamicCommandEntry {
            code: code.to_string(),
            description: format!("desc {name}"),
        };
        assert!(repo.upsert_dynamic_command(guild, name, entry).await);
    }

    const VALID: &str = "fn run(ctx) { ctx.reply(\"ok\"); }";
    const UNSAFE: &str = "fn run(ctx) { eval(\"1\"); }";

    #[tokio::test]
    async fn test_reconcile_binds_valid_and_skips_invalid() {
        let store = MemoryRecordStore::new();
        let guild = GuildId(1);
        persist_entry(&store, guild, "good", VALID).await;
        persist_entry(&store, guild, "bad", UNSAFE).await;

        let registry = MockRegistry::new();
        let registrar = seeded_registrar(&store, &registry).await;
        let summary = registrar.reconcile_all().await;

        assert_eq!(summary.guilds, 1);
        assert_eq!(summary.bound, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(registry.registered(guild), vec!["good".to_string()]);
        assert!(registrar.is_bound(guild, "good"));
        assert!(!registrar.is_bound(guild, "bad"));
        // Exactly one sync for the guild, one global sync for the run.
        assert_eq!(registry.guild_syncs(), vec![guild]);
        assert_eq!(registry.global_sync_count(), 1);
    }

    #[tokio::test]
    async fn test_reconcile_skips_illegal_persisted_names() {
        let store = MemoryRecordStore::new();
        let guild = GuildId(2);
        persist_entry(&store, guild, "Bad Name", VALID).await;

        let registry = MockRegistry::new();
        let registrar = seeded_registrar(&store, &registry).await;
        let summary = registrar.reconcile_all().await;

        assert_eq!(summary.bound, 0);
        assert_eq!(summary.skipped, 1);
        assert!(registry.guild_syncs().is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_covers_multiple_guilds_independently() {
        let store = MemoryRecordStore::new();
        persist_entry(&store, GuildId(1), "a", VALID).await;
        persist_entry(&store, GuildId(2), "b", UNSAFE).await;
        persist_entry(&store, GuildId(3), "c", VALID).await;

        let registry = MockRegistry::new();
        let registrar = seeded_registrar(&store, &registry).await;
        let summary = registrar.reconcile_all().await;

        assert_eq!(summary.guilds, 3);
        assert_eq!(summary.bound, 2);
        assert_eq!(summary.skipped, 1);
        let mut syncs = registry.guild_syncs();
        syncs.sort();
        assert_eq!(syncs, vec![GuildId(1), GuildId(3)]);
        assert_eq!(registry.global_sync_count(), 1);
    }

    #[tokio::test]
    async fn test_reconcile_empty_index_still_syncs_globally() {
        let store = MemoryRecordStore::new();
        let registry = MockRegistry::new();
        let registrar = seeded_registrar(&store, &registry).await;
        let summary = registrar.reconcile_all().await;
        assert_eq!(summary, Default::default());
        assert_eq!(registry.global_sync_count(), 1);
    }
}
