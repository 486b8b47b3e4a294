use super::*;

use forge_engine::MockRegistry;
use forge_llm::{CodeGenerator, MockGenerator};
use forge_store::MemoryRecordStore;

const PING: &str = "fn run(ctx) { ctx.reply(\"pong\"); }";

struct Fixture {
    store: MemoryRecordStore,
    registry: MockRegistry,
    generator: MockGenerator,
    admin: AdminService<MemoryRecordStore, MockRegistry, MockGenerator>,
}

fn fixture() -> Fixture {
    let store = MemoryRecordStore::new();
    let registry = MockRegistry::new();
    let generator = MockGenerator::new();
    let repo = Arc::new(GuildRepository::new(store.clone(), "root", "root-master"));
    let registrar = Arc::new(Registrar::new(
        repo,
        registry.clone(),
        CodeGenerator::new(generator.clone()),
    ));
    Fixture {
        store,
        registry,
        generator,
        admin: AdminService::new(registrar),
    }
}

async fn setup(fx: &Fixture, guild: GuildId) {
    fx.store.seed("bin-1", Default::default());
    fx.admin
        .setup_storage(Permission::Owner, guild, "bin-1", "mk")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_setup_requires_owner() {
    let fx = fixture();
    let err = fx
        .admin
        .setup_storage(Permission::Administrator, GuildId(1), "bin-1", "mk")
        .await
        .unwrap_err();
    assert!(matches!(err, AdminError::Denied(_)));
    assert!(err.user_message().contains("server owner"));
}

#[tokio::test]
async fn test_setup_rejects_bad_credentials() {
    let fx = fixture();
    // Nothing seeded under the key: the probe fails.
    let err = fx
        .admin
        .setup_storage(Permission::Owner, GuildId(1), "missing-bin", "mk")
        .await
        .unwrap_err();
    assert!(err.user_message().contains("credentials"));
}

#[tokio::test]
async fn test_setup_then_create_and_list() {
    let fx = fixture();
    let guild = GuildId(1);
    setup(&fx, guild).await;

    let message = fx
        .admin
        .create_command(
            Permission::Administrator,
            guild,
            "ping",
            PING,
            Some("replies pong".to_string()),
        )
        .await
        .unwrap();
    assert!(message.contains("/ping"));
    assert_eq!(fx.registry.registered(guild), vec!["ping".to_string()]);

    let listing = fx
        .admin
        .list_commands(Permission::Member, guild)
        .await
        .unwrap();
    assert!(listing.contains("/ping"));
    assert!(listing.contains("replies pong"));
}

#[tokio::test]
async fn test_create_requires_administrator() {
    let fx = fixture();
    let guild = GuildId(1);
    setup(&fx, guild).await;
    let err = fx
        .admin
        .create_command(Permission::Moderator, guild, "ping", PING, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AdminError::Denied(_)));
}

#[tokio::test]
async fn test_unconfigured_guild_gets_setup_instructions() {
    let fx = fixture();
    let err = fx
        .admin
        .list_commands(Permission::Member, GuildId(1))
        .await
        .unwrap_err();
    assert!(err.user_message().contains("setup_storage"));
}

#[tokio::test]
async fn test_generate_command_reports_durability_gap() {
    let fx = fixture();
    let guild = GuildId(1);
    setup(&fx, guild).await;
    fx.generator.push_reply(format!(
        "COMMAND_NAME: ping\nDESCRIPTION: replies pong\nCODE:\n```rhai\n{PING}\n```"
    ));
    fx.store.set_fail_puts(true);

    let message = fx
        .admin
        .generate_command(Permission::Administrator, guild, "a ping command")
        .await
        .unwrap();
    assert!(message.contains("/ping"));
    assert!(message.contains("not survive a restart"));
}

#[tokio::test]
async fn test_feature_setting_roundtrip() {
    let fx = fixture();
    let guild = GuildId(1);
    setup(&fx, guild).await;

    fx.admin
        .set_feature(
            Permission::Administrator,
            guild,
            FeatureSetting::JoinChannel(Some(42)),
        )
        .await
        .unwrap();
    fx.admin
        .set_feature(
            Permission::Administrator,
            guild,
            FeatureSetting::AiModeration(true),
        )
        .await
        .unwrap();

    let record = fx.admin.registrar().repo().load_guild_record(guild).await;
    assert_eq!(record.join_channel, Some(42));
    assert!(record.ai_moderation);

    fx.admin
        .set_feature(
            Permission::Administrator,
            guild,
            FeatureSetting::JoinChannel(None),
        )
        .await
        .unwrap();
    let record = fx.admin.registrar().repo().load_guild_record(guild).await;
    assert_eq!(record.join_channel, None);
}

#[tokio::test]
async fn test_delete_and_rename_render_messages() {
    let fx = fixture();
    let guild = GuildId(1);
    setup(&fx, guild).await;
    fx.admin
        .create_command(Permission::Administrator, guild, "ping", PING, None)
        .await
        .unwrap();

    let message = fx
        .admin
        .rename_command(Permission::Administrator, guild, "ping", "pong")
        .await
        .unwrap();
    assert!(message.contains("`ping`"));
    assert!(message.contains("`pong`"));

    let message = fx
        .admin
        .delete_command(Permission::Administrator, guild, "pong")
        .await
        .unwrap();
    assert!(message.contains("deleted"));
}

#[tokio::test]
async fn test_chat_is_open_to_members() {
    let fx = fixture();
    fx.generator.push_reply("42");
    let answer = fx
        .admin
        .chat(Permission::Member, "what is the answer?")
        .await
        .unwrap();
    assert_eq!(answer, "42");
}
