use std::collections::BTreeSet;
use std::sync::Arc;

use rolegate_core::AppError;
use rolegate_domain::{
    PermissionEventKind, PermissionId, PermissionReference, PermissionSubject, UserId,
};

use super::PermissionHolder;
use crate::test_support::{FakePermissionStore, RecordingListener};
use crate::{PermissionEventDispatcher, RoleHandle, UserHandle};

fn user(store: &Arc<FakePermissionStore>, id: u64) -> UserHandle {
    UserHandle::new(
        UserId::new(id),
        store.clone(),
        store.clone(),
        PermissionEventDispatcher::new(),
    )
}

fn ids(values: &[u64]) -> BTreeSet<PermissionId> {
    values.iter().copied().map(PermissionId::new).collect()
}

fn names(permissions: &[rolegate_domain::Permission]) -> Vec<String> {
    let mut names: Vec<String> = permissions
        .iter()
        .map(|permission| permission.name().to_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn attached_permissions_are_held() {
    let store = FakePermissionStore::with_permissions(&["edit", "publish", "delete"]).await;
    let mut alice = user(&store, 1);

    let attached = alice
        .attach_permission(PermissionReference::from("edit|publish"), true)
        .await;
    assert!(attached.is_ok());

    let held = alice
        .has_permissions(PermissionReference::from(vec!["edit", "publish"]))
        .await;
    assert!(held.is_ok());
    assert!(held.unwrap_or_default());

    let permissions = alice.get_permissions().await.unwrap_or_default();
    assert_eq!(names(&permissions), vec!["edit", "publish"]);
}

#[tokio::test]
async fn attaching_twice_is_idempotent() {
    let store = FakePermissionStore::with_permissions(&["edit", "publish"]).await;
    let mut alice = user(&store, 1);

    for _ in 0..2 {
        let attached = alice
            .attach_permission(PermissionReference::from(vec![1_u64, 2_u64]), true)
            .await;
        assert!(attached.is_ok());
    }

    assert_eq!(
        store
            .direct_ids(&PermissionSubject::user(UserId::new(1)))
            .await,
        ids(&[1, 2])
    );
}

#[tokio::test]
async fn attach_unknown_id_fails_without_writing() {
    let store = FakePermissionStore::with_permissions(&["edit"]).await;
    let listener = Arc::new(RecordingListener::default());
    let mut alice = UserHandle::new(
        UserId::new(1),
        store.clone(),
        store.clone(),
        PermissionEventDispatcher::new().with_listener(listener.clone()),
    );

    let attached = alice
        .attach_permission(PermissionReference::from(vec![1_u64, 5_u64]), true)
        .await;
    assert!(matches!(attached, Err(AppError::NotFound(_))));

    let single = alice
        .attach_permission(PermissionReference::from(5_u64), true)
        .await;
    assert!(matches!(single, Err(AppError::NotFound(_))));

    assert!(
        store
            .direct_ids(&PermissionSubject::user(UserId::new(1)))
            .await
            .is_empty()
    );
    assert!(listener.events.lock().await.is_empty());
}

#[tokio::test]
async fn detach_without_reference_keeps_role_permissions() {
    let store = FakePermissionStore::with_permissions(&["edit", "publish", "moderate"]).await;
    let moderator = store.add_role(1, "moderator", 2).await;
    let mut role = RoleHandle::new(
        moderator.clone(),
        store.clone(),
        PermissionEventDispatcher::new(),
    );
    assert!(
        role.attach_permission(PermissionReference::from("moderate"), true)
            .await
            .is_ok()
    );

    let mut alice = user(&store, 1);
    assert!(alice.attach_role(moderator.id()).await.unwrap_or_default());
    assert!(
        alice
            .attach_permission(PermissionReference::from("edit|publish"), true)
            .await
            .is_ok()
    );

    let detached = alice.detach_permission(None, true).await;
    assert!(detached.is_ok());

    let permissions = alice.get_permissions().await.unwrap_or_default();
    assert_eq!(names(&permissions), vec!["moderate"]);
}

#[tokio::test]
async fn detach_without_reference_and_roles_leaves_nothing() {
    let store = FakePermissionStore::with_permissions(&["edit", "publish"]).await;
    let mut alice = user(&store, 1);
    assert!(
        alice
            .attach_permission(PermissionReference::from(vec![1_u64, 2_u64]), true)
            .await
            .is_ok()
    );

    assert!(alice.detach_permission(None, true).await.is_ok());
    assert!(alice.get_permissions().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn detach_with_reference_removes_only_those_rows() {
    let store = FakePermissionStore::with_permissions(&["edit", "publish"]).await;
    let mut alice = user(&store, 1);
    assert!(
        alice
            .attach_permission(PermissionReference::from("edit|publish"), true)
            .await
            .is_ok()
    );

    assert!(
        alice
            .detach_permission(Some(PermissionReference::from("publish")), true)
            .await
            .is_ok()
    );

    let permissions = alice.get_permissions().await.unwrap_or_default();
    assert_eq!(names(&permissions), vec!["edit"]);
}

#[tokio::test]
async fn sync_with_detaching_replaces_direct_set() {
    let store = FakePermissionStore::with_permissions(&["edit", "publish", "delete"]).await;
    let mut alice = user(&store, 1);
    assert!(
        alice
            .attach_permission(PermissionReference::from("edit|publish"), true)
            .await
            .is_ok()
    );

    let changes = alice
        .sync_permissions(Some(PermissionReference::from("publish|delete")), true)
        .await;
    assert!(changes.is_ok());

    let changes = changes.unwrap_or_default();
    assert_eq!(changes.attached, vec![PermissionId::new(3)]);
    assert_eq!(changes.detached, vec![PermissionId::new(1)]);
    assert_eq!(
        store
            .direct_ids(&PermissionSubject::user(UserId::new(1)))
            .await,
        ids(&[2, 3])
    );
}

#[tokio::test]
async fn sync_without_detaching_only_adds() {
    let store = FakePermissionStore::with_permissions(&["edit", "publish", "delete"]).await;
    let mut alice = user(&store, 1);
    assert!(
        alice
            .attach_permission(PermissionReference::from("edit"), true)
            .await
            .is_ok()
    );

    let changes = alice
        .sync_permissions(Some(PermissionReference::from("delete")), false)
        .await;
    assert!(changes.is_ok());
    assert!(changes.unwrap_or_default().detached.is_empty());
    assert_eq!(
        store
            .direct_ids(&PermissionSubject::user(UserId::new(1)))
            .await,
        ids(&[1, 3])
    );
}

#[tokio::test]
async fn sync_to_none_clears_direct_set() {
    let store = FakePermissionStore::with_permissions(&["edit"]).await;
    let mut alice = user(&store, 1);
    assert!(
        alice
            .attach_permission(PermissionReference::from("edit"), true)
            .await
            .is_ok()
    );

    assert!(alice.sync_permissions(None, true).await.is_ok());
    assert!(alice.get_permissions().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn higher_access_level_inherits_lower_role_permissions() {
    let store = FakePermissionStore::with_permissions(&["comment", "ban"]).await;
    let member = store.add_role(1, "member", 1).await;
    let admin = store.add_role(2, "admin", 5).await;

    let mut member_role = RoleHandle::new(
        member.clone(),
        store.clone(),
        PermissionEventDispatcher::new(),
    );
    assert!(
        member_role
            .attach_permission(PermissionReference::from("comment"), true)
            .await
            .is_ok()
    );
    let mut admin_role = RoleHandle::new(
        admin.clone(),
        store.clone(),
        PermissionEventDispatcher::new(),
    );
    assert!(
        admin_role
            .attach_permission(PermissionReference::from("ban"), true)
            .await
            .is_ok()
    );

    let mut boss = user(&store, 10);
    assert!(boss.attach_role(admin.id()).await.is_ok());
    let mut rookie = user(&store, 11);
    assert!(rookie.attach_role(member.id()).await.is_ok());

    let boss_permissions = boss.get_permissions().await.unwrap_or_default();
    assert_eq!(names(&boss_permissions), vec!["ban", "comment"]);

    let rookie_permissions = rookie.get_permissions().await.unwrap_or_default();
    assert_eq!(names(&rookie_permissions), vec!["comment"]);

    // A role sees its own grants and those of lower levels.
    let admin_permissions = admin_role.get_permissions().await.unwrap_or_default();
    assert_eq!(names(&admin_permissions), vec!["ban", "comment"]);
    let member_permissions = member_role.get_permissions().await.unwrap_or_default();
    assert_eq!(names(&member_permissions), vec!["comment"]);
}

#[tokio::test]
async fn roleless_subject_gets_no_inherited_permissions() {
    let store = FakePermissionStore::with_permissions(&["comment"]).await;
    let member = store.add_role(1, "member", 0).await;
    let mut member_role = RoleHandle::new(member, store.clone(), PermissionEventDispatcher::new());
    assert!(
        member_role
            .attach_permission(PermissionReference::from("comment"), true)
            .await
            .is_ok()
    );

    let mut guest = user(&store, 1);
    assert!(guest.get_permissions().await.unwrap_or_default().is_empty());

    let mut plain = UserHandle::without_roles(
        UserId::new(2),
        store.clone(),
        PermissionEventDispatcher::new(),
    );
    assert!(plain.as_role_holder().is_none());
    assert!(plain.get_permissions().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn role_changes_need_a_role_store() {
    let store = FakePermissionStore::with_permissions(&["comment"]).await;
    let member = store.add_role(1, "member", 0).await;
    let mut plain = UserHandle::without_roles(
        UserId::new(1),
        store.clone(),
        PermissionEventDispatcher::new(),
    );

    let attached = plain.attach_role(member.id()).await;
    assert!(matches!(attached, Err(AppError::Validation(_))));
    let detached = plain.detach_role(member.id()).await;
    assert!(matches!(detached, Err(AppError::Validation(_))));

    let mut regular = user(&store, 1);
    assert!(regular.detach_role(member.id()).await.is_ok_and(|removed| removed == 0));
}

#[tokio::test]
async fn pipe_delimited_queries_distinguish_all_and_any() {
    let store = FakePermissionStore::with_permissions(&["edit", "publish"]).await;
    let mut alice = user(&store, 1);
    assert!(
        alice
            .attach_permission(PermissionReference::from("edit"), true)
            .await
            .is_ok()
    );

    let all = alice
        .has_permissions(PermissionReference::from("publish|edit"))
        .await;
    assert!(all.is_ok());
    assert!(!all.unwrap_or(true));

    let any = alice
        .has_any_permission(PermissionReference::from("publish|edit"))
        .await;
    assert!(any.is_ok());
    assert!(any.unwrap_or_default());
}

#[tokio::test]
async fn empty_queries_are_false() {
    let store = FakePermissionStore::with_permissions(&["edit"]).await;
    let mut alice = user(&store, 1);
    assert!(
        alice
            .attach_permission(PermissionReference::from("edit"), true)
            .await
            .is_ok()
    );

    let empty = PermissionReference::from(Vec::<String>::new());
    assert!(!alice.has_permissions(empty.clone()).await.unwrap_or(true));
    assert!(!alice.has_any_permission(empty).await.unwrap_or(true));
}

#[tokio::test]
async fn queries_naming_only_unknown_permissions_are_false() {
    let store = FakePermissionStore::with_permissions(&["edit"]).await;
    let mut alice = user(&store, 1);
    assert!(alice.attach_permission("edit".into(), true).await.is_ok());

    let unknown = PermissionReference::from("ghost|nothing");
    assert!(!alice.has_permissions(unknown.clone()).await.unwrap_or(true));
    assert!(!alice.has_any_permission(unknown).await.unwrap_or(true));
}

#[tokio::test]
async fn has_permission_compares_by_reference_shape() {
    let store = FakePermissionStore::with_permissions(&["edit", "publish"]).await;
    let edit = store.permission("edit").await;
    let publish = store.permission("publish").await;
    let mut alice = user(&store, 1);
    assert!(
        alice
            .attach_permission(PermissionReference::from(edit.clone()), true)
            .await
            .is_ok()
    );

    assert!(alice.has_permission(1_u64.into()).await.unwrap_or_default());
    assert!(alice.has_permission("1".into()).await.unwrap_or_default());
    assert!(alice.has_permission("edit".into()).await.unwrap_or_default());
    assert!(alice.has_permission(edit.into()).await.unwrap_or_default());
    assert!(!alice.has_permission(publish.into()).await.unwrap_or(true));
    assert!(!alice.has_permission("ghost".into()).await.unwrap_or(true));
}

#[tokio::test]
async fn require_permission_is_forbidden_without_grant() {
    let store = FakePermissionStore::with_permissions(&["edit"]).await;
    let mut alice = user(&store, 1);

    let denied = alice.require_permission("edit".into()).await;
    assert!(matches!(denied, Err(AppError::Forbidden(_))));

    assert!(alice.attach_permission("edit".into(), true).await.is_ok());
    assert!(alice.require_permission("edit".into()).await.is_ok());
}

#[tokio::test]
async fn repeated_reads_hit_the_cache() {
    let store = FakePermissionStore::with_permissions(&["edit"]).await;
    let mut alice = user(&store, 1);
    assert!(alice.attach_permission("edit".into(), true).await.is_ok());

    let reads_before = store.read_count();
    let first = alice.get_permissions().await.unwrap_or_default();
    let reads_after_first = store.read_count();
    let second = alice.get_permissions().await.unwrap_or_default();

    assert_eq!(first, second);
    assert!(reads_after_first > reads_before);
    assert_eq!(store.read_count(), reads_after_first);

    alice.flush_permissions();
    let _ = alice.get_permissions().await;
    assert!(store.read_count() > reads_after_first);
}

#[tokio::test]
async fn cold_resolve_lists_roles_once() {
    let store = FakePermissionStore::with_permissions(&["comment", "ban"]).await;
    let member = store.add_role(1, "member", 1).await;
    let admin = store.add_role(2, "admin", 5).await;
    let mut member_role = RoleHandle::new(member, store.clone(), PermissionEventDispatcher::new());
    assert!(member_role.attach_permission("comment".into(), true).await.is_ok());

    let mut boss = user(&store, 10);
    assert!(boss.attach_permission("ban".into(), true).await.is_ok());
    assert!(boss.attach_role(admin.id()).await.is_ok());

    // Direct grants, role memberships and role-derived grants.
    let reads_before = store.read_count();
    let permissions = boss.get_permissions().await.unwrap_or_default();
    assert_eq!(names(&permissions), vec!["ban", "comment"]);
    assert_eq!(store.read_count() - reads_before, 3);
}

#[tokio::test]
async fn mutations_invalidate_the_cache() {
    let store = FakePermissionStore::with_permissions(&["edit", "publish"]).await;
    let mut alice = user(&store, 1);
    assert!(alice.attach_permission("edit".into(), true).await.is_ok());
    assert!(!alice.has_permission("publish".into()).await.unwrap_or(true));

    assert!(alice.attach_permission("publish".into(), true).await.is_ok());
    assert!(alice.has_permission("publish".into()).await.unwrap_or_default());
}

#[tokio::test]
async fn separate_handles_do_not_share_invalidation() {
    let store = FakePermissionStore::with_permissions(&["edit"]).await;
    let mut reader = user(&store, 1);
    let mut writer = user(&store, 1);

    assert!(!reader.has_permission("edit".into()).await.unwrap_or(true));
    assert!(writer.attach_permission("edit".into(), true).await.is_ok());

    assert!(!reader.has_permission("edit".into()).await.unwrap_or(true));
    assert!(user(&store, 1).has_permission("edit".into()).await.unwrap_or_default());
}

#[tokio::test]
async fn mutations_emit_before_and_after_events() {
    let store = FakePermissionStore::with_permissions(&["edit", "publish"]).await;
    let listener = Arc::new(RecordingListener::default());
    let mut alice = UserHandle::new(
        UserId::new(1),
        store.clone(),
        store.clone(),
        PermissionEventDispatcher::new().with_listener(listener.clone()),
    );

    assert!(alice.attach_permission("edit|publish".into(), true).await.is_ok());
    assert!(alice.detach_permission(None, false).await.is_ok());
    assert!(alice.sync_permissions(Some("edit".into()), true).await.is_ok());

    let events = listener.events.lock().await;
    let kinds: Vec<PermissionEventKind> = events.iter().map(|event| event.kind).collect();
    assert_eq!(
        kinds,
        vec![
            PermissionEventKind::Attaching,
            PermissionEventKind::Attached,
            PermissionEventKind::Detaching,
            PermissionEventKind::Detached,
            PermissionEventKind::Syncing,
            PermissionEventKind::Synced,
        ]
    );
    assert_eq!(
        events[0].permission_ids,
        Some(vec![PermissionId::new(1), PermissionId::new(2)])
    );
    assert_eq!(events[2].permission_ids, None);
    assert_eq!(events[4].permission_ids, Some(vec![PermissionId::new(1)]));
}

#[tokio::test]
async fn touch_flag_is_forwarded_to_the_store() {
    let store = FakePermissionStore::with_permissions(&["edit"]).await;
    let mut alice = user(&store, 1);

    assert!(alice.attach_permission("edit".into(), false).await.is_ok());
    assert!(store.touches.lock().await.is_empty());

    assert!(alice.attach_permission("edit".into(), true).await.is_ok());
    assert_eq!(store.touches.lock().await.get(&("user", 1)), Some(&1));
}
