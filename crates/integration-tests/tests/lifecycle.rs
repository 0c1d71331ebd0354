//! Team book provisioning, bootstrap scan, user creation and deletion.

#![allow(clippy::unwrap_used)]

use futures::future::join_all;

use team_contacts::TeamPolicy;
use team_contacts::TeamContactsError;
use team_contacts::identity::SessionContext;
use team_contacts::models::{BookPrincipal, NewSharedBook, SharedAddressBook};
use team_contacts::services::SyncOutcome;
use team_contacts::store::memory::NewContact;
use team_contacts::store::{MemoryContactStore, SchemaShape};
use team_contacts_core::{ContactId, TenantId, UserId, UserRole};
use team_contacts_integration_tests::{
    MemoryTeam, SHAPES, book_contacts, bootstrap, self_contact, session, team, team_over, user,
};

fn ids_of(team: &MemoryTeam, book: &SharedAddressBook) -> Vec<ContactId> {
    book_contacts(team, book).iter().map(|c| c.id).collect()
}

#[tokio::test]
async fn test_concurrent_locate_creates_one_book() {
    let users: Vec<_> = (1..=8).map(|id| user(id, 1, UserRole::NormalUser)).collect();

    for shape in SHAPES {
        // Without a backend constraint the per-tenant lock alone must hold.
        for store in [
            MemoryContactStore::new(shape),
            MemoryContactStore::new(shape).without_book_uniqueness(),
        ] {
            let team = team_over(store, TeamPolicy::default(), &users);
            let sessions: Vec<_> = users.iter().map(session).collect();

            let books = join_all(
                users
                    .iter()
                    .zip(&sessions)
                    .flat_map(|(u, s)| [team.locate(s, u.id), team.locate(s, u.id)]),
            )
            .await;

            let first = books[0].as_ref().unwrap().id;
            assert!(books.iter().all(|b| b.as_ref().unwrap().id == first));
            assert_eq!(team.store().books().len(), 1, "{shape:?}");
        }
    }
}

#[tokio::test]
async fn test_locate_prefers_earliest_duplicate_book() {
    let me = user(1, 1, UserRole::NormalUser);
    let store = MemoryContactStore::unified().without_book_uniqueness();
    let seed = NewSharedBook {
        principal: BookPrincipal::for_tenant(TenantId::new(1)),
        uri: "gab".to_string(),
        display_name: "Team".to_string(),
    };
    let earliest = store.insert_book(&seed);
    store.insert_book(&seed);
    let team = team_over(store, TeamPolicy::default(), std::slice::from_ref(&me));

    let book = team.locate(&session(&me), me.id).await.unwrap();
    assert_eq!(book.id, earliest.id);
}

#[tokio::test]
async fn test_locate_respects_tenant_visibility() {
    let me = user(1, 1, UserRole::NormalUser);
    let stranger = user(2, 2, UserRole::TenantAdmin);
    let root = user(3, 3, UserRole::SuperAdmin);
    let users = [me.clone(), stranger.clone(), root.clone()];
    let team = team(SchemaShape::Unified, TeamPolicy::default(), &users);

    let denied = team.locate(&session(&stranger), me.id).await;
    assert!(matches!(denied, Err(TeamContactsError::AccessDenied(_))));

    let book = team.locate(&session(&root), me.id).await.unwrap();
    assert_eq!(book.tenant_id, TenantId::new(1));

    let missing = team.locate(&session(&me), UserId::new(404)).await;
    assert!(matches!(missing, Err(TeamContactsError::NotFound(_))));
}

#[tokio::test]
async fn test_bootstrap_of_three_users_marks_self_and_read_only() {
    let users = [
        user(1, 1, UserRole::NormalUser),
        user(2, 1, UserRole::NormalUser),
        user(3, 1, UserRole::NormalUser),
    ];

    for shape in SHAPES {
        let team = team(shape, TeamPolicy::default(), &users);
        let book = bootstrap(&team, 1).await;

        let stored = book_contacts(&team, &book);
        assert_eq!(stored.len(), 3, "{shape:?}");
        for u in &users {
            assert_eq!(
                stored.iter().filter(|c| c.primary_email == u.public_id).count(),
                1
            );
        }

        for viewer in &users {
            let seen = team
                .on_get_contacts(&session(viewer), stored.clone())
                .await
                .unwrap();
            for contact in seen {
                let own = contact.primary_email == viewer.public_id;
                assert_eq!(contact.extended_info.is_self(), own, "{shape:?}");
                assert_eq!(contact.extended_info.read_only(), !own, "{shape:?}");
            }
        }

        // Re-running never duplicates.
        let again = team.on_server_bootstrap(&SessionContext::system()).await;
        assert_eq!(again.created, 0);
        assert_eq!(again.already_present, 3);
        assert_eq!(book_contacts(&team, &book).len(), 3);
    }
}

#[tokio::test]
async fn test_bootstrap_scope_follows_role() {
    let member = user(1, 1, UserRole::NormalUser);
    let admin = user(2, 1, UserRole::TenantAdmin);
    let colleague = user(3, 1, UserRole::NormalUser);
    let foreign = user(4, 2, UserRole::NormalUser);
    let users = [member.clone(), admin.clone(), colleague.clone(), foreign.clone()];
    let team = team(SchemaShape::Split, TeamPolicy::default(), &users);

    let report = team.on_server_bootstrap(&session(&member)).await;
    assert_eq!((report.scanned, report.created), (1, 1));

    let report = team.on_server_bootstrap(&session(&admin)).await;
    assert_eq!((report.scanned, report.created, report.already_present), (3, 2, 1));
    assert!(team.existing_book(TenantId::new(2)).await.unwrap().is_none());

    let root = user(5, 2, UserRole::SuperAdmin);
    team.identity().insert(root.clone());
    let report = team.on_server_bootstrap(&session(&root)).await;
    assert_eq!((report.scanned, report.created), (5, 2));
}

#[tokio::test]
async fn test_bootstrap_prunes_duplicate_self_contacts() {
    let me = user(1, 1, UserRole::NormalUser);
    let team = team(SchemaShape::Unified, TeamPolicy::default(), std::slice::from_ref(&me));
    let book = bootstrap(&team, 1).await;
    let original = self_contact(&team, &book, &me);

    // A racing creator without a transactional check.
    team.store().insert_contact(NewContact {
        owner_user_id: Some(me.id),
        tenant_id: me.tenant_id,
        address_book_id: book.id,
        primary_email: me.public_id.clone(),
        display_name: String::new(),
    });
    assert_eq!(book_contacts(&team, &book).len(), 2);

    let report = team.on_server_bootstrap(&SessionContext::system()).await;
    assert_eq!(report.duplicates_pruned, 1);
    assert_eq!(ids_of(&team, &book), vec![original.id]);
}

#[tokio::test]
async fn test_user_created_hook_restores_the_callers_principal() {
    let creator = user(1, 1, UserRole::TenantAdmin);
    let newcomer = user(2, 1, UserRole::NormalUser);
    let users = [creator.clone(), newcomer.clone()];
    let team = team(SchemaShape::Unified, TeamPolicy::default(), &users);
    let ctx = session(&creator);

    let outcome = team.on_user_created(&ctx, newcomer.id, &newcomer.public_id).await;
    assert!(matches!(outcome, Some(SyncOutcome::Created(ref c)) if c.primary_email == newcomer.public_id));
    assert_eq!(ctx.principal().user(), Some(&creator));

    let outcome = team.on_user_created(&ctx, newcomer.id, &newcomer.public_id).await;
    assert_eq!(outcome, Some(SyncOutcome::AlreadyPresent { pruned: 0 }));
}

#[tokio::test]
async fn test_overlapping_user_created_hooks_never_leave_the_session_elevated() {
    let creator = user(1, 1, UserRole::TenantAdmin);
    let local = user(2, 1, UserRole::NormalUser);
    let remote = user(3, 2, UserRole::NormalUser);
    let users = [creator.clone(), local.clone(), remote.clone()];

    for shape in SHAPES {
        let team = team(shape, TeamPolicy::default(), &users);
        let ctx = session(&creator);
        team.locate(&ctx, creator.id).await.unwrap();

        // Tenant 2 still needs its book, so the second hook finishes last.
        let (quick, slow) = tokio::join!(
            team.on_user_created(&ctx, local.id, &local.public_id),
            team.on_user_created(&ctx, remote.id, &remote.public_id),
        );
        assert!(matches!(quick, Some(SyncOutcome::Created(_))), "{shape:?}");
        assert!(matches!(slow, Some(SyncOutcome::Created(_))), "{shape:?}");
        assert_eq!(ctx.principal().user(), Some(&creator), "{shape:?}");

        // The caller's own rights still apply afterwards.
        let err = team.locate(&ctx, remote.id).await.unwrap_err();
        assert!(matches!(err, TeamContactsError::AccessDenied(_)), "{shape:?}");
    }
}

#[tokio::test]
async fn test_user_created_hook_is_best_effort() {
    let creator = user(1, 1, UserRole::TenantAdmin);
    let newcomer = user(2, 1, UserRole::NormalUser);
    let users = [creator.clone(), newcomer.clone()];
    let team = team(SchemaShape::Split, TeamPolicy::default(), &users);
    team.store().set_unavailable(true);
    let ctx = session(&creator);

    assert_eq!(team.on_user_created(&ctx, newcomer.id, &newcomer.public_id).await, None);
    assert_eq!(ctx.principal().user(), Some(&creator));

    // The next scan heals the gap.
    team.store().set_unavailable(false);
    let report = team.on_server_bootstrap(&SessionContext::system()).await;
    assert_eq!(report.created, 2);
}

#[tokio::test]
async fn test_deletion_matches_on_the_snapshot() {
    let users = [
        user(1, 1, UserRole::NormalUser),
        user(2, 1, UserRole::NormalUser),
        user(3, 1, UserRole::TenantAdmin),
    ];

    for shape in SHAPES {
        let team = team(shape, TeamPolicy::default(), &users);
        let book = bootstrap(&team, 1).await;
        let admin = session(&users[2]);
        let doomed = &users[0];

        let snapshot = team.before_user_deleted(&admin, doomed.id).await;
        assert!(snapshot.is_some());

        // The host deletes the user; the identity is gone from here on.
        team.identity().remove(doomed.id);

        assert_eq!(team.after_user_deleted(snapshot).await, 1, "{shape:?}");
        let remaining = book_contacts(&team, &book);
        assert!(remaining.iter().all(|c| c.primary_email != doomed.public_id));
        assert_eq!(remaining.len(), 2);
    }
}

#[tokio::test]
async fn test_deletion_without_snapshot_is_a_no_op() {
    let users = [user(1, 1, UserRole::NormalUser), user(2, 2, UserRole::TenantAdmin)];
    let team = team(SchemaShape::Unified, TeamPolicy::default(), &users);
    let book = bootstrap(&team, 1).await;

    // Another tenant's admin cannot see the user, so no snapshot is taken.
    let snapshot = team.before_user_deleted(&session(&users[1]), users[0].id).await;
    assert!(snapshot.is_none());
    assert_eq!(team.after_user_deleted(snapshot).await, 0);
    assert_eq!(book_contacts(&team, &book).len(), 1);
}

#[tokio::test]
async fn test_every_mutation_bumps_the_change_token() {
    let me = user(1, 1, UserRole::NormalUser);
    let team = team(SchemaShape::Split, TeamPolicy::default(), std::slice::from_ref(&me));
    let token = |team: &MemoryTeam| {
        team.store().books().first().map(|b| b.change_token).unwrap()
    };

    let book = bootstrap(&team, 1).await;
    let after_create = token(&team);
    assert!(after_create > 1);

    let mut contact = self_contact(&team, &book, &me);
    contact.display_name = "Me".to_string();
    team.update_contact(&session(&me), contact.clone()).await.unwrap();
    let after_update = token(&team);
    assert!(after_update > after_create);

    team.delete_contact(&session(&me), contact.id).await.unwrap();
    assert!(token(&team) > after_update);
}
