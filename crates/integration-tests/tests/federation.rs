//! Federated listing across personal and team contacts.

#![allow(clippy::unwrap_used)]

use std::collections::HashSet;

use team_contacts::TeamPolicy;
use team_contacts::models::ContactRecord;
use team_contacts::query::{ContactQuery, Predicate, SortField, SortOrder};
use team_contacts::services::ContactGroup;
use team_contacts::store::SchemaShape;
use team_contacts::store::memory::NewContact;
use team_contacts_core::{ContactId, ContactScope, TenantId, UserRole};
use team_contacts_integration_tests::{
    MemoryTeam, SHAPES, add_personal, book_contacts, bootstrap, email, personal_query,
    self_contact, session, team, user,
};

/// Tenant 1 with three members, tenant 2 with one; user 1 has personal contacts.
async fn populated(shape: SchemaShape) -> MemoryTeam {
    let users = [
        user(1, 1, UserRole::NormalUser),
        user(2, 1, UserRole::NormalUser),
        user(3, 1, UserRole::TenantAdmin),
        user(4, 2, UserRole::NormalUser),
    ];
    let team = team(shape, TeamPolicy::default(), &users);
    bootstrap(&team, 1).await;

    add_personal(&team, &users[0], "dentist@example.org", "Dentist");
    add_personal(&team, &users[0], "plumber@example.org", "Plumber");
    add_personal(&team, &users[0], "aunt@example.org", "Aunt");
    add_personal(&team, &users[0], "bank@example.org", "Bank");
    // Someone else's personal contact must stay out of user 1's lists.
    add_personal(&team, &users[1], "private@example.org", "Private");
    team
}

fn ids(contacts: &[ContactRecord]) -> Vec<ContactId> {
    contacts.iter().map(|c| c.id).collect()
}

#[tokio::test]
async fn test_team_scope_returns_union_without_duplicates() {
    for shape in SHAPES {
        let team = populated(shape).await;
        let me = user(1, 1, UserRole::NormalUser);
        let book = team.existing_book(TenantId::new(1)).await.unwrap().unwrap();

        let page = team
            .list_contacts(&session(&me), personal_query(&me), ContactScope::Team)
            .await
            .unwrap();

        let unique: HashSet<_> = page.contacts.iter().map(|c| c.id).collect();
        assert_eq!(unique.len(), page.contacts.len(), "{shape:?}: duplicate rows");
        assert_eq!(page.total, 7, "{shape:?}");
        assert_eq!(
            page.contacts.iter().filter(|c| book.contains(c)).count(),
            3,
            "{shape:?}: every tenant 1 team contact"
        );
        assert!(page.contacts.iter().all(|c| c.tenant_id == TenantId::new(1)));
        assert!(
            page.contacts
                .iter()
                .all(|c| c.primary_email.as_str() != "private@example.org")
        );
    }
}

#[tokio::test]
async fn test_paging_is_stable_and_total_consistent() {
    for shape in SHAPES {
        let team = populated(shape).await;
        let me = user(1, 1, UserRole::NormalUser);
        let ctx = session(&me);
        let base = personal_query(&me).sorted_by(SortField::Name, SortOrder::Asc);

        let personal_only = team
            .list_contacts(&ctx, base.clone(), ContactScope::Personal)
            .await
            .unwrap();
        let team_only = team
            .list_contacts(&ctx, ContactQuery::new(Predicate::False), ContactScope::Team)
            .await
            .unwrap();
        let everything = team
            .list_contacts(&ctx, base.clone(), ContactScope::All)
            .await
            .unwrap();
        assert_eq!(everything.total, personal_only.total + team_only.total, "{shape:?}");

        let mut paged = Vec::new();
        let mut offset = 0;
        loop {
            let page = team
                .list_contacts(&ctx, base.clone().page(offset, 2), ContactScope::All)
                .await
                .unwrap();
            assert_eq!(page.total, everything.total, "{shape:?}: total changes per page");
            if page.contacts.is_empty() {
                break;
            }
            paged.extend(page.contacts);
            offset += 2;
        }
        assert_eq!(ids(&paged), ids(&everything.contacts), "{shape:?}");
    }
}

#[tokio::test]
async fn test_personal_scope_is_untouched() {
    let team = populated(SchemaShape::Unified).await;
    let me = user(1, 1, UserRole::NormalUser);

    let augmented = team
        .on_list_contacts(&session(&me), ContactScope::Personal, personal_query(&me))
        .await
        .unwrap();
    assert_eq!(augmented, personal_query(&me));
}

#[tokio::test]
async fn test_empty_id_filter_yields_no_team_rows() {
    for shape in SHAPES {
        let team = populated(shape).await;
        let me = user(1, 1, UserRole::NormalUser);
        let mut base = personal_query(&me).with_ids(Vec::new());
        base.predicate = base.predicate.and(Predicate::ids(&[]));

        let page = team
            .list_contacts(&session(&me), base, ContactScope::All)
            .await
            .unwrap();
        assert_eq!(page.total, 0, "{shape:?}");
        assert!(page.contacts.is_empty());
    }
}

#[tokio::test]
async fn test_id_filter_selects_only_named_team_rows() {
    for shape in SHAPES {
        let team = populated(shape).await;
        let me = user(1, 1, UserRole::NormalUser);
        let colleague = user(2, 1, UserRole::NormalUser);
        let book = team.existing_book(TenantId::new(1)).await.unwrap().unwrap();
        let wanted = self_contact(&team, &book, &colleague).id;

        let mut base = personal_query(&me).with_ids(vec![wanted]);
        base.predicate = base.predicate.and(Predicate::ids(&[wanted]));

        let page = team
            .list_contacts(&session(&me), base, ContactScope::Team)
            .await
            .unwrap();
        assert_eq!(ids(&page.contacts), vec![wanted], "{shape:?}");
        assert!(page.contacts[0].extended_info.read_only());
    }
}

#[tokio::test]
async fn test_split_rows_carry_the_linked_platform_user() {
    let team = populated(SchemaShape::Split).await;
    let me = user(1, 1, UserRole::NormalUser);
    let book = team.existing_book(TenantId::new(1)).await.unwrap().unwrap();

    // Stored card rows have no platform owner.
    assert!(book_contacts(&team, &book).iter().all(|c| c.owner_user_id.is_none()));

    let page = team
        .list_contacts(&session(&me), personal_query(&me), ContactScope::Team)
        .await
        .unwrap();
    for contact in page.contacts.iter().filter(|c| book.contains(c)) {
        assert!(contact.owner_user_id.is_some());
        assert_eq!(contact.owner_user_id, contact.linked_user_id);
    }
    let own = page.contacts.iter().find(|c| c.extended_info.is_self()).unwrap();
    assert_eq!(own.owner_user_id, Some(me.id));
}

#[tokio::test]
async fn test_listing_never_provisions_a_book() {
    let me = user(1, 5, UserRole::NormalUser);
    let team = team(SchemaShape::Unified, TeamPolicy::default(), std::slice::from_ref(&me));

    let page = team
        .list_contacts(&session(&me), personal_query(&me), ContactScope::All)
        .await
        .unwrap();
    assert_eq!(page.total, 0);
    assert!(team.store().books().is_empty());
}

#[tokio::test]
async fn test_suggestions_search_team_contacts_only() {
    for shape in SHAPES {
        let team = populated(shape).await;
        let me = user(1, 1, UserRole::NormalUser);

        let hits = team
            .contact_suggestions(&session(&me), "user2@", ContactScope::All, 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1, "{shape:?}");
        assert_eq!(hits[0].primary_email.as_str(), "user2@tenant1.example.com");

        let none = team
            .contact_suggestions(&session(&me), "dentist", ContactScope::All, 10)
            .await
            .unwrap();
        assert!(none.is_empty(), "{shape:?}: personal rows leaked into suggestions");

        let personal = team
            .contact_suggestions(&session(&me), "user2@", ContactScope::Personal, 10)
            .await
            .unwrap();
        assert!(personal.is_empty());

        let limited = team
            .contact_suggestions(&session(&me), "", ContactScope::Team, 2)
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
    }
}

#[tokio::test]
async fn test_group_emails() {
    let team = populated(SchemaShape::Unified).await;
    let me = user(1, 1, UserRole::NormalUser);
    let colleague = user(2, 1, UserRole::NormalUser);
    let book = team.existing_book(TenantId::new(1)).await.unwrap().unwrap();

    let mut named = self_contact(&team, &book, &colleague);
    named.display_name = "Bea Colleague".to_string();
    team.update_contact(&session(&colleague), named).await.unwrap();

    let all = team.group_contact_emails(&session(&me), &ContactGroup::All).await.unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.contains(&"\"Bea Colleague\"<user2@tenant1.example.com>".to_string()));
    assert!(all.contains(&"user1@tenant1.example.com".to_string()));

    let outsider = user(4, 2, UserRole::NormalUser);
    let members = team
        .group_contact_emails(
            &session(&me),
            &ContactGroup::Members(vec![colleague.id, outsider.id]),
        )
        .await
        .unwrap();
    assert_eq!(members, vec!["\"Bea Colleague\"<user2@tenant1.example.com>".to_string()]);
}

#[tokio::test]
async fn test_storage_resolution_and_book_listing() {
    let team = populated(SchemaShape::Split).await;
    let me = user(1, 1, UserRole::NormalUser);
    let book = team.existing_book(TenantId::new(1)).await.unwrap().unwrap();

    assert_eq!(team.resolve_storage(&session(&me), "team").await.unwrap(), Some(book.id));
    assert_eq!(team.resolve_storage(&session(&me), "team-3").await.unwrap(), Some(book.id));
    assert_eq!(team.resolve_storage(&session(&me), "personal").await.unwrap(), None);
    assert_eq!(team.storage_map().get("team").map(String::as_str), Some("gab"));

    let listings = team.on_get_address_books(&session(&me)).await.unwrap();
    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0].entity_id, book.id);
    let json = serde_json::to_value(&listings[0]).unwrap();
    assert_eq!(json["Id"], "team");
}

#[tokio::test]
async fn test_unified_branch_ignores_foreign_rows_in_the_book() {
    let team = populated(SchemaShape::Unified).await;
    let me = user(1, 1, UserRole::NormalUser);
    let book = team.existing_book(TenantId::new(1)).await.unwrap().unwrap();

    // A row carrying the team book id but another tenant.
    team.store().insert_contact(NewContact {
        owner_user_id: None,
        tenant_id: TenantId::new(2),
        address_book_id: book.id,
        primary_email: email("stray@tenant2.example.com"),
        display_name: "Stray".to_string(),
    });

    let page = team
        .list_contacts(&session(&me), personal_query(&me), ContactScope::Team)
        .await
        .unwrap();
    assert_eq!(page.total, 7);
    assert!(page.contacts.iter().all(|c| c.tenant_id == TenantId::new(1)));
}
