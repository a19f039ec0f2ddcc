//! Scope, guard, statistics and promotion integration tests
//!
//! Drives the network service end to end against the in-memory store.

use std::sync::Arc;

use chrono::{Duration, Months, NaiveDate};

use alianca::auth::{Actor, JwtValidator, Role};
use alianca::db::{Gender, MemberDoc};
use alianca::network::input::{NewMember, PromoteRequest};
use alianca::network::stats::summarize;
use alianca::network::{
    HierarchyResolver, InMemoryMemberStore, MemberStore, NetworkService, PermissionGuard,
    StatsFilter,
};
use alianca::AliancaError;

fn service() -> (NetworkService, Arc<InMemoryMemberStore>) {
    let store = Arc::new(InMemoryMemberStore::new());
    let service = NetworkService::new(store.clone(), JwtValidator::new_dev(3600));
    (service, store)
}

async fn admin(store: &InMemoryMemberStore) -> Actor {
    let member = MemberDoc::new(
        "Administrador".into(),
        "adm@alianca.com".into(),
        "unused".into(),
        Role::Admin,
    );
    let member = store.insert_member(member).await.unwrap();
    Actor::new(member.id, Role::Admin)
}

fn new_member(name: &str, role: Role, supervisor: Option<&str>) -> NewMember {
    NewMember {
        name: name.into(),
        email: format!("{}@alianca.com", name.to_lowercase()),
        password: "password123".into(),
        gender: Some(Gender::Female),
        role: Some(role),
        supervisor_id: supervisor.map(str::to_string),
        ..Default::default()
    }
}

/// A creates B (Regional) and C (CellLeader under B)
async fn abc(service: &NetworkService, store: &InMemoryMemberStore) -> (Actor, Actor, Actor) {
    let a = admin(store).await;
    let b = service
        .create(&a, new_member("Bruna", Role::Pastor, None))
        .await
        .unwrap();
    let c = service
        .create(&a, new_member("Carlos", Role::Leader, Some(&b.id)))
        .await
        .unwrap();
    (a, Actor::new(b.id, Role::Pastor), Actor::new(c.id, Role::Leader))
}

#[tokio::test]
async fn test_abc_scopes() {
    let (service, store) = service();
    let (a, b, c) = abc(&service, &store).await;
    let resolver = service.resolver();

    let scope_a = resolver.resolve_scope(&a).await.unwrap();
    for id in [&a.id, &b.id, &c.id] {
        assert!(scope_a.contains(id));
    }

    let scope_b = resolver.resolve_scope(&b).await.unwrap();
    assert!(scope_b.contains(&b.id));
    assert!(scope_b.contains(&c.id));
    assert!(!scope_b.contains(&a.id));

    let scope_c = resolver.resolve_scope(&c).await.unwrap();
    assert_eq!(scope_c.len(), 1);
    assert!(scope_c.contains(&c.id));

    let err = PermissionGuard::authorize(&c, &scope_c, &b.id).unwrap_err();
    assert!(matches!(err, AliancaError::Forbidden(_)));
}

#[tokio::test]
async fn test_admin_scope_is_every_active_member() {
    let (service, store) = service();
    let (a, b, _) = abc(&service, &store).await;
    let loose = service
        .create(&b, new_member("Solta", Role::Disciple, None))
        .await
        .unwrap();
    let gone = service
        .create(&a, new_member("Saiu", Role::Disciple, None))
        .await
        .unwrap();
    service.deactivate(&a, &gone.id).await.unwrap();

    let scope = service.resolver().resolve_scope(&a).await.unwrap();
    let active: std::collections::HashSet<String> =
        store.active_member_ids().await.unwrap().into_iter().collect();

    assert_eq!(scope.ids(), &active);
    assert!(scope.contains(&loose.id));
    assert!(!scope.contains(&gone.id));
    for id in &active {
        assert!(PermissionGuard::authorize(&a, &scope, id).is_ok());
    }
}

#[tokio::test]
async fn test_scope_resolution_is_idempotent() {
    let (service, store) = service();
    let (_, b, c) = abc(&service, &store).await;
    service
        .create(&c, new_member("Daniel", Role::Disciple, None))
        .await
        .unwrap();

    let resolver = HierarchyResolver::new(store.clone());
    let first = resolver.resolve_scope(&b).await.unwrap();
    let second = resolver.resolve_scope(&b).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
}

#[tokio::test]
async fn test_deactivation_removes_member_from_scope_and_statistics() {
    let (service, store) = service();
    let (a, b, c) = abc(&service, &store).await;

    let before = service.dashboard(&b, StatsFilter::default()).await.unwrap();
    assert_eq!(before.totals.disciples, 2);
    assert_eq!(before.totals.direct_reports, 1);

    service.deactivate(&a, &c.id).await.unwrap();

    let scope_b = service.resolver().resolve_scope(&b).await.unwrap();
    assert!(!scope_b.contains(&c.id));

    let after = service.dashboard(&b, StatsFilter::default()).await.unwrap();
    assert_eq!(after.totals.disciples, 1);
    assert_eq!(after.totals.direct_reports, 0);

    let admin_stats = service.dashboard(&a, StatsFilter::default()).await.unwrap();
    assert_eq!(admin_stats.totals.disciples, 2);

    let record = store.raw_member(&c.id).await.unwrap();
    assert!(!record.is_active());
    assert_eq!(store.stored_count().await, 3);

    let err = service.get(&a, &c.id).await.unwrap_err();
    assert!(matches!(err, AliancaError::NotFound(_)));
}

#[tokio::test]
async fn test_leader_cannot_promote_to_regional() {
    let (service, store) = service();
    let (_, _, c) = abc(&service, &store).await;
    let d = service
        .create(&c, new_member("Debora", Role::Disciple, None))
        .await
        .unwrap();

    let err = service
        .promote(
            &c,
            &d.id,
            PromoteRequest {
                new_role: Role::Pastor,
                reason: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AliancaError::Forbidden(_)));
    assert!(store.promotion_history(&d.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_promotion_writes_exactly_one_record() {
    let (service, store) = service();
    let (a, _, c) = abc(&service, &store).await;
    let d = service
        .create(&c, new_member("Debora", Role::Disciple, None))
        .await
        .unwrap();

    let promoted = service
        .promote(
            &a,
            &d.id,
            PromoteRequest {
                new_role: Role::Leader,
                reason: Some("Leads the Tuesday cell".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(promoted.role, Role::Leader);

    let history = service.promotion_history(&a, &d.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].previous_role, Role::Disciple);
    assert_eq!(history[0].new_role, Role::Leader);
    assert_eq!(history[0].changed_by, a.id);
    assert_eq!(history[0].reason, "Leads the Tuesday cell");

    // The new role drives scoping right away
    let actor = service
        .authenticate(Some(&login_header(&service, &d.email).await))
        .await
        .unwrap();
    assert_eq!(actor.role, Role::Leader);
}

async fn login_header(service: &NetworkService, email: &str) -> String {
    let login = service
        .login(alianca::network::input::LoginRequest {
            email: email.into(),
            password: "password123".into(),
        })
        .await
        .unwrap();
    format!("Bearer {}", login.token)
}

#[test]
fn test_age_band_edges_relative_to_today() {
    let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
    let actor = Actor::new("p", Role::Pastor);

    let twelve = today.checked_sub_months(Months::new(12 * 12)).unwrap();
    let one_day_younger = twelve + Duration::days(1);
    let year_and_day_older = today.checked_sub_months(Months::new(13 * 12)).unwrap() - Duration::days(1);

    let born = |date: NaiveDate| {
        let mut m = MemberDoc::new("x".into(), "x@x.com".into(), "h".into(), Role::Disciple);
        m.birth_date = Some(date);
        m
    };

    let members = vec![born(twelve), born(one_day_younger), born(year_and_day_older)];
    let report = summarize(&actor, &members, &StatsFilter::default(), today);

    assert_eq!(report.demographics.age_bands.child, 2);
    assert_eq!(report.demographics.age_bands.teen, 1);
    assert_eq!(report.demographics.age_bands.sum(), report.totals.disciples);
}
