//! Audit log listing and export tests
//!
//! Exercise the audit service directly against a seeded database.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use crate::common::{
    minutes_after_base, seed_audit, seed_raw_audit, seed_tenant, seed_user, MockError,
    MockTenantResolver, TestApp,
};
use cityplan_audit::{
    models::{AuditLogFilter, AuditSortField, Caller, SortDirection},
    services::{AuditService, AuditServiceError},
};

fn users_filter(page: u32, limit: u32) -> AuditLogFilter {
    AuditLogFilter {
        entity_type: Some("users".to_string()),
        page,
        limit,
        ..AuditLogFilter::default()
    }
}

/// Three `users` entries at base+1, base+2, base+3 minutes
async fn seed_three_user_entries(app: &TestApp, tenant: Uuid, actor: Uuid) -> Vec<Uuid> {
    let mut ids = Vec::new();
    for minute in 1..=3 {
        let entry = seed_audit(
            app.pool(),
            tenant,
            Some(actor),
            "update",
            "users",
            &format!("user-{}", minute),
            None,
            minutes_after_base(minute),
        )
        .await;
        ids.push(entry.id);
    }
    ids
}

#[tokio::test]
async fn test_pages_newest_first_with_totals() {
    let app = TestApp::new().await;
    let tenant = seed_tenant(app.pool(), "Springfield").await;
    let ids = seed_three_user_entries(&app, tenant.id, tenant.admin_id).await;
    let caller = Caller::new(tenant.admin_id);

    let first = app
        .state
        .audit
        .list_audit_logs(&caller, &users_filter(1, 2))
        .await
        .unwrap();
    assert_eq!(first.total, 3);
    assert_eq!(first.total_pages, 2);
    assert_eq!(first.page, 1);
    assert_eq!(first.limit, 2);
    let first_ids: Vec<Uuid> = first.logs.iter().map(|e| e.id).collect();
    assert_eq!(first_ids, vec![ids[2], ids[1]]);

    let second = app
        .state
        .audit
        .list_audit_logs(&caller, &users_filter(2, 2))
        .await
        .unwrap();
    assert_eq!(second.total, 3);
    let second_ids: Vec<Uuid> = second.logs.iter().map(|e| e.id).collect();
    assert_eq!(second_ids, vec![ids[0]]);
}

#[tokio::test]
async fn test_page_past_end_is_empty_with_true_totals() {
    let app = TestApp::new().await;
    let tenant = seed_tenant(app.pool(), "Shelbyville").await;
    seed_three_user_entries(&app, tenant.id, tenant.admin_id).await;

    let page = app
        .state
        .audit
        .list_audit_logs(&Caller::new(tenant.admin_id), &users_filter(5, 2))
        .await
        .unwrap();

    assert!(page.logs.is_empty());
    assert_eq!(page.total, 3);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.page, 5);
}

#[tokio::test]
async fn test_empty_trail_has_zero_pages() {
    let app = TestApp::new().await;
    let tenant = seed_tenant(app.pool(), "Ogdenville").await;

    let page = app
        .state
        .audit
        .list_audit_logs(&Caller::new(tenant.admin_id), &AuditLogFilter::default())
        .await
        .unwrap();

    assert_eq!(page.total, 0);
    assert_eq!(page.total_pages, 0);
    assert_eq!(page.limit, 50);
}

#[tokio::test]
async fn test_date_window_is_inclusive_and_inverted_window_matches_nothing() {
    let app = TestApp::new().await;
    let tenant = seed_tenant(app.pool(), "Capital City").await;
    let ids = seed_three_user_entries(&app, tenant.id, tenant.admin_id).await;
    let caller = Caller::new(tenant.admin_id);

    let exact = AuditLogFilter {
        start_date: Some(minutes_after_base(2)),
        end_date: Some(minutes_after_base(2)),
        ..AuditLogFilter::default()
    };
    let page = app
        .state
        .audit
        .list_audit_logs(&caller, &exact)
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.logs[0].id, ids[1]);

    let inverted = AuditLogFilter {
        start_date: Some(minutes_after_base(3)),
        end_date: Some(minutes_after_base(1)),
        ..AuditLogFilter::default()
    };
    let page = app
        .state
        .audit
        .list_audit_logs(&caller, &inverted)
        .await
        .unwrap();
    assert_eq!(page.total, 0);
    assert!(page.logs.is_empty());
}

#[tokio::test]
async fn test_start_inside_a_millisecond_skips_that_millisecond() {
    let app = TestApp::new().await;
    let tenant = seed_tenant(app.pool(), "Capital City").await;
    seed_three_user_entries(&app, tenant.id, tenant.admin_id).await;
    let caller = Caller::new(tenant.admin_id);

    let window = AuditLogFilter {
        start_date: Some(minutes_after_base(1) + chrono::Duration::microseconds(500)),
        end_date: Some(minutes_after_base(2) + chrono::Duration::microseconds(500)),
        ..AuditLogFilter::default()
    };
    let page = app
        .state
        .audit
        .list_audit_logs(&caller, &window)
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.logs[0].entity_id, "user-2");

    let csv = app
        .state
        .audit
        .export_audit_logs(&caller, &window)
        .await
        .unwrap();
    assert_eq!(csv.lines().count(), 2);
}

#[tokio::test]
async fn test_filters_combine_and_blank_strings_mean_any() {
    let app = TestApp::new().await;
    let tenant = seed_tenant(app.pool(), "North Haverbrook").await;
    let clerk = seed_user(app.pool(), tenant.id, Some("Cleo Clerk"), "clerk@nh.gov", true).await;
    let pool = app.pool();

    seed_audit(
        pool,
        tenant.id,
        Some(tenant.admin_id),
        "create",
        "plans",
        "p1",
        None,
        minutes_after_base(1),
    )
    .await;
    seed_audit(
        pool,
        tenant.id,
        Some(clerk),
        "create",
        "plans",
        "p2",
        None,
        minutes_after_base(2),
    )
    .await;
    seed_audit(
        pool,
        tenant.id,
        Some(clerk),
        "delete",
        "plans",
        "p2",
        None,
        minutes_after_base(3),
    )
    .await;
    seed_audit(
        pool,
        tenant.id,
        Some(clerk),
        "create",
        "departments",
        "d1",
        None,
        minutes_after_base(4),
    )
    .await;

    let caller = Caller::new(tenant.admin_id);
    let filter = AuditLogFilter {
        user_id: Some(clerk),
        action: Some("create".to_string()),
        entity_type: Some("plans".to_string()),
        ..AuditLogFilter::default()
    };
    let page = app.state.audit.list_audit_logs(&caller, &filter).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.logs[0].entity_id, "p2");
    assert_eq!(page.logs[0].action, "create");

    let blank = AuditLogFilter {
        action: Some("  ".to_string()),
        entity_type: Some(String::new()),
        ..AuditLogFilter::default()
    };
    let page = app.state.audit.list_audit_logs(&caller, &blank).await.unwrap();
    assert_eq!(page.total, 4);
}

#[tokio::test]
async fn test_sort_by_action_ascending() {
    let app = TestApp::new().await;
    let tenant = seed_tenant(app.pool(), "Brockway").await;
    let pool = app.pool();

    for (minute, action) in [(1, "update"), (2, "approve"), (3, "create")] {
        seed_audit(
            pool,
            tenant.id,
            None,
            action,
            "plans",
            "p1",
            None,
            minutes_after_base(minute),
        )
        .await;
    }

    let filter = AuditLogFilter {
        sort_by: AuditSortField::Action,
        sort_order: SortDirection::Asc,
        ..AuditLogFilter::default()
    };
    let page = app
        .state
        .audit
        .list_audit_logs(&Caller::new(tenant.admin_id), &filter)
        .await
        .unwrap();

    let actions: Vec<&str> = page.logs.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(actions, vec!["approve", "create", "update"]);
}

#[tokio::test]
async fn test_entries_carry_actor_and_system_entries_do_not() {
    let app = TestApp::new().await;
    let tenant = seed_tenant(app.pool(), "Cypress Creek").await;
    let pool = app.pool();

    seed_audit(
        pool,
        tenant.id,
        Some(tenant.admin_id),
        "approve",
        "plans",
        "p1",
        None,
        minutes_after_base(1),
    )
    .await;
    seed_audit(
        pool,
        tenant.id,
        None,
        "rollover",
        "fiscal_years",
        "fy",
        None,
        minutes_after_base(2),
    )
    .await;

    let page = app
        .state
        .audit
        .list_audit_logs(&Caller::new(tenant.admin_id), &AuditLogFilter::default())
        .await
        .unwrap();

    let system = &page.logs[0];
    assert_eq!(system.action, "rollover");
    assert!(system.user_id.is_none());
    assert!(system.user_name.is_none());
    assert_eq!(system.actor_label(), "System");

    let human = &page.logs[1];
    assert_eq!(human.user_name.as_deref(), Some("Ada Admin"));
    assert_eq!(human.user_email.as_deref(), Some("admin@cypress-creek.gov"));
}

#[tokio::test]
async fn test_other_tenants_entries_are_invisible() {
    let app = TestApp::new().await;
    let ours = seed_tenant(app.pool(), "Springfield").await;
    let theirs = seed_tenant(app.pool(), "Shelbyville").await;

    seed_three_user_entries(&app, theirs.id, theirs.admin_id).await;
    seed_audit(
        app.pool(),
        ours.id,
        None,
        "create",
        "users",
        "mine",
        None,
        minutes_after_base(9),
    )
    .await;

    let page = app
        .state
        .audit
        .list_audit_logs(&Caller::new(ours.admin_id), &AuditLogFilter::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert!(page.logs.iter().all(|e| e.tenant_id == ours.id));

    let csv = app
        .state
        .audit
        .export_audit_logs(&Caller::new(ours.admin_id), &AuditLogFilter::default())
        .await
        .unwrap();
    assert!(!csv.contains("user-1"));
}

#[tokio::test]
async fn test_unresolvable_caller_fails_closed() {
    let app = TestApp::new().await;
    let tenant = seed_tenant(app.pool(), "Springfield").await;
    seed_three_user_entries(&app, tenant.id, tenant.admin_id).await;

    let stranger = Caller::new(Uuid::new_v4());

    let page = app
        .state
        .audit
        .list_audit_logs(&stranger, &users_filter(1, 10))
        .await
        .unwrap();
    assert!(page.logs.is_empty());
    assert_eq!(page.total, 0);
    assert_eq!(page.total_pages, 0);

    let csv = app
        .state
        .audit
        .export_audit_logs(&stranger, &AuditLogFilter::default())
        .await
        .unwrap();
    assert_eq!(csv, "timestamp,user,action,entity_type,entity_id,details\r\n");

    let options = app.state.audit.filter_options(&stranger).await.unwrap();
    assert!(options.actions.is_empty());
}

#[tokio::test]
async fn test_out_of_range_pagination_is_rejected() {
    let app = TestApp::new().await;
    let tenant = seed_tenant(app.pool(), "Springfield").await;
    let caller = Caller::new(tenant.admin_id);

    for (page, limit) in [(0, 10), (1, 0), (1, 1001)] {
        let result = app
            .state
            .audit
            .list_audit_logs(&caller, &users_filter(page, limit))
            .await;
        assert!(
            matches!(result, Err(AuditServiceError::InvalidFilter(_))),
            "page={} limit={} should be rejected",
            page,
            limit
        );
    }
}

#[tokio::test]
async fn test_export_matches_listing_total_and_quotes_details() {
    let app = TestApp::new().await;
    let tenant = seed_tenant(app.pool(), "Springfield").await;
    let pool = app.pool();

    seed_audit(
        pool,
        tenant.id,
        Some(tenant.admin_id),
        "update",
        "plans",
        "p1",
        Some(json!({"title": "Parks, Trails and Greenways"})),
        minutes_after_base(1),
    )
    .await;
    seed_audit(pool, tenant.id, None, "create", "plans", "p2", None, minutes_after_base(2)).await;
    seed_audit(pool, tenant.id, None, "create", "users", "u1", None, minutes_after_base(3)).await;

    let filter = AuditLogFilter {
        entity_type: Some("plans".to_string()),
        // Pagination is ignored by exports
        limit: 1,
        ..AuditLogFilter::default()
    };
    let caller = Caller::new(tenant.admin_id);
    let total = app
        .state
        .audit
        .list_audit_logs(&caller, &filter)
        .await
        .unwrap()
        .total;
    let csv = app
        .state
        .audit
        .export_audit_logs(&caller, &filter)
        .await
        .unwrap();

    let records: Vec<&str> = csv.split_terminator("\r\n").collect();
    assert_eq!(records.len() as u64, total + 1);
    assert_eq!(records[0], "timestamp,user,action,entity_type,entity_id,details");
    assert_eq!(records[1], "2024-03-01T09:02:00.000Z,System,create,plans,p2,");
    assert_eq!(
        records[2],
        r#"2024-03-01T09:01:00.000Z,Ada Admin,update,plans,p1,"{""title"":""Parks, Trails and Greenways""}""#
    );
}

#[tokio::test]
async fn test_non_object_details_are_read_back_as_null() {
    let app = TestApp::new().await;
    let tenant = seed_tenant(app.pool(), "Springfield").await;
    seed_raw_audit(app.pool(), tenant.id, "legacy", "[1,2,3]", minutes_after_base(1)).await;

    let page = app
        .state
        .audit
        .list_audit_logs(&Caller::new(tenant.admin_id), &AuditLogFilter::default())
        .await
        .unwrap();

    assert_eq!(page.total, 1);
    assert!(page.logs[0].details.is_none());
}

#[tokio::test]
async fn test_export_ceiling_rejects_large_exports() {
    let app = TestApp::new().await;
    let tenant = seed_tenant(app.pool(), "Springfield").await;
    seed_three_user_entries(&app, tenant.id, tenant.admin_id).await;

    let service = AuditService::new(
        app.pool().clone(),
        Arc::new(MockTenantResolver::fixed(tenant.id)),
    )
    .with_export_max_rows(Some(2));

    let result = service
        .export_audit_logs(&Caller::new(tenant.admin_id), &AuditLogFilter::default())
        .await;
    assert!(matches!(
        result,
        Err(AuditServiceError::ExportTooLarge {
            matched: 3,
            limit: 2
        })
    ));

    let narrowed = AuditLogFilter {
        end_date: Some(minutes_after_base(2)),
        ..AuditLogFilter::default()
    };
    let csv = service
        .export_audit_logs(&Caller::new(tenant.admin_id), &narrowed)
        .await
        .unwrap();
    assert_eq!(csv.split_terminator("\r\n").count(), 3);
}

#[tokio::test]
async fn test_slow_tenant_lookup_times_out() {
    let app = TestApp::new().await;
    let tenant = seed_tenant(app.pool(), "Springfield").await;

    let resolver = MockTenantResolver::fixed(tenant.id);
    resolver.set_error_mode(MockError::Slow(Duration::from_millis(500)));

    let service = AuditService::new(app.pool().clone(), Arc::new(resolver))
        .with_query_timeout(Some(Duration::from_millis(50)));

    let result = service
        .list_audit_logs(&Caller::new(tenant.admin_id), &AuditLogFilter::default())
        .await;
    assert!(matches!(result, Err(AuditServiceError::Timeout(_))));

    let result = service.get_dashboard_stats(&Caller::new(tenant.admin_id)).await;
    assert!(matches!(result, Err(AuditServiceError::Timeout(_))));
}

#[tokio::test]
async fn test_resolver_failure_is_a_data_store_error() {
    let app = TestApp::new().await;
    let resolver = MockTenantResolver::unassigned();
    resolver.set_error_mode(MockError::Unavailable("directory offline".to_string()));

    let service = AuditService::new(app.pool().clone(), Arc::new(resolver));
    let result = service
        .export_audit_logs(&Caller::new(Uuid::new_v4()), &AuditLogFilter::default())
        .await;

    assert!(matches!(result, Err(AuditServiceError::DataStore(_))));
}

#[tokio::test]
async fn test_audit_trail_is_append_only() {
    let app = TestApp::new().await;
    let tenant = seed_tenant(app.pool(), "Springfield").await;
    let entry = seed_audit(
        app.pool(),
        tenant.id,
        None,
        "create",
        "plans",
        "p1",
        None,
        minutes_after_base(1),
    )
    .await;

    let update = sqlx::query("UPDATE audit_logs SET action = 'tampered' WHERE id = ?")
        .bind(entry.id.to_string())
        .execute(app.pool())
        .await;
    assert!(update.is_err());

    let delete = sqlx::query("DELETE FROM audit_logs WHERE id = ?")
        .bind(entry.id.to_string())
        .execute(app.pool())
        .await;
    assert!(delete.is_err());

    let page = app
        .state
        .audit
        .list_audit_logs(&Caller::new(tenant.admin_id), &AuditLogFilter::default())
        .await
        .unwrap();
    assert_eq!(page.logs[0].action, "create");
}

#[tokio::test]
async fn test_filter_options_list_distinct_values() {
    let app = TestApp::new().await;
    let tenant = seed_tenant(app.pool(), "Springfield").await;
    let pool = app.pool();

    seed_audit(
        pool,
        tenant.id,
        Some(tenant.admin_id),
        "create",
        "plans",
        "p1",
        None,
        minutes_after_base(1),
    )
    .await;
    seed_audit(
        pool,
        tenant.id,
        Some(tenant.admin_id),
        "update",
        "plans",
        "p1",
        None,
        minutes_after_base(2),
    )
    .await;
    seed_audit(
        pool,
        tenant.id,
        None,
        "create",
        "departments",
        "d1",
        None,
        minutes_after_base(3),
    )
    .await;

    let options = app
        .state
        .audit
        .filter_options(&Caller::new(tenant.admin_id))
        .await
        .unwrap();

    assert_eq!(options.actions, vec!["create", "update"]);
    assert_eq!(options.entity_types, vec!["departments", "plans"]);
    assert_eq!(options.users.len(), 1);
    assert_eq!(options.users[0].id, tenant.admin_id);
    assert_eq!(options.users[0].name.as_deref(), Some("Ada Admin"));
}
