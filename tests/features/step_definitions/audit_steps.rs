//! Audit log step definitions

use cucumber::{given, then, when};

use crate::common::{minutes_after_base, seed_audit};
use crate::features::support::TestWorld;

#[given(expr = "{string} has {int} audit entries for {string}")]
async fn has_audit_entries(world: &mut TestWorld, name: String, count: i64, entity_type: String) {
    let tenant = world.tenant(&name);
    let pool = world.app().await.pool().clone();
    for n in 1..=count {
        seed_audit(
            &pool,
            tenant.id,
            Some(tenant.admin_id),
            "update",
            &entity_type,
            &format!("{}-{}", entity_type, n),
            None,
            minutes_after_base(n),
        )
        .await;
    }
}

#[when(expr = "I request audit logs page {int} with limit {int}")]
async fn request_page(world: &mut TestWorld, page: u32, limit: u32) {
    world
        .get(&format!("/api/v1/audit-logs?page={}&limit={}", page, limit))
        .await;
}

#[when(expr = "I request audit logs page {int} with limit {int} for entity type {string}")]
async fn request_page_for_entity(
    world: &mut TestWorld,
    page: u32,
    limit: u32,
    entity_type: String,
) {
    world
        .get(&format!(
            "/api/v1/audit-logs?entity_type={}&page={}&limit={}",
            entity_type, page, limit
        ))
        .await;
}

#[when(expr = "I export audit logs for entity type {string}")]
async fn export_for_entity(world: &mut TestWorld, entity_type: String) {
    world
        .get(&format!("/api/v1/audit-logs/export?entity_type={}", entity_type))
        .await;
}

#[then(expr = "the response should report {int} total entries over {int} pages")]
async fn reports_totals(world: &mut TestWorld, total: u64, pages: u64) {
    let json = world.response_json();
    assert_eq!(json["total"].as_u64(), Some(total));
    assert_eq!(json["total_pages"].as_u64(), Some(pages));
}

#[then(expr = "the returned entity ids should be {string}")]
async fn returned_entity_ids(world: &mut TestWorld, expected: String) {
    let json = world.response_json();
    let ids: Vec<String> = json["logs"]
        .as_array()
        .expect("logs should be an array")
        .iter()
        .filter_map(|e| e["entity_id"].as_str().map(str::to_string))
        .collect();
    let expected: Vec<String> = expected.split(',').map(|s| s.trim().to_string()).collect();
    assert_eq!(ids, expected);
}

#[then(expr = "the export should contain {int} records")]
async fn export_records(world: &mut TestWorld, count: usize) {
    let body = world.response().text();
    // Header line plus one line per record
    assert_eq!(body.split_terminator("\r\n").count(), count + 1);
}
