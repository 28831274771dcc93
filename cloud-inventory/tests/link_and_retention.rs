//! Linker convergence and housekeeper retention against a real SQLite file.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use cloud_inventory::Error;
use cloud_inventory::clients::ClientScope;
use cloud_inventory::database::models::{InstanceRecord, NetworkRecord, SubnetRecord};
use cloud_inventory::database::repositories::{
    HousekeepingRepository, LinkRepository, SqlxHousekeepingRepository, SqlxLinkRepository,
};
use cloud_inventory::database::{DbPool, Resource, bulk_upsert};
use cloud_inventory::housekeeper::{
    HOUSEKEEPER, Housekeeper, HousekeeperPayload, ModelRegistry, RetentionEntry,
};
use cloud_inventory::linker::{INSTANCE_SUBNETS, LINK_ALL, Linker, SUBNET_NETWORKS};
use cloud_inventory::metrics::DynamicMetrics;
use common::*;

fn network(scope: &ClientScope, id: &str, updated_at: i64) -> NetworkRecord {
    NetworkRecord {
        scope: scope.clone(),
        network_id: id.to_string(),
        name: id.to_string(),
        cidr: None,
        state: None,
        created_at: updated_at,
        updated_at,
    }
}

fn subnet(scope: &ClientScope, network_id: &str, id: &str) -> SubnetRecord {
    SubnetRecord {
        scope: scope.clone(),
        network_id: network_id.to_string(),
        subnet_id: id.to_string(),
        name: id.to_string(),
        cidr: None,
        zone: None,
        created_at: 1,
        updated_at: 1,
    }
}

fn instance(scope: &ClientScope, id: &str, subnet_id: Option<&str>) -> InstanceRecord {
    InstanceRecord {
        scope: scope.clone(),
        instance_id: id.to_string(),
        subnet_id: subnet_id.map(str::to_string),
        name: id.to_string(),
        machine_type: None,
        status: None,
        created_at: 1,
        updated_at: 1,
    }
}

async fn seed(pool: &DbPool) {
    let r1 = ClientScope::new("c1", "p1", "r1");
    let r2 = ClientScope::new("c1", "p1", "r2");

    bulk_upsert(
        pool,
        &NetworkRecord::SCHEMA,
        &[network(&r1, "n1", 1), network(&r1, "n2", 1), network(&r2, "n1", 1)],
    )
    .await
    .unwrap();
    bulk_upsert(
        pool,
        &SubnetRecord::SCHEMA,
        &[
            subnet(&r1, "n1", "s1"),
            subnet(&r1, "n1", "s2"),
            subnet(&r1, "n2", "s3"),
            // Parent never collected.
            subnet(&r1, "ghost", "s4"),
        ],
    )
    .await
    .unwrap();
    bulk_upsert(
        pool,
        &InstanceRecord::SCHEMA,
        &[
            instance(&r1, "i1", Some("s1")),
            instance(&r1, "i2", None),
            instance(&r1, "i3", Some("missing")),
        ],
    )
    .await
    .unwrap();
}

async fn link_rows(pool: &DbPool) -> Vec<(i64, i64, i64)> {
    sqlx::query_as(
        "SELECT subnet_id, network_id, created_at FROM subnet_networks ORDER BY subnet_id",
    )
    .fetch_all(pool)
    .await
    .unwrap()
}

fn link_metrics() -> Arc<DynamicMetrics> {
    let mut metrics = DynamicMetrics::new();
    metrics.describe(Linker::metric_descriptor()).unwrap();
    Arc::new(metrics)
}

#[tokio::test]
async fn linking_converges_to_resolved_pairs() {
    let (_dir, pool) = setup_test_db().await;
    seed(&pool).await;

    let repo = Arc::new(SqlxLinkRepository::new(pool.clone()));
    let metrics = link_metrics();
    let linker = Linker::with_default_specs(repo.clone(), metrics.clone());

    // s1, s2, s3 resolve within their own region; s4 has no parent.
    assert_eq!(linker.link_all().await.unwrap(), 4);
    assert_eq!(repo.count_links(&SUBNET_NETWORKS).await.unwrap(), 3);
    assert_eq!(repo.count_links(&INSTANCE_SUBNETS).await.unwrap(), 1);

    let before = link_rows(&pool).await;

    linker.link_all().await.unwrap();
    assert_eq!(repo.count_links(&SUBNET_NETWORKS).await.unwrap(), 3);
    assert_eq!(repo.count_links(&INSTANCE_SUBNETS).await.unwrap(), 1);

    let after = link_rows(&pool).await;
    assert_eq!(before, after);
    assert_eq!(metrics.sample(LINK_ALL, &["subnet_networks"]), Some(3.0));
    assert_eq!(metrics.sample(LINK_ALL, &["instance_subnets"]), Some(1.0));
}

#[tokio::test]
async fn late_parent_is_linked_on_next_run() {
    let (_dir, pool) = setup_test_db().await;
    seed(&pool).await;
    let repo = Arc::new(SqlxLinkRepository::new(pool.clone()));
    let linker = Linker::with_default_specs(repo.clone(), link_metrics());

    linker.link_all().await.unwrap();
    assert_eq!(repo.count_links(&SUBNET_NETWORKS).await.unwrap(), 3);

    let r1 = ClientScope::new("c1", "p1", "r1");
    bulk_upsert(&pool, &NetworkRecord::SCHEMA, &[network(&r1, "ghost", 1)])
        .await
        .unwrap();

    linker.link_all().await.unwrap();
    assert_eq!(repo.count_links(&SUBNET_NETWORKS).await.unwrap(), 4);
}

fn housekeeper(pool: &DbPool) -> (Housekeeper, Arc<DynamicMetrics>) {
    let mut models = ModelRegistry::new("models");
    models.must_register(NetworkRecord::MODEL.to_string(), NetworkRecord::descriptor());
    models.must_register(SubnetRecord::MODEL.to_string(), SubnetRecord::descriptor());
    models.must_register(InstanceRecord::MODEL.to_string(), InstanceRecord::descriptor());

    let mut metrics = DynamicMetrics::new();
    metrics.describe(Housekeeper::metric_descriptor()).unwrap();
    let metrics = Arc::new(metrics);

    let hk = Housekeeper::new(
        Arc::new(models),
        Arc::new(SqlxHousekeepingRepository::new(pool.clone())),
        metrics.clone(),
        Duration::from_secs(7 * 24 * 3600),
    );
    (hk, metrics)
}

#[tokio::test]
async fn retention_boundary_is_strict() {
    let (_dir, pool) = setup_test_db().await;
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let retention = Duration::from_secs(24 * 3600);
    let cutoff = now.timestamp_millis() - 24 * 3600 * 1000;

    let scope = ClientScope::new("c1", "p1", "r1");
    bulk_upsert(
        &pool,
        &NetworkRecord::SCHEMA,
        &[
            network(&scope, "at-cutoff", cutoff),
            network(&scope, "one-second-older", cutoff - 1000),
            network(&scope, "fresh", now.timestamp_millis()),
        ],
    )
    .await
    .unwrap();

    let (hk, metrics) = housekeeper(&pool);
    let payload = HousekeeperPayload {
        entries: vec![RetentionEntry::new("networks", retention)],
    };
    assert_eq!(hk.run_at(&payload, now).await.unwrap(), 1);

    let remaining: Vec<(String,)> =
        sqlx::query_as("SELECT network_id FROM networks ORDER BY network_id")
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(
        remaining,
        vec![("at-cutoff".to_string(),), ("fresh".to_string(),)]
    );
    assert_eq!(metrics.sample(HOUSEKEEPER, &["networks"]), Some(1.0));

    let runs = SqlxHousekeepingRepository::new(pool.clone())
        .list_runs(Some("networks"), 10)
        .await
        .unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].deleted_count, 1);
    assert!(runs[0].completed_at >= runs[0].started_at);
}

#[tokio::test]
async fn unknown_model_does_not_stop_other_entries() {
    let (_dir, pool) = setup_test_db().await;
    let scope = ClientScope::new("c1", "p1", "r1");
    bulk_upsert(&pool, &NetworkRecord::SCHEMA, &[network(&scope, "old", 0)])
        .await
        .unwrap();

    let (hk, _) = housekeeper(&pool);
    let payload = HousekeeperPayload {
        entries: vec![
            RetentionEntry::new("widgets", Duration::from_secs(60)),
            RetentionEntry::new("networks", Duration::from_secs(60)),
        ],
    };

    let err = hk.run(&payload).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { ref id, .. } if id == "widgets"));
    assert_eq!(count_rows(&pool, "networks").await, 0);
    assert_eq!(count_rows(&pool, "housekeeper_runs").await, 1);
}

#[tokio::test]
async fn deleting_a_parent_cascades_its_links() {
    let (_dir, pool) = setup_test_db().await;
    seed(&pool).await;
    let repo = Arc::new(SqlxLinkRepository::new(pool.clone()));
    Linker::with_default_specs(repo.clone(), link_metrics())
        .link_all()
        .await
        .unwrap();
    assert_eq!(repo.count_links(&SUBNET_NETWORKS).await.unwrap(), 3);

    // Every seeded network has updated_at = 1, far in the past.
    let (hk, _) = housekeeper(&pool);
    let payload = HousekeeperPayload {
        entries: vec![RetentionEntry::new("networks", Duration::from_secs(60))],
    };
    assert_eq!(hk.run(&payload).await.unwrap(), 3);

    assert_eq!(repo.count_links(&SUBNET_NETWORKS).await.unwrap(), 0);
    assert_eq!(count_rows(&pool, "subnets").await, 4);
    assert_eq!(repo.count_links(&INSTANCE_SUBNETS).await.unwrap(), 1);
}
