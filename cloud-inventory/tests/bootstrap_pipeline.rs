//! Whole pipeline through the bootstrap registration table and the
//! in-memory queue.

mod common;

use std::sync::Arc;

use cloud_inventory::clients::ClientScope;
use cloud_inventory::collector::COLLECT_ALL;
use cloud_inventory::config::InventoryConfig;
use cloud_inventory::database::models::NetworkRecord;
use cloud_inventory::housekeeper::HOUSEKEEPER;
use cloud_inventory::linker::LINK_ALL;
use cloud_inventory::services::{Bootstrap, ServiceContainer};
use cloud_inventory::task::{MemoryQueue, TaskQueue};
use cloud_inventory::{Error, database::DbPool};
use common::*;
use tokio_util::sync::CancellationToken;

fn cloud() -> FakeCloud {
    let mut cloud = FakeCloud::with_networks(&["n1", "n2"]);
    cloud
        .subnets
        .insert("n1".to_string(), vec![FakeItem::new("s1")]);
    cloud.instances = vec![
        FakeItem::referencing("i1", "s1"),
        FakeItem::new("i2"),
    ];
    cloud
}

fn build(pool: &DbPool, queue: Arc<MemoryQueue>) -> ServiceContainer {
    let config = InventoryConfig {
        queue: "inventory".to_string(),
        ..Default::default()
    };
    let clients = directory(vec![(ClientScope::new("c1", "p1", "r1"), cloud())]);

    let mut bootstrap =
        Bootstrap::new(pool.clone(), queue as Arc<dyn TaskQueue>).configure(&config);
    bootstrap
        .register_collector(NetworkAdapter, clients.clone())
        .unwrap();
    bootstrap
        .register_nested_collector::<_, NetworkRecord>(SubnetAdapter, clients.clone(), "network_id")
        .unwrap();
    bootstrap
        .register_collector(InstanceAdapter, clients)
        .unwrap();
    bootstrap.with_linker().unwrap();
    bootstrap.with_housekeeper().unwrap();
    bootstrap.build().unwrap()
}

#[tokio::test]
async fn collect_link_and_sweep_through_the_queue() {
    let (_dir, pool) = setup_test_db().await;
    let queue = Arc::new(MemoryQueue::new());
    let container = build(&pool, queue.clone());
    let cancel = CancellationToken::new();

    assert_eq!(
        container.dispatcher.task_types(),
        vec![
            COLLECT_ALL,
            "fake.instances",
            "fake.networks",
            "fake.subnets",
            HOUSEKEEPER,
            LINK_ALL,
        ]
    );
    assert_eq!(
        container.collector_types,
        vec!["fake.networks", "fake.subnets", "fake.instances"]
    );

    // First pass: subnets fan out before any network is stored.
    container.queue.submit(COLLECT_ALL, None, "inventory").await.unwrap();
    let report = queue.drain(&container.dispatcher, &cancel).await;
    assert_eq!(report.completed(), 6);
    assert_eq!(report.retried() + report.skipped(), 0);
    assert!(report.outcomes.iter().all(|(task, _)| task.queue == "inventory"));
    assert_eq!(count_rows(&pool, "networks").await, 2);
    assert_eq!(count_rows(&pool, "subnets").await, 0);
    assert_eq!(count_rows(&pool, "instances").await, 2);

    // Second pass picks the stored networks up as parents.
    container.queue.submit(COLLECT_ALL, None, "inventory").await.unwrap();
    let report = queue.drain(&container.dispatcher, &cancel).await;
    assert_eq!(report.retried() + report.skipped(), 0);
    assert_eq!(count_rows(&pool, "networks").await, 2);
    assert_eq!(count_rows(&pool, "subnets").await, 1);

    container.queue.submit(LINK_ALL, None, "inventory").await.unwrap();
    let report = queue.drain(&container.dispatcher, &cancel).await;
    assert_eq!(report.completed(), 1);
    assert_eq!(count_rows(&pool, "subnet_networks").await, 1);
    assert_eq!(count_rows(&pool, "instance_subnets").await, 1);

    // Everything is fresh, so the default sweep deletes nothing.
    container.queue.submit(HOUSEKEEPER, None, "inventory").await.unwrap();
    let report = queue.drain(&container.dispatcher, &cancel).await;
    assert_eq!(report.completed(), 1);
    assert_eq!(count_rows(&pool, "networks").await, 2);
    assert_eq!(count_rows(&pool, "housekeeper_runs").await, 3);

    let text = container.exporter().export();
    assert!(text.contains(
        "cloud_inventory_fake_networks{credential=\"c1\",project=\"p1\",domain=\"\",region=\"r1\"} 2"
    ));
    assert!(text.contains(
        "cloud_inventory_fake_subnets{credential=\"c1\",project=\"p1\",domain=\"\",region=\"r1\",parent=\"n1\"} 1"
    ));
    assert!(text.contains("cloud_inventory_link_all{link=\"subnet_networks\"} 1"));
    assert!(text.contains("cloud_inventory_housekeeper{model=\"networks\"} 0"));
}

#[tokio::test]
async fn unknown_task_type_is_skipped() {
    let (_dir, pool) = setup_test_db().await;
    let queue = Arc::new(MemoryQueue::new());
    let container = build(&pool, queue.clone());

    container.queue.submit("fake.volumes", None, "inventory").await.unwrap();
    let report = queue
        .drain(&container.dispatcher, &CancellationToken::new())
        .await;
    assert_eq!(report.skipped(), 1);
}

#[tokio::test]
async fn duplicate_collector_is_rejected() {
    let (_dir, pool) = setup_test_db().await;
    let clients = directory(vec![(ClientScope::new("c1", "p1", "r1"), cloud())]);
    let mut bootstrap = Bootstrap::new(pool, Arc::new(MemoryQueue::new()));

    bootstrap
        .register_collector(NetworkAdapter, clients.clone())
        .unwrap();
    let err = bootstrap
        .register_collector(NetworkAdapter, clients)
        .unwrap_err();
    assert!(matches!(err, Error::Registry(_)));
}

#[tokio::test]
async fn shutdown_cancels_the_container_token() {
    let (_dir, pool) = setup_test_db().await;
    let container = build(&pool, Arc::new(MemoryQueue::new()));
    let token = container.cancellation_token();
    assert!(!token.is_cancelled());
    container.shutdown();
    assert!(token.is_cancelled());
}
