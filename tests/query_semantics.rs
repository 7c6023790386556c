//! Count, scan and init semantics.

mod helpers;

use std::collections::BTreeSet;

use futures::{StreamExt, TryStreamExt};
use hostdb::{DatabaseError, Filter, HostDb, IndexSpec, Mapping, RecordId};

use helpers::{memory_db, scanned_host, sqlite_db};

async fn seed(db: &HostDb, hosts: u8) -> Vec<RecordId> {
    let mut ids = Vec::new();
    for i in 1..=hosts {
        let ports: &[u16] = if i % 2 == 0 { &[80, 443] } else { &[22] };
        let mut record = scanned_host(&format!("198.51.100.{i}"), ports, 1, 2);
        if i % 3 == 0 {
            record = record.with_tag("CDN");
        }
        ids.push(db.store_host(&record).await.unwrap());
    }
    ids
}

#[tokio::test]
async fn count_matches_stored_records() {
    let dir = tempfile::tempdir().unwrap();
    let db = sqlite_db(&dir.path().join("count.db")).await;
    seed(&db, 12).await;

    assert_eq!(db.count(&Filter::all()).await.unwrap(), 12);

    let web = Filter::in_set("ports.port", [80u16, 443]).unwrap();
    let cdn = Filter::equals("tags", "CDN").unwrap();
    assert_eq!(db.count(&web).await.unwrap(), 6);
    assert_eq!(db.count(&cdn).await.unwrap(), 4);
    assert_eq!(db.count(&Filter::and([web.clone(), !cdn.clone()])).await.unwrap(), 4);
    assert_eq!(db.count(&Filter::or([web, cdn])).await.unwrap(), 8);

    let addr = Filter::host("198.51.100.5".parse().unwrap());
    assert_eq!(db.count(&addr).await.unwrap(), 1);
    // Plain store does not merge: a second record with the same address is counted
    db.store_host(&scanned_host("198.51.100.5", &[25], 3, 4)).await.unwrap();
    assert_eq!(db.count(&addr).await.unwrap(), 2);
    let missing = Filter::host("198.51.100.200".parse().unwrap());
    assert_eq!(db.count(&missing).await.unwrap(), 0);
}

#[tokio::test]
async fn backends_agree_on_counts() {
    let dir = tempfile::tempdir().unwrap();
    let sqlite = sqlite_db(&dir.path().join("agree.db")).await;
    let memory = memory_db().await;
    seed(&sqlite, 9).await;
    seed(&memory, 9).await;

    let filters = [
        Filter::all(),
        Filter::equals("ports.state", "open").unwrap(),
        Filter::exists("tags").unwrap(),
        !Filter::exists("tags").unwrap(),
        Filter::in_set("addr", ["198.51.100.1", "198.51.100.2", "2001:db8::1"]).unwrap(),
        Filter::in_set("tags", Vec::<String>::new()).unwrap(),
        Filter::and([]),
        Filter::or([]),
    ];
    for filter in &filters {
        assert_eq!(
            sqlite.count(filter).await.unwrap(),
            memory.count(filter).await.unwrap(),
            "{}",
            filter.to_query_json()
        );
    }
}

#[tokio::test]
async fn scan_is_complete_for_every_page_size() {
    let dir = tempfile::tempdir().unwrap();
    let db = sqlite_db(&dir.path().join("scan.db")).await;
    let ids: BTreeSet<RecordId> = seed(&db, 23).await.into_iter().collect();

    let filter = Filter::all();
    for page_size in [1, 2, 5, 22, 23, 24, 500] {
        let scanned: Vec<RecordId> = db
            .scan_with_page_size(&filter, page_size)
            .map_ok(|r| r.id().expect("scanned records carry ids"))
            .try_collect()
            .await
            .unwrap();
        assert_eq!(scanned.len(), ids.len(), "page size {page_size}");
        assert_eq!(scanned.into_iter().collect::<BTreeSet<_>>(), ids);
    }

    let web = Filter::equals("ports.port", 443u16).unwrap();
    let web_count = db.count(&web).await.unwrap();
    let web_scanned = db.scan_with_page_size(&web, 3).count().await;
    assert_eq!(web_scanned as u64, web_count);
}

#[tokio::test]
async fn dropping_a_scan_stops_it() {
    let db = memory_db().await;
    seed(&db, 10).await;
    let filter = Filter::all();
    let first_two: Vec<_> = db.scan_with_page_size(&filter, 3).take(2).collect().await;
    assert_eq!(first_two.len(), 2);
}

#[tokio::test]
async fn init_only_clears_the_named_index() {
    let dir = tempfile::tempdir().unwrap();
    let db = sqlite_db(&dir.path().join("init.db")).await;
    seed(&db, 4).await;

    let other = IndexSpec::new(db.index_name("archive"), Mapping::hosts_default());
    assert!(db.init_indexes(std::slice::from_ref(&other)).await.is_success());
    let archived = scanned_host("192.0.2.77", &[22], 1, 2);
    db.store()
        .store(&other.name, &archived)
        .await
        .unwrap();

    db.init().await.unwrap();
    assert_eq!(db.count(&Filter::all()).await.unwrap(), 0);
    assert_eq!(db.store().count(&other.name, &Filter::all()).await.unwrap(), 1);

    // Recreating an index is idempotent
    db.init().await.unwrap();
    assert_eq!(db.count(&Filter::all()).await.unwrap(), 0);
}

#[tokio::test]
async fn unmapped_fields_are_not_queryable() {
    let db = memory_db().await;
    let record = scanned_host("192.0.2.5", &[8080], 1, 2);
    let mut record = record;
    record.ports[0]
        .details
        .insert("http_title".to_string(), "Login".into());
    db.store_host(&record).await.unwrap();

    let by_title = Filter::equals("ports.http_title", "Login").unwrap();
    assert!(matches!(
        db.count(&by_title).await,
        Err(DatabaseError::QueryError(_))
    ));
    // The detail is still stored
    let filter = Filter::all();
    let stored: Vec<_> = db.scan(&filter).try_collect().await.unwrap();
    assert_eq!(stored[0].ports[0].details["http_title"], "Login");
}

#[tokio::test]
async fn unknown_fields_fail_at_build_time() {
    assert!(matches!(
        Filter::equals("address", "192.0.2.1"),
        Err(DatabaseError::UnknownField(_))
    ));
}
