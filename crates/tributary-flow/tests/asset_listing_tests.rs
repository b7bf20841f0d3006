//! Tests for the read surfaces: URI-pattern and dag filters, ordering
//! validation, and pagination.

use std::sync::Arc;

use tributary_flow::asset::{AssetSpec, ExtraMap};
use tributary_flow::config::EngineConfig;
use tributary_flow::error::{Error, Result};
use tributary_flow::event::EventSource;
use tributary_flow::query::{AssetFilter, EventFilter, PageRequest};
use tributary_flow::service::TriggerService;
use tributary_flow::store::memory::InMemoryStore;
use tributary_flow::store::TriggerStore;

fn service() -> TriggerService {
    TriggerService::new(Arc::new(InMemoryStore::new()))
}

async fn uris(
    service: &TriggerService,
    filter: AssetFilter,
) -> Result<Vec<String>> {
    let page = service
        .list_assets(filter, "uri", PageRequest::first())
        .await?;
    Ok(page.items.into_iter().map(|a| a.uri).collect())
}

async fn seed_pattern_assets(service: &TriggerService) -> Result<()> {
    for uri in [
        "s3://folder/key",
        "gcp://bucket/key",
        "somescheme://asset/key",
        "wasb://some_asset_bucket_/key",
    ] {
        service.register_asset(&AssetSpec::new(uri)).await?;
    }
    Ok(())
}

/// dag1 and dag2 consume asset1/asset2 (schedule references); dag3 only
/// produces asset3 (outlet reference).
async fn seed_referenced_assets(service: &TriggerService) -> Result<()> {
    service.register_asset(&AssetSpec::new("s3://folder/key")).await?;
    service.register_asset(&AssetSpec::new("gcp://bucket/key")).await?;
    service
        .register_asset(&AssetSpec::new("somescheme://asset/key"))
        .await?;
    service.store().add_schedule_ref("dag1", "s3://folder/key").await?;
    service.store().add_schedule_ref("dag2", "gcp://bucket/key").await?;
    service
        .store()
        .add_outlet_ref("dag3", "task1", "somescheme://asset/key")
        .await?;
    Ok(())
}

#[tokio::test]
async fn uri_pattern_filters_by_substring() -> Result<()> {
    let service = service();
    seed_pattern_assets(&service).await?;

    let filter = |pattern: &str| AssetFilter {
        uri_pattern: Some(pattern.to_string()),
        dag_ids: None,
    };

    assert_eq!(uris(&service, filter("s3")).await?, vec!["s3://folder/key"]);
    assert_eq!(
        uris(&service, filter("bucket")).await?,
        vec!["gcp://bucket/key", "wasb://some_asset_bucket_/key"]
    );
    assert_eq!(
        uris(&service, filter("asset")).await?,
        vec!["somescheme://asset/key", "wasb://some_asset_bucket_/key"]
    );
    // An empty pattern matches everything.
    assert_eq!(uris(&service, filter("")).await?.len(), 4);
    Ok(())
}

#[tokio::test]
async fn dag_ids_filter_spans_schedule_and_outlet_references() -> Result<()> {
    let service = service();
    seed_referenced_assets(&service).await?;

    let filter = |dags: &[&str]| AssetFilter {
        uri_pattern: None,
        dag_ids: Some(dags.iter().map(ToString::to_string).collect()),
    };

    assert_eq!(
        uris(&service, filter(&["dag1", "dag2"])).await?,
        vec!["gcp://bucket/key", "s3://folder/key"]
    );
    // dag3 only has an outlet reference; its produced asset still lists.
    assert_eq!(
        uris(&service, filter(&["dag3"])).await?,
        vec!["somescheme://asset/key"]
    );
    assert_eq!(uris(&service, filter(&["dag2", "dag3"])).await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn dag_ids_and_uri_pattern_combine() -> Result<()> {
    let service = service();
    seed_referenced_assets(&service).await?;

    let filter = |dags: &[&str], pattern: &str| AssetFilter {
        uri_pattern: Some(pattern.to_string()),
        dag_ids: Some(dags.iter().map(ToString::to_string).collect()),
    };

    assert_eq!(
        uris(&service, filter(&["dag1", "dag2"], "folder")).await?,
        vec!["s3://folder/key"]
    );
    assert!(uris(&service, filter(&["dag3"], "nothing")).await?.is_empty());
    assert_eq!(uris(&service, filter(&["dag2", "dag3"], "key")).await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn asset_ordering_rejects_unknown_attribute() -> Result<()> {
    let service = service();
    seed_pattern_assets(&service).await?;

    let result = service
        .list_assets(AssetFilter::default(), "fake", PageRequest::first())
        .await;
    match result {
        Err(Error::InvalidOrdering { attribute }) => assert_eq!(attribute, "fake"),
        other => panic!("expected InvalidOrdering, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn event_ordering_rejects_unknown_attribute() -> Result<()> {
    let service = service();

    let result = service
        .list_events(EventFilter::default(), "fake", PageRequest::first())
        .await;
    assert!(matches!(result, Err(Error::InvalidOrdering { .. })));
    Ok(())
}

#[tokio::test]
async fn descending_order_is_supported() -> Result<()> {
    let service = service();
    seed_pattern_assets(&service).await?;

    let page = service
        .list_assets(AssetFilter::default(), "-uri", PageRequest::first())
        .await?;
    assert_eq!(page.items[0].uri, "wasb://some_asset_bucket_/key");
    Ok(())
}

#[tokio::test]
async fn asset_pagination_slices_but_counts_everything() -> Result<()> {
    let service = service();
    for i in 1..=9 {
        service
            .register_asset(&AssetSpec::new(format!("s3://bucket/key/{i}")))
            .await?;
    }

    let page = service
        .list_assets(AssetFilter::default(), "uri", PageRequest::slice(3, 3))
        .await?;
    assert_eq!(page.total_entries, 9);
    let uris: Vec<&str> = page.items.iter().map(|a| a.uri.as_str()).collect();
    assert_eq!(
        uris,
        vec!["s3://bucket/key/4", "s3://bucket/key/5", "s3://bucket/key/6"]
    );
    Ok(())
}

#[tokio::test]
async fn page_limits_default_and_cap_from_config() -> Result<()> {
    let config = EngineConfig {
        default_page_limit: 3,
        maximum_page_limit: 5,
        ..EngineConfig::default()
    };
    let service = TriggerService::with_config(Arc::new(InMemoryStore::new()), config);
    for i in 1..=9 {
        service
            .register_asset(&AssetSpec::new(format!("s3://bucket/key/{i}")))
            .await?;
    }

    // No limit: the configured default applies.
    let page = service
        .list_assets(AssetFilter::default(), "uri", PageRequest::first())
        .await?;
    assert_eq!(page.items.len(), 3);
    assert_eq!(page.total_entries, 9);

    // Oversized limit: capped at the configured maximum.
    let page = service
        .list_assets(AssetFilter::default(), "uri", PageRequest::slice(50, 0))
        .await?;
    assert_eq!(page.items.len(), 5);
    assert_eq!(page.total_entries, 9);
    Ok(())
}

#[tokio::test]
async fn event_filters_select_by_provenance() -> Result<()> {
    let service = service();
    for i in 1..=3 {
        service
            .register_asset(&AssetSpec::new(format!("s3://bucket/key/{i}")))
            .await?;
    }
    for i in 1..=3_i64 {
        service
            .record_event(
                &format!("s3://bucket/key/{i}"),
                EventSource::mapped_task(format!("dag{i}"), format!("task{i}"), format!("run{i}"), i),
                ExtraMap::new(),
            )
            .await?;
    }

    for (filter, expected_run) in [
        (
            EventFilter {
                source_dag_id: Some("dag2".into()),
                ..EventFilter::default()
            },
            "run2",
        ),
        (
            EventFilter {
                source_task_id: Some("task3".into()),
                ..EventFilter::default()
            },
            "run3",
        ),
        (
            EventFilter {
                source_run_id: Some("run1".into()),
                ..EventFilter::default()
            },
            "run1",
        ),
        (
            EventFilter {
                source_map_index: Some(2),
                ..EventFilter::default()
            },
            "run2",
        ),
    ] {
        let page = service
            .list_events(filter, "id", PageRequest::first())
            .await?;
        assert_eq!(page.total_entries, 1);
        assert_eq!(
            page.items[0].event.source.run_id.as_deref(),
            Some(expected_run)
        );
    }

    // Filtering by asset id.
    let asset = service.get_asset("s3://bucket/key/2").await?;
    let page = service
        .list_events(
            EventFilter {
                asset_id: Some(asset.asset.id),
                ..EventFilter::default()
            },
            "id",
            PageRequest::first(),
        )
        .await?;
    assert_eq!(page.total_entries, 1);
    assert_eq!(page.items[0].event.asset_uri, "s3://bucket/key/2");
    Ok(())
}

#[tokio::test]
async fn event_pagination_by_source_run_id() -> Result<()> {
    let service = service();
    service.register_asset(&AssetSpec::new("s3://bucket/key")).await?;
    for i in 1..=9 {
        service
            .record_event(
                "s3://bucket/key",
                EventSource::task("foo", "bar", format!("run{i}")),
                ExtraMap::new(),
            )
            .await?;
    }

    let page = service
        .list_events(EventFilter::default(), "source_run_id", PageRequest::slice(3, 3))
        .await?;
    assert_eq!(page.total_entries, 9);
    let run_ids: Vec<&str> = page
        .items
        .iter()
        .filter_map(|d| d.event.source.run_id.as_deref())
        .collect();
    assert_eq!(run_ids, vec!["run4", "run5", "run6"]);
    Ok(())
}

#[tokio::test]
async fn get_asset_returns_references_and_not_found() -> Result<()> {
    let service = service();
    seed_referenced_assets(&service).await?;

    let detail = service.get_asset("s3://folder/key").await?;
    assert_eq!(detail.consuming_dags, vec!["dag1"]);
    assert!(detail.producing_tasks.is_empty());

    let detail = service.get_asset("somescheme://asset/key").await?;
    assert!(detail.consuming_dags.is_empty());
    assert_eq!(detail.producing_tasks.len(), 1);
    assert_eq!(detail.producing_tasks[0].dag_id, "dag3");
    assert_eq!(detail.producing_tasks[0].task_id, "task1");

    let result = service.get_asset("s3://missing").await;
    assert!(matches!(result, Err(Error::AssetNotFound { .. })));
    Ok(())
}

#[tokio::test]
async fn reregistration_updates_metadata_in_listing() -> Result<()> {
    let service = service();
    service.register_asset(&AssetSpec::new("s3://bucket/key")).await?;
    service
        .register_asset(&AssetSpec::new("s3://bucket/key").with_name("renamed"))
        .await?;

    let page = service
        .list_assets(AssetFilter::default(), "uri", PageRequest::first())
        .await?;
    assert_eq!(page.total_entries, 1);
    assert_eq!(page.items[0].name, "renamed");
    Ok(())
}
