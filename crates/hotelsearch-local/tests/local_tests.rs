use std::path::PathBuf;

use futures::TryStreamExt;
use serde_json::json;

use hotelsearch_core::dataset::{load_records, load_schema, to_documents};
use hotelsearch_core::types::{Document, IndexHandle, IndexSchema, SearchOptions, SearchRequest};
use hotelsearch_core::{run_query, Error, SearchService};
use hotelsearch_local::LocalSearchService;

fn root() -> PathBuf {
    // crates/hotelsearch-local -> crates -> repo root
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).ancestors().nth(2).unwrap().to_path_buf()
}

fn hotel_schema() -> IndexSchema { load_schema(&root().join("data/hotels_quickstart_index.json")).expect("schema") }

fn hotel_docs() -> Vec<Document> { to_documents(&load_records(&root().join("data/hotels.json")).expect("records")).expect("documents") }

fn doc(v: serde_json::Value) -> Document { v.as_object().unwrap().clone() }

async fn seeded() -> (LocalSearchService, IndexHandle) {
    let service = LocalSearchService::new();
    let handle = service.create_index(&hotel_schema()).await.expect("create");
    let result = service.merge_or_upload(&handle, &hotel_docs()).await.expect("upload");
    assert_eq!(result.succeeded_count(), 4);
    (service, handle)
}

fn ids(hits: &[hotelsearch_core::types::SearchHit]) -> Vec<String> {
    hits.iter().map(|h| h.document["HotelId"].as_str().unwrap_or_default().to_string()).collect()
}

#[tokio::test]
async fn create_count_and_delete() {
    let (service, handle) = seeded().await;
    assert_eq!(service.document_count(&handle).await.unwrap(), 4);
    assert_eq!(service.index_names().unwrap(), vec!["hotels-quickstart".to_string()]);

    let again = service.create_index(&hotel_schema()).await;
    assert!(matches!(again, Err(Error::IndexAlreadyExists(_))));

    service.delete_index("hotels-quickstart").await.expect("delete");
    assert!(matches!(service.delete_index("hotels-quickstart").await, Err(Error::IndexNotFound(_))));
    assert!(matches!(service.document_count(&handle).await, Err(Error::IndexNotFound(_))));
}

#[tokio::test]
async fn rejects_invalid_schemas() {
    let service = LocalSearchService::new();
    let no_key: IndexSchema = serde_json::from_value(json!({"name": "nokey", "fields": [{"name": "a", "type": "Edm.String"}]})).unwrap();
    let bad_name = hotel_schema().with_name("Hotels_Quickstart");
    let int_key: IndexSchema = serde_json::from_value(json!({"name": "intkey", "fields": [{"name": "a", "type": "Edm.Int32", "key": true}]})).unwrap();
    let dup: IndexSchema = serde_json::from_value(json!({"name": "dup", "fields": [
        {"name": "a", "type": "Edm.String", "key": true}, {"name": "a", "type": "Edm.String"}
    ]}))
    .unwrap();
    for schema in [no_key, bad_name, int_key, dup] {
        let err = service.create_index(&schema).await.unwrap_err();
        assert!(matches!(err, Error::InvalidSchema(_)), "{} -> {:?}", schema.name, err);
        assert_eq!(err.status(), Some(400));
    }
    assert!(service.index_names().unwrap().is_empty());
}

#[tokio::test]
async fn wildcard_search_returns_every_record_with_count() {
    let (service, handle) = seeded().await;
    let options = SearchOptions::new().select(["HotelId", "HotelName", "Rating"]).include_total_count(true);
    let results = run_query(&service, &handle, "*", options).await.expect("query");
    assert_eq!(results.total_count, Some(4));
    let hits: Vec<_> = results.into_hits().try_collect().await.expect("hits");
    assert_eq!(ids(&hits), vec!["1", "2", "3", "4"]);
    for hit in &hits {
        assert_eq!(hit.document.len(), 3, "projection keeps only selected fields");
        assert_eq!(hit.score, 1.0);
    }
}

#[tokio::test]
async fn filter_on_nested_field_sorted_by_rating_desc() {
    let (service, handle) = seeded().await;
    let extra = doc(json!({"HotelId": "5", "HotelName": "Gulf Breeze Inn", "Rating": 4.9, "Address": {"City": "Tampa", "StateProvince": "FL"}}));
    service.merge_or_upload(&handle, &[extra]).await.unwrap();

    let options = SearchOptions::new()
        .filter("Address/StateProvince eq 'FL'")
        .order_by(["Rating desc"])
        .select(["HotelId", "HotelName", "Rating", "Address/StateProvince"]);
    let page = service.search_page(&handle, &SearchRequest::new("*", options)).await.unwrap();
    assert_eq!(ids(&page.hits), vec!["5", "2"]);
    for hit in &page.hits { assert_eq!(hit.get("Address/StateProvince"), Some(&json!("FL"))); }
    let ratings: Vec<f64> = page.hits.iter().filter_map(|h| h.document["Rating"].as_f64()).collect();
    assert!(ratings.windows(2).all(|w| w[0] >= w[1]));
    assert_eq!(page.total_count, None, "count only when asked");
}

#[tokio::test]
async fn search_fields_restrict_matching() {
    let (service, handle) = seeded().await;
    let options = SearchOptions::new().search_fields(["HotelName"]).select(["HotelId", "HotelName"]);
    let page = service.search_page(&handle, &SearchRequest::new("Sublime Palace", options)).await.unwrap();
    assert_eq!(ids(&page.hits), vec!["4"]);
    assert!(page.hits[0].score > 0.0);

    // "palace" appears only in a description, which is excluded above.
    let page = service.search_page(&handle, &SearchRequest::new("palace", SearchOptions::new())).await.unwrap();
    assert_eq!(ids(&page.hits), vec!["4"]);

    let err = service
        .search_page(&handle, &SearchRequest::new("x", SearchOptions::new().search_fields(["Rating"])))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));
}

#[tokio::test]
async fn facets_are_computed_over_matching_documents() {
    let (service, handle) = seeded().await;
    let options = SearchOptions::new()
        .search_fields(["Tags"])
        .facets(["Category"])
        .select(["HotelId", "HotelName", "Category", "Tags"]);
    let page = service.search_page(&handle, &SearchRequest::new("Pool", options)).await.unwrap();
    let mut found = ids(&page.hits);
    found.sort();
    assert_eq!(found, vec!["1", "2"]);
    let category = &page.facets["Category"];
    assert_eq!(category.len(), 1);
    assert_eq!(category[0].value, json!("Boutique"));
    assert_eq!(category[0].count, 2);

    let options = SearchOptions::new().facets(["Tags,count:2"]);
    let page = service.search_page(&handle, &SearchRequest::new("*", options)).await.unwrap();
    let tags = &page.facets["Tags"];
    assert_eq!(tags.len(), 2);
    assert_eq!(tags[0].value, json!("concierge"));
    assert_eq!(tags[0].count, 3);
}

#[tokio::test]
async fn lookup_by_key() {
    let (service, handle) = seeded().await;
    let hotel = service.get_document(&handle, "3", &[]).await.expect("lookup");
    assert_eq!(hotel["HotelId"], "3");
    assert_eq!(hotel["HotelName"], "Triple Landscape Hotel");

    let projected = service.get_document(&handle, "3", &["HotelName".to_string()]).await.unwrap();
    assert_eq!(projected.len(), 1);

    let missing = service.get_document(&handle, "99", &[]).await;
    assert!(matches!(missing, Err(Error::DocumentNotFound(ref k)) if k == "99"));
}

#[tokio::test]
async fn merge_keeps_count_and_untouched_fields() {
    let (service, handle) = seeded().await;
    let result = service.merge_or_upload(&handle, &[doc(json!({"HotelId": "1", "Rating": 1.5}))]).await.unwrap();
    assert_eq!(result.results[0].status_code, 200);
    assert_eq!(service.document_count(&handle).await.unwrap(), 4);

    let hotel = service.get_document(&handle, "1", &[]).await.unwrap();
    assert_eq!(hotel["Rating"], 1.5);
    assert_eq!(hotel["HotelName"], "Secret Point Motel");

    // Re-indexed text stays searchable exactly once.
    let page = service.search_page(&handle, &SearchRequest::new("Secret", SearchOptions::new())).await.unwrap();
    assert_eq!(ids(&page.hits), vec!["1"]);
}

#[tokio::test]
async fn partial_address_merges_into_stored_address() {
    let (service, handle) = seeded().await;
    let update = doc(json!({"HotelId": "2", "Address": {"City": "Tampa"}, "Tags": ["spa"]}));
    let result = service.merge_or_upload(&handle, &[update]).await.unwrap();
    assert_eq!(result.results[0].status_code, 200);

    let hotel = service.get_document(&handle, "2", &[]).await.unwrap();
    assert_eq!(hotel["Address"]["City"], "Tampa");
    assert_eq!(hotel["Address"]["StateProvince"], "FL");
    assert_eq!(hotel["Tags"], json!(["spa"]), "collections are replaced, not merged");

    let florida = SearchRequest::new("*", SearchOptions::new().filter("Address/StateProvince eq 'FL'"));
    let page = service.search_page(&handle, &florida).await.unwrap();
    assert_eq!(ids(&page.hits), vec!["2"]);

    // The merged city is searchable, the old one is gone.
    let page = service.search_page(&handle, &SearchRequest::new("Tampa", SearchOptions::new())).await.unwrap();
    assert_eq!(ids(&page.hits), vec!["2"]);
}

#[tokio::test]
async fn unknown_nested_fields_are_rejected() {
    let (service, handle) = seeded().await;
    let batch = [doc(json!({"HotelId": "7", "Address": {"Nope": 1}})), doc(json!({"HotelId": "8", "Address": {"City": "Macon"}}))];
    let result = service.merge_or_upload(&handle, &batch).await.unwrap();
    assert!(!result.results[0].succeeded);
    assert_eq!(result.results[0].status_code, 400);
    assert_eq!(result.results[0].error_message.as_deref(), Some("unknown field 'Address/Nope'"));
    assert_eq!(result.results[1].status_code, 201);
    assert_eq!(service.document_count(&handle).await.unwrap(), 5);
    assert!(matches!(service.get_document(&handle, "7", &[]).await, Err(Error::DocumentNotFound(_))));
}

#[tokio::test]
async fn repeated_key_within_one_batch_is_staged_once() {
    let (service, handle) = seeded().await;
    let batch = [
        doc(json!({"HotelId": "6", "HotelName": "Harbor Lights Inn", "Rating": 3.0})),
        doc(json!({"HotelId": "6", "Rating": 4.1})),
    ];
    let result = service.merge_or_upload(&handle, &batch).await.unwrap();
    let codes: Vec<u16> = result.results.iter().map(|r| r.status_code).collect();
    assert_eq!(codes, vec![201, 200]);
    assert_eq!(service.document_count(&handle).await.unwrap(), 5);

    let hotel = service.get_document(&handle, "6", &[]).await.unwrap();
    assert_eq!(hotel["Rating"], 4.1);
    assert_eq!(hotel["HotelName"], "Harbor Lights Inn");
    let page = service.search_page(&handle, &SearchRequest::new("Harbor", SearchOptions::new())).await.unwrap();
    assert_eq!(ids(&page.hits), vec!["6"]);
}

#[tokio::test]
async fn bad_documents_fail_individually() {
    let (service, handle) = seeded().await;
    let batch = [doc(json!({"HotelName": "no key"})), doc(json!({"HotelId": "8", "Nope": 1})), doc(json!({"HotelId": "9"}))];
    let result = service.merge_or_upload(&handle, &batch).await.unwrap();
    assert_eq!(result.succeeded_count(), 1);
    assert_eq!(result.failed().count(), 2);
    assert!(result.failed().all(|r| r.status_code == 400));
    assert_eq!(service.document_count(&handle).await.unwrap(), 5);
}

#[tokio::test]
async fn invalid_filters_and_orderings_are_rejected() {
    let (service, handle) = seeded().await;
    let bad_filter = SearchRequest::new("*", SearchOptions::new().filter("Description eq 'x'"));
    assert!(matches!(service.search_page(&handle, &bad_filter).await, Err(Error::InvalidFilter(_))));
    let bad_order = SearchRequest::new("*", SearchOptions::new().order_by(["Tags desc"]));
    assert!(matches!(service.search_page(&handle, &bad_order).await, Err(Error::InvalidOrderBy(_))));
    let bad_select = SearchRequest::new("*", SearchOptions::new().select(["Nope"]));
    assert!(matches!(service.search_page(&handle, &bad_select).await, Err(Error::InvalidRequest(_))));
}

#[tokio::test]
async fn results_stream_across_pages() {
    let service = LocalSearchService::new();
    let schema: IndexSchema = serde_json::from_value(json!({"name": "paging", "fields": [
        {"name": "id", "type": "Edm.String", "key": true},
        {"name": "n", "type": "Edm.Int32"}
    ]}))
    .unwrap();
    let handle = service.create_index(&schema).await.unwrap();
    let docs: Vec<Document> = (0..120).map(|i| doc(json!({"id": format!("{:03}", i), "n": i}))).collect();
    service.merge_or_upload(&handle, &docs).await.unwrap();

    let first = service.search_page(&handle, &SearchRequest::new("*", SearchOptions::new())).await.unwrap();
    assert_eq!(first.hits.len(), 50);
    assert_eq!(first.next_page.as_ref().and_then(|r| r.options.skip), Some(50));

    let options = SearchOptions::new().order_by(["n desc"]).include_total_count(true);
    let results = run_query(&service, &handle, "*", options).await.unwrap();
    assert_eq!(results.total_count, Some(120));
    let hits: Vec<_> = results.into_hits().try_collect().await.unwrap();
    assert_eq!(hits.len(), 120);
    assert_eq!(hits[0].document["n"], 119);
    assert_eq!(hits[119].document["n"], 0);

    let capped = service.search_page(&handle, &SearchRequest::new("*", SearchOptions::new().top(10).skip(115))).await.unwrap();
    assert_eq!(capped.hits.len(), 5);
    assert!(capped.next_page.is_none());
}
