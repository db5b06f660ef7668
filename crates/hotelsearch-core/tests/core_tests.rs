use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use figment::Jail;
use hotelsearch_core::config::{resolve_with_base, Config};
use hotelsearch_core::dataset::{load_records, load_schema, unique_keys};
use hotelsearch_core::types::{lookup_path, Flag, Hotel};
use hotelsearch_core::Error;

fn data_dir() -> PathBuf {
    // crates/hotelsearch-core -> crates -> repo root
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).ancestors().nth(2).unwrap().join("data")
}

#[test]
fn bundled_schema_declares_key_and_nested_fields() {
    let schema = load_schema(&data_dir().join("hotels_quickstart_index.json")).expect("schema");
    assert_eq!(schema.name, "hotels-quickstart");
    assert_eq!(schema.key_field().map(|f| f.name.as_str()), Some("HotelId"));

    let state = schema.field_at("Address/StateProvince").expect("nested field");
    assert!(state.is_filterable());
    assert!(schema.field_at("Address/Nope").is_none());

    let searchable = schema.searchable_paths();
    assert!(searchable.contains(&"Tags".to_string()));
    assert!(searchable.contains(&"Address/City".to_string()));
    assert!(!searchable.contains(&"Rating".to_string()));
    assert_eq!(schema.suggesters[0].source_fields, vec!["HotelName"]);
}

#[test]
fn schema_passes_unknown_properties_through() {
    let raw = r#"{"name":"x","fields":[{"name":"id","type":"Edm.String","key":true,"normalizer":"lowercase"}],"corsOptions":{"allowedOrigins":["*"]}}"#;
    let schema: hotelsearch_core::types::IndexSchema = serde_json::from_str(raw).unwrap();
    let back = serde_json::to_value(&schema).unwrap();
    assert_eq!(back["corsOptions"]["allowedOrigins"][0], "*");
    assert_eq!(back["fields"][0]["normalizer"], "lowercase");
    assert!(back["fields"][0].get("searchable").is_none(), "unset attributes stay unset");
}

#[test]
fn bundled_records_have_unique_keys() {
    let records = load_records(&data_dir().join("hotels.json")).expect("records");
    assert_eq!(records.len(), 4);
    assert_eq!(unique_keys(&records), 4);
    let twin_dome = records.iter().find(|h| h.hotel_id == "2").unwrap();
    assert_eq!(twin_dome.address.as_ref().and_then(|a| a.state_province.as_deref()), Some("FL"));
}

#[test]
fn records_accept_wrapped_form_and_string_flags() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("records.json");
    fs::write(&path, r#"{"value":[{"HotelId":"9","ParkingIncluded":"true"},{"HotelId":"9","Rating":2.5}]}"#).unwrap();

    let records = load_records(&path).expect("wrapped records");
    assert_eq!(records.len(), 2);
    assert_eq!(unique_keys(&records), 1);
    assert_eq!(records[0].parking_included, Some(Flag::Text("true".to_string())));
    assert_eq!(records[0].parking_included.as_ref().and_then(Flag::as_bool), Some(true));
}

#[test]
fn malformed_and_missing_inputs_are_errors() {
    let tmp = TempDir::new().unwrap();
    let bad = tmp.path().join("bad.json");
    fs::write(&bad, "[{\"HotelName\": \"no key\"}]").unwrap();
    assert!(matches!(load_records(&bad), Err(Error::Json(_))));
    assert!(matches!(load_schema(&tmp.path().join("missing.json")), Err(Error::Io(_))));
}

#[test]
fn hotel_documents_omit_unset_fields() {
    let hotel = Hotel {
        hotel_id: "7".to_string(), hotel_name: Some("Pier".to_string()), description: None, description_fr: None,
        category: None, tags: None, parking_included: Some(Flag::Bool(false)), last_renovation_date: None,
        rating: Some(4.0), address: None,
    };
    let doc = hotel.to_document().unwrap();
    assert_eq!(doc.len(), 4);
    assert_eq!(doc["HotelId"], "7");
    assert_eq!(doc["ParkingIncluded"], false);
    assert_eq!(Hotel::from_document(&doc).unwrap(), hotel);
}

#[test]
fn lookup_path_walks_nested_objects() {
    let doc = serde_json::json!({"Address": {"City": "Sarasota"}, "Rating": 3.6});
    let doc = doc.as_object().unwrap();
    assert_eq!(lookup_path(doc, "Address/City").and_then(|v| v.as_str()), Some("Sarasota"));
    assert!(lookup_path(doc, "Rating/Nope").is_none());
}

#[test]
fn config_defaults_then_toml_then_env() {
    Jail::expect_with(|jail| {
        jail.clear_env();
        let dir = jail.directory().to_path_buf();

        let defaults = Config::load_from(&dir, "dev").map_err(|e| e.to_string())?.settings().map_err(|e| e.to_string())?;
        assert_eq!(defaults.upload.batch_size, 1000);
        assert_eq!(defaults.search.index_name, None);

        jail.create_file("config.toml", "[search]\nindex_name = \"from-toml\"\n[upload]\nbatch_size = 50\n")?;
        jail.create_file("config.test.toml", "[consistency]\npoll_interval_ms = 0\n")?;
        jail.set_env("APP_UPLOAD__BATCH_SIZE", "7");

        let config = Config::load_from(&dir, "test").map_err(|e| e.to_string())?;
        let settings = config.settings().map_err(|e| e.to_string())?;
        assert_eq!(settings.search.index_name.as_deref(), Some("from-toml"));
        assert_eq!(settings.upload.batch_size, 7);
        assert_eq!(settings.consistency.poll_interval_ms, 0);
        assert_eq!(settings.consistency.max_polls, 10);
        let batch: usize = config.get("upload.batch_size").map_err(|e| e.to_string())?;
        assert_eq!(batch, 7);
        Ok(())
    });
}

#[test]
fn config_rejects_zero_batch_size() {
    Jail::expect_with(|jail| {
        jail.clear_env();
        jail.set_env("APP_UPLOAD__BATCH_SIZE", "0");
        let result = Config::load_from(jail.directory(), "dev");
        assert!(matches!(result, Err(Error::Config(_))));
        Ok(())
    });
}

#[test]
fn credentials_require_endpoint_and_key() {
    Jail::expect_with(|jail| {
        jail.clear_env();
        let config = Config::load_from(jail.directory(), "dev").map_err(|e| e.to_string())?;
        assert!(matches!(config.credentials(), Err(Error::ConfigurationMissing(_))));

        jail.set_env("SEARCH_API_ENDPOINT", "https://example.search.windows.net");
        jail.set_env("SEARCH_API_KEY", "   ");
        assert!(matches!(config.credentials(), Err(Error::ConfigurationMissing(_))));

        jail.set_env("SEARCH_API_KEY", "secret");
        let creds = config.credentials().map_err(|e| e.to_string())?;
        assert_eq!(creds.endpoint, "https://example.search.windows.net");
        assert!(!format!("{:?}", creds).contains("secret"));
        Ok(())
    });
}

#[test]
fn relative_paths_resolve_against_base() {
    let base = PathBuf::from("/srv/app");
    assert_eq!(resolve_with_base(&base, "data/hotels.json"), PathBuf::from("/srv/app/data/hotels.json"));
    assert_eq!(resolve_with_base(&base, "/abs/hotels.json"), PathBuf::from("/abs/hotels.json"));
}
