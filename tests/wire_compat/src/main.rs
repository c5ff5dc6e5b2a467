fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use boxkit_protocol::*;
    use boxkit_transfer::reconcile;

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Normalizes JSON numbers so that `65` and `65.0` compare as equal.
    fn normalize_value(v: &serde_json::Value) -> serde_json::Value {
        match v {
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => serde_json::json!(f),
                None => v.clone(),
            },
            serde_json::Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), normalize_value(v)))
                    .collect(),
            ),
            serde_json::Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(normalize_value).collect())
            }
            _ => v.clone(),
        }
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values (order-independent, number-normalized comparison).
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            normalize_value(&fixture),
            normalize_value(&reserialized),
            "roundtrip mismatch for {name}:\n  API:  {fixture}\n  Rust: {reserialized}"
        );
        parsed
    }

    // --- Session lifecycle ---

    #[test]
    fn fixture_create_session_request() {
        let req: CreateUploadSessionRequest = roundtrip_test("create_session_request.json");
        assert_eq!(req.folder_id.as_deref(), Some("0"));
    }

    #[test]
    fn fixture_upload_session() {
        let info: UploadSessionInfo = roundtrip_test("upload_session.json");
        assert_eq!(info.total_parts, 5);
        assert_eq!(info.part_size, 8_388_608);
        let endpoints = info.session_endpoints.unwrap();
        assert!(endpoints.list_parts.ends_with("/parts"));
    }

    #[test]
    fn fixture_upload_part_response() {
        let resp: UploadPartResponse = roundtrip_test("upload_part_response.json");
        assert_eq!(resp.part.end(), 16_777_216 + 3_222_784);
    }

    #[test]
    fn fixture_parts_page() {
        let page: PartsPage = roundtrip_test("parts_page.json");
        assert_eq!(page.entries.len(), 2);
        assert_eq!(page.limit, Some(2));
    }

    #[test]
    fn fixture_commit_request() {
        let req: CommitRequest = roundtrip_test("commit_request.json");
        assert_eq!(req.parts[1].offset, 8_388_608);
        assert!(req.attributes.is_some());
    }

    #[test]
    fn fixture_file_collection() {
        let files: FileCollection = roundtrip_test("file_collection.json");
        let file = &files.entries[0];
        assert_eq!(file.name, "video.mp4");
        assert_eq!(file.parent.as_ref().unwrap().name, "All Files");
    }

    #[test]
    fn fixture_api_error() {
        let err: ApiErrorBody = roundtrip_test("api_error.json");
        assert_eq!(err.status, 416);
        assert_eq!(err.code, "range_not_satisfiable");
    }

    #[test]
    fn fixture_upload_progress() {
        let progress: UploadProgress = roundtrip_test("upload_progress.json");
        assert_eq!(progress.status, UploadStatus::InProgress);
        assert!((progress.percentage() - 40.0).abs() < 1e-9);
    }

    // --- Listings fed to resume reconciliation ---

    #[test]
    fn listed_parts_reconcile_against_in_flight_part() {
        let page: PartsPage = serde_json::from_value(load_fixture("parts_page.json")).unwrap();

        let landed = reconcile(Some(8_388_608), &page.entries);
        assert_eq!(landed.committed.len(), 2);
        assert!(landed.in_flight_landed);

        let pending = reconcile(Some(16_777_216), &page.entries);
        assert_eq!(pending.committed.len(), 2);
        assert!(!pending.in_flight_landed);
    }

    // --- Minimal payloads ---

    #[test]
    fn minimal_session_without_endpoints() {
        let json = r#"{"id":"S","total_parts":1,"part_size":1024}"#;
        let info: UploadSessionInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.kind, "upload_session");
        assert!(info.session_endpoints.is_none());
    }

    #[test]
    fn minimal_part_without_sha1() {
        let json = r#"{"part_id":"P","offset":0,"size":10}"#;
        let part: UploadPart = serde_json::from_str(json).unwrap();
        assert!(part.sha1.is_empty());
        assert_eq!(serde_json::to_string(&part).unwrap(), json);
    }
}
