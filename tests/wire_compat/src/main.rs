fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use nasferry_protocol::{BulkZipRequest, JobCreated, ProgressReading, ZipProgress};

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

    /// Deserializes a fixture, re-serializes it and compares the JSON values.
    /// Returns the parsed value for further checks.
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
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  server: {fixture}\n  client: {reserialized}"
        );
        parsed
    }

    #[test]
    fn fixture_job_created() {
        let created: JobCreated = roundtrip_test("job_created.json");
        assert_eq!(created.job_id.as_str(), "6f1c2e4a-93b7-4d1e-9a55-2c0e8f7d1b30");
    }

    #[test]
    fn fixture_zip_progress_running() {
        let progress: ZipProgress = roundtrip_test("zip_progress.json");
        assert_eq!(progress.reading(), ProgressReading::Running(45));
    }

    #[test]
    fn fixture_zip_progress_done() {
        let progress: ZipProgress = roundtrip_test("zip_progress_done.json");
        assert_eq!(progress.reading(), ProgressReading::Ready);
    }

    #[test]
    fn fixture_zip_progress_failed() {
        let progress: ZipProgress = roundtrip_test("zip_progress_failed.json");
        assert_eq!(progress.reading(), ProgressReading::Failed);
    }

    #[test]
    fn fixture_bulk_zip_request() {
        let request: BulkZipRequest = roundtrip_test("bulk_zip_request.json");
        assert_eq!(request.paths.len(), 3);
    }

    #[test]
    fn job_created_ignores_extra_fields() {
        let created: JobCreated =
            serde_json::from_str(r#"{"job_id": "abc", "status": "queued"}"#).unwrap();
        assert_eq!(created.job_id.as_str(), "abc");
    }
}
