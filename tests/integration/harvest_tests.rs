//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for the search API and run the full
//! harvest cycle end-to-end: bisection, backoff, checkpointing and export.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use window_harvest::config::{
    load_config_with_hash, ApiConfig, Config, CrawlConfig, OutputConfig, SaturationConfig,
    UserAgentConfig,
};
use window_harvest::crawler::{run_crawl, Coordinator, ShutdownCoordinator, StopReason};
use window_harvest::storage::{
    open_storage, Record, RecordStore, RunRecord, RunStatus, RunTotals, SharedStore,
    SqliteStorage, StorageError, StorageResult,
};
use window_harvest::HarvestError;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// A search endpoint backed by an in-memory list of publication times
///
/// Like the real API it serves newest first and refuses to paginate past
/// `page_cap` pages, whatever `found` says.
struct DatasetApi {
    published: Vec<DateTime<Utc>>,
    page_cap: usize,
}

impl Respond for DatasetApi {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let params: HashMap<String, String> = request.url.query_pairs().into_owned().collect();
        let parse = |key: &str| {
            DateTime::parse_from_rfc3339(&params[key])
                .expect("bad date param")
                .with_timezone(&Utc)
        };
        let (from, to) = (parse("date_from"), parse("date_to"));
        let page: usize = params["page"].parse().unwrap();
        let per_page: usize = params["per_page"].parse().unwrap();

        let mut matching: Vec<(usize, DateTime<Utc>)> = self
            .published
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, t)| from <= *t && *t < to)
            .collect();
        matching.sort_by(|a, b| b.1.cmp(&a.1));

        let reachable = matching.len().min(per_page * self.page_cap);
        let start = (page * per_page).min(reachable);
        let end = (start + per_page).min(reachable);
        let items: Vec<_> = matching[start..end]
            .iter()
            .map(|(i, t)| {
                json!({
                    "id": (1000 + i).to_string(),
                    "name": format!("Vacancy {}", i),
                    "published_at": t.to_rfc3339(),
                    "salary": {"from": 100 * i, "currency": "RUR"},
                })
            })
            .collect();

        ResponseTemplate::new(200).set_body_json(json!({
            "items": items,
            "found": matching.len(),
            "pages": reachable.div_ceil(per_page),
            "page": page,
            "per_page": per_page,
        }))
    }
}

/// SQLite store whose disk fills up after a number of inserts
struct FillingStore {
    inner: SqliteStorage,
    inserts_left: usize,
}

impl RecordStore for FillingStore {
    fn insert_many(&mut self, records: &[Record]) -> StorageResult<usize> {
        if self.inserts_left == 0 {
            return Err(StorageError::Sqlite(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_FULL),
                Some("database or disk is full".to_string()),
            )));
        }
        self.inserts_left -= 1;
        self.inner.insert_many(records)
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn contains_identity(&self, identity: &str) -> StorageResult<bool> {
        self.inner.contains_identity(identity)
    }

    fn snapshot_all(&self) -> StorageResult<Vec<Record>> {
        self.inner.snapshot_all()
    }

    fn create_run(&mut self, config_hash: &str, target: u64) -> StorageResult<i64> {
        self.inner.create_run(config_hash, target)
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        totals: &RunTotals,
    ) -> StorageResult<()> {
        self.inner.finish_run(run_id, status, totals)
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.inner.get_run(run_id)
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        self.inner.get_latest_run()
    }

    fn count_runs(&self) -> StorageResult<u64> {
        self.inner.count_runs()
    }
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn hourly(count: i64) -> Vec<DateTime<Utc>> {
    (0..count).map(|h| start() + Duration::hours(h)).collect()
}

/// Creates a test configuration scanning two days against `base_url`
fn create_test_config(base_url: &str, dir: &Path) -> Config {
    Config {
        api: ApiConfig {
            base_url: format!("{}/vacancies", base_url),
            area: 40,
            per_page: 5,
            order_by: "publication_time".to_string(),
            request_timeout_secs: 5,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestHarvester".to_string(),
            crawler_version: "1.0".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        crawl: CrawlConfig {
            target: 10_000,
            lookback_days: 30,
            range_from: Some(start()),
            range_to: Some(start() + Duration::days(2)),
            min_window_minutes: 30,
            pacing_delay_ms: 0,
            rate_limit_cooldown_ms: 5,
            ban_cooldown_ms: 5,
            max_page_retries: 2,
        },
        saturation: SaturationConfig {
            max_found: 20,
            max_pages: 4,
        },
        output: OutputConfig {
            database_path: dir.join("harvest.db").to_string_lossy().into_owned(),
            export_path: dir.join("harvest.csv").to_string_lossy().into_owned(),
        },
    }
}

fn coordinator(config: Config) -> Coordinator {
    Coordinator::new(
        config,
        "test-hash".to_string(),
        Arc::new(ShutdownCoordinator::new()),
    )
    .unwrap()
}

async fn mount_dataset(server: &MockServer, published: Vec<DateTime<Utc>>) {
    Mock::given(method("GET"))
        .and(path("/vacancies"))
        .respond_with(DatasetApi {
            published,
            page_cap: 4,
        })
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_harvest_bisects_and_exports() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vacancies"))
        .and(query_param("area", "40"))
        .and(query_param("order_by", "publication_time"))
        .and(header(
            "user-agent",
            "TestHarvester/1.0 (contact: test@example.com)",
        ))
        .respond_with(DatasetApi {
            published: hourly(48),
            page_cap: 4,
        })
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path());

    let outcome = coordinator(config.clone()).run().await.unwrap();

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.report.stop_reason, StopReason::QueueExhausted);
    assert_eq!(outcome.report.store_size, 48);
    assert_eq!(outcome.report.dropped, 0);
    assert!(outcome.report.split >= 3);
    assert_eq!(outcome.export.rows, 48);
    assert_eq!(outcome.export.columns, 4);

    let mut reader = csv::Reader::from_path(&config.output.export_path).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(headers, vec!["id", "name", "published_at", "salary"]);
    assert_eq!(reader.records().count(), 48);
}

#[tokio::test]
async fn test_rate_limited_requests_lose_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vacancies"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(3)
        .mount(&server)
        .await;
    mount_dataset(&server, hourly(48)).await;
    let dir = TempDir::new().unwrap();

    let outcome = coordinator(create_test_config(&server.uri(), dir.path()))
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.report.rate_limited, 3);
    assert_eq!(outcome.report.store_size, 48);
    assert_eq!(outcome.report.dropped, 0);
}

#[tokio::test]
async fn test_temporary_ban_is_waited_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vacancies"))
        .respond_with(ResponseTemplate::new(403))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_dataset(&server, hourly(10)).await;
    let dir = TempDir::new().unwrap();

    let outcome = coordinator(create_test_config(&server.uri(), dir.path()))
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.report.banned, 1);
    assert_eq!(outcome.report.store_size, 10);
}

#[tokio::test]
async fn test_server_errors_drop_windows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vacancies"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path());

    let outcome = coordinator(config.clone()).run().await.unwrap();

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.report.dropped, 1);
    assert_eq!(outcome.report.store_size, 0);
    assert_eq!(outcome.export.rows, 0);
    assert!(Path::new(&config.output.export_path).exists());
}

#[tokio::test]
async fn test_malformed_body_drops_window() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vacancies"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();

    let outcome = coordinator(create_test_config(&server.uri(), dir.path()))
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.report.dropped, 1);
    assert_eq!(outcome.report.store_size, 0);
}

#[tokio::test]
async fn test_target_stops_harvest_early() {
    let server = MockServer::start().await;
    mount_dataset(&server, hourly(48)).await;
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server.uri(), dir.path());
    config.crawl.target = 12;

    let outcome = coordinator(config).run().await.unwrap();

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.report.stop_reason, StopReason::TargetReached);
    assert!(outcome.report.store_size >= 12);
    assert!(outcome.report.store_size < 48);
    assert!(outcome.report.undrained_windows > 0);
}

#[tokio::test]
async fn test_store_failure_records_partial_totals() {
    let server = MockServer::start().await;
    mount_dataset(&server, hourly(48)).await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path());
    let store: SharedStore = Arc::new(Mutex::new(FillingStore {
        inner: SqliteStorage::new_in_memory().unwrap(),
        inserts_left: 1,
    }));

    let result = Coordinator::with_store(
        config.clone(),
        "test-hash".to_string(),
        store.clone(),
        Arc::new(ShutdownCoordinator::new()),
    )
    .run()
    .await;

    assert!(matches!(result, Err(HarvestError::Storage(_))));

    let store = store.lock().unwrap();
    let run = store.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.totals.split_windows, 2);
    assert_eq!(run.totals.drained_windows, 0);
    assert_eq!(run.totals.records_inserted, 5);
    assert_eq!(store.size().unwrap(), 5);

    let mut reader = csv::Reader::from_path(&config.output.export_path).unwrap();
    assert_eq!(reader.records().count(), 5);
}

#[tokio::test]
async fn test_rerun_resumes_from_checkpoint() {
    let server = MockServer::start().await;
    mount_dataset(&server, hourly(48)).await;
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server.uri(), dir.path());
    config.crawl.target = 12;

    let first = coordinator(config.clone()).run().await.unwrap();
    config.crawl.target = 10_000;
    let second = coordinator(config.clone()).run().await.unwrap();
    let third = coordinator(config.clone()).run().await.unwrap();

    assert_eq!(
        first.report.records_inserted + second.report.records_inserted,
        48
    );
    assert_eq!(second.report.store_size, 48);
    assert_eq!(third.report.records_inserted, 0);

    let storage = open_storage(Path::new(&config.output.database_path)).unwrap();
    assert_eq!(storage.size().unwrap(), 48);
    assert_eq!(storage.count_runs().unwrap(), 3);
}

#[tokio::test]
async fn test_harvest_from_config_file() {
    let server = MockServer::start().await;
    mount_dataset(&server, hourly(6)).await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("harvest.db");
    let export_path = dir.path().join("out.csv");

    let config_path = dir.path().join("harvest.toml");
    let mut file = std::fs::File::create(&config_path).unwrap();
    write!(
        file,
        r#"
[api]
base-url = "{}/vacancies"
area = 40
per-page = 5

[user-agent]
crawler-name = "TestHarvester"
crawler-version = "1.0"
contact-email = "test@example.com"

[crawl]
target = 100
range-from = "2024-01-01T00:00:00Z"
range-to = "2024-01-02T00:00:00Z"
min-window-minutes = 30
pacing-delay-ms = 0
rate-limit-cooldown-ms = 5
ban-cooldown-ms = 5

[saturation]
max-found = 2000
max-pages = 20

[output]
database-path = "{}"
export-path = "{}"
"#,
        server.uri(),
        db_path.display(),
        export_path.display()
    )
    .unwrap();
    drop(file);

    let (config, hash) = load_config_with_hash(&config_path).unwrap();
    let outcome = run_crawl(config, hash.clone()).await.unwrap();

    assert_eq!(outcome.report.store_size, 6);
    assert_eq!(outcome.report.split, 0);
    assert_eq!(outcome.export.rows, 6);

    let storage = open_storage(&db_path).unwrap();
    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.config_hash, hash);
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.totals.drained_windows, 1);
}
