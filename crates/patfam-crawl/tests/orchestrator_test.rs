//! Integration tests for the crawl orchestrator: duplicate coalescing,
//! retry/backoff with an injected clock, dead-letter reporting, and
//! record forwarding.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use patfam_core::config::CrawlConfig;
use patfam_core::errors::{CrawlError, PatfamError, PatfamResult};
use patfam_core::job::{CrawlQuery, JobState};
use patfam_core::record::{LegalStatus, RawRecord, Source};
use patfam_core::traits::{IClock, ICrawler, IRecordSink};

use patfam_crawl::{MemoryQueue, Orchestrator, SearchSpec};

/// Manually advanced clock.
struct TestClock {
    now: Mutex<DateTime<Utc>>,
}

impl TestClock {
    fn at_epoch() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()),
        }
    }

    fn advance(&self, delta: Duration) {
        *self.now.lock().unwrap() += delta;
    }
}

impl IClock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Sink that remembers everything it accepted.
#[derive(Default)]
struct CollectingSink {
    records: Mutex<Vec<RawRecord>>,
}

impl IRecordSink for CollectingSink {
    fn accept(&self, record: RawRecord) -> PatfamResult<()> {
        self.records.lock().unwrap().push(record);
        Ok(())
    }
}

/// Crawler scripted to fail N times before succeeding.
struct FlakyCrawler {
    source: Source,
    failures_before_success: u32,
    calls: AtomicU32,
    emit: Vec<RawRecord>,
}

impl ICrawler for FlakyCrawler {
    fn source(&self) -> Source {
        self.source
    }

    fn fetch(&self, _query: &CrawlQuery) -> Result<Vec<RawRecord>, CrawlError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures_before_success {
            Err(CrawlError::transient("rate limited"))
        } else {
            Ok(self.emit.clone())
        }
    }
}

fn record(source: Source, publication: &str) -> RawRecord {
    RawRecord {
        source,
        jurisdiction: "US".to_string(),
        application_number: format!("APP-{publication}"),
        publication_number: publication.to_string(),
        priority_numbers: BTreeSet::new(),
        title: "Crystalline form of darolutamide".to_string(),
        inventors: vec!["A. Example".to_string()],
        filing_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        grant_date: None,
        legal_status: LegalStatus::Pending,
        family_hint_id: None,
        fetched_at: Utc::now(),
    }
}

fn setup(
    crawler: Arc<dyn ICrawler>,
    config: CrawlConfig,
) -> (Orchestrator, Arc<CollectingSink>, Arc<TestClock>) {
    let queue = Arc::new(MemoryQueue::new());
    let sink = Arc::new(CollectingSink::default());
    let clock = Arc::new(TestClock::at_epoch());
    let mut orch = Orchestrator::new(queue, sink.clone(), clock.clone(), config);
    orch.register_crawler(crawler);
    (orch, sink, clock)
}

#[test]
fn duplicate_submit_returns_existing_handle() {
    let crawler = Arc::new(FlakyCrawler {
        source: Source::Aggregator,
        failures_before_success: 0,
        calls: AtomicU32::new(0),
        emit: vec![],
    });
    let (orch, _, _) = setup(crawler, CrawlConfig::default());

    let a = orch.submit(Source::Aggregator, CrawlQuery::new("olaparib", "primary")).unwrap();
    let b = orch.submit(Source::Aggregator, CrawlQuery::new("olaparib", "primary")).unwrap();
    assert_eq!(a, b, "second submit must coalesce into the first job");
    assert_eq!(orch.queue().depth(Source::Aggregator), 1);
}

#[test]
fn same_query_may_run_again_after_completion() {
    let crawler = Arc::new(FlakyCrawler {
        source: Source::Aggregator,
        failures_before_success: 0,
        calls: AtomicU32::new(0),
        emit: vec![],
    });
    let (orch, _, _) = setup(crawler, CrawlConfig::default());

    let a = orch.submit(Source::Aggregator, CrawlQuery::new("olaparib", "primary")).unwrap();
    orch.drain_eligible().unwrap();
    let b = orch.submit(Source::Aggregator, CrawlQuery::new("olaparib", "primary")).unwrap();
    assert_ne!(a.job_id, b.job_id, "completed job no longer blocks resubmission");
}

#[test]
fn successful_fetch_forwards_records_to_sink() {
    let crawler = Arc::new(FlakyCrawler {
        source: Source::NationalOffice,
        failures_before_success: 0,
        calls: AtomicU32::new(0),
        emit: vec![record(Source::NationalOffice, "BR112017027822")],
    });
    let (orch, sink, _) = setup(crawler, CrawlConfig::default());

    orch.submit(Source::NationalOffice, CrawlQuery::new("darolutamide", "primary")).unwrap();
    assert_eq!(orch.drain_eligible().unwrap(), 1);
    let records = sink.records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].publication_number, "BR112017027822");

    let status = orch.status().source(Source::NationalOffice);
    assert_eq!(status.jobs_completed, 1);
    assert_eq!(status.records_emitted, 1);
    assert!(status.last_success_at.is_some());
}

#[test]
fn transient_failures_back_off_then_succeed() {
    let crawler = Arc::new(FlakyCrawler {
        source: Source::Aggregator,
        failures_before_success: 2,
        calls: AtomicU32::new(0),
        emit: vec![record(Source::Aggregator, "US123")],
    });
    let config = CrawlConfig {
        base_delay_ms: 1_000,
        max_delay_ms: 60_000,
        max_attempts: 5,
        ..CrawlConfig::default()
    };
    let (orch, sink, clock) = setup(crawler, config);

    orch.submit(Source::Aggregator, CrawlQuery::new("apixaban", "primary")).unwrap();

    // First attempt fails and reschedules; the job is not yet eligible.
    assert_eq!(orch.drain_eligible().unwrap(), 1);
    assert_eq!(orch.drain_eligible().unwrap(), 0, "job must wait out its backoff");

    // Advance past the first backoff (1s + jitter), second failure.
    clock.advance(Duration::seconds(2));
    assert_eq!(orch.drain_eligible().unwrap(), 1);

    // Advance past the second backoff (2s + jitter), success.
    clock.advance(Duration::seconds(3));
    assert_eq!(orch.drain_eligible().unwrap(), 1);
    assert_eq!(sink.records.lock().unwrap().len(), 1);
    assert_eq!(orch.queue().dead_letter_count(), 0);
}

#[test]
fn exhausted_transient_retries_dead_letter_and_report() {
    let crawler = Arc::new(FlakyCrawler {
        source: Source::IntlOffice,
        failures_before_success: u32::MAX,
        calls: AtomicU32::new(0),
        emit: vec![],
    });
    let config = CrawlConfig {
        base_delay_ms: 100,
        max_delay_ms: 1_000,
        max_attempts: 3,
        ..CrawlConfig::default()
    };
    let (orch, _, clock) = setup(crawler, config);

    orch.submit(Source::IntlOffice, CrawlQuery::new("venetoclax", "primary")).unwrap();
    for _ in 0..5 {
        orch.drain_eligible().unwrap();
        clock.advance(Duration::seconds(5));
    }

    let dead = orch.queue().dead_letters();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].state, JobState::DeadLetter);
    assert_eq!(dead[0].attempt_count, 3);
    let reason = dead[0].failure_reason.as_deref().unwrap();
    assert!(reason.contains("exhausted after 3 attempts"), "got: {reason}");
    assert!(reason.contains("rate limited"));
    assert_eq!(orch.status().source(Source::IntlOffice).jobs_dead_lettered, 1);

    // Dead-lettered jobs are never retried again.
    clock.advance(Duration::minutes(10));
    assert_eq!(orch.drain_eligible().unwrap(), 0);
}

#[test]
fn permanent_failure_skips_retries() {
    struct PermanentCrawler;
    impl ICrawler for PermanentCrawler {
        fn source(&self) -> Source {
            Source::NationalOffice
        }
        fn fetch(&self, _query: &CrawlQuery) -> Result<Vec<RawRecord>, CrawlError> {
            Err(CrawlError::permanent("malformed query"))
        }
    }

    let (orch, _, _) = setup(Arc::new(PermanentCrawler), CrawlConfig::default());
    orch.submit(Source::NationalOffice, CrawlQuery::new("??", "primary")).unwrap();
    orch.drain_eligible().unwrap();

    let dead = orch.queue().dead_letters();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].attempt_count, 1, "no retries for permanent failures");
}

#[test]
fn cancel_removes_queued_job() {
    let crawler = Arc::new(FlakyCrawler {
        source: Source::Aggregator,
        failures_before_success: 0,
        calls: AtomicU32::new(0),
        emit: vec![],
    });
    let (orch, _, _) = setup(crawler, CrawlConfig::default());

    let handle = orch.submit(Source::Aggregator, CrawlQuery::new("niraparib", "primary")).unwrap();
    assert!(orch.cancel(&handle).unwrap());
    assert_eq!(orch.drain_eligible().unwrap(), 0);

    // After cancellation the key is free again.
    let again = orch.submit(Source::Aggregator, CrawlQuery::new("niraparib", "primary")).unwrap();
    assert_ne!(handle.job_id, again.job_id);
}

#[test]
fn malformed_records_do_not_affect_siblings() {
    let mut bad = record(Source::Aggregator, "US999");
    bad.title = String::new();
    let good = record(Source::Aggregator, "US123");

    struct ValidatingSink {
        accepted: Mutex<Vec<RawRecord>>,
    }
    impl IRecordSink for ValidatingSink {
        fn accept(&self, record: RawRecord) -> PatfamResult<()> {
            record.validate(Utc::now())?;
            self.accepted.lock().unwrap().push(record);
            Ok(())
        }
    }

    let crawler = Arc::new(FlakyCrawler {
        source: Source::Aggregator,
        failures_before_success: 0,
        calls: AtomicU32::new(0),
        emit: vec![bad, good],
    });
    let queue = Arc::new(MemoryQueue::new());
    let sink = Arc::new(ValidatingSink {
        accepted: Mutex::new(vec![]),
    });
    let clock = Arc::new(TestClock::at_epoch());
    let mut orch = Orchestrator::new(queue, sink.clone(), clock, CrawlConfig::default());
    orch.register_crawler(crawler);

    orch.submit(Source::Aggregator, CrawlQuery::new("apixaban", "primary")).unwrap();
    orch.drain_eligible().unwrap();

    let accepted = sink.accepted.lock().unwrap();
    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted[0].publication_number, "US123");
}

#[test]
fn every_strategy_query_gets_its_own_job() {
    let crawler = Arc::new(FlakyCrawler {
        source: Source::Aggregator,
        failures_before_success: 0,
        calls: AtomicU32::new(0),
        emit: vec![],
    });
    let (orch, _, _) = setup(crawler, CrawlConfig::default());

    let handles = orch.submit_search(&SearchSpec::for_compound("darolutamide")).unwrap();
    let ids: BTreeSet<String> = handles.iter().map(|h| h.job_id.clone()).collect();
    assert_eq!(ids.len(), handles.len(), "no strategy query may coalesce into another");
    assert_eq!(handles.len(), 1 + 5 + 1 + 8 + 10);
    assert_eq!(orch.queue().depth(Source::Aggregator), handles.len());
}

#[test]
fn job_for_an_unregistered_source_dead_letters() {
    let crawler = Arc::new(FlakyCrawler {
        source: Source::Aggregator,
        failures_before_success: 0,
        calls: AtomicU32::new(0),
        emit: vec![],
    });
    let (orch, _, _) = setup(crawler, CrawlConfig::default());

    orch.submit(Source::IntlOffice, CrawlQuery::new("olaparib", "primary")).unwrap();
    let err = orch.run_once(Source::IntlOffice).unwrap_err();
    match err {
        PatfamError::Crawl(CrawlError::UnknownSource { name }) => {
            assert_eq!(name, Source::IntlOffice.to_string());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(orch.queue().dead_letter_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn workers_run_jobs_off_the_runtime_threads() {
    let crawler = Arc::new(FlakyCrawler {
        source: Source::Aggregator,
        failures_before_success: 0,
        calls: AtomicU32::new(0),
        emit: vec![record(Source::Aggregator, "US123")],
    });
    let config = CrawlConfig {
        workers_per_source: 1,
        poll_interval_ms: 5,
        ..CrawlConfig::default()
    };
    let (orch, sink, _) = setup(crawler, config);
    let orch = Arc::new(orch);

    orch.submit(Source::Aggregator, CrawlQuery::new("apixaban", "primary")).unwrap();
    let workers = orch.spawn_workers();

    for _ in 0..200 {
        if !sink.records.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    orch.shutdown();
    for worker in workers {
        worker.await.unwrap();
    }
    assert_eq!(sink.records.lock().unwrap().len(), 1);
}
