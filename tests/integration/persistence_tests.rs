use super::*;
use stock_watcher::sinks::CsvLog;
use stock_watcher::{CycleScheduler, ScheduleConfig};
use tokio::sync::watch;

struct BrokenLog;

#[async_trait]
impl ResultSink for BrokenLog {
    fn name(&self) -> &str {
        "broken"
    }

    fn is_persistent(&self) -> bool {
        true
    }

    async fn record(&self, _result: &CycleResult) -> stock_watcher::Result<()> {
        Err(AppError::Persistence {
            path: "/dev/full".to_string(),
            message: "No space left on device".to_string(),
        })
    }
}

fn factory() -> ScriptedFactory {
    ScriptedFactory::new().product(
        "https://shop.example.com/p/1",
        ProductScript::new("Widget", "$10").code("A", CodeScript::InStock),
    )
}

fn schedule(max_cycles: u32) -> ScheduleConfig {
    ScheduleConfig {
        products: vec!["https://shop.example.com/p/1".to_string()],
        codes: codes(&["A"]),
        max_cycles: Some(max_cycles),
        inter_cycle_delay: Duration::ZERO,
    }
}

#[tokio::test]
async fn test_persistence_failure_is_counted_and_run_continues() -> anyhow::Result<()> {
    let (aggregator, _stats) = build_aggregator(factory(), Arc::new(RecordingNotifier::default()));
    let recorder = Arc::new(RecordingSink::default());

    let scheduler = CycleScheduler::new(schedule(3), aggregator)
        .with_sink(Arc::new(BrokenLog))
        .with_sink(recorder.clone());
    let (_tx, rx) = watch::channel(false);
    let summary = scheduler.run(rx).await?;

    assert_eq!(summary.cycles_completed, 3);
    assert_eq!(summary.persistence_failures, 3);
    // Sinks after the failing one still see every result.
    assert_eq!(recorder.results.lock().unwrap().len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_appending_run_keeps_prior_rows() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("availability.csv");

    for _ in 0..2 {
        let (aggregator, _stats) = build_aggregator(factory(), Arc::new(RecordingNotifier::default()));
        let scheduler = CycleScheduler::new(schedule(2), aggregator).with_sink(Arc::new(CsvLog::new(&path)));
        let (_tx, rx) = watch::channel(false);
        scheduler.run(rx).await?;
    }

    let content = std::fs::read_to_string(&path)?;
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 1 + 4);
    assert_eq!(lines[0], "Date/Time,Product,Price,A");
    assert!(lines[1..].iter().all(|line| line.ends_with(",Widget,$10,Available")));
    Ok(())
}
