use super::*;
use stock_watcher::sinks::CsvLog;
use stock_watcher::{CycleScheduler, ScheduleConfig};
use tokio::sync::watch;

fn two_product_factory() -> ScriptedFactory {
    ScriptedFactory::new()
        .product(
            "https://shop.example.com/p/1",
            ProductScript::new("Widget", "$10")
                .code("A", CodeScript::InStock)
                .code("B", CodeScript::OutOfStock),
        )
        .product("https://shop.example.com/p/2", ProductScript::new("Gadget", "$25").sold_out())
}

fn schedule(max_cycles: u32, delay: Duration) -> ScheduleConfig {
    ScheduleConfig {
        products: vec![
            "https://shop.example.com/p/1".to_string(),
            "https://shop.example.com/p/2".to_string(),
        ],
        codes: codes(&["A", "B"]),
        max_cycles: Some(max_cycles),
        inter_cycle_delay: delay,
    }
}

#[tokio::test(start_paused = true)]
async fn test_cycles_stream_every_result_to_every_sink() -> anyhow::Result<()> {
    let notifier = Arc::new(RecordingNotifier::default());
    let (aggregator, stats) = build_aggregator(two_product_factory(), Arc::clone(&notifier));
    let sink = Arc::new(RecordingSink::default());

    let scheduler = CycleScheduler::new(schedule(3, Duration::from_secs(30)), aggregator).with_sink(sink.clone());
    let (_tx, rx) = watch::channel(false);
    let summary = scheduler.run(rx).await?;

    assert_eq!(summary.cycles_completed, 3);
    assert_eq!(summary.sleeps, 2);
    assert_eq!(summary.results_dispatched, 6);

    let headers = sink.headers.lock().unwrap().clone();
    assert_eq!(headers.len(), 3);
    assert!(headers.iter().all(|(_, codes)| codes == &vec!["A".to_string(), "B".to_string()]));
    assert_eq!(*sink.finished.lock().unwrap(), vec![1, 2, 3]);

    let results = sink.results.lock().unwrap();
    assert_eq!(results.len(), 6);
    for result in results.iter() {
        assert!(result.covers_exactly(&codes(&["A", "B"])));
    }
    let names: Vec<&str> = results.iter().map(|r| r.product.name.as_str()).collect();
    assert_eq!(names, vec!["Widget", "Gadget", "Widget", "Gadget", "Widget", "Gadget"]);

    // One notification per available code per cycle, none for the sold-out product.
    assert_eq!(notifier.codes(), vec!["A", "A", "A"]);
    assert_eq!(stats.opens(), 6);
    assert_eq!(stats.closes(), 6);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_csv_log_gets_rows_for_every_cycle_and_product() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("availability.csv");
    let (aggregator, _stats) = build_aggregator(two_product_factory(), Arc::new(RecordingNotifier::default()));

    let scheduler = CycleScheduler::new(schedule(2, Duration::from_secs(5)), aggregator)
        .with_sink(Arc::new(CsvLog::new(&path)));
    let (_tx, rx) = watch::channel(false);
    let summary = scheduler.run(rx).await?;
    assert_eq!(summary.persistence_failures, 0);

    let mut reader = csv::Reader::from_path(&path)?;
    assert_eq!(
        reader.headers()?.iter().collect::<Vec<_>>(),
        vec!["Date/Time", "Product", "Price", "A", "B"]
    );
    let rows: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>()?;
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|row| row.len() == 5));
    assert_eq!(
        rows[0].iter().skip(1).collect::<Vec<_>>(),
        vec!["Widget", "$10", "Available", "Out of stock"]
    );
    assert_eq!(
        rows[1].iter().skip(1).collect::<Vec<_>>(),
        vec!["Gadget", "$25", "Out of stock", "Out of stock"]
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_wait_skips_remaining_cycles() -> anyhow::Result<()> {
    let (aggregator, stats) = build_aggregator(two_product_factory(), Arc::new(RecordingNotifier::default()));
    let sink = Arc::new(RecordingSink::default());
    let scheduler = CycleScheduler::new(schedule(10, Duration::from_secs(600)), aggregator).with_sink(sink.clone());

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(60)).await;
        let _ = tx.send(true);
    });

    let started = tokio::time::Instant::now();
    let summary = scheduler.run(rx).await?;

    assert!(summary.interrupted);
    assert_eq!(summary.cycles_completed, 1);
    assert!(started.elapsed() < Duration::from_secs(600));
    assert_eq!(sink.results.lock().unwrap().len(), 2);
    assert_eq!(stats.opens(), stats.closes());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_mid_product_aborts_cycle_and_releases_session() -> anyhow::Result<()> {
    let factory = ScriptedFactory::new().product(
        "https://shop.example.com/p/1",
        ProductScript::new("Widget", "$10").code("A", CodeScript::Hang),
    );
    let (aggregator, stats) = build_aggregator(factory, Arc::new(RecordingNotifier::default()));
    let sink = Arc::new(RecordingSink::default());
    let config = ScheduleConfig {
        products: vec!["https://shop.example.com/p/1".to_string()],
        codes: codes(&["A"]),
        max_cycles: Some(3),
        inter_cycle_delay: Duration::from_secs(60),
    };
    let scheduler = CycleScheduler::new(config, aggregator).with_sink(sink.clone());

    let (tx, rx) = watch::channel(false);
    let watcher = Arc::clone(&stats);
    tokio::spawn(async move {
        while watcher.settling() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let _ = tx.send(true);
    });

    let summary = scheduler.run(rx).await?;

    assert!(summary.interrupted);
    assert_eq!(summary.cycles_completed, 0);
    assert_eq!(summary.results_dispatched, 0);
    assert!(sink.results.lock().unwrap().is_empty());
    assert!(sink.finished.lock().unwrap().is_empty());
    assert_eq!(stats.opens(), 1);
    assert_eq!(stats.dropped(), 1);
    Ok(())
}
