use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use tempfile::TempDir;

use demand_forecast::data::PredictionRequest;
use demand_forecast::pipeline::{ForecastService, PipelineConfig};

const HEADER: &str = "date,store_id,sku_id,category,brand,channel,units_sold,stock_on_hand,\
list_price,discount_pct,promo_flag,temperature,rain_mm,is_holiday,lead_time_days";

fn write_corpus(dir: &TempDir, skus: &[&str]) -> PathBuf {
    let path = dir.path().join("history.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "{HEADER}").unwrap();

    let origin = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    for (i, sku) in skus.iter().enumerate() {
        let units = 5.0 + i as f64;
        for d in 0..60 {
            let date = origin + Duration::days(d);
            writeln!(
                file,
                "{date},STORE0001,{sku},GROCERY,ACME,RETAIL,{units},80.0,4.5,0.0,0,15.0,0.0,0,3.0"
            )
            .unwrap();
        }
    }
    path
}

fn request(sku: &str) -> PredictionRequest {
    PredictionRequest {
        start_date: "2024-03-01".parse().unwrap(),
        store_id: "STORE0001".to_string(),
        sku_id: sku.to_string(),
        category: "GROCERY".to_string(),
        brand: "ACME".to_string(),
    }
}

fn trained_service(dir: &TempDir, skus: &[&str]) -> Arc<ForecastService> {
    let corpus = write_corpus(dir, skus);
    let service = Arc::new(ForecastService::new(PipelineConfig {
        artifact_dir: dir.path().join("models"),
        ..PipelineConfig::default()
    }));
    service.train(&corpus).unwrap();
    service
}

#[test]
fn concurrent_identical_requests_compute_once_and_agree() {
    let dir = TempDir::new().unwrap();
    let service = trained_service(&dir, &["SKU0001"]);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let service = Arc::clone(&service);
            std::thread::spawn(move || service.predict(&request("SKU0001")).unwrap())
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for result in &results[1..] {
        assert_eq!(*result, results[0]);
    }

    // Single-flight: one computation, everyone else a hit or waiter.
    let stats = service.status().cache;
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 3);
    assert_eq!(stats.hits + stats.misses, 4);
}

#[test]
fn distinct_requests_run_in_parallel_without_interference() {
    let dir = TempDir::new().unwrap();
    let skus = ["SKU0001", "SKU0002", "SKU0003", "SKU0004"];
    let service = trained_service(&dir, &skus);

    let handles: Vec<_> = skus
        .iter()
        .map(|sku| {
            let service = Arc::clone(&service);
            let sku = sku.to_string();
            std::thread::spawn(move || service.predict(&request(&sku)).unwrap())
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    // Each request-local prediction chain stays its own: a SKU's level
    // tracks its own history, unchanged by the concurrent forecasts.
    for (i, result) in results.iter().enumerate() {
        let expected = 5.0 + i as f64;
        for day in &result.days {
            assert!(
                (day.units_sold - expected).abs() < expected * 0.3,
                "sku {} day {}: expected ~{expected}, got {}",
                skus[i],
                day.date,
                day.units_sold
            );
        }
    }

    let stats = service.status().cache;
    assert_eq!(stats.misses, 4);
    assert_eq!(stats.size, 4);
}

#[test]
fn predictions_keep_serving_while_training_runs() {
    let dir = TempDir::new().unwrap();
    let service = trained_service(&dir, &["SKU0001"]);
    let before = service.predict(&request("SKU0001")).unwrap();

    let corpus = write_corpus(&dir, &["SKU0001"]);
    let trainer = {
        let service = Arc::clone(&service);
        std::thread::spawn(move || service.train(&corpus).unwrap())
    };

    // Predictions issued while the retrain runs must complete against a
    // fully consistent generation, old or new.
    for _ in 0..20 {
        let during = service.predict(&request("SKU0001")).unwrap();
        assert_eq!(during.days.len(), 7);
        for day in &during.days {
            assert!(day.units_sold >= 0.0);
        }
    }

    trainer.join().unwrap();

    // Same corpus retrained: the swapped-in generation reproduces the
    // same forecasts.
    let after = service.predict(&request("SKU0001")).unwrap();
    assert_eq!(after.days, before.days);
}
