use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Days, NaiveDate};

use classbook::cache::AvailabilityCache;
use classbook::gate::CapacityGate;
use classbook::model::{ClassFilters, ClassId, DayUnit, ScheduleRequest, UserId};
use classbook::scheduler::SchedulingCoordinator;
use classbook::store::{Database, StoreError};

fn bench_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("classbook_bench");
    std::fs::create_dir_all(&dir).expect("create bench dir");
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    let ms = |d: Duration| d.as_secs_f64() * 1000.0;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.3}ms, p50={:.3}ms, p95={:.3}ms, p99={:.3}ms, max={:.3}ms",
        latencies.len(),
        ms(avg),
        ms(percentile(latencies, 50.0)),
        ms(percentile(latencies, 95.0)),
        ms(percentile(latencies, 99.0)),
        ms(latencies[latencies.len() - 1]),
    );
}

async fn open(name: &str) -> Arc<Database> {
    Arc::new(Database::open(&bench_wal_path(name)).expect("open bench journal"))
}

async fn class_with_capacity(db: &Database, capacity: u32) -> ClassId {
    let unit = DayUnit {
        name: "Bench".into(),
        date: NaiveDate::from_ymd_opt(2030, 1, 1).expect("valid date"),
        capacity,
    };
    db.add_classes(&[unit]).await.expect("insert class")[0].id
}

async fn users(db: &Database, n: usize) -> Vec<UserId> {
    let mut ids = Vec::with_capacity(n);
    for i in 0..n {
        ids.push(db.add_user(&format!("bench{i}")).await.expect("insert user").id);
    }
    ids
}

async fn phase1_sequential() {
    let n = 2000;
    let db = open("phase1.wal").await;
    let class_id = class_with_capacity(&db, n as u32).await;
    let users = users(&db, n).await;
    let gate = CapacityGate::new(db.clone());

    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();
    for user_id in users {
        let t = Instant::now();
        gate.book(user_id, class_id).await.expect("seat available");
        latencies.push(t.elapsed());
    }
    let elapsed = start.elapsed();
    println!(
        "  {n} bookings in {:.2}s = {:.0} ops/sec",
        elapsed.as_secs_f64(),
        n as f64 / elapsed.as_secs_f64()
    );
    print_latency("booking latency", &mut latencies);
}

async fn phase2_contention() {
    let (capacity, contenders) = (100u32, 1000usize);
    let db = open("phase2.wal").await;
    let class_id = class_with_capacity(&db, capacity).await;
    let users = users(&db, contenders).await;
    let gate = Arc::new(CapacityGate::new(db.clone()));

    let start = Instant::now();
    let handles: Vec<_> = users
        .into_iter()
        .map(|user_id| {
            let gate = gate.clone();
            tokio::spawn(async move {
                let t = Instant::now();
                let result = gate.book(user_id, class_id).await;
                (result, t.elapsed())
            })
        })
        .collect();

    let (mut admitted, mut full, mut latencies) = (0u32, 0u32, Vec::with_capacity(contenders));
    for h in handles {
        let (result, latency) = h.await.expect("task panicked");
        latencies.push(latency);
        match result {
            Ok(_) => admitted += 1,
            Err(StoreError::CapacityReached { .. }) => full += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    let elapsed = start.elapsed();
    println!(
        "  {contenders} contenders on {capacity} seats: {admitted} admitted, {full} refused in {:.2}s",
        elapsed.as_secs_f64()
    );
    assert_eq!(admitted, capacity, "admission overflowed or underfilled");
    print_latency("contended booking latency", &mut latencies);
}

async fn phase3_scheduling() {
    let db = open("phase3.wal").await;
    let coord = Arc::new(SchedulingCoordinator::new(Arc::new(AvailabilityCache::new()), db.clone()));
    let n_tasks = 16;
    let base = NaiveDate::from_ymd_opt(2031, 1, 1).expect("valid date");

    // Pairs of tasks share a 90-day range, so half of all days collide.
    let start = Instant::now();
    let handles: Vec<_> = (0..n_tasks)
        .map(|i| {
            let coord = coord.clone();
            let start_date = base + Days::new((i / 2) as u64 * 90);
            tokio::spawn(async move {
                let request = ScheduleRequest {
                    name: format!("Series{i}"),
                    start_date,
                    end_date: start_date + Days::new(89),
                    capacity: 20,
                };
                let t = Instant::now();
                let rejected = coord.create_classes(&request).await.expect("schedule").len();
                (rejected, t.elapsed())
            })
        })
        .collect();

    let (mut rejected, mut latencies) = (0, Vec::new());
    for h in handles {
        let (r, latency) = h.await.expect("task panicked");
        rejected += r;
        latencies.push(latency);
    }
    let elapsed = start.elapsed();
    println!(
        "  {n_tasks} requests x 90 days: {} classes, {rejected} days rejected in {:.2}s",
        db.class_count(),
        elapsed.as_secs_f64()
    );
    print_latency("schedule request latency", &mut latencies);
}

async fn phase4_read_under_load() {
    let db = open("phase4.wal").await;
    let coord = SchedulingCoordinator::new(Arc::new(AvailabilityCache::new()), db.clone());
    let base = NaiveDate::from_ymd_opt(2032, 1, 1).expect("valid date");
    coord
        .create_classes(&ScheduleRequest {
            name: "Daily".into(),
            start_date: base,
            end_date: base + Days::new(364),
            capacity: 50,
        })
        .await
        .expect("seed classes");
    let users = users(&db, 200).await;
    let gate = Arc::new(CapacityGate::new(db.clone()));

    let writer = {
        let gate = gate.clone();
        tokio::spawn(async move {
            for (i, user_id) in users.iter().enumerate() {
                let class_id = (i % 365) as ClassId + 1;
                let _ = gate.book(*user_id, class_id).await;
            }
        })
    };

    let filters = ClassFilters {
        registrations_gte: Some(1),
        ..Default::default()
    };
    let mut latencies = Vec::new();
    while !writer.is_finished() {
        let t = Instant::now();
        let _ = db.list_classes(&filters).await;
        latencies.push(t.elapsed());
    }
    writer.await.expect("writer panicked");
    print_latency("filtered list latency under booking load", &mut latencies);
}

#[tokio::main]
async fn main() {
    println!("=== classbook stress benchmark ===\n");

    println!("[phase 1] sequential booking throughput");
    phase1_sequential().await;

    println!("\n[phase 2] contended admission on one class");
    phase2_contention().await;

    println!("\n[phase 3] concurrent overlapping schedule requests");
    phase3_scheduling().await;

    println!("\n[phase 4] read latency under booking load");
    phase4_read_under_load().await;

    println!("\n=== benchmark complete ===");
}
