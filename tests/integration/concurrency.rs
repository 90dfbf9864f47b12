use super::IntegrationHarness;
use anyhow::Result;
use filer::{
    FileCategory, FileStore, Outcome, ResultContext, SaveRequest, StorageRoots, StoreConfig,
    TrackedWork,
};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::time::Duration;
use tempfile::TempDir;

const TIMEOUT: Duration = Duration::from_secs(20);

fn collect(rx: mpsc::Receiver<Outcome>, count: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|_| {
            rx.recv_timeout(TIMEOUT)
                .expect("completion was not delivered")
                .expect("operation failed")
        })
        .collect()
}

#[test]
fn hundred_parallel_allocations_are_distinct() {
    let harness = IntegrationHarness::new();
    let (tx, rx) = mpsc::channel();
    for _ in 0..100 {
        let tx = tx.clone();
        harness
            .store
            .allocate_unique_path(&FileCategory::Thumbnail, None, move |outcome| {
                let _ = tx.send(outcome);
            })
            .expect("allocation rejected");
    }
    let paths: HashSet<PathBuf> = collect(rx, 100).into_iter().collect();
    assert_eq!(paths.len(), 100);
    harness.wait_idle();
}

#[test]
fn parallel_named_allocations_are_distinct() {
    let harness = IntegrationHarness::new();
    let (tx, rx) = mpsc::channel();
    for _ in 0..20 {
        let tx = tx.clone();
        harness
            .store
            .allocate_unique_path(&FileCategory::Audio, Some("take.m4a"), move |outcome| {
                let _ = tx.send(outcome);
            })
            .expect("allocation rejected");
    }
    let paths: HashSet<PathBuf> = collect(rx, 20).into_iter().collect();
    assert_eq!(paths.len(), 20);

    let dir = harness.store.directory_for(FileCategory::Audio);
    let expected: HashSet<PathBuf> = (0..20)
        .map(|n| match n {
            0 => dir.join("take.m4a"),
            n => dir.join(format!("take{n}.m4a")),
        })
        .collect();
    assert_eq!(paths, expected);
    harness.wait_idle();
}

#[test]
fn deleting_a_category_releases_allocated_names() -> Result<()> {
    let harness = IntegrationHarness::new();
    let first = harness.allocate(&FileCategory::Temp, Some("scratch.tmp"))?;
    let second = harness.allocate(&FileCategory::Temp, Some("scratch.tmp"))?;
    assert_ne!(first, second);

    harness.delete_category(FileCategory::Temp)?;
    assert_eq!(harness.allocate(&FileCategory::Temp, Some("scratch.tmp"))?, first);
    Ok(())
}

#[test]
fn parallel_opaque_saves_land_in_distinct_files() -> Result<()> {
    let harness = IntegrationHarness::new();
    let (tx, rx) = mpsc::channel();
    for n in 0..50u8 {
        let tx = tx.clone();
        harness.store.save(
            SaveRequest::new(vec![n; 8], &FileCategory::Audio),
            move |outcome| {
                let _ = tx.send(outcome);
            },
        )?;
    }
    let paths = collect(rx, 50);
    let unique: HashSet<_> = paths.iter().collect();
    assert_eq!(unique.len(), 50);
    assert_eq!(harness.list(FileCategory::Audio)?.len(), 50);
    for path in paths {
        let bytes = fs::read(&path)?;
        assert_eq!(bytes.len(), 8);
        assert!(bytes.iter().all(|b| *b == bytes[0]));
    }
    Ok(())
}

#[test]
fn parallel_moves_with_one_name_do_not_collide() -> Result<()> {
    let harness = IntegrationHarness::new();
    let (tx, rx) = mpsc::channel();
    for n in 0..10 {
        let dir = harness.workspace_path().join(format!("incoming-{n}"));
        fs::create_dir_all(&dir)?;
        let source = dir.join("scan.jpg");
        fs::write(&source, format!("scan {n}"))?;
        let tx = tx.clone();
        harness
            .store
            .move_file(&source, FileCategory::FullImage, move |outcome| {
                let _ = tx.send(outcome);
            })?;
    }
    let paths: HashSet<PathBuf> = collect(rx, 10).into_iter().collect();
    assert_eq!(paths.len(), 10);

    let contents: HashSet<Vec<u8>> = paths
        .iter()
        .map(|p| fs::read(p))
        .collect::<std::io::Result<_>>()?;
    assert_eq!(contents.len(), 10);
    Ok(())
}

#[test]
fn guard_covers_completion_delivery() -> Result<()> {
    let harness = IntegrationHarness::new();
    let (tx, rx) = mpsc::channel();
    let work = harness.work.clone();
    harness.store.save(
        SaveRequest::new(b"x".to_vec(), &FileCategory::Temp),
        move |outcome| {
            // Still inside the guarded span while the completion runs.
            let _ = tx.send((work.in_flight(), outcome.is_ok()));
        },
    )?;
    let (in_flight, ok) = rx.recv_timeout(TIMEOUT)?;
    assert!(ok);
    assert_eq!(in_flight, 1);
    harness.wait_idle();
    assert_eq!(harness.work.in_flight(), 0);
    Ok(())
}

#[test]
fn pumped_context_runs_completions_on_host_thread() -> Result<()> {
    let tmp = TempDir::new()?;
    let work = Arc::new(TrackedWork::new());
    let (results, pump) = ResultContext::pumped();
    let store = FileStore::builder(StoreConfig::default())
        .roots(StorageRoots::under(tmp.path()))
        .results(results)
        .background_work(work.clone())
        .build()?;

    let (tx, rx) = mpsc::channel();
    store.save(
        SaveRequest::new(b"AB".to_vec(), &FileCategory::Thumbnail).named("pic.png"),
        move |outcome| {
            let _ = tx.send((std::thread::current().id(), outcome));
        },
    )?;

    assert!(pump.run_one_timeout(TIMEOUT));
    let (thread_id, outcome) = rx.try_recv()?;
    assert_eq!(thread_id, std::thread::current().id());
    assert_eq!(fs::read(outcome?)?, b"AB");
    assert!(work.wait_idle(TIMEOUT));
    Ok(())
}
