/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Concurrency tests for job claiming.
//!
//! Several runners draining one backlog at the same time must never process
//! a job twice, and every job must end up processed exactly once.

use crate::fixtures::Workspace;
use n0n4::jobs::MemoryJobStore;
use n0n4::{BatchReport, JobRunner, JobStatus, JobStore};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Barrier;

const NUM_JOBS: usize = 12;

async fn seed(workspace: &Workspace, store: &dyn JobStore) -> Vec<String> {
    let mut ids = Vec::new();
    for i in 0..NUM_JOBS {
        let key = format!("uploads/file-{}.jpg", i);
        workspace.put_object(&key, key.as_bytes());
        ids.push(store.enqueue(&key, "ana@example.com").await.unwrap().id);
    }
    ids
}

async fn race(runners: Vec<JobRunner>) -> Vec<BatchReport> {
    let barrier = Arc::new(Barrier::new(runners.len()));
    let handles: Vec<_> = runners
        .into_iter()
        .map(|runner| {
            let barrier = barrier.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                runner.run_batch().await.unwrap()
            })
        })
        .collect();

    let mut reports = Vec::new();
    for handle in handles {
        reports.push(handle.await.unwrap());
    }
    reports
}

async fn assert_processed_once(store: &dyn JobStore, ids: &[String], reports: &[BatchReport]) {
    let completed: usize = reports.iter().map(|r| r.completed).sum();
    let failed: usize = reports.iter().map(|r| r.failed).sum();
    assert_eq!(completed, NUM_JOBS, "reports: {reports:?}");
    assert_eq!(failed, 0);

    for report in reports {
        assert_eq!(report.fetched, report.completed + report.skipped);
    }

    for id in ids {
        let job = store.get(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed, "job {}", id);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_runners_share_memory_backlog() {
    let workspace = Workspace::new();
    let store = Arc::new(MemoryJobStore::new());
    let ids = seed(&workspace, store.as_ref()).await;

    let runners = (0..3)
        .map(|_| workspace.runner(store.clone(), NUM_JOBS))
        .collect();
    let reports = race(runners).await;

    assert_processed_once(store.as_ref(), &ids, &reports).await;
    assert!(workspace.scratch_files().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_claim_has_a_single_winner() {
    let store = Arc::new(MemoryJobStore::new());
    let job = store.enqueue("uploads/a.jpg", "ana@example.com").await.unwrap();

    const NUM_CLAIMANTS: usize = 10;
    let barrier = Arc::new(Barrier::new(NUM_CLAIMANTS));
    let mut handles = Vec::new();
    for _ in 0..NUM_CLAIMANTS {
        let store = store.clone();
        let barrier = barrier.clone();
        let id = job.id.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            store.claim(&id).await.unwrap()
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(
        store.get(&job.id).await.unwrap().unwrap().status,
        JobStatus::Processing
    );
}

#[cfg(feature = "sqlite")]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_runners_share_sqlite_backlog() {
    use n0n4::jobs::SqliteJobStore;

    let workspace = Workspace::new();
    let url = format!("sqlite://{}", workspace.root().join("jobs.db").display());

    let seed_store = SqliteJobStore::connect(&url).await.unwrap();
    let ids = seed(&workspace, &seed_store).await;

    let mut runners = Vec::new();
    for _ in 0..2 {
        let store: Arc<dyn JobStore> = Arc::new(SqliteJobStore::connect(&url).await.unwrap());
        runners.push(workspace.runner(store, NUM_JOBS));
    }
    let reports = race(runners).await;

    assert_processed_once(&seed_store, &ids, &reports).await;

    let outputs: HashSet<String> = {
        let mut keys = HashSet::new();
        for id in &ids {
            let job = seed_store.get(id).await.unwrap().unwrap();
            keys.insert(job.output_path.unwrap());
        }
        keys
    };
    assert_eq!(outputs.len(), NUM_JOBS);
}
