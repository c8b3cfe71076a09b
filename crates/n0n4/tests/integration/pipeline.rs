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

//! End-to-end behavior of one runner over the in-memory backlog.

use crate::fixtures::{Workspace, MISSING_TOOL};
use n0n4::certs::CertificateBundle;
use n0n4::jobs::MemoryJobStore;
use n0n4::provenance::{AiLevel, ProvenanceManifest, StampLanguage, StampMetadata, StampStyle};
use n0n4::signing::{Protector, ToolSigner};
use n0n4::verification::VerificationSource;
use n0n4::{JobStatus, JobStore, ProvenanceSigner, SignError, SignOutcome, Verifier};
use std::sync::Arc;

fn stamp() -> StampMetadata {
    StampMetadata::declare("ana@example.com", AiLevel::CoAuthor, StampStyle::B, StampLanguage::En)
}

#[tokio::test]
async fn test_failing_job_does_not_abort_the_batch() {
    let workspace = Workspace::new();
    let store = Arc::new(MemoryJobStore::new());

    let mut ids = Vec::new();
    for (i, key) in ["uploads/a.jpg", "uploads/missing.jpg", "uploads/c.png", "uploads/d.pdf"]
        .iter()
        .enumerate()
    {
        if !key.contains("missing") {
            workspace.put_object(key, format!("body {}", i).as_bytes());
        }
        ids.push(store.enqueue(key, "ana@example.com").await.unwrap().id);
    }

    let runner = workspace.runner(store.clone(), 5);
    let report = runner.run_batch().await.unwrap();
    assert_eq!(report.fetched, 4);
    assert_eq!(report.completed, 3);
    assert_eq!(report.failed, 1);
    assert_eq!(report.processed(), 4);

    for id in &ids {
        let job = store.get(id).await.unwrap().unwrap();
        assert!(job.status.is_terminal(), "job {} left in {}", id, job.status);
        if job.input_path.contains("missing") {
            assert_eq!(job.status, JobStatus::Failed);
            let error = job.error.unwrap();
            assert!(error.contains("uploads/missing.jpg"), "unexpected error: {error}");
            assert!(job.output_path.is_none());
        } else {
            assert_eq!(job.status, JobStatus::Completed);
            let key = job.output_path.clone().unwrap();
            assert_eq!(key, format!("signed/out_{}_{}", job.id, job.file_name()));
            assert_eq!(workspace.object(&key), workspace.object(&job.input_path));
            assert!(job.completed_at.is_some());
        }
    }

    assert!(workspace.scratch_files().is_empty());
}

#[tokio::test]
async fn test_second_batch_finds_nothing() {
    let workspace = Workspace::new();
    let store = Arc::new(MemoryJobStore::new());
    workspace.put_object("uploads/a.jpg", b"a");
    store.enqueue("uploads/a.jpg", "ana@example.com").await.unwrap();

    let runner = workspace.runner(store.clone(), 5);
    assert_eq!(runner.run_batch().await.unwrap().completed, 1);

    let again = runner.run_batch().await.unwrap();
    assert_eq!(again.fetched, 0);
    assert_eq!(again.processed(), 0);
}

#[tokio::test]
async fn test_signing_requires_certificates() {
    let workspace = Workspace::new();
    let input = workspace.root().join("photo.jpg");
    let output = workspace.root().join("signed.jpg");
    std::fs::write(&input, b"jpeg").unwrap();

    let missing = CertificateBundle::new(
        workspace.root().join("nope/cert.pem"),
        workspace.root().join("nope/key.pem"),
    );
    let manifest = ProvenanceManifest::for_stamp(&stamp()).unwrap();
    let signer = ToolSigner::new(MISSING_TOOL).with_temp_dir(workspace.root());

    let result = signer.sign(&input, &output, &missing, &manifest).await;
    assert!(matches!(result, Err(SignError::MissingCertificate(_))));
    assert!(!output.exists(), "no copy may be produced without certificates");
}

#[tokio::test]
async fn test_simulated_copy_is_byte_identical() {
    let workspace = Workspace::new();
    let bundle = workspace.bundle();
    let input = workspace.root().join("clip.mp4");
    let original: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
    std::fs::write(&input, &original).unwrap();
    let manifest = ProvenanceManifest::for_stamp(&stamp()).unwrap();
    let signer = workspace.missing_tool();

    for name in ["first.mp4", "second.mp4"] {
        let output = workspace.root().join(name);
        let outcome = signer.sign(&input, &output, &bundle, &manifest).await.unwrap();
        assert_eq!(outcome, SignOutcome::SimulatedCopy);
        assert_eq!(std::fs::read(&output).unwrap(), original);
    }
}

#[tokio::test]
async fn test_refused_simulation_fails_the_job() {
    let workspace = Workspace::new();
    let store = Arc::new(MemoryJobStore::new());
    workspace.put_object("uploads/a.jpg", b"a");
    let job = store.enqueue("uploads/a.jpg", "ana@example.com").await.unwrap();

    let runner = n0n4::JobRunner::new(
        store.clone(),
        workspace.objects(),
        Protector::new(workspace.missing_tool()).with_allow_simulated(false),
        workspace.certificates(),
        n0n4::RunnerConfig::builder().work_dir(workspace.work_dir()).build(),
    );
    let report = runner.run_batch().await.unwrap();
    assert_eq!(report.failed, 1);

    let stored = store.get(&job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert!(workspace.object(&format!("signed/out_{}_a.jpg", job.id)).is_none());
}

#[cfg(unix)]
#[tokio::test]
async fn test_inband_fallback_is_verifiable() {
    let workspace = Workspace::new();
    let bundle = workspace.bundle();
    let input = workspace.root().join("photo.jpg");
    let output = workspace.root().join("stamped.jpg");
    std::fs::write(&input, b"\xff\xd8 jpeg body").unwrap();

    // `false` is present but fails, which is what triggers the fallback.
    let protector = Protector::new(Arc::new(
        ToolSigner::new("false").with_temp_dir(workspace.root()),
    ))
    .with_inband_fallback(true);
    let declared = stamp();
    let manifest = ProvenanceManifest::for_stamp(&declared).unwrap();

    let outcome = protector.protect(&input, &output, &bundle, &manifest).await.unwrap();
    assert_eq!(outcome, SignOutcome::Embedded);

    let verified = Verifier::inband_only().verify(&output).await.unwrap();
    assert_eq!(verified.source, VerificationSource::InBand);
    assert_eq!(verified.stamp().unwrap(), declared);

    let bytes = std::fs::read(&output).unwrap();
    let from_buffer = Verifier::inband_only()
        .with_scratch_dir(workspace.root())
        .verify_bytes(&bytes, "image/jpeg")
        .await
        .unwrap();
    assert_eq!(from_buffer, verified);
}

#[tokio::test]
async fn test_unstamped_file_has_no_provenance() {
    let workspace = Workspace::new();
    let plain = workspace.root().join("plain.txt");
    std::fs::write(&plain, b"hello world").unwrap();

    assert!(Verifier::inband_only().verify(&plain).await.is_none());
}
