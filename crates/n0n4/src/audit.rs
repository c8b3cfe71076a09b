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

//! Audit logging for provenance operations.
//!
//! Every signing, verification and job outcome is emitted as a structured
//! `tracing` event carrying an `event_type` field, so log pipelines can
//! filter on it without parsing messages.

use std::path::Path;

/// Event types for provenance operations.
pub mod events {
    /// Certificate material written to disk.
    pub const CERTIFICATE_PROVISIONED: &str = "certificate.provisioned";
    /// Certificate provisioning failure.
    pub const CERTIFICATE_PROVISION_FAILED: &str = "certificate.provision_failed";

    /// File signed with a real manifest.
    pub const PROVENANCE_SIGNED: &str = "provenance.signed";
    /// Signing tool absent, input copied unsigned.
    pub const PROVENANCE_SIMULATED: &str = "provenance.simulated";
    /// Metadata appended with the in-band carrier.
    pub const PROVENANCE_EMBEDDED: &str = "provenance.embedded";
    /// Signing failure.
    pub const PROVENANCE_SIGN_FAILED: &str = "provenance.sign_failed";

    /// Provenance recovered from a file.
    pub const VERIFICATION_SUCCESS: &str = "verification.success";
    /// No provenance could be recovered.
    pub const VERIFICATION_NOT_FOUND: &str = "verification.not_found";

    /// Job reached `COMPLETED`.
    pub const JOB_COMPLETED: &str = "job.completed";
    /// Job reached `FAILED`.
    pub const JOB_FAILED: &str = "job.failed";
    /// Backlog row could not be decoded.
    pub const JOB_REJECTED: &str = "job.rejected";
}

pub fn log_certificate_provisioned(cert_path: &Path, source: &str, fingerprint: Option<&str>) {
    tracing::info!(
        event_type = events::CERTIFICATE_PROVISIONED,
        cert_path = %cert_path.display(),
        source = %source,
        fingerprint = fingerprint.unwrap_or("<unknown>"),
        "Signing certificate provisioned"
    );
}

pub fn log_certificate_provision_failed(error: &str) {
    tracing::error!(
        event_type = events::CERTIFICATE_PROVISION_FAILED,
        error = %error,
        "Failed to provision signing certificate"
    );
}

pub fn log_signed(input: &Path, output: &Path, signer: &str) {
    tracing::info!(
        event_type = events::PROVENANCE_SIGNED,
        input = %input.display(),
        output = %output.display(),
        signer = %signer,
        "File signed"
    );
}

pub fn log_simulated(input: &Path, output: &Path) {
    tracing::warn!(
        event_type = events::PROVENANCE_SIMULATED,
        input = %input.display(),
        output = %output.display(),
        "Signing tool not found, simulating signing by copying input to output; output is unsigned"
    );
}

pub fn log_embedded(input: &Path, output: &Path, reason: &str) {
    tracing::warn!(
        event_type = events::PROVENANCE_EMBEDDED,
        input = %input.display(),
        output = %output.display(),
        reason = %reason,
        "Signing failed, metadata appended in-band instead"
    );
}

pub fn log_sign_failed(input: &Path, signer: &str, error: &str) {
    tracing::error!(
        event_type = events::PROVENANCE_SIGN_FAILED,
        input = %input.display(),
        signer = %signer,
        error = %error,
        "Signing failed"
    );
}

pub fn log_verification_success(subject: &str, source: &str) {
    tracing::info!(
        event_type = events::VERIFICATION_SUCCESS,
        subject = %subject,
        source = %source,
        "Provenance verified"
    );
}

pub fn log_verification_not_found(subject: &str) {
    tracing::info!(
        event_type = events::VERIFICATION_NOT_FOUND,
        subject = %subject,
        "No verifiable metadata found"
    );
}

pub fn log_job_completed(job_id: &str, output_key: &str, outcome: &str) {
    tracing::info!(
        event_type = events::JOB_COMPLETED,
        job_id = %job_id,
        output_key = %output_key,
        outcome = %outcome,
        "Job completed"
    );
}

pub fn log_job_failed(job_id: &str, error: &str) {
    tracing::error!(
        event_type = events::JOB_FAILED,
        job_id = %job_id,
        error = %error,
        "Job failed"
    );
}

pub fn log_job_rejected(job_id: Option<&str>, error: &str) {
    tracing::warn!(
        event_type = events::JOB_REJECTED,
        job_id = job_id.unwrap_or("<unknown>"),
        error = %error,
        "Unreadable backlog row"
    );
}
