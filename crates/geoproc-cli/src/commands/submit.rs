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

//! `geoproc submit`

use std::fs;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use geoproc::admission::OperationKind;
use geoproc::{Admission, AdmissionError, JobRequest, Submitter};
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use super::Environment;

pub fn submitter(user: Uuid, admin: bool, role: Option<Uuid>) -> Submitter {
    if admin {
        Submitter::admin(user)
    } else {
        Submitter::new(user, role)
    }
}

/// Parses `--body`: inline JSON, or `@path` to read the JSON from a file.
pub fn read_body(arg: &str) -> Result<Value> {
    let text = match arg.strip_prefix('@') {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("Failed to read body file {}", path))?
        }
        None => arg.to_string(),
    };
    serde_json::from_str(&text).context("Request body is not valid JSON")
}

pub fn parse_operation(operation: &str) -> Result<OperationKind> {
    OperationKind::from_str(operation).ok_or_else(|| anyhow!("Unknown operation '{}'", operation))
}

pub async fn run(
    env: &Environment,
    operation: &str,
    body: &str,
    submitter: &Submitter,
    dry_run: bool,
) -> Result<()> {
    let kind = parse_operation(operation)?;
    let body = read_body(body)?;

    let dal = Arc::new(env.dal()?);
    let catalog = Arc::new(env.catalog()?);
    let admission = Admission::new(catalog, dal.clone(), dal.settings());

    if dry_run {
        let request = JobRequest::from_body(kind, &body).map_err(explain)?;
        admission
            .validate(submitter, request)
            .await
            .map_err(explain)?;
        println!("{}", json!({ "operation": kind.as_str(), "valid": true }));
        return Ok(());
    }

    let job = admission
        .submit_body(submitter, kind, &body)
        .await
        .map_err(explain)?;
    println!("{}", serde_json::to_string_pretty(&job)?);
    Ok(())
}

fn explain(err: AdmissionError) -> anyhow::Error {
    if err.is_retryable() {
        warn!("Nothing was queued; the submission can be retried");
    }
    anyhow::Error::new(err)
}
