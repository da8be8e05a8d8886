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

//! `geoproc status`

use anyhow::{bail, Context, Result};
use geoproc::QueueStore;
use uuid::Uuid;

use super::Environment;

pub async fn run(env: &Environment, message_id: Uuid) -> Result<()> {
    let dal = env.dal()?;
    let Some(status) = dal
        .status(message_id)
        .await
        .context("Failed to read queue row")?
    else {
        bail!("No job with message id {}", message_id);
    };
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
