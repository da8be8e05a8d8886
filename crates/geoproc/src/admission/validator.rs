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

//! Admission Validator
//!
//! Runs the rule sequence of each operation against a [`Catalog`] and stops at
//! the first failure. Structural rules run before any catalog read; catalog
//! reads run in a fixed order so the same request against the same catalog
//! always fails with the same reason.
//!
//! Catalog reads are not locked. Two submissions naming the same output table
//! can both pass here; the worker refuses the second one when it finds the
//! table already created.

use std::collections::HashMap;

use uuid::Uuid;

use super::request::{
    ClipArgs, DissolveArgs, ExportArgs, ExportFormat, ImportArgs, JobRequest, MultiInputArgs,
    SpatialJoinArgs,
};
use super::rules;
use crate::catalog::Catalog;
use crate::error::AdmissionError;
use crate::models::{LayerInfo, Submitter};

const CLIP_MATRIX_REASON: &str = "Polygon input can only be clipped by polygon, line input can only be clipped by polygon or line, point input can only be clipped by polygon, line, or point";

/// Smallest and largest zoom level an import may request.
pub const ZOOM_RANGE: std::ops::RangeInclusive<i64> = 1..=20;

/// A request that passed every rule, bound to the identity it runs as.
///
/// Only the validator creates these, so holding one means the catalog agreed
/// with the request at validation time.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedJob {
    request: JobRequest,
    user_id: Option<Uuid>,
}

impl ValidatedJob {
    pub fn request(&self) -> &JobRequest {
        &self.request
    }

    /// Identity the job runs as: the submitter, or the uploader for imports.
    pub fn user_id(&self) -> Option<Uuid> {
        self.user_id
    }

    pub fn into_request(self) -> JobRequest {
        self.request
    }
}

/// Validates `request` on behalf of `submitter`.
pub async fn validate(
    catalog: &dyn Catalog,
    submitter: &Submitter,
    request: JobRequest,
) -> Result<ValidatedJob, AdmissionError> {
    let checks = CatalogChecks { catalog };
    match &request {
        JobRequest::Clip(args) => validate_clip(&checks, args).await?,
        JobRequest::Dissolve(args) => validate_dissolve(&checks, args).await?,
        JobRequest::Merge(args) => validate_merge(&checks, args).await?,
        JobRequest::Union(args) | JobRequest::Intersect(args) | JobRequest::Difference(args) => {
            validate_standard_inputs(&checks, args).await?
        }
        JobRequest::SpatialJoin(args) => validate_spatial_join(&checks, args).await?,
        JobRequest::Export(args) => validate_export(&checks, args).await?,
        JobRequest::Import(args) => validate_import(args)?,
    }

    let user_id = match &request {
        JobRequest::Import(args) => args.uploader,
        _ => Some(submitter.user_id),
    };
    Ok(ValidatedJob { request, user_id })
}

/// Catalog reads with infrastructure faults mapped to `CatalogUnavailable`.
struct CatalogChecks<'a> {
    catalog: &'a dyn Catalog,
}

impl CatalogChecks<'_> {
    async fn layer(&self, name: &str) -> Result<Option<LayerInfo>, AdmissionError> {
        self.catalog
            .layer(name)
            .await
            .map_err(AdmissionError::CatalogUnavailable)
    }

    /// The layer must be registered; `missing` is the rejection reason otherwise.
    async fn registered(&self, name: &str, missing: String) -> Result<LayerInfo, AdmissionError> {
        self.layer(name)
            .await?
            .ok_or(AdmissionError::InvalidSubmission { reason: missing })
    }

    async fn physical(&self, name: &str) -> Result<(), AdmissionError> {
        let exists = self
            .catalog
            .physical_table_exists(name)
            .await
            .map_err(AdmissionError::CatalogUnavailable)?;
        if !exists {
            return Err(AdmissionError::invalid(format!(
                "Table named {} does not exist",
                name
            )));
        }
        Ok(())
    }

    /// The output name is neither a registered layer nor a physical table.
    async fn output_available(&self, name: &str) -> Result<(), AdmissionError> {
        if self.layer(name).await?.is_some() {
            return Err(AdmissionError::invalid(
                "Output table already exists in vector_tiles",
            ));
        }
        let exists = self
            .catalog
            .physical_table_exists(name)
            .await
            .map_err(AdmissionError::CatalogUnavailable)?;
        if exists {
            return Err(AdmissionError::invalid("Output table name already exists"));
        }
        Ok(())
    }

    /// Every input registered and physical, in request order.
    async fn inputs(&self, tables: &[String]) -> Result<Vec<LayerInfo>, AdmissionError> {
        let mut layers = Vec::with_capacity(tables.len());
        for table in tables {
            let layer = self
                .registered(table, format!("{} does not exist in vector_tiles", table))
                .await?;
            self.physical(table).await?;
            layers.push(layer);
        }
        Ok(layers)
    }
}

async fn validate_clip(checks: &CatalogChecks<'_>, args: &ClipArgs) -> Result<(), AdmissionError> {
    rules::require(&args.input_table, "input_table")?;
    rules::require(&args.clip_table, "clip_table")?;
    rules::distinct_pair(&args.input_table, "input_table", &args.clip_table, "clip_table")?;
    rules::output_table(&args.output_table)?;

    let input = checks
        .registered(
            &args.input_table,
            "Input table does not exist in vector_tiles".to_string(),
        )
        .await?;
    let clipper = checks
        .registered(
            &args.clip_table,
            "Clip table does not exist in vector_tiles".to_string(),
        )
        .await?;
    if !clip_allowed(&input, &clipper) {
        return Err(AdmissionError::invalid(CLIP_MATRIX_REASON));
    }

    checks.physical(&args.input_table).await?;
    checks.physical(&args.clip_table).await?;
    checks.output_available(&args.output_table).await
}

/// A target of non-standard geometry is not restricted; a standard target
/// needs a clipper of at least its own dimension.
fn clip_allowed(target: &LayerInfo, clipper: &LayerInfo) -> bool {
    match (target.geometry(), clipper.geometry()) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(target), Some(clipper)) => target.can_be_clipped_by(clipper),
    }
}

async fn validate_dissolve(
    checks: &CatalogChecks<'_>,
    args: &DissolveArgs,
) -> Result<(), AdmissionError> {
    rules::require(&args.input_table, "input_table")?;
    if args.fields.is_empty() {
        return Err(AdmissionError::invalid("fields must be an array of string"));
    }
    rules::require(&args.output_table, "output_table")?;
    rules::dissolve_fields(&args.fields)?;
    rules::output_table(&args.output_table)?;

    let input = checks
        .registered(
            &args.input_table,
            "Input table does not exist in vector_tiles".to_string(),
        )
        .await?;
    if !input.geometry().is_some_and(|g| g.is_polygonal()) {
        return Err(AdmissionError::invalid(
            "Input table must be Polygon or MultiPolygon",
        ));
    }
    checks.physical(&args.input_table).await?;
    checks.output_available(&args.output_table).await?;

    let present = checks
        .catalog
        .columns_of(&args.input_table, &args.fields)
        .await
        .map_err(AdmissionError::CatalogUnavailable)?;
    if let Some(missing) = args.fields.iter().find(|field| !present.contains(field)) {
        return Err(AdmissionError::invalid(format!(
            "Field \"{}\" does not exist in table \"{}\"",
            missing, args.input_table
        )));
    }
    Ok(())
}

async fn validate_merge(
    checks: &CatalogChecks<'_>,
    args: &MultiInputArgs,
) -> Result<(), AdmissionError> {
    rules::distinct_inputs(&args.input_table)?;
    rules::output_table(&args.output_table)?;

    let layers = checks.inputs(&args.input_table).await?;
    let first = &layers[0].geometry_type;
    if layers.iter().any(|layer| &layer.geometry_type != first) {
        return Err(AdmissionError::invalid(
            "Input tables must have identical geometry type",
        ));
    }

    let columns = checks
        .catalog
        .column_types(&args.input_table)
        .await
        .map_err(AdmissionError::CatalogUnavailable)?;
    let mut seen: HashMap<&str, (&str, &str)> = HashMap::new();
    for column in &columns {
        let name = column.column_name.as_str();
        if let Some(&(table, data_type)) = seen.get(name) {
            if data_type != column.data_type {
                return Err(AdmissionError::invalid(format!(
                    "One of the merged column has same name but different type: {}.{} is {}, but {}.{} is {}",
                    column.table_name, name, column.data_type, table, name, data_type
                )));
            }
        }
        seen.insert(name, (&column.table_name, &column.data_type));
    }

    checks.output_available(&args.output_table).await
}

/// `union`, `intersect` and `difference`: any standard vector inputs.
async fn validate_standard_inputs(
    checks: &CatalogChecks<'_>,
    args: &MultiInputArgs,
) -> Result<(), AdmissionError> {
    rules::distinct_inputs(&args.input_table)?;
    rules::output_table(&args.output_table)?;

    let layers = checks.inputs(&args.input_table).await?;
    if layers.iter().any(|layer| layer.geometry().is_none()) {
        return Err(AdmissionError::invalid(
            "Input tables must be Polygon, MultiPolygon, LineString, MultiLineString, Point, or MultiPoint",
        ));
    }

    checks.output_available(&args.output_table).await
}

async fn validate_spatial_join(
    checks: &CatalogChecks<'_>,
    args: &SpatialJoinArgs,
) -> Result<(), AdmissionError> {
    rules::require(&args.target_table, "target_table")?;
    rules::require(&args.join_table, "join_table")?;
    rules::distinct_pair(&args.target_table, "target_table", &args.join_table, "join_table")?;
    rules::output_table(&args.output_table)?;

    checks
        .registered(
            &args.target_table,
            "Target table does not exist in vector_tiles".to_string(),
        )
        .await?;
    checks
        .registered(
            &args.join_table,
            "Join table does not exist in vector_tiles".to_string(),
        )
        .await?;
    checks.physical(&args.target_table).await?;
    checks.physical(&args.join_table).await?;
    checks.output_available(&args.output_table).await
}

async fn validate_export(
    checks: &CatalogChecks<'_>,
    args: &ExportArgs,
) -> Result<(), AdmissionError> {
    rules::require(&args.table_name, "table_name")?;
    checks
        .registered(
            &args.table_name,
            format!("Layer {} does not exist", args.table_name),
        )
        .await?;

    if ExportFormat::from_str(&args.format).is_none() {
        let supported: Vec<&str> = ExportFormat::ALL.iter().map(|f| f.as_str()).collect();
        return Err(AdmissionError::invalid(format!(
            "Invalid format. Supported formats are: {}",
            supported.join(", ")
        )));
    }
    Ok(())
}

fn validate_import(args: &ImportArgs) -> Result<(), AdmissionError> {
    rules::require(&args.object_key, "object_key")?;
    rules::require(&args.table_name, "table_name")?;

    for (field, zoom) in [("minzoom", args.minzoom), ("maxzoom", args.maxzoom)] {
        if let Some(zoom) = zoom {
            if !ZOOM_RANGE.contains(&zoom) {
                return Err(AdmissionError::invalid(format!(
                    "{} must be between {} and {}",
                    field,
                    ZOOM_RANGE.start(),
                    ZOOM_RANGE.end()
                )));
            }
        }
    }
    if let (Some(min), Some(max)) = (args.minzoom, args.maxzoom) {
        if min > max {
            return Err(AdmissionError::invalid("minzoom must not exceed maxzoom"));
        }
    }
    Ok(())
}
