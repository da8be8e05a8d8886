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

//! Typed job requests.
//!
//! A [`JobRequest`] is the in-memory job descriptor: one variant per operation
//! kind, each with its own argument struct. [`JobRequest::from_body`] only
//! gives a JSON request body its Rust shape; every rule about the values
//! themselves lives in [`super::validator`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::AdmissionError;

/// The kinds of job this crate can admit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Clip,
    Dissolve,
    Merge,
    Union,
    Intersect,
    SpatialJoin,
    Difference,
    /// Layer download, produced for any authenticated user
    Export,
    /// Uploaded file marked ready, produced by the host platform
    Import,
}

impl OperationKind {
    /// The seven geoprocessing operations.
    pub const GEOPROCESSING: [OperationKind; 7] = [
        OperationKind::Clip,
        OperationKind::Dissolve,
        OperationKind::Merge,
        OperationKind::Union,
        OperationKind::Intersect,
        OperationKind::SpatialJoin,
        OperationKind::Difference,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Clip => "clip",
            OperationKind::Dissolve => "dissolve",
            OperationKind::Merge => "merge",
            OperationKind::Union => "union",
            OperationKind::Intersect => "intersect",
            OperationKind::SpatialJoin => "spatial_join",
            OperationKind::Difference => "difference",
            OperationKind::Export => "export",
            OperationKind::Import => "import",
        }
    }

    /// The route segment the operation is served under.
    pub fn route(&self) -> &'static str {
        match self {
            OperationKind::SpatialJoin => "spatial-join",
            other => other.as_str(),
        }
    }

    /// Parses either the route segment or the snake case name.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "clip" => Some(OperationKind::Clip),
            "dissolve" => Some(OperationKind::Dissolve),
            "merge" => Some(OperationKind::Merge),
            "union" => Some(OperationKind::Union),
            "intersect" => Some(OperationKind::Intersect),
            "spatial-join" | "spatial_join" => Some(OperationKind::SpatialJoin),
            "difference" => Some(OperationKind::Difference),
            "export" => Some(OperationKind::Export),
            "import" => Some(OperationKind::Import),
            _ => None,
        }
    }

    /// Geoprocessing jobs need an administrator or the internal role.
    pub fn requires_internal_role(&self) -> bool {
        OperationKind::GEOPROCESSING.contains(self)
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Arguments of a `clip` job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClipArgs {
    pub input_table: String,
    pub clip_table: String,
    pub output_table: String,
    /// Attribute filter, passed through to the worker untouched
    pub filter: Option<Vec<Value>>,
}

/// Arguments of a `dissolve` job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DissolveArgs {
    pub input_table: String,
    /// Columns to dissolve by
    pub fields: Vec<String>,
    pub output_table: String,
    pub filter: Option<Vec<Value>>,
}

/// Arguments shared by `merge`, `union`, `intersect` and `difference`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiInputArgs {
    pub input_table: Vec<String>,
    pub output_table: String,
}

/// Arguments of a `spatial_join` job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpatialJoinArgs {
    pub target_table: String,
    pub join_table: String,
    pub output_table: String,
    pub filter: Option<Vec<Value>>,
}

/// Arguments of an `export` job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportArgs {
    pub table_name: String,
    /// Requested file format; checked against [`ExportFormat`] during validation
    pub format: String,
}

impl Default for ExportArgs {
    fn default() -> Self {
        Self {
            table_name: String::new(),
            format: ExportFormat::default().as_str().to_string(),
        }
    }
}

/// File formats a layer can be exported to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Gpkg,
    Kml,
    Geojson,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Gpkg, ExportFormat::Kml, ExportFormat::Geojson];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Gpkg => "gpkg",
            ExportFormat::Kml => "kml",
            ExportFormat::Geojson => "geojson",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "gpkg" => Some(ExportFormat::Gpkg),
            "kml" => Some(ExportFormat::Kml),
            "geojson" => Some(ExportFormat::Geojson),
            _ => None,
        }
    }
}

/// Arguments of an `import` job: an uploaded file that is ready to load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportArgs {
    /// Storage key of the uploaded object
    pub object_key: String,
    pub table_name: String,
    /// File extension as reported by the upload (`tif`, `zip`, `geojson`, ...)
    pub format_file: String,
    pub is_zipped: bool,
    pub raster_alias: Option<String>,
    pub minzoom: Option<i64>,
    pub maxzoom: Option<i64>,
    /// Identity of whoever uploaded the file
    pub uploader: Option<Uuid>,
}

/// A job descriptor: the operation kind with its typed arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "arguments", rename_all = "snake_case")]
pub enum JobRequest {
    Clip(ClipArgs),
    Dissolve(DissolveArgs),
    Merge(MultiInputArgs),
    Union(MultiInputArgs),
    Intersect(MultiInputArgs),
    SpatialJoin(SpatialJoinArgs),
    Difference(MultiInputArgs),
    Export(ExportArgs),
    Import(ImportArgs),
}

impl JobRequest {
    pub fn kind(&self) -> OperationKind {
        match self {
            JobRequest::Clip(_) => OperationKind::Clip,
            JobRequest::Dissolve(_) => OperationKind::Dissolve,
            JobRequest::Merge(_) => OperationKind::Merge,
            JobRequest::Union(_) => OperationKind::Union,
            JobRequest::Intersect(_) => OperationKind::Intersect,
            JobRequest::SpatialJoin(_) => OperationKind::SpatialJoin,
            JobRequest::Difference(_) => OperationKind::Difference,
            JobRequest::Export(_) => OperationKind::Export,
            JobRequest::Import(_) => OperationKind::Import,
        }
    }

    /// The output table the job would create, for operations that create one.
    pub fn output_table(&self) -> Option<&str> {
        match self {
            JobRequest::Clip(args) => Some(&args.output_table),
            JobRequest::Dissolve(args) => Some(&args.output_table),
            JobRequest::Merge(args)
            | JobRequest::Union(args)
            | JobRequest::Intersect(args)
            | JobRequest::Difference(args) => Some(&args.output_table),
            JobRequest::SpatialJoin(args) => Some(&args.output_table),
            JobRequest::Export(_) | JobRequest::Import(_) => None,
        }
    }

    /// Types a JSON request body for the given operation.
    ///
    /// Missing or `null` strings become empty so the rule set reports them as
    /// required. Only shape problems are rejected here.
    pub fn from_body(kind: OperationKind, body: &Value) -> Result<Self, AdmissionError> {
        let empty = Map::new();
        let body = body.as_object().unwrap_or(&empty);

        let request = match kind {
            OperationKind::Clip => JobRequest::Clip(ClipArgs {
                input_table: string_field(body, "input_table")?,
                clip_table: string_field(body, "clip_table")?,
                output_table: string_field(body, "output_table")?,
                filter: filter_field(body)?,
            }),
            OperationKind::Dissolve => JobRequest::Dissolve(DissolveArgs {
                input_table: string_field(body, "input_table")?,
                fields: fields_field(body)?,
                output_table: string_field(body, "output_table")?,
                filter: filter_field(body)?,
            }),
            OperationKind::Merge => JobRequest::Merge(multi_input(body)?),
            OperationKind::Union => JobRequest::Union(multi_input(body)?),
            OperationKind::Intersect => JobRequest::Intersect(multi_input(body)?),
            OperationKind::Difference => JobRequest::Difference(multi_input(body)?),
            OperationKind::SpatialJoin => JobRequest::SpatialJoin(SpatialJoinArgs {
                target_table: string_field(body, "target_table")?,
                join_table: string_field(body, "join_table")?,
                output_table: string_field(body, "output_table")?,
                filter: filter_field(body)?,
            }),
            OperationKind::Export => {
                let format = string_field(body, "format")?;
                JobRequest::Export(ExportArgs {
                    table_name: string_field(body, "table_name")?,
                    format: if format.is_empty() {
                        ExportFormat::default().as_str().to_string()
                    } else {
                        format
                    },
                })
            }
            OperationKind::Import => JobRequest::Import(ImportArgs {
                object_key: string_field(body, "object_key")?,
                table_name: string_field(body, "table_name")?,
                format_file: string_field(body, "format_file")?,
                is_zipped: body.get("is_zipped").and_then(Value::as_bool).unwrap_or(false),
                raster_alias: optional_string_field(body, "raster_alias")?,
                minzoom: integer_field(body, "minzoom")?,
                maxzoom: integer_field(body, "maxzoom")?,
                uploader: uuid_field(body, "uploader")?,
            }),
        };
        Ok(request)
    }
}

/// Renders a JSON value the way it is quoted back in rejection reasons.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn not_a_string(value: &Value, field: &str) -> AdmissionError {
    AdmissionError::invalid(format!(
        "Invalid value \"{}\" in {}. Must be string",
        display_value(value),
        field
    ))
}

fn string_field(body: &Map<String, Value>, field: &str) -> Result<String, AdmissionError> {
    Ok(optional_string_field(body, field)?.unwrap_or_default())
}

fn optional_string_field(
    body: &Map<String, Value>,
    field: &str,
) -> Result<Option<String>, AdmissionError> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(not_a_string(other, field)),
    }
}

fn integer_field(body: &Map<String, Value>, field: &str) -> Result<Option<i64>, AdmissionError> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .map(Some)
            .ok_or_else(|| AdmissionError::invalid(format!("{} must be an integer", field))),
    }
}

fn uuid_field(body: &Map<String, Value>, field: &str) -> Result<Option<Uuid>, AdmissionError> {
    match optional_string_field(body, field)? {
        None => Ok(None),
        Some(s) => Uuid::parse_str(&s)
            .map(Some)
            .map_err(|_| AdmissionError::invalid(format!("{} must be a UUID", field))),
    }
}

fn filter_field(body: &Map<String, Value>) -> Result<Option<Vec<Value>>, AdmissionError> {
    match body.get("filter") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items.clone())),
        Some(_) => Err(AdmissionError::invalid("filter must be array of object")),
    }
}

fn fields_field(body: &Map<String, Value>) -> Result<Vec<String>, AdmissionError> {
    let items = match body.get("fields") {
        Some(Value::Array(items)) if !items.is_empty() => items,
        _ => return Err(AdmissionError::invalid("fields must be an array of string")),
    };
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(s.clone()),
            other => Err(not_a_string(other, "fields")),
        })
        .collect()
}

fn multi_input(body: &Map<String, Value>) -> Result<MultiInputArgs, AdmissionError> {
    let tables = match body.get("input_table") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(not_a_string(other, "input_table")),
            })
            .collect::<Result<Vec<_>, _>>()?,
        _ => {
            return Err(AdmissionError::invalid(
                "input_table must be an array of string with minimum length of 2",
            ))
        }
    };
    Ok(MultiInputArgs {
        input_table: tables,
        output_table: string_field(body, "output_table")?,
    })
}
