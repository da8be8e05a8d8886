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

//! Structural rules shared by the operation validators.
//!
//! Nothing here touches the catalog.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::AdmissionError;

/// Output table names: letter or underscore first, 2 to 50 characters total.
static TABLE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{1,49}$").expect("table name pattern is valid")
});

/// Columns every loaded layer carries; they cannot be dissolved by.
pub const RESERVED_COLUMNS: [&str; 2] = ["ogc_fid", "geom"];

pub const INVALID_OUTPUT_NAME: &str = "output_table must be alphanumeric and underscore only, starts with letter or underscore, and does not exceed 50 characters";

pub const MULTI_INPUT_SHAPE: &str =
    "input_table must be an array of string with minimum length of 2";

pub fn is_valid_table_name(name: &str) -> bool {
    TABLE_NAME.is_match(name)
}

/// Fails with `<field> is required` when `value` is empty.
pub fn require(value: &str, field: &str) -> Result<(), AdmissionError> {
    if value.is_empty() {
        return Err(AdmissionError::invalid(format!("{} is required", field)));
    }
    Ok(())
}

/// Checks the output table is present and well formed.
pub fn output_table(name: &str) -> Result<(), AdmissionError> {
    require(name, "output_table")?;
    if !is_valid_table_name(name) {
        return Err(AdmissionError::invalid(INVALID_OUTPUT_NAME));
    }
    Ok(())
}

/// `first` and `second` must name different tables.
pub fn distinct_pair(
    first: &str,
    first_field: &str,
    second: &str,
    second_field: &str,
) -> Result<(), AdmissionError> {
    if first == second {
        return Err(AdmissionError::invalid(format!(
            "{} must be different than {}",
            second_field, first_field
        )));
    }
    Ok(())
}

/// At least two inputs, none repeated.
pub fn distinct_inputs(tables: &[String]) -> Result<(), AdmissionError> {
    if tables.len() < 2 {
        return Err(AdmissionError::invalid(MULTI_INPUT_SHAPE));
    }
    let unique: HashSet<&str> = tables.iter().map(String::as_str).collect();
    if unique.len() != tables.len() {
        return Err(AdmissionError::invalid(
            "input_table must not have duplicate value",
        ));
    }
    Ok(())
}

/// Dissolve fields may not name the reserved columns.
pub fn dissolve_fields(fields: &[String]) -> Result<(), AdmissionError> {
    if fields.is_empty() {
        return Err(AdmissionError::invalid("fields must be an array of string"));
    }
    if fields
        .iter()
        .any(|field| RESERVED_COLUMNS.contains(&field.as_str()))
    {
        return Err(AdmissionError::invalid(
            "Dissolve field must not include ogc_fid nor geom",
        ));
    }
    Ok(())
}
