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

//! Geometry types as reported by the layer catalog.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The standard vector geometry types a catalog layer can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GeometryType {
    Point,
    MultiPoint,
    LineString,
    MultiLineString,
    Polygon,
    MultiPolygon,
}

/// Topological dimension of a geometry: points are 0-D, lines 1-D, polygons 2-D.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dimension {
    Point = 0,
    Line = 1,
    Area = 2,
}

impl GeometryType {
    /// All standard types, in catalog order.
    pub const ALL: [GeometryType; 6] = [
        GeometryType::Point,
        GeometryType::MultiPoint,
        GeometryType::LineString,
        GeometryType::MultiLineString,
        GeometryType::Polygon,
        GeometryType::MultiPolygon,
    ];

    /// Returns the catalog spelling of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            GeometryType::Point => "POINT",
            GeometryType::MultiPoint => "MULTIPOINT",
            GeometryType::LineString => "LINESTRING",
            GeometryType::MultiLineString => "MULTILINESTRING",
            GeometryType::Polygon => "POLYGON",
            GeometryType::MultiPolygon => "MULTIPOLYGON",
        }
    }

    /// Parses the catalog spelling. Anything else (`GEOMETRY`,
    /// `GEOMETRYCOLLECTION`, lower case, ...) is not a standard type.
    pub fn from_catalog(s: &str) -> Option<Self> {
        match s {
            "POINT" => Some(GeometryType::Point),
            "MULTIPOINT" => Some(GeometryType::MultiPoint),
            "LINESTRING" => Some(GeometryType::LineString),
            "MULTILINESTRING" => Some(GeometryType::MultiLineString),
            "POLYGON" => Some(GeometryType::Polygon),
            "MULTIPOLYGON" => Some(GeometryType::MultiPolygon),
            _ => None,
        }
    }

    pub fn dimension(&self) -> Dimension {
        match self {
            GeometryType::Point | GeometryType::MultiPoint => Dimension::Point,
            GeometryType::LineString | GeometryType::MultiLineString => Dimension::Line,
            GeometryType::Polygon | GeometryType::MultiPolygon => Dimension::Area,
        }
    }

    pub fn is_polygonal(&self) -> bool {
        self.dimension() == Dimension::Area
    }

    /// Whether a layer of type `clipper` may clip a layer of this type.
    ///
    /// The clipper must have at least the target's dimension: polygons clip
    /// anything, lines clip lines and points, points clip only points.
    pub fn can_be_clipped_by(&self, clipper: GeometryType) -> bool {
        clipper.dimension() >= self.dimension()
    }
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<GeometryType> for String {
    fn from(geometry_type: GeometryType) -> Self {
        geometry_type.as_str().to_string()
    }
}
