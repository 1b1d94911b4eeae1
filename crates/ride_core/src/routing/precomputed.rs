//! Pre-computed route table keyed by H3 cell pairs.
//!
//! Lets a session replay recorded routes offline. Lookups quantize both
//! endpoints to [`TABLE_RESOLUTION`], so a recorded route answers any request
//! whose endpoints fall in the same pair of cells.

use std::collections::HashMap;
use std::fs;

use h3o::Resolution;
use serde::{Deserialize, Serialize};

use super::{RoutePath, RouteProvider};
use crate::error::RoutingError;
use crate::geo::Coordinate;

/// Resolution 12 cells are roughly 10 m across.
pub const TABLE_RESOLUTION: Resolution = Resolution::Twelve;

/// A serializable key for the route table.
/// CellIndex is a u64 internally, so we store the raw values.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct CellPair(pub u64, pub u64);

impl CellPair {
    pub fn from_coordinates(origin: Coordinate, destination: Coordinate) -> Option<Self> {
        let from = origin.to_cell(TABLE_RESOLUTION)?;
        let to = destination.to_cell(TABLE_RESOLUTION)?;
        Some(Self(from.into(), to.into()))
    }
}

/// Pre-computed route table: a HashMap of cell-pair → RoutePath loaded from disk.
pub struct PrecomputedRouteProvider {
    table: HashMap<CellPair, RoutePath>,
}

impl PrecomputedRouteProvider {
    /// Load from a bincode-serialized file.
    pub fn from_file(path: &str) -> Result<Self, RoutingError> {
        let data = fs::read(path).map_err(|err| {
            RoutingError::InvalidResponse(format!("failed to read route table '{path}': {err}"))
        })?;
        let table: HashMap<CellPair, RoutePath> = bincode::deserialize(&data).map_err(|err| {
            RoutingError::InvalidResponse(format!("invalid route table '{path}': {err}"))
        })?;
        Ok(Self { table })
    }

    /// Create from an in-memory table (useful for tests).
    pub fn from_table(table: HashMap<CellPair, RoutePath>) -> Self {
        Self { table }
    }

    /// Record a path under the cells of its first and last points.
    pub fn insert(&mut self, path: RoutePath) -> bool {
        let (Some(first), Some(last)) = (path.points.first(), path.points.last()) else {
            return false;
        };
        let Some(key) = CellPair::from_coordinates(*first, *last) else {
            return false;
        };
        self.table.insert(key, path);
        true
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Serialize the table to a file.
    pub fn save_to_file(&self, path: &str) -> Result<(), RoutingError> {
        let data = bincode::serialize(&self.table).map_err(|err| {
            RoutingError::InvalidResponse(format!("failed to encode route table: {err}"))
        })?;
        fs::write(path, data).map_err(|err| {
            RoutingError::InvalidResponse(format!("failed to write route table '{path}': {err}"))
        })
    }
}

impl RouteProvider for PrecomputedRouteProvider {
    fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        _allow_alternates: bool,
    ) -> Result<Vec<RoutePath>, RoutingError> {
        let key = CellPair::from_coordinates(origin, destination).ok_or(RoutingError::NoRoute)?;
        self.table
            .get(&key)
            .map(|path| vec![path.clone()])
            .ok_or(RoutingError::NoRoute)
    }
}
