//! Turns raw per-cell layers into one weighted suitability grid and a binary
//! divider grid marking hard exclusions for connectivity analysis.

use crate::config::ScoreWeights;
use crate::error::ScoreError;
use crate::grid::{self, Grid, NO_DATA};
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cell reclassified as invalid or out of range by a criterion.
pub const OUT_OF_BOUNDS: f64 = -10.0;
/// Cell that must never be built on (water, steep ground).
pub const HARD_EXCLUDE: f64 = -5000.0;
/// Strongly discouraged cell (wet land cover, building setback, rail and driveway setback).
pub const STRONG_PENALTY: f64 = -1000.0;
/// Built-up land cover.
pub const BUILT_PENALTY: f64 = -1750.0;

pub const DIVIDER_EXCLUDED: f64 = -1000.0;
pub const DIVIDER_INCLUDED: f64 = 100.0;

const BUILDING_BUFFER: f64 = 50.0;
const WATER_SETBACK: f64 = 9.0;
const BARRIER_SETBACK: f64 = 10.0;
const ACCUMULATION_LIMIT: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Landcover,
    Slope,
    Aspect,
    Water,
    Roads,
    Buildings,
    ThreePhase,
    Boundary,
    Rail,
    Driveway,
    Accumulation,
}

impl Layer {
    pub const REQUIRED: [Layer; 8] = [
        Layer::Landcover,
        Layer::Slope,
        Layer::Aspect,
        Layer::Water,
        Layer::Roads,
        Layer::Buildings,
        Layer::ThreePhase,
        Layer::Boundary,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Layer::Landcover => "landcover",
            Layer::Slope => "slope",
            Layer::Aspect => "aspect",
            Layer::Water => "water",
            Layer::Roads => "roads",
            Layer::Buildings => "buildings",
            Layer::ThreePhase => "three_phase",
            Layer::Boundary => "boundary",
            Layer::Rail => "rail",
            Layer::Driveway => "driveway",
            Layer::Accumulation => "accumulation",
        }
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Parcel as it arrives over the wire: nested rows per layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParcelInput {
    #[serde(default)]
    pub id: Option<String>,
    pub layers: BTreeMap<Layer, Vec<Vec<f64>>>,
}

/// Co-registered raw layers of one parcel.
#[derive(Debug, Clone, Default)]
pub struct ParcelLayers {
    layers: BTreeMap<Layer, Grid>,
}

impl ParcelLayers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, layer: Layer, grid: Grid) -> Self {
        self.insert(layer, grid);
        self
    }

    pub fn insert(&mut self, layer: Layer, grid: Grid) {
        self.layers.insert(layer, grid);
    }

    pub fn get(&self, layer: Layer) -> Result<&Grid, ScoreError> {
        self.layers
            .get(&layer)
            .ok_or(ScoreError::MissingLayer { layer })
    }

    pub fn from_rows(rows: BTreeMap<Layer, Vec<Vec<f64>>>) -> Result<Self, ScoreError> {
        let mut parcel = Self::new();
        for (layer, data) in rows {
            let height = data.len();
            let width = data.first().map_or(0, Vec::len);
            if let Some((i, row)) = data.iter().enumerate().find(|(_, r)| r.len() != width) {
                return Err(ScoreError::MalformedLayer {
                    layer,
                    reason: format!("row {i} has {} cells, expected {width}", row.len()),
                });
            }
            let flat: Vec<f64> = data.into_iter().flatten().collect();
            let grid = Array2::from_shape_vec((height, width), flat).map_err(|e| {
                ScoreError::MalformedLayer {
                    layer,
                    reason: e.to_string(),
                }
            })?;
            parcel.insert(layer, grid);
        }
        Ok(parcel)
    }

    /// Smallest extent shared by every supplied layer.
    fn common_shape(&self) -> (usize, usize) {
        let rows = self.layers.values().map(|g| g.nrows()).min().unwrap_or(0);
        let cols = self.layers.values().map(|g| g.ncols()).min().unwrap_or(0);
        (rows, cols)
    }
}

/// Output of the score engine. Read-only once built.
#[derive(Debug, Clone)]
pub struct ParcelScore {
    pub score: Grid,
    pub divider: Grid,
}

pub fn landcover_score(classes: &Grid) -> Grid {
    classes.mapv(|class| match class {
        c if c > 7.0 => 0.0,
        c if c == 1.0 || c == 2.0 => STRONG_PENALTY,
        c if c == 3.0 => 90.0,
        c if c == 4.0 || c == 5.0 => 100.0,
        c if c == 6.0 || c == 7.0 => BUILT_PENALTY,
        c => c,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Facing {
    North,
    Lateral,
    South,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pitch {
    Shallow,
    Medium,
    Steep,
}

fn facing(aspect: f64) -> Option<Facing> {
    // Flat cells carry a negative aspect and count as south-facing.
    let a = if aspect < 0.0 { 180.0 } else { aspect };
    if (a > 0.0 && a < 37.5) || a > 325.5 {
        Some(Facing::North)
    } else if (a > 37.5 && a < 127.5) || (a > 235.5 && a < 325.5) {
        Some(Facing::Lateral)
    } else if (127.5..=235.5).contains(&a) {
        Some(Facing::South)
    } else {
        None
    }
}

fn pitch(slope: f64) -> Option<Pitch> {
    if slope > 0.0 && slope <= 2.86 {
        Some(Pitch::Shallow)
    } else if slope > 2.86 && slope <= 6.84 {
        Some(Pitch::Medium)
    } else if slope > 6.84 {
        Some(Pitch::Steep)
    } else {
        None
    }
}

fn topo_cell(aspect: f64, slope: f64) -> f64 {
    match (facing(aspect), pitch(slope)) {
        (Some(Facing::South), Some(Pitch::Shallow)) => 95.0,
        (Some(Facing::South), Some(Pitch::Medium)) => 100.0,
        (Some(Facing::Lateral), Some(Pitch::Shallow)) => 90.0,
        (Some(Facing::Lateral), Some(Pitch::Medium)) => 75.0,
        (Some(Facing::North), Some(Pitch::Shallow)) => 75.0,
        (Some(_), Some(Pitch::Steep)) | (Some(Facing::North), Some(Pitch::Medium)) => HARD_EXCLUDE,
        _ => OUT_OF_BOUNDS,
    }
}

/// Facing crossed with slope band. Both grids must share a shape.
pub fn topo_score(aspect: &Grid, slope: &Grid) -> Grid {
    Zip::from(aspect)
        .and(slope)
        .map_collect(|&a, &s| topo_cell(a, s))
}

/// Closer is better: 100 at distance 0 falling to 0 at the farthest cell.
/// Cells scoring above 99.9 (the feature itself and no-data cells) are out of bounds.
pub fn proximity_score(distance: &Grid) -> Grid {
    let max = distance.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(max > 0.0) {
        return Grid::from_elem(distance.dim(), OUT_OF_BOUNDS);
    }
    distance.mapv(|d| {
        let s = 100.0 - d / max * 100.0;
        if s > 99.9 { OUT_OF_BOUNDS } else { s }
    })
}

pub fn water_score(distance: &Grid) -> Grid {
    distance.mapv(|d| {
        if d < 0.0 {
            OUT_OF_BOUNDS
        } else if d >= WATER_SETBACK {
            0.0
        } else if d >= 0.0 {
            HARD_EXCLUDE
        } else {
            d
        }
    })
}

/// Penalises cells inside the building buffer; anything past it scores 0.
pub fn building_score(distance: &Grid) -> Grid {
    distance.mapv(|d| {
        if d < 0.0 {
            return OUT_OF_BOUNDS;
        }
        let buffered = d - BUILDING_BUFFER;
        if buffered < -30.0 {
            STRONG_PENALTY
        } else if buffered >= 0.0 {
            0.0
        } else {
            buffered
        }
    })
}

/// Rail and driveway setbacks.
pub fn barrier_score(distance: &Grid) -> Grid {
    distance.mapv(|d| {
        if d < 0.0 {
            OUT_OF_BOUNDS
        } else if d > BARRIER_SETBACK {
            0.0
        } else if d > 0.0 {
            STRONG_PENALTY
        } else {
            d
        }
    })
}

pub fn accumulation_score(units: &Grid) -> Grid {
    units.mapv(|u| {
        if u < 0.0 {
            OUT_OF_BOUNDS
        } else if u > ACCUMULATION_LIMIT {
            STRONG_PENALTY
        } else if u > 0.0 {
            0.0
        } else {
            u
        }
    })
}

/// Negative → excluded, everything else included.
pub fn divider_mask(water: &Grid, roads: &Grid) -> Grid {
    Zip::from(water).and(roads).map_collect(|&w, &r| {
        if w + r < 0.0 {
            DIVIDER_EXCLUDED
        } else {
            DIVIDER_INCLUDED
        }
    })
}

pub fn score_parcel(layers: &ParcelLayers, weights: &ScoreWeights) -> Result<ParcelScore, ScoreError> {
    for layer in Layer::REQUIRED {
        layers.get(layer)?;
    }
    // Any empty layer, optional ones included, collapses the common shape.
    if let Some((&layer, _)) = layers.layers.iter().find(|(_, g)| g.is_empty()) {
        return Err(ScoreError::EmptyLayer { layer });
    }
    let (rows, cols) = layers.common_shape();
    let cropped = |layer: Layer| -> Result<Grid, ScoreError> {
        Ok(grid::crop(layers.get(layer)?, rows, cols))
    };

    let water = water_score(&cropped(Layer::Water)?) * weights.water;
    let roads = proximity_score(&cropped(Layer::Roads)?) * weights.roads;

    let mut total = Grid::zeros((rows, cols));
    total.scaled_add(weights.landcover, &landcover_score(&cropped(Layer::Landcover)?));
    total.scaled_add(
        weights.topo,
        &topo_score(&cropped(Layer::Aspect)?, &cropped(Layer::Slope)?),
    );
    total += &roads;
    total.scaled_add(weights.buildings, &building_score(&cropped(Layer::Buildings)?));
    total.scaled_add(weights.three_phase, &proximity_score(&cropped(Layer::ThreePhase)?));
    total += &water;
    total.scaled_add(weights.boundary, &proximity_score(&cropped(Layer::Boundary)?));

    let optional = [
        (Layer::Rail, weights.rail),
        (Layer::Driveway, weights.driveway),
        (Layer::Accumulation, weights.accumulation),
    ];
    for (layer, weight) in optional {
        let Ok(raw) = cropped(layer) else { continue };
        let scored = match layer {
            Layer::Accumulation => accumulation_score(&raw),
            _ => barrier_score(&raw),
        };
        total.scaled_add(weight, &scored);
    }

    // The dominant value is the homogeneous background, normally no-data.
    if let Some(background) = grid::mode(&total) {
        total.mapv_inplace(|v| if v == background { NO_DATA } else { v });
    }

    let divider = divider_mask(&water, &roads);
    tracing::debug!(rows, cols, "scored parcel");
    Ok(ParcelScore {
        score: total,
        divider,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    /// 10x10 parcel whose centre 4x4 block is flat south-facing grass far from
    /// water and buildings; the surrounding ring is no-data.
    fn ringed_parcel() -> ParcelLayers {
        let inside = |r: usize, c: usize| (3..7).contains(&r) && (3..7).contains(&c);
        let layer = |value: f64| {
            Grid::from_shape_fn((10, 10), |(r, c)| if inside(r, c) { value } else { -1.0 })
        };
        ParcelLayers::new()
            .with(Layer::Landcover, layer(4.0))
            .with(Layer::Slope, layer(1.0))
            .with(Layer::Aspect, layer(180.0))
            .with(Layer::Water, layer(20.0))
            .with(Layer::Roads, layer(10.0))
            .with(Layer::Buildings, layer(100.0))
            .with(Layer::ThreePhase, layer(10.0))
            .with(Layer::Boundary, layer(10.0))
    }

    #[test]
    fn test_landcover_classes() {
        for shape in [(1, 1), (3, 5), (8, 2)] {
            let ones = landcover_score(&Grid::from_elem(shape, 1.0));
            assert!(ones.iter().all(|&v| v == -1000.0));
            let fours = landcover_score(&Grid::from_elem(shape, 4.0));
            assert!(fours.iter().all(|&v| v == 100.0));
        }
        let classes = array![[0.0, 1.0, 2.0, 3.0, 4.0], [5.0, 6.0, 7.0, 8.0, 250.0]];
        assert_eq!(
            landcover_score(&classes),
            array![[0.0, -1000.0, -1000.0, 90.0, 100.0], [100.0, -1750.0, -1750.0, 0.0, 0.0]]
        );
    }

    #[test]
    fn test_topo_combinations() {
        let aspect = array![[180.0, 180.0, 180.0, 90.0, 300.0, 90.0, 10.0, 350.0, 10.0]];
        let slope = array![[1.0, 5.0, 10.0, 1.0, 5.0, 10.0, 1.0, 5.0, 10.0]];
        assert_eq!(
            topo_score(&aspect, &slope),
            array![[95.0, 100.0, -5000.0, 90.0, 75.0, -5000.0, 75.0, -5000.0, -5000.0]]
        );
    }

    #[test]
    fn test_topo_flat_aspect_defaults_south() {
        let aspect = array![[-1.0, -1.0]];
        let slope = array![[2.0, 4.0]];
        assert_eq!(topo_score(&aspect, &slope), array![[95.0, 100.0]]);
    }

    #[test]
    fn test_topo_unclassified_is_out_of_bounds() {
        // zero slope, aspect exactly on a sector edge, aspect of 0
        let aspect = array![[180.0, 37.5, 0.0]];
        let slope = array![[0.0, 1.0, 1.0]];
        assert_eq!(topo_score(&aspect, &slope), array![[-10.0, -10.0, -10.0]]);
    }

    #[test]
    fn test_proximity_inverts_distance() {
        let d = array![[0.0, 50.0, 100.0, -1.0]];
        let s = proximity_score(&d);
        assert_eq!(s[[0, 0]], OUT_OF_BOUNDS);
        assert_relative_eq!(s[[0, 1]], 50.0);
        assert_relative_eq!(s[[0, 2]], 0.0);
        assert_eq!(s[[0, 3]], OUT_OF_BOUNDS);
    }

    #[test]
    fn test_proximity_without_positive_distance() {
        let s = proximity_score(&Grid::from_elem((2, 2), -1.0));
        assert!(s.iter().all(|&v| v == OUT_OF_BOUNDS));
    }

    #[test]
    fn test_water_setback() {
        let d = array![[0.0, 0.5, 8.9, 9.0, 40.0, -1.0]];
        assert_eq!(
            water_score(&d),
            array![[-5000.0, -5000.0, -5000.0, 0.0, 0.0, -10.0]]
        );
    }

    #[test]
    fn test_building_buffer() {
        let d = array![[-1.0, 0.0, 19.0, 20.0, 35.0, 50.0, 80.0]];
        assert_eq!(
            building_score(&d),
            array![[-10.0, -1000.0, -1000.0, -30.0, -15.0, 0.0, 0.0]]
        );
    }

    #[test]
    fn test_barrier_and_accumulation() {
        let d = array![[-1.0, 0.0, 5.0, 10.0, 11.0]];
        assert_eq!(barrier_score(&d), array![[-10.0, 0.0, -1000.0, -1000.0, 0.0]]);
        let acc = array![[-1.0, 0.0, 500.0, 1000.0, 1001.0]];
        assert_eq!(accumulation_score(&acc), array![[-10.0, 0.0, 0.0, 0.0, -1000.0]]);
    }

    #[test]
    fn test_divider_binarises_sign() {
        let water = array![[0.0, -5000.0, 0.0]];
        let roads = array![[25.0, 40.0, -5.0]];
        assert_eq!(
            divider_mask(&water, &roads),
            array![[DIVIDER_INCLUDED, DIVIDER_EXCLUDED, DIVIDER_EXCLUDED]]
        );
    }

    #[test]
    fn test_score_parcel_collapses_background() {
        let scored = score_parcel(&ringed_parcel(), &ScoreWeights::default()).unwrap();
        assert_eq!(scored.score.dim(), (10, 10));
        for ((r, c), &v) in scored.score.indexed_iter() {
            if (3..7).contains(&r) && (3..7).contains(&c) {
                // grass 100 * 0.8 + south flat 95; every distance term is 0
                assert_relative_eq!(v, 175.0);
                assert_eq!(scored.divider[[r, c]], DIVIDER_INCLUDED);
            } else {
                assert_eq!(v, NO_DATA);
                assert_eq!(scored.divider[[r, c]], DIVIDER_EXCLUDED);
            }
        }
    }

    #[test]
    fn test_score_parcel_crops_to_common_shape() {
        let mut layers = ringed_parcel();
        let wide = Grid::from_elem((12, 15), 4.0);
        layers.insert(Layer::Landcover, wide);
        let scored = score_parcel(&layers, &ScoreWeights::default()).unwrap();
        assert_eq!(scored.score.dim(), (10, 10));
        assert_eq!(scored.divider.dim(), (10, 10));
    }

    #[test]
    fn test_optional_layers_contribute() {
        let base = score_parcel(&ringed_parcel(), &ScoreWeights::default()).unwrap();
        let rail = Grid::from_shape_fn((10, 10), |(r, c)| {
            if r == 3 && (3..7).contains(&c) { 5.0 } else { 50.0 }
        });
        let layers = ringed_parcel().with(Layer::Rail, rail);
        let scored = score_parcel(&layers, &ScoreWeights::default()).unwrap();
        assert_relative_eq!(scored.score[[3, 3]], base.score[[3, 3]] - 1000.0);
        assert_relative_eq!(scored.score[[5, 5]], base.score[[5, 5]]);
    }

    #[test]
    fn test_every_criterion_is_weighted() {
        // one cell in the block carries each distance maximum, the rest share
        // known mid-range distances
        let inside = |r: usize, c: usize| (3..7).contains(&r) && (3..7).contains(&c);
        let distance = |typical: f64, max: f64| {
            Grid::from_shape_fn((10, 10), |(r, c)| match (r, c) {
                (3, 3) => max,
                _ if inside(r, c) => typical,
                _ => -1.0,
            })
        };
        let layers = ringed_parcel()
            .with(Layer::Roads, distance(50.0, 100.0))
            .with(Layer::Buildings, distance(35.0, 35.0))
            .with(Layer::ThreePhase, distance(20.0, 80.0))
            .with(Layer::Boundary, distance(30.0, 60.0));
        let scored = score_parcel(&layers, &ScoreWeights::default()).unwrap();

        // landcover 100 * 0.8, topo 95 * 1.0, roads 50 * 0.5, buildings -15 * 1.5,
        // three-phase 75 * 0.8, boundary 50 * 1.0, water 0
        let expected = 80.0 + 95.0 + 25.0 - 22.5 + 60.0 + 50.0;
        assert_relative_eq!(scored.score[[5, 5]], expected, max_relative = 1e-12);
        assert_relative_eq!(scored.score[[4, 6]], expected, max_relative = 1e-12);
        assert_eq!(scored.score[[0, 0]], NO_DATA);

        let doubled = ScoreWeights {
            roads: 1.0,
            buildings: 3.0,
            ..ScoreWeights::default()
        };
        let reweighted = score_parcel(&layers, &doubled).unwrap();
        assert_relative_eq!(
            reweighted.score[[5, 5]],
            expected + 25.0 - 22.5,
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_empty_optional_layer_is_data_unavailable() {
        let layers = ringed_parcel().with(Layer::Rail, Grid::zeros((0, 0)));
        assert_eq!(
            score_parcel(&layers, &ScoreWeights::default()).unwrap_err(),
            ScoreError::EmptyLayer { layer: Layer::Rail }
        );
    }

    #[test]
    fn test_missing_layer_is_data_unavailable() {
        let mut layers = ParcelLayers::new();
        for layer in Layer::REQUIRED.into_iter().filter(|&l| l != Layer::Slope) {
            layers.insert(layer, Grid::zeros((4, 4)));
        }
        assert_eq!(
            score_parcel(&layers, &ScoreWeights::default()).unwrap_err(),
            ScoreError::MissingLayer {
                layer: Layer::Slope
            }
        );
    }

    #[test]
    fn test_from_rows_rejects_ragged_layer() {
        let mut rows = BTreeMap::new();
        rows.insert(Layer::Water, vec![vec![1.0, 2.0], vec![3.0]]);
        let err = ParcelLayers::from_rows(rows).unwrap_err();
        assert!(matches!(
            err,
            ScoreError::MalformedLayer {
                layer: Layer::Water,
                ..
            }
        ));
    }

    #[test]
    fn test_parcel_input_json() {
        let input: ParcelInput = serde_json::from_str(
            r#"{"id": "p7", "layers": {"three_phase": [[1, 2], [3, 4]], "slope": [[0.5, 1.5], [2.5, 3.5]]}}"#,
        )
        .unwrap();
        assert_eq!(input.id.as_deref(), Some("p7"));
        let layers = ParcelLayers::from_rows(input.layers).unwrap();
        assert_eq!(layers.get(Layer::ThreePhase).unwrap()[[1, 0]], 3.0);
        assert!(layers.get(Layer::Roads).is_err());
    }
}
