//! Image selection by survey boundary.
//!
//! Reads a metadata CSV and moves every listed image that lies inside a
//! GeoJSON boundary into a `keep/` folder next to the images, so that only
//! the images over the basin are handed to photogrammetry.

use std::fs;
use std::path::{Path, PathBuf};

use geo::{Contains, MultiPolygon, Point};
use geojson::GeoJson;
use thiserror::Error;

use crate::core::loaders::{read_metadata_csv, LoaderError};
use crate::core::writers::OutputRow;

/// Name of the folder receiving the selected images.
pub const KEEP_DIR: &str = "keep";

/// Errors that can occur during filtering operations.
#[derive(Debug, Error)]
pub enum FilteringError {
    #[error("Failed to read boundary file '{}': {source}", .path.display())]
    BoundaryRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid boundary: {message}")]
    InvalidBoundary { message: String },

    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Failed to create directory '{}': {source}", .path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move '{}' to '{}': {source}", .from.display(), .to.display())]
    MoveError {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Metadata(#[from] LoaderError),
}

/// Result type for filtering operations.
pub type Result<T> = std::result::Result<T, FilteringError>;

/// Survey area as one or more polygons in longitude/latitude.
#[derive(Debug, Clone)]
pub struct Boundary {
    area: MultiPolygon<f64>,
}

impl Boundary {
    pub fn new(area: MultiPolygon<f64>) -> Self {
        Self { area }
    }

    /// Parse a GeoJSON document.
    ///
    /// A FeatureCollection contributes the geometry of its first feature; a
    /// single Feature or a bare geometry is used as is. The geometry must be a
    /// Polygon or MultiPolygon.
    pub fn from_geojson_str(content: &str) -> Result<Self> {
        let invalid = |message: String| FilteringError::InvalidBoundary { message };

        let geojson: GeoJson = content.parse().map_err(|e: geojson::Error| invalid(e.to_string()))?;
        let geometry = match geojson {
            GeoJson::FeatureCollection(collection) => collection
                .features
                .into_iter()
                .next()
                .and_then(|feature| feature.geometry),
            GeoJson::Feature(feature) => feature.geometry,
            GeoJson::Geometry(geometry) => Some(geometry),
        }
        .ok_or_else(|| invalid("no geometry found".to_string()))?;

        let geometry = geo::Geometry::<f64>::try_from(geometry.value)
            .map_err(|e| invalid(e.to_string()))?;

        match geometry {
            geo::Geometry::Polygon(polygon) => Ok(Self::new(MultiPolygon::new(vec![polygon]))),
            geo::Geometry::MultiPolygon(area) => Ok(Self::new(area)),
            _ => Err(invalid("expected a Polygon or MultiPolygon geometry".to_string())),
        }
    }

    /// Load a GeoJSON boundary file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| FilteringError::BoundaryRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_geojson_str(&content)
    }

    /// Strict containment: points on the outline are outside.
    pub fn contains(&self, longitude: f64, latitude: f64) -> bool {
        self.area.contains(&Point::new(longitude, latitude))
    }

    /// Whether a metadata row lies inside. Rows without a position never do.
    pub fn contains_row(&self, row: &OutputRow) -> bool {
        match (row.x, row.y) {
            (Some(x), Some(y)) => self.contains(x, y),
            _ => false,
        }
    }
}

/// Outcome of a filter run.
#[derive(Debug, Default)]
pub struct FilterSummary {
    /// Images moved (or that would be moved in a dry run).
    pub moved: Vec<PathBuf>,
    /// Listed images that do not exist in the image directory.
    pub missing: Vec<PathBuf>,
    /// Rows outside the boundary.
    pub outside: usize,
}

/// Rows selected by `boundary`; every row when there is none.
pub fn select_rows<'a>(rows: &'a [OutputRow], boundary: Option<&Boundary>) -> Vec<&'a OutputRow> {
    rows.iter()
        .filter(|row| boundary.map_or(true, |b| b.contains_row(row)))
        .collect()
}

/// Move the selected images of `rows` into `<images_dir>/keep/`.
///
/// # Arguments
///
/// * `images_dir` - Directory holding the images named in `rows`
/// * `rows` - Metadata rows
/// * `boundary` - Optional survey boundary
/// * `dry_run` - If true, only report what would be moved
///
/// # Errors
///
/// Returns an error if the image directory does not exist, the keep folder
/// cannot be created, or a move fails. Missing images are reported in the
/// summary.
pub fn keep_images(
    images_dir: &Path,
    rows: &[OutputRow],
    boundary: Option<&Boundary>,
    dry_run: bool,
) -> Result<FilterSummary> {
    if !images_dir.is_dir() {
        return Err(FilteringError::DirectoryNotFound(images_dir.to_path_buf()));
    }

    let keep_dir = images_dir.join(KEEP_DIR);
    if !dry_run && !keep_dir.exists() {
        fs::create_dir(&keep_dir).map_err(|source| FilteringError::CreateDirectory {
            path: keep_dir.clone(),
            source,
        })?;
    }

    let selected = select_rows(rows, boundary);
    let mut summary = FilterSummary {
        outside: rows.len() - selected.len(),
        ..FilterSummary::default()
    };

    for row in selected {
        let image = images_dir.join(&row.file_name);
        if !image.is_file() {
            log::warn!("Missing file {} from csv", image.display());
            summary.missing.push(image);
            continue;
        }

        let destination = keep_dir.join(&row.file_name);
        if dry_run {
            log::info!("[DRY RUN] Would move: {}", image.display());
        } else {
            fs::rename(&image, &destination).map_err(|source| FilteringError::MoveError {
                from: image.clone(),
                to: destination.clone(),
                source,
            })?;
            log::info!("Moved: {}", image.display());
        }
        summary.moved.push(image);
    }

    Ok(summary)
}

/// Read the metadata CSV and boundary file, then [`keep_images`].
pub fn filter_images(
    images_dir: &Path,
    csv_path: &Path,
    boundary_path: Option<&Path>,
    dry_run: bool,
) -> Result<FilterSummary> {
    let rows = read_metadata_csv(csv_path)?;
    let boundary = boundary_path.map(Boundary::load).transpose()?;
    keep_images(images_dir, &rows, boundary.as_ref(), dry_run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SQUARE: &str = r#"{
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": {"name": "basin"},
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[-107.0, 39.0], [-106.0, 39.0], [-106.0, 40.0], [-107.0, 40.0], [-107.0, 39.0]]]
            }
        }]
    }"#;

    fn row(name: &str, position: Option<(f64, f64)>) -> OutputRow {
        OutputRow {
            file_name: name.to_string(),
            x: position.map(|p| p.0),
            y: position.map(|p| p.1),
            z: position.map(|_| 3500.0),
            yaw: position.map(|_| 0.0),
            pitch: position.map(|_| 0.0),
            roll: position.map(|_| 0.0),
            time_diff: position.map(|_| 0.0),
            timestamp: 0.0,
            time_of_day: "00:00:00".to_string(),
        }
    }

    fn create_images(dir: &Path, names: &[&str]) {
        for name in names {
            fs::write(dir.join(name), b"image").unwrap();
        }
    }

    #[test]
    fn test_boundary_from_feature_collection() {
        let boundary = Boundary::from_geojson_str(SQUARE).unwrap();
        assert!(boundary.contains(-106.5, 39.5));
        assert!(!boundary.contains(-105.5, 39.5));
        assert!(!boundary.contains(-107.0, 39.5));
    }

    #[test]
    fn test_boundary_bare_multipolygon() {
        let json = r#"{"type": "MultiPolygon", "coordinates": [
            [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]],
            [[[5.0, 5.0], [6.0, 5.0], [6.0, 6.0], [5.0, 6.0], [5.0, 5.0]]]
        ]}"#;
        let boundary = Boundary::from_geojson_str(json).unwrap();
        assert!(boundary.contains(0.5, 0.5));
        assert!(boundary.contains(5.5, 5.5));
        assert!(!boundary.contains(3.0, 3.0));
    }

    #[test]
    fn test_boundary_rejects_points() {
        let json = r#"{"type": "Point", "coordinates": [1.0, 2.0]}"#;
        assert!(matches!(
            Boundary::from_geojson_str(json),
            Err(FilteringError::InvalidBoundary { .. })
        ));
        assert!(Boundary::from_geojson_str("not json").is_err());
    }

    #[test]
    fn test_rows_without_position_are_outside() {
        let boundary = Boundary::from_geojson_str(SQUARE).unwrap();
        let rows = vec![row("a.tif", Some((-106.5, 39.5))), row("b.tif", None)];

        let selected = select_rows(&rows, Some(&boundary));
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].file_name, "a.tif");
        assert_eq!(select_rows(&rows, None).len(), 2);
    }

    #[test]
    fn test_keep_images_moves_inside() {
        let dir = TempDir::new().unwrap();
        create_images(dir.path(), &["in.tif", "out.tif"]);
        let boundary = Boundary::from_geojson_str(SQUARE).unwrap();
        let rows = vec![
            row("in.tif", Some((-106.5, 39.5))),
            row("out.tif", Some((-100.0, 39.5))),
            row("gone.tif", Some((-106.2, 39.2))),
        ];

        let summary = keep_images(dir.path(), &rows, Some(&boundary), false).unwrap();

        assert_eq!(summary.moved, vec![dir.path().join("in.tif")]);
        assert_eq!(summary.missing, vec![dir.path().join("gone.tif")]);
        assert_eq!(summary.outside, 1);
        assert!(dir.path().join(KEEP_DIR).join("in.tif").exists());
        assert!(!dir.path().join("in.tif").exists());
        assert!(dir.path().join("out.tif").exists());
    }

    #[test]
    fn test_keep_images_dry_run() {
        let dir = TempDir::new().unwrap();
        create_images(dir.path(), &["in.tif"]);
        let rows = vec![row("in.tif", None)];

        let summary = keep_images(dir.path(), &rows, None, true).unwrap();

        assert_eq!(summary.moved.len(), 1);
        assert!(dir.path().join("in.tif").exists());
        assert!(!dir.path().join(KEEP_DIR).exists());
    }

    #[test]
    fn test_keep_images_missing_directory() {
        let dir = TempDir::new().unwrap();
        let result = keep_images(&dir.path().join("nope"), &[], None, false);
        assert!(matches!(result, Err(FilteringError::DirectoryNotFound(_))));
    }
}
