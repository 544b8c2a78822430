use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelabelError {
    #[error("Malformed lookup table: code {code} maps to both {first:?} and {second:?}")]
    MalformedLookup {
        code: i64,
        first: String,
        second: String,
    },

    #[error("Malformed lookup table: no integer code in value {0:?}")]
    UnparseableCode(String),

    #[error("Schema error in grid record {index}: {reason}")]
    Schema { index: usize, reason: String },

    #[error("Legend error: {0}")]
    Legend(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[cfg(feature = "gdal")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("Input raster has invalid dimensions: {0}x{1}")]
    InvalidDimensions(usize, usize),

    #[error("Pixel size is non-positive: {0}")]
    InvalidPixelSize(f64),

    #[error("Unsupported sample type in raster: {0}")]
    UnsupportedSampleType(String),

    #[error("Invalid bounding box: {0}")]
    InvalidBoundingBox(String),

    #[error("Bounding box does not cover any pixel centre")]
    EmptyWindow,

    #[error("Invalid colour {color:?} for label {label:?} (expected #RRGGBB)")]
    InvalidColor { label: String, color: String },
}

pub type Result<T> = std::result::Result<T, RelabelError>;
