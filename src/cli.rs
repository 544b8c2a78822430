use clap::{Parser, ValueEnum};
use crate::grid::BoundingBox;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LegendFormat {
    /// QGIS style file
    Qml,
    /// JSON array of {value, label}
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "landuse-relabel")]
#[command(about = "Attach legend class names to every cell of a categorical land-use raster")]
#[command(version)]
pub struct Args {
    /// Input GeoTIFF path (categorical raster)
    #[arg(short, long, value_name = "FILE")]
    pub input: String,

    /// Legend file mapping class codes to labels
    #[arg(short, long, value_name = "FILE")]
    pub legend: String,

    /// Legend file format
    #[arg(long, value_enum, default_value_t = LegendFormat::Qml)]
    pub legend_format: LegendFormat,

    /// Output path (.json for JSON records, CSV otherwise)
    #[arg(short, long, value_name = "FILE")]
    pub output: String,

    /// Style config with display-name recodes and palette (JSON)
    #[arg(short, long, value_name = "FILE")]
    pub style: Option<String>,

    /// Write per-class cell counts to this JSON file
    #[arg(long, value_name = "FILE")]
    pub summary: Option<String>,

    /// Crop to xmin,ymin,xmax,ymax in raster CRS units
    #[arg(long, value_name = "BBOX", value_parser = parse_bbox)]
    pub bbox: Option<BoundingBox>,

    /// Override nodata value (default: read from input)
    #[arg(long, value_name = "VALUE", allow_negative_numbers = true)]
    pub nodata: Option<f64>,

    /// Read the raster through GDAL instead of the built-in GeoTIFF reader
    #[cfg(feature = "gdal")]
    #[arg(long)]
    pub gdal: bool,

    /// Number of threads (default: all available)
    #[arg(short, long, value_name = "N")]
    pub threads: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_bbox(s: &str) -> Result<BoundingBox, String> {
    s.parse::<BoundingBox>().map_err(|e| e.to_string())
}
