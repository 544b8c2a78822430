use crate::error::{RelabelError, Result};
use crate::grid::{integral, RasterGrid};
use crate::legend::LegendParser;
use crate::lookup::LookupTable;
use crate::recode::Palette;
use crate::relabel::{ClassSummary, RelabeledGrid};
use log::{debug, info, warn};
use ndarray::Array2;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;
use tiff::ColorType;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

/// Code stored for NaN float pixels; never a class code
pub(crate) const NAN_FILL: i32 = i32::MIN;

#[derive(Debug, Clone)]
pub struct RasterMetadata {
    pub width: usize,
    pub height: usize,
    pub geotransform: [f64; 6],
    pub projection: String,
    pub nodata: Option<f64>,
    pub pixel_width: f64,
    pub pixel_height: f64,
    /// Float source had NaN pixels, stored as `NAN_FILL` and masked
    /// independently of `nodata`
    pub nan_mask: bool,
}

impl RasterMetadata {
    pub fn from_geotransform(
        width: usize,
        height: usize,
        geotransform: [f64; 6],
        projection: String,
        nodata: Option<f64>,
    ) -> Self {
        RasterMetadata {
            width,
            height,
            geotransform,
            projection,
            nodata,
            pixel_width: geotransform[1].abs(),
            pixel_height: geotransform[5].abs(),
            nan_mask: false,
        }
    }
}

/// GDAL-style geotransform from GeoTIFF pixel scale and first tiepoint
fn geotransform_from_tags(scale: &[f64], tiepoint: &[f64]) -> Option<[f64; 6]> {
    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }
    let (sx, sy) = (scale[0], scale[1]);
    let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
    Some([x - i * sx, sx, 0.0, y + j * sy, 0.0, -sy])
}

/// `EPSG:nnnn` from the GeoKey directory, when the CRS is given by code
fn projection_from_geokeys(keys: &[u16]) -> Option<String> {
    if keys.len() < 4 {
        return None;
    }
    let count = keys[3] as usize;
    keys[4..]
        .chunks_exact(4)
        .take(count)
        .filter(|key| key[1] == 0)
        .find(|key| key[0] == PROJECTED_CS_TYPE_KEY)
        .or_else(|| {
            keys[4..]
                .chunks_exact(4)
                .take(count)
                .filter(|key| key[1] == 0)
                .find(|key| key[0] == GEOGRAPHIC_TYPE_KEY)
        })
        .map(|key| format!("EPSG:{}", key[3]))
}

fn samples_to_codes(image: DecodingResult) -> Result<(Vec<i32>, bool)> {
    fn convert<T: Copy>(values: Vec<T>, f: impl Fn(T) -> Option<i32>, name: &str) -> Result<Vec<i32>> {
        values
            .into_iter()
            .map(|v| f(v).ok_or_else(|| RelabelError::UnsupportedSampleType(name.to_string())))
            .collect()
    }
    let float_code = |v: f64| {
        if v.is_nan() {
            Some(NAN_FILL)
        } else {
            integral(v).and_then(|c| i32::try_from(c).ok())
        }
    };

    let codes = match image {
        DecodingResult::U8(v) => v.into_iter().map(i32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(i32::from).collect(),
        DecodingResult::I8(v) => v.into_iter().map(i32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(i32::from).collect(),
        DecodingResult::I32(v) => v,
        DecodingResult::U32(v) => convert(v, |x| i32::try_from(x).ok(), "u32 value out of range")?,
        DecodingResult::U64(v) => convert(v, |x| i32::try_from(x).ok(), "u64 value out of range")?,
        DecodingResult::I64(v) => convert(v, |x| i32::try_from(x).ok(), "i64 value out of range")?,
        DecodingResult::F32(v) => {
            let has_nan = v.iter().any(|x| x.is_nan());
            return Ok((
                convert(v, |x| float_code(f64::from(x)), "non-integral float class code")?,
                has_nan,
            ));
        }
        DecodingResult::F64(v) => {
            let has_nan = v.iter().any(|x| x.is_nan());
            return Ok((convert(v, float_code, "non-integral float class code")?, has_nan));
        }
    };
    Ok((codes, false))
}

/// Read band 1 of a categorical GeoTIFF and its georeferencing
pub fn read_input_raster<P: AsRef<Path>>(path: P) -> Result<RasterGrid> {
    let path = path.as_ref();
    info!("Opening input raster: {}", path.display());
    let mut decoder = Decoder::new(BufReader::new(File::open(path)?))?;

    match decoder.colortype()? {
        ColorType::Gray(_) => {}
        other => {
            return Err(RelabelError::UnsupportedSampleType(format!(
                "expected single-band raster, got {:?}",
                other
            )))
        }
    }

    let (width, height) = decoder.dimensions()?;
    let (width, height) = (width as usize, height as usize);
    if width == 0 || height == 0 {
        return Err(RelabelError::InvalidDimensions(width, height));
    }

    let scale = decoder
        .find_tag(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE))?
        .map(|v| v.into_f64_vec())
        .transpose()?;
    let tiepoint = decoder
        .find_tag(Tag::from_u16_exhaustive(MODEL_TIEPOINT))?
        .map(|v| v.into_f64_vec())
        .transpose()?;
    let geotransform = match (scale, tiepoint) {
        (Some(scale), Some(tiepoint)) => geotransform_from_tags(&scale, &tiepoint),
        _ => None,
    }
    .unwrap_or_else(|| {
        warn!("No GeoTIFF georeferencing found, using pixel coordinates");
        [0.0, 1.0, 0.0, 0.0, 0.0, 1.0]
    });

    let projection = decoder
        .find_tag(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY))?
        .map(|v| v.into_u16_vec())
        .transpose()?
        .and_then(|keys| projection_from_geokeys(&keys))
        .unwrap_or_default();

    let nodata = decoder
        .find_tag(Tag::from_u16_exhaustive(GDAL_NODATA))?
        .map(|v| v.into_string())
        .transpose()?
        .and_then(|s| s.trim_end_matches('\0').trim().parse::<f64>().ok());

    debug!("Raster dimensions: {}x{}", width, height);
    debug!("Geotransform: {:?}", geotransform);

    let (codes, nan_mask) = samples_to_codes(decoder.read_image()?)?;
    if nan_mask {
        debug!("NaN pixels treated as nodata");
    }

    let data = Array2::from_shape_vec((height, width), codes)?;
    let mut metadata = RasterMetadata::from_geotransform(width, height, geotransform, projection, nodata);
    metadata.nan_mask = nan_mask;
    info!(
        "Raster size: {}x{}, pixel size {:.6} x {:.6}",
        width, height, metadata.pixel_width, metadata.pixel_height
    );
    RasterGrid::new(data, metadata)
}

/// Read band 1 through GDAL, for any format GDAL can open
#[cfg(feature = "gdal")]
pub fn read_input_raster_gdal(path: &str) -> Result<RasterGrid> {
    use gdal::raster::RasterBand;
    use gdal::Dataset;

    info!("Opening input raster with GDAL: {}", path);
    let dataset = Dataset::open(path)?;
    let rasterband: RasterBand = dataset.rasterband(1)?;

    let width = rasterband.x_size() as usize;
    let height = rasterband.y_size() as usize;
    if width == 0 || height == 0 {
        return Err(RelabelError::InvalidDimensions(width, height));
    }

    let nodata = rasterband.no_data_value();
    let geotransform = dataset.geo_transform()?;

    let buffer = rasterband.read_as::<i32>((0, 0), (width, height), (width, height), None)?;
    let data_vec: Vec<i32> = buffer.into_iter().collect();
    let data = Array2::from_shape_vec((height, width), data_vec)?;

    let metadata = RasterMetadata::from_geotransform(
        width,
        height,
        geotransform,
        dataset.projection(),
        nodata,
    );
    RasterGrid::new(data, metadata)
}

pub fn read_legend<P: AsRef<Path>>(path: P, parser: &dyn LegendParser) -> Result<LookupTable> {
    let path = path.as_ref();
    info!("Reading legend: {}", path.display());
    let bytes = std::fs::read(path)?;
    crate::legend::load_lookup_table(parser, &bytes)
}

#[derive(Serialize)]
struct OutputRecord<'a> {
    x: f64,
    y: f64,
    code: i64,
    label: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<&'a str>,
}

fn csv_field(text: &str) -> String {
    if text.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

/// Long-form output for the renderer: JSON for `.json` paths, CSV otherwise
pub fn write_relabeled<P: AsRef<Path>>(
    path: P,
    grid: &RelabeledGrid,
    palette: Option<&Palette>,
) -> Result<()> {
    let path = path.as_ref();
    info!("Writing {} relabeled cells to {}", grid.len(), path.display());

    let records = grid.iter().map(|cell| OutputRecord {
        x: cell.x,
        y: cell.y,
        code: cell.code,
        label: cell.label.as_str(),
        color: palette.and_then(|p| p.color_for(&cell.label)),
    });

    let mut writer = BufWriter::new(File::create(path)?);
    let is_json = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        serde_json::to_writer(&mut writer, &records.collect::<Vec<_>>())?;
    } else {
        match palette {
            Some(_) => writeln!(writer, "x,y,code,label,color")?,
            None => writeln!(writer, "x,y,code,label")?,
        }
        for record in records {
            write!(
                writer,
                "{},{},{},{}",
                record.x,
                record.y,
                record.code,
                csv_field(record.label)
            )?;
            if palette.is_some() {
                write!(writer, ",{}", record.color.unwrap_or(""))?;
            }
            writeln!(writer)?;
        }
    }
    writer.flush()?;
    Ok(())
}

pub fn write_summary<P: AsRef<Path>>(path: P, summary: &[ClassSummary]) -> Result<()> {
    let path = path.as_ref();
    info!("Writing class summary: {}", path.display());
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, summary)?;
    writer.flush()?;
    Ok(())
}
