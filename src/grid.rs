use crate::error::{RelabelError, Result};
use crate::io::{RasterMetadata, NAN_FILL};
use log::{debug, info, warn};
use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

/// A validated grid cell: position plus land-use class code
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Cell {
    pub x: f64,
    pub y: f64,
    pub code: i64,
}

/// Code as delivered by an external provider, before validation
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CodeValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl CodeValue {
    fn to_code(&self) -> std::result::Result<i64, String> {
        match self {
            CodeValue::Int(v) => Ok(*v),
            CodeValue::Float(v) => integral(*v).ok_or_else(|| format!("code {} is not an integer", v)),
            CodeValue::Text(text) => {
                let trimmed = text.trim();
                if let Ok(v) = trimmed.parse::<i64>() {
                    return Ok(v);
                }
                trimmed
                    .parse::<f64>()
                    .ok()
                    .and_then(integral)
                    .ok_or_else(|| format!("code {:?} is not numeric", text))
            }
        }
    }
}

pub(crate) fn integral(v: f64) -> Option<i64> {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

/// Raw (x, y, code) record; `code` may be absent in malformed input
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CellRecord {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub code: Option<CodeValue>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    cells: Vec<Cell>,
}

impl Grid {
    pub fn from_cells(cells: Vec<Cell>) -> Self {
        Grid { cells }
    }

    /// Validate raw records. Every record must carry a numeric, integral code.
    pub fn from_records<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = CellRecord>,
    {
        let mut cells = Vec::new();
        for (index, record) in records.into_iter().enumerate() {
            let value = record.code.as_ref().ok_or_else(|| RelabelError::Schema {
                index,
                reason: "missing code field".to_string(),
            })?;
            let code = value
                .to_code()
                .map_err(|reason| RelabelError::Schema { index, reason })?;
            cells.push(Cell {
                x: record.x,
                y: record.y,
                code,
            });
        }
        Ok(Grid { cells })
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cell> {
        self.cells.iter()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Sorted unique codes present in the grid
    pub fn distinct_codes(&self) -> Vec<i64> {
        let codes: BTreeSet<i64> = self.cells.iter().map(|c| c.code).collect();
        codes.into_iter().collect()
    }
}

/// Axis-aligned extent in the raster's CRS
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BoundingBox {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Result<Self> {
        if !(xmin < xmax && ymin < ymax) {
            return Err(RelabelError::InvalidBoundingBox(format!(
                "min must be below max ({},{} - {},{})",
                xmin, ymin, xmax, ymax
            )));
        }
        Ok(BoundingBox {
            xmin,
            ymin,
            xmax,
            ymax,
        })
    }
}

impl FromStr for BoundingBox {
    type Err = RelabelError;

    /// Parse `xmin,ymin,xmax,ymax`
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| RelabelError::InvalidBoundingBox(format!("{:?}: {}", s, e)))?;
        match parts.as_slice() {
            [xmin, ymin, xmax, ymax] => BoundingBox::new(*xmin, *ymin, *xmax, *ymax),
            _ => Err(RelabelError::InvalidBoundingBox(format!(
                "{:?}: expected 4 comma-separated numbers",
                s
            ))),
        }
    }
}

/// Categorical raster band with its georeferencing
#[derive(Debug, Clone)]
pub struct RasterGrid {
    data: Array2<i32>,
    metadata: RasterMetadata,
}

impl RasterGrid {
    pub fn new(data: Array2<i32>, metadata: RasterMetadata) -> Result<Self> {
        let (height, width) = data.dim();
        if width == 0 || height == 0 {
            return Err(RelabelError::InvalidDimensions(width, height));
        }
        if metadata.pixel_width <= 0.0 {
            return Err(RelabelError::InvalidPixelSize(metadata.pixel_width));
        }
        let metadata = RasterMetadata {
            width,
            height,
            ..metadata
        };
        Ok(RasterGrid { data, metadata })
    }

    pub fn data(&self) -> &Array2<i32> {
        &self.data
    }

    pub fn metadata(&self) -> &RasterMetadata {
        &self.metadata
    }

    /// Nodata as a class code; non-integral or out-of-range values mask nothing
    pub fn nodata(&self) -> Option<i32> {
        let value = self.metadata.nodata?;
        let code = integral(value).and_then(|c| i32::try_from(c).ok());
        if code.is_none() && value.is_finite() {
            warn!("Ignoring nodata value {} (not an integer class code)", value);
        }
        code
    }

    /// Replace the nodata value read from the file
    pub fn with_nodata(mut self, nodata: Option<f64>) -> Self {
        self.metadata.nodata = nodata;
        self
    }

    /// Georeferenced centre of pixel (row, col)
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        let gt = &self.metadata.geotransform;
        let c = col as f64 + 0.5;
        let r = row as f64 + 0.5;
        (gt[0] + c * gt[1] + r * gt[2], gt[3] + c * gt[4] + r * gt[5])
    }

    /// Flatten to cells in row-major order, skipping nodata and NaN pixels
    pub fn to_grid(&self) -> Grid {
        let nodata = self.nodata();
        let nan_mask = self.metadata.nan_mask;
        let cells: Vec<Cell> = self
            .data
            .indexed_iter()
            .filter(|(_, value)| Some(**value) != nodata)
            .filter(|(_, value)| !(nan_mask && **value == NAN_FILL))
            .map(|((row, col), &value)| {
                let (x, y) = self.pixel_center(row, col);
                Cell {
                    x,
                    y,
                    code: value as i64,
                }
            })
            .collect();

        debug!(
            "Grid has {} cells ({} nodata pixels masked)",
            cells.len(),
            self.data.len() - cells.len()
        );
        Grid::from_cells(cells)
    }

    /// Window of pixels whose centres fall inside `bbox`
    pub fn crop(&self, bbox: &BoundingBox) -> Result<RasterGrid> {
        let gt = self.metadata.geotransform;
        if gt[2] != 0.0 || gt[4] != 0.0 {
            return Err(RelabelError::InvalidBoundingBox(
                "rotated rasters cannot be cropped".to_string(),
            ));
        }

        let (height, width) = self.data.dim();
        let cols: Vec<usize> = (0..width)
            .filter(|&col| {
                let (x, _) = self.pixel_center(0, col);
                x >= bbox.xmin && x <= bbox.xmax
            })
            .collect();
        let rows: Vec<usize> = (0..height)
            .filter(|&row| {
                let (_, y) = self.pixel_center(row, 0);
                y >= bbox.ymin && y <= bbox.ymax
            })
            .collect();

        let (col_min, col_max) = match (cols.first(), cols.last()) {
            (Some(&a), Some(&b)) => (a, b + 1),
            _ => return Err(RelabelError::EmptyWindow),
        };
        let (row_min, row_max) = match (rows.first(), rows.last()) {
            (Some(&a), Some(&b)) => (a, b + 1),
            _ => return Err(RelabelError::EmptyWindow),
        };

        info!(
            "Cropping to rows {}..{}, cols {}..{} ({}x{})",
            row_min,
            row_max,
            col_min,
            col_max,
            col_max - col_min,
            row_max - row_min
        );

        let window = self
            .data
            .slice(s![row_min..row_max, col_min..col_max])
            .to_owned();

        let mut geotransform = gt;
        geotransform[0] = gt[0] + col_min as f64 * gt[1];
        geotransform[3] = gt[3] + row_min as f64 * gt[5];

        RasterGrid::new(
            window,
            RasterMetadata {
                geotransform,
                ..self.metadata.clone()
            },
        )
    }
}
