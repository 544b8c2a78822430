// Library exports for testing and reuse

pub mod cli;
pub mod config;
pub mod error;
pub mod grid;
pub mod io;
pub mod legend;
pub mod lookup;
pub mod recode;
pub mod relabel;

// Re-export commonly used types
pub use error::{RelabelError, Result};
pub use grid::{Cell, CellRecord, Grid, RasterGrid};
pub use io::{read_input_raster, write_relabeled, RasterMetadata};
pub use lookup::LookupTable;
pub use recode::{Palette, RecodeTable};
pub use relabel::{relabel, relabel_par, Label, RelabeledGrid, MISSING_LABEL};
