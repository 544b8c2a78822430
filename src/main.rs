use clap::Parser;
use env_logger::Env;
use log::{info, warn};

use landuse_relabel::cli::{Args, LegendFormat};
use landuse_relabel::config::StyleConfig;
use landuse_relabel::grid::RasterGrid;
use landuse_relabel::legend::{JsonLegend, LegendParser, QmlLegend};
use landuse_relabel::{io, relabel, relabel_par, Result};

fn read_raster(args: &Args) -> Result<RasterGrid> {
    #[cfg(feature = "gdal")]
    if args.gdal {
        return io::read_input_raster_gdal(&args.input);
    }
    io::read_input_raster(&args.input)
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logger
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    info!("=== Land-use Raster Relabeler ===");

    if let Some(n_threads) = args.threads {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .build_global()
        {
            warn!("Could not configure thread pool: {}", e);
        }
        info!("Using {} threads", n_threads);
    } else {
        info!("Using all available threads");
    }

    let mut raster = read_raster(&args)?;
    if args.nodata.is_some() {
        raster = raster.with_nodata(args.nodata);
    }
    match raster.nodata() {
        Some(nd) => info!("Using nodata value: {}", nd),
        None => info!("No nodata value specified"),
    }

    if let Some(bbox) = &args.bbox {
        raster = raster.crop(bbox)?;
    }

    let parser: &dyn LegendParser = match args.legend_format {
        LegendFormat::Qml => &QmlLegend,
        LegendFormat::Json => &JsonLegend,
    };
    let table = io::read_legend(&args.legend, parser)?;

    let grid = raster.to_grid();
    info!("Relabeling {} cells", grid.len());
    let mut relabeled = if args.threads == Some(1) {
        relabel(&grid, &table)
    } else {
        relabel_par(&grid, &table)
    };

    let style = match &args.style {
        Some(path) => StyleConfig::from_file(path)?,
        None => StyleConfig::default(),
    };
    let recode = style.recode_table();
    if !recode.is_empty() {
        relabeled = recode.apply(&relabeled);
    }
    let palette = style.palette()?;

    io::write_relabeled(&args.output, &relabeled, palette.as_ref())?;

    if let Some(path) = &args.summary {
        io::write_summary(path, &relabeled.class_summary())?;
    }

    info!(
        "{} cells, {} classes, {} unresolved",
        relabeled.len(),
        relabeled.distinct_labels().len(),
        relabeled.missing_count()
    );
    info!("=== Done! ===");
    Ok(())
}
