use landuse_relabel::config::StyleConfig;
use landuse_relabel::grid::BoundingBox;
use landuse_relabel::io::{read_input_raster, read_legend, write_relabeled, write_summary};
use landuse_relabel::legend::QmlLegend;
use landuse_relabel::{relabel, RelabelError};
use std::fs::File;
use std::path::{Path, PathBuf};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

const LEGEND: &str = r##"<qgis version="3.22.0">
  <pipe>
    <rasterrenderer type="paletted" band="1">
      <colorPalette>
        <paletteEntry value="1400" label="Forest - lowland" color="#1a9641" alpha="255"/>
        <paletteEntry value="2100" label="Oil palm plantation" color="#fdae61" alpha="255"/>
      </colorPalette>
    </rasterrenderer>
  </pipe>
</qgis>
"##;

/// 3x2 raster, 10 m pixels, upper-left corner at (1000, 2000), nodata 0
fn write_landuse_tiff(path: &Path) {
    let data: [u16; 6] = [1400, 2100, 0, 9999, 1400, 1400];
    let mut file = File::create(path).unwrap();
    let mut encoder = TiffEncoder::new(&mut file).unwrap();
    let mut image = encoder.new_image::<colortype::Gray16>(3, 2).unwrap();
    image
        .encoder()
        .write_tag(Tag::Unknown(33550), &[10.0f64, 10.0, 0.0][..])
        .unwrap();
    image
        .encoder()
        .write_tag(Tag::Unknown(33922), &[0.0f64, 0.0, 0.0, 1000.0, 2000.0, 0.0][..])
        .unwrap();
    image.encoder().write_tag(Tag::Unknown(42113), "0").unwrap();
    image.write_data(&data).unwrap();
}

fn fixtures(dir: &Path) -> (PathBuf, PathBuf) {
    let raster = dir.join("landuse.tif");
    let legend = dir.join("landuse.qml");
    write_landuse_tiff(&raster);
    std::fs::write(&legend, LEGEND).unwrap();
    (raster, legend)
}

#[test]
fn test_geotiff_to_csv() {
    let dir = tempfile::tempdir().unwrap();
    let (raster_path, legend_path) = fixtures(dir.path());

    let raster = read_input_raster(&raster_path).unwrap();
    assert_eq!(raster.nodata(), Some(0));
    assert_eq!(raster.metadata().pixel_width, 10.0);

    let table = read_legend(&legend_path, &QmlLegend).unwrap();
    let relabeled = relabel(&raster.to_grid(), &table);
    assert_eq!(relabeled.len(), 5);
    assert_eq!(relabeled.missing_count(), 1);
    assert_eq!(relabeled.unresolved_codes(), vec![9999]);

    let out = dir.path().join("landuse.csv");
    write_relabeled(&out, &relabeled, None).unwrap();
    let csv = std::fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(
        lines,
        vec![
            "x,y,code,label",
            "1005,1995,1400,Forest - lowland",
            "1015,1995,2100,Oil palm plantation",
            "1005,1985,9999,Missing",
            "1015,1985,1400,Forest - lowland",
            "1025,1985,1400,Forest - lowland",
        ]
    );
}

#[test]
fn test_crop_recode_and_json_output() {
    let dir = tempfile::tempdir().unwrap();
    let (raster_path, legend_path) = fixtures(dir.path());

    let style: StyleConfig = serde_json::from_str(
        r##"{
            "recode": {"Forest - lowland": "Forest"},
            "palette": {"Forest": "#1a9641"}
        }"##,
    )
    .unwrap();

    // Bottom row only
    let bbox = BoundingBox::new(1000.0, 1980.0, 1030.0, 1990.0).unwrap();
    let raster = read_input_raster(&raster_path).unwrap().crop(&bbox).unwrap();
    let table = read_legend(&legend_path, &QmlLegend).unwrap();
    let relabeled = style.recode_table().apply(&relabel(&raster.to_grid(), &table));
    let palette = style.palette().unwrap();

    let out = dir.path().join("landuse.json");
    write_relabeled(&out, &relabeled, palette.as_ref()).unwrap();
    let records: Vec<serde_json::Value> =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();

    assert_eq!(records.len(), 3);
    assert_eq!(records[0]["label"], "Missing");
    assert_eq!(records[0]["color"], "#BEBEBE");
    assert_eq!(records[1]["label"], "Forest");
    assert_eq!(records[1]["color"], "#1a9641");
    assert_eq!(records[2]["y"], 1985.0);

    let summary_path = dir.path().join("summary.json");
    write_summary(&summary_path, &relabeled.class_summary()).unwrap();
    let summary: Vec<serde_json::Value> =
        serde_json::from_str(&std::fs::read_to_string(&summary_path).unwrap()).unwrap();
    assert_eq!(summary.len(), 2);
    assert_eq!(summary[0]["label"], "Forest");
    assert_eq!(summary[0]["codes"][0], 1400);
    assert_eq!(summary[0]["cells"], 2);
}

#[test]
fn test_ambiguous_legend_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let legend = dir.path().join("dup.qml");
    std::fs::write(
        &legend,
        r#"<colorPalette>
             <paletteEntry value="5" label="Grassland"/>
             <paletteEntry value="5" label="Shrubland"/>
           </colorPalette>"#,
    )
    .unwrap();

    match read_legend(&legend, &QmlLegend) {
        Err(RelabelError::MalformedLookup { code, .. }) => assert_eq!(code, 5),
        other => panic!("expected malformed lookup, got {:?}", other.map(|t| t.len())),
    }
}

#[test]
fn test_missing_raster_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = read_input_raster(dir.path().join("nope.tif"));
    assert!(matches!(result, Err(RelabelError::Io(_))));
}
