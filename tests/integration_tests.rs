use approx::assert_relative_eq;
use flate2::Compression;
use flate2::write::GzEncoder;
use geo::{LineString, MultiPolygon, Point, Polygon};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::io::Write;
use std::path::Path;
use transit_did::analyzers::{ModelSpecification, fit_did};
use transit_did::geography::{
    Boundary, Classifier, GeographicUnit, Group, Projection, Station, Thresholds,
};
use transit_did::output::{ReportFormat, write_panel};
use transit_did::panel::{Panel, PanelOptions, aggregate_by_unit, build_panel};
use transit_did::source::{DirectorySource, EmploymentRecord, MemorySource};
use transit_did::{StudyConfig, StudyError, pipeline};

const UW: (f64, f64) = (47.6503, -122.3016);
const METERS_PER_DEGREE_LAT: f64 = 111_132.0;

/// A small square block group centred `north_m` meters due north of the UW station.
fn square_north_of_station(key: &str, north_m: f64) -> Boundary {
    let lat = UW.0 + north_m / METERS_PER_DEGREE_LAT;
    let lon = UW.1;
    let h = 0.0003;
    let ring = LineString::from(vec![
        (lon - h, lat - h),
        (lon + h, lat - h),
        (lon + h, lat + h),
        (lon - h, lat + h),
        (lon - h, lat - h),
    ]);
    Boundary::new(key, MultiPolygon::new(vec![Polygon::new(ring, vec![])]))
}

fn seattle_classifier() -> Classifier {
    Classifier::new(
        Projection::Geographic,
        Projection::Utm { zone: 10, north: true },
        Thresholds {
            treatment_radius_m: 800.0,
            control_min_distance_m: 1600.0,
        },
        &[
            Station::new("University of Washington", UW.0, UW.1),
            Station::new("Capitol Hill", 47.6198, -122.3200),
        ],
    )
    .unwrap()
}

fn unit(key: &str, group: Group, dist: f64) -> GeographicUnit {
    GeographicUnit {
        key: key.to_string(),
        group,
        dist_to_station: dist,
        geometry: MultiPolygon::new(vec![]),
        centroid: Point::new(0.0, 0.0),
    }
}

fn options(years: Vec<i32>) -> PanelOptions {
    PanelOptions {
        key_prefix: "53033".to_string(),
        unit_key_len: 12,
        cutover_year: 2016,
        years,
    }
}

fn write_gz(path: &Path, body: &str) {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(body.as_bytes()).unwrap();
    std::fs::write(path, encoder.finish().unwrap()).unwrap();
}

#[test]
fn test_two_unit_study_end_to_end() {
    let boundaries = vec![
        square_north_of_station("530330053011", 500.0),
        square_north_of_station("530330053021", 1200.0),
        square_north_of_station("530330061002", 2000.0),
    ];
    let units = seattle_classifier().classify(&boundaries).unwrap();

    assert_eq!(units.len(), 2);
    assert_eq!(units[0].group, Group::Treatment);
    assert_eq!(units[1].group, Group::Control);
    assert!((units[0].dist_to_station - 500.0).abs() < 5.0);

    let source = MemorySource::new()
        .with_year(
            2015,
            vec![
                EmploymentRecord::new("530330053011000", 60),
                EmploymentRecord::new("530330053011001", 40),
                EmploymentRecord::new("530330053021000", 999),
                EmploymentRecord::new("530330061002003", 80),
            ],
        )
        .with_year(
            2016,
            vec![
                EmploymentRecord::new("530330053011000", 150),
                EmploymentRecord::new("530330053021000", 999),
                EmploymentRecord::new("530330061002003", 85),
            ],
        );

    let panel = build_panel(&source, &units, &options(vec![2015, 2016])).unwrap();
    assert_eq!(panel.len(), 4);
    assert!(panel.rows().iter().all(|r| r.group != Group::Buffer));
    assert!(panel.rows().iter().all(|r| r.unit_key != "530330053021"));

    let model = fit_did(&panel, 2016, "primary").unwrap();
    assert_relative_eq!(model.did().estimate, 45.0, epsilon = 1e-9);
}

#[test]
fn test_missing_year_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let units = vec![
        unit("530330053011", Group::Treatment, 450.0),
        unit("530330061002", Group::Control, 2100.0),
    ];
    for year in [2014, 2015, 2016, 2018] {
        write_gz(
            &dir.path().join(format!("wa_wac_S000_JT00_{year}.csv.gz")),
            &format!(
                "w_geocode,C000\n530330053011000,{}\n530330061002003,{}\n",
                year - 1900,
                year - 1950
            ),
        );
    }
    let source = DirectorySource::new(dir.path(), "WA", "w_geocode", "C000");

    let panel = build_panel(&source, &units, &options((2014..=2018).collect())).unwrap();
    assert_eq!(panel.years(), vec![2014, 2015, 2016, 2018]);
    assert_eq!(panel.len(), 8);
}

#[test]
fn test_no_year_present_is_empty_result() {
    let dir = tempfile::tempdir().unwrap();
    let source = DirectorySource::new(dir.path(), "WA", "w_geocode", "C000");
    let units = vec![unit("530330053011", Group::Treatment, 450.0)];
    let err = build_panel(&source, &units, &options(vec![2015, 2016])).unwrap_err();
    assert!(matches!(err, StudyError::EmptyResult { .. }));
}

fn study_units() -> Vec<GeographicUnit> {
    vec![
        unit("530330053011", Group::Treatment, 420.0),
        unit("530330053012", Group::Treatment, 690.0),
        unit("530330061001", Group::Control, 1800.0),
        unit("530330061002", Group::Control, 2300.0),
        unit("530330062001", Group::Control, 2900.0),
    ]
}

fn study_records(year: i32) -> Vec<EmploymentRecord> {
    let mut records = Vec::new();
    for (i, u) in study_units().iter().enumerate() {
        let treated = u.group == Group::Treatment;
        let base = 200 + 35 * i as u64 + (year - 2014) as u64 * 4;
        let lift = if treated && year >= 2016 { 30 } else { 0 };
        let jitter = (i as u64 * 7 + year as u64) % 5;
        // Split each unit across two blocks.
        let total = base + lift + jitter;
        records.push(EmploymentRecord::new(format!("{}000", u.key), total / 2));
        records.push(EmploymentRecord::new(format!("{}001", u.key), total - total / 2));
    }
    // Another county, dropped by the prefix filter.
    records.push(EmploymentRecord::new("530610401001000", 5000));
    records
}

fn study_source() -> MemorySource {
    (2014..=2018).fold(MemorySource::new(), |s, y| s.with_year(y, study_records(y)))
}

fn study_panel() -> Panel {
    build_panel(&study_source(), &study_units(), &options((2014..=2018).collect())).unwrap()
}

#[test]
fn test_panel_shape_invariants() {
    let panel = study_panel();
    assert_eq!(panel.len(), 25);

    for u in study_units() {
        let mut rows: Vec<_> = panel.rows().iter().filter(|r| r.unit_key == u.key).collect();
        rows.sort_by_key(|r| r.year);
        assert!(rows.iter().all(|r| r.is_treated() == (u.group == Group::Treatment)));
        assert!(rows.windows(2).all(|w| !w[0].is_post() || w[1].is_post()));
    }
}

#[test]
fn test_shuffled_inputs_give_identical_results() {
    let mut rng = StdRng::seed_from_u64(42);
    let ordered = study_records(2016);
    let mut shuffled = ordered.clone();
    shuffled.shuffle(&mut rng);
    assert_eq!(
        aggregate_by_unit(&ordered, "53033", 12),
        aggregate_by_unit(&shuffled, "53033", 12)
    );

    let panel = study_panel();
    let baseline = fit_did(&panel, 2016, "primary").unwrap();

    for _ in 0..5 {
        let mut rows = panel.clone().into_rows();
        rows.shuffle(&mut rng);
        let permuted = fit_did(&Panel::from_rows(rows).unwrap(), 2016, "primary").unwrap();
        for (a, b) in baseline.coefficients.iter().zip(&permuted.coefficients) {
            assert_relative_eq!(a.estimate, b.estimate, epsilon = 1e-9);
            assert_relative_eq!(a.std_err, b.std_err, epsilon = 1e-9);
        }
    }
}

#[test]
fn test_placebo_uses_pre_period_only() {
    let panel = study_panel();
    let placebo = ModelSpecification::placebo(2016, 2015).unwrap();
    let sample = placebo.sample(&panel);

    assert_eq!(sample.years(), vec![2014, 2015]);
    assert!(sample.rows().iter().all(|r| r.post == u8::from(r.year >= 2015)));

    let model = placebo.fit(&panel).unwrap();
    assert_eq!(model.n_obs, 10);
    assert_eq!(model.n_clusters, 5);
}

fn config_in(dir: &Path) -> StudyConfig {
    let mut config = StudyConfig::seattle_u_link();
    config.sources.raw_dir = dir.join("raw");
    config.outputs.processed_dir = dir.join("processed");
    config.outputs.outputs_dir = dir.join("outputs");
    config
}

#[test]
fn test_analyze_writes_report_and_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let panel = pipeline::assemble_panel(&config, &study_source(), &study_units()).unwrap();
    write_panel(&config.outputs.panel_path(), &panel).unwrap();

    let report = pipeline::analyze(&config, ReportFormat::Text).unwrap();
    assert!(report.primary.did().estimate > 20.0);

    let path = config.outputs.report_path();
    let first = std::fs::read_to_string(&path).unwrap();
    assert!(first.contains("primary DiD estimate"));
    assert!(first.contains("placebo DiD estimate"));

    pipeline::analyze(&config, ReportFormat::Text).unwrap();
    let second = std::fs::read_to_string(&path).unwrap();
    assert_eq!(first.lines().count(), second.lines().count());

    pipeline::analyze(&config, ReportFormat::Json).unwrap();
    let json = std::fs::read_to_string(path.with_extension("json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["placebo"]["cutover_year"], 2015);
}

#[test]
fn test_analyze_reads_back_what_process_wrote() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    std::fs::create_dir_all(&config.sources.raw_dir).unwrap();
    let source = DirectorySource::from_config(&config);
    for year in 2014..=2018 {
        let mut body = String::from("w_geocode,C000\n");
        for r in study_records(year) {
            body.push_str(&format!("{},{}\n", r.geocode, r.jobs));
        }
        write_gz(&source.path_for(year), &body);
    }

    let built = pipeline::assemble_panel(&config, &source, &study_units()).unwrap();
    write_panel(&config.outputs.panel_path(), &built).unwrap();
    let read = Panel::read_csv(&config.outputs.panel_path()).unwrap();
    assert_eq!(read, built);

    let from_disk = fit_did(&read, 2016, "primary").unwrap();
    let in_memory = fit_did(&built, 2016, "primary").unwrap();
    assert_relative_eq!(from_disk.did().estimate, in_memory.did().estimate, epsilon = 1e-12);
}
