use enem_scores::charts::{ChartKind, RecordingSink};
use enem_scores::data::{load_table, CsvSource, TextEncoding, SELECTED_COLUMNS};
use enem_scores::pipeline::{run_counts, run_export, run_means, run_normalized};
use std::env;
use std::fs;
use std::path::PathBuf;

const RAW: &[u8] = b"NU_INSCRICAO;NO_MUNICIPIO_PROVA;TP_ESCOLA;NU_NOTA_CN;NU_NOTA_CH;NU_NOTA_LC;NU_NOTA_MT;NU_NOTA_REDACAO\n\
1;Fortaleza;2;500;510;490;520;600\n\
2;Fortaleza;2;700;690;710;680;720\n\
3;Recife;3;600;600;600;600;600\n\
4;Fortaleza;3;;640;650;660;700\n\
5;Fortaleza;4;550;560;570;580;590\n\
6;Fortaleza;2;500;510;490;520;600\n\
7;Cear\xE1-Mirim;1;450;460;470;480;500\n";

fn temp_path(name: &str) -> PathBuf {
    env::temp_dir().join(name)
}

fn write_raw(name: &str) -> PathBuf {
    let path = temp_path(name);
    fs::write(&path, RAW).unwrap();
    path
}

#[test]
fn test_full_pipeline_from_raw_file() {
    let path = write_raw("enem_it_full.csv");
    let df = load_table(&CsvSource::new(&path, TextEncoding::Latin1, b';')).unwrap();
    assert_eq!(df.height(), 7);

    let mut sink = RecordingSink::default();
    let report = run_means(&df, "Fortaleza", &mut sink).unwrap();

    // Row 4 matches the municipality but has no CN score.
    assert_eq!(report.rows, 4);
    let labels: Vec<&str> = report.summaries.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(labels, vec!["4", "public"]);

    let public = &report.summaries[1];
    assert_eq!(public.count, 3);
    let expected_cn = (500.0 + 700.0 + 500.0) / 3.0;
    assert!((public.mean("NU_NOTA_CN").unwrap() - expected_cn).abs() < 1e-9);

    let unmapped = &report.summaries[0];
    assert_eq!(unmapped.count, 1);
    assert_eq!(unmapped.mean("NU_NOTA_MT"), Some(580.0));

    assert_eq!(sink.charts[0].kind, ChartKind::Bar);
    assert_eq!(sink.charts[0].categories().len(), 5);
    assert_eq!(sink.charts[0].series(), vec!["4", "public"]);

    fs::remove_file(&path).unwrap();
}

#[test]
fn test_counts_keep_rows_with_missing_scores() {
    let path = write_raw("enem_it_counts.csv");
    let df = load_table(&CsvSource::new(&path, TextEncoding::Latin1, b';')).unwrap();

    let mut sink = RecordingSink::default();
    let counts = run_counts(&df, "Fortaleza", &mut sink).unwrap();
    let pairs: Vec<(&str, usize)> = counts.iter().map(|c| (c.label.as_str(), c.count)).collect();
    assert_eq!(pairs, vec![("4", 1), ("private", 1), ("public", 3)]);

    fs::remove_file(&path).unwrap();
}

#[test]
fn test_latin1_municipality_matches() {
    let path = write_raw("enem_it_latin1.csv");
    let df = load_table(&CsvSource::new(&path, TextEncoding::Latin1, b';')).unwrap();

    let mut sink = RecordingSink::default();
    let counts = run_counts(&df, "Cear\u{e1}-Mirim", &mut sink).unwrap();
    assert_eq!(counts.len(), 1);
    assert_eq!(counts[0].label, "did not respond");

    fs::remove_file(&path).unwrap();
}

#[test]
fn test_normalized_equals_plain_over_count() {
    let path = write_raw("enem_it_normalized.csv");
    let df = load_table(&CsvSource::new(&path, TextEncoding::Latin1, b';')).unwrap();

    let plain = run_means(&df, "Fortaleza", &mut RecordingSink::default()).unwrap();
    let normalized = run_normalized(&df, "Fortaleza", &mut RecordingSink::default()).unwrap();

    assert_eq!(plain.summaries.len(), normalized.summaries.len());
    for (p, n) in plain.summaries.iter().zip(&normalized.summaries) {
        for ((column, plain_mean), (_, normalized_mean)) in p.means.iter().zip(&n.means) {
            let expected = plain_mean / p.count as f64;
            assert!(
                (normalized_mean - expected).abs() < 1e-9,
                "{column} of {}: {normalized_mean} != {expected}",
                p.label
            );
        }
    }

    fs::remove_file(&path).unwrap();
}

#[test]
fn test_export_counts_distinct_combinations() {
    let raw = write_raw("enem_it_export_raw.csv");
    let intermediate = temp_path("enem_it_export_out.csv");

    let df = load_table(&CsvSource::new(&raw, TextEncoding::Latin1, b';')).unwrap();
    let written = run_export(&df, &intermediate).unwrap();
    // Rows 1 and 6 are identical; row 4 has a missing score.
    assert_eq!(written, 5);

    let source = CsvSource::new(&intermediate, TextEncoding::Utf8, b',')
        .with_expected_columns(SELECTED_COLUMNS.len() + 1)
        .with_required_columns(&SELECTED_COLUMNS);
    let exported = load_table(&source).unwrap();
    assert_eq!(exported.height(), 5);

    // The file holds one row per combination, so the analysis commands
    // would weigh the duplicated student once. The counts carry the weight.
    let counts: Vec<i64> = exported
        .column("count")
        .unwrap()
        .i64()
        .unwrap()
        .into_iter()
        .flatten()
        .collect();
    assert_eq!(counts.iter().sum::<i64>(), 6);
    assert_eq!(counts.iter().filter(|&&c| c == 2).count(), 1);

    fs::remove_file(&raw).unwrap();
    fs::remove_file(&intermediate).unwrap();
}

#[test]
fn test_normalized_excludes_rows_with_missing_scores() {
    let path = write_raw("enem_it_normalized_missing.csv");
    let df = load_table(&CsvSource::new(&path, TextEncoding::Latin1, b';')).unwrap();

    // Row 4 (Fortaleza, private) lacks its CN score.
    let counts = run_counts(&df, "Fortaleza", &mut RecordingSink::default()).unwrap();
    assert!(counts.iter().any(|c| c.label == "private"));

    let report = run_normalized(&df, "Fortaleza", &mut RecordingSink::default()).unwrap();
    assert_eq!(report.rows, 4);
    assert!(report.summaries.iter().all(|s| s.label != "private"));
    let public = report.summaries.iter().find(|s| s.label == "public").unwrap();
    assert_eq!(public.count, 3);

    fs::remove_file(&path).unwrap();
}
