use std::fs;
use std::path::{Path, PathBuf};

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use crate::errors::NormalizeError;
use crate::formats::{
    anonymize_location, canonicalize_sensor_file, derive_price_timestamp,
    derive_weather_timestamp, extract_appliance_rows, normalize_price, normalize_weather,
    parse_appliance_line, parse_sensor_table, read_table, read_table_tolerant,
    schema::WEATHER_COLUMNS, ApplianceReportTransformer, PageSource, PdfPages,
    PriceSeriesTransformer, SensorRecordTransformer, WeatherSeriesTransformer,
};
use crate::model::{LocationSalt, RawTable, StepStatus};
use crate::registry::{all_transformer_descriptors, run_transformer, Transformer};

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/data")
        .join(name)
}

fn fixture_bytes(name: &str) -> Vec<u8> {
    let path = fixture_path(name);
    fs::read(&path)
        .unwrap_or_else(|err| panic!("failed to read fixture {}: {}", path.display(), err))
}

fn output_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .expect("output missing")
        .lines()
        .map(str::to_string)
        .collect()
}

fn report_page(lines: &[&str]) -> String {
    let mut page: Vec<String> = (1..=8).map(|n| format!("Cabecalho linha {n}")).collect();
    page.extend(lines.iter().map(|line| line.to_string()));
    page.join("\n")
}

/// Save a PDF whose pages draw the given content with a WinAnsi Helvetica `F1`.
fn write_report_pdf(path: &Path, pages: Vec<Vec<Operation>>) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for operations in pages {
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }
    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

/// A page written as one text object, moving between rows with `T*`, `'` and `TJ`.
fn flowing_report_page() -> Vec<Operation> {
    let mut ops = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 10.into()]),
        Operation::new("TL", vec![14.into()]),
        Operation::new("Td", vec![40.into(), 800.into()]),
        Operation::new("Tj", vec![Object::string_literal("Relatorio de consumo")]),
    ];
    for n in 2..=8 {
        ops.push(Operation::new("T*", vec![]));
        ops.push(Operation::new("Tj", vec![Object::string_literal(format!("Cabecalho {n}"))]));
    }
    ops.push(Operation::new(
        "'",
        vec![Object::string_literal("Geladeira Frost Free 250 30 - - 45,0")],
    ));
    ops.push(Operation::new("T*", vec![]));
    ops.push(Operation::new(
        "TJ",
        vec![Object::Array(vec![
            Object::string_literal("Ar Condicionado 1400"),
            (-250).into(),
            Object::string_literal("20 8 h 224,0"),
        ])],
    ));
    ops.push(Operation::new("ET", vec![]));
    ops
}

/// A page where every cell is its own text object, emitted right to left.
fn cell_report_page() -> Vec<Operation> {
    let cell = |x: i64, y: i64, text: Vec<u8>| {
        vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 10.into()]),
            Operation::new(
                "Tm",
                vec![1.into(), 0.into(), 0.into(), 1.into(), x.into(), y.into()],
            ),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ]
    };
    let columns = [40, 250, 300, 350, 400, 450];
    let rows: [(i64, [&[u8]; 6]); 2] = [
        (660, [b"M\xe1quina de Lavar*", b"500", b"12", b"1", b"h", b"6,0"]),
        (646, [b"Televisao", b"120", b"30", b"5", b"h", b"18,0"]),
    ];

    let mut ops = Vec::new();
    for n in 0..8 {
        let title = format!("Cabecalho {}", n + 1);
        ops.extend(cell(40, 800 - 14 * n, title.into_bytes()));
    }
    for (y, cells) in rows {
        for (x, text) in columns.iter().zip(cells).rev() {
            ops.extend(cell(*x, y, text.to_vec()));
        }
    }
    ops.extend(cell(40, 632, b"Total".to_vec()));
    ops.extend(cell(450, 632, b"69,0".to_vec()));
    ops
}

#[test]
fn pdf_pages_keep_one_visual_row_per_line() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("consumoAparelho.pdf");
    write_report_pdf(&input, vec![flowing_report_page(), cell_report_page()]);

    let pages = PdfPages::new(&input).pages().unwrap();
    assert_eq!(pages.len(), 2);
    let first: Vec<&str> = pages[0].lines().collect();
    assert_eq!(first.len(), 10);
    assert_eq!(first[0], "Relatorio de consumo");
    assert_eq!(first[9], "Ar Condicionado 1400 20 8 h 224,0");
    let second: Vec<&str> = pages[1].lines().collect();
    assert_eq!(second[8], "Máquina de Lavar* 500 12 1 h 6,0");
    assert_eq!(second[10], "Total 69,0");
}

#[test]
fn appliance_pdf_report_written_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("consumoAparelho.pdf");
    let output = dir.path().join("consumo_aparelho.csv");
    write_report_pdf(&input, vec![flowing_report_page(), cell_report_page()]);

    let summary = ApplianceReportTransformer
        .run(&input, &output)
        .expect("appliance run failed");

    assert_eq!(summary.rows_written, 4);
    assert_eq!(summary.rows_dropped, 1);
    assert_eq!(
        output_lines(&output),
        vec![
            "name;power_rating;usage_days;usage_factor;unit;consumption",
            "Geladeira Frost Free;250;30;1;h;45,0",
            "Ar Condicionado;1400;20;8;h;224,0",
            "Maquina de Lavar;500;12;1;h;6,0",
            "Televisao;120;30;5;h;18,0",
        ]
    );
}

#[test]
fn appliance_line_takes_last_five_tokens() {
    for name_words in 1..=5 {
        let name: Vec<String> = (0..name_words).map(|i| format!("Parte{i}")).collect();
        let line = format!("{} 1200 30 0,5 h 18,0", name.join(" "));
        let row = parse_appliance_line(&line).expect("row expected");
        assert_eq!(row.name, name.join(" "));
        assert_eq!(row.power_rating, "1200");
        assert_eq!(row.usage_days, "30");
        assert_eq!(row.usage_factor, "0,5");
        assert_eq!(row.unit, "h");
        assert_eq!(row.consumption, "18,0");
    }
}

#[test]
fn appliance_dashes_get_defaults() {
    let row = parse_appliance_line("Geladeira Frost Free 250 30 - - 45,0").unwrap();
    assert_eq!(row.usage_factor, "1");
    assert_eq!(row.unit, "h");

    let row = parse_appliance_line("Ferro 1000 4 - min 2,0").unwrap();
    assert_eq!(row.usage_factor, "1");
    assert_eq!(row.unit, "min");
}

#[test]
fn appliance_noise_is_removed_before_counting() {
    let row = parse_appliance_line("\"Chuveiro\" elétrico* 5500 30 0,5 h 82,5").unwrap();
    assert_eq!(row.name, "Chuveiro eletrico");
    assert!(parse_appliance_line("Total * * 133,5").is_none());
    assert!(parse_appliance_line("a b c d e").is_none());
    assert!(parse_appliance_line("").is_none());
}

#[test]
fn appliance_pages_skip_header_block() {
    let pages = vec![
        report_page(&[
            "Geladeira Frost Free 250 30 - - 45,0",
            "Máquina de Lavar* 500 12 1 h 6,0",
            "Total 51,0",
        ]),
        String::new(),
        report_page(&["Televisao 120 30 5 h 18,0"]),
    ];
    let extraction = extract_appliance_rows(&pages);

    assert_eq!(extraction.pages_seen, 2);
    assert_eq!(extraction.lines_skipped, 1);
    let names: Vec<&str> = extraction.rows.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Geladeira Frost Free", "Maquina de Lavar", "Televisao"]);
}

#[test]
fn appliance_report_written_with_header() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("consumo_aparelho.csv");
    let pages = vec![report_page(&[
        "Geladeira Frost Free 250 30 - - 45,0",
        "Ar Condicionado 1400 20 8 h 224,0",
    ])];

    let summary = ApplianceReportTransformer
        .run_with_source(&pages, &output)
        .expect("appliance run failed");

    assert_eq!(summary.rows_written, 2);
    assert_eq!(
        output_lines(&output),
        vec![
            "name;power_rating;usage_days;usage_factor;unit;consumption",
            "Geladeira Frost Free;250;30;1;h;45,0",
            "Ar Condicionado;1400;20;8;h;224,0",
        ]
    );
}

#[test]
fn appliance_missing_pdf_is_a_reported_failure() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("consumo_aparelho.csv");
    let input = dir.path().join("consumoAparelho.pdf");

    let err = ApplianceReportTransformer.run(&input, &output).unwrap_err();
    assert!(matches!(err, NormalizeError::MissingInput { .. }));

    let report = run_transformer(&ApplianceReportTransformer, &input, &output);
    assert_eq!(report.status, StepStatus::Failed);
    assert!(report.message.unwrap().contains("not found"));
    assert!(!output.exists());
}

#[test]
fn weather_renames_and_drops_incomplete_rows() {
    let table = read_table_tolerant("weather", &fixture_bytes("clima_inmet.csv"), b';').unwrap();
    let normalized = normalize_weather(table);

    assert!(normalized.renamed);
    assert_eq!(
        normalized.headers,
        vec![
            "DATE",
            "HOUR_UTC",
            "TEMP_MAX",
            "TEMP_MIN",
            "HUMIDITY",
            "WIND_DIR",
            "WIND_SPEED",
            "DATAHORA"
        ]
    );
    assert_eq!(normalized.rows_read, 5);
    assert_eq!(normalized.rows.len(), 3);
    assert!(normalized.rows.iter().all(|row| row.len() == 8));
    assert!(normalized.rows.iter().flatten().all(Option::is_some));
}

#[test]
fn weather_output_matches_canonical_layout() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("dados_clima.csv");

    let summary = WeatherSeriesTransformer
        .run(&fixture_path("clima_inmet.csv"), &output)
        .expect("weather run failed");

    assert_eq!(summary.rows_dropped, 2);
    assert_eq!(
        output_lines(&output),
        vec![
            "DATE;HOUR_UTC;TEMP_MAX;TEMP_MIN;HUMIDITY;WIND_DIR;WIND_SPEED;DATAHORA",
            "2024-01-01;0.0;22.4;21.8;88.0;120.0;1.8;2024-01-01 00:00:00",
            "2024-01-01;2.0;21.5;0.9;91.0;115.0;1.5;2024-01-01 02:00:00",
            "2024-01-01;3.0;21.1;20.7;n/d;110.0;1.2;2024-01-01 03:00:00",
        ]
    );
}

#[test]
fn weather_non_numeric_text_survives_completeness_filter() {
    // Known edge case: unparseable text is kept as-is rather than nulled, so
    // the row passes the any-null filter with text in a numeric column.
    let table = read_table(
        "weather",
        b"DATE;HOUR_UTC;TEMP_MAX;TEMP_MIN;HUMIDITY;WIND_DIR;WIND_SPEED\n\
          2024-01-01;4;calm;20;80;90;0\n",
        b';',
    )
    .unwrap();
    let normalized = normalize_weather(table);
    assert_eq!(normalized.rows.len(), 1);
    assert_eq!(normalized.rows[0][2].as_deref(), Some("calm"));
}

#[test]
fn weather_nan_cells_count_as_missing() {
    let table = read_table(
        "weather",
        b"DATE;HOUR_UTC;TEMP_MAX;TEMP_MIN;HUMIDITY;WIND_DIR;WIND_SPEED\n\
          2024-01-01;4;NaN;20;80;90;0\n\
          2024-01-01;5;21;20;nan;90;0\n\
          2024-01-01;6;21;20;80;90;0\n",
        b';',
    )
    .unwrap();
    let normalized = normalize_weather(table);
    assert_eq!(normalized.rows.len(), 1);
    assert_eq!(normalized.rows[0][1].as_deref(), Some("6.0"));

    let row = ["2024-01-01", "4", "NaN", "20", "80", "90", "0"];
    let raw = RawTable {
        headers: WEATHER_COLUMNS.iter().map(|h| h.to_string()).collect(),
        rows: vec![row.iter().map(|cell| Some(cell.to_string())).collect()],
    };
    assert!(normalize_weather(raw).rows.is_empty());
}

#[test]
fn weather_other_widths_keep_their_names() {
    let table =
        read_table_tolerant("weather", &fixture_bytes("clima_six_columns.csv"), b';').unwrap();
    let normalized = normalize_weather(table);

    assert!(!normalized.renamed);
    assert_eq!(
        normalized.headers,
        vec!["DATE", "HOUR_UTC", "TEMP_MAX", "TEMP_MIN", "HUMIDITY", "WIND_SPEED", "DATAHORA"]
    );
    assert_eq!(normalized.rows.len(), 1);
    assert_eq!(normalized.rows[0][5].as_deref(), Some("3.0"));
    assert_eq!(normalized.rows[0][6].as_deref(), Some("2024-03-10 14:00:00"));
}

#[test]
fn weather_without_date_and_hour_has_no_timestamp() {
    let table = read_table("weather", b"station;temp\nA;20,5\nB;\n", b';').unwrap();
    let normalized = normalize_weather(table);
    assert_eq!(normalized.headers, vec!["station", "temp"]);
    assert_eq!(
        normalized.rows,
        vec![vec![Some("A".to_string()), Some("20.5".to_string())]]
    );
}

#[test]
fn weather_timestamp_derivation() {
    assert_eq!(
        derive_weather_timestamp(Some("2024-01-01"), Some("9.0")).as_deref(),
        Some("2024-01-01 09:00:00")
    );
    assert_eq!(derive_weather_timestamp(Some("2024-01-01"), Some("24")), None);
    assert_eq!(derive_weather_timestamp(Some("01/01/2024"), Some("3")), None);
    assert_eq!(derive_weather_timestamp(Some("2024-01-01"), Some("1200")), None);
    assert_eq!(derive_weather_timestamp(None, Some("3")), None);
    assert_eq!(derive_weather_timestamp(Some("2024-01-01"), None), None);
}

#[test]
fn weather_missing_input_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let report = run_transformer(
        &WeatherSeriesTransformer,
        &dir.path().join("clima.csv"),
        &dir.path().join("dados_clima.csv"),
    );
    assert_eq!(report.status, StepStatus::Failed);
    assert!(report.summary.is_none());
}

#[test]
fn price_timestamp_is_zero_padded() {
    assert_eq!(
        derive_price_timestamp(Some("202401"), Some("5"), Some("9")).as_deref(),
        Some("2024-01-05 09:00:00")
    );
    assert_eq!(
        derive_price_timestamp(Some("202412"), Some("31.0"), Some("0")).as_deref(),
        Some("2024-12-31 00:00:00")
    );
    assert_eq!(derive_price_timestamp(Some("202402"), Some("30"), Some("1")), None);
    assert_eq!(derive_price_timestamp(Some("202401"), Some("x"), Some("1")), None);
    assert_eq!(derive_price_timestamp(Some("202401"), None, Some("1")), None);
}

#[test]
fn price_fragments_replaced_and_null_rows_kept() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("pld_normalizado.csv");

    let summary = PriceSeriesTransformer
        .run(&fixture_path("horario_preco.csv"), &output)
        .expect("price run failed");

    assert_eq!(summary.rows_written, 4);
    assert_eq!(summary.rows_dropped, 0);
    assert_eq!(
        output_lines(&output),
        vec![
            "SUBMERCADO;PLD_HORA;DATAHORA",
            "SUDESTE;61,07;2024-01-05 09:00:00",
            "SUL;55,00;2024-01-31 23:00:00",
            "NORTE;70,10;",
            "NORDESTE;48,90;",
        ]
    );
}

#[test]
fn price_requires_fragment_columns() {
    let table = read_table("price", b"MES_REFERENCIA;DIA;PLD\n202401;1;10\n", b';').unwrap();
    let err = normalize_price(table).unwrap_err();
    assert!(matches!(
        err,
        NormalizeError::MissingColumn { ref column, .. } if column == "HORA"
    ));
}

#[test]
fn sensor_parse_pass_filters_and_anonymizes() {
    let salt = LocationSalt::new("unit-test-salt");
    let table =
        read_table_tolerant("sensor", &fixture_bytes("dados_sensores.csv"), b',').unwrap();
    let parsed = parse_sensor_table(&table, &salt);

    assert_eq!(
        parsed.columns,
        vec![
            "sensor_model",
            "measure_unit",
            "device",
            "location",
            "data_type",
            "data",
            "created_at"
        ]
    );
    assert_eq!(parsed.rows_read, 6);
    assert_eq!(parsed.records.len(), 3);

    let first = &parsed.records[0];
    assert_eq!(first.sensor_model.as_deref(), Some("X"));
    assert_eq!(first.data, Some(12.5));
    assert_eq!(first.created_at.as_deref(), Some("2024-01-31 10:00:00"));
    assert_eq!(
        first.location.as_deref(),
        Some(anonymize_location(Some("Sala 3"), &salt).as_str())
    );

    let second = &parsed.records[1];
    assert_eq!(second.measure_unit.as_deref(), Some("°C"));
    assert_eq!(second.location, None);
    assert_eq!(second.created_at.as_deref(), Some("2024-01-31 10:05:00"));

    for record in &parsed.records {
        if let Some(location) = &record.location {
            assert_eq!(location.len(), 64);
            assert!(!location.contains("Sala"));
        }
    }
}

#[test]
fn sensor_output_is_canonicalized() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("dados.csv");
    let salt = LocationSalt::new("unit-test-salt");
    let transformer = SensorRecordTransformer::new(salt.clone());

    let summary = transformer
        .run(&fixture_path("dados_sensores.csv"), &output)
        .expect("sensor run failed");
    assert_eq!(summary.rows_written, 3);
    assert_eq!(summary.rows_dropped, 3);
    assert!(summary.notes.is_empty());

    let lines = output_lines(&output);
    assert_eq!(
        lines[0],
        "sensor_model;measure_unit;device;location;data_type;data;created_at;DATAHORA;unit;metric"
    );
    let hash = anonymize_location(Some("Sala 3"), &salt);
    assert_eq!(
        lines[1],
        format!(
            "X;kwh;meter-1;{hash};energia;12.5;2024-01-31 10:00:00;2024-01-31 10:00:00;kWh;energy"
        )
    );

    let second: Vec<&str> = lines[2].split(';').collect();
    assert_eq!(second[0], "Y");
    assert_eq!(second[3], "");
    assert_eq!(&second[7..], ["2024-01-31 10:05:00", "C", "temperature"]);

    let third: Vec<&str> = lines[3].split(';').collect();
    assert_eq!(third[0], "U");
    assert_eq!(&third[8..], ["W", "humidity"]);
    assert_eq!(lines.len(), 4);
}

#[test]
fn sensor_canonicalization_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("dados.csv");
    let transformer = SensorRecordTransformer::default();
    assert!(transformer.salt().is_insecure_default());
    transformer
        .run(&fixture_path("dados_sensores.csv"), &output)
        .expect("sensor run failed");

    let first = fs::read(&output).unwrap();
    canonicalize_sensor_file(&output).expect("second canonicalization failed");
    let second = fs::read(&output).unwrap();
    assert_eq!(first, second);
}

#[test]
fn sensor_semicolon_input_uses_sniffed_delimiter() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("dados.csv");
    SensorRecordTransformer::default()
        .run(&fixture_path("dados_sensores_semicolon.csv"), &output)
        .expect("sensor run failed");

    let lines = output_lines(&output);
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("X;kWh;m1;"));
    assert!(lines[1].ends_with(";2024-02-01 00:00:00;kWh;energy"));
    assert!(lines[2].ends_with(";pct;power_factor"));
}

#[test]
fn sensor_without_optional_columns_keeps_present_ones() {
    let salt = LocationSalt::default();
    let table = read_table(
        "sensor",
        b"valor,timestamp,tipo_dado,extra\n1,2024-01-01,energia,z\n,2024-01-01,energia,z\n",
        b',',
    )
    .unwrap();
    let parsed = parse_sensor_table(&table, &salt);
    assert_eq!(parsed.columns, vec!["data_type", "data", "created_at"]);
    assert_eq!(parsed.records.len(), 1);
}

#[test]
fn sensor_nan_readings_are_dropped() {
    let salt = LocationSalt::new("unit-test-salt");
    let table = read_table(
        "sensor",
        b"valor,timestamp,tipo_dado\n\
          NaN,2024-01-01,energia\n\
          1,2024-01-01,NA\n\
          2,2024-01-01,energia\n",
        b',',
    )
    .unwrap();
    let parsed = parse_sensor_table(&table, &salt);
    assert_eq!(parsed.records.len(), 1);
    assert_eq!(parsed.records[0].data, Some(2.0));

    let raw = RawTable {
        headers: vec!["data".into(), "created_at".into(), "data_type".into()],
        rows: vec![vec![
            Some("NaN".into()),
            Some("2024-01-01".into()),
            Some("energia".into()),
        ]],
    };
    assert!(parse_sensor_table(&raw, &salt).records.is_empty());
}

#[test]
fn every_transformer_reports_missing_input_without_panicking() {
    let dir = tempfile::tempdir().unwrap();
    let transformers: [&dyn Transformer; 4] = [
        &ApplianceReportTransformer,
        &PriceSeriesTransformer,
        &WeatherSeriesTransformer,
        &SensorRecordTransformer::default(),
    ];
    assert_eq!(all_transformer_descriptors().len(), transformers.len());

    for (transformer, descriptor) in transformers.iter().zip(all_transformer_descriptors()) {
        assert_eq!(transformer.name(), descriptor.code);
        let report = run_transformer(
            *transformer,
            &dir.path().join(descriptor.default_input),
            &dir.path().join(descriptor.default_output),
        );
        assert_eq!(report.status, StepStatus::Failed, "{}", descriptor.code);
    }
}
