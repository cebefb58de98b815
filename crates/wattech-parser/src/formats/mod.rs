mod appliance;
mod common;
mod page_text;
mod price;
pub mod schema;
mod sensor;
mod table;
mod weather;

pub use appliance::{
    extract_appliance_rows, parse_appliance_line, ApplianceExtraction, ApplianceReportTransformer,
    PageSource, PdfPages,
};
pub use common::{
    anonymize_location, coerce_numeric_text, normalize_decimal, parse_tolerant_datetime,
    parse_tolerant_float, remove_accents, render_float, TolerantFloat, TIMESTAMP_FORMAT,
};
pub use price::{
    derive_price_timestamp, normalize_price, PriceNormalization, PriceSeriesTransformer,
};
pub use sensor::{
    canonicalize_sensor_file, canonicalize_sensor_table, parse_sensor_table, SensorParse,
    SensorRecordTransformer,
};
pub use table::{
    decode_text, read_table, read_table_tolerant, sniff_delimiter, write_table, OUTPUT_DELIMITER,
};
pub use weather::{
    derive_weather_timestamp, normalize_weather, WeatherNormalization, WeatherSeriesTransformer,
};

pub(crate) use common::{coerce_integer, parse_integral};
pub(crate) use table::{read_input, text_frame, TableBuilder};
