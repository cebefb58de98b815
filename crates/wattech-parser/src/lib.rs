pub mod errors;
pub mod formats;
pub mod model;
mod registry;

pub use errors::NormalizeError;
pub use formats::{
    ApplianceReportTransformer, PriceSeriesTransformer, SensorRecordTransformer,
    WeatherSeriesTransformer,
};
pub use model::{
    ApplianceRow, LocationSalt, RawTable, SensorRecord, StepReport, StepStatus, TransformSummary,
    DEFAULT_LOCATION_SALT,
};
pub use registry::{
    all_transformer_descriptors, run_transformer, transformer_descriptor, Transformer,
    TransformerDescriptor,
};

#[cfg(test)]
mod tests;
