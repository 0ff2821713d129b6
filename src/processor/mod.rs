pub mod detector;
pub mod geofence;
pub mod pipeline;
pub mod side_effects;
pub mod trips;
pub mod validator;

pub use pipeline::{IngestOutcome, IngestionPipeline};
