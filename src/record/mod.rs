pub mod detect;
pub mod journey;
pub mod legacy;
pub mod poster;

pub use detect::{detect_variant, RecordVariant};
pub use poster::{PosterRecord, CANONICAL_STORE_PREFIX, POSTER_SCHEMA_VERSION};
