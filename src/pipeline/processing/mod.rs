// Pipeline processing: column normalization, cleaning, and the value transform

pub mod clean;
pub mod normalize;
pub mod transform;

pub use clean::Cleaner;
pub use normalize::ColumnNormalizer;
pub use transform::ValueScaler;
