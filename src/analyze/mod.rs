//! Post-ingest analysis: file attribution over the bucket map, then the
//! hot-to-cold histogram, Zipfian theta estimate, and top-files ranking

pub mod attribute;
pub mod histogram;

pub use attribute::FileHits;
pub use histogram::{Analysis, HistogramRow, ThetaEstimate, TopFile};
