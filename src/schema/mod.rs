//! Common normalized data types
//!
//! Every wire format (REST arrays, REST objects, stream envelopes) is decoded
//! into these records before anything is handed to a sink.

mod cadence;
mod market_data;

pub use cadence::*;
pub use market_data::*;
