//! Core types for the Flock agent-based modeling runtime.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by every other crate in the workspace: agent
//! and tick identifiers, the error taxonomy, the seedable random source,
//! cooperative cancellation, scalar values, and the flat tables the data
//! collector and batch runner emit.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod cancel;
pub mod codec;
pub mod error;
pub mod id;
pub mod params;
pub mod rng;
pub mod table;
pub mod value;

pub use cancel::CancelToken;
pub use codec::{read_csv, write_csv, write_jsonl, CodecError, OutputFormat};
pub use error::{ConfigError, ErrorKind};
pub use id::{AgentId, NodeId, TickId};
pub use params::{ParamSet, ParamSpec, ParameterGrid};
pub use rng::{derive_seed, RandomSource};
pub use table::{Record, Table};
pub use value::Value;
