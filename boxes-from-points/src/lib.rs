//! Preparation of point-to-box annotation jobs.
//!
//! Annotators receive one crop per point hint and draw the box of the pointed object. The
//! crops are sized from the GT boxes, anonymized and grouped into jobs that each carry a
//! few GT crops for quality control.

mod common;
pub mod config;
pub mod dataset;
pub mod error;
pub mod layout;
pub mod matching;
pub mod meta;
pub mod pipeline;
pub mod platform;
pub mod roi;
pub mod storage;
pub mod utils;
pub mod validation;

pub use config::Config;
pub use error::{ErrorKind, ValidationError};
pub use pipeline::{Pipeline, PipelineFailure, PipelineOutput, Stage};
