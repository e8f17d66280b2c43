//! Conversion of raw audio chunks into a smoothed, downsampled energy envelope.
//!
//! The envelope of an exhalation through a PEP device oscillates at the
//! device's flutter frequency (10-40 Hz), which is far below the audible
//! content of the airflow noise. The preprocessor removes slow drift,
//! rectifies the signal to energy and downsamples it so that the pitch
//! estimator can work on a short, low rate signal.
//!
//! ```
//! use pep_ear::{ChunkPreprocessor, EstimatorConfig};
//!
//! let config = EstimatorConfig::default();
//! let mut preprocessor = ChunkPreprocessor::new(&config);
//! let chunk = vec![0.0_f32; 4410];
//! let envelope = preprocessor.process(&chunk);
//! assert_eq!(envelope.len(), 4410 / 45);
//! ```

mod preprocessor;

pub use preprocessor::ChunkPreprocessor;
