//! treecount
//!
//! Count unique objects in an image by clustering detection bounding boxes.
//!
//! The pipeline has three stages:
//!
//! 1. **Upload**: POST the image to a remote detection endpoint and parse the
//!    returned list of bounding boxes (`inference`).
//! 2. **Cluster**: group box centroids with a greedy single-linkage scan under
//!    a fixed pixel threshold; the cluster count is the unique-object estimate
//!    (`cluster`).
//! 3. **Overlay**: outline each detection on a copy of the image (`overlay`).
//!
//! The clustering core is a pure function over the detection set; the upload
//! and overlay stages are thin I/O around it.
//!
//! # Module Structure
//!
//! - `bbox`: detection geometry (`BoundingBox`, `Point`)
//! - `cluster`: greedy proximity clusterer
//! - `inference`: HTTP upload client for the detection endpoint
//! - `overlay`: annotated image rendering
//! - `config`: config file + environment layering

pub mod bbox;
pub mod cluster;
pub mod config;
pub mod inference;
pub mod overlay;

pub use bbox::{BoundingBox, Point};
pub use cluster::{cluster_count, cluster_points, DEFAULT_THRESHOLD};
pub use config::TreecountConfig;
pub use inference::{parse_predictions, InferenceClient};
