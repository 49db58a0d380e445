//! Forward-bundle composition: segments in, uploadable bundle out.

pub mod bundle;
pub mod composer;
pub mod element;
pub mod envelope;
pub mod faces;
pub mod proto;
pub mod segment;
pub mod tracker;

pub use bundle::{encode_blobs, Bundle, NamedBlob, ResultRow};
pub use composer::{Collaborators, ComposeOptions, ForwardComposer};
pub use segment::Segment;
pub use tracker::ResourceTracker;
