//! `rise-engine`: a distributed physically-based rendering engine — a
//! master/worker/submitter work-dispatch network (C10-C14) layered over a
//! spatial-acceleration and ray-intersection core (C1-C9).

pub mod cache;
pub mod camera;
pub mod config;
pub mod geometry;
pub mod intersect;
pub mod job;
pub mod math;
pub mod net;
pub mod photon;
pub mod scenegraph;
pub mod shading;
pub mod tree;
