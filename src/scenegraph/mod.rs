//! World-visible objects and their registry (C7), plus a procedural demo
//! scene used by the worker binary since real scene loading is out of scope.

pub mod demo_scene;
pub mod object_manager;
