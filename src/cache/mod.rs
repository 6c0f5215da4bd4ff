//! Caches shared by the geometry and lighting cores: the MRU Bézier-patch
//! proxy cache (C6) and the irradiance cache (C8).

pub mod irradiance;
pub mod mru;
