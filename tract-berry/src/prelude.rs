//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx3d, Idx3dF, Idx3dI16};

pub use crate::atlas::{find_nearest, AffineRegistration, CandidateAtlas, Registration, TractAtlas};
pub use crate::config::AtlasMatchConfig;
pub use crate::consts::{cluster_or_sentinel, NO_MATCH};
pub use crate::mgr::{AtlasMatch, RegionRole, RoiMgr, Seed, SeedSpace};
pub use crate::roi::{Affine, Roi};
pub use crate::{ConfigError, ConfigResult, Subject, VoxelMask};
