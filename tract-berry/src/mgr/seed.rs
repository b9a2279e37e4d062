//! seed 及其坐标空间.

use crate::{Affine, Idx3dF, Idx3dI16};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 一个 seed 体素.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Seed {
    /// 所在坐标空间中的体素坐标.
    pub pos: Idx3dI16,

    /// 坐标空间在 [`crate::RoiMgr::seed_spaces`] 中的下标.
    pub space: u16,
}

/// seed 所在的坐标空间.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SeedSpace {
    /// 本空间 -> subject 空间.
    pub to_subject: Affine,

    /// 是否需要变换. 为 `false` 时 seed 坐标即 subject 坐标.
    pub need_trans: bool,
}

impl SeedSpace {
    /// 将本空间中的体素 `pos` 转换为 subject 空间中的起始位置.
    #[inline]
    pub fn to_subject_point(&self, (x, y, z): Idx3dI16) -> Idx3dF {
        let p = (x as f32, y as f32, z as f32);
        if self.need_trans {
            self.to_subject.apply(p)
        } else {
            p
        }
    }
}
