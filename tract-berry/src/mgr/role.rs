//! 区域角色.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 区域在追踪中扮演的角色.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RegionRole {
    /// 从该区域内出发追踪.
    Seed,

    /// ROI. 流线必须经过每一个此类区域.
    Inclusion,

    /// ROA. 流线不得进入任何此类区域.
    Exclusion,

    /// 流线端点必须落在此类区域中.
    End,

    /// 流线进入此类区域即停止.
    Terminate,

    /// 流线端点不得落在此类区域中.
    NoEnd,

    /// 流线只能在此类区域 (之一) 内延伸.
    Limiting,
}

impl RegionRole {
    /// 全部角色.
    pub const ALL: [RegionRole; 7] = [
        Self::Seed,
        Self::Inclusion,
        Self::Exclusion,
        Self::End,
        Self::Terminate,
        Self::NoEnd,
        Self::Limiting,
    ];

    /// 写入报告时, 区域名称之前的描述语句.
    pub fn report_prefix(&self) -> &'static str {
        match self {
            Self::Seed => " A seeding region was placed at ",
            Self::Inclusion => " An ROI was placed at ",
            Self::Exclusion => " An ROA was placed at ",
            Self::End => " An ending region was placed at ",
            Self::Terminate => " A terminative region was placed at ",
            Self::NoEnd => " A no ending region was placed at ",
            Self::Limiting => " A limiting region was placed at ",
        }
    }

    /// 在非 seed 区域列表中的下标. seed 不以 [`crate::Roi`] 存储, 返回 `None`.
    #[inline]
    pub(crate) fn slot(&self) -> Option<usize> {
        match self {
            Self::Seed => None,
            Self::Inclusion => Some(0),
            Self::Exclusion => Some(1),
            Self::End => Some(2),
            Self::Terminate => Some(3),
            Self::NoEnd => Some(4),
            Self::Limiting => Some(LIMITING_SLOT),
        }
    }
}

/// 非 seed 角色个数.
pub(crate) const REGION_SLOTS: usize = 6;

/// limiting 区域的槽位.
pub(crate) const LIMITING_SLOT: usize = 5;

#[cfg(test)]
mod tests {
    use super::{RegionRole, REGION_SLOTS};

    #[test]
    fn test_slots_are_dense() {
        let mut seen = [false; REGION_SLOTS];
        for role in RegionRole::ALL {
            if let Some(i) = role.slot() {
                assert!(!seen[i]);
                seen[i] = true;
            }
        }
        assert!(seen.iter().all(|s| *s));
        assert_eq!(RegionRole::Seed.slot(), None);
    }
}
