//! 图谱匹配的可调参数.
//!
//! 默认值见 [`crate::consts::defaults`]. 也可以通过环境变量覆盖:
//!
//! | 变量                             | 字段                |
//! |----------------------------------|---------------------|
//! | `TRACT_BERRY_SEED_DILATION`      | `seed_dilation`     |
//! | `TRACT_BERRY_SEED_SMOOTHING`     | `seed_smoothing`    |
//! | `TRACT_BERRY_LIMIT_MARGIN`       | `limit_margin`      |
//! | `TRACT_BERRY_CANDIDATE_FACTOR`   | `candidate_factor`  |

use std::env;
use std::str::FromStr;

use crate::consts::defaults;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// [`crate::RoiMgr::configure_atlas_match`] 使用的参数.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AtlasMatchConfig {
    /// 自动 seed 区域的 6-邻域膨胀次数.
    pub seed_dilation: u32,

    /// 自动 seed 区域的平滑次数.
    pub seed_smoothing: u32,

    /// limiting 区域半径为 `round(容差) + limit_margin` 个体素.
    pub limit_margin: u32,

    /// 候选图谱保留与目标纤维束距离小于 `candidate_factor * 容差` 的其他流线.
    pub candidate_factor: f32,
}

impl Default for AtlasMatchConfig {
    fn default() -> Self {
        Self {
            seed_dilation: defaults::SEED_DILATION,
            seed_smoothing: defaults::SEED_SMOOTHING,
            limit_margin: defaults::LIMIT_MARGIN,
            candidate_factor: defaults::CANDIDATE_FACTOR,
        }
    }
}

impl AtlasMatchConfig {
    /// 以默认值为基础, 读取环境变量覆盖对应字段.
    ///
    /// 无法解析的值会被忽略 (记录一条 warning), 该字段保持默认值.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        override_from_env("TRACT_BERRY_SEED_DILATION", &mut cfg.seed_dilation);
        override_from_env("TRACT_BERRY_SEED_SMOOTHING", &mut cfg.seed_smoothing);
        override_from_env("TRACT_BERRY_LIMIT_MARGIN", &mut cfg.limit_margin);
        override_from_env("TRACT_BERRY_CANDIDATE_FACTOR", &mut cfg.candidate_factor);
        if !(cfg.candidate_factor.is_finite() && cfg.candidate_factor >= 1.0) {
            log::warn!(
                "candidate factor {} out of range, fall back to {}",
                cfg.candidate_factor,
                defaults::CANDIDATE_FACTOR
            );
            cfg.candidate_factor = defaults::CANDIDATE_FACTOR;
        }
        cfg
    }
}

/// 若环境变量 `key` 存在且能解析, 则写入 `slot`.
fn override_from_env<T: FromStr>(key: &str, slot: &mut T) {
    let Ok(raw) = env::var(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(v) => *slot = v,
        Err(_) => log::warn!("ignore ${key}: cannot parse {raw:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_consts() {
        let cfg = AtlasMatchConfig::default();
        assert_eq!(cfg.seed_dilation, 3);
        assert_eq!(cfg.seed_smoothing, 2);
        assert_eq!(cfg.limit_margin, 1);
        assert_eq!(cfg.candidate_factor, 2.0);
    }

    #[test]
    fn test_override_from_env() {
        // 只使用本测试独有的变量名, 避免与其它并行测试互相干扰.
        let key = "TRACT_BERRY_TEST_ONLY_OVERRIDE";
        let mut slot = 7u32;

        env::set_var(key, " 11 ");
        override_from_env(key, &mut slot);
        assert_eq!(slot, 11);

        env::set_var(key, "eleven");
        override_from_env(key, &mut slot);
        assert_eq!(slot, 11);

        env::remove_var(key);
        override_from_env(key, &mut slot);
        assert_eq!(slot, 11);
    }
}
