//! 通用常量.

/// 图谱匹配失败时, 原系统对外使用的哨兵簇标签.
///
/// 本库内部以 `Option::None` 表示 "无匹配", 该常量仅用于与外部约定的数值接口互转.
pub const NO_MATCH: u32 = 9999;

/// 可参与归类的流线扁平缓冲区的最小长度 (不含). 即至少需要 3 个点.
pub const MIN_TRACT_FLOATS: usize = 6;

/// 每个 z 方向位块容纳的体素个数.
pub(crate) const Z_BLOCK_BITS: usize = 32;

/// 配置相关的默认值.
pub mod defaults {
    /// 由图谱纤维束自动生成 seed 区域时的膨胀次数.
    pub const SEED_DILATION: u32 = 3;

    /// 由图谱纤维束自动生成 seed 区域时的平滑次数.
    pub const SEED_SMOOTHING: u32 = 2;

    /// limiting 区域在容差半径之外额外保留的体素层数.
    pub const LIMIT_MARGIN: u32 = 1;

    /// 候选图谱的筛选半径相对于容差的倍数.
    pub const CANDIDATE_FACTOR: f32 = 2.0;
}

/// 将一个 `Option<u32>` 形式的匹配结果转换为外部数值接口使用的簇标签.
#[inline]
pub const fn cluster_or_sentinel(cluster: Option<u32>) -> u32 {
    match cluster {
        Some(c) => c,
        None => NO_MATCH,
    }
}

#[cfg(test)]
mod tests {
    use super::{cluster_or_sentinel, NO_MATCH};

    #[test]
    fn test_sentinel() {
        assert_eq!(cluster_or_sentinel(Some(3)), 3);
        assert_eq!(cluster_or_sentinel(None), NO_MATCH);
    }
}
