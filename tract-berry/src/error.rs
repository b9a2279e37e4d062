//! 配置阶段的运行时错误.

use thiserror::Error;

/// 配置 / 图谱加载错误.
///
/// 发生错误时, 出错的 [`crate::RoiMgr`] 保持调用前的状态不变.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// 图谱不含任何纤维束.
    #[error("track atlas is empty")]
    EmptyAtlas,

    /// 第 `0` 条图谱流线的扁平缓冲区长度不是 3 的倍数.
    #[error("atlas tract {0} is not a flat list of 3D points")]
    MalformedTract(usize),

    /// 图谱流线条数与簇标签个数不一致.
    #[error("atlas has {tracts} tracts but {clusters} cluster labels")]
    ClusterMismatch {
        /// 流线条数.
        tracts: usize,
        /// 簇标签个数.
        clusters: usize,
    },

    /// 某条流线的簇标签在纤维束名称表中不存在.
    #[error("cluster label {label} of tract {index} has no tract name")]
    UnknownCluster {
        /// 流线下标.
        index: usize,
        /// 簇标签.
        label: u32,
    },

    /// 纤维束编号越界. 第二个参数是名称表长度.
    #[error("invalid track_id {0} (atlas has {1} tracts)")]
    InvalidTrackId(u32, usize),

    /// 容差距离非法 (NaN, 无穷或负数).
    #[error("invalid tolerance distance {0}")]
    InvalidTolerance(f32),

    /// 配准结果 (subject -> template 映射) 不可用.
    #[error("subject to template mapping is unavailable")]
    RegistrationUnavailable,

    /// 目标纤维束在 subject 网格内没有任何体素.
    #[error("track {0} has no voxel inside the subject grid")]
    EmptyTrack(u32),

    /// 区域的坐标变换不可逆.
    #[error("region transform is not invertible")]
    SingularTransform,

    /// seed 坐标空间个数超过 `u16` 所能索引的范围.
    #[error("too many seed coordinate spaces")]
    TooManySeedSpaces,

    /// 配置过程被外部取消.
    #[error("atlas configuration cancelled")]
    Cancelled,
}

/// 配置阶段的结果类型.
pub type ConfigResult<T> = Result<T, ConfigError>;
