#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 为扩散 MRI 纤维束追踪 (tractography) 提供 ROI 体素成员判定,
//! 以及基于纤维束图谱 (tractography atlas) 的流线归类.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 该 crate 不负责读取影像 (NIfTI, DICOM 等), 也不负责追踪算法本身.
//!   调用方 (追踪器) 负责把区域体素和流线以本库约定的格式传进来.
//! 2. 配置阶段的错误以 [`ConfigError`] 返回; 查询阶段的函数都是全函数,
//!   不会失败, 也不会 panic (除非违反文档中明确写出的前置条件).
//!
//! # 开发计划
//!
//! ### 稀疏体素集合 `Roi` ✅
//!
//! `x -> y -> z 块` 三级索引, 压在同一个 `u32` 数组里. 只增不删.
//! 查询时可先经过仿射变换再取整.
//!
//! 实现位于 `tract-berry/src/roi`.
//!
//! ### 流线距离 ✅
//!
//! L1 (曼哈顿) 距离下的单向/对称 Hausdorff 距离, 以及三锚点快速排除.
//!
//! 实现位于 `tract-berry/src/distance.rs`.
//!
//! ### 图谱最近纤维束匹配 ✅
//!
//! 对整部图谱扫描一遍, 用当前最优距离作为上限逐步收紧剪枝.
//!
//! 实现位于 `tract-berry/src/atlas`.
//!
//! ### 区域管理器 `RoiMgr` ✅
//!
//! 管理 seed / ROI / ROA / end / terminate / no-end / limiting 七类区域,
//! 并提供追踪器使用的流线接受判定.
//!
//! 实现位于 `tract-berry/src/mgr`.
//!
//! ### 三维形态学操作 ✅
//!
//! 自动生成 seed 区域所需的膨胀与平滑.
//!
//! 实现位于 `tract-berry/src/morph_3d`.
//!
//! ### 坐标约定
//!
//! 1. 体素索引一律按 `(x, y, z)` 排列, 与追踪器内部一致.
//! 2. 流线以扁平 `&[f32]` 缓冲区表示: `x0, y0, z0, x1, y1, z1, ...`.
//!   缓冲区长度应当是 3 的倍数.

/// 三维索引 / 网格尺寸 `(x, y, z)`.
pub type Idx3d = (usize, usize, usize);

/// 区域点的压缩存储坐标. 允许为负 (越界点在插入时会被丢弃).
pub type Idx3dI16 = (i16, i16, i16);

/// 浮点坐标. 查询时四舍五入到最近的体素.
pub type Idx3dF = (f32, f32, f32);

pub mod consts;

mod error;
pub use error::{ConfigError, ConfigResult};

pub mod config;

pub mod roi;
pub use roi::{Affine, Roi};

pub mod distance;

pub mod atlas;
pub use atlas::{find_nearest, AffineRegistration, CandidateAtlas, Registration, TractAtlas};

pub mod morph_3d;
pub use morph_3d::VoxelMask;

mod par;

mod subject;
pub use subject::Subject;

pub mod mgr;
pub use mgr::{RegionRole, RoiMgr, Seed, SeedSpace};

pub mod prelude;

/// 测试用日志初始化. 重复调用无副作用.
#[cfg(test)]
pub(crate) fn init_test_logger() {
    let _ = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Debug)
        .init();
}
