//! 追踪所针对的 subject 数据.

use ndarray::Array3;

use crate::{Idx3d, Idx3dI16};

/// 当前追踪所针对的 subject 数据.
///
/// 只保存本库用到的部分: 网格尺寸 (由体数据形状决定) 和第一个各向异性指标
/// (通常为 FA) 体数据. 体数据按 `[x, y, z]` 索引.
#[derive(Clone, Debug)]
pub struct Subject {
    fa0: Array3<f32>,
}

impl Subject {
    /// 以各向异性体数据创建.
    pub fn new(fa0: Array3<f32>) -> Self {
        Self { fa0 }
    }

    /// 网格尺寸.
    #[inline]
    pub fn dim(&self) -> Idx3d {
        self.fa0.dim()
    }

    /// 各向异性体数据.
    #[inline]
    pub fn fa0(&self) -> &Array3<f32> {
        &self.fa0
    }

    /// 各向异性值大于 `threshold` 的所有体素, 按 x, y, z 升序.
    pub fn voxels_above(&self, threshold: f32) -> Vec<Idx3dI16> {
        self.fa0
            .indexed_iter()
            .filter(|(_, v)| **v > threshold)
            .map(|((x, y, z), _)| (x as i16, y as i16, z as i16))
            .collect()
    }
}
