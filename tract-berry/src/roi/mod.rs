//! 稀疏体素集合.

use num::ToPrimitive;

use crate::consts::Z_BLOCK_BITS;
use crate::{Idx3d, Idx3dF, Idx3dI16};

mod transform;

pub use transform::Affine;

/// 三维网格上的稀疏体素集合 (ROI).
///
/// # 内部结构
///
/// 所有索引层共享同一个 `u32` 数组 `xyz_hash`:
///
/// 1. 前 `w` 个元素按 x 索引, 值为该 x 对应的 y 块起始偏移 (0 表示不存在);
/// 2. 每个 y 块长 `h`, 按 y 索引, 值为 z 块起始偏移 (0 表示不存在);
/// 3. 每个 z 块长 `ceil(d / 32)`, 按位存储该 `(x, y)` 列上的成员.
///
/// 因为第一层占据了 `[0, w)`, 任何有效偏移都不可能为 0.
/// 内存占用只与出现过的 x 和 `(x, y)` 组合个数有关, 与网格体积无关.
///
/// 集合只增不删. 构造并插入完毕后只读, 可在多线程间共享.
#[derive(Clone, Debug)]
pub struct Roi {
    dim: Idx3d,
    xyz_hash: Vec<u32>,
    /// subject 空间 -> 本集合所在空间.
    from_subject: Option<Affine>,
}

impl Roi {
    /// 以 `dim` 为网格尺寸创建空集合. 查询点直接在该网格上取整.
    pub fn new(dim: Idx3d) -> Self {
        Self {
            dim,
            xyz_hash: vec![0; dim.0],
            from_subject: None,
        }
    }

    /// 以 `dim` 为网格尺寸创建空集合, 查询点先经过 `from_subject` 变换到本网格.
    ///
    /// 即使 `from_subject` 是恒等变换, 查询时也会执行变换 (结果不变).
    pub fn with_transform(dim: Idx3d, from_subject: Affine) -> Self {
        Self {
            from_subject: Some(from_subject),
            ..Self::new(dim)
        }
    }

    /// 在 `dim` 网格上创建包含 `points` 的集合. 越界点被忽略.
    pub fn from_points(dim: Idx3d, points: &[Idx3dI16]) -> Self {
        let mut ans = Self::new(dim);
        ans.extend(points.iter().copied());
        ans
    }

    /// 网格尺寸.
    #[inline]
    pub fn dim(&self) -> Idx3d {
        self.dim
    }

    /// 查询点使用的坐标变换. `None` 表示不变换.
    #[inline]
    pub fn transform(&self) -> Option<&Affine> {
        self.from_subject.as_ref()
    }

    /// 集合是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.xyz_hash.len() == self.dim.0
    }

    /// 每个 z 块的长度.
    #[inline]
    fn z_block_len(&self) -> usize {
        (self.dim.2 + Z_BLOCK_BITS - 1) / Z_BLOCK_BITS
    }

    /// 若 `(x, y, z)` 在网格内则返回其无符号索引.
    #[inline]
    fn checked(&self, (x, y, z): Idx3dI16) -> Option<Idx3d> {
        let (x, y, z) = (
            usize::try_from(x).ok()?,
            usize::try_from(y).ok()?,
            usize::try_from(z).ok()?,
        );
        (x < self.dim.0 && y < self.dim.1 && z < self.dim.2).then_some((x, y, z))
    }

    /// 在数组尾部追加 `len` 个 0, 返回追加部分的起始偏移.
    #[inline]
    fn grow(&mut self, len: usize) -> u32 {
        let base = self.xyz_hash.len();
        debug_assert!(base <= u32::MAX as usize);
        self.xyz_hash.resize(base + len, 0);
        base as u32
    }

    /// 插入一个点. 越界点被忽略.
    pub fn insert(&mut self, p: Idx3dI16) {
        let Some((x, y, z)) = self.checked(p) else {
            return;
        };

        let mut y_base = self.xyz_hash[x];
        if y_base == 0 {
            y_base = self.grow(self.dim.1);
            self.xyz_hash[x] = y_base;
        }
        let y_slot = y_base as usize + y;
        let mut z_base = self.xyz_hash[y_slot];
        if z_base == 0 {
            z_base = self.grow(self.z_block_len());
            self.xyz_hash[y_slot] = z_base;
        }
        self.xyz_hash[z_base as usize + z / Z_BLOCK_BITS] |= 1u32 << (z % Z_BLOCK_BITS);
    }

    /// 查询整数坐标 `p` 是否在集合中. 不经过坐标变换.
    pub fn contains_voxel(&self, p: Idx3dI16) -> bool {
        let Some((x, y, z)) = self.checked(p) else {
            return false;
        };
        let y_base = self.xyz_hash[x] as usize;
        if y_base == 0 {
            return false;
        }
        let z_base = self.xyz_hash[y_base + y] as usize;
        if z_base == 0 {
            return false;
        }
        self.xyz_hash[z_base + z / Z_BLOCK_BITS] & (1u32 << (z % Z_BLOCK_BITS)) != 0
    }

    /// 查询 subject 空间中的点 `p` 是否在集合中.
    ///
    /// 若构造时给出了变换, 则先变换, 然后四舍五入到最近体素.
    /// 越界、NaN 或超出 `i16` 表示范围的点都不在集合中.
    #[inline]
    pub fn contains(&self, p: Idx3dF) -> bool {
        let p = match &self.from_subject {
            Some(t) => t.apply(p),
            None => p,
        };
        round_voxel(p).is_some_and(|v| self.contains_voxel(v))
    }

    /// 流线 `track` 是否至少有一个点在集合中. 命中第一个点即返回.
    ///
    /// `track` 为扁平缓冲区, 末尾不足 3 个的浮点数被忽略.
    pub fn any_included(&self, track: &[f32]) -> bool {
        track
            .chunks_exact(3)
            .any(|p| self.contains((p[0], p[1], p[2])))
    }
}

impl Extend<Idx3dI16> for Roi {
    fn extend<I: IntoIterator<Item = Idx3dI16>>(&mut self, iter: I) {
        for p in iter {
            self.insert(p);
        }
    }
}

/// 四舍五入到最近的整数体素. 无法用 `i16` 表示时返回 `None`.
#[inline]
pub(crate) fn round_voxel((x, y, z): Idx3dF) -> Option<Idx3dI16> {
    Some((
        x.round().to_i16()?,
        y.round().to_i16()?,
        z.round().to_i16()?,
    ))
}
