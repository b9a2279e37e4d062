//! 3D 形态学操作.
//!
//! 只提供由图谱纤维束自动生成 seed / limiting 区域所需的几种操作.

use itertools::iproduct;
use ndarray::{Array3, Axis, Zip};

use crate::{Idx3d, Idx3dI16};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
    }
}

/// 邻域内前景体素数超过该值则平滑为前景, 低于则平滑为背景 (26-邻域的一半).
const SMOOTH_HALF: usize = 13;

/// 三维二值体素掩膜, 按 `[x, y, z]` 索引.
///
/// 前景为 1, 背景为 0.
#[derive(Clone, Debug, PartialEq)]
pub struct VoxelMask {
    data: Array3<u8>,
}

impl VoxelMask {
    /// 创建尺寸为 `dim` 的全背景掩膜.
    pub fn new(dim: Idx3d) -> Self {
        Self {
            data: Array3::zeros(dim),
        }
    }

    /// 创建尺寸为 `dim` 的掩膜, 并将 `points` 设置为前景. 越界点被忽略.
    pub fn from_points(dim: Idx3d, points: &[Idx3dI16]) -> Self {
        let mut ans = Self::new(dim);
        for p in points {
            ans.insert(*p);
        }
        ans
    }

    /// 掩膜尺寸.
    #[inline]
    pub fn dim(&self) -> Idx3d {
        self.data.dim()
    }

    /// 将 `p` 设置为前景. 越界时忽略.
    #[inline]
    pub fn insert(&mut self, (x, y, z): Idx3dI16) {
        let (Ok(x), Ok(y), Ok(z)) = (usize::try_from(x), usize::try_from(y), usize::try_from(z))
        else {
            return;
        };
        if let Some(v) = self.data.get_mut((x, y, z)) {
            *v = 1;
        }
    }

    /// `pos` 是否为前景. 越界时返回 `false`.
    #[inline]
    pub fn get(&self, pos: Idx3d) -> bool {
        self.data.get(pos).is_some_and(|&v| v != 0)
    }

    /// 前景体素个数.
    #[inline]
    pub fn count(&self) -> usize {
        self.data.iter().filter(|v| **v != 0).count()
    }

    /// 按 x, y, z 升序收集所有前景体素.
    pub fn to_points(&self) -> Vec<Idx3dI16> {
        self.data
            .indexed_iter()
            .filter(|(_, v)| **v != 0)
            .map(|((x, y, z), _)| (x as i16, y as i16, z as i16))
            .collect()
    }

    /// 钻石型 (6-邻域) 膨胀一次.
    pub fn dilate(&mut self) {
        let mut out = self.data.clone();
        for (pos, _) in self.data.indexed_iter().filter(|(_, v)| **v != 0) {
            for neigh in self.diamond_neighbours(pos) {
                out[neigh] = 1;
            }
        }
        self.data = out;
    }

    /// 以半径 `radius` (体素) 的球形结构元膨胀一次.
    ///
    /// 球内偏移定义为 `dx^2 + dy^2 + dz^2 <= radius^2`.
    ///
    /// 球足以覆盖整个网格时, 非空掩膜直接被填满.
    pub fn dilate_ball(&mut self, radius: u32) {
        let (w, h, d) = self.dim();
        if covers_grid(radius, (w, h, d)) {
            if self.data.iter().any(|v| *v != 0) {
                self.data.fill(1);
            }
            return;
        }
        let offsets = ball_offsets(radius);
        let mut out = self.data.clone();
        for ((x, y, z), _) in self.data.indexed_iter().filter(|(_, v)| **v != 0) {
            for &(dx, dy, dz) in offsets.iter() {
                let (Some(nx), Some(ny), Some(nz)) = (
                    x.checked_add_signed(dx),
                    y.checked_add_signed(dy),
                    z.checked_add_signed(dz),
                ) else {
                    continue;
                };
                if nx < w && ny < h && nz < d {
                    out[(nx, ny, nz)] = 1;
                }
            }
        }
        self.data = out;
    }

    /// 平滑一次.
    ///
    /// 对每个体素统计其 26-邻域 (越界视为背景) 内的前景个数:
    /// 多于一半则置为前景, 少于一半则置为背景, 恰好一半时保持不变.
    pub fn smooth(&mut self) {
        let src = &self.data;
        let mut out = src.clone();
        let op = |pos: Idx3d, v: &mut u8| {
            let cnt = self.count_neighbours26(pos);
            if cnt > SMOOTH_HALF {
                *v = 1;
            } else if cnt < SMOOTH_HALF {
                *v = 0;
            }
        };
        cfg_if::cfg_if! {
            if #[cfg(feature = "rayon")] {
                Zip::indexed(&mut out).par_for_each(op);
            } else {
                Zip::indexed(&mut out).for_each(op);
            }
        }
        self.data = out;
    }

    /// 只保留满足 `keep` 的前景体素.
    ///
    /// 在 `rayon` 打开时按 x 方向切片并行执行.
    pub fn retain<F>(&mut self, keep: F)
    where
        F: Fn(Idx3d) -> bool + Sync + Send,
    {
        let sweep = |x: usize, mut slab: ndarray::ArrayViewMut2<u8>| {
            for ((y, z), v) in slab.indexed_iter_mut() {
                if *v != 0 && !keep((x, y, z)) {
                    *v = 0;
                }
            }
        };
        cfg_if::cfg_if! {
            if #[cfg(feature = "rayon")] {
                self.data
                    .axis_iter_mut(Axis(0))
                    .into_par_iter()
                    .enumerate()
                    .for_each(|(x, slab)| sweep(x, slab));
            } else {
                self.data
                    .axis_iter_mut(Axis(0))
                    .enumerate()
                    .for_each(|(x, slab)| sweep(x, slab));
            }
        }
    }

    /// 获取 `pos` 前后上下左右六个点的坐标.
    ///
    /// 在数据范围外的坐标会被过滤掉, 不会包含在返回值中.
    fn diamond_neighbours(&self, (x, y, z): Idx3d) -> Vec<Idx3d> {
        self.check_collect([
            (x.wrapping_sub(1), y, z),
            (x.saturating_add(1), y, z),
            (x, y.wrapping_sub(1), z),
            (x, y.saturating_add(1), z),
            (x, y, z.wrapping_sub(1)),
            (x, y, z.saturating_add(1)),
        ])
    }

    /// 统计 `pos` 的 26-邻域 (不含自身) 中的前景个数.
    fn count_neighbours26(&self, (x, y, z): Idx3d) -> usize {
        iproduct!(-1isize..=1, -1isize..=1, -1isize..=1)
            .filter(|&d| d != (0, 0, 0))
            .filter_map(|(dx, dy, dz)| {
                Some((
                    x.checked_add_signed(dx)?,
                    y.checked_add_signed(dy)?,
                    z.checked_add_signed(dz)?,
                ))
            })
            .filter(|p| self.get(*p))
            .count()
    }

    /// 收集 `data` 中不越界的索引.
    #[inline]
    fn check_collect<B: FromIterator<Idx3d>, const N: usize>(&self, data: [Idx3d; N]) -> B {
        let (w, h, d) = self.dim();
        data.into_iter()
            .filter(|&(x, y, z)| x < w && y < h && z < d)
            .collect()
    }
}

/// 半径为 `radius` 的球是否覆盖 `dim` 网格内任意两点间的偏移.
fn covers_grid(radius: u32, (w, h, d): Idx3d) -> bool {
    let span = |n: usize| n.saturating_sub(1) as u128;
    let r = u128::from(radius);
    r * r >= span(w) * span(w) + span(h) * span(h) + span(d) * span(d)
}

/// 半径为 `radius` 的球内所有整数偏移.
fn ball_offsets(radius: u32) -> Vec<(isize, isize, isize)> {
    let r = radius as isize;
    iproduct!(-r..=r, -r..=r, -r..=r)
        .filter(|&(dx, dy, dz)| dx * dx + dy * dy + dz * dz <= r * r)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{ball_offsets, VoxelMask};

    #[test]
    fn test_points_round_trip_order() {
        let m = VoxelMask::from_points((4, 4, 4), &[(3, 0, 1), (0, 2, 2), (0, 2, 1), (9, 0, 0)]);
        assert_eq!(m.count(), 3);
        assert_eq!(m.to_points(), vec![(0, 2, 1), (0, 2, 2), (3, 0, 1)]);
    }

    #[test]
    fn test_dilate() {
        let mut m = VoxelMask::from_points((5, 5, 5), &[(2, 2, 2)]);
        m.dilate();
        assert_eq!(m.count(), 7);
        assert!(m.get((1, 2, 2)) && m.get((2, 2, 3)));
        assert!(!m.get((1, 1, 2)));

        // 角点膨胀时邻居被越界过滤.
        let mut c = VoxelMask::from_points((5, 5, 5), &[(0, 0, 0)]);
        c.dilate();
        assert_eq!(c.count(), 4);
    }

    #[test]
    fn test_dilate_ball() {
        assert_eq!(ball_offsets(0).len(), 1);
        assert_eq!(ball_offsets(1).len(), 7);
        // 半径 2: 1 + 6 + 12 + 8 + 6 = 33.
        assert_eq!(ball_offsets(2).len(), 33);

        let mut m = VoxelMask::from_points((9, 9, 9), &[(4, 4, 4)]);
        m.dilate_ball(2);
        assert_eq!(m.count(), 33);
        assert!(m.get((6, 4, 4)));
        assert!(m.get((5, 5, 5)));
        assert!(!m.get((6, 5, 4)));
    }

    #[test]
    fn test_dilate_ball_covering_grid() {
        let mut m = VoxelMask::from_points((5, 6, 7), &[(0, 0, 0)]);
        m.dilate_ball(u32::MAX);
        assert_eq!(m.count(), 5 * 6 * 7);

        // 半径恰好等于对角线长度: 4^2 + 5^2 + 6^2 = 77 <= 9^2.
        let mut m = VoxelMask::from_points((5, 6, 7), &[(4, 5, 6)]);
        m.dilate_ball(9);
        assert!(m.get((0, 0, 0)));

        let mut empty = VoxelMask::new((5, 6, 7));
        empty.dilate_ball(u32::MAX);
        assert_eq!(empty.count(), 0);
    }

    #[test]
    fn test_smooth() {
        // 孤立点被平滑掉.
        let mut m = VoxelMask::from_points((5, 5, 5), &[(2, 2, 2)]);
        m.smooth();
        assert_eq!(m.count(), 0);

        // 实心块内部的空洞被填上.
        let mut pts = Vec::new();
        for x in 0..5i16 {
            for y in 0..5i16 {
                for z in 0..5i16 {
                    if (x, y, z) != (2, 2, 2) {
                        pts.push((x, y, z));
                    }
                }
            }
        }
        let mut m = VoxelMask::from_points((5, 5, 5), &pts);
        m.smooth();
        assert!(m.get((2, 2, 2)));
    }

    #[test]
    fn test_retain() {
        let mut m = VoxelMask::from_points((6, 2, 2), &[(0, 0, 0), (2, 1, 1), (5, 1, 0)]);
        m.retain(|(x, _, _)| x >= 2);
        assert_eq!(m.to_points(), vec![(2, 1, 1), (5, 1, 0)]);
    }
}
