//! 纤维束图谱与最近纤维束匹配.

use itertools::Itertools;

use crate::consts::MIN_TRACT_FLOATS;
use crate::distance::{quickly_exceeds, symmetric_distance};
use crate::roi::round_voxel;
use crate::{par, ConfigError, ConfigResult, Idx3d, Idx3dI16, VoxelMask};

mod registration;

pub use registration::{AffineRegistration, Registration};

/// 在图谱 `tracts` / `clusters` 中寻找与流线 `trk` 最近的纤维束, 返回其簇标签.
///
/// 距离为对称 L1 Hausdorff 距离 (见 [`crate::distance`]). 只有距离严格小于
/// `tolerance` 的图谱流线才算匹配; 若没有任何匹配, 或 `trk` 不足 3 个点,
/// 则返回 `None`. 不足 3 个点的图谱流线被跳过. 距离相同时取下标较小者.
///
/// 扫描过程中以当前最优距离作为上限, 越往后剪枝越狠,
/// 但剪枝不会丢掉真正的最近者.
///
/// # 注意
///
/// `tracts` 与 `clusters` 应当等长, 否则多出的部分被忽略.
pub fn find_nearest<T: AsRef<[f32]>>(
    trk: &[f32],
    tracts: &[T],
    clusters: &[u32],
    tolerance: f32,
) -> Option<u32> {
    if trk.len() <= MIN_TRACT_FLOATS {
        return None;
    }
    let mut best_distance = tolerance;
    let mut best_cluster = None;
    for (tract, &cluster) in tracts.iter().zip(clusters) {
        let tract = tract.as_ref();
        if tract.len() <= MIN_TRACT_FLOATS || quickly_exceeds(tract, trk, best_distance) {
            continue;
        }
        let d = symmetric_distance(trk, tract, best_distance);
        if d < best_distance {
            best_distance = d;
            best_cluster = Some(cluster);
        }
    }
    best_cluster
}

/// 纤维束名称后缀所指示的半球.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Hemisphere {
    /// `_L`.
    Left,

    /// `_R`.
    Right,
}

impl Hemisphere {
    /// 根据纤维束名称后缀判定. 无后缀时返回 `None`.
    pub fn from_track_name(name: &str) -> Option<Self> {
        if name.ends_with("_L") {
            Some(Self::Left)
        } else if name.ends_with("_R") {
            Some(Self::Right)
        } else {
            None
        }
    }

    /// 模板体素 x 坐标 `x` 是否位于本半球. `width` 为模板 x 方向体素数.
    ///
    /// 模板按 LPS 排列, 即 x 增大指向左侧. 中线上的体素同时属于两侧.
    #[inline]
    pub fn contains(&self, x: f32, width: usize) -> bool {
        let mid = (width as f32 - 1.0) * 0.5;
        match self {
            Self::Left => x >= mid,
            Self::Right => x <= mid,
        }
    }
}

/// 已变换到 subject 体素空间的纤维束图谱.
///
/// 每条参考流线带一个簇标签, 簇标签同时是纤维束名称表的下标.
#[derive(Clone, Debug)]
pub struct TractAtlas {
    tracts: Vec<Vec<f32>>,
    clusters: Vec<u32>,
    names: Vec<String>,
}

impl TractAtlas {
    /// 构建图谱并检查一致性.
    ///
    /// # 返回值
    ///
    /// - 没有流线时返回 `Err(ConfigError::EmptyAtlas)`;
    /// - 流线条数与簇标签个数不同时返回 `Err(ConfigError::ClusterMismatch)`;
    /// - 某条流线长度不是 3 的倍数时返回 `Err(ConfigError::MalformedTract)`;
    /// - 某个簇标签没有对应名称时返回 `Err(ConfigError::UnknownCluster)`.
    pub fn new(tracts: Vec<Vec<f32>>, clusters: Vec<u32>, names: Vec<String>) -> ConfigResult<Self> {
        if tracts.is_empty() {
            return Err(ConfigError::EmptyAtlas);
        }
        if tracts.len() != clusters.len() {
            return Err(ConfigError::ClusterMismatch {
                tracts: tracts.len(),
                clusters: clusters.len(),
            });
        }
        if let Some(index) = tracts.iter().position(|t| t.len() % 3 != 0) {
            return Err(ConfigError::MalformedTract(index));
        }
        if let Some((index, &label)) = clusters
            .iter()
            .find_position(|&&c| c as usize >= names.len())
        {
            return Err(ConfigError::UnknownCluster { index, label });
        }
        Ok(Self {
            tracts,
            clusters,
            names,
        })
    }

    /// 参考流线条数.
    #[inline]
    pub fn len(&self) -> usize {
        self.tracts.len()
    }

    /// 是否没有参考流线. 经 [`Self::new`] 构建的图谱总是返回 `false`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tracts.is_empty()
    }

    /// 参考流线.
    #[inline]
    pub fn tracts(&self) -> &[Vec<f32>] {
        &self.tracts
    }

    /// 每条参考流线的簇标签.
    #[inline]
    pub fn clusters(&self) -> &[u32] {
        &self.clusters
    }

    /// 纤维束名称表.
    #[inline]
    pub fn tract_names(&self) -> &[String] {
        &self.names
    }

    /// 按名称查找纤维束编号.
    pub fn track_id(&self, name: &str) -> Option<u32> {
        self.names.iter().position(|n| n == name).map(|i| i as u32)
    }

    /// 纤维束名称. 越界时返回 `None`.
    #[inline]
    pub fn track_name(&self, track_id: u32) -> Option<&str> {
        self.names.get(track_id as usize).map(String::as_str)
    }

    /// 簇 `cluster` 的所有流线点落在 `dim` 网格上的体素 (去重, 按 x, y, z 升序).
    pub fn footprint(&self, cluster: u32, dim: Idx3d) -> Vec<Idx3dI16> {
        let mut mask = VoxelMask::new(dim);
        for (tract, _) in self.entries().filter(|(_, c)| *c == cluster) {
            for p in tract.iter().copied().tuples() {
                if let Some(v) = round_voxel(p) {
                    mask.insert(v);
                }
            }
        }
        mask.to_points()
    }

    /// 构建匹配 `track_id` 用的缩减图谱.
    ///
    /// 保留簇标签为 `track_id` 的所有流线, 以及与其中至少一条的距离小于 `radius`
    /// 的其他流线 (这些流线在最近簇判定中可能与目标竞争, 不能丢掉).
    /// 结果保持原图谱顺序.
    pub fn candidates(&self, track_id: u32, radius: f32) -> CandidateAtlas {
        let targets: Vec<&[f32]> = self
            .entries()
            .filter(|(t, c)| *c == track_id && t.len() > MIN_TRACT_FLOATS)
            .map(|(t, _)| t)
            .collect();

        let keep = par::filter_indices(self.len(), |i| {
            if self.clusters[i] == track_id {
                return true;
            }
            let t = self.tracts[i].as_slice();
            t.len() > MIN_TRACT_FLOATS
                && targets.iter().any(|r| {
                    !quickly_exceeds(r, t, radius) && symmetric_distance(t, r, radius) < radius
                })
        });

        CandidateAtlas {
            tracts: keep.iter().map(|&i| self.tracts[i].clone()).collect(),
            clusters: keep.iter().map(|&i| self.clusters[i]).collect(),
        }
    }

    /// `(流线, 簇标签)` 迭代器.
    #[inline]
    fn entries(&self) -> impl Iterator<Item = (&[f32], u32)> {
        self.tracts
            .iter()
            .map(Vec::as_slice)
            .zip(self.clusters.iter().copied())
    }
}

/// 缩减后的候选图谱. 只读, 可在多线程间共享.
#[derive(Clone, Debug, Default)]
pub struct CandidateAtlas {
    tracts: Vec<Vec<f32>>,
    clusters: Vec<u32>,
}

impl CandidateAtlas {
    /// 候选流线条数.
    #[inline]
    pub fn len(&self) -> usize {
        self.tracts.len()
    }

    /// 是否没有候选流线.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tracts.is_empty()
    }

    /// 候选流线.
    #[inline]
    pub fn tracts(&self) -> &[Vec<f32>] {
        &self.tracts
    }

    /// 候选流线的簇标签.
    #[inline]
    pub fn clusters(&self) -> &[u32] {
        &self.clusters
    }

    /// 在候选图谱中寻找最近纤维束. 见 [`find_nearest`].
    #[inline]
    pub fn find_nearest(&self, trk: &[f32], tolerance: f32) -> Option<u32> {
        find_nearest(trk, &self.tracts, &self.clusters, tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_x(n: usize, shift: [f32; 3]) -> Vec<f32> {
        (0..n)
            .flat_map(|i| [i as f32 + shift[0], shift[1], shift[2]])
            .collect()
    }

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("tract_{i}")).collect()
    }

    /// 三个簇: 0 在 y = 0, 1 在 y = 3, 2 在 y = 20.
    fn toy_atlas() -> TractAtlas {
        TractAtlas::new(
            vec![
                line_x(10, [0.0, 0.0, 5.0]),
                line_x(10, [0.0, 3.0, 5.0]),
                line_x(10, [0.0, 20.0, 5.0]),
                line_x(10, [0.0, 0.5, 5.0]),
                vec![0.0, 1.0, 5.0, 1.0, 1.0, 5.0],
            ],
            vec![0, 1, 2, 0, 1],
            names(3),
        )
        .unwrap()
    }

    #[test]
    fn test_new_validation() {
        assert_eq!(
            TractAtlas::new(vec![], vec![], names(1)).unwrap_err(),
            ConfigError::EmptyAtlas
        );
        assert_eq!(
            TractAtlas::new(vec![line_x(3, [0.0; 3])], vec![0, 0], names(1)).unwrap_err(),
            ConfigError::ClusterMismatch {
                tracts: 1,
                clusters: 2
            }
        );
        assert_eq!(
            TractAtlas::new(vec![line_x(3, [0.0; 3]), vec![1.0; 4]], vec![0, 0], names(1))
                .unwrap_err(),
            ConfigError::MalformedTract(1)
        );
        assert_eq!(
            TractAtlas::new(vec![line_x(3, [0.0; 3])], vec![1], names(1)).unwrap_err(),
            ConfigError::UnknownCluster { index: 0, label: 1 }
        );
    }

    #[test]
    fn test_find_nearest_picks_minimum() {
        let atlas = toy_atlas();
        let (t, c) = (atlas.tracts(), atlas.clusters());

        // y = 1.0: 到簇 0 (y = 0.5) 距离 0.5, 到簇 1 距离 2.
        assert_eq!(find_nearest(&line_x(10, [0.0, 1.0, 5.0]), t, c, 4.0), Some(0));
        // y = 2.5: 到簇 1 距离 0.5.
        assert_eq!(find_nearest(&line_x(10, [0.0, 2.5, 5.0]), t, c, 4.0), Some(1));
        // 容差之外.
        assert_eq!(find_nearest(&line_x(10, [0.0, 10.0, 5.0]), t, c, 4.0), None);
        assert_eq!(find_nearest(&line_x(10, [0.0, 1.0, 5.0]), t, c, 0.5), None);
    }

    #[test]
    fn test_find_nearest_identity_and_zero_tolerance() {
        let atlas = toy_atlas();
        let trk = atlas.tracts()[2].clone();
        assert_eq!(
            find_nearest(&trk, atlas.tracts(), atlas.clusters(), 1.0),
            Some(2)
        );
        assert_eq!(
            find_nearest(&trk, atlas.tracts(), atlas.clusters(), 0.0),
            None
        );
    }

    #[test]
    fn test_find_nearest_short_tracts() {
        let atlas = toy_atlas();
        let short = vec![0.0, 1.0, 5.0, 1.0, 1.0, 5.0];
        assert_eq!(
            find_nearest(&short, atlas.tracts(), atlas.clusters(), 100.0),
            None
        );
        // 图谱中的短流线 (下标 4, 与候选流线几乎重合) 被跳过.
        let trk = vec![0.0, 1.0, 5.0, 1.0, 1.0, 5.0, 2.0, 1.0, 5.0];
        let (t, c) = (&atlas.tracts()[4..], &atlas.clusters()[4..]);
        assert_eq!(find_nearest(&trk, t, c, 100.0), None);
    }

    #[test]
    fn test_find_nearest_tie_keeps_first() {
        let a = line_x(6, [0.0, 1.0, 0.0]);
        let b = line_x(6, [0.0, -1.0, 0.0]);
        let trk = line_x(6, [0.0; 3]);
        assert_eq!(find_nearest(&trk, &[&a, &b], &[7, 8], 5.0), Some(7));
        assert_eq!(find_nearest(&trk, &[&b, &a], &[8, 7], 5.0), Some(8));
    }

    #[test]
    fn test_find_nearest_matches_brute_force() {
        let tracts: Vec<Vec<f32>> = (0..30)
            .map(|k| {
                let k = k as f32;
                line_x(9, [0.0, (k * 1.7) % 6.0, (k * 0.9) % 4.0])
            })
            .collect();
        let clusters: Vec<u32> = (0..30).collect();
        let trk = line_x(9, [0.0, 2.0, 1.5]);
        let tol = 6.0;

        let brute = tracts
            .iter()
            .zip(clusters.iter())
            .map(|(t, &c)| (symmetric_distance(&trk, t, f32::INFINITY), c))
            .filter(|(d, _)| *d < tol)
            .fold(None::<(f32, u32)>, |best, (d, c)| match best {
                Some((bd, _)) if bd <= d => best,
                _ => Some((d, c)),
            })
            .map(|(_, c)| c);
        assert!(brute.is_some());
        assert_eq!(find_nearest(&trk, &tracts, &clusters, tol), brute);
    }

    #[test]
    fn test_find_nearest_uneven_sampling() {
        let sparse = vec![0.0, 0.0, 0.0, 5.0, 0.0, 0.0, 10.0, 0.0, 0.0];
        let dense = vec![
            0.0, 0.0, 0.0, 0.1, 0.0, 0.0, 0.2, 0.0, 0.0, 0.3, 0.0, 0.0, 5.0, 0.0, 0.0, 10.0, 0.0,
            0.0,
        ];
        assert_eq!(find_nearest(&dense, &[&sparse], &[4], 1.0), Some(4));
        assert_eq!(find_nearest(&sparse, &[&dense], &[4], 1.0), Some(4));

        // 采样不均的竞争者也要留在候选图谱里.
        let atlas = TractAtlas::new(
            vec![sparse.clone(), line_x(11, [0.0, 8.0, 0.0]), dense.clone()],
            vec![0, 0, 1],
            names(2),
        )
        .unwrap();
        assert_eq!(atlas.candidates(0, 1.0).clusters(), &[0, 0, 1]);
    }

    #[test]
    fn test_footprint() {
        let atlas = toy_atlas();
        let fp = atlas.footprint(1, (12, 12, 12));
        // 簇 1: y = 3 的直线 (10 个点) + 下标 4 的两点短流线 (y = 1).
        assert_eq!(fp.len(), 12);
        assert!(fp.contains(&(9, 3, 5)));
        assert!(fp.contains(&(1, 1, 5)));
        // y = 20 的簇 2 完全越界.
        assert!(atlas.footprint(2, (12, 12, 12)).is_empty());
    }

    #[test]
    fn test_candidates() {
        let atlas = toy_atlas();
        // 目标簇 0 (y = 0 和 y = 0.5). 簇 1 的长流线距离 2.5..3, 簇 2 距离 >= 19.5.
        let c = atlas.candidates(0, 4.0);
        assert_eq!(c.clusters(), &[0, 1, 0]);
        assert_eq!(c.tracts()[1], atlas.tracts()[1]);

        let c = atlas.candidates(0, 2.0);
        assert_eq!(c.clusters(), &[0, 0]);

        let c = atlas.candidates(2, 4.0);
        assert_eq!(c.clusters(), &[2]);
        assert_eq!(
            c.find_nearest(&line_x(10, [0.0, 20.0, 5.0]), 1.0),
            Some(2)
        );
    }

    #[test]
    fn test_track_lookup_and_hemisphere() {
        let atlas = TractAtlas::new(
            vec![line_x(3, [0.0; 3])],
            vec![1],
            vec!["Corpus_Callosum".into(), "Arcuate_Fasciculus_L".into()],
        )
        .unwrap();
        assert_eq!(atlas.track_id("Arcuate_Fasciculus_L"), Some(1));
        assert_eq!(atlas.track_id("nope"), None);
        assert_eq!(atlas.track_name(1), Some("Arcuate_Fasciculus_L"));
        assert_eq!(atlas.track_name(2), None);

        assert_eq!(Hemisphere::from_track_name("Arcuate_Fasciculus_L"), Some(Hemisphere::Left));
        assert_eq!(Hemisphere::from_track_name("Cingulum_R"), Some(Hemisphere::Right));
        assert_eq!(Hemisphere::from_track_name("Corpus_Callosum"), None);

        assert!(Hemisphere::Left.contains(60.0, 101));
        assert!(Hemisphere::Left.contains(50.0, 101));
        assert!(!Hemisphere::Left.contains(40.0, 101));
        assert!(Hemisphere::Right.contains(40.0, 101));
        assert!(!Hemisphere::Right.contains(60.0, 101));
    }
}
