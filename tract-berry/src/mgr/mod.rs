//! 区域管理器 `RoiMgr`.
//!
//! 分两个阶段使用:
//!
//! 1. 配置阶段 (`&mut self`): 添加各类区域, 可选地配置图谱匹配.
//!   任何一步失败时, 管理器保持调用前的状态不变.
//! 2. 查询阶段 (`&self`): 追踪器在多个工作线程中并发调用各判定函数.
//!   查询不加锁, 不修改任何状态, 也不会失败.
//!
//! 尚未配置任何区域时, 所有判定都是宽松的 (不排除, 不限制, 端点和 ROI 条件都满足).

use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ordered_float::NotNan;

use crate::atlas::{CandidateAtlas, Hemisphere, Registration, TractAtlas};
use crate::config::AtlasMatchConfig;
use crate::{Affine, ConfigError, ConfigResult, Idx3d, Idx3dF, Idx3dI16, Roi, Subject, VoxelMask};

mod role;
mod seed;

use role::{LIMITING_SLOT, REGION_SLOTS};
pub use role::RegionRole;
pub use seed::{Seed, SeedSpace};

/// 自动生成的 limiting 区域在报告中的名称.
const TOLERANCE_REGION_NAME: &str = "track tolerance region";

/// [`RoiMgr::set_whole_brain_seed`] 生成的 seed 区域名称.
const WHOLE_BRAIN_NAME: &str = "whole brain";

/// 已配置的图谱匹配.
#[derive(Clone, Debug)]
pub struct AtlasMatch {
    track_id: u32,
    tolerance: f32,
    candidates: CandidateAtlas,
    /// 自动生成的 limiting 区域在 limiting 槽位中的下标.
    limit_index: usize,
}

impl AtlasMatch {
    /// 目标纤维束编号.
    #[inline]
    pub fn track_id(&self) -> u32 {
        self.track_id
    }

    /// subject 体素单位下的容差距离.
    #[inline]
    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    /// 缩减后的候选图谱.
    #[inline]
    pub fn candidates(&self) -> &CandidateAtlas {
        &self.candidates
    }

    /// 流线 `track` 的最近纤维束是否为目标纤维束.
    #[inline]
    fn accepts(&self, track: &[f32]) -> bool {
        self.candidates.find_nearest(track, self.tolerance) == Some(self.track_id)
    }
}

/// 一次区域添加在提交之前的中间结果. 构造它可能失败, 提交它不会.
enum Placement {
    Seed {
        space: u16,
        new_space: Option<SeedSpace>,
    },
    Region(usize, Roi),
}

/// 追踪区域管理器.
///
/// # 注意
///
/// 配置完成之后才能开始并发查询. 查询阶段只需要 `&RoiMgr`,
/// 可以直接在多个线程之间共享.
#[derive(Clone, Debug)]
pub struct RoiMgr {
    subject: Arc<Subject>,
    config: AtlasMatchConfig,
    cancel: Option<Arc<AtomicBool>>,
    report: String,
    regions: [Vec<Roi>; REGION_SLOTS],
    seeds: Vec<Seed>,
    seed_spaces: Vec<SeedSpace>,
    atlas_match: Option<AtlasMatch>,
}

impl RoiMgr {
    /// 为 `subject` 创建空的管理器. 图谱匹配参数使用 [`AtlasMatchConfig::from_env`].
    pub fn new(subject: Arc<Subject>) -> Self {
        Self {
            subject,
            config: AtlasMatchConfig::from_env(),
            cancel: None,
            report: String::new(),
            regions: Default::default(),
            seeds: Vec::new(),
            seed_spaces: Vec::new(),
            atlas_match: None,
        }
    }

    /// 替换图谱匹配参数.
    pub fn with_config(mut self, config: AtlasMatchConfig) -> Self {
        self.config = config;
        self
    }

    /// 设置取消标志. 标志被置位后, 正在进行的 [`Self::configure_atlas_match`]
    /// 会在下一个步骤间隙返回 `Err(ConfigError::Cancelled)`.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// subject 网格尺寸.
    #[inline]
    pub fn dim(&self) -> Idx3d {
        self.subject.dim()
    }

    /// 当前 subject.
    #[inline]
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// 图谱匹配参数.
    #[inline]
    pub fn config(&self) -> &AtlasMatchConfig {
        &self.config
    }

    /// 供溯源记录使用的报告. 只追加, 不应被解析.
    #[inline]
    pub fn report(&self) -> &str {
        &self.report
    }

    /// 所有 seed, 按添加顺序.
    #[inline]
    pub fn seeds(&self) -> &[Seed] {
        &self.seeds
    }

    /// seed 坐标空间列表 (已去重).
    #[inline]
    pub fn seed_spaces(&self) -> &[SeedSpace] {
        &self.seed_spaces
    }

    /// 第 `index` 个 seed 在 subject 空间中的起始位置. 越界时返回 `None`.
    pub fn seed_position(&self, index: usize) -> Option<Idx3dF> {
        let seed = self.seeds.get(index)?;
        let space = self.seed_spaces.get(seed.space as usize)?;
        Some(space.to_subject_point(seed.pos))
    }

    /// 角色为 `role` 的所有区域. seed 不以 [`Roi`] 存储, 总是返回空切片.
    pub fn regions(&self, role: RegionRole) -> &[Roi] {
        match role.slot() {
            Some(i) => self.regions[i].as_slice(),
            None => &[],
        }
    }

    /// 图谱匹配配置. 未配置时返回 `None`.
    #[inline]
    pub fn atlas_match(&self) -> Option<&AtlasMatch> {
        self.atlas_match.as_ref()
    }

    /// 添加一个区域.
    ///
    /// `points` 是 `source_dim` 网格上的体素坐标, `source_to_subject` 把该网格变换到
    /// subject 网格. 两者之一与 subject 不同时, 查询点会先经逆变换回到源网格再判定.
    ///
    /// seed 区域不建立体素集合, 每个点记录为一个 [`Seed`], 其坐标空间被去重后
    /// 记录在 [`Self::seed_spaces`] 中.
    ///
    /// # 返回值
    ///
    /// - 需要变换但 `source_to_subject` 不可逆时返回 `Err(ConfigError::SingularTransform)`;
    /// - seed 坐标空间超过 `u16` 可索引的个数时返回 `Err(ConfigError::TooManySeedSpaces)`.
    pub fn add_region(
        &mut self,
        points: &[Idx3dI16],
        role: RegionRole,
        source_dim: Idx3d,
        source_to_subject: &Affine,
        name: &str,
    ) -> ConfigResult<()> {
        let placement = self.prepare(points, role, source_dim, source_to_subject)?;
        self.commit(placement, points, role, name);
        Ok(())
    }

    /// 添加一个直接定义在 subject 网格上的区域.
    pub fn add_subject_region(
        &mut self,
        points: &[Idx3dI16],
        role: RegionRole,
        name: &str,
    ) -> ConfigResult<()> {
        self.add_region(points, role, self.dim(), &Affine::identity(), name)
    }

    /// 将各向异性值大于 `threshold` 的所有体素设为 seed.
    pub fn set_whole_brain_seed(&mut self, threshold: f32) -> ConfigResult<()> {
        let points = self.subject.voxels_above(threshold);
        self.add_subject_region(&points, RegionRole::Seed, WHOLE_BRAIN_NAME)
    }

    /// 配置图谱匹配: 只接受最近纤维束为 `track_id` 的流线.
    ///
    /// 依次完成:
    ///
    /// 1. 将模板空间的毫米容差 `tolerance_mm` 换算为 subject 体素;
    /// 2. 若尚未配置 seed, 由目标纤维束的体素足迹膨胀, 平滑得到 seed 区域;
    /// 3. 以足迹的球形膨胀作为 limiting 区域. 名称带 `_L` / `_R` 后缀的纤维束
    ///    还会被限制在对应的模板半球内;
    /// 4. 构建缩减的候选图谱.
    ///
    /// 所有结果都在最后一次性提交. 失败 (包括被取消) 时管理器保持原状.
    /// 再次配置时, 上一次自动生成的 limiting 区域被新的替换, 用户添加的区域不受影响.
    ///
    /// # 返回值
    ///
    /// - `tolerance_mm` 为 NaN, 无穷或负数时返回 `Err(ConfigError::InvalidTolerance)`;
    /// - `track_id` 越界时返回 `Err(ConfigError::InvalidTrackId)`;
    /// - 配准不可用时返回 `Err(ConfigError::RegistrationUnavailable)`;
    /// - 目标纤维束不在 subject 网格内时返回 `Err(ConfigError::EmptyTrack)`;
    /// - 被取消时返回 `Err(ConfigError::Cancelled)`.
    pub fn configure_atlas_match<R>(
        &mut self,
        track_id: u32,
        tolerance_mm: f32,
        atlas: &TractAtlas,
        registration: &R,
    ) -> ConfigResult<()>
    where
        R: Registration + Sync + ?Sized,
    {
        let tolerance_mm = NotNan::new(tolerance_mm)
            .ok()
            .filter(|t| t.is_finite() && **t >= 0.0)
            .ok_or(ConfigError::InvalidTolerance(tolerance_mm))?;
        if atlas.is_empty() {
            return Err(ConfigError::EmptyAtlas);
        }
        let name = atlas
            .track_name(track_id)
            .ok_or(ConfigError::InvalidTrackId(track_id, atlas.tract_names().len()))?;

        let jacobian = registration
            .jacobian()
            .ok_or(ConfigError::RegistrationUnavailable)?;
        let template_vs = registration.template_voxel_size()[0];
        if !(template_vs.is_finite() && template_vs > 0.0) {
            return Err(ConfigError::RegistrationUnavailable);
        }
        let tolerance = tolerance_mm.into_inner() / template_vs / jacobian;
        log::info!("convert tolerance distance of {tolerance_mm} mm to {tolerance} subject voxels");

        let dim = self.dim();
        let footprint = atlas.footprint(track_id, dim);
        if footprint.is_empty() {
            return Err(ConfigError::EmptyTrack(track_id));
        }
        log::debug!("{name} covers {} subject voxels", footprint.len());

        let seed = if self.seeds.is_empty() {
            let mut mask = VoxelMask::from_points(dim, &footprint);
            for _ in 0..self.config.seed_dilation {
                mask.dilate();
            }
            for _ in 0..self.config.seed_smoothing {
                mask.smooth();
            }
            let points = mask.to_points();
            let placement = self.prepare(&points, RegionRole::Seed, dim, &Affine::identity())?;
            Some((points, placement))
        } else {
            None
        };
        self.check_cancelled()?;

        let mut limit = VoxelMask::from_points(dim, &footprint);
        limit.dilate_ball(limit_radius(tolerance, self.config.limit_margin, dim));
        if let Some(side) = Hemisphere::from_track_name(name) {
            let width = registration.template_dim().0;
            limit.retain(|(x, y, z)| {
                registration
                    .to_template((x as f32, y as f32, z as f32))
                    .is_some_and(|(tx, _, _)| side.contains(tx, width))
            });
        }
        let limit_points = limit.to_points();
        let limit_placement =
            self.prepare(&limit_points, RegionRole::Limiting, dim, &Affine::identity())?;
        self.check_cancelled()?;

        let candidates = atlas.candidates(track_id, tolerance * self.config.candidate_factor);
        log::info!(
            "candidate atlas keeps {} of {} tracts for {name}",
            candidates.len(),
            atlas.len()
        );
        self.check_cancelled()?;

        let _ = write!(
            self.report,
            " The anatomy prior of a tractography atlas (Yeh et al., Neuroimage 178, 57-68, 2018) \
             was used to map {name}  with a distance tolerance of {tolerance_mm} (mm) in the ICBM152 space."
        );
        if let Some((points, placement)) = seed {
            self.commit(placement, &points, RegionRole::Seed, name);
        }
        let limit_slot = &mut self.regions[LIMITING_SLOT];
        if let Some(prev) = self.atlas_match.take() {
            if prev.limit_index < limit_slot.len() {
                limit_slot.remove(prev.limit_index);
                log::info!("replace the tolerance region of a previous atlas match");
            }
        }
        let limit_index = limit_slot.len();
        self.commit(
            limit_placement,
            &limit_points,
            RegionRole::Limiting,
            TOLERANCE_REGION_NAME,
        );
        self.atlas_match = Some(AtlasMatch {
            track_id,
            tolerance,
            candidates,
            limit_index,
        });
        Ok(())
    }

    /// 点 `p` 是否落在任一 ROA 中.
    #[inline]
    pub fn is_excluded(&self, p: Idx3dF) -> bool {
        self.any_contains(RegionRole::Exclusion, p)
    }

    /// 点 `p` 是否落在任一 terminate 区域中.
    #[inline]
    pub fn is_terminative(&self, p: Idx3dF) -> bool {
        self.any_contains(RegionRole::Terminate, p)
    }

    /// 没有 limiting 区域, 或 `p` 落在其中之一时返回 `true`.
    #[inline]
    pub fn is_within_limiting(&self, p: Idx3dF) -> bool {
        let limiting = self.regions(RegionRole::Limiting);
        limiting.is_empty() || limiting.iter().any(|r| r.contains(p))
    }

    /// 两个端点 `p1`, `p2` 是否满足 end / no-end 区域的约束.
    ///
    /// - 任一端点落在 no-end 区域中: 不满足;
    /// - 没有 end 区域: 满足;
    /// - 一个 end 区域: 任一端点落在其中即满足;
    /// - 两个 end 区域: 两端点分别落在两个区域中 (两种配对皆可);
    /// - 三个及以上: 按顺序扫描, 每个区域先判 `p1`, 仅当 `p1` 不在其中时才判 `p2`,
    ///   两端点都曾命中即满足.
    ///
    /// # 注意
    ///
    /// 第三种以上的规则不是完整的二分匹配. 例如两个端点同时落在前两个区域中时,
    /// `p2` 永远不会被计数, 结果为不满足.
    pub fn satisfies_endpoints(&self, p1: Idx3dF, p2: Idx3dF) -> bool {
        if self
            .regions(RegionRole::NoEnd)
            .iter()
            .any(|r| r.contains(p1) || r.contains(p2))
        {
            return false;
        }
        let end = self.regions(RegionRole::End);
        match end {
            [] => true,
            [r] => r.contains(p1) || r.contains(p2),
            [r0, r1] => (r0.contains(p1) && r1.contains(p2)) || (r1.contains(p1) && r0.contains(p2)),
            _ => {
                let (mut hit1, mut hit2) = (false, false);
                for r in end {
                    if r.contains(p1) {
                        hit1 = true;
                    } else if r.contains(p2) {
                        hit2 = true;
                    }
                    if hit1 && hit2 {
                        return true;
                    }
                }
                false
            }
        }
    }

    /// 流线 `track` 是否经过所有 ROI, 并且 (若配置了图谱匹配) 被归类为目标纤维束.
    pub fn satisfies_inclusion(&self, track: &[f32]) -> bool {
        self.regions(RegionRole::Inclusion)
            .iter()
            .all(|r| r.any_included(track))
            && self.atlas_match.as_ref().map_or(true, |m| m.accepts(track))
    }

    #[inline]
    fn any_contains(&self, role: RegionRole, p: Idx3dF) -> bool {
        self.regions(role).iter().any(|r| r.contains(p))
    }

    fn check_cancelled(&self) -> ConfigResult<()> {
        match &self.cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(ConfigError::Cancelled),
            _ => Ok(()),
        }
    }

    /// 构造区域, 不修改 `self`.
    fn prepare(
        &self,
        points: &[Idx3dI16],
        role: RegionRole,
        source_dim: Idx3d,
        source_to_subject: &Affine,
    ) -> ConfigResult<Placement> {
        let need_trans = source_dim != self.dim() || !source_to_subject.is_identity();
        let Some(slot) = role.slot() else {
            let space = SeedSpace {
                to_subject: *source_to_subject,
                need_trans,
            };
            return match self.seed_spaces.iter().position(|s| *s == space) {
                Some(i) => Ok(Placement::Seed {
                    space: i as u16,
                    new_space: None,
                }),
                None => Ok(Placement::Seed {
                    space: u16::try_from(self.seed_spaces.len())
                        .map_err(|_| ConfigError::TooManySeedSpaces)?,
                    new_space: Some(space),
                }),
            };
        };

        let mut roi = if need_trans {
            let from_subject = source_to_subject
                .inverse()
                .ok_or(ConfigError::SingularTransform)?;
            Roi::with_transform(source_dim, from_subject)
        } else {
            Roi::new(self.dim())
        };
        roi.extend(points.iter().copied());
        Ok(Placement::Region(slot, roi))
    }

    /// 提交区域并写报告.
    fn commit(&mut self, placement: Placement, points: &[Idx3dI16], role: RegionRole, name: &str) {
        match placement {
            Placement::Seed { space, new_space } => {
                if let Some(s) = new_space {
                    self.seed_spaces.push(s);
                }
                self.seeds
                    .extend(points.iter().map(|&pos| Seed { pos, space }));
            }
            Placement::Region(slot, roi) => self.regions[slot].push(roi),
        }

        self.report.push_str(role.report_prefix());
        self.report.push_str(name);
        match centroid(points) {
            Some((x, y, z)) => {
                let _ = write!(
                    self.report,
                    " ({},{},{}) .",
                    two_digits(x),
                    two_digits(y),
                    two_digits(z)
                );
            }
            None => self.report.push_str(" ."),
        }
        log::info!("{role:?} region \"{name}\" placed with {} voxels", points.len());
    }
}

/// limiting 区域球形膨胀的半径. 超过网格对角线长度的半径截断为该长度.
fn limit_radius(tolerance: f32, margin: u32, (w, h, d): Idx3d) -> u32 {
    let cover = (w as f64).hypot(h as f64).hypot(d as f64).ceil() as u32;
    (tolerance.round() as u32).saturating_add(margin).min(cover)
}

/// 保留两位有效数字, 格式同 C 的 `%.2g`.
fn two_digits(v: f64) -> String {
    if v == 0.0 {
        return "0".to_string();
    }
    if !v.is_finite() {
        return v.to_string();
    }
    let sci = format!("{v:.1e}");
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    if !(-4..2).contains(&exp) {
        let mantissa = trim_zeros(mantissa);
        let sign = if exp < 0 { '-' } else { '+' };
        return format!("{mantissa}e{sign}{:02}", exp.abs());
    }
    let decimals = (1 - exp) as usize;
    trim_zeros(&format!("{v:.decimals$}")).to_string()
}

/// 去掉小数部分末尾的 0 以及多余的小数点.
fn trim_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// 点集的几何中心. 空集返回 `None`.
fn centroid(points: &[Idx3dI16]) -> Option<(f64, f64, f64)> {
    if points.is_empty() {
        return None;
    }
    let (sx, sy, sz) = points.iter().fold((0.0, 0.0, 0.0), |(sx, sy, sz), &(x, y, z)| {
        (sx + f64::from(x), sy + f64::from(y), sz + f64::from(z))
    });
    let n = points.len() as f64;
    Some((sx / n, sy / n, sz / n))
}
