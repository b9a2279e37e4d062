//! subject 空间与图谱模板空间之间的配准.

use crate::{Affine, Idx3d, Idx3dF};

/// 配准协作者. 本库只用它把毫米容差换算为 subject 体素, 以及判定半球.
pub trait Registration {
    /// 相邻 subject 体素在模板空间中相距多少个模板体素 (雅可比缩放因子).
    ///
    /// 映射不可用时返回 `None`.
    fn jacobian(&self) -> Option<f32>;

    /// 模板体素分辨率 (毫米), 按 x, y, z 排列.
    fn template_voxel_size(&self) -> [f32; 3];

    /// 模板网格尺寸.
    fn template_dim(&self) -> Idx3d;

    /// 将 subject 体素坐标映射到模板体素坐标. 映射不可用时返回 `None`.
    fn to_template(&self, p: Idx3dF) -> Option<Idx3dF>;
}

/// 以单个仿射变换表示的配准.
#[derive(Copy, Clone, Debug)]
pub struct AffineRegistration {
    sub_to_template: Affine,
    template_vs: [f32; 3],
    template_dim: Idx3d,
}

impl AffineRegistration {
    /// `sub_to_template` 把 subject 体素坐标变换到模板体素坐标.
    pub fn new(sub_to_template: Affine, template_vs: [f32; 3], template_dim: Idx3d) -> Self {
        Self {
            sub_to_template,
            template_vs,
            template_dim,
        }
    }
}

impl Registration for AffineRegistration {
    fn jacobian(&self) -> Option<f32> {
        let (a0, a1, a2) = self.sub_to_template.apply((0.0, 0.0, 0.0));
        let (b0, b1, b2) = self.sub_to_template.apply((1.0, 0.0, 0.0));
        let len = ((b0 - a0).powi(2) + (b1 - a1).powi(2) + (b2 - a2).powi(2)).sqrt();
        (len.is_finite() && len > 0.0).then_some(len)
    }

    #[inline]
    fn template_voxel_size(&self) -> [f32; 3] {
        self.template_vs
    }

    #[inline]
    fn template_dim(&self) -> Idx3d {
        self.template_dim
    }

    #[inline]
    fn to_template(&self, p: Idx3dF) -> Option<Idx3dF> {
        Some(self.sub_to_template.apply(p))
    }
}

#[cfg(test)]
mod tests {
    use super::{AffineRegistration, Registration};
    use crate::Affine;

    #[test]
    fn test_jacobian() {
        let reg = AffineRegistration::new(
            Affine::scaling_translation([2.0, 2.0, 2.0], [5.0, 0.0, 0.0]),
            [1.0; 3],
            (100, 100, 100),
        );
        assert_eq!(reg.jacobian(), Some(2.0));
        assert_eq!(reg.to_template((1.0, 1.0, 1.0)), Some((7.0, 2.0, 2.0)));

        let flat = AffineRegistration::new(
            Affine::scaling_translation([0.0, 1.0, 1.0], [0.0; 3]),
            [1.0; 3],
            (1, 1, 1),
        );
        assert_eq!(flat.jacobian(), None);
    }
}
