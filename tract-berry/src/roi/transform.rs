//! 体素坐标之间的仿射变换.

use nalgebra::{Matrix4, Point3, Vector3};

use crate::Idx3dF;

/// 4x4 齐次仿射变换, 作用于列向量 `(x, y, z, 1)`.
///
/// 该结构是只读的.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Affine(Matrix4<f32>);

impl Default for Affine {
    #[inline]
    fn default() -> Self {
        Self::identity()
    }
}

impl Affine {
    /// 恒等变换.
    #[inline]
    pub fn identity() -> Self {
        Self(Matrix4::identity())
    }

    /// 从矩阵直接构造. 最后一行应当是 `(0, 0, 0, 1)`, 否则程序行为未定义.
    #[inline]
    pub fn from_matrix(m: Matrix4<f32>) -> Self {
        Self(m)
    }

    /// 从按行优先排列的 16 个元素构造.
    #[inline]
    pub fn from_row_slice(m: &[f32; 16]) -> Self {
        Self(Matrix4::from_row_slice(m))
    }

    /// 先按轴缩放 `scale`, 再平移 `shift`.
    pub fn scaling_translation(scale: [f32; 3], shift: [f32; 3]) -> Self {
        let s = Matrix4::new_nonuniform_scaling(&Vector3::from(scale));
        let t = Matrix4::new_translation(&Vector3::from(shift));
        Self(t * s)
    }

    /// 获取底层矩阵.
    #[inline]
    pub fn matrix(&self) -> &Matrix4<f32> {
        &self.0
    }

    /// 是否 (严格) 为恒等变换.
    #[inline]
    pub fn is_identity(&self) -> bool {
        self.0 == Matrix4::identity()
    }

    /// 求逆. 不可逆时返回 `None`.
    #[inline]
    pub fn inverse(&self) -> Option<Self> {
        self.0.try_inverse().map(Self)
    }

    /// 变换一个点.
    #[inline]
    pub fn apply(&self, (x, y, z): Idx3dF) -> Idx3dF {
        let p = self.0.transform_point(&Point3::new(x, y, z));
        (p.x, p.y, p.z)
    }

    /// 复合变换: 先 `self`, 再 `then`.
    #[inline]
    pub fn then(&self, then: &Affine) -> Self {
        Self(then.0 * self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::Affine;

    fn close((a, b, c): (f32, f32, f32), (x, y, z): (f32, f32, f32)) -> bool {
        (a - x).abs() < 1e-5 && (b - y).abs() < 1e-5 && (c - z).abs() < 1e-5
    }

    #[test]
    fn test_identity() {
        let t = Affine::identity();
        assert!(t.is_identity());
        assert_eq!(t.apply((1.5, -2.0, 3.25)), (1.5, -2.0, 3.25));
        assert_eq!(Affine::default(), t);
    }

    #[test]
    fn test_scale_then_shift() {
        let t = Affine::scaling_translation([2.0, 2.0, 0.5], [1.0, 0.0, -1.0]);
        assert!(!t.is_identity());
        assert!(close(t.apply((1.0, 2.0, 4.0)), (3.0, 4.0, 1.0)));

        let inv = t.inverse().unwrap();
        assert!(close(inv.apply((3.0, 4.0, 1.0)), (1.0, 2.0, 4.0)));
        assert!(close(t.then(&inv).apply((7.0, 8.0, 9.0)), (7.0, 8.0, 9.0)));
    }

    #[test]
    fn test_singular() {
        let t = Affine::scaling_translation([1.0, 0.0, 1.0], [0.0; 3]);
        assert!(t.inverse().is_none());
    }

    #[test]
    fn test_row_slice_is_row_major() {
        #[rustfmt::skip]
        let t = Affine::from_row_slice(&[
            1.0, 0.0, 0.0, 10.0,
            0.0, 1.0, 0.0, 20.0,
            0.0, 0.0, 1.0, 30.0,
            0.0, 0.0, 0.0, 1.0,
        ]);
        assert!(close(t.apply((0.0, 0.0, 0.0)), (10.0, 20.0, 30.0)));
    }
}
