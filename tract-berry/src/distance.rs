//! 流线之间的 L1 距离.
//!
//! 所有函数都作用于扁平缓冲区 (`x0, y0, z0, x1, ...`), 点以长度至少为 3 的切片传入.
//! 使用 L1 (曼哈顿) 度量是为了避免开方; 对阈值判定而言, 它与欧氏距离一样保序.
//!
//! 两条流线 `A`, `B` 的 "距离" 定义为对称 Hausdorff 距离
//! `H(A, B) = max(h(A, B), h(B, A))`, 其中 `h(A, B) = max_{a in A} min_{b in B} |a - b|_1`.
//! 所有计算都带一个上限 `limit`, 实际返回 `min(H(A, B), limit)`.

/// 两点之间的 L1 距离.
#[inline]
pub fn norm1(a: &[f32], b: &[f32]) -> f32 {
    (a[0] - b[0]).abs() + (a[1] - b[1]).abs() + (a[2] - b[2]).abs()
}

/// 带上限的 L1 距离.
///
/// 依次累加 x, y, z 三个分量; 只要部分和超过 `bound` 就立即返回 `bound`.
/// 否则返回精确距离 (此时不超过 `bound`).
#[inline]
pub fn bounded_norm1(bound: f32, a: &[f32], b: &[f32]) -> f32 {
    let mut d = (a[0] - b[0]).abs();
    if d > bound {
        return bound;
    }
    d += (a[1] - b[1]).abs();
    if d > bound {
        return bound;
    }
    d += (a[2] - b[2]).abs();
    if d > bound {
        return bound;
    }
    d
}

/// 点 `p` 到折线 `line` 上各点的最小 L1 距离.
///
/// 一旦当前最小值不超过 `floor` 就停止扫描: 调用方只关心最小值是否大于 `floor`,
/// 此时返回值不一定精确, 但保证 `<= floor`. 若最小值大于 `floor`, 返回值精确.
/// `line` 为空时返回 `f32::INFINITY`.
#[inline]
pub fn min_distance(p: &[f32], line: &[f32], floor: f32) -> f32 {
    let mut min_dis = f32::INFINITY;
    for q in line.chunks_exact(3) {
        min_dis = bounded_norm1(min_dis, p, q);
        if min_dis <= floor {
            break;
        }
    }
    min_dis
}

/// 单向 Hausdorff 距离 `h(a, b)`, 以 `max_so_far` 为初值.
///
/// 若某个点的最小距离达到 `hard_limit`, 说明两条流线一定 "太远",
/// 立即返回 `hard_limit`. 否则返回 `max(max_so_far, h(a, b))`.
pub fn directed_distance(a: &[f32], b: &[f32], max_so_far: f32, hard_limit: f32) -> f32 {
    let mut max_dis = max_so_far;
    for p in a.chunks_exact(3) {
        let d = min_distance(p, b, max_dis);
        if d > max_dis {
            if d >= hard_limit {
                return hard_limit;
            }
            max_dis = d;
        }
    }
    max_dis
}

/// 对称 Hausdorff 距离, 结果不超过 `limit`.
///
/// 先算 `a -> b`; 若已达上限则不再计算反方向.
/// 函数满足 `symmetric_distance(a, b, l) == symmetric_distance(b, a, l)`.
pub fn symmetric_distance(a: &[f32], b: &[f32], limit: f32) -> f32 {
    let ab = directed_distance(a, b, 0.0, limit);
    if ab >= limit {
        return limit;
    }
    directed_distance(b, a, ab, limit)
}

/// 三锚点快速排除: 返回 `true` 表示两条流线的距离可以直接认定不小于 `limit`.
///
/// 取 `a` 的首点, 尾点和中点, 分别求其到整条 `b` 的最小距离.
/// 任一锚点的最小距离达到 `limit`, 则 `h(a, b)` 以至对称距离都不小于 `limit`.
/// 结论与流线方向和采样疏密无关.
///
/// 这是纯粹的性能优化, 漏掉的远流线会在完整计算中被排除.
///
/// # 注意
///
/// `a` 至少要有一个点, 否则 panic.
#[inline]
pub fn quickly_exceeds(a: &[f32], b: &[f32], limit: f32) -> bool {
    let (a0, a1, am) = anchors(a);
    [am, a0, a1]
        .into_iter()
        .any(|p| min_distance(p, b, limit) >= limit)
}

/// 首点, 尾点, 中点.
#[inline]
fn anchors(t: &[f32]) -> (&[f32], &[f32], &[f32]) {
    debug_assert!(t.len() >= 3 && t.len() % 3 == 0);
    let n = t.len() / 3;
    let mid = n / 2 * 3;
    (&t[..3], &t[t.len() - 3..], &t[mid..mid + 3])
}
