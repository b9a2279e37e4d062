//! 并发辅助.
//!
//! `rayon` feature 打开时借助 `rayon` 并行执行, 否则退化为顺序执行. 两种情况下结果一致.

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelIterator, ParallelIterator};

        /// 收集 `0..n` 中满足 `pred` 的下标, 结果升序.
        ///
        /// 每个工作线程先在本地累积自己那一段的结果, 最后按下标区间顺序拼接.
        pub(crate) fn filter_indices<F>(n: usize, pred: F) -> Vec<usize>
        where
            F: Fn(usize) -> bool + Sync + Send,
        {
            (0..n)
                .into_par_iter()
                .fold(Vec::new, |mut local, i| {
                    if pred(i) {
                        local.push(i);
                    }
                    local
                })
                .reduce(Vec::new, |mut left, right| {
                    left.extend(right);
                    left
                })
        }
    } else {
        /// 收集 `0..n` 中满足 `pred` 的下标, 结果升序.
        pub(crate) fn filter_indices<F>(n: usize, pred: F) -> Vec<usize>
        where
            F: Fn(usize) -> bool + Sync + Send,
        {
            (0..n).filter(|&i| pred(i)).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::filter_indices;

    #[test]
    fn test_filter_indices_ordered() {
        let ans = filter_indices(100_000, |i| i % 7 == 3);
        assert_eq!(ans.len(), (100_000 - 3 + 6) / 7);
        assert!(ans.windows(2).all(|w| w[0] < w[1]));
        assert!(ans.iter().all(|i| i % 7 == 3));
        assert!(filter_indices(0, |_| true).is_empty());
    }
}
