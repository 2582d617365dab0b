//! 选择策略：纯函数，从候选序列中选出下标子序列，不修改任何状态
//!
//! 所有策略都把 k 截断到种群大小（|S(P, k)| = min(k, |P|)），空种群返回空结果。

use std::collections::HashSet;

use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::index;
use rand::Rng;

/// 可被选择的对象：只需要一个标量适应度
pub trait Scored {
    fn fitness(&self) -> f64;

    /// 多样性选择比较的文本（个体即其规格）
    fn genome(&self) -> &str {
        ""
    }
}

impl Scored for f64 {
    fn fitness(&self) -> f64 {
        *self
    }
}

/// Layer 上配置的选择方式
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// 整个种群（按原顺序）
    All,
    Random { k: usize },
    Tournament { size: usize, k: usize },
    RouletteWheel { k: usize },
    Rank { k: usize },
    Elitism { elite_count: usize, k: usize },
    /// 贪心地挑选彼此差异最大的个体；measure 为 None 时退化为随机
    Diversity { k: usize, measure: Option<DistanceMeasure> },
}

/// 内置的个体间距离
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMeasure {
    /// 按空白切分的词集合上的 Jaccard 距离
    TokenJaccard,
}

impl DistanceMeasure {
    pub fn distance(self, a: &str, b: &str) -> f64 {
        match self {
            DistanceMeasure::TokenJaccard => {
                let left: HashSet<&str> = a.split_whitespace().collect();
                let right: HashSet<&str> = b.split_whitespace().collect();
                let union = left.union(&right).count();
                if union == 0 {
                    return 0.0;
                }
                1.0 - left.intersection(&right).count() as f64 / union as f64
            }
        }
    }
}

impl Selection {
    pub fn select<T: Scored, R: Rng + ?Sized>(&self, items: &[T], rng: &mut R) -> Vec<usize> {
        match *self {
            Selection::All => (0..items.len()).collect(),
            Selection::Random { k } => random(items, k, rng),
            Selection::Tournament { size, k } => tournament(items, size, k, rng),
            Selection::RouletteWheel { k } => roulette_wheel(items, k, rng),
            Selection::Rank { k } => rank(items, k, rng),
            Selection::Elitism { elite_count, k } => elitism(items, elite_count, k, rng),
            Selection::Diversity { k, measure: None } => random(items, k, rng),
            Selection::Diversity {
                k,
                measure: Some(measure),
            } => diversity(items, k, |a: &T, b: &T| measure.distance(a.genome(), b.genome()), rng),
        }
    }
}

fn sanitize(f: f64) -> f64 {
    if f.is_nan() {
        f64::NEG_INFINITY
    } else {
        f
    }
}

/// 下标按适应度稳定降序排列
pub fn ranked_indices<T: Scored>(items: &[T]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..items.len()).collect();
    // NaN 视为最小
    order.sort_by(|a, b| sanitize(items[*b].fitness()).total_cmp(&sanitize(items[*a].fitness())));
    order
}

/// 均匀无放回抽样
pub fn random<T, R: Rng + ?Sized>(items: &[T], k: usize, rng: &mut R) -> Vec<usize> {
    let k = k.min(items.len());
    index::sample(rng, items.len(), k).into_vec()
}

/// 锦标赛：k 次独立抽签，每次无放回抽取 size 个候选，取适应度最高者（并列取先遇到的）
pub fn tournament<T: Scored, R: Rng + ?Sized>(
    items: &[T],
    size: usize,
    k: usize,
    rng: &mut R,
) -> Vec<usize> {
    let n = items.len();
    let k = k.min(n);
    let size = size.clamp(1, n.max(1));

    (0..k)
        .filter_map(|_| {
            index::sample(rng, n, size)
                .into_iter()
                .fold(None, |best: Option<usize>, idx| match best {
                    Some(b) if sanitize(items[idx].fitness()) <= sanitize(items[b].fitness()) => Some(b),
                    _ => Some(idx),
                })
        })
        .collect()
}

/// 轮盘赌：有放回抽样，权重 = fitness / total；总适应度为 0 时退化为均匀随机
pub fn roulette_wheel<T: Scored, R: Rng + ?Sized>(items: &[T], k: usize, rng: &mut R) -> Vec<usize> {
    let k = k.min(items.len());
    if k == 0 {
        return Vec::new();
    }

    let weights: Vec<f64> = items
        .iter()
        .map(|i| {
            let f = i.fitness();
            if f.is_finite() { f.max(0.0) } else { 0.0 }
        })
        .collect();
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return random(items, k, rng);
    }

    match WeightedIndex::new(&weights) {
        Ok(dist) => (0..k).map(|_| dist.sample(rng)).collect(),
        Err(_) => random(items, k, rng),
    }
}

/// 排名选择：有放回抽样，降序排名第 1 的权重为 N，最后一名为 1
pub fn rank<T: Scored, R: Rng + ?Sized>(items: &[T], k: usize, rng: &mut R) -> Vec<usize> {
    let n = items.len();
    let k = k.min(n);
    if k == 0 {
        return Vec::new();
    }

    let order = ranked_indices(items);
    let weights: Vec<usize> = (1..=n).rev().collect();
    match WeightedIndex::new(&weights) {
        Ok(dist) => (0..k).map(|_| order[dist.sample(rng)]).collect(),
        Err(_) => random(items, k, rng),
    }
}

/// 精英保留：前 elite_count 名必选，其余 k - elite_count 个从剩余个体中均匀无放回抽取
pub fn elitism<T: Scored, R: Rng + ?Sized>(
    items: &[T],
    elite_count: usize,
    k: usize,
    rng: &mut R,
) -> Vec<usize> {
    let k = k.min(items.len());
    let order = ranked_indices(items);
    let elites = elite_count.min(k);

    let (top, rest) = order.split_at(elites);
    let mut selected = top.to_vec();
    selected.extend(
        index::sample(rng, rest.len(), k - elites)
            .into_iter()
            .map(|i| rest[i]),
    );
    selected
}

/// 多样性选择：先随机取一个，之后每次取与已选个体平均距离最大的（并列取先遇到的）；
/// 种群不多于 k 时退化为随机
pub fn diversity<T, D, R>(items: &[T], k: usize, distance: D, rng: &mut R) -> Vec<usize>
where
    D: Fn(&T, &T) -> f64,
    R: Rng + ?Sized,
{
    let n = items.len();
    if n <= k {
        return random(items, k, rng);
    }
    if k == 0 {
        return Vec::new();
    }

    let mut selected = vec![rng.gen_range(0..n)];
    while selected.len() < k {
        let mut best: Option<(usize, f64)> = None;
        for idx in (0..n).filter(|i| !selected.contains(i)) {
            let total: f64 = selected.iter().map(|&s| distance(&items[idx], &items[s])).sum();
            let spread = sanitize(total / selected.len() as f64);
            if best.map_or(true, |(_, b)| spread > b) {
                best = Some((idx, spread));
            }
        }
        match best {
            Some((idx, _)) => selected.push(idx),
            None => break,
        }
    }
    selected
}

/// 用给定选择方式组成 num_pairs 对父代；只选出一个时与自身配对，一个都没有时跳过
pub fn parent_pairs<T: Scored, R: Rng + ?Sized>(
    selection: &Selection,
    items: &[T],
    num_pairs: usize,
    rng: &mut R,
) -> Vec<(usize, usize)> {
    (0..num_pairs)
        .filter_map(|_| match selection.select(items, rng).as_slice() {
            [] => None,
            [only] => Some((*only, *only)),
            [a, b, ..] => Some((*a, *b)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn strategies(k: usize) -> Vec<Selection> {
        vec![
            Selection::Random { k },
            Selection::Tournament { size: 3, k },
            Selection::RouletteWheel { k },
            Selection::Rank { k },
            Selection::Elitism { elite_count: 1, k },
            Selection::Diversity { k, measure: None },
            Selection::Diversity {
                k,
                measure: Some(DistanceMeasure::TokenJaccard),
            },
        ]
    }

    struct Text {
        fitness: f64,
        body: &'static str,
    }

    impl Scored for Text {
        fn fitness(&self) -> f64 {
            self.fitness
        }

        fn genome(&self) -> &str {
            self.body
        }
    }

    #[test]
    fn test_selection_size_is_clamped() {
        let mut rng = StdRng::seed_from_u64(42);
        for n in 0..7usize {
            let population: Vec<f64> = (0..n).map(|i| (i * 7 % 5) as f64).collect();
            for k in 0..10usize {
                for strategy in strategies(k) {
                    let picked = strategy.select(&population, &mut rng);
                    assert_eq!(picked.len(), k.min(n), "{strategy:?} n={n} k={k}");
                    assert!(picked.iter().all(|&i| i < n));
                }
            }
        }
    }

    #[test]
    fn test_empty_population_yields_empty() {
        let mut rng = StdRng::seed_from_u64(0);
        let empty: Vec<f64> = Vec::new();
        for strategy in strategies(3) {
            assert!(strategy.select(&empty, &mut rng).is_empty());
        }
        assert!(Selection::All.select(&empty, &mut rng).is_empty());
    }

    #[test]
    fn test_random_is_without_replacement() {
        let mut rng = StdRng::seed_from_u64(5);
        let population = vec![1.0; 6];
        for _ in 0..50 {
            let mut picked = random(&population, 6, &mut rng);
            picked.sort_unstable();
            assert_eq!(picked, vec![0, 1, 2, 3, 4, 5]);
        }
    }

    #[test]
    fn test_tournament_full_size_returns_best() {
        let mut rng = StdRng::seed_from_u64(9);
        let population = vec![3.0, 1.0, 5.0, 2.0, 4.0];
        let picked = tournament(&population, 5, 2, &mut rng);
        assert_eq!(picked, vec![2, 2]);
    }

    #[test]
    fn test_tournament_winner_never_worst_of_three() {
        let mut rng = StdRng::seed_from_u64(21);
        let population = vec![0.0, 1.0, 2.0, 3.0, 4.0];
        for _ in 0..200 {
            for idx in tournament(&population, 3, 2, &mut rng) {
                // 3 个不同候选中的最大值至少是第三小的值
                assert!(population[idx] >= 2.0);
            }
        }
    }

    #[test]
    fn test_roulette_uniform_fitness_converges_to_uniform() {
        let mut rng = StdRng::seed_from_u64(77);
        let population = vec![2.0; 4];
        let mut counts = [0usize; 4];
        let trials = 20_000;
        for _ in 0..trials {
            for idx in roulette_wheel(&population, 1, &mut rng) {
                counts[idx] += 1;
            }
        }
        for c in counts {
            let share = c as f64 / trials as f64;
            assert!((share - 0.25).abs() < 0.02, "share {share}");
        }
    }

    #[test]
    fn test_roulette_zero_total_degrades_to_uniform_sampling() {
        let mut rng = StdRng::seed_from_u64(3);
        let population = vec![0.0; 5];
        let mut picked = roulette_wheel(&population, 5, &mut rng);
        picked.sort_unstable();
        assert_eq!(picked, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_roulette_never_picks_zero_weight_when_total_positive() {
        let mut rng = StdRng::seed_from_u64(8);
        let population = vec![0.0, 5.0, 0.0];
        for _ in 0..100 {
            assert_eq!(roulette_wheel(&population, 2, &mut rng), vec![1, 1]);
        }
    }

    #[test]
    fn test_rank_prefers_higher_fitness() {
        let mut rng = StdRng::seed_from_u64(17);
        let population = vec![1.0, 10.0, 5.0];
        let mut counts = [0usize; 3];
        for _ in 0..6_000 {
            for idx in rank(&population, 1, &mut rng) {
                counts[idx] += 1;
            }
        }
        // 权重 3:2:1 → 10.0 > 5.0 > 1.0
        assert!(counts[1] > counts[2]);
        assert!(counts[2] > counts[0]);
    }

    #[test]
    fn test_elitism_includes_best_exactly_once() {
        let mut rng = StdRng::seed_from_u64(99);
        let population = vec![0.5, 9.0, 3.0, 1.0];
        for _ in 0..100 {
            let picked = elitism(&population, 1, 3, &mut rng);
            assert_eq!(picked.len(), 3);
            assert_eq!(picked[0], 1);
            assert_eq!(picked.iter().filter(|&&i| i == 1).count(), 1);
            let mut unique = picked.clone();
            unique.sort_unstable();
            unique.dedup();
            assert_eq!(unique.len(), 3);
        }
    }

    #[test]
    fn test_elitism_elite_count_above_k() {
        let mut rng = StdRng::seed_from_u64(1);
        let population = vec![1.0, 4.0, 3.0, 2.0];
        assert_eq!(elitism(&population, 10, 2, &mut rng), vec![1, 2]);
    }

    #[test]
    fn test_ranked_indices_stable() {
        let population = vec![2.0, 5.0, 2.0, f64::NAN, 5.0];
        assert_eq!(ranked_indices(&population), vec![1, 4, 0, 2, 3]);
    }

    #[test]
    fn test_token_jaccard_distance() {
        let m = DistanceMeasure::TokenJaccard;
        assert_eq!(m.distance("a b", "b  a"), 0.0);
        assert_eq!(m.distance("a", "b"), 1.0);
        assert_eq!(m.distance("", ""), 0.0);
        assert_eq!(m.distance("a b c", "a b"), 1.0 - 2.0 / 3.0);
    }

    #[test]
    fn test_diversity_picks_the_outlier() {
        let population = vec![
            Text { fitness: 1.0, body: "sort with a b c" },
            Text { fitness: 2.0, body: "sort with a b c d" },
            Text { fitness: 3.0, body: "use a radix trie" },
            Text { fitness: 4.0, body: "sort with a b" },
        ];
        let selection = Selection::Diversity {
            k: 2,
            measure: Some(DistanceMeasure::TokenJaccard),
        };
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let picked = selection.select(&population, &mut rng);
            assert_eq!(picked.len(), 2);
            assert!(picked.contains(&2), "seed {seed}: {picked:?}");
            assert_ne!(picked[0], picked[1]);
        }
    }

    #[test]
    fn test_diversity_with_custom_distance_keeps_extremes() {
        let population = vec![0.0, 1.0, 2.0, 10.0];
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let picked = diversity(&population, 3, |a: &f64, b: &f64| (a - b).abs(), &mut rng);
            assert_eq!(picked.len(), 3);
            assert!(picked.contains(&0) && picked.contains(&3), "seed {seed}: {picked:?}");
        }
    }

    #[test]
    fn test_diversity_small_population_returns_everyone() {
        let mut rng = StdRng::seed_from_u64(6);
        let population = vec![1.0, 2.0];
        let mut picked = diversity(&population, 5, |a: &f64, b: &f64| (a - b).abs(), &mut rng);
        picked.sort_unstable();
        assert_eq!(picked, vec![0, 1]);
    }

    #[test]
    fn test_parent_pairs() {
        let mut rng = StdRng::seed_from_u64(4);
        let single = vec![1.0];
        assert_eq!(
            parent_pairs(&Selection::Random { k: 2 }, &single, 2, &mut rng),
            vec![(0, 0), (0, 0)]
        );
        let empty: Vec<f64> = Vec::new();
        assert!(parent_pairs(&Selection::Random { k: 2 }, &empty, 3, &mut rng).is_empty());
        let many = vec![1.0, 2.0, 3.0];
        let pairs = parent_pairs(&Selection::Random { k: 2 }, &many, 4, &mut rng);
        assert_eq!(pairs.len(), 4);
        assert!(pairs.iter().all(|(a, b)| a != b));
    }
}
