//! 字符序列相似度
//!
//! 基于 Ratcliff/Obershelp 最长公共子串递归匹配计算相似度:
//! `ratio = 2 * M / T`, `M` 为匹配字符数, `T` 为两个序列的总长度.

use std::collections::HashMap;

/// 序列长度达到该值后启用高频字符过滤
const POPULAR_MIN_LEN: usize = 200;

/// 匹配块, 表示 `a[a_start..a_start + size] == b[b_start..b_start + size]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchBlock {
    pub a_start: usize,
    pub b_start: usize,
    pub size: usize,
}

/// 序列匹配器
///
/// `b` 序列固定, 便于对多个 `a` 序列逐一比较
pub struct SequenceMatcher {
    a: Vec<char>,
    b: Vec<char>,
    b2j: HashMap<char, Vec<usize>>,
    b_count: HashMap<char, usize>,
}

impl SequenceMatcher {
    /// 创建序列匹配器
    ///
    /// # 参数
    ///
    /// * `a` - 待比较序列
    /// * `b` - 基准序列
    pub fn new(a: &str, b: &str) -> Self {
        let mut matcher = Self {
            a: Vec::new(),
            b: Vec::new(),
            b2j: HashMap::new(),
            b_count: HashMap::new(),
        };
        matcher.set_b(b);
        matcher.set_a(a);
        matcher
    }

    /// 替换待比较序列
    pub fn set_a(&mut self, a: &str) {
        self.a = a.chars().collect();
    }

    /// 替换基准序列, 并重建字符索引
    pub fn set_b(&mut self, b: &str) {
        self.b = b.chars().collect();
        self.b2j.clear();
        self.b_count.clear();

        for (j, c) in self.b.iter().enumerate() {
            self.b2j.entry(*c).or_default().push(j);
            *self.b_count.entry(*c).or_default() += 1;
        }

        // 长序列中出现过于频繁的字符不参与最长匹配搜索
        let n = self.b.len();
        if n >= POPULAR_MIN_LEN {
            let threshold = n / 100 + 1;
            self.b2j.retain(|_, indices| indices.len() <= threshold);
        }
    }

    /// 查找 `a[a_lo..a_hi]` 与 `b[b_lo..b_hi]` 的最长公共子串
    ///
    /// 长度相同时取 `a` 中最靠前的, 其次取 `b` 中最靠前的
    fn find_longest_match(&self, a_lo: usize, a_hi: usize, b_lo: usize, b_hi: usize) -> MatchBlock {
        let (mut best_i, mut best_j, mut best_size) = (a_lo, b_lo, 0);
        let mut j2len: HashMap<usize, usize> = HashMap::new();

        for i in a_lo..a_hi {
            let mut new_j2len = HashMap::new();
            if let Some(indices) = self.b2j.get(&self.a[i]) {
                for &j in indices {
                    if j < b_lo {
                        continue;
                    }
                    if j >= b_hi {
                        break;
                    }
                    let k = j
                        .checked_sub(1)
                        .and_then(|prev| j2len.get(&prev))
                        .copied()
                        .unwrap_or(0)
                        + 1;
                    new_j2len.insert(j, k);
                    if k > best_size {
                        best_i = i + 1 - k;
                        best_j = j + 1 - k;
                        best_size = k;
                    }
                }
            }
            j2len = new_j2len;
        }

        // 高频字符被过滤后, 向两侧补齐相同字符
        while best_i > a_lo && best_j > b_lo && self.a[best_i - 1] == self.b[best_j - 1] {
            best_i -= 1;
            best_j -= 1;
            best_size += 1;
        }
        while best_i + best_size < a_hi
            && best_j + best_size < b_hi
            && self.a[best_i + best_size] == self.b[best_j + best_size]
        {
            best_size += 1;
        }

        MatchBlock {
            a_start: best_i,
            b_start: best_j,
            size: best_size,
        }
    }

    /// 所有匹配块, 按位置排序
    pub fn matching_blocks(&self) -> Vec<MatchBlock> {
        let mut blocks = Vec::new();
        let mut queue = vec![(0, self.a.len(), 0, self.b.len())];

        while let Some((a_lo, a_hi, b_lo, b_hi)) = queue.pop() {
            let block = self.find_longest_match(a_lo, a_hi, b_lo, b_hi);
            if block.size == 0 {
                continue;
            }
            blocks.push(block);
            if a_lo < block.a_start && b_lo < block.b_start {
                queue.push((a_lo, block.a_start, b_lo, block.b_start));
            }
            if block.a_start + block.size < a_hi && block.b_start + block.size < b_hi {
                queue.push((
                    block.a_start + block.size,
                    a_hi,
                    block.b_start + block.size,
                    b_hi,
                ));
            }
        }

        blocks.sort_by_key(|block| (block.a_start, block.b_start));
        blocks
    }

    fn calculate_ratio(&self, matches: usize) -> f64 {
        let total = self.a.len() + self.b.len();
        if total == 0 {
            return 1.0;
        }
        2.0 * matches as f64 / total as f64
    }

    /// 相似度, 取值 [0, 1]
    pub fn ratio(&self) -> f64 {
        let matches = self.matching_blocks().iter().map(|block| block.size).sum();
        self.calculate_ratio(matches)
    }

    /// 相似度上界, 仅比较字符出现次数
    pub fn quick_ratio(&self) -> f64 {
        let mut available: HashMap<char, usize> = HashMap::new();
        let mut matches = 0;
        for c in &self.a {
            let remaining = available
                .entry(*c)
                .or_insert_with(|| self.b_count.get(c).copied().unwrap_or(0));
            if *remaining > 0 {
                *remaining -= 1;
                matches += 1;
            }
        }
        self.calculate_ratio(matches)
    }

    /// 相似度上界, 仅比较序列长度
    pub fn real_quick_ratio(&self) -> f64 {
        self.calculate_ratio(self.a.len().min(self.b.len()))
    }
}

/// 查找与文本最相似的候选项
///
/// 结果按相似度从高到低排列, 相似度相同时字典序较大的候选项在前
///
/// # 参数
///
/// * `word` - 待匹配文本
/// * `possibilities` - 候选项
/// * `n` - 最多返回数量
/// * `cutoff` - 最低相似度
pub fn get_close_matches<'a>(
    word: &str,
    possibilities: &[&'a str],
    n: usize,
    cutoff: f64,
) -> Vec<&'a str> {
    let mut matcher = SequenceMatcher::new("", word);
    let mut scored: Vec<(f64, &'a str)> = Vec::new();

    for &candidate in possibilities {
        matcher.set_a(candidate);
        if matcher.real_quick_ratio() >= cutoff && matcher.quick_ratio() >= cutoff {
            let ratio = matcher.ratio();
            if ratio >= cutoff {
                scored.push((ratio, candidate));
            }
        }
    }

    scored.sort_by(|(ratio_a, text_a), (ratio_b, text_b)| {
        ratio_b.total_cmp(ratio_a).then_with(|| text_b.cmp(text_a))
    });
    scored.into_iter().take(n).map(|(_, text)| text).collect()
}
