//! 规格掩码：变异与交叉共享的前置步骤
//!
//! 从左到右遍历单位（按空白切分的词，或字符）；每个位置以 rate 的概率把一段长度为
//! min(从 size 中均匀抽取, 剩余单位数) 的连续单位替换为一个 `[MASK]`，否则保留该单位。
//! 词模式下保留原文的空白分隔，因此 rate = 0 时输出与输入逐字节相同。

use std::ops::Range;

use rand::Rng;

use crate::core::EvolveError;

pub const MASK_TOKEN: &str = "[MASK]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskUnit {
    /// 以空白切分的词
    Token,
    Character,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaskConfig {
    pub rate: f64,
    /// 连续掩码长度范围 [start, end)
    pub size: Range<usize>,
    pub unit: MaskUnit,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            rate: 0.3,
            size: 1..10,
            unit: MaskUnit::Token,
        }
    }
}

impl MaskConfig {
    pub fn new(rate: f64, size: Range<usize>) -> Self {
        Self {
            rate,
            size,
            unit: MaskUnit::Token,
        }
    }

    pub fn by_characters(mut self) -> Self {
        self.unit = MaskUnit::Character;
        self
    }

    pub fn validate(&self, layer: &str) -> Result<(), EvolveError> {
        if !(0.0..=1.0).contains(&self.rate) {
            return Err(EvolveError::invalid_layer(
                layer,
                format!("mask rate {} outside [0, 1]", self.rate),
            ));
        }
        if self.size.is_empty() || self.size.start == 0 {
            return Err(EvolveError::invalid_layer(
                layer,
                format!("mask size range {:?} must be non-empty and start at 1 or more", self.size),
            ));
        }
        Ok(())
    }

    pub fn apply<R: Rng + ?Sized>(&self, text: &str, rng: &mut R) -> String {
        match self.unit {
            MaskUnit::Token => self.mask_tokens(text, rng),
            MaskUnit::Character => self.mask_chars(text, rng),
        }
    }

    /// 本位置是否开始一段掩码；是则返回覆盖的单位数（至少 1，至多 remaining）
    fn draw_run<R: Rng + ?Sized>(&self, remaining: usize, rng: &mut R) -> Option<usize> {
        if rng.gen::<f64>() >= self.rate {
            return None;
        }
        let run = if self.size.is_empty() {
            self.size.start
        } else {
            rng.gen_range(self.size.clone())
        };
        Some(run.clamp(1, remaining.max(1)))
    }

    fn mask_tokens<R: Rng + ?Sized>(&self, text: &str, rng: &mut R) -> String {
        let spans = token_spans(text);
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        let mut i = 0;

        while i < spans.len() {
            let (start, end) = spans[i];
            // 分隔符（上一个输出单位之后到本词之前的空白）
            out.push_str(&text[cursor..start]);
            match self.draw_run(spans.len() - i, rng) {
                Some(run) => {
                    out.push_str(MASK_TOKEN);
                    cursor = spans[i + run - 1].1;
                    i += run;
                }
                None => {
                    out.push_str(&text[start..end]);
                    cursor = end;
                    i += 1;
                }
            }
        }
        out.push_str(&text[cursor..]);
        out
    }

    fn mask_chars<R: Rng + ?Sized>(&self, text: &str, rng: &mut R) -> String {
        let chars: Vec<char> = text.chars().collect();
        let mut out = String::with_capacity(text.len());
        let mut i = 0;

        while i < chars.len() {
            match self.draw_run(chars.len() - i, rng) {
                Some(run) => {
                    out.push_str(MASK_TOKEN);
                    i += run;
                }
                None => {
                    out.push(chars[i]);
                    i += 1;
                }
            }
        }
        out
    }
}

/// 以空白切分的词在原文中的字节区间
fn token_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (idx, ch) in text.char_indices() {
        match (ch.is_whitespace(), start) {
            (false, None) => start = Some(idx),
            (true, Some(s)) => {
                spans.push((s, idx));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }
    spans
}
