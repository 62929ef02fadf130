//! Dice notation and formula-part operations.
//!
//! Formulas are built from ordered parts: literal terms like `1d20` or
//! `3`, and named-bonus placeholders like `@abilityBonus`. The resolver
//! mutates parts textually, joins them with `+`, and hands the result to
//! a [`DiceEngine`](crate::host::DiceEngine) for evaluation.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for dice parsing and evaluation.
#[derive(Debug, Error)]
pub enum DiceError {
    #[error("Invalid dice notation: {0}")]
    InvalidNotation(String),
    #[error("Empty formula")]
    EmptyFormula,
}

/// Advantage state for the primary roll.
///
/// Only mutates the first part of a formula, and only when that part is
/// a single die.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Advantage {
    Advantage,
    #[default]
    Normal,
    Disadvantage,
}

impl Advantage {
    /// Signed direction: +1 advantage, 0 normal, -1 disadvantage.
    pub fn direction(self) -> i8 {
        match self {
            Advantage::Advantage => 1,
            Advantage::Normal => 0,
            Advantage::Disadvantage => -1,
        }
    }

    /// Build from a signed direction; any positive value is advantage,
    /// any negative value is disadvantage.
    pub fn from_direction(direction: i8) -> Advantage {
        match direction.signum() {
            1 => Advantage::Advantage,
            -1 => Advantage::Disadvantage,
            _ => Advantage::Normal,
        }
    }
}

/// The damage-die progression. Weapon damage dice step upward one rank
/// at a time and cap at d12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DieSize {
    D4,
    D6,
    D8,
    D10,
    D12,
}

impl DieSize {
    pub fn sides(&self) -> u32 {
        match self {
            DieSize::D4 => 4,
            DieSize::D6 => 6,
            DieSize::D8 => 8,
            DieSize::D10 => 10,
            DieSize::D12 => 12,
        }
    }

    pub fn from_sides(sides: u32) -> Option<DieSize> {
        match sides {
            4 => Some(DieSize::D4),
            6 => Some(DieSize::D6),
            8 => Some(DieSize::D8),
            10 => Some(DieSize::D10),
            12 => Some(DieSize::D12),
            _ => None,
        }
    }

    /// One rank up the progression; d12 stays d12.
    pub fn step_up(self) -> DieSize {
        match self {
            DieSize::D4 => DieSize::D6,
            DieSize::D6 => DieSize::D8,
            DieSize::D8 => DieSize::D10,
            DieSize::D10 => DieSize::D12,
            DieSize::D12 => DieSize::D12,
        }
    }
}

impl fmt::Display for DieSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.sides())
    }
}

/// Keep directive on a dice term. A bare `kh`/`kl` keeps one die.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Keep {
    Highest(u32),
    Lowest(u32),
}

/// A single parsed dice term, e.g. `2d20kh`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceTerm {
    pub count: u32,
    pub sides: u32,
    pub keep: Option<Keep>,
}

impl DiceTerm {
    /// Tolerant parse of `NdF`, `dF`, `NdFkh[K]`, `NdFkl[K]`.
    /// Anything else returns `None` rather than an error.
    pub fn parse(s: &str) -> Option<DiceTerm> {
        let s = s.trim();
        let d_pos = s.find('d')?;
        let count_str = &s[..d_pos];
        let rest = &s[d_pos + 1..];

        let count: u32 = if count_str.is_empty() {
            1
        } else {
            count_str.parse().ok()?
        };

        let (sides_str, keep) = if let Some(kh_pos) = rest.find("kh") {
            let keep_str = &rest[kh_pos + 2..];
            let keep = if keep_str.is_empty() {
                1
            } else {
                keep_str.parse().ok()?
            };
            (&rest[..kh_pos], Some(Keep::Highest(keep)))
        } else if let Some(kl_pos) = rest.find("kl") {
            let keep_str = &rest[kl_pos + 2..];
            let keep = if keep_str.is_empty() {
                1
            } else {
                keep_str.parse().ok()?
            };
            (&rest[..kl_pos], Some(Keep::Lowest(keep)))
        } else {
            (rest, None)
        };

        let sides: u32 = sides_str.parse().ok()?;
        if sides == 0 {
            return None;
        }

        Some(DiceTerm { count, sides, keep })
    }
}

impl fmt::Display for DiceTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{}", self.count, self.sides)?;
        match self.keep {
            Some(Keep::Highest(1)) => write!(f, "kh"),
            Some(Keep::Highest(n)) => write!(f, "kh{n}"),
            Some(Keep::Lowest(1)) => write!(f, "kl"),
            Some(Keep::Lowest(n)) => write!(f, "kl{n}"),
            None => Ok(()),
        }
    }
}

/// One element of a roll formula: a literal term or a `@name` bonus
/// placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RollPart {
    Term(String),
    Bonus(String),
}

impl RollPart {
    pub fn term(s: impl Into<String>) -> RollPart {
        RollPart::Term(s.into())
    }

    pub fn bonus(name: impl Into<String>) -> RollPart {
        RollPart::Bonus(name.into())
    }

    pub fn as_term(&self) -> Option<&str> {
        match self {
            RollPart::Term(s) => Some(s),
            RollPart::Bonus(_) => None,
        }
    }
}

impl From<String> for RollPart {
    fn from(s: String) -> RollPart {
        match s.strip_prefix('@') {
            Some(name) => RollPart::Bonus(name.to_string()),
            None => RollPart::Term(s),
        }
    }
}

impl From<&str> for RollPart {
    fn from(s: &str) -> RollPart {
        RollPart::from(s.to_string())
    }
}

impl From<RollPart> for String {
    fn from(part: RollPart) -> String {
        part.to_string()
    }
}

impl fmt::Display for RollPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollPart::Term(s) => write!(f, "{s}"),
            RollPart::Bonus(name) => write!(f, "@{name}"),
        }
    }
}

/// True iff the first part is a dice term with 20 faces.
///
/// Malformed or missing first parts return false rather than erroring.
pub fn is_d20(parts: &[RollPart]) -> bool {
    parts
        .first()
        .and_then(|p| p.as_term())
        .and_then(DiceTerm::parse)
        .map(|t| t.sides == 20)
        .unwrap_or(false)
}

/// Drop every placeholder part whose bonus value is missing or zero.
/// Ordering of the remaining parts is preserved; the input is never
/// mutated, and the operation is idempotent.
pub fn digest_parts(parts: &[RollPart], bonuses: &BTreeMap<String, f64>) -> Vec<RollPart> {
    parts
        .iter()
        .filter(|part| match part {
            RollPart::Term(_) => true,
            RollPart::Bonus(name) => bonuses.get(name).map(|v| *v != 0.0).unwrap_or(false),
        })
        .cloned()
        .collect()
}

/// Rewrite the first part for advantage or disadvantage.
///
/// A no-op unless the first part is a single die (leading count exactly
/// 1, no keep directive). `1dN` becomes `2dNkh` on advantage, `2dNkl`
/// on disadvantage.
pub fn apply_advantage(parts: &[RollPart], advantage: Advantage) -> Vec<RollPart> {
    let mut parts = parts.to_vec();
    if advantage == Advantage::Normal {
        return parts;
    }

    let Some(term) = parts
        .first()
        .and_then(|p| p.as_term())
        .and_then(DiceTerm::parse)
    else {
        return parts;
    };
    if term.count != 1 || term.keep.is_some() {
        return parts;
    }

    let suffix = if advantage == Advantage::Advantage {
        "kh"
    } else {
        "kl"
    };
    parts[0] = RollPart::Term(format!("2d{}{}", term.sides, suffix));
    parts
}

/// Make a bare-faces leading part explicit: `d20` becomes `1d20`.
/// Anything that doesn't look like a bare die is returned unchanged.
pub fn normalize_leading(part: &RollPart) -> RollPart {
    if let RollPart::Term(s) = part {
        if s.starts_with('d') && DiceTerm::parse(s).is_some() {
            return RollPart::Term(format!("1{s}"));
        }
    }
    part.clone()
}

/// Result of evaluating one dice term within a formula.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatedTerm {
    pub count: u32,
    pub sides: u32,
    /// Every face rolled, in roll order.
    pub results: Vec<u32>,
    /// The faces retained after any keep directive.
    pub kept: Vec<u32>,
    pub subtotal: u32,
}

/// A fully evaluated roll: total, per-term breakdown, and a renderable
/// markup fragment for chat cards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatedRoll {
    pub formula: String,
    pub terms: Vec<EvaluatedTerm>,
    pub modifier: i64,
    pub multiplier: u32,
    pub total: i64,
    pub markup: String,
}

impl EvaluatedRoll {
    /// Format the dice breakdown for display, dropped dice in parens.
    pub fn breakdown(&self) -> String {
        let mut pieces: Vec<String> = self
            .terms
            .iter()
            .map(|t| {
                let mut kept_used = vec![false; t.kept.len()];
                let shown: Vec<String> = t
                    .results
                    .iter()
                    .map(|&roll| {
                        let is_kept = t.kept.iter().enumerate().any(|(i, &k)| {
                            if k == roll && !kept_used[i] {
                                kept_used[i] = true;
                                true
                            } else {
                                false
                            }
                        });
                        if is_kept {
                            format!("{roll}")
                        } else {
                            format!("({roll})")
                        }
                    })
                    .collect();
                format!("[{}]", shown.join(", "))
            })
            .collect();

        if self.modifier != 0 || self.terms.is_empty() {
            pieces.push(format!("{}", self.modifier));
        }
        let mut s = pieces.join(" + ");
        if self.multiplier > 1 {
            s = format!("({s}) x {}", self.multiplier);
        }
        s
    }

    /// Whether the roll total meets or exceeds a target number.
    pub fn meets(&self, target: i64) -> bool {
        self.total >= target
    }
}

impl fmt::Display for EvaluatedRoll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.breakdown(), self.total)
    }
}

/// Evaluate a joined formula string against a bonus bag, drawing die
/// faces from `roll_die(sides)`.
///
/// Grammar: `+`/`-` separated terms, each a dice term, a flat integer,
/// or an `@name` placeholder; an optional trailing `* N` flat
/// multiplier applied to the whole total. Missing placeholders count as
/// zero. A `-` sign is honored for flat and placeholder terms only.
pub fn evaluate_formula<F>(
    formula: &str,
    bonuses: &BTreeMap<String, f64>,
    mut roll_die: F,
) -> Result<EvaluatedRoll, DiceError>
where
    F: FnMut(u32) -> u32,
{
    let trimmed = formula.trim();
    if trimmed.is_empty() {
        return Err(DiceError::EmptyFormula);
    }

    let (body, multiplier) = match trimmed.rsplit_once('*') {
        Some((left, m)) => {
            let mult: u32 = m
                .trim()
                .parse()
                .map_err(|_| DiceError::InvalidNotation(trimmed.to_string()))?;
            (left.trim(), mult)
        }
        None => (trimmed, 1),
    };

    let mut terms = Vec::new();
    let mut modifier: i64 = 0;
    let mut consumed = 0usize;
    let mut current = String::new();
    let mut sign: i64 = 1;

    let mut flush = |token: &str,
                     sign: i64,
                     terms: &mut Vec<EvaluatedTerm>,
                     modifier: &mut i64,
                     consumed: &mut usize,
                     roll_die: &mut F| {
        let token = token.trim();
        if token.is_empty() {
            return Ok(());
        }
        *consumed += 1;
        if let Some(name) = token.strip_prefix('@') {
            *modifier += sign * bonuses.get(name).copied().unwrap_or(0.0) as i64;
            return Ok(());
        }
        if let Some(term) = DiceTerm::parse(token) {
            if sign < 0 {
                return Err(DiceError::InvalidNotation(token.to_string()));
            }
            let results: Vec<u32> = (0..term.count).map(|_| roll_die(term.sides)).collect();
            let kept = match term.keep {
                Some(Keep::Highest(n)) => {
                    let mut sorted = results.clone();
                    sorted.sort_by(|a, b| b.cmp(a));
                    sorted.truncate(n as usize);
                    sorted
                }
                Some(Keep::Lowest(n)) => {
                    let mut sorted = results.clone();
                    sorted.sort();
                    sorted.truncate(n as usize);
                    sorted
                }
                None => results.clone(),
            };
            let subtotal = kept.iter().sum();
            terms.push(EvaluatedTerm {
                count: term.count,
                sides: term.sides,
                results,
                kept,
                subtotal,
            });
            return Ok(());
        }
        let value: i64 = token
            .parse()
            .map_err(|_| DiceError::InvalidNotation(token.to_string()))?;
        *modifier += sign * value;
        Ok(())
    };

    for ch in body.chars() {
        match ch {
            '+' | '-' => {
                flush(
                    &current,
                    sign,
                    &mut terms,
                    &mut modifier,
                    &mut consumed,
                    &mut roll_die,
                )?;
                current.clear();
                sign = if ch == '+' { 1 } else { -1 };
            }
            ' ' => continue,
            _ => current.push(ch),
        }
    }
    flush(
        &current,
        sign,
        &mut terms,
        &mut modifier,
        &mut consumed,
        &mut roll_die,
    )?;

    if consumed == 0 {
        return Err(DiceError::EmptyFormula);
    }

    let dice_total: i64 = terms.iter().map(|t| t.subtotal as i64).sum();
    let total = (dice_total + modifier) * multiplier as i64;

    let mut roll = EvaluatedRoll {
        formula: trimmed.to_string(),
        terms,
        modifier,
        multiplier,
        total,
        markup: String::new(),
    };
    roll.markup = format!(
        "<span class=\"roll-result\" data-formula=\"{}\">{} = {}</span>",
        roll.formula,
        roll.breakdown(),
        roll.total
    );
    Ok(roll)
}

impl FromStr for DiceTerm {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiceTerm::parse(s).ok_or_else(|| DiceError::InvalidNotation(s.to_string()))
    }
}

/// Production dice evaluator backed by the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardDiceEngine;

impl StandardDiceEngine {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate with a specific RNG (useful for seeded tests).
    pub fn evaluate_with_rng<R: Rng>(
        &self,
        formula: &str,
        bonuses: &BTreeMap<String, f64>,
        rng: &mut R,
    ) -> Result<EvaluatedRoll, DiceError> {
        evaluate_formula(formula, bonuses, |sides| rng.gen_range(1..=sides))
    }
}

impl crate::host::DiceEngine for StandardDiceEngine {
    async fn evaluate(
        &self,
        formula: &str,
        bonuses: &BTreeMap<String, f64>,
    ) -> Result<EvaluatedRoll, crate::host::HostError> {
        self.evaluate_with_rng(formula, bonuses, &mut rand::thread_rng())
            .map_err(|e| crate::host::HostError::Dice(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bag(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect()
    }

    fn parts(src: &[&str]) -> Vec<RollPart> {
        src.iter().map(|s| RollPart::from(*s)).collect()
    }

    #[test]
    fn test_is_d20() {
        assert!(is_d20(&parts(&["1d20"])));
        assert!(is_d20(&parts(&["1d20", "@abilityBonus"])));
        assert!(!is_d20(&parts(&["2d6"])));
        assert!(!is_d20(&parts(&["@abilityBonus"])));
        assert!(!is_d20(&parts(&["garbage"])));
        assert!(!is_d20(&[]));
    }

    #[test]
    fn test_digest_parts_elides_zero_and_missing() {
        let input = parts(&["@a", "@b", "@c"]);
        let digested = digest_parts(&input, &bag(&[("a", 0.0), ("b", 5.0)]));
        assert_eq!(digested, parts(&["@b"]));
        // Input untouched.
        assert_eq!(input.len(), 3);
    }

    #[test]
    fn test_digest_parts_idempotent() {
        let input = parts(&["1d20", "@a", "@b"]);
        let bonuses = bag(&[("a", 0.0), ("b", 3.0)]);
        let once = digest_parts(&input, &bonuses);
        let twice = digest_parts(&once, &bonuses);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_apply_advantage_rewrites_single_die() {
        assert_eq!(
            apply_advantage(&parts(&["1d20"]), Advantage::Advantage),
            parts(&["2d20kh"])
        );
        assert_eq!(
            apply_advantage(&parts(&["1d20"]), Advantage::Disadvantage),
            parts(&["2d20kl"])
        );
        assert_eq!(
            apply_advantage(&parts(&["1d20"]), Advantage::Normal),
            parts(&["1d20"])
        );
    }

    #[test]
    fn test_apply_advantage_skips_multi_dice() {
        // Leading count other than 1 is left alone.
        assert_eq!(
            apply_advantage(&parts(&["2d6"]), Advantage::Advantage),
            parts(&["2d6"])
        );
        assert_eq!(
            apply_advantage(&parts(&["2d20kh"]), Advantage::Advantage),
            parts(&["2d20kh"])
        );
    }

    #[test]
    fn test_normalize_leading() {
        assert_eq!(
            normalize_leading(&RollPart::from("d20")),
            RollPart::from("1d20")
        );
        assert_eq!(
            normalize_leading(&RollPart::from("1d20")),
            RollPart::from("1d20")
        );
        assert_eq!(
            normalize_leading(&RollPart::from("@bonus")),
            RollPart::from("@bonus")
        );
    }

    #[test]
    fn test_dice_term_parse() {
        assert_eq!(
            DiceTerm::parse("1d20"),
            Some(DiceTerm {
                count: 1,
                sides: 20,
                keep: None
            })
        );
        assert_eq!(
            DiceTerm::parse("d8"),
            Some(DiceTerm {
                count: 1,
                sides: 8,
                keep: None
            })
        );
        assert_eq!(
            DiceTerm::parse("2d20kh"),
            Some(DiceTerm {
                count: 2,
                sides: 20,
                keep: Some(Keep::Highest(1))
            })
        );
        assert_eq!(
            DiceTerm::parse("4d6kh3"),
            Some(DiceTerm {
                count: 4,
                sides: 6,
                keep: Some(Keep::Highest(3))
            })
        );
        assert_eq!(DiceTerm::parse("banana"), None);
        assert_eq!(DiceTerm::parse("5"), None);
    }

    #[test]
    fn test_die_size_progression() {
        assert_eq!(DieSize::D4.step_up(), DieSize::D6);
        assert_eq!(DieSize::D6.step_up(), DieSize::D8);
        assert_eq!(DieSize::D12.step_up(), DieSize::D12);
        assert_eq!(DieSize::D8.to_string(), "d8");
    }

    #[test]
    fn test_evaluate_formula_fixed_faces() {
        let roll = evaluate_formula("2d6+3", &bag(&[]), |_| 4).unwrap();
        assert_eq!(roll.total, 11);
        assert_eq!(roll.terms.len(), 1);
        assert_eq!(roll.terms[0].results, vec![4, 4]);
        assert_eq!(roll.modifier, 3);
    }

    #[test]
    fn test_evaluate_formula_keep_highest() {
        let mut faces = vec![17, 3].into_iter();
        let roll = evaluate_formula("2d20kh", &bag(&[]), |_| faces.next().unwrap()).unwrap();
        assert_eq!(roll.terms[0].kept, vec![17]);
        assert_eq!(roll.total, 17);
    }

    #[test]
    fn test_evaluate_formula_keep_lowest() {
        let mut faces = vec![17, 3].into_iter();
        let roll = evaluate_formula("2d20kl", &bag(&[]), |_| faces.next().unwrap()).unwrap();
        assert_eq!(roll.terms[0].kept, vec![3]);
        assert_eq!(roll.total, 3);
    }

    #[test]
    fn test_evaluate_formula_placeholders() {
        let roll =
            evaluate_formula("1d20+@ability", &bag(&[("ability", 2.0)]), |_| 10).unwrap();
        assert_eq!(roll.total, 12);
        // Missing placeholders count as zero.
        let roll = evaluate_formula("1d20+@nope", &bag(&[]), |_| 10).unwrap();
        assert_eq!(roll.total, 10);
    }

    #[test]
    fn test_evaluate_formula_negative_modifier() {
        let roll = evaluate_formula("1d20-2", &bag(&[]), |_| 10).unwrap();
        assert_eq!(roll.total, 8);
    }

    #[test]
    fn test_evaluate_formula_multiplier() {
        let roll = evaluate_formula("2d8+1 * 3", &bag(&[]), |_| 5).unwrap();
        assert_eq!(roll.total, 33);
        assert_eq!(roll.multiplier, 3);
    }

    #[test]
    fn test_evaluate_formula_rejects_garbage() {
        assert!(evaluate_formula("", &bag(&[]), |_| 1).is_err());
        assert!(evaluate_formula("banana", &bag(&[]), |_| 1).is_err());
        assert!(evaluate_formula("1d6 * x", &bag(&[]), |_| 1).is_err());
    }

    #[test]
    fn test_standard_engine_range() {
        let engine = StandardDiceEngine::new();
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let roll = engine
                .evaluate_with_rng("1d20+5", &bag(&[]), &mut rng)
                .unwrap();
            assert!(roll.total >= 6 && roll.total <= 25);
        }
    }

    #[test]
    fn test_advantage_direction_round_trip() {
        assert_eq!(Advantage::from_direction(1), Advantage::Advantage);
        assert_eq!(Advantage::from_direction(-1), Advantage::Disadvantage);
        assert_eq!(Advantage::from_direction(0), Advantage::Normal);
        assert_eq!(Advantage::Advantage.direction(), 1);
    }
}
