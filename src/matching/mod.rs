//! Entity-matching engine (§4.10): download-time cross-tenant entity
//! correspondence, used when computing how a source tenant's entities map
//! onto a target tenant's during migration.
//!
//! Rule types are processed from highest to lowest weight. Each tier builds
//! sorted per-property indexes on both sides and merge-joins them, sums
//! weights for repeated `(source, target)` hits, keeps only pairs that are
//! weight-maximal for their source and their target, and commits the rows
//! that come out one-to-one. Everything left over carries its accumulated
//! weight into the next (lower-weight) tier instead of being discarded.

use std::cmp::Ordering;
use std::collections::HashMap;

/// One entity from either side of the match, indexed by single-value
/// properties (rules compare exactly one property each).
#[derive(Debug, Clone, Default)]
pub struct MatchableEntity {
    pub id: String,
    pub properties: HashMap<String, String>,
}

/// A single-property comparison within an [`IndexRuleType`].
#[derive(Debug, Clone)]
pub struct Rule {
    pub property: String,
    /// Suppresses a hit where the source and target entity carry the same id,
    /// unless the caller runs in `self_match` mode.
    pub self_match_disabled: bool,
}

/// A prioritized group of rules that together confer `weight` when any of
/// them hits. `seed` rule types are expected to run first by convention
/// (callers sort `rule_types` accordingly before supplying them); this engine
/// only relies on `weight` ordering, which `seed` tiers should set highest.
#[derive(Debug, Clone)]
pub struct IndexRuleType {
    pub name: String,
    pub weight: u32,
    pub seed: bool,
    pub rules: Vec<Rule>,
}

/// One committed correspondence between `source[source_idx]` and
/// `target[target_idx]`, carrying the total weight that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchedPair {
    pub source_idx: usize,
    pub target_idx: usize,
    pub weight: u32,
}

fn join_on_property(source: &[MatchableEntity], target: &[MatchableEntity], remaining_source: &[usize], remaining_target: &[usize], property: &str) -> Vec<(usize, usize)> {
    let mut s_sorted: Vec<(&str, usize)> = remaining_source.iter().filter_map(|&i| source[i].properties.get(property).map(|v| (v.as_str(), i))).collect();
    let mut t_sorted: Vec<(&str, usize)> = remaining_target.iter().filter_map(|&i| target[i].properties.get(property).map(|v| (v.as_str(), i))).collect();
    s_sorted.sort_unstable();
    t_sorted.sort_unstable();

    let mut pairs = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < s_sorted.len() && j < t_sorted.len() {
        match s_sorted[i].0.cmp(t_sorted[j].0) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                let value = s_sorted[i].0;
                let s_start = i;
                while i < s_sorted.len() && s_sorted[i].0 == value {
                    i += 1;
                }
                let t_start = j;
                while j < t_sorted.len() && t_sorted[j].0 == value {
                    j += 1;
                }
                for &(_, si) in &s_sorted[s_start..i] {
                    for &(_, ti) in &t_sorted[t_start..j] {
                        pairs.push((si, ti));
                    }
                }
            }
        }
    }
    pairs
}

fn max_per_key<K: std::hash::Hash + Eq + Copy>(pair_weights: &HashMap<(usize, usize), u32>, key_of: impl Fn(&(usize, usize)) -> K) -> HashMap<K, u32> {
    let mut maxima: HashMap<K, u32> = HashMap::new();
    for (pair, weight) in pair_weights {
        let key = key_of(pair);
        let entry = maxima.entry(key).or_insert(0);
        if *weight > *entry {
            *entry = *weight;
        }
    }
    maxima
}

/// Runs the full matching algorithm (§4.10 steps 1-5) and returns every
/// committed one-to-one pair. `rule_types` need not be pre-sorted; this
/// function processes them from highest to lowest `weight`.
///
/// Guarantees: the returned pairs form a partial function in both
/// directions (no `source_idx` or `target_idx` repeats across the result);
/// given the same inputs, the result is deterministic.
#[must_use]
pub fn match_entities(source: &[MatchableEntity], target: &[MatchableEntity], rule_types: &[IndexRuleType], self_match: bool) -> Vec<MatchedPair> {
    let mut sorted_rule_types: Vec<&IndexRuleType> = rule_types.iter().collect();
    sorted_rule_types.sort_by(|a, b| b.weight.cmp(&a.weight));

    let mut remaining_source: Vec<usize> = (0..source.len()).collect();
    let mut remaining_target: Vec<usize> = (0..target.len()).collect();
    let mut carried: HashMap<(usize, usize), u32> = HashMap::new();
    let mut committed: Vec<MatchedPair> = Vec::new();

    for rule_type in sorted_rule_types {
        if remaining_source.is_empty() || remaining_target.is_empty() {
            break;
        }

        let mut pair_weights: HashMap<(usize, usize), u32> = HashMap::new();
        for rule in &rule_type.rules {
            for (s, t) in join_on_property(source, target, &remaining_source, &remaining_target, &rule.property) {
                if rule.self_match_disabled && !self_match && source[s].id == target[t].id {
                    continue;
                }
                *pair_weights.entry((s, t)).or_insert(0) += rule_type.weight;
            }
        }

        // Step 5 (for pairs surviving the *previous* tier): fold the carried
        // weight on top of whatever this tier just computed for the same pair.
        for (pair, carried_weight) in carried.drain() {
            *pair_weights.entry(pair).or_insert(0) += carried_weight;
        }

        if pair_weights.is_empty() {
            continue;
        }

        // Step 3: keep only rows maximal for their sourceIdx and their targetIdx.
        let max_by_source = max_per_key(&pair_weights, |&(s, _)| s);
        let max_by_target = max_per_key(&pair_weights, |&(_, t)| t);
        let surviving: Vec<((usize, usize), u32)> = pair_weights.into_iter().filter(|&((s, t), w)| max_by_source[&s] == w && max_by_target[&t] == w).collect();

        let mut source_counts: HashMap<usize, usize> = HashMap::new();
        let mut target_counts: HashMap<usize, usize> = HashMap::new();
        for &((s, t), _) in &surviving {
            *source_counts.entry(s).or_insert(0) += 1;
            *target_counts.entry(t).or_insert(0) += 1;
        }

        // Step 4: commit the rows that come out one-to-one; everything else
        // is a residual, carried into the next tier's working set.
        for ((s, t), w) in surviving {
            if source_counts[&s] == 1 && target_counts[&t] == 1 {
                committed.push(MatchedPair { source_idx: s, target_idx: t, weight: w });
                remaining_source.retain(|&i| i != s);
                remaining_target.retain(|&i| i != t);
            } else {
                carried.insert((s, t), w);
            }
        }

        carried.retain(|&(s, t), _| remaining_source.contains(&s) && remaining_target.contains(&t));
    }

    committed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: &str, pairs: &[(&str, &str)]) -> MatchableEntity {
        MatchableEntity {
            id: id.to_string(),
            properties: pairs.iter().map(|&(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    fn rule_type(name: &str, weight: u32, property: &str) -> IndexRuleType {
        IndexRuleType {
            name: name.to_string(),
            weight,
            seed: false,
            rules: vec![Rule {
                property: property.to_string(),
                self_match_disabled: false,
            }],
        }
    }

    #[test]
    fn unique_property_hit_commits_one_to_one() {
        let source = vec![entity("s1", &[("host-name", "alpha")]), entity("s2", &[("host-name", "beta")])];
        let target = vec![entity("t1", &[("host-name", "beta")]), entity("t2", &[("host-name", "alpha")])];

        let pairs = match_entities(&source, &target, &[rule_type("name", 10, "host-name")], false);

        assert_eq!(pairs.len(), 2);
        assert!(pairs.contains(&MatchedPair { source_idx: 0, target_idx: 1, weight: 10 }));
        assert!(pairs.contains(&MatchedPair { source_idx: 1, target_idx: 0, weight: 10 }));
    }

    #[test]
    fn ambiguous_tier_carries_residual_to_lower_weight_tier() {
        // Both source entities share "ip" with both target entities at the high-weight
        // tier (ambiguous -> residual); a lower-weight "serial" tier disambiguates.
        let source = vec![entity("s1", &[("ip", "10.0.0.1"), ("serial", "AAA")]), entity("s2", &[("ip", "10.0.0.1"), ("serial", "BBB")])];
        let target = vec![entity("t1", &[("ip", "10.0.0.1"), ("serial", "BBB")]), entity("t2", &[("ip", "10.0.0.1"), ("serial", "AAA")])];

        let rule_types = vec![rule_type("ip", 20, "ip"), rule_type("serial", 10, "serial")];
        let pairs = match_entities(&source, &target, &rule_types, false);

        assert_eq!(pairs.len(), 2);
        let by_source: HashMap<usize, usize> = pairs.iter().map(|p| (p.source_idx, p.target_idx)).collect();
        assert_eq!(by_source[&0], 1);
        assert_eq!(by_source[&1], 0);
        // Weight carries the high tier's contribution plus the disambiguating tier's.
        assert!(pairs.iter().all(|p| p.weight == 30));
    }

    #[test]
    fn self_match_suppressed_unless_self_match_mode_enabled() {
        let source = vec![entity("shared-id", &[("name", "x")])];
        let target = vec![entity("shared-id", &[("name", "x")])];
        let rule_types = vec![IndexRuleType {
            name: "name".to_string(),
            weight: 10,
            seed: false,
            rules: vec![Rule {
                property: "name".to_string(),
                self_match_disabled: true,
            }],
        }];

        assert!(match_entities(&source, &target, &rule_types, false).is_empty());
        assert_eq!(match_entities(&source, &target, &rule_types, true).len(), 1);
    }

    #[test]
    fn missing_property_on_either_side_never_hits() {
        let source = vec![entity("s1", &[])];
        let target = vec![entity("t1", &[("host-name", "alpha")])];

        assert!(match_entities(&source, &target, &[rule_type("name", 10, "host-name")], false).is_empty());
    }

    #[test]
    fn committed_pairs_are_a_partial_function_in_both_directions() {
        let source = vec![entity("s1", &[("k", "1")]), entity("s2", &[("k", "2")]), entity("s3", &[("k", "3")])];
        let target = vec![entity("t1", &[("k", "1")]), entity("t2", &[("k", "2")]), entity("t3", &[("k", "3")])];

        let pairs = match_entities(&source, &target, &[rule_type("k", 5, "k")], false);
        let mut seen_sources = std::collections::HashSet::new();
        let mut seen_targets = std::collections::HashSet::new();
        for p in &pairs {
            assert!(seen_sources.insert(p.source_idx), "source_idx {} committed twice", p.source_idx);
            assert!(seen_targets.insert(p.target_idx), "target_idx {} committed twice", p.target_idx);
        }
        assert_eq!(pairs.len(), 3);
    }
}
