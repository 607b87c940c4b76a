//! Staples flat, scope-tagged records into a quarter / week / day tree and
//! folds sparse branches into their parent.

use crate::errors::{ScopeError, ScopeResult};
use crate::navigator;
use crate::time_scope::{Granularity, TimeScope};
use chrono::NaiveDateTime;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const DEFAULT_WEEK_PROMOTION_THRESHOLD: usize = 10;
pub const DEFAULT_QUARTER_PROMOTION_THRESHOLD: usize = 17;
pub const DEFAULT_RECORDS_KEY: &str = "notes";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StaplerConfig {
    /// A week whose subtree holds at most this many records is folded into
    /// a flat list.
    pub week_promotion_threshold: usize,
    /// Same rule for quarters, applied after the weeks were settled.
    pub quarter_promotion_threshold: usize,
    /// Key naming a node's own records in serialized output.
    pub records_key: String,
}

impl Default for StaplerConfig {
    fn default() -> Self {
        Self {
            week_promotion_threshold: DEFAULT_WEEK_PROMOTION_THRESHOLD,
            quarter_promotion_threshold: DEFAULT_QUARTER_PROMOTION_THRESHOLD,
            records_key: DEFAULT_RECORDS_KEY.to_string(),
        }
    }
}

impl StaplerConfig {
    pub fn from_path(path: &Path) -> ScopeResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = match path.extension().and_then(|value| value.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            Some("yaml" | "yml") => serde_yaml::from_str(&content)?,
            _ => {
                return Err(ScopeError::Config(format!(
                    "unsupported stapler config file '{}': expected .json, .yaml or .yml",
                    path.to_string_lossy()
                )))
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ScopeResult<()> {
        if self.records_key.trim().is_empty() {
            return Err(ScopeError::Config("recordsKey must not be empty".to_string()));
        }
        Ok(())
    }

    fn threshold(&self, granularity: Granularity) -> Option<usize> {
        match granularity {
            Granularity::Day => None,
            Granularity::Week => Some(self.week_promotion_threshold),
            Granularity::Quarter => Some(self.quarter_promotion_threshold),
        }
    }
}

/// Where a record says it lives: a raw scope id, a precise timestamp, or both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeSource {
    pub scope: Option<String>,
    pub instant: Option<NaiveDateTime>,
}

impl ScopeSource {
    pub fn scope(scope: impl Into<String>) -> Self {
        Self {
            scope: Some(scope.into()),
            instant: None,
        }
    }

    pub fn instant(instant: NaiveDateTime) -> Self {
        Self {
            scope: None,
            instant: Some(instant),
        }
    }

    /// The scope a record is placed at. A week or quarter id is narrowed to
    /// the day of `instant` when that day is one of its descendants; a day
    /// owned by a neighbouring quarter leaves the record on the coarse scope.
    pub fn resolve(&self) -> Result<TimeScope, String> {
        let raw = self.scope.as_deref().filter(|value| !value.is_empty());
        match (raw, self.instant) {
            (Some(raw), instant) => {
                let scope = TimeScope::parse(raw).map_err(|error| error.to_string())?;
                let Some(instant) = instant.filter(|_| scope.granularity() != Granularity::Day) else {
                    return Ok(scope);
                };
                let day = TimeScope::from_datetime(instant, Granularity::Day).map_err(|error| error.to_string())?;
                if navigator::lineage(&day).contains(&scope) {
                    Ok(day)
                } else {
                    Ok(scope)
                }
            }
            (None, Some(instant)) => {
                TimeScope::from_datetime(instant, Granularity::Day).map_err(|error| error.to_string())
            }
            (None, None) => Err("record carries neither a scope nor a timestamp".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementWarning {
    /// Position of the record in the input sequence.
    pub index: usize,
    pub scope: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct ScopeNode<R> {
    records: Vec<R>,
    children: BTreeMap<TimeScope, ScopeNode<R>>,
}

impl<R> ScopeNode<R> {
    /// Records placed directly at this scope, or folded into it.
    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn children(&self) -> &BTreeMap<TimeScope, ScopeNode<R>> {
        &self.children
    }

    pub fn child(&self, scope: &TimeScope) -> Option<&ScopeNode<R>> {
        self.children.get(scope)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn total_records(&self) -> usize {
        self.records.len()
            + self
                .children
                .values()
                .map(ScopeNode::total_records)
                .sum::<usize>()
    }
}

#[derive(Debug, Clone)]
pub struct ScopeTree<R> {
    roots: BTreeMap<TimeScope, ScopeNode<R>>,
    warnings: Vec<PlacementWarning>,
    records_key: String,
}

impl<R> ScopeTree<R> {
    pub fn roots(&self) -> &BTreeMap<TimeScope, ScopeNode<R>> {
        &self.roots
    }

    pub fn into_roots(self) -> BTreeMap<TimeScope, ScopeNode<R>> {
        self.roots
    }

    pub fn warnings(&self) -> &[PlacementWarning] {
        &self.warnings
    }

    pub fn records_key(&self) -> &str {
        &self.records_key
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn total_records(&self) -> usize {
        self.roots.values().map(ScopeNode::total_records).sum()
    }

    /// Looks up the node for `scope` anywhere in the tree.
    pub fn node(&self, scope: &TimeScope) -> Option<&ScopeNode<R>> {
        let lineage = navigator::lineage(scope);
        self.roots.iter().find_map(|(root_scope, root)| {
            let depth = lineage.iter().position(|step| step == root_scope)?;
            lineage[..depth]
                .iter()
                .rev()
                .try_fold(root, |node, step| node.child(step))
        })
    }
}

impl<R: Serialize> ScopeTree<R> {
    pub fn to_json(&self) -> ScopeResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

struct NodeView<'t, R> {
    node: &'t ScopeNode<R>,
    records_key: &'t str,
}

impl<R: Serialize> Serialize for NodeView<'_, R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let own = usize::from(!self.node.records.is_empty());
        let mut map = serializer.serialize_map(Some(own + self.node.children.len()))?;
        if !self.node.records.is_empty() {
            map.serialize_entry(self.records_key, &self.node.records)?;
        }
        for (scope, child) in &self.node.children {
            map.serialize_entry(
                scope.as_str(),
                &NodeView {
                    node: child,
                    records_key: self.records_key,
                },
            )?;
        }
        map.end()
    }
}

impl<R: Serialize> Serialize for ScopeTree<R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.roots.len()))?;
        for (scope, node) in &self.roots {
            map.serialize_entry(
                scope.as_str(),
                &NodeView {
                    node,
                    records_key: &self.records_key,
                },
            )?;
        }
        map.end()
    }
}

struct Entry<R, K> {
    scope: TimeScope,
    key: K,
    record: R,
}

struct Draft<R, K> {
    entries: Vec<Entry<R, K>>,
    children: BTreeMap<TimeScope, Draft<R, K>>,
}

impl<R, K> Default for Draft<R, K> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            children: BTreeMap::new(),
        }
    }
}

impl<R, K: Ord> Draft<R, K> {
    fn total(&self) -> usize {
        self.entries.len() + self.children.values().map(Draft::total).sum::<usize>()
    }

    fn sort(&mut self) {
        self.entries
            .sort_by(|a, b| a.scope.cmp(&b.scope).then_with(|| a.key.cmp(&b.key)));
        for child in self.children.values_mut() {
            child.sort();
        }
    }

    /// Own entries followed by every descendant's, children in scope order.
    fn flatten_into(self, out: &mut Vec<Entry<R, K>>) {
        out.extend(self.entries);
        for (_, child) in self.children {
            child.flatten_into(out);
        }
    }

    fn settle(&mut self, scope: &TimeScope, config: &StaplerConfig) -> ScopeResult<()> {
        for (child_scope, child) in self.children.iter_mut() {
            child.settle(child_scope, config)?;
        }

        let total = self.total();
        if total == 0 {
            tracing::error!(scope = %scope, "stapled node holds no records");
            return Err(ScopeError::Invariant(format!("scope {} holds no records", scope)));
        }

        let Some(threshold) = config.threshold(scope.granularity()) else {
            return Ok(());
        };
        if self.children.is_empty() || total > threshold {
            return Ok(());
        }

        tracing::debug!(scope = %scope, total, threshold, "folding sparse scope into its parent list");
        let children = std::mem::take(&mut self.children);
        for (_, child) in children {
            child.flatten_into(&mut self.entries);
        }
        Ok(())
    }

    fn finish(self, scope: &TimeScope) -> ScopeResult<ScopeNode<R>> {
        if self.entries.is_empty() && self.children.is_empty() {
            return Err(ScopeError::Invariant(format!(
                "scope {} was created without records",
                scope
            )));
        }
        let mut children = BTreeMap::new();
        for (child_scope, child) in self.children {
            let node = child.finish(&child_scope)?;
            children.insert(child_scope, node);
        }
        Ok(ScopeNode {
            records: self.entries.into_iter().map(|entry| entry.record).collect(),
            children,
        })
    }
}

type Locator<'a, R> = Box<dyn Fn(&R) -> ScopeSource + 'a>;
type SortKey<'a, R, K> = Box<dyn Fn(&R) -> K + 'a>;
type RecordFilter<'a, R> = Box<dyn Fn(&R) -> bool + 'a>;

/// Builds scope trees from records.
///
/// `locate` reports where a record lives, `sort_key` orders records that
/// share a scope (usually a fine-grained timestamp), and the optional filter
/// drops records before placement.
pub struct Stapler<'a, R, K> {
    config: StaplerConfig,
    locate: Locator<'a, R>,
    sort_key: SortKey<'a, R, K>,
    filter: Option<RecordFilter<'a, R>>,
}

impl<'a, R, K: Ord> Stapler<'a, R, K> {
    pub fn new(
        config: StaplerConfig,
        locate: impl Fn(&R) -> ScopeSource + 'a,
        sort_key: impl Fn(&R) -> K + 'a,
    ) -> Self {
        Self {
            config,
            locate: Box::new(locate),
            sort_key: Box::new(sort_key),
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: impl Fn(&R) -> bool + 'a) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    pub fn config(&self) -> &StaplerConfig {
        &self.config
    }

    /// Places every record under its quarter, then settles the whole tree.
    pub fn add_everything(&self, records: impl IntoIterator<Item = R>) -> ScopeResult<ScopeTree<R>> {
        self.staple(records, None)
    }

    /// Places only records belonging to one of `scopes`; each requested
    /// scope becomes a root. A record joins the first requested scope that
    /// owns it.
    pub fn add_scoped(
        &self,
        records: impl IntoIterator<Item = R>,
        scopes: &[TimeScope],
    ) -> ScopeResult<ScopeTree<R>> {
        let mut requested: Vec<TimeScope> = Vec::with_capacity(scopes.len());
        for scope in scopes {
            if !requested.contains(scope) {
                requested.push(scope.clone());
            }
        }
        self.staple(records, Some(&requested))
    }

    fn staple(
        &self,
        records: impl IntoIterator<Item = R>,
        requested: Option<&[TimeScope]>,
    ) -> ScopeResult<ScopeTree<R>> {
        self.config.validate()?;

        let mut roots: BTreeMap<TimeScope, Draft<R, K>> = BTreeMap::new();
        if let Some(requested) = requested {
            for scope in requested {
                roots.insert(scope.clone(), Draft::default());
            }
        }

        let mut warnings = Vec::new();
        let mut outside = 0usize;
        for (index, record) in records.into_iter().enumerate() {
            if let Some(filter) = self.filter.as_ref() {
                if !filter(&record) {
                    continue;
                }
            }

            let source = (self.locate)(&record);
            let placement = match source.resolve() {
                Ok(scope) => scope,
                Err(reason) => {
                    tracing::warn!(index, scope = ?source.scope, reason = %reason, "skipping record with unresolvable scope");
                    warnings.push(PlacementWarning {
                        index,
                        scope: source.scope,
                        reason,
                    });
                    continue;
                }
            };

            let lineage = navigator::lineage(&placement);
            let root_depth = match requested {
                None => lineage.len() - 1,
                Some(requested) => {
                    let found = requested
                        .iter()
                        .find_map(|root| lineage.iter().position(|step| step == root));
                    match found {
                        Some(depth) => depth,
                        None => {
                            outside += 1;
                            continue;
                        }
                    }
                }
            };

            let mut node = roots.entry(lineage[root_depth].clone()).or_default();
            for step in lineage[..root_depth].iter().rev() {
                node = node.children.entry(step.clone()).or_default();
            }
            node.entries.push(Entry {
                key: (self.sort_key)(&record),
                scope: placement,
                record,
            });
        }

        if !warnings.is_empty() {
            tracing::warn!(skipped = warnings.len(), "records skipped while stapling");
        }
        if outside > 0 {
            tracing::debug!(outside, "records outside the requested scopes");
        }

        // Requested scopes that received nothing are not materialized.
        roots.retain(|_, draft| draft.total() > 0);

        let mut finished = BTreeMap::new();
        for (scope, mut draft) in roots {
            draft.sort();
            draft.settle(&scope, &self.config)?;
            let node = draft.finish(&scope)?;
            finished.insert(scope, node);
        }

        Ok(ScopeTree {
            roots: finished,
            warnings,
            records_key: self.config.records_key.clone(),
        })
    }
}
