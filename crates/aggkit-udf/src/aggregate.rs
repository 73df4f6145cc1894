//! `select_agg_records`: filter, group and aggregate a record stream.
//!
//! Each node folds its own records into an [`AggregateState`]; the partial
//! states are then merged and rendered once. Every slot is mergeable
//! (counts add, sums add, min/max pick) so the result does not depend on how
//! records were spread across nodes.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::cmp::Ordering;

use aggkit_core::{AggregateFunc, AggregateQuery, FieldSpec, Value};
use tracing::debug;

use crate::error::UdfError;
use crate::expr::{self, Expr, compare, numeric_add};

/// Group key used when the descriptor has no `group_by_fields`.
pub const UNGROUPED_KEY: &str = "*";
const GROUP_KEY_SEPARATOR: &str = "|";

#[derive(Debug, Clone)]
enum CompiledField {
    Bin(String),
    Aggregate { func: AggregateFunc, expr: Expr },
}

#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Projection(Value),
    Count(i64),
    Sum(Option<Value>),
    Min(Option<Value>),
    Max(Option<Value>),
}

impl Slot {
    fn empty(field: &CompiledField) -> Self {
        match field {
            CompiledField::Bin(_) => Slot::Projection(Value::Nil),
            CompiledField::Aggregate { func, .. } => match func {
                AggregateFunc::Count => Slot::Count(0),
                AggregateFunc::Sum => Slot::Sum(None),
                AggregateFunc::Min => Slot::Min(None),
                AggregateFunc::Max => Slot::Max(None),
            },
        }
    }

    fn merge(&mut self, other: Slot) {
        match (self, other) {
            (Slot::Projection(v), Slot::Projection(o)) => {
                if v.is_nil() {
                    *v = o;
                }
            }
            (Slot::Count(n), Slot::Count(o)) => *n += o,
            (Slot::Sum(acc), Slot::Sum(o)) => {
                if let Some(o) = o {
                    add_into(acc, o);
                }
            }
            (Slot::Min(acc), Slot::Min(o)) => {
                if let Some(o) = o {
                    keep_extreme(acc, o, Ordering::Less);
                }
            }
            (Slot::Max(acc), Slot::Max(o)) => {
                if let Some(o) = o {
                    keep_extreme(acc, o, Ordering::Greater);
                }
            }
            // Slots come from the same compiled descriptor, so kinds always line up.
            _ => {}
        }
    }

    fn finish(self) -> Option<Value> {
        match self {
            Slot::Projection(v) => (!v.is_nil()).then_some(v),
            Slot::Count(n) => Some(Value::Int(n)),
            Slot::Sum(v) | Slot::Min(v) | Slot::Max(v) => v,
        }
    }
}

fn add_into(acc: &mut Option<Value>, v: Value) {
    *acc = Some(match acc.take() {
        Some(a) => numeric_add(&a, &v),
        None => v,
    });
}

fn keep_extreme(acc: &mut Option<Value>, v: Value, wanted: Ordering) {
    let replace = match acc {
        Some(current) => compare(&v, current) == Some(wanted),
        None => true,
    };
    if replace {
        *acc = Some(v);
    }
}

/// Partial aggregation result: one slot vector per group key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateState {
    groups: BTreeMap<String, Vec<Slot>>,
}

impl AggregateState {
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Fold another partial state (from another node) into this one.
    pub fn merge(&mut self, other: AggregateState) {
        for (key, slots) in other.groups {
            match self.groups.entry(key) {
                Entry::Vacant(e) => {
                    e.insert(slots);
                }
                Entry::Occupied(mut e) => {
                    for (mine, theirs) in e.get_mut().iter_mut().zip(slots) {
                        mine.merge(theirs);
                    }
                }
            }
        }
    }
}

/// A compiled `select_agg_records` descriptor.
#[derive(Debug, Clone)]
pub struct Aggregation {
    filter: Option<Expr>,
    group_by: Vec<String>,
    fields: Vec<(String, CompiledField)>,
}

impl Aggregation {
    pub fn compile(query: &AggregateQuery) -> Result<Self, UdfError> {
        query.validate()?;

        let filter = query.filter.as_deref().map(expr::compile).transpose()?;
        let fields = query
            .fields
            .iter()
            .map(|(alias, spec)| {
                let field = match spec {
                    FieldSpec::Bin(bin) => CompiledField::Bin(bin.clone()),
                    FieldSpec::Aggregate(agg) => CompiledField::Aggregate {
                        func: agg.func,
                        expr: expr::compile(&agg.expr)?,
                    },
                };
                Ok((alias.clone(), field))
            })
            .collect::<Result<Vec<_>, UdfError>>()?;

        debug!(
            fields = fields.len(),
            group_by = ?query.group_by_fields,
            filtered = filter.is_some(),
            "compiled aggregation"
        );

        Ok(Self {
            filter,
            group_by: query.group_by_fields.clone(),
            fields,
        })
    }

    /// Compile from UDF call arguments; the descriptor is the first argument.
    pub fn from_args(args: &[Value]) -> Result<Self, UdfError> {
        let descriptor = args
            .first()
            .ok_or_else(|| UdfError::BadArguments("missing descriptor argument".into()))?;
        if descriptor.as_map().is_none() {
            return Err(UdfError::BadArguments(format!(
                "descriptor must be a map, got {}",
                descriptor.type_name()
            )));
        }
        let query = AggregateQuery::from_value(descriptor)?;
        Self::compile(&query)
    }

    /// The group a record falls in: its group-by values joined with `|`.
    ///
    /// Strings are quoted, so `("a|b", "c")` and `("a", "b|c")` or `1` and
    /// `"1"` land in different groups. `1` and `1.0` are the same Lua number
    /// and share one.
    pub fn group_key(&self, record: &Value) -> String {
        if self.group_by.is_empty() {
            return UNGROUPED_KEY.to_string();
        }
        let mut key = String::new();
        for (i, field) in self.group_by.iter().enumerate() {
            if i > 0 {
                key.push_str(GROUP_KEY_SEPARATOR);
            }
            push_key_part(&mut key, record.get(field).unwrap_or(&Value::Nil));
        }
        key
    }

    /// Fold one record (a map of bin name to value) into `state`.
    pub fn update(&self, state: &mut AggregateState, record: &Value) -> Result<(), UdfError> {
        if let Some(filter) = &self.filter
            && !filter.eval(record)?.is_truthy()
        {
            return Ok(());
        }

        let key = self.group_key(record);
        let slots = state
            .groups
            .entry(key)
            .or_insert_with(|| self.fields.iter().map(|(_, f)| Slot::empty(f)).collect());

        for ((alias, field), slot) in self.fields.iter().zip(slots.iter_mut()) {
            match (field, slot) {
                (CompiledField::Bin(bin), Slot::Projection(v)) => {
                    if v.is_nil() {
                        *v = record.get(bin).cloned().unwrap_or_default();
                    }
                }
                (CompiledField::Aggregate { expr, .. }, Slot::Count(n)) => {
                    if expr.eval(record)?.is_truthy() {
                        *n += 1;
                    }
                }
                (CompiledField::Aggregate { expr, .. }, Slot::Sum(acc)) => {
                    if let Some(v) = numeric(alias, expr.eval(record)?)? {
                        add_into(acc, v);
                    }
                }
                (CompiledField::Aggregate { expr, .. }, Slot::Min(acc)) => {
                    if let Some(v) = numeric(alias, expr.eval(record)?)? {
                        keep_extreme(acc, v, Ordering::Less);
                    }
                }
                (CompiledField::Aggregate { expr, .. }, Slot::Max(acc)) => {
                    if let Some(v) = numeric(alias, expr.eval(record)?)? {
                        keep_extreme(acc, v, Ordering::Greater);
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Render the merged state as `{group_key: {alias: value}}`.
    ///
    /// Aggregates that never saw a value are left out, like nil entries in a
    /// Lua table; counts are always present.
    pub fn finish(&self, state: AggregateState) -> Value {
        let groups = state
            .groups
            .into_iter()
            .map(|(key, slots)| {
                let row = self
                    .fields
                    .iter()
                    .zip(slots)
                    .filter_map(|((alias, _), slot)| slot.finish().map(|v| (alias.clone(), v)))
                    .collect::<BTreeMap<_, _>>();
                (key, Value::Map(row))
            })
            .collect();
        Value::Map(groups)
    }

    /// Aggregate a whole stream on one node.
    pub fn run<'a, I>(&self, records: I) -> Result<Value, UdfError>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut state = AggregateState::default();
        for record in records {
            self.update(&mut state, record)?;
        }
        Ok(self.finish(state))
    }
}

/// `nil` is skipped; anything else must be a number.
fn numeric(alias: &str, v: Value) -> Result<Option<Value>, UdfError> {
    if v.is_nil() {
        return Ok(None);
    }
    if !v.is_number() {
        return Err(UdfError::Runtime(format!(
            "{alias}: expected a number, got {}",
            v.type_name()
        )));
    }
    Ok(Some(v))
}

fn push_quoted(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
}

fn push_key_part(out: &mut String, value: &Value) {
    match value {
        Value::String(s) => push_quoted(out, s),
        Value::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                push_key_part(out, item);
            }
            out.push(']');
        }
        Value::Map(map) => {
            out.push('{');
            for (i, (k, v)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                push_quoted(out, k);
                out.push('=');
                push_key_part(out, v);
            }
            out.push('}');
        }
        other => out.push_str(&other.to_string()),
    }
}
