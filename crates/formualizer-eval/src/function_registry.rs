//! Global function registry: the same `DashMap` + `Lazy` shape as a
//! tree-walking evaluator's name-keyed registry, extended with a second
//! axis (stable numeric index) since `Token::Operator`'s `FuncRef` can
//! name its callee either way.

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::function::Function;
use crate::traits::FunctionProvider;

static BY_NAME: Lazy<DashMap<String, Arc<dyn Function>>> = Lazy::new(DashMap::new);
static BY_INDEX: Lazy<DashMap<u32, Arc<dyn Function>>> = Lazy::new(DashMap::new);

fn norm(name: &str) -> String {
    name.to_ascii_uppercase()
}

/// Register a built-in under its name only; it has no stable index and
/// can only be reached through `Token::Operator(.., FuncRef::ByName)`.
pub fn register(f: Arc<dyn Function>) {
    BY_NAME.insert(norm(f.name()), f);
}

/// Register a built-in under both its name and a stable numeric index
/// (the form a compiled token stream uses for compactness).
pub fn register_with_index(index: u32, f: Arc<dyn Function>) {
    BY_NAME.insert(norm(f.name()), f.clone());
    BY_INDEX.insert(index, f);
}

pub fn get_by_name(name: &str) -> Option<Arc<dyn Function>> {
    crate::builtins::load_builtins();
    BY_NAME.get(&norm(name)).map(|v| Arc::clone(v.value()))
}

pub fn get_by_index(index: u32) -> Option<Arc<dyn Function>> {
    crate::builtins::load_builtins();
    BY_INDEX.get(&index).map(|v| Arc::clone(v.value()))
}

/// Every name currently registered in the global registry, for a host
/// that wants to list what it can call without probing name by name.
pub fn registered_names() -> Vec<String> {
    crate::builtins::load_builtins();
    BY_NAME.iter().map(|e| e.key().clone()).collect()
}

/// A reference catalog of the Excel function surface, standing in for a
/// full built-in library so `WorkbookEvaluator::not_supported_function_names`
/// has a real universe to diff `registered_names()` against rather than
/// always returning empty. Includes a handful of Analysis ToolPak add-in
/// names (`XIRR`, `ISOWEEKNUM`, ...) alongside core-library names, treating
/// the supported surface as a union of built-in function sets and add-in
/// sets.
pub const REFERENCE_FUNCTION_CATALOG: &[&str] = &[
    "SUM", "IF", "CHOOSE", "ISBLANK", "AND", "OR", "NOT", "SUMIF", "SUMIFS", "COUNT", "COUNTA",
    "COUNTIF", "COUNTIFS", "AVERAGE", "AVERAGEIF", "AVERAGEIFS", "MIN", "MAX", "VLOOKUP",
    "HLOOKUP", "INDEX", "MATCH", "OFFSET", "INDIRECT", "CONCATENATE", "TEXT", "TRIM", "LEFT",
    "RIGHT", "MID", "LEN", "UPPER", "LOWER", "ROUND", "ROUNDUP", "ROUNDDOWN", "ABS", "SQRT",
    "MOD", "RAND", "NOW", "TODAY", "DATE", "YEAR", "MONTH", "DAY", "ISNUMBER", "ISTEXT",
    "ISERROR", "IFERROR", "IFNA", "NA", "XIRR", "XNPV", "ISOWEEKNUM", "NETWORKDAYS.INTL",
    "WORKDAY.INTL", "YEARFRAC", "ACCRINT", "BESSELI", "BESSELJ", "CONVERT", "EDATE", "EOMONTH",
];

/// Complement of `registered_names()` within `REFERENCE_FUNCTION_CATALOG`:
/// names a caller might reasonably expect (per the reference catalog) but
/// this evaluator has no implementation registered for.
pub fn not_supported_names() -> Vec<String> {
    let registered: std::collections::HashSet<String> =
        registered_names().into_iter().map(|n| n.to_ascii_uppercase()).collect();
    REFERENCE_FUNCTION_CATALOG
        .iter()
        .map(|n| n.to_string())
        .filter(|n| !registered.contains(n.as_str()))
        .collect()
}

/// The global registry, exposed as a `FunctionProvider` so it can sit at
/// the head (or tail) of an `AggregatingFinder` chain.
pub struct GlobalRegistry;

impl FunctionProvider for GlobalRegistry {
    fn get_function_by_name(&self, name: &str) -> Option<Arc<dyn Function>> {
        get_by_name(name)
    }

    fn get_function_by_index(&self, index: u32) -> Option<Arc<dyn Function>> {
        get_by_index(index)
    }
}

/// Tries a chain of child finders in order, first hit wins. A host
/// attaches its own UDF/add-in providers ahead of (or behind) the
/// built-in `GlobalRegistry` to extend the function surface without
/// forking it.
pub struct AggregatingFinder {
    chain: Vec<Arc<dyn FunctionProvider>>,
}

impl AggregatingFinder {
    pub fn new() -> Self {
        Self { chain: Vec::new() }
    }

    pub fn with(mut self, provider: Arc<dyn FunctionProvider>) -> Self {
        self.chain.push(provider);
        self
    }

    pub fn push(&mut self, provider: Arc<dyn FunctionProvider>) {
        self.chain.push(provider);
    }
}

impl Default for AggregatingFinder {
    fn default() -> Self {
        Self::new().with(Arc::new(GlobalRegistry))
    }
}

impl FunctionProvider for AggregatingFinder {
    fn get_function_by_name(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.chain.iter().find_map(|p| p.get_function_by_name(name))
    }

    fn get_function_by_index(&self, index: u32) -> Option<Arc<dyn Function>> {
        self.chain.iter().find_map(|p| p.get_function_by_index(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins;

    #[test]
    fn builtins_resolve_by_name_case_insensitively() {
        builtins::load_builtins();
        let f = get_by_name("sum").expect("SUM registered");
        assert_eq!(f.name(), "SUM");
    }

    #[test]
    fn aggregating_finder_falls_through_to_global_registry() {
        builtins::load_builtins();
        let finder = AggregatingFinder::default();
        assert!(finder.get_function_by_name("AND").is_some());
        assert!(finder.get_function_by_name("NOT_A_REAL_FUNCTION").is_none());
    }
}
