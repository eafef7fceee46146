//! Dependency order tables for the storefront dataset
//!
//! Both orderings are authored by hand as a topological sort of the
//! foreign-key graph in [`FOREIGN_KEYS`] and verified by the tests below.
//! They are never computed at run time.
//!
//! The deletion list may omit tables that are never destructively cleared
//! (e.g. `store_settings`); such tables are still re-inserted.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::domain::errors::ResyncError;

/// Children before parents.
pub const DELETION_ORDER: &[&str] = &[
    "reviews",
    "payments",
    "order_items",
    "orders",
    "cart_items",
    "carts",
    "addresses",
    "coupons",
    "customers",
    "product_images",
    "product_variants",
    "products",
    "categories",
];

/// Parents before children.
pub const INSERTION_ORDER: &[&str] = &[
    "store_settings",
    "categories",
    "products",
    "product_images",
    "product_variants",
    "customers",
    "addresses",
    "coupons",
    "orders",
    "order_items",
    "payments",
    "carts",
    "cart_items",
    "reviews",
];

/// `(child, parent)` pairs: `child` holds a foreign key referencing `parent`.
pub const FOREIGN_KEYS: &[(&str, &str)] = &[
    ("products", "categories"),
    ("product_images", "products"),
    ("product_variants", "products"),
    ("addresses", "customers"),
    ("carts", "customers"),
    ("cart_items", "carts"),
    ("cart_items", "product_variants"),
    ("orders", "customers"),
    ("orders", "addresses"),
    ("orders", "coupons"),
    ("order_items", "orders"),
    ("order_items", "product_variants"),
    ("payments", "orders"),
    ("reviews", "products"),
    ("reviews", "customers"),
];

/// Which half of a run an operation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Delete,
    Insert,
}

impl Direction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::Insert => "insert",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A table together with its position in one of the two orderings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub name: String,
    pub order_index: usize,
}

/// The pair of orderings a run walks through.
///
/// Production uses [`ResyncPlan::storefront`]; tests build small plans
/// with [`ResyncPlan::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResyncPlan {
    deletion: Vec<TableSpec>,
    insertion: Vec<TableSpec>,
}

impl ResyncPlan {
    pub fn new<D, I, S>(deletion: D, insertion: I) -> Self
    where
        D: IntoIterator<Item = S>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            deletion: Self::specs(deletion),
            insertion: Self::specs(insertion),
        }
    }

    /// The hand-verified storefront schema ordering
    #[must_use]
    pub fn storefront() -> Self {
        Self::new(
            DELETION_ORDER.iter().copied(),
            INSERTION_ORDER.iter().copied(),
        )
    }

    fn specs<T, S>(names: T) -> Vec<TableSpec>
    where
        T: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names
            .into_iter()
            .enumerate()
            .map(|(order_index, name)| TableSpec {
                name: name.into(),
                order_index,
            })
            .collect()
    }

    #[must_use]
    pub fn deletion(&self) -> &[TableSpec] {
        &self.deletion
    }

    #[must_use]
    pub fn insertion(&self) -> &[TableSpec] {
        &self.insertion
    }

    #[must_use]
    pub fn tables(&self, direction: Direction) -> &[TableSpec] {
        match direction {
            Direction::Delete => &self.deletion,
            Direction::Insert => &self.insertion,
        }
    }
}

impl Default for ResyncPlan {
    fn default() -> Self {
        Self::storefront()
    }
}

/// Checks a plan against a foreign-key edge list.
///
/// Rules: no duplicates in either list, every deleted table is also
/// re-inserted, a child is deleted before its parent and a parent is
/// inserted before its child. Edges whose tables are absent from a list
/// are ignored for that list.
pub fn verify_plan(plan: &ResyncPlan, foreign_keys: &[(&str, &str)]) -> Result<(), ResyncError> {
    let deletion = index_of(plan.deletion(), "deletion")?;
    let insertion = index_of(plan.insertion(), "insertion")?;

    for table in deletion.keys() {
        if !insertion.contains_key(table) {
            return Err(ResyncError::InvalidPlan(format!(
                "table '{table}' is deleted but never re-inserted"
            )));
        }
    }

    for &(child, parent) in foreign_keys {
        if let (Some(c), Some(p)) = (deletion.get(child), deletion.get(parent)) {
            if c > p {
                return Err(ResyncError::InvalidPlan(format!(
                    "deletion order removes '{parent}' before its dependent '{child}'"
                )));
            }
        }
        if let (Some(c), Some(p)) = (insertion.get(child), insertion.get(parent)) {
            if c < p {
                return Err(ResyncError::InvalidPlan(format!(
                    "insertion order loads '{child}' before its parent '{parent}'"
                )));
            }
        }
    }

    Ok(())
}

fn index_of<'a>(
    tables: &'a [TableSpec],
    list: &str,
) -> Result<HashMap<&'a str, usize>, ResyncError> {
    let mut seen = HashSet::new();
    let mut index = HashMap::with_capacity(tables.len());
    for spec in tables {
        if !seen.insert(spec.name.as_str()) {
            return Err(ResyncError::InvalidPlan(format!(
                "table '{}' appears twice in the {list} order",
                spec.name
            )));
        }
        index.insert(spec.name.as_str(), spec.order_index);
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(list: &[&str], table: &str) -> Option<usize> {
        list.iter().position(|t| *t == table)
    }

    #[test]
    fn deletion_order_places_every_child_before_its_parent() {
        for &(child, parent) in FOREIGN_KEYS {
            let (Some(c), Some(p)) = (position(DELETION_ORDER, child), position(DELETION_ORDER, parent))
            else {
                continue;
            };
            assert!(c < p, "{child} must be deleted before {parent}");
        }
    }

    #[test]
    fn insertion_order_places_every_parent_before_its_child() {
        for &(child, parent) in FOREIGN_KEYS {
            let c = position(INSERTION_ORDER, child).expect("child is inserted");
            let p = position(INSERTION_ORDER, parent).expect("parent is inserted");
            assert!(p < c, "{parent} must be inserted before {child}");
        }
    }

    #[test]
    fn every_foreign_key_table_is_known() {
        for &(child, parent) in FOREIGN_KEYS {
            assert!(INSERTION_ORDER.contains(&child), "{child}");
            assert!(INSERTION_ORDER.contains(&parent), "{parent}");
        }
    }

    #[test]
    fn settings_table_is_inserted_but_never_wiped() {
        assert!(!DELETION_ORDER.contains(&"store_settings"));
        assert_eq!(INSERTION_ORDER.first(), Some(&"store_settings"));
    }

    #[test]
    fn storefront_plan_verifies() {
        verify_plan(&ResyncPlan::storefront(), FOREIGN_KEYS).unwrap();
    }

    #[test]
    fn order_index_follows_list_position() {
        let plan = ResyncPlan::new(["a", "b"], ["b", "a"]);
        assert_eq!(plan.deletion()[1].name, "b");
        assert_eq!(plan.deletion()[1].order_index, 1);
        assert_eq!(plan.tables(Direction::Insert)[0].name, "b");
    }

    #[test]
    fn verify_rejects_parent_deleted_first() {
        let plan = ResyncPlan::new(["parent", "child"], ["parent", "child"]);
        let err = verify_plan(&plan, &[("child", "parent")]).unwrap_err();
        assert!(err.to_string().contains("deletion order"));
    }

    #[test]
    fn verify_rejects_child_inserted_first() {
        let plan = ResyncPlan::new(["child", "parent"], ["child", "parent"]);
        let err = verify_plan(&plan, &[("child", "parent")]).unwrap_err();
        assert!(err.to_string().contains("insertion order"));
    }

    #[test]
    fn verify_rejects_duplicates_and_orphan_deletes() {
        let dup = ResyncPlan::new(["a", "a"], ["a"]);
        assert!(verify_plan(&dup, &[]).unwrap_err().to_string().contains("twice"));

        let orphan = ResyncPlan::new(["a", "b"], ["a"]);
        assert!(verify_plan(&orphan, &[]).unwrap_err().to_string().contains("never re-inserted"));
    }
}
