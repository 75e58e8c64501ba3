//! Pure catalog shaping: manifest normalization, package bucketing, and
//! manifest derivation from package labels.

use std::collections::HashSet;
use std::sync::LazyLock;

use emberstone_core::{
    Category, CategoryGroup, CategoryManifest, CategorizedCatalog, Package, PackageId,
    UNCATEGORIZED_ID,
};
use rand::Rng;
use regex::Regex;
use serde_json::Value;
use tracing::{info, warn};

const ALL_PACKAGES_NAME: &str = "All Packages";
const ALL_PACKAGES_DESCRIPTION: &str = "All available packages";
const OTHER_PACKAGES_NAME: &str = "Other Packages";
const OTHER_PACKAGES_DESCRIPTION: &str = "Additional packages";
const UNNAMED_CATEGORY: &str = "Unnamed Category";
const GENERATED_ID_LEN: usize = 9;

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid regex"));
static NON_SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9-]").expect("Invalid regex"));

// =============================================================================
// Manifest normalization
// =============================================================================

/// Normalize a raw `store-categories.json` document.
///
/// Anything other than an object with a `categories` array yields no
/// categories. Entries get defaults for missing fields and are stably sorted
/// by `order`.
#[must_use]
pub fn normalize_categories(document: &Value) -> Vec<Category> {
    let Some(entries) = document.get("categories").and_then(Value::as_array) else {
        warn!("Invalid categories format in store-categories.json");
        return Vec::new();
    };

    if entries.is_empty() {
        info!("No categories found in store-categories.json");
        return Vec::new();
    }

    let mut categories: Vec<Category> = entries.iter().map(normalize_category).collect();
    categories.sort_by(|a, b| a.order.total_cmp(&b.order));
    categories
}

fn normalize_category(entry: &Value) -> Category {
    let id = entry
        .get("id")
        .and_then(non_empty_label)
        .unwrap_or_else(generated_category_id);
    let name = entry
        .get("name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNNAMED_CATEGORY)
        .to_string();
    let description = entry
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let order = entry.get("order").and_then(Value::as_f64).unwrap_or(0.0);

    Category {
        id,
        name,
        description,
        packages: entry.get("packages").map(package_refs).unwrap_or_default(),
        order,
    }
}

/// String ids pass through; non-zero numeric ids are stringified.
fn non_empty_label(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64().is_some_and(|f| f != 0.0) => {
            PackageId::from_json(value).map(PackageId::into_inner)
        }
        _ => None,
    }
}

/// `category-` followed by nine random base36 characters.
fn generated_category_id() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..GENERATED_ID_LEN)
        .map(|_| char::from_digit(rng.random_range(0..36), 36).unwrap_or('0'))
        .collect();
    format!("category-{suffix}")
}

/// Resolve a category's package references to ids.
///
/// Accepts an array of ids (strings or numbers), an array of objects with an
/// `id`, or an object keyed by package id. Duplicates keep their first
/// position; entries that name no id are skipped.
#[must_use]
pub fn package_refs(refs: &Value) -> Vec<PackageId> {
    let candidates: Vec<PackageId> = match refs {
        Value::Array(items) => items.iter().filter_map(PackageId::from_json).collect(),
        Value::Object(map) => map.keys().map(|key| PackageId::new(key.as_str())).collect(),
        _ => Vec::new(),
    };

    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect()
}

// =============================================================================
// Categorization
// =============================================================================

/// Sort packages into display buckets.
///
/// - No categories: a single `uncategorized` bucket holding every package.
/// - Otherwise one bucket per category id plus `uncategorized` for packages
///   no category lists. A package listed by several categories appears in
///   each of them.
/// - Empty named buckets are dropped.
/// - A lone named bucket with nothing uncategorized becomes "All Packages".
#[must_use]
pub fn categorize_packages(packages: &[Package], categories: &[Category]) -> CategorizedCatalog {
    if categories.is_empty() {
        return CategorizedCatalog::new(vec![CategoryGroup {
            id: UNCATEGORIZED_ID.to_string(),
            name: ALL_PACKAGES_NAME.to_string(),
            description: ALL_PACKAGES_DESCRIPTION.to_string(),
            order: None,
            packages: packages.to_vec(),
        }]);
    }

    let mut buckets: Vec<(CategoryGroup, HashSet<&PackageId>)> = Vec::new();
    // Ids a manifest category named after the catch-all sends into it.
    let mut folded: HashSet<&PackageId> = HashSet::new();
    for category in categories {
        if category.id == UNCATEGORIZED_ID {
            folded = category.packages.iter().collect();
            continue;
        }

        let group = CategoryGroup {
            id: category.id.clone(),
            name: category.name.clone(),
            description: category.description.clone(),
            order: Some(category.order),
            packages: Vec::new(),
        };
        let ids = category.packages.iter().collect();

        // A repeated id takes over the slot of the earlier entry.
        match buckets.iter_mut().find(|(g, _)| g.id == category.id) {
            Some(slot) => *slot = (group, ids),
            None => buckets.push((group, ids)),
        }
    }

    let mut uncategorized = CategoryGroup {
        id: UNCATEGORIZED_ID.to_string(),
        name: OTHER_PACKAGES_NAME.to_string(),
        description: OTHER_PACKAGES_DESCRIPTION.to_string(),
        order: None,
        packages: Vec::new(),
    };

    for package in packages {
        if package.id.is_empty() {
            warn!(package = ?package.fields, "Package missing ID");
            continue;
        }

        let mut claimed = false;
        for (group, ids) in &mut buckets {
            if ids.contains(&package.id) {
                group.packages.push(package.clone());
                claimed = true;
            }
        }
        if !claimed || folded.contains(&package.id) {
            uncategorized.packages.push(package.clone());
        }
    }

    let mut groups: Vec<CategoryGroup> = buckets
        .into_iter()
        .map(|(group, _)| group)
        .filter(|group| !group.packages.is_empty())
        .collect();

    if groups.len() == 1 && uncategorized.packages.is_empty() {
        if let Some(only) = groups.first_mut() {
            ALL_PACKAGES_NAME.clone_into(&mut only.name);
            ALL_PACKAGES_DESCRIPTION.clone_into(&mut only.description);
        }
        return CategorizedCatalog::new(groups);
    }

    groups.push(uncategorized);
    CategorizedCatalog::new(groups)
}

// =============================================================================
// Default manifest
// =============================================================================

/// Build a manifest from the packages' own `category` labels.
///
/// Categories appear in first-seen order; packages without a string label
/// are left out.
#[must_use]
pub fn create_default_categories(packages: &[Package]) -> CategoryManifest {
    let mut labels: Vec<&str> = Vec::new();
    for label in packages.iter().filter_map(Package::category) {
        if !labels.contains(&label) {
            labels.push(label);
        }
    }

    let categories = labels
        .into_iter()
        .enumerate()
        .map(|(index, label)| {
            let slug = slugify(label);
            #[allow(clippy::cast_precision_loss)] // Category counts stay tiny
            let order = index as f64;

            Category {
                id: if slug.is_empty() {
                    format!("category-{index}")
                } else {
                    slug
                },
                name: label.to_string(),
                description: format!("{label} for the Minecraft server"),
                packages: packages
                    .iter()
                    .filter(|p| p.category() == Some(label))
                    .map(|p| p.id.clone())
                    .collect(),
                order,
            }
        })
        .collect();

    CategoryManifest { categories }
}

/// Lowercase, whitespace runs to `-`, anything outside `[a-z0-9-]` dropped.
fn slugify(label: &str) -> String {
    let lower = label.to_lowercase();
    let dashed = WHITESPACE_RE.replace_all(&lower, "-");
    NON_SLUG_RE.replace_all(&dashed, "").into_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn category(id: &str, packages: &[&str]) -> Category {
        Category {
            id: id.to_string(),
            name: id.to_uppercase(),
            description: String::new(),
            packages: packages.iter().map(|p| PackageId::from(*p)).collect(),
            order: 0.0,
        }
    }

    fn ids(group: &CategoryGroup) -> Vec<&str> {
        group.packages.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_normalize_fills_defaults_and_sorts() {
        let doc = json!({
            "categories": [
                { "id": "boosts", "name": "Game Boosts", "packages": [3, "4"], "order": 2 },
                { "name": "", "order": "first" },
                { "id": "vip", "description": "Ranks", "packages": [{ "id": 1 }], "order": 1 }
            ]
        });

        let categories = normalize_categories(&doc);
        let ids: Vec<&str> = categories.iter().map(|c| c.id.as_str()).collect();

        assert_eq!(categories.len(), 3);
        // Non-numeric order counts as 0 and sorts first.
        assert!(ids[0].starts_with("category-"));
        assert_eq!(ids[0].len(), "category-".len() + GENERATED_ID_LEN);
        assert_eq!(categories[0].name, UNNAMED_CATEGORY);
        assert_eq!(ids[1..], ["vip", "boosts"]);
        assert_eq!(categories[1].description, "Ranks");
        assert_eq!(categories[2].packages, vec![PackageId::from("3"), PackageId::from("4")]);
    }

    #[test]
    fn test_normalize_equal_order_keeps_manifest_order() {
        let doc = json!({ "categories": [{ "id": "b" }, { "id": "a" }, { "id": "c" }] });
        let ids: Vec<String> = normalize_categories(&doc).into_iter().map(|c| c.id).collect();
        assert_eq!(ids, ["b", "a", "c"]);
    }

    #[test]
    fn test_normalize_rejects_bad_documents() {
        assert!(normalize_categories(&json!([])).is_empty());
        assert!(normalize_categories(&json!({ "categories": "vip" })).is_empty());
        assert!(normalize_categories(&json!({ "categories": [] })).is_empty());
    }

    #[test]
    fn test_generated_ids_are_base36() {
        let id = generated_category_id();
        let suffix = id.strip_prefix("category-").unwrap();
        assert!(suffix.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn test_package_refs_formats() {
        assert_eq!(
            package_refs(&json!([1, "2", { "id": 3 }, 1])),
            vec![PackageId::from("1"), PackageId::from("2"), PackageId::from("3")]
        );
        assert_eq!(
            package_refs(&json!({ "10": true, "11": { "name": "x" } })),
            vec![PackageId::from("10"), PackageId::from("11")]
        );
        assert!(package_refs(&json!("1,2")).is_empty());
    }

    #[test]
    fn test_no_categories_yields_all_packages() {
        let packages = vec![Package::new("1"), Package::new("2")];
        let catalog = categorize_packages(&packages, &[]);

        assert_eq!(catalog.len(), 1);
        let bucket = catalog.get(UNCATEGORIZED_ID).unwrap();
        assert_eq!(bucket.name, ALL_PACKAGES_NAME);
        assert_eq!(bucket.description, ALL_PACKAGES_DESCRIPTION);
        assert_eq!(ids(bucket), ["1", "2"]);
    }

    #[test]
    fn test_package_in_two_categories_appears_in_both() {
        let packages = vec![Package::new("1"), Package::new("2"), Package::new("3")];
        let categories = vec![category("vip", &["1", "2"]), category("boosts", &["2"])];

        let catalog = categorize_packages(&packages, &categories);

        assert_eq!(ids(catalog.get("vip").unwrap()), ["1", "2"]);
        assert_eq!(ids(catalog.get("boosts").unwrap()), ["2"]);
        let other = catalog.get(UNCATEGORIZED_ID).unwrap();
        assert_eq!(other.name, OTHER_PACKAGES_NAME);
        assert_eq!(ids(other), ["3"]);
        assert!(catalog.groups().last().unwrap().is_uncategorized());
    }

    #[test]
    fn test_single_category_collapses() {
        let packages = vec![Package::new("1"), Package::new("2")];
        let categories = vec![category("vip", &["1", "2"]), category("empty", &["9"])];

        let catalog = categorize_packages(&packages, &categories);

        assert_eq!(catalog.len(), 1);
        let only = catalog.get("vip").unwrap();
        assert_eq!(only.name, ALL_PACKAGES_NAME);
        assert_eq!(only.description, ALL_PACKAGES_DESCRIPTION);
        assert!(catalog.get(UNCATEGORIZED_ID).is_none());
    }

    #[test]
    fn test_empty_categories_removed_but_uncategorized_kept() {
        let catalog = categorize_packages(&[], &[category("vip", &["1"])]);

        assert_eq!(catalog.len(), 1);
        assert!(catalog.get("vip").is_none());
        assert!(catalog.get(UNCATEGORIZED_ID).unwrap().packages.is_empty());
    }

    #[test]
    fn test_packages_without_id_skipped() {
        let packages = vec![Package::default().with_field("name", "ghost"), Package::new("1")];
        let catalog = categorize_packages(&packages, &[category("vip", &["2"])]);

        assert_eq!(ids(catalog.get(UNCATEGORIZED_ID).unwrap()), ["1"]);
    }

    #[test]
    fn test_duplicate_category_id_replaces_in_place() {
        let packages = vec![Package::new("1"), Package::new("2"), Package::new("3")];
        let mut replacement = category("vip", &["3"]);
        replacement.name = "VIP Ranks".to_string();
        let categories = vec![
            category("vip", &["1"]),
            category("boosts", &["2"]),
            replacement,
        ];

        let catalog = categorize_packages(&packages, &categories);
        let order: Vec<&str> = catalog.groups().iter().map(|g| g.id.as_str()).collect();

        assert_eq!(order, ["vip", "boosts", UNCATEGORIZED_ID]);
        assert_eq!(catalog.get("vip").unwrap().name, "VIP Ranks");
        assert_eq!(ids(catalog.get(UNCATEGORIZED_ID).unwrap()), ["1"]);
    }

    #[test]
    fn test_manifest_uncategorized_folds_into_catch_all() {
        let packages = vec![Package::new("1"), Package::new("2"), Package::new("3")];
        let categories = vec![
            category("vip", &["1", "2"]),
            category(UNCATEGORIZED_ID, &["2"]),
        ];

        let catalog = categorize_packages(&packages, &categories);
        let order: Vec<&str> = catalog.groups().iter().map(|g| g.id.as_str()).collect();

        assert_eq!(order, ["vip", UNCATEGORIZED_ID]);
        let other = catalog.get(UNCATEGORIZED_ID).unwrap();
        assert_eq!(other.name, OTHER_PACKAGES_NAME);
        assert_eq!(ids(other), ["2", "3"]);
        assert_eq!(ids(catalog.get("vip").unwrap()), ["1", "2"]);
    }

    #[test]
    fn test_create_default_categories() {
        let packages = vec![
            Package::new("1").with_field("category", "VIP Ranks"),
            Package::new("2").with_field("category", "Game  Boosts!"),
            Package::new("3").with_field("category", "VIP Ranks"),
            Package::new("4"),
            Package::new("5").with_field("category", "???"),
        ];

        let manifest = create_default_categories(&packages);
        let ids: Vec<&str> = manifest.categories.iter().map(|c| c.id.as_str()).collect();

        assert_eq!(ids, ["vip-ranks", "game-boosts", "category-2"]);
        let vip = &manifest.categories[0];
        assert_eq!(vip.description, "VIP Ranks for the Minecraft server");
        assert_eq!(vip.packages, vec![PackageId::from("1"), PackageId::from("3")]);
        assert!((manifest.categories[2].order - 2.0).abs() < f64::EPSILON);
    }
}
