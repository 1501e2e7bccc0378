// crates/tenant-gate-core/src/core/naming.rs
// ============================================================================
// Module: Tenant Naming
// Description: Prefix mapping and filter construction for tenant scoping.
// Purpose: Translate between tenant-visible and internally stored identity.
// Dependencies: crate::core::tenant
// ============================================================================

//! ## Overview
//! Named-singleton entities (registered models, prompts) are globally unique
//! by name, so tenancy is encoded as a `"<tenant>::"` prefix on the stored
//! name. Container entities carry tenancy as a reserved tag instead. This
//! module owns both encodings: the [`NameTransformer`] prefix mapping and the
//! tag-filter clauses injected into search queries.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::entities::Tag;
use crate::core::tenant::TenantName;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Reserved tag key recording the owning tenant on container entities.
pub const TENANT_TAG_KEY: &str = "mlflow.namespace";

/// Delimiter between the tenant prefix and the visible name.
///
/// Visible names that themselves contain the delimiter are not escaped; a
/// name beginning with another tenant's prefix would round-trip incorrectly.
/// The collision policy is intentionally left open.
pub const TENANT_NAME_DELIMITER: &str = "::";

// ============================================================================
// SECTION: Name Transformer
// ============================================================================

/// Maps between tenant-visible and internally stored names for one tenant.
///
/// # Invariants
/// - `to_internal` is idempotent; `from_internal` returns already-stripped
///   names unchanged.
/// - `from_internal(to_internal(name)) == name` for names that do not start
///   with this tenant's prefix already.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTransformer {
    /// Stored prefix, `"<tenant>::"`.
    prefix: String,
}

impl NameTransformer {
    /// Creates a transformer for the given tenant.
    #[must_use]
    pub fn new(tenant: &TenantName) -> Self {
        Self {
            prefix: format!("{tenant}{TENANT_NAME_DELIMITER}"),
        }
    }

    /// Returns the internally stored form of a visible name.
    #[must_use]
    pub fn to_internal(&self, name: &str) -> String {
        if name.starts_with(&self.prefix) {
            name.to_string()
        } else {
            format!("{}{name}", self.prefix)
        }
    }

    /// Returns the tenant-visible form of a stored name.
    #[must_use]
    pub fn from_internal<'a>(&self, name: &'a str) -> &'a str {
        name.strip_prefix(&self.prefix).unwrap_or(name)
    }

    /// Returns whether a stored name belongs to this tenant.
    #[must_use]
    pub fn owns(&self, name: &str) -> bool {
        name.starts_with(&self.prefix)
    }
}

// ============================================================================
// SECTION: Tag Injection
// ============================================================================

/// Returns whether a tag key is the reserved tenant key.
#[must_use]
pub fn is_reserved_tag_key(key: &str) -> bool {
    key == TENANT_TAG_KEY
}

/// Builds the reserved tenant tag for an entity.
#[must_use]
pub fn tenant_tag(tenant: &TenantName) -> Tag {
    Tag::new(TENANT_TAG_KEY, tenant.as_str())
}

/// Returns caller tags with the reserved key replaced by this tenant's tag.
///
/// # Invariants
/// - Exactly one reserved tag survives, carrying the active tenant's value,
///   regardless of what the caller supplied.
#[must_use]
pub fn inject_tenant_tag(tags: &[Tag], tenant: &TenantName) -> Vec<Tag> {
    let mut scoped = strip_tenant_tag(tags);
    scoped.push(tenant_tag(tenant));
    scoped
}

/// Returns caller tags with any reserved tenant key removed.
#[must_use]
pub fn strip_tenant_tag(tags: &[Tag]) -> Vec<Tag> {
    tags.iter().filter(|tag| tag.key != TENANT_TAG_KEY).cloned().collect()
}

// ============================================================================
// SECTION: Filter Construction
// ============================================================================

/// Builds the tenant-equality predicate for search filters.
#[must_use]
pub fn tenant_filter_clause(tenant: &TenantName) -> String {
    format!("tags.`{TENANT_TAG_KEY}` = '{tenant}'")
}

/// Appends the tenant predicate to a caller-supplied filter with `AND`.
///
/// The caller filter is kept first so backend error messages still point at
/// caller-authored syntax.
#[must_use]
pub fn append_tenant_filter(filter: Option<&str>, tenant: &TenantName) -> String {
    let clause = tenant_filter_clause(tenant);
    match filter {
        Some(existing) if !existing.trim().is_empty() => format!("{existing} AND {clause}"),
        _ => clause,
    }
}

/// Rewrites `name = '<visible>'` equality clauses to internal names.
///
/// Used by model-version search, where callers filter on the visible model
/// name but the backing store holds the prefixed form. Only single-quoted
/// equality on the `name` attribute is rewritten; everything else is passed
/// through byte for byte.
#[must_use]
pub fn rewrite_name_equality(filter: &str, transformer: &NameTransformer) -> String {
    let mut result = String::with_capacity(filter.len());
    let mut rest = filter;
    while let Some(start) = find_name_clause(rest) {
        let (before, clause_on) = rest.split_at(start);
        result.push_str(before);
        let Some((value, after)) = parse_quoted_value(clause_on) else {
            result.push_str(clause_on);
            return result;
        };
        result.push_str("name = '");
        result.push_str(&transformer.to_internal(value));
        result.push('\'');
        rest = after;
    }
    result.push_str(rest);
    result
}

/// Finds the byte offset of the next rewritable `name = '` clause, if any.
fn find_name_clause(filter: &str) -> Option<usize> {
    let mut search_from = 0;
    while let Some(relative) = filter[search_from..].find("name") {
        let start = search_from + relative;
        let preceded_by_word = filter[..start]
            .bytes()
            .last()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'.');
        if !preceded_by_word && parse_quoted_value(&filter[start..]).is_some() {
            return Some(start);
        }
        search_from = start + "name".len();
    }
    None
}

/// Parses `name = '<value>'` at the start of the input.
///
/// Returns the quoted value and the remainder after the closing quote.
fn parse_quoted_value(clause: &str) -> Option<(&str, &str)> {
    let after_name = clause.strip_prefix("name")?;
    let after_eq = after_name.trim_start().strip_prefix('=')?;
    let quoted = after_eq.trim_start().strip_prefix('\'')?;
    let end = quoted.find('\'')?;
    Some((&quoted[..end], &quoted[end + 1..]))
}
