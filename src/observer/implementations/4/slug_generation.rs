// Ring 4: Enrichment - URL slugs for products and travel listings
use async_trait::async_trait;
use uuid::Uuid;

use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{Observer, ObserverRing};
use crate::types::{schema, Operation};

const MAX_BASE_LEN: usize = 60;

#[derive(Default)]
pub struct SlugGeneration;

impl SlugGeneration {
    fn source_field(schema: &str) -> &'static str {
        if schema == schema::TRAVEL_LISTINGS {
            "title"
        } else {
            "name"
        }
    }
}

#[async_trait]
impl Observer for SlugGeneration {
    fn name(&self) -> &'static str {
        "SlugGeneration"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Enrichment
    }

    /// Slugs are stable once published, renames keep the old URL
    fn applies_to_operation(&self, op: Operation) -> bool {
        op == Operation::Create
    }

    fn applies_to_schema(&self, schema: &str) -> bool {
        schema == schema::PRODUCTS || schema == schema::TRAVEL_LISTINGS
    }

    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        let has_slug = ctx.record.get_str("slug").is_some_and(|s| !s.trim().is_empty());
        if has_slug {
            return Ok(());
        }

        let field = Self::source_field(ctx.schema_name);
        let source = ctx
            .record
            .get_str(field)
            .ok_or_else(|| ObserverError::field(field, "This field is required"))?;

        let id = ctx.record.id().unwrap_or_else(Uuid::new_v4);
        let slug = unique_slug(source, id);
        ctx.record.set("slug", slug);
        Ok(())
    }
}

/// Lowercase ASCII words joined by single dashes
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.len() > MAX_BASE_LEN {
        slug.truncate(MAX_BASE_LEN);
        while slug.ends_with('-') {
            slug.pop();
        }
    }
    slug
}

/// Slug plus a short id suffix so equal names never collide
pub fn unique_slug(text: &str, id: Uuid) -> String {
    let simple = id.simple().to_string();
    let suffix = &simple[..8];
    let base = slugify(text);
    if base.is_empty() {
        suffix.to_string()
    } else {
        format!("{}-{}", base, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Record;
    use serde_json::json;

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("Kangra Tea -- 250g (Organic!)"), "kangra-tea-250g-organic");
        assert_eq!(slugify("  Leading and trailing  "), "leading-and-trailing");
        assert_eq!(slugify("चाय"), "");
    }

    #[test]
    fn slugify_truncates_long_names() {
        let slug = slugify(&"word ".repeat(40));
        assert!(slug.len() <= MAX_BASE_LEN);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn unique_slug_appends_id_prefix() {
        let id = Uuid::parse_str("a1b2c3d4-0000-4000-8000-000000000000").unwrap();
        assert_eq!(unique_slug("Garam Masala", id), "garam-masala-a1b2c3d4");
        assert_eq!(unique_slug("चाय", id), "a1b2c3d4");
    }

    #[tokio::test]
    async fn listing_slug_comes_from_title() {
        let record = Record::from_json(json!({"title": "Siachen Base Camp Trek", "slug": ""})).unwrap();
        let mut ctx = ObserverContext::new(schema::TRAVEL_LISTINGS, record);
        SlugGeneration.execute(&mut ctx).await.unwrap();
        assert!(ctx.record.get_str("slug").unwrap().starts_with("siachen-base-camp-trek-"));
    }

    #[tokio::test]
    async fn explicit_slug_is_kept() {
        let record = Record::from_json(json!({"name": "Shawl", "slug": "pashmina"})).unwrap();
        let mut ctx = ObserverContext::new(schema::PRODUCTS, record);
        SlugGeneration.execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.record.get_str("slug"), Some("pashmina"));
    }
}
