//! Invalidation cascades as a lookup table.
//!
//! Each `(Entity, Mutation)` pair maps to the key pattern templates that a
//! write of that kind can make stale. Templates use `{id}`, `{item}` and
//! `{user}` placeholders filled from a [`CascadeContext`]; a placeholder with
//! no value renders as `*`, widening the sweep rather than missing a key.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Entity {
    Item,
    Claim,
    Report,
    Feedback,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mutation {
    Create,
    Update,
    Delete,
    StatusChange,
}

/// Identifiers known at the mutation site.
#[derive(Debug, Clone, Default)]
pub struct CascadeContext {
    /// Id of the mutated entity
    pub id: Option<String>,
    /// Related item (claims, reports)
    pub item: Option<String>,
    /// Related user (owner, claimant)
    pub user: Option<String>,
}

impl CascadeContext {
    pub fn for_id(id: impl ToString) -> Self {
        Self {
            id: Some(id.to_string()),
            ..Self::default()
        }
    }

    pub fn with_item(mut self, item: impl ToString) -> Self {
        self.item = Some(item.to_string());
        self
    }

    pub fn with_user(mut self, user: impl ToString) -> Self {
        self.user = Some(user.to_string());
        self
    }
}

const ITEM_CREATE: &[&str] = &["items:list:*", "user:{user}:items:*"];
const ITEM_UPDATE: &[&str] = &["items:list:*", "item:{id}", "user:{user}:items:*"];
const ITEM_DELETE: &[&str] = &[
    "items:list:*",
    "item:{id}",
    "item:{id}:claims:*",
    "user:{user}:items:*",
    "claims:list:*",
];
const CLAIM_CREATE: &[&str] = &[
    "claims:list:*",
    "item:{item}",
    "item:{item}:claims:*",
    "user:{user}:claims:*",
];
const CLAIM_CHANGE: &[&str] = &[
    "claims:list:*",
    "claim:{id}",
    "item:{item}",
    "item:{item}:claims:*",
    "items:list:*",
    "user:{user}:claims:*",
];
const REPORT_ANY: &[&str] = &["reports:list:*", "report:{id}"];
const FEEDBACK_ANY: &[&str] = &["feedback:list:*", "feedback:{id}"];
const USER_CREATE: &[&str] = &["users:list:*"];
const USER_CHANGE: &[&str] = &["users:list:*", "user:{id}", "user:{id}:*"];

/// Pattern templates for a mutation.
pub fn templates(entity: Entity, mutation: Mutation) -> &'static [&'static str] {
    use Entity::*;
    use Mutation::*;
    match (entity, mutation) {
        (Item, Create) => ITEM_CREATE,
        (Item, Update | StatusChange) => ITEM_UPDATE,
        (Item, Delete) => ITEM_DELETE,
        (Claim, Create) => CLAIM_CREATE,
        (Claim, Update | StatusChange | Delete) => CLAIM_CHANGE,
        (Report, _) => REPORT_ANY,
        (Feedback, _) => FEEDBACK_ANY,
        (User, Create) => USER_CREATE,
        (User, Update | StatusChange | Delete) => USER_CHANGE,
    }
}

/// Concrete patterns for a mutation, deduplicated, in table order.
pub fn patterns(entity: Entity, mutation: Mutation, ctx: &CascadeContext) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for template in templates(entity, mutation) {
        let rendered = render(template, ctx);
        if !out.contains(&rendered) {
            out.push(rendered);
        }
    }
    out
}

fn render(template: &str, ctx: &CascadeContext) -> String {
    let fill = |v: &Option<String>| -> String {
        v.as_deref().map(escape_glob).unwrap_or_else(|| "*".to_string())
    };
    template
        .replace("{id}", &fill(&ctx.id))
        .replace("{item}", &fill(&ctx.item))
        .replace("{user}", &fill(&ctx.user))
}

/// Escape glob metacharacters so an id is matched literally.
pub fn escape_glob(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_status_change_reaches_claimant_and_item() {
        let ctx = CascadeContext::for_id("c1").with_item("i9").with_user("u3");
        let got = patterns(Entity::Claim, Mutation::StatusChange, &ctx);
        assert_eq!(
            got,
            vec![
                "claims:list:*",
                "claim:c1",
                "item:i9",
                "item:i9:claims:*",
                "items:list:*",
                "user:u3:claims:*",
            ]
        );
    }

    #[test]
    fn missing_placeholders_widen_to_wildcards() {
        let got = patterns(Entity::Item, Mutation::Update, &CascadeContext::for_id("42"));
        assert_eq!(got, vec!["items:list:*", "item:42", "user:*:items:*"]);
    }

    #[test]
    fn item_delete_includes_detail_list_and_relations() {
        let ctx = CascadeContext::for_id("42").with_user("u1");
        let got = patterns(Entity::Item, Mutation::Delete, &ctx);
        assert!(got.contains(&"items:list:*".to_string()));
        assert!(got.contains(&"item:42".to_string()));
        assert!(got.contains(&"item:42:claims:*".to_string()));
        assert!(got.contains(&"user:u1:items:*".to_string()));
    }

    #[test]
    fn every_pair_has_a_list_pattern() {
        let entities = [
            Entity::Item,
            Entity::Claim,
            Entity::Report,
            Entity::Feedback,
            Entity::User,
        ];
        let mutations = [
            Mutation::Create,
            Mutation::Update,
            Mutation::Delete,
            Mutation::StatusChange,
        ];
        for entity in entities {
            for mutation in mutations {
                assert!(
                    templates(entity, mutation)
                        .iter()
                        .any(|t| t.contains(":list:")),
                    "{entity:?}/{mutation:?} never clears a list view"
                );
            }
        }
    }

    #[test]
    fn ids_with_glob_characters_are_escaped() {
        assert_eq!(escape_glob("a*b?"), r"a\*b\?");
        let got = patterns(Entity::Report, Mutation::Delete, &CascadeContext::for_id("x*"));
        assert_eq!(got[1], r"report:x\*");
    }
}
