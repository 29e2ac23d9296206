//! Query routing and path selection.
//!
//! Routing is table-driven: an ordered list of (keyword set, target
//! database) rules is scanned against the request's normalized tokens, and
//! the first rule with a non-empty intersection wins. Strategy selection
//! uses a second table of known request shapes (partner + metric keyword
//! combinations) that can be answered from a fixed template; everything
//! else goes to the interpretation service.
//!
//! The router reads the registry only to resolve the default database. It
//! performs no I/O and holds no mutable state, so one instance can serve
//! any number of concurrent requests.

use crate::error::{GatewayError, GatewayResult};
use crate::models::{RoutingDecision, Strategy};
use crate::registry::DatabaseRegistry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use unicode_normalization::UnicodeNormalization;

/// Declared intent of an incoming request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Facility-oriented questions (pharmacies, branches, stock).
    Facilities,
    /// Catalog-oriented questions (products, pricing).
    Catalog,
    /// Partner/KPI-oriented questions (delivery partners, bookings, GMV).
    Partners,
    /// Fully open conversational questions.
    Open,
}

/// One routing rule: if any keyword appears in the request, route to `target`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRule {
    pub keywords: BTreeSet<String>,
    pub target: String,
}

/// One fixed-template shape: a request mentioning any partner keyword
/// together with any metric keyword resolves through `template`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateRule {
    pub template: String,
    pub partner_keywords: BTreeSet<String>,
    pub metric_keywords: BTreeSet<String>,
}

/// The complete, ordered rule tables the router evaluates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRules {
    pub database_rules: Vec<RoutingRule>,
    pub template_rules: Vec<TemplateRule>,
}

fn keyword_set(words: &[&str]) -> BTreeSet<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl RoutingRules {
    /// Built-in rule tables for the standard two-store deployment:
    /// `ops` (document store with live operational records) and
    /// `analytics` (relational store with business metrics).
    pub fn builtin() -> Self {
        Self {
            database_rules: vec![
                RoutingRule {
                    keywords: keyword_set(&[
                        "booking", "bookings", "order", "orders", "delivery", "deliveries",
                        "courier", "partner", "partners", "glovo", "uber", "bolt",
                    ]),
                    target: "ops".to_string(),
                },
                RoutingRule {
                    keywords: keyword_set(&[
                        "sales", "revenue", "gmv", "margin", "product", "products", "catalog",
                        "pharmacy", "pharmacies", "facility", "facilities", "stock",
                    ]),
                    target: "analytics".to_string(),
                },
            ],
            template_rules: vec![
                TemplateRule {
                    template: "partner_bookings".to_string(),
                    partner_keywords: keyword_set(&["glovo", "uber", "bolt"]),
                    metric_keywords: keyword_set(&["booking", "bookings", "order", "orders"]),
                },
                TemplateRule {
                    template: "partner_gmv".to_string(),
                    partner_keywords: keyword_set(&["glovo", "uber", "bolt"]),
                    metric_keywords: keyword_set(&["gmv", "revenue"]),
                },
            ],
        }
    }
}

/// Swappable eligibility policy for the partner template category.
///
/// Which partners qualify for the fast template path is a business rule that
/// changes independently of routing, so it is injected rather than encoded
/// in the tables.
pub trait PartnerEligibility: Send + Sync {
    fn is_eligible(&self, partner: &str) -> bool;
}

/// Default policy: every partner listed in the template tables is eligible.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllListedPartners;

impl PartnerEligibility for AllListedPartners {
    fn is_eligible(&self, _partner: &str) -> bool {
        true
    }
}

/// Eligibility restricted to an explicit tag set.
#[derive(Debug, Clone)]
pub struct TaggedPartners {
    tags: BTreeSet<String>,
}

impl TaggedPartners {
    pub fn new(tags: impl IntoIterator<Item = String>) -> Self {
        Self {
            tags: tags.into_iter().collect(),
        }
    }
}

impl PartnerEligibility for TaggedPartners {
    fn is_eligible(&self, partner: &str) -> bool {
        self.tags.contains(partner)
    }
}

/// Normalize a request into comparable tokens: lowercase, accents stripped
/// (NFD, combining marks dropped), split on non-alphanumeric boundaries.
pub fn normalize_tokens(text: &str) -> Vec<String> {
    text.nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// The router: rule tables plus the injected eligibility policy.
pub struct Router {
    rules: RoutingRules,
    eligibility: Box<dyn PartnerEligibility>,
}

impl Router {
    pub fn new(rules: RoutingRules, eligibility: Box<dyn PartnerEligibility>) -> Self {
        Self { rules, eligibility }
    }

    /// Router over the built-in tables with the default eligibility policy.
    pub fn with_builtin_rules() -> Self {
        Self::new(RoutingRules::builtin(), Box::new(AllListedPartners))
    }

    /// Choose a target database and resolution strategy for a request.
    ///
    /// Fails with a routing ambiguity when no rule matches and the registry
    /// has no default database; the caller surfaces that to the user instead
    /// of guessing.
    pub fn route(
        &self,
        text: &str,
        mode: Mode,
        registry: &DatabaseRegistry,
    ) -> GatewayResult<RoutingDecision> {
        let tokens: BTreeSet<String> = normalize_tokens(text).into_iter().collect();

        let (target, matched_signal) = match self.match_database(&tokens) {
            Some((target, keyword)) => (target, format!("keyword:{keyword}")),
            None => match registry.default_name() {
                Some(name) => (name.to_string(), "default-database".to_string()),
                None => {
                    return Err(GatewayError::routing_ambiguity(
                        "no routing rule matched and no default database is configured",
                    ));
                }
            },
        };

        let strategy = if mode == Mode::Open {
            Strategy::Interpreted
        } else {
            match self.match_template(&tokens) {
                Some((template, partner)) => {
                    tracing::debug!(template = %template, partner = %partner, "Template matched");
                    Strategy::FixedTemplate { template }
                }
                None => Strategy::Interpreted,
            }
        };

        Ok(RoutingDecision {
            target,
            strategy,
            matched_signal,
        })
    }

    /// First database rule whose keyword set intersects the tokens.
    fn match_database(&self, tokens: &BTreeSet<String>) -> Option<(String, String)> {
        self.rules.database_rules.iter().find_map(|rule| {
            rule.keywords
                .intersection(tokens)
                .next()
                .map(|kw| (rule.target.clone(), kw.clone()))
        })
    }

    /// First template rule with an eligible partner keyword and a metric
    /// keyword in the tokens.
    fn match_template(&self, tokens: &BTreeSet<String>) -> Option<(String, String)> {
        self.rules.template_rules.iter().find_map(|rule| {
            let partner = rule
                .partner_keywords
                .intersection(tokens)
                .find(|p| self.eligibility.is_eligible(p))?;
            rule.metric_keywords
                .intersection(tokens)
                .next()
                .map(|_| (rule.template.clone(), partner.clone()))
        })
    }

    /// The partner token a template rule matched on, for template
    /// instantiation. `None` when the text names no eligible partner.
    pub fn matched_partner(&self, text: &str, template: &str) -> Option<String> {
        let tokens: BTreeSet<String> = normalize_tokens(text).into_iter().collect();
        self.rules
            .template_rules
            .iter()
            .find(|rule| rule.template == template)
            .and_then(|rule| {
                rule.partner_keywords
                    .intersection(&tokens)
                    .find(|p| self.eligibility.is_eligible(p))
                    .cloned()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConnectionSettings, PermissionSet, RelationalFlavor, StoreKind};
    use crate::registry::RegistryEntry;

    fn entry(kind: StoreKind, is_default: bool) -> RegistryEntry {
        RegistryEntry {
            settings: ConnectionSettings {
                kind,
                flavor: matches!(kind, StoreKind::Relational).then_some(RelationalFlavor::MySql),
                host: "localhost".into(),
                port: 3306,
                user: "u".into(),
                password: "p".into(),
                database: "d".into(),
                socket: None,
                tls: None,
                auth_source: None,
                replica_set: None,
                options: Default::default(),
                raw_url: None,
            },
            permissions: PermissionSet::DENY_ALL,
            is_default,
        }
    }

    fn registry() -> DatabaseRegistry {
        DatabaseRegistry::new([
            ("ops".to_string(), entry(StoreKind::Document, false)),
            ("analytics".to_string(), entry(StoreKind::Relational, true)),
        ])
        .unwrap()
    }

    #[test]
    fn test_normalize_strips_accents_and_case() {
        assert_eq!(
            normalize_tokens("Réservations de Glovo, s'il vous plaît!"),
            vec!["reservations", "de", "glovo", "s", "il", "vous", "plait"]
        );
    }

    #[test]
    fn test_keyword_routes_to_document_store() {
        let router = Router::with_builtin_rules();
        let decision = router
            .route("how many bookings yesterday", Mode::Partners, &registry())
            .unwrap();
        assert_eq!(decision.target, "ops");
        assert_eq!(decision.matched_signal, "keyword:bookings");
    }

    #[test]
    fn test_keyword_routes_to_relational_store() {
        let router = Router::with_builtin_rules();
        let decision = router
            .route("total revenue per pharmacy", Mode::Facilities, &registry())
            .unwrap();
        assert_eq!(decision.target, "analytics");
    }

    #[test]
    fn test_first_match_wins_over_later_rules() {
        // "bookings" (rule 1) and "revenue" (rule 2) both appear; the
        // ordered scan must pick rule 1.
        let router = Router::with_builtin_rules();
        let decision = router
            .route("bookings revenue breakdown", Mode::Open, &registry())
            .unwrap();
        assert_eq!(decision.target, "ops");
    }

    #[test]
    fn test_no_match_falls_back_to_default() {
        let router = Router::with_builtin_rules();
        let decision = router
            .route("what is the weather", Mode::Open, &registry())
            .unwrap();
        assert_eq!(decision.target, "analytics");
        assert_eq!(decision.matched_signal, "default-database");
    }

    #[test]
    fn test_no_match_no_default_is_ambiguous() {
        let no_default = DatabaseRegistry::new([(
            "ops".to_string(),
            entry(StoreKind::Document, false),
        )])
        .unwrap();
        let router = Router::with_builtin_rules();
        let result = router.route("what is the weather", Mode::Open, &no_default);
        assert!(matches!(
            result,
            Err(GatewayError::RoutingAmbiguity { .. })
        ));
    }

    #[test]
    fn test_partner_plus_metric_selects_template() {
        let router = Router::with_builtin_rules();
        let decision = router
            .route("glovo bookings this week", Mode::Partners, &registry())
            .unwrap();
        assert_eq!(decision.target, "ops");
        assert_eq!(
            decision.strategy,
            Strategy::FixedTemplate {
                template: "partner_bookings".to_string()
            }
        );
    }

    #[test]
    fn test_open_mode_is_always_interpreted() {
        let router = Router::with_builtin_rules();
        let decision = router
            .route("glovo bookings this week", Mode::Open, &registry())
            .unwrap();
        assert_eq!(decision.strategy, Strategy::Interpreted);
    }

    #[test]
    fn test_partner_without_metric_is_interpreted() {
        let router = Router::with_builtin_rules();
        let decision = router
            .route("is glovo integration healthy", Mode::Partners, &registry())
            .unwrap();
        assert_eq!(decision.strategy, Strategy::Interpreted);
    }

    #[test]
    fn test_eligibility_policy_filters_template_partners() {
        let router = Router::new(
            RoutingRules::builtin(),
            Box::new(TaggedPartners::new(["uber".to_string()])),
        );
        let decision = router
            .route("glovo bookings this week", Mode::Partners, &registry())
            .unwrap();
        // glovo is not tagged, so the fast path does not apply.
        assert_eq!(decision.strategy, Strategy::Interpreted);

        let decision = router
            .route("uber bookings this week", Mode::Partners, &registry())
            .unwrap();
        assert!(matches!(decision.strategy, Strategy::FixedTemplate { .. }));
    }

    #[test]
    fn test_matched_partner_extraction() {
        let router = Router::with_builtin_rules();
        assert_eq!(
            router.matched_partner("Glovo bookings today", "partner_bookings"),
            Some("glovo".to_string())
        );
        assert_eq!(
            router.matched_partner("bookings today", "partner_bookings"),
            None
        );
    }
}
