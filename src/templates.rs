//! Fixed query templates.
//!
//! The fast path for request shapes the system already knows: a template is
//! a pre-built, parameterized candidate, so nothing derived from free text
//! reaches the query body except the single bound parameter. Template
//! output still goes through validation and the permission gate like any
//! other candidate.

use crate::models::QueryCandidate;
use serde_json::json;

/// Catalog of known templates, keyed by the ids the routing tables emit.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateCatalog;

impl TemplateCatalog {
    pub fn new() -> Self {
        Self
    }

    /// Instantiate a template for one partner against `target`.
    pub fn instantiate(
        &self,
        template: &str,
        target: &str,
        partner: &str,
    ) -> Option<QueryCandidate> {
        match template {
            "partner_bookings" => Some(QueryCandidate::pipeline(
                target,
                "bookings",
                vec![
                    json!({"$match": {"partner": partner}}),
                    json!({"$group": {"_id": "$status", "count": {"$sum": 1}}}),
                    json!({"$sort": {"count": -1}}),
                ],
            )),
            "partner_gmv" => Some(QueryCandidate::pipeline(
                target,
                "bookings",
                vec![
                    json!({"$match": {"partner": partner, "status": "completed"}}),
                    json!({"$group": {"_id": "$partner", "gmv": {"$sum": "$total_amount"}}}),
                ],
            )),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QueryBody;
    use crate::validator::{DocumentValidatorConfig, validate_pipeline};

    #[test]
    fn test_partner_bookings_template() {
        let candidate = TemplateCatalog::new()
            .instantiate("partner_bookings", "ops", "glovo")
            .unwrap();
        assert_eq!(candidate.target, "ops");
        match &candidate.body {
            QueryBody::Pipeline { collection, stages } => {
                assert_eq!(collection, "bookings");
                assert_eq!(stages[0]["$match"]["partner"], "glovo");
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_template_is_none() {
        assert!(
            TemplateCatalog::new()
                .instantiate("partner_churn", "ops", "glovo")
                .is_none()
        );
    }

    #[test]
    fn test_templates_pass_validation() {
        let catalog = TemplateCatalog::new();
        let config = DocumentValidatorConfig::default();
        for template in ["partner_bookings", "partner_gmv"] {
            let candidate = catalog.instantiate(template, "ops", "glovo").unwrap();
            let QueryBody::Pipeline { collection, stages } = &candidate.body else {
                panic!("template should be a pipeline");
            };
            let result = validate_pipeline(stages, collection, &config);
            assert!(result.is_safe(), "template {template}: {:?}", result.blocked);
        }
    }
}
