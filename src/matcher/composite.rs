//! Composite matcher expressions: `and`/`or`/`not` trees over named simple
//! matchers, evaluated with `and`/`or` branches run concurrently since each
//! leaf may be a CPU-bound image comparison (§4.A).
//!
//! Grounded on `shared/config/image_matching.py`'s `MatchExpression.evaluate`
//! (`asyncio.gather` over branches); here concurrency comes from spawning
//! each branch as its own task and `futures::future::join_all`, per the
//! ambient-stack note on offloading CPU-bound matcher calls.

use crate::matcher::registry::MatcherRegistry;
use futures::future::{join_all, BoxFuture, FutureExt};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
pub struct MatchExpression {
    pub matcher: Option<String>,
    #[serde(rename = "not")]
    pub not_: Option<Box<MatchExpression>>,
    #[serde(rename = "and")]
    pub and_: Option<Vec<MatchExpression>>,
    #[serde(rename = "or")]
    pub or_: Option<Vec<MatchExpression>>,
}

impl MatchExpression {
    pub fn leaf(name: impl Into<String>) -> MatchExpression {
        MatchExpression {
            matcher: Some(name.into()),
            not_: None,
            and_: None,
            or_: None,
        }
    }

    pub fn not(expr: MatchExpression) -> MatchExpression {
        MatchExpression {
            matcher: None,
            not_: Some(Box::new(expr)),
            and_: None,
            or_: None,
        }
    }

    pub fn and(exprs: Vec<MatchExpression>) -> MatchExpression {
        MatchExpression {
            matcher: None,
            not_: None,
            and_: Some(exprs),
            or_: None,
        }
    }

    pub fn or(exprs: Vec<MatchExpression>) -> MatchExpression {
        MatchExpression {
            matcher: None,
            not_: None,
            and_: None,
            or_: Some(exprs),
        }
    }

    /// Evaluates the expression against `frame` using `registry` to resolve
    /// leaf matcher names. Boxed because the recursion through `and`/`or`
    /// branches can't be expressed as a plain `async fn`.
    pub fn evaluate<'a>(&'a self, registry: &'a Arc<MatcherRegistry>, frame: &'a crate::domain::frame::Frame) -> BoxFuture<'a, bool> {
        async move {
            if let Some(name) = &self.matcher {
                return registry.is_match_async(name, frame.clone()).await;
            }
            if let Some(inner) = &self.not_ {
                return !inner.evaluate(registry, frame).await;
            }
            if let Some(list) = &self.and_ {
                let futures = list.iter().map(|e| e.evaluate(registry, frame));
                let results = join_all(futures).await;
                return results.into_iter().all(|b| b);
            }
            if let Some(list) = &self.or_ {
                let futures = list.iter().map(|e| e.evaluate(registry, frame));
                let results = join_all(futures).await;
                return results.into_iter().any(|b| b);
            }
            false
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::frame::Frame;
    use crate::matcher::{brightness::BrightnessMatcher, Matcher};
    use std::collections::HashMap;

    fn solid_frame(bgr: (u8, u8, u8)) -> Frame {
        Frame::from_bgr(vec![bgr.0, bgr.1, bgr.2].repeat(4), 2, 2)
    }

    #[tokio::test]
    async fn and_requires_every_branch() {
        let mut simple: HashMap<String, Arc<dyn Matcher>> = HashMap::new();
        simple.insert("dark".into(), Arc::new(BrightnessMatcher::new(10.0, None, None)));
        simple.insert("bright".into(), Arc::new(BrightnessMatcher::new(300.0, None, None)));
        let registry = Arc::new(MatcherRegistry::from_parts(simple, HashMap::new(), HashMap::new()));

        let frame = solid_frame((5, 5, 5));
        let expr = MatchExpression::and(vec![MatchExpression::leaf("dark"), MatchExpression::leaf("bright")]);
        assert!(expr.evaluate(&registry, &frame).await);
    }

    #[tokio::test]
    async fn not_inverts_leaf_result() {
        let mut simple: HashMap<String, Arc<dyn Matcher>> = HashMap::new();
        simple.insert("dark".into(), Arc::new(BrightnessMatcher::new(10.0, None, None)));
        let registry = Arc::new(MatcherRegistry::from_parts(simple, HashMap::new(), HashMap::new()));

        let frame = solid_frame((250, 250, 250));
        let expr = MatchExpression::not(MatchExpression::leaf("dark"));
        assert!(expr.evaluate(&registry, &frame).await);
    }
}
