//! Matcher registry: loads `matchers.yaml` and resolves matcher/composite
//! names for the frame analyzer (§4.B looks predicates up by name here).
//!
//! Grounded on `ImageMatchingSettings.load_from_yaml` (simple matchers,
//! composite detections, matcher groups, loaded with `yaml.safe_load`); here
//! `serde_yaml` plays that role.

use crate::domain::frame::Frame;
use crate::error::AppError;
use crate::matcher::composite::MatchExpression;
use crate::matcher::{
    brightness::BrightnessMatcher, edge::EdgeMatcher, hash::HashMatcher, hsv::HsvMatcher,
    rgb::RgbMatcher, template::TemplateMatcher, uniform::UniformMatcher, Mask, Matcher, MatcherConfig,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct CompositeEntry {
    rule: MatchExpression,
}

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    simple_matchers: HashMap<String, MatcherConfig>,
    #[serde(default)]
    composite_detection: HashMap<String, CompositeEntry>,
    #[serde(default)]
    matcher_groups: HashMap<String, Vec<String>>,
}

pub struct MatcherRegistry {
    simple: HashMap<String, Arc<dyn Matcher>>,
    composites: HashMap<String, MatchExpression>,
    groups: HashMap<String, Vec<String>>,
}

impl MatcherRegistry {
    pub fn from_parts(
        simple: HashMap<String, Arc<dyn Matcher>>,
        composites: HashMap<String, MatchExpression>,
        groups: HashMap<String, Vec<String>>,
    ) -> MatcherRegistry {
        MatcherRegistry {
            simple,
            composites,
            groups,
        }
    }

    /// Loads `matchers.yaml`. Relative `*_path` fields in each matcher config
    /// resolve against `assets_dir` (the directory templates/masks/hashes
    /// live under).
    pub fn load(yaml_path: &Path, assets_dir: &Path) -> Result<MatcherRegistry, AppError> {
        let bytes = std::fs::read(yaml_path)
            .map_err(|e| AppError::Configuration(format!("reading {yaml_path:?}: {e}")))?;
        let raw: RawConfig = serde_yaml::from_slice(&bytes)
            .map_err(|e| AppError::Configuration(format!("parsing {yaml_path:?}: {e}")))?;

        let mut simple: HashMap<String, Arc<dyn Matcher>> = HashMap::new();
        for (name, config) in &raw.simple_matchers {
            simple.insert(name.clone(), build_matcher(config, assets_dir)?);
        }

        let composites = raw
            .composite_detection
            .into_iter()
            .map(|(name, entry)| (name, entry.rule))
            .collect();

        Ok(MatcherRegistry::from_parts(simple, composites, raw.matcher_groups))
    }

    pub fn group(&self, name: &str) -> Option<&[String]> {
        self.groups.get(name).map(|v| v.as_slice())
    }

    /// Synchronous lookup; used by callers already running on a worker
    /// thread (e.g. inside a `spawn_blocking` closure).
    pub fn is_match(&self, name: &str, frame: &Frame) -> bool {
        self.simple.get(name).is_some_and(|m| m.is_match(frame))
    }

    /// Offloads a single leaf evaluation to the blocking pool, matching
    /// §5's "CPU-bound... may be offloaded to a worker pool" guidance.
    pub async fn is_match_async(self: &Arc<Self>, name: &str, frame: Frame) -> bool {
        let registry = self.clone();
        let name = name.to_string();
        tokio::task::spawn_blocking(move || registry.is_match(&name, &frame))
            .await
            .unwrap_or(false)
    }

    pub async fn evaluate_composite(self: &Arc<Self>, name: &str, frame: &Frame) -> bool {
        match self.composites.get(name) {
            Some(expr) => expr.evaluate(self, frame).await,
            None => false,
        }
    }
}

fn resolve(assets_dir: &Path, relative: &str) -> PathBuf {
    assets_dir.join(relative)
}

fn build_matcher(config: &MatcherConfig, assets_dir: &Path) -> Result<Arc<dyn Matcher>, AppError> {
    let roi = config.roi.map(Into::into);
    let mask = config
        .mask_path
        .as_deref()
        .map(|p| Mask::load(&resolve(assets_dir, p)))
        .transpose()?;

    let matcher: Arc<dyn Matcher> = match config.kind.as_str() {
        "template" => {
            let path = config
                .template_path
                .as_deref()
                .ok_or_else(|| AppError::Configuration("template matcher missing template_path".into()))?;
            Arc::new(TemplateMatcher::load(
                &resolve(assets_dir, path),
                config.mask_path.as_deref().map(|p| resolve(assets_dir, p)).as_deref(),
                config.threshold,
                roi,
            )?)
        }
        // Source carries both `hsv` and `hsv_ratio` matcher kinds; both are
        // the same fraction-in-bounds test.
        "hsv" | "hsv_ratio" => {
            let lower = config
                .lower_bound
                .ok_or_else(|| AppError::Configuration("hsv matcher missing lower_bound".into()))?;
            let upper = config
                .upper_bound
                .ok_or_else(|| AppError::Configuration("hsv matcher missing upper_bound".into()))?;
            Arc::new(HsvMatcher::new(lower, upper, config.threshold, roi, mask))
        }
        "rgb" => {
            let target = config
                .rgb
                .ok_or_else(|| AppError::Configuration("rgb matcher missing rgb".into()))?;
            Arc::new(RgbMatcher::new(target, config.threshold, roi, mask))
        }
        "hash" => {
            let path = config
                .hash_path
                .as_deref()
                .ok_or_else(|| AppError::Configuration("hash matcher missing hash_path".into()))?;
            Arc::new(HashMatcher::load(&resolve(assets_dir, path), roi)?)
        }
        "uniform" => {
            let hue_threshold = config
                .hue_threshold
                .ok_or_else(|| AppError::Configuration("uniform matcher missing hue_threshold".into()))?;
            Arc::new(UniformMatcher::new(hue_threshold, roi, mask))
        }
        "brightness" => {
            let max_value = config
                .max_value
                .ok_or_else(|| AppError::Configuration("brightness matcher missing max_value".into()))?;
            Arc::new(BrightnessMatcher::new(max_value, roi, mask))
        }
        "edge" => {
            let path = config
                .template_path
                .as_deref()
                .ok_or_else(|| AppError::Configuration("edge matcher missing template_path".into()))?;
            Arc::new(EdgeMatcher::load(&resolve(assets_dir, path), config.max_value.unwrap_or(config.threshold), roi)?)
        }
        other => return Err(AppError::Configuration(format!("unknown matcher type: {other}"))),
    };
    Ok(matcher)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_matcher_group_returns_none() {
        let registry = MatcherRegistry::from_parts(HashMap::new(), HashMap::new(), HashMap::new());
        assert!(registry.group("missing").is_none());
    }
}
