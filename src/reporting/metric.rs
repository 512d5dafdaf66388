//! Metric records and the wire line format

use std::collections::BTreeMap;

/// Byte budget of one `name=value` tag
pub const MAX_TAG_LENGTH: usize = 255;

/// A single metric point
#[derive(Clone, Debug, PartialEq)]
pub struct Metric {
    pub name: String,
    pub value: f64,
    pub source: String,
    pub tags: BTreeMap<String, String>,
}

impl Metric {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            source: String::new(),
            tags: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(name.into(), value.into());
        self
    }
}

/// Stamp every metric with the cluster as source and `cluster` tag, then
/// enforce the tag budget
pub fn common(cluster_name: &str, metrics: Vec<Metric>) -> Vec<Metric> {
    metrics
        .into_iter()
        .map(|mut metric| {
            metric.source = cluster_name.to_string();
            metric
                .tags
                .insert("cluster".to_string(), cluster_name.to_string());
            for (name, value) in metric.tags.iter_mut() {
                truncate_tag_value(name, value, MAX_TAG_LENGTH);
            }
            metric
        })
        .collect()
}

/// Cut `value` so that `name=value` fits in `budget` bytes
///
/// Keeps the longest prefix that ends on a character boundary.
pub fn truncate_tag_value(name: &str, value: &mut String, budget: usize) {
    let max_value = budget.saturating_sub(name.len() + 1);
    if value.len() <= max_value {
        return;
    }
    let mut end = max_value;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    value.truncate(end);
}

fn escape(value: &str) -> String {
    value.replace('"', "\\\"")
}

/// Render a metric as a wire line
///
/// `<name> <value> source="<source>" <tag>="<value>" ...`, tags sorted by name.
pub fn format_line(metric: &Metric) -> String {
    let mut line = format!(
        "{} {} source=\"{}\"",
        metric.name,
        metric.value,
        escape(&metric.source)
    );
    for (name, value) in &metric.tags {
        line.push_str(&format!(" {}=\"{}\"", name, escape(value)));
    }
    line
}
