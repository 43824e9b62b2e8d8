use std::fmt;

/// Prometheus metric type (spec 3, 4.A).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Gauge,
    Counter,
    Info,
    StateSet,
    Histogram,
    Unknown,
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MetricType::Gauge => "gauge",
            MetricType::Counter => "counter",
            MetricType::Info => "info",
            MetricType::StateSet => "stateset",
            MetricType::Histogram => "histogram",
            MetricType::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// One sample a family's generator contributes for a single object. `label_values`
/// must line up positionally with the owning family's `label_keys`. `dynamic_labels`
/// carries labels that vary per-sample rather than per-family: a histogram bucket's
/// `le` bound, or the fully dynamic key/value pairs of a `*_labels`/`*_annotations`/
/// `*_owner` family (spec 4.C, 9). `name_suffix` distinguishes a histogram's
/// `_bucket`/`_sum`/`_count` triple; it is empty for every other metric type.
#[derive(Debug, Clone)]
pub struct Sample {
    pub name_suffix: &'static str,
    pub label_values: Vec<String>,
    pub dynamic_labels: Vec<(String, String)>,
    pub value: f64,
}

impl Sample {
    pub fn new(label_values: Vec<String>, value: f64) -> Sample {
        Sample { name_suffix: "", label_values, dynamic_labels: vec![], value }
    }

    pub fn with_suffix(mut self, suffix: &'static str) -> Sample {
        self.name_suffix = suffix;
        self
    }

    pub fn with_extra_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Sample {
        self.dynamic_labels.push((key.into(), value.into()));
        self
    }

    pub fn with_dynamic(mut self, labels: Vec<(String, String)>) -> Sample {
        self.dynamic_labels = labels;
        self
    }
}

type GenerateFn<T> = dyn Fn(&T) -> Vec<Sample> + Send + Sync;

/// Immutable description of one named metric family plus its generator function
/// (spec 3, 4.A). Generators are required to be pure with respect to the input
/// object: no I/O, no hidden state, no clock reads beyond a timestamp field already
/// present on the object, since results are cached verbatim at event time rather
/// than recomputed at scrape time.
pub struct Family<T> {
    pub name: String,
    pub help: String,
    pub metric_type: MetricType,
    pub label_keys: Vec<String>,
    generate: Box<GenerateFn<T>>,
}

impl<T> Family<T> {
    pub fn new(
        name: impl Into<String>,
        help: impl Into<String>,
        metric_type: MetricType,
        label_keys: Vec<String>,
        generate: impl Fn(&T) -> Vec<Sample> + Send + Sync + 'static,
    ) -> Family<T> {
        Family { name: name.into(), help: help.into(), metric_type, label_keys, generate: Box::new(generate) }
    }

    /// Invokes the generator, dropping any sample whose label_values length
    /// doesn't match label_keys (spec 7: a label-values length mismatch is a
    /// per-object extraction error, not a panic).
    pub fn generate(&self, obj: &T) -> Vec<Sample> {
        (self.generate)(obj)
            .into_iter()
            .filter(|s| s.label_values.len() == self.label_keys.len())
            .collect()
    }
}
