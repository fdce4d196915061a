// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Prometheus helpers: a registry that tolerates repeated registration and a macro to declare
//! groups of metrics.

use std::{
    any::Any,
    collections::HashMap,
    sync::{Arc, Mutex},
};

use prometheus::core::Collector;

/// Errors returned by [`Registry::get_or_register`].
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    /// A collector with the same ID exists but has a different Rust type.
    #[error("a collector with the same ID was already registered with a different type")]
    InconsistentType,
    /// Some, but not all, of the collector's metrics are already registered.
    #[error("at least one metric of the collector is already registered")]
    MetricsOverlap,
    /// Any other error of the underlying registry.
    #[error(transparent)]
    Prometheus(prometheus::Error),
}

/// Wraps a [`prometheus::Registry`] and hands out the existing collector when the same collector
/// is registered twice, which happens when a client is rebuilt after switching networks.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    inner: prometheus::Registry,
    collectors_by_id: Arc<Mutex<HashMap<u64, Box<dyn Any + Send>>>>,
}

impl Registry {
    /// Wraps the provided registry.
    pub fn new(inner: prometheus::Registry) -> Self {
        Self {
            inner,
            collectors_by_id: Default::default(),
        }
    }

    /// Registers `collector`, or returns the equivalent collector registered earlier.
    #[must_use = "the returned collector may differ from the one passed in"]
    pub fn get_or_register<T>(&self, collector: T) -> Result<T, RegistrationError>
    where
        T: Collector + Send + Clone + 'static,
    {
        let collector_id = Self::collector_id(&collector);
        let mut collectors_by_id = self
            .collectors_by_id
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match self.inner.register(Box::new(collector.clone())) {
            Ok(()) => {
                collectors_by_id.insert(collector_id, Box::new(collector.clone()));
                Ok(collector)
            }
            Err(prometheus::Error::AlreadyReg) => collectors_by_id
                .get(&collector_id)
                .ok_or(RegistrationError::MetricsOverlap)?
                .downcast_ref::<T>()
                .cloned()
                .ok_or(RegistrationError::InconsistentType),
            Err(other) => Err(RegistrationError::Prometheus(other)),
        }
    }

    /// Returns the wrapped registry, e.g., for exporting.
    pub fn inner(&self) -> &prometheus::Registry {
        &self.inner
    }

    fn collector_id<T: Collector>(collector: &T) -> u64 {
        collector
            .desc()
            .into_iter()
            .fold(0u64, |id, desc| id.wrapping_add(desc.id))
    }
}

/// Declares a struct holding a set of prometheus metrics registered under a namespace.
///
/// ```ignore
/// suivote_utils::define_metric_set! {
///     #[namespace = "suivote"]
///     /// Metrics of a component.
///     pub struct ComponentMetrics {
///         #[help = "Number of calls"]
///         calls_total: IntCounterVec["method"],
///         #[help = "Call latency"]
///         call_duration_seconds: HistogramVec{labels: ["method"], buckets: vec![0.1, 1.0]},
///     }
/// }
/// ```
#[macro_export]
macro_rules! define_metric_set {
    (
        #[namespace = $namespace:literal]
        $(#[$outer:meta])*
        $vis:vis struct $name:ident {
            $(
                #[help = $help_str:literal]
                $field_name:ident: $field_type:ident $field_def:tt
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone)]
        $vis struct $name {
            $(
                #[doc = $help_str]
                pub $field_name: ::prometheus::$field_type,
            )*
        }

        impl $name {
            /// The namespace of the metrics in this set.
            pub const NAMESPACE: &'static str = $namespace;

            /// Creates the metric set and registers it on `registry`.
            ///
            /// # Panics
            ///
            /// Panics if a metric with the same name but a different shape is already registered.
            pub fn new(registry: &$crate::metrics::Registry) -> Self {
                Self { $(
                    $field_name: {
                        let opts = ::prometheus::Opts::new(stringify!($field_name), $help_str)
                            .namespace($namespace);
                        let metric = $crate::create_metric!($field_type, opts, $field_def);
                        registry.get_or_register(metric)
                            .expect("metrics defined at compile time must be valid")
                    },
                )* }
            }
        }
    };
}

pub use define_metric_set;

/// Creates a single metric for [`define_metric_set`].
#[macro_export]
macro_rules! create_metric {
    ($field_type:ident, $opts:expr, []) => {{
        ::prometheus::$field_type::with_opts($opts.into())
            .expect("this must be called with valid metrics type and options")
    }};
    (HistogramVec, $opts:expr, {labels: $label_names:expr, buckets: $buckets:expr $(,)?}) => {{
        let mut opts: ::prometheus::HistogramOpts = $opts.into();
        opts.buckets = $buckets.into();
        ::prometheus::HistogramVec::new(opts, &$label_names)
            .expect("this must be called with valid metrics type and options")
    }};
    ($field_type:ident, $opts:expr, $label_names:expr) => {{
        ::prometheus::$field_type::new($opts.into(), &$label_names)
            .expect("this must be called with valid metrics type and options")
    }};
}

pub use create_metric;

#[cfg(test)]
mod tests {
    use prometheus::{Gauge, IntCounter};

    use super::*;

    define_metric_set! {
        #[namespace = "test"]
        /// Metrics used in the tests.
        struct TestMetrics {
            #[help = "Counts things"]
            things_total: IntCounterVec["kind"],
            #[help = "Measures things"]
            thing_duration_seconds: HistogramVec{labels: ["kind"], buckets: vec![0.5, 1.0]},
        }
    }

    #[test]
    fn repeated_registration_returns_the_same_collector() -> Result<(), RegistrationError> {
        let registry = Registry::default();
        let first = registry.get_or_register(
            IntCounter::new("my_counter", "a counter").map_err(RegistrationError::Prometheus)?,
        )?;
        let second = registry.get_or_register(
            IntCounter::new("my_counter", "a counter").map_err(RegistrationError::Prometheus)?,
        )?;

        first.inc();
        assert_eq!(second.get(), 1);
        Ok(())
    }

    #[test]
    fn same_name_with_other_type_is_rejected() -> Result<(), RegistrationError> {
        let registry = Registry::default();
        let _ = registry.get_or_register(
            IntCounter::new("my_metric", "a metric").map_err(RegistrationError::Prometheus)?,
        )?;

        let result = registry.get_or_register(
            Gauge::new("my_metric", "a metric").map_err(RegistrationError::Prometheus)?,
        );
        assert!(matches!(result, Err(RegistrationError::InconsistentType)));
        Ok(())
    }

    #[test]
    fn metric_sets_can_be_created_twice_on_one_registry() {
        let registry = Registry::default();
        let first = TestMetrics::new(&registry);
        let second = TestMetrics::new(&registry);

        first.things_total.with_label_values(&["vote"]).inc();
        second
            .thing_duration_seconds
            .with_label_values(&["vote"])
            .observe(0.2);
        assert_eq!(second.things_total.with_label_values(&["vote"]).get(), 1);
        assert_eq!(TestMetrics::NAMESPACE, "test");
    }
}
