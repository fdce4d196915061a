// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

fn default_buckets_for_slow_operations() -> Vec<f64> {
    vec![
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
    ]
}

suivote_utils::metrics::define_metric_set! {
    #[namespace = "suivote"]
    /// Metrics for the Sui RPC calls made by the client.
    pub struct SuiClientMetricSet {
        #[help = "Total number of Sui RPC calls made"]
        rpc_calls_total: IntCounterVec["method", "status"],

        #[help = "Duration of Sui RPC calls in seconds"]
        rpc_call_duration_seconds: HistogramVec{
            labels: ["method", "status"],
            buckets: default_buckets_for_slow_operations()
        },
    }
}

impl SuiClientMetricSet {
    /// Records a Sui RPC call with its method, status, and duration.
    pub fn record_rpc_call(&self, method: &str, status: &str, duration: Duration) {
        self.rpc_calls_total
            .with_label_values(&[method, status])
            .inc();
        self.rpc_call_duration_seconds
            .with_label_values(&[method, status])
            .observe(duration.as_secs_f64());
    }
}

suivote_utils::metrics::define_metric_set! {
    #[namespace = "suivote"]
    /// Metrics for transaction submissions.
    pub struct SubmissionMetricSet {
        #[help = "Total number of submissions by action and outcome"]
        submissions_total: IntCounterVec["action", "outcome"],

        #[help = "Time from submission to a terminal state in seconds"]
        submission_duration_seconds: HistogramVec{
            labels: ["action"],
            buckets: default_buckets_for_slow_operations()
        },
    }
}

impl SubmissionMetricSet {
    /// Records a finished submission.
    pub fn record_submission(&self, action: &str, outcome: &str, duration: Duration) {
        self.submissions_total
            .with_label_values(&[action, outcome])
            .inc();
        self.submission_duration_seconds
            .with_label_values(&[action])
            .observe(duration.as_secs_f64());
    }
}
