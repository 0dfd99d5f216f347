// SPDX-License-Identifier: Apache-2.0 OR MIT
//! OpenTelemetry counters, histograms and spans for parse and render.
//!
//! Recording is off until [`enable`] is called. Without the `telemetry`
//! feature every function is a no-op.
#![cfg_attr(not(feature = "telemetry"), allow(dead_code))]

#[cfg(feature = "telemetry")]
mod otel {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::OnceLock;
    use std::time::Duration;

    use opentelemetry::global;
    use opentelemetry::metrics::{Counter, Histogram};
    use opentelemetry::trace::{Span, SpanKind, Tracer};
    use opentelemetry::KeyValue;

    const METER_NAME: &str = "vortex_tl_engine";
    const TRACER_NAME: &str = "vortex_tl_engine";

    static ENABLED: AtomicBool = AtomicBool::new(false);
    static HANDLES: OnceLock<Handles> = OnceLock::new();

    struct Handles {
        tracer: global::BoxedTracer,
        parse_hist: Histogram<f64>,
        render_hist: Histogram<f64>,
        parse_counter: Counter<u64>,
        render_counter: Counter<u64>,
        directive_counter: Counter<u64>,
    }

    impl Handles {
        fn new() -> Self {
            let meter = global::meter(METER_NAME);
            Self {
                tracer: global::tracer(TRACER_NAME),
                parse_hist: meter
                    .f64_histogram("vortex.parse.duration_ms")
                    .with_description("Parse duration in milliseconds")
                    .init(),
                render_hist: meter
                    .f64_histogram("vortex.render.duration_ms")
                    .with_description("Render duration in milliseconds")
                    .init(),
                parse_counter: meter
                    .u64_counter("vortex.parse.count")
                    .with_description("Number of template parses")
                    .init(),
                render_counter: meter
                    .u64_counter("vortex.render.count")
                    .with_description("Number of template renders")
                    .init(),
                directive_counter: meter
                    .u64_counter("vortex.directive.count")
                    .with_description("Number of directives dispatched by the parser")
                    .init(),
            }
        }
    }

    fn handles() -> &'static Handles {
        HANDLES.get_or_init(Handles::new)
    }

    /// Starts recording.
    pub fn enable() {
        ENABLED.store(true, Ordering::Relaxed);
    }

    /// Stops recording.
    pub fn disable() {
        ENABLED.store(false, Ordering::Relaxed);
    }

    fn enabled() -> bool {
        ENABLED.load(Ordering::Relaxed)
    }

    fn record_phase(
        phase: &'static str,
        counter: &Counter<u64>,
        hist: &Histogram<f64>,
        template: &str,
        template_len: usize,
        duration: Duration,
        success: bool,
    ) {
        let hs = handles();
        let duration_ms = duration.as_secs_f64() * 1_000.0;
        let attrs = [
            KeyValue::new("template.name", template.to_string()),
            KeyValue::new("template.length", template_len as i64),
            KeyValue::new("success", success),
        ];
        counter.add(1, &attrs);
        hist.record(duration_ms, &attrs);
        let mut span = hs
            .tracer
            .span_builder(format!("Template::{phase}"))
            .with_kind(SpanKind::Internal)
            .start(&hs.tracer);
        for attr in attrs {
            span.set_attribute(attr);
        }
        span.set_attribute(KeyValue::new("duration_ms", duration_ms));
        span.end();
    }

    /// Records one parse of `template`.
    pub fn record_parse(template: &str, template_len: usize, duration: Duration, success: bool) {
        if !enabled() {
            return;
        }
        let hs = handles();
        record_phase(
            "parse",
            &hs.parse_counter,
            &hs.parse_hist,
            template,
            template_len,
            duration,
            success,
        );
    }

    /// Records one render of `template`.
    pub fn record_render(template: &str, template_len: usize, duration: Duration, success: bool) {
        if !enabled() {
            return;
        }
        let hs = handles();
        record_phase(
            "render",
            &hs.render_counter,
            &hs.render_hist,
            template,
            template_len,
            duration,
            success,
        );
    }

    /// Counts one dispatch of directive `name`.
    pub fn record_directive(name: &str, success: bool) {
        if !enabled() {
            return;
        }
        let attrs = [
            KeyValue::new("directive.name", name.to_string()),
            KeyValue::new("directive.success", success),
        ];
        handles().directive_counter.add(1, &attrs);
    }
}

#[cfg(not(feature = "telemetry"))]
mod otel {
    use std::time::Duration;

    /// Starts recording.
    pub fn enable() {}
    /// Stops recording.
    pub fn disable() {}
    /// Records one parse of `template`.
    pub fn record_parse(_template: &str, _template_len: usize, _duration: Duration, _success: bool) {}
    /// Records one render of `template`.
    pub fn record_render(
        _template: &str,
        _template_len: usize,
        _duration: Duration,
        _success: bool,
    ) {
    }
    /// Counts one dispatch of directive `name`.
    pub fn record_directive(_name: &str, _success: bool) {}
}

pub use otel::{disable, enable, record_directive, record_parse, record_render};
