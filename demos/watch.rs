//! Watch Example - three consumers sharing one resize watch
//!
//! Resize the terminal while this runs:
//! - the raw consumer prints every change
//! - the column consumer waits until resizing pauses for 200ms
//! - the breakpoint consumer only prints when the bucket changes
//!
//! Run with: cargo run --example watch

use std::time::Duration;

use spark_signals::effect;
use spark_viewport::{
    runtime, use_viewport_sizes, Dimension, Sizes, Viewport, ViewportConfig, ViewportInput,
};

fn breakpoint(vp: &Viewport) -> &'static str {
    match vp.width {
        0..=60 => "narrow",
        61..=120 => "regular",
        _ => "wide",
    }
}

fn main() -> spark_viewport::Result<()> {
    println!("=== spark-viewport Watch Example ===\n");
    println!("Resize the terminal (runs for 30 seconds)\n");

    let raw = use_viewport_sizes(());
    let columns = use_viewport_sizes(
        ViewportConfig::new()
            .dimension(Dimension::Width)
            .debounce_ms(200),
    );
    let buckets = use_viewport_sizes(ViewportInput::hasher(breakpoint));

    if let Sizes::Both(width, height, _) = raw.sizes() {
        println!("start: {width}x{height}");
    }

    let raw_state = raw.signal();
    let _raw_effect = effect(move || {
        let vp = raw_state.get();
        println!("raw:        {}x{}", vp.width, vp.height);
    });

    let column_state = columns.signal();
    let _column_effect = effect(move || {
        println!("columns:    {} (settled)", column_state.get().width);
    });

    let bucket_signature = buckets.signature_signal();
    let _bucket_effect = effect(move || {
        if let Some(name) = bucket_signature
            .get()
            .as_ref()
            .and_then(|sig| sig.downcast_ref::<&'static str>())
        {
            println!("breakpoint: {name}");
        }
    });

    runtime::run_for(Duration::from_secs(30))?;

    println!("\nDone.");
    Ok(())
}
