use rhai::{
    Engine,
    default_limits::MAX_STRINGS_INTERNED,
    packages::{Package, StandardPackage},
};

use crate::{capture::CaptureHarness, config::ScriptConfig, plot};

/// Build the Rhai engine for one session, with output capture and the
/// plotting API wired to `harness`.
pub(crate) fn build_engine(config: &ScriptConfig, harness: &CaptureHarness) -> Engine {
    let mut engine = Engine::new_raw();
    engine.register_global_module(StandardPackage::new().as_shared_module());

    engine.set_max_strings_interned(MAX_STRINGS_INTERNED);
    engine.set_fail_on_invalid_map_property(true);

    engine.set_max_call_levels(config.max_call_levels);
    engine.set_max_expr_depths(config.max_expr_depth, config.max_function_expr_depth);

    harness.install(&mut engine);
    plot::register(&mut engine, config, harness.clone());

    engine
}
