//! Batch semantics across the unit sequence.

use scriptroom_rhai::{ExecutionEngine, ScriptConfig, split_units};

/// Script whose `n`th unit (1-based) raises, with every unit bumping a counter.
fn script_failing_at(units: usize, failing: usize) -> String {
    let mut script = String::from("counter = 0;\n");
    for i in 1..=units {
        if i == failing {
            script.push_str(&format!("throw \"unit {i} failed\";\n"));
        } else {
            script.push_str("counter += 1;\n");
        }
    }
    script
}

#[test]
fn test_first_fault_bounds_result_count() {
    for failing in 1..=5 {
        let mut engine = ExecutionEngine::new(ScriptConfig::default());
        engine.run_all("let counter = 0;");

        let script = script_failing_at(5, failing);
        let results = engine.run_all(&script);

        // One extra leading unit resets the counter.
        assert_eq!(results.len(), failing + 1, "failing unit {failing}");
        let last = results.last().unwrap();
        assert_eq!(
            last.error.as_ref().unwrap().message(),
            format!("unit {failing} failed")
        );
        assert!(results[..results.len() - 1].iter().all(|r| r.is_success()));

        assert_eq!(
            engine.state().get_value::<i64>("counter"),
            Some(failing as i64 - 1)
        );
    }
}

#[test]
fn test_result_sources_follow_split() {
    let script = "let a = [1, 2, 3];\nfor x in a { print(x) }\na.len()";
    let mut engine = ExecutionEngine::new(ScriptConfig::default());
    let results = engine.run_all(script);

    let sources: Vec<_> = split_units(script).map(|u| u.source).collect();
    let result_sources: Vec<_> = results.iter().map(|r| r.source.clone()).collect();
    assert_eq!(sources, result_sources);

    assert_eq!(results[1].output, "1\n2\n3\n");
    assert_eq!(results[1].return_value, None);
    assert_eq!(results[2].return_value.as_deref(), Some("3"));
    for (result, unit) in results.iter().zip(split_units(script)) {
        assert_eq!(result.span.as_ref(), Some(&unit.span));
    }
}

#[test]
fn test_separate_engines_are_isolated() {
    let mut first = ExecutionEngine::new(ScriptConfig::default());
    let mut second = ExecutionEngine::new(ScriptConfig::default());

    first.run_all("let shared = 1;");
    let results = second.run_all("shared");

    assert_eq!(results.len(), 1);
    assert!(results[0].error.is_some());
}

#[test]
fn test_custom_default_size() {
    let config = ScriptConfig::default()
        .with_dpi(50.0)
        .with_default_size(4.0, 2.0);
    let mut engine = ExecutionEngine::new(config);
    let results = engine.run_all("let f = figure();\nf.bar([1, 2]);\nf.show();");

    let plot = results[2].plot.as_ref().unwrap();
    assert_eq!(plot.size_pixels, (200, 100));
    assert_eq!(plot.dpi, 50.0);
    assert!(plot.is_default_size);
}
