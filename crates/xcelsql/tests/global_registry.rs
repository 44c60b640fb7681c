//! Process-wide function registry and eval fallback switch
//!
//! Kept in its own test binary with a single test: both are global state.

use xcelsql::prelude::*;
use xcelsql::{
    eval_fallback_enabled, list_functions, lookup_function, register_function, seal_registry,
    set_eval_fallback, FunctionDef, RegistryError,
};

#[test]
fn test_registration_phase_then_evaluation() {
    register_function(
        FunctionDef::new("margin", 2, Some(2), |args: &[Value]| {
            match (args.first(), args.get(1)) {
                (Some(Value::Int(price)), Some(Value::Int(cost))) => Ok(Value::Int(price - cost)),
                _ => Ok(Value::None),
            }
        })
        .with_params(&["price", "cost"])
        .with_doc("Price minus cost."),
    )
    .unwrap();
    assert!(matches!(
        register_function(FunctionDef::new("not-a-name", 0, None, |_: &[Value]| Ok(Value::None))),
        Err(RegistryError::InvalidName(_))
    ));

    assert!(lookup_function("margin").is_some());
    assert!(list_functions()
        .iter()
        .any(|(name, doc)| name == "margin" && doc == "Price minus cost."));

    seal_registry();
    assert!(matches!(
        register_function(FunctionDef::new("late", 0, None, |_: &[Value]| Ok(Value::None))),
        Err(RegistryError::Sealed(_))
    ));

    let mut row = Row::new();
    row.insert("price".into(), Value::Int(12));
    row.insert("cost".into(), Value::Int(7));
    let interpreter = Interpreter::new();
    assert_eq!(interpreter.evaluate("margin(price, cost)", &row).unwrap(), Value::Int(5));

    // A column named like a function shadows it
    row.insert("margin".into(), Value::Int(1));
    assert!(matches!(
        interpreter.evaluate("margin(price, cost)", &row),
        Err(EvalError::Call { .. })
    ));

    assert!(!eval_fallback_enabled());
    assert!(interpreter.evaluate("price & cost", &row).is_err());
    set_eval_fallback(true);
    assert!(eval_fallback_enabled());
    assert_eq!(interpreter.evaluate("price & cost", &row).unwrap(), Value::Int(4));
    assert!(Interpreter::new()
        .allow_fallback(false)
        .evaluate("price & cost", &row)
        .is_err());
    set_eval_fallback(false);
}
