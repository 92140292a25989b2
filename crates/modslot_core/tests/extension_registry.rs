use modslot_core::{
    infallible_provider, provider_fn, ContributionSource, Declaration, ExtensionContext,
    ExtensionRegistry, ProviderError,
};
use serde_json::{json, Value};

#[test]
fn unknown_point_and_group_start_empty() {
    let registry = ExtensionRegistry::new();
    for (point, group) in [("registerDashlet", "main"), ("settings.page", ""), ("x", "y")] {
        assert!(registry.contributions_for(point, group).is_empty());
    }
}

#[test]
fn single_callback_yields_one_element() {
    let context = ExtensionContext::new();
    context
        .declare_extension_point(
            "registerDashlet",
            infallible_provider("host/dashlet", |group, args| {
                Some(json!(format!("{group}:{}", args[0])))
            }),
        )
        .expect("declare");

    context.collect("registerDashlet", "main", &[json!(5)]);
    assert_eq!(
        context.contributions_for("registerDashlet", "main").to_vec(),
        vec![json!("main:5")]
    );
}

#[test]
fn callback_returning_none_contributes_nothing() {
    let context = ExtensionContext::new();
    context
        .declare_extension_point("registerDashlet", infallible_provider("host", |_, _| None))
        .expect("declare");

    context.collect("registerDashlet", "main", &[]);
    assert!(context.contributions_for("registerDashlet", "main").is_empty());
    assert!(context.has_collected("registerDashlet", "main"));
}

#[test]
fn multiple_providers_follow_registration_order() {
    let context = ExtensionContext::new();
    context
        .declare_extension_point(
            "registerDashlet",
            infallible_provider("p1", |group, _| Some(json!(["p1", group]))),
        )
        .expect("declare");
    context
        .register_provider("registerDashlet", infallible_provider("skip", |_, _| None))
        .expect("skip provider");
    context
        .register_provider(
            "registerDashlet",
            infallible_provider("p2", |group, _| Some(json!(["p2", group]))),
        )
        .expect("p2 provider");

    context.collect("registerDashlet", "g", &[]);
    assert_eq!(
        context.contributions_for("registerDashlet", "g").to_vec(),
        vec![json!(["p1", "g"]), json!(["p2", "g"])]
    );
}

#[test]
fn redeclaring_point_is_ignored() {
    let context = ExtensionContext::new();
    let first = context
        .declare_extension_point("registerDashlet", infallible_provider("a", |_, _| Some(json!("a"))))
        .expect("first");
    let second = context
        .declare_extension_point("registerDashlet", infallible_provider("b", |_, _| Some(json!("b"))))
        .expect("second must not fail");
    assert_eq!(first, Declaration::Declared);
    assert_eq!(second, Declaration::AlreadyDeclared);

    context.collect("registerDashlet", "g", &[]);
    assert_eq!(
        context.contributions_for("registerDashlet", "g").to_vec(),
        vec![json!("a")]
    );
}

#[test]
fn failing_provider_does_not_block_others() {
    let context = ExtensionContext::new();
    context
        .declare_extension_point(
            "registerDashlet",
            provider_fn("broken", |_, _| Err(ProviderError::new("broken", "no data"))),
        )
        .expect("declare");
    context
        .register_provider(
            "registerDashlet",
            infallible_provider("panics", |_, args: &[Value]| Some(args[10].clone())),
        )
        .expect("panicking provider");
    context
        .register_provider("registerDashlet", infallible_provider("ok", |_, _| Some(json!("ok"))))
        .expect("healthy provider");

    context.collect("registerDashlet", "main", &[]);
    assert_eq!(
        context.contributions_for("registerDashlet", "main").to_vec(),
        vec![json!("ok")]
    );
}

#[test]
fn late_providers_do_not_change_existing_snapshot() {
    let context = ExtensionContext::new();
    context
        .declare_extension_point("registerDashlet", infallible_provider("host", |_, _| Some(json!(1))))
        .expect("declare");
    context.collect("registerDashlet", "main", &[]);

    context
        .register_provider("registerDashlet", infallible_provider("late", |_, _| Some(json!(2))))
        .expect("late provider");
    assert_eq!(
        context.contributions_for("registerDashlet", "main").to_vec(),
        vec![json!(1)]
    );

    context.collect("registerDashlet", "other", &[]);
    assert_eq!(
        context.contributions_for("registerDashlet", "other").to_vec(),
        vec![json!(1), json!(2)]
    );
}
