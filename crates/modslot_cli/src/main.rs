//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `modslot_core` linkage.
//! - Wire one registry, two demo plugins and one bound dashboard component,
//!   and print the contributions it renders.

use modslot_core::{
    BindOptions, Binder, ExtensibleProps, ExtensionContext, ExtensionManifest, ExtensionPlugin,
    PluginError, PluginLoader, PluginRegistrar, RenderProps, StaticElements,
};
use serde_json::json;

const DASHLET_POINT: &str = "registerDashlet";

struct DemoPlugin {
    manifest: ExtensionManifest,
    title: &'static str,
}

impl ExtensionPlugin for DemoPlugin {
    fn manifest(&self) -> &ExtensionManifest {
        &self.manifest
    }

    fn register(&self, registrar: &mut PluginRegistrar<'_>) -> Result<(), PluginError> {
        let title = self.title;
        registrar.contribute(DASHLET_POINT, move |group, _| {
            (group == "dashboard").then(|| json!({ "title": title, "group": group }))
        })
    }
}

fn main() {
    println!("modslot_core ping={}", modslot_core::ping());
    println!("modslot_core version={}", modslot_core::core_version());

    let context = ExtensionContext::new();
    let mut loader = PluginLoader::new(context.clone());
    let plugins = [
        DemoPlugin {
            manifest: ExtensionManifest::new("demo.news", "0.1.0", &[DASHLET_POINT]),
            title: "News",
        },
        DemoPlugin {
            manifest: ExtensionManifest::new("demo.todo", "0.1.0", &[DASHLET_POINT]),
            title: "Todo",
        },
    ];
    let report = loader.load_all(plugins.iter().map(|plugin| plugin as &dyn ExtensionPlugin));
    println!(
        "plugins loaded={} failed={}",
        report.loaded.len(),
        report.failed.len()
    );

    if let Err(err) = context.declare_extension_point(
        DASHLET_POINT,
        modslot_core::infallible_provider("host/dashlet", |_, _| None),
    ) {
        eprintln!("declare failed: {err}");
        std::process::exit(1);
    }

    let binder = Binder::new(context, DASHLET_POINT, BindOptions::default());
    let props = ExtensibleProps::from_json(json!({ "group": "dashboard" }))
        .with_static_elements(StaticElements::new(1, vec![json!({ "title": "Welcome" })]));
    let mut dashboard = binder.mount(
        |rendered: &RenderProps| {
            rendered
                .objects
                .iter()
                .filter_map(|item| item["title"].as_str().map(str::to_string))
                .collect::<Vec<_>>()
        },
        props,
    );
    println!("dashboard dashlets={}", dashboard.render().join(","));
}
