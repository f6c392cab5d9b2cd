//! Integration tests for the identity resolver against scripted toolchain
//! output and a static serial bus.

use std::sync::Arc;

use boardpilot_core::{BoardProfileId, CompatibilityRuleSet, Confidence};
use boardpilot_upload::fakes::{ScriptedInvoker, StaticPorts};
use boardpilot_upload::{ArduinoCli, IdentityResolver, ToolOutput};

fn resolver_with(
    invoker: Arc<ScriptedInvoker>,
    ports: Arc<StaticPorts>,
) -> IdentityResolver {
    let cli = Arc::new(ArduinoCli::with_invoker(invoker));
    IdentityResolver::new(cli, ports)
}

// ── Structured detection ────────────────────────────────────────────────

#[tokio::test]
async fn structured_detection_round_trips_all_fields() {
    let invoker = Arc::new(ScriptedInvoker::new());
    invoker.respond(
        "board",
        ToolOutput::ok(
            r#"{
              "detected_ports": [
                {
                  "port": {
                    "address": "PORT1",
                    "properties": { "vendor": "V", "product": "P" }
                  },
                  "matching_boards": [ { "name": "Board C", "fqbn": "A:B:C" } ]
                }
              ]
            }"#,
        ),
    );
    let ports = Arc::new(StaticPorts::new(vec![StaticPorts::endpoint("PORT1", None)]));

    let resolver = resolver_with(invoker, ports);
    let identities = resolver.resolve_all().await;

    assert_eq!(identities.len(), 1);
    let identity = &identities[0];
    assert_eq!(identity.port_name, "PORT1");
    assert_eq!(identity.profile, "A:B:C".parse::<BoardProfileId>().unwrap());
    assert_eq!(identity.vendor, "V");
    assert_eq!(identity.product, "P");
    assert_eq!(identity.confidence, Confidence::Structured);
}

#[tokio::test]
async fn resolve_one_filters_to_the_requested_port() {
    let invoker = Arc::new(ScriptedInvoker::new());
    invoker.respond(
        "board",
        ToolOutput::ok(
            r#"{
              "detected_ports": [
                { "port": { "address": "COM3" },
                  "matching_boards": [ { "fqbn": "arduino:avr:uno" } ] },
                { "port": { "address": "COM4" },
                  "matching_boards": [ { "fqbn": "esp32:esp32:esp32" } ] }
              ]
            }"#,
        ),
    );
    let ports = Arc::new(StaticPorts::new(vec![
        StaticPorts::endpoint("COM3", None),
        StaticPorts::endpoint("COM4", None),
    ]));

    let resolver = resolver_with(invoker, ports);
    let identity = resolver.resolve_one("COM4").await;
    assert_eq!(identity.port_name, "COM4");
    assert_eq!(identity.profile.to_string(), "esp32:esp32:esp32");
}

// ── Degradation ─────────────────────────────────────────────────────────

#[tokio::test]
async fn timed_out_query_degrades_to_device_string_heuristics() {
    let invoker = Arc::new(ScriptedInvoker::new());
    invoker.time_out("board");
    let ports = Arc::new(StaticPorts::new(vec![StaticPorts::endpoint(
        "COM9",
        Some("USB-SERIAL CH340"),
    )]));

    let resolver = resolver_with(invoker, ports);
    let identities = resolver.resolve_all().await;

    assert_eq!(identities.len(), 1);
    assert_eq!(identities[0].profile.to_string(), "arduino:avr:uno");
    assert_eq!(identities[0].confidence, Confidence::OsFallback);
    assert_eq!(identities[0].vendor, "WCH");
}

#[tokio::test]
async fn port_name_heuristic_when_os_gives_nothing() {
    let invoker = Arc::new(ScriptedInvoker::new());
    invoker.respond("board", ToolOutput::failed(1, "no boards"));
    let ports = Arc::new(StaticPorts::new(vec![StaticPorts::endpoint(
        "/dev/cu.usbserial-CP2102",
        None,
    )]));

    let resolver = resolver_with(invoker, ports);
    let identities = resolver.resolve_all().await;

    assert_eq!(identities[0].profile.to_string(), "esp32:esp32:esp32");
    assert_eq!(identities[0].confidence, Confidence::Heuristic);
}

#[tokio::test]
async fn unmatched_endpoint_resolves_to_unknown_not_error() {
    let invoker = Arc::new(ScriptedInvoker::new());
    let ports = Arc::new(StaticPorts::new(vec![StaticPorts::endpoint(
        "/dev/ttyS0",
        Some("16550A UART"),
    )]));

    let resolver = resolver_with(invoker, ports);
    let identities = resolver.resolve_all().await;

    assert_eq!(identities.len(), 1);
    assert!(identities[0].profile.is_unknown());
    assert_eq!(identities[0].confidence, Confidence::Unresolved);
}

#[tokio::test]
async fn empty_bus_spawns_nothing() {
    let invoker = Arc::new(ScriptedInvoker::new());
    let ports = Arc::new(StaticPorts::empty());

    let resolver = resolver_with(Arc::clone(&invoker), ports);
    let identities = resolver.resolve_all().await;

    assert!(identities.is_empty());
    assert!(invoker.calls().is_empty(), "no endpoints, no invocations");
}

// ── Idempotence ─────────────────────────────────────────────────────────

#[tokio::test]
async fn repeated_resolution_is_stable_under_port_and_profile() {
    let invoker = Arc::new(ScriptedInvoker::new());
    invoker.respond(
        "board",
        ToolOutput::ok(
            r#"{
              "detected_ports": [
                { "port": { "address": "COM3" },
                  "matching_boards": [ { "fqbn": "arduino:avr:mega" } ] }
              ]
            }"#,
        ),
    );
    let ports = Arc::new(StaticPorts::new(vec![
        StaticPorts::endpoint("COM3", None),
        StaticPorts::endpoint("COM8", Some("CP210x bridge")),
    ]));

    let resolver = resolver_with(invoker, ports);
    let first = resolver.resolve_all().await;
    let second = resolver.resolve_all().await;

    let keys = |ids: &[boardpilot_core::BoardIdentity]| {
        ids.iter()
            .map(|i| (i.port_name.clone(), i.profile.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(keys(&first), keys(&second));
}

// ── Best-compatible selection ───────────────────────────────────────────

#[tokio::test]
async fn best_compatible_prefers_exact_profile_match() {
    let invoker = Arc::new(ScriptedInvoker::new());
    invoker.respond(
        "board",
        ToolOutput::ok(
            r#"{
              "detected_ports": [
                { "port": { "address": "COM3" },
                  "matching_boards": [ { "fqbn": "arduino:avr:mega" } ] },
                { "port": { "address": "COM4" },
                  "matching_boards": [ { "fqbn": "arduino:avr:uno" } ] }
              ]
            }"#,
        ),
    );
    let ports = Arc::new(StaticPorts::new(vec![
        StaticPorts::endpoint("COM3", None),
        StaticPorts::endpoint("COM4", None),
    ]));

    let resolver = resolver_with(invoker, ports);
    let rules = CompatibilityRuleSet::builtin();
    let selected: BoardProfileId = "arduino:avr:uno".parse().unwrap();

    let best = resolver
        .best_compatible(&rules, &selected)
        .await
        .expect("uno is connected");
    assert_eq!(best.port_name, "COM4");
    assert_eq!(best.profile, selected);
}

#[tokio::test]
async fn best_compatible_skips_gate_blocked_boards() {
    let invoker = Arc::new(ScriptedInvoker::new());
    invoker.respond(
        "board",
        ToolOutput::ok(
            r#"{
              "detected_ports": [
                { "port": { "address": "COM3" },
                  "matching_boards": [ { "fqbn": "esp32:esp32:esp32" } ] },
                { "port": { "address": "COM4" },
                  "matching_boards": [ { "fqbn": "arduino:avr:mega" } ] }
              ]
            }"#,
        ),
    );
    let ports = Arc::new(StaticPorts::new(vec![
        StaticPorts::endpoint("COM3", None),
        StaticPorts::endpoint("COM4", None),
    ]));

    let resolver = resolver_with(invoker, ports);
    let rules = CompatibilityRuleSet::builtin();
    let selected: BoardProfileId = "arduino:avr:uno".parse().unwrap();

    let best = resolver
        .best_compatible(&rules, &selected)
        .await
        .expect("mega is allowed for uno");
    assert_eq!(best.port_name, "COM4");
}
