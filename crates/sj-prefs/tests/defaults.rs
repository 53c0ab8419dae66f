use sj_core::{decompose, Policy, PolicyStore, Reason, RequestType, SaveSections, Verdict};
use sj_prefs::{
    default_preferences, export_document, import_document, merge_document, parse_document, Warning,
};

fn store() -> PolicyStore {
    PolicyStore::new(default_preferences().unwrap())
}

fn decide(store: &PolicyStore, page: &str, target: &str) -> Verdict {
    let page = decompose(page).unwrap();
    let target = decompose(target).unwrap();
    store.decide(&page, &target, false, RequestType::SCRIPT)
}

#[test]
fn test_site_list_blocks_ad_network() {
    let store = store();
    assert_eq!(
        decide(&store, "https://www.amazon.com/", "https://aax.amazon-adsystem.com/e.js"),
        Verdict::block(Reason::SiteList)
    );
    // same domain still loads
    assert!(!decide(&store, "https://www.amazon.com/", "https://www.amazon.com/app.js").block);
}

#[test]
fn test_global_list_with_site_exception() {
    let store = store();
    let target = "https://static.xx.fbcdn.net/rsrc.js";
    assert_eq!(
        decide(&store, "https://news.example.org/", target),
        Verdict::block(Reason::GlobalList)
    );
    assert_eq!(
        decide(&store, "https://www.facebook.com/", target),
        Verdict::allow(Reason::SiteList)
    );
}

#[test]
fn test_localhost_is_allowed_everywhere() {
    let store = store();
    assert_eq!(
        decide(&store, "https://news.example.org/", "http://localhost:8080/dev.js"),
        Verdict::allow(Reason::GlobalList)
    );
}

#[test]
fn test_subdomain_lists_merge_over_domain_lists() {
    let store = store();
    let onedrive = decompose("https://onedrive.live.com/").unwrap();
    assert_eq!(store.resolve(&onedrive, false).policy, Policy::Filtered);

    assert_eq!(
        decide(&store, "https://onedrive.live.com/", "https://c.sfx.ms/app.js"),
        Verdict::allow(Reason::SiteList)
    );
    assert_eq!(
        decide(&store, "https://onedrive.live.com/", "https://p.gfx.ms/app.js"),
        Verdict::allow(Reason::SiteList)
    );
    assert_eq!(
        decide(&store, "https://mail.live.com/", "https://c.sfx.ms/app.js"),
        Verdict::block(Reason::Policy)
    );
}

#[test]
fn test_global_subdomain_entries() {
    let store = store();
    let page = "https://news.example.org/";
    assert_eq!(
        decide(&store, page, "https://apis.google.com/js/platform.js"),
        Verdict::block(Reason::GlobalList)
    );
    assert_eq!(
        decide(&store, page, "https://maps.google.com/maps.js"),
        Verdict::allow(Reason::GlobalList)
    );
}

#[test]
fn test_defaults_export_round_trip() {
    let prefs = default_preferences().unwrap();
    let text = export_document(&prefs).unwrap();
    assert_eq!(parse_document(&text).unwrap().prefs, prefs);
}

#[test]
fn test_import_legacy_document() {
    let mut store = store();
    let v1 = r#"{
        "policy": {"rule": 2, "private": 1, "domains": [{"name": "example.com", "rule": 3}]},
        "blackwhitelist": {"domains": [{"name": "tracker.net", "rule": true}]},
        "firstRun": false
    }"#;
    let warnings = import_document(&mut store, v1).unwrap();
    assert!(warnings.is_empty());

    assert_eq!(store.preferences().default_policy, Policy::Filtered);
    assert!(store.preferences().site_rules.get(&["amazon.com"]).is_none());
    assert_eq!(
        decide(&store, "https://www.example.com/", "https://www.example.com/a.js"),
        Verdict::block(Reason::Policy)
    );
    assert_eq!(store.flush_save(), Some(SaveSections::ALL));
}

#[test]
fn test_merge_keeps_existing_rules() {
    let mut store = store();
    let incoming = r#"{
        "rule": 2, "private": 1,
        "urls": {"example.com": {"rule": 0}},
        "rules": {"urls": {"fbcdn.net": {"rule": false}}},
        "colour": "blue"
    }"#;
    let warnings = merge_document(&mut store, incoming).unwrap();
    assert_eq!(warnings.len(), 1);

    let prefs = store.preferences();
    assert_eq!(prefs.default_policy, Policy::Filtered);
    assert_eq!(prefs.site_rules.get(&["example.com"]).unwrap().rule, Some(Policy::AllowAll));
    assert!(prefs.site_rules.get(&["amazon.com"]).is_some());
    assert_eq!(prefs.global_blacklist.lookup("fbcdn.net", ""), Some(false));
}

#[test]
fn test_merge_without_settings_keeps_current_ones() {
    let mut store = store();
    store.set_policy(&[], Some(Policy::Filtered), false).unwrap();
    store.set_private_default(Policy::BlockAll);
    store.set_block_ping(true, false).unwrap();

    let warnings = merge_document(&mut store, r#"{"urls": {"a.com": {"rule": 0}}}"#).unwrap();
    assert!(warnings.is_empty());

    let prefs = store.preferences();
    assert_eq!(prefs.default_policy, Policy::Filtered);
    assert_eq!(prefs.default_private_policy, Policy::BlockAll);
    assert!(prefs.block_ping);
    assert_eq!(prefs.site_rules.get(&["a.com"]).unwrap().rule, Some(Policy::AllowAll));
}

#[test]
fn test_import_legacy_reports_unknown_fields() {
    let mut store = store();
    let v1 = r#"{
        "policy": {"rule": 1, "private": 1, "theme": "dark",
                   "domains": [{"name": "example.com", "rule": 3, "colour": "red"}]},
        "blackwhitelist": {"domains": [{"name": "tracker.net", "rule": true, "note": "x"}]},
        "firstRun": false
    }"#;
    let warnings = import_document(&mut store, v1).unwrap();
    assert_eq!(
        warnings,
        vec![
            Warning::UnknownField { path: "/policy/theme".to_string() },
            Warning::UnknownField { path: "/policy/domains/0/colour".to_string() },
            Warning::UnknownField { path: "/blackwhitelist/domains/0/note".to_string() },
        ]
    );
    assert_eq!(
        store.preferences().site_rules.get(&["example.com"]).unwrap().rule,
        Some(Policy::BlockAll)
    );
}

#[test]
fn test_rejected_import_leaves_store_untouched() {
    let mut store = store();
    let before = export_document(store.preferences()).unwrap();
    assert!(import_document(&mut store, r#"{"rule": 9}"#).is_err());
    assert_eq!(export_document(store.preferences()).unwrap(), before);
    assert!(!store.is_save_pending());
}
