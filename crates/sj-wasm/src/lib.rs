//! WebAssembly bindings for ScriptJaeger

use std::cell::RefCell;

use sj_core::{
    decompose, Address, BlacklistNode, Policy, PolicyStore, RequestType, SaveSections, Tabs,
    Verdict,
};
use sj_prefs::{default_preferences, export_document, parse_document, Warning};
use wasm_bindgen::prelude::*;

struct EngineState {
    store: PolicyStore,
    tabs: Tabs,
}

thread_local! {
    static ENGINE: RefCell<Option<EngineState>> = const { RefCell::new(None) };
}

fn with_engine<R>(f: impl FnOnce(&mut EngineState) -> R) -> Result<R, JsValue> {
    ENGINE.with(|cell| {
        let mut engine = cell.borrow_mut();
        let state = engine
            .as_mut()
            .ok_or_else(|| JsValue::from_str("Engine not initialized"))?;
        Ok(f(state))
    })
}

/// Like [`with_engine`], stamping the host time on any edit `f` makes.
fn edit_engine<R>(f: impl FnOnce(&mut EngineState) -> R) -> Result<R, JsValue> {
    with_engine(|engine| {
        engine.store.tick(js_sys::Date::now().max(0.0) as u64);
        f(engine)
    })
}

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn parse_url(url: &str) -> Result<Address, JsValue> {
    decompose(url).map_err(js_error)
}

fn report_warnings(warnings: &[Warning]) -> JsValue {
    let array = js_sys::Array::new();
    for warning in warnings {
        let text = warning.to_string();
        web_sys::console::warn_1(&JsValue::from_str(&text));
        array.push(&JsValue::from_str(&text));
    }
    array.into()
}

fn verdict_object(verdict: Verdict) -> JsValue {
    let result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&result, &"block".into(), &JsValue::from(verdict.block));
    let _ = js_sys::Reflect::set(&result, &"reason".into(), &JsValue::from_str(verdict.reason.name()));
    result.into()
}

fn blacklist_object(node: &BlacklistNode) -> JsValue {
    let urls = js_sys::Object::new();
    for (label, child) in &node.children {
        let entry = js_sys::Object::new();
        let rule = match child.rule {
            Some(rule) => JsValue::from(rule),
            None => JsValue::NULL,
        };
        let _ = js_sys::Reflect::set(&entry, &"rule".into(), &rule);
        let _ = js_sys::Reflect::set(&entry, &"urls".into(), &blacklist_object(child));
        let _ = js_sys::Reflect::set(&urls, &JsValue::from_str(label), &entry);
    }
    urls.into()
}

/// Labels of `address` down to `level` (1 = domain, 2 = subdomain, 3 = page).
fn site_path(address: &Address, level: usize) -> Vec<&str> {
    address.site_path().into_iter().take(level).collect()
}

/// Site path and script origin for a script rule edit. No site means the
/// global list; a site needs at least its domain level.
fn script_rule_paths<'a>(
    site: Option<&'a Address>,
    site_level: u32,
    script: &'a Address,
    script_level: u32,
) -> Result<(Vec<&'a str>, Vec<&'a str>), String> {
    let path = match site {
        Some(_) if site_level == 0 => {
            return Err("Site rules need a site level of 1 or more".to_string())
        }
        Some(site) => site_path(site, site_level as usize),
        None => Vec::new(),
    };
    let origin = script.origin_path().into_iter().take(script_level as usize).collect();
    Ok((path, origin))
}

fn parse_policy(policy: Option<u8>) -> Result<Option<Policy>, JsValue> {
    policy
        .map(|p| Policy::try_from(p).map_err(|_| JsValue::from_str(&format!("Invalid policy {}", p))))
        .transpose()
}

// =============================================================================
// Lifecycle
// =============================================================================

/// Load preferences from a stored document, or the bundled defaults when
/// none is given. Returns the import warnings.
#[wasm_bindgen]
pub fn init(document: Option<String>) -> Result<JsValue, JsValue> {
    let (prefs, warnings) = match document {
        Some(text) => {
            let imported = parse_document(&text).map_err(js_error)?;
            (imported.prefs, imported.warnings)
        }
        None => (default_preferences().map_err(js_error)?, Vec::new()),
    };

    ENGINE.with(|cell| {
        *cell.borrow_mut() = Some(EngineState {
            store: PolicyStore::new(prefs),
            tabs: Tabs::new(),
        });
    });
    Ok(report_warnings(&warnings))
}

#[wasm_bindgen]
pub fn is_initialized() -> bool {
    ENGINE.with(|cell| cell.borrow().is_some())
}

#[wasm_bindgen]
pub fn window_opened(window_id: i32, private: bool) -> Result<(), JsValue> {
    with_engine(|engine| engine.store.open_window(window_id, private))
}

#[wasm_bindgen]
pub fn window_closed(window_id: i32) -> Result<(), JsValue> {
    with_engine(|engine| engine.store.close_window(window_id))
}

// =============================================================================
// Navigation & Requests
// =============================================================================

#[wasm_bindgen]
pub fn tab_navigated(tab_id: i32, url: &str, private: bool) -> Result<(), JsValue> {
    let address = parse_url(url)?;
    with_engine(|engine| engine.tabs.navigate(&engine.store, tab_id, &address, private))
}

#[wasm_bindgen]
pub fn frame_created(tab_id: i32, frame_id: i32, parent_frame_id: i32) -> Result<(), JsValue> {
    with_engine(|engine| engine.tabs.frame_placeholder(tab_id, frame_id, parent_frame_id))
}

#[wasm_bindgen]
pub fn tab_closed(tab_id: i32) -> Result<(), JsValue> {
    with_engine(|engine| engine.tabs.close(tab_id))
}

#[wasm_bindgen]
pub fn tab_replaced(old_tab_id: i32, new_tab_id: i32) -> Result<(), JsValue> {
    with_engine(|engine| engine.tabs.replace(old_tab_id, new_tab_id))
}

/// Decide an intercepted request from a tracked tab and frame.
#[wasm_bindgen]
pub fn match_request(
    tab_id: i32,
    frame_id: i32,
    parent_frame_id: i32,
    request_type: &str,
    url: &str,
) -> Result<JsValue, JsValue> {
    let target = parse_url(url)?;
    let kind = RequestType::from_str(request_type);
    let verdict = with_engine(|engine| {
        engine
            .tabs
            .decide(&engine.store, tab_id, frame_id, parent_frame_id, kind, &target)
    })?;
    Ok(verdict_object(verdict))
}

/// Decide a request without tab tracking.
#[wasm_bindgen]
pub fn decide(page_url: &str, url: &str, private: bool, is_sub_frame: bool) -> Result<JsValue, JsValue> {
    let page = parse_url(page_url)?;
    let target = parse_url(url)?;
    let kind = if is_sub_frame {
        RequestType::SUBDOCUMENT
    } else {
        RequestType::SCRIPT
    };
    let verdict = with_engine(|engine| engine.store.decide(&page, &target, private, kind))?;
    Ok(verdict_object(verdict))
}

#[wasm_bindgen]
pub fn get_resolved(url: &str, private: bool) -> Result<JsValue, JsValue> {
    let address = parse_url(url)?;
    let resolved = with_engine(|engine| engine.store.resolve(&address, private))?;

    let result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&result, &"policy".into(), &JsValue::from(u8::from(resolved.policy)));
    let _ = js_sys::Reflect::set(&result, &"depth".into(), &JsValue::from(resolved.depth as u32));
    let _ = js_sys::Reflect::set(&result, &"blacklist".into(), &blacklist_object(&resolved.blacklist));
    Ok(result.into())
}

/// Loads and counters of a tab frame, for the popup.
#[wasm_bindgen]
pub fn get_tab_info(tab_id: i32, frame_id: i32) -> Result<JsValue, JsValue> {
    with_engine(|engine| {
        let result = js_sys::Object::new();
        let Some(tab) = engine.tabs.get(tab_id) else {
            return JsValue::NULL;
        };

        let _ = js_sys::Reflect::set(&result, &"blocked".into(), &JsValue::from(tab.blocked_count() as u32));
        let _ = js_sys::Reflect::set(&result, &"allowOnce".into(), &JsValue::from(tab.allow_once().is_active()));
        if let Some(ctx) = tab.context_for(frame_id, -1, false) {
            let _ = js_sys::Reflect::set(&result, &"policy".into(), &JsValue::from(u8::from(ctx.policy)));
            let _ = js_sys::Reflect::set(&result, &"site".into(), &JsValue::from_str(&ctx.address.host()));
        }

        let scripts = js_sys::Array::new();
        for ((domain, subdomain), records) in tab.loads(frame_id).into_iter().flatten() {
            let entry = js_sys::Object::new();
            let blocked = records.iter().filter(|record| record.verdict.block).count();
            let _ = js_sys::Reflect::set(&entry, &"domain".into(), &JsValue::from_str(domain));
            let _ = js_sys::Reflect::set(&entry, &"subdomain".into(), &JsValue::from_str(subdomain));
            let _ = js_sys::Reflect::set(&entry, &"loads".into(), &JsValue::from(records.len() as u32));
            let _ = js_sys::Reflect::set(&entry, &"blocked".into(), &JsValue::from(blocked as u32));
            scripts.push(&entry);
        }
        let _ = js_sys::Reflect::set(&result, &"scripts".into(), &scripts);
        result.into()
    })
}

/// What each recorded origin of a frame would do under `policy`.
#[wasm_bindgen]
pub fn preview_policy(tab_id: i32, frame_id: i32, policy: u8) -> Result<JsValue, JsValue> {
    let policy = parse_policy(Some(policy))?.unwrap_or(Policy::Relaxed);
    with_engine(|engine| {
        let result = js_sys::Array::new();
        for (domain, subdomain, block) in engine.tabs.preview(&engine.store, tab_id, frame_id, policy) {
            let entry = js_sys::Object::new();
            let _ = js_sys::Reflect::set(&entry, &"domain".into(), &JsValue::from_str(&domain));
            let _ = js_sys::Reflect::set(&entry, &"subdomain".into(), &JsValue::from_str(&subdomain));
            let _ = js_sys::Reflect::set(&entry, &"block".into(), &JsValue::from(block));
            result.push(&entry);
        }
        result.into()
    })
}

#[wasm_bindgen]
pub fn allow_once(tab_id: i32) -> Result<bool, JsValue> {
    with_engine(|engine| engine.tabs.arm_allow_once(tab_id))
}

#[wasm_bindgen]
pub fn revoke_allow_once(tab_id: i32) -> Result<(), JsValue> {
    with_engine(|engine| engine.tabs.disarm_allow_once(tab_id))
}

// =============================================================================
// Edits
// =============================================================================

/// Set the policy of `url` at `level` (0 = default, 1 = domain,
/// 2 = subdomain, 3 = page). `null` clears it.
#[wasm_bindgen]
pub fn set_policy(url: &str, level: u32, policy: Option<u8>, private: bool) -> Result<(), JsValue> {
    let address = parse_url(url)?;
    let policy = parse_policy(policy)?;
    edit_engine(|engine| {
        let path = site_path(&address, level as usize);
        engine.store.set_policy(&path, policy, private)
    })?
    .map_err(js_error)
}

/// Set the rule for the origin of `script_url` (`script_level` 1 = domain,
/// 2 = subdomain) on `site_url` at `site_level`, or globally when `site_url`
/// is absent. `null` clears it.
#[wasm_bindgen]
pub fn set_script_rule(
    site_url: Option<String>,
    site_level: u32,
    script_url: &str,
    script_level: u32,
    rule: Option<bool>,
    private: bool,
) -> Result<(), JsValue> {
    let site = site_url.as_deref().map(parse_url).transpose()?;
    let script = parse_url(script_url)?;
    let (path, origin) = script_rule_paths(site.as_ref(), site_level, &script, script_level)
        .map_err(|e| JsValue::from_str(&e))?;
    edit_engine(|engine| engine.store.set_script_rule(&path, &origin, rule, private))?.map_err(js_error)
}

#[wasm_bindgen]
pub fn set_block_ping(block: bool, private: bool) -> Result<(), JsValue> {
    edit_engine(|engine| engine.store.set_block_ping(block, private))?.map_err(js_error)
}

#[wasm_bindgen]
pub fn import_document(text: &str) -> Result<JsValue, JsValue> {
    let warnings = edit_engine(|engine| sj_prefs::import_document(&mut engine.store, text))?.map_err(js_error)?;
    Ok(report_warnings(&warnings))
}

#[wasm_bindgen]
pub fn merge_document(text: &str) -> Result<JsValue, JsValue> {
    let warnings = edit_engine(|engine| sj_prefs::merge_document(&mut engine.store, text))?.map_err(js_error)?;
    Ok(report_warnings(&warnings))
}

#[wasm_bindgen]
pub fn export_preferences() -> Result<String, JsValue> {
    with_engine(|engine| export_document(engine.store.preferences()))?.map_err(js_error)
}

#[wasm_bindgen]
pub fn reset_to_defaults() -> Result<(), JsValue> {
    edit_engine(|engine| sj_prefs::reset_to_defaults(&mut engine.store))?.map_err(js_error)
}

// =============================================================================
// Persistence
// =============================================================================

/// Poll the debounced save. Returns `{policy, blacklist, document}` when a
/// write is due, `null` otherwise.
#[wasm_bindgen]
pub fn take_due_save(now_ms: f64) -> Result<JsValue, JsValue> {
    with_engine(|engine| {
        let Some(sections) = engine.store.take_due_save(now_ms.max(0.0) as u64) else {
            return Ok(JsValue::NULL);
        };
        let document = export_document(engine.store.preferences()).map_err(js_error)?;

        let result = js_sys::Object::new();
        let _ = js_sys::Reflect::set(
            &result,
            &"policy".into(),
            &JsValue::from(sections.contains(SaveSections::POLICY)),
        );
        let _ = js_sys::Reflect::set(
            &result,
            &"blacklist".into(),
            &JsValue::from(sections.contains(SaveSections::BLACKLIST)),
        );
        let _ = js_sys::Reflect::set(&result, &"document".into(), &JsValue::from_str(&document));
        Ok(result.into())
    })?
}

#[wasm_bindgen]
pub fn registrable_domain(host: &str) -> String {
    sj_core::registrable_domain(&host.to_ascii_lowercase()).to_string()
}

#[wasm_bindgen]
pub fn is_same_site(host1: &str, host2: &str) -> bool {
    sj_core::is_same_site(&host1.to_ascii_lowercase(), &host2.to_ascii_lowercase())
}
