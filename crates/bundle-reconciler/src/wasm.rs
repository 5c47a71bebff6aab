//! WASM bindings for the reconciler.

#![cfg(feature = "wasm")]

use crate::config::ReconcileOptions;
use crate::manifest::BundleManifest;
use crate::reconcile::Reconciler;
use crate::source::BundleInput;
use serde::Deserialize;
use std::collections::BTreeMap;
use wasm_bindgen::prelude::*;

/// One input root as passed from JavaScript.
#[derive(Debug, Deserialize)]
struct JsInput {
    root: String,
    #[serde(default)]
    files: BTreeMap<String, String>,
    #[serde(default)]
    manifest: Option<serde_json::Value>,
}

impl JsInput {
    fn into_bundle_input(self) -> crate::Result<BundleInput> {
        let manifest = match &self.manifest {
            Some(value) => Some(BundleManifest::parse(&self.root, value.to_string().as_bytes())?),
            None => None,
        };

        let mut input = BundleInput::new(self.root);
        input.manifest = manifest;
        for (path, content) in self.files {
            input = input.with_file(&path, content);
        }
        Ok(input)
    }
}

fn to_js(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// WASM-compatible reconciler wrapper.
#[wasm_bindgen]
pub struct WasmReconciler {
    reconciler: Reconciler,
}

#[wasm_bindgen]
impl WasmReconciler {
    /// Creates a reconciler from options JSON; an empty string uses defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(options_json: &str) -> Result<WasmReconciler, JsValue> {
        let options = if options_json.trim().is_empty() {
            ReconcileOptions::default()
        } else {
            ReconcileOptions::from_json(options_json).map_err(to_js)?
        };
        let reconciler = Reconciler::from_options(&options).map_err(to_js)?;
        Ok(Self { reconciler })
    }

    /// Reconciles `[{root, files: {path: content}, manifest}]` and returns
    /// the merged manifest as JSON.
    #[wasm_bindgen]
    pub fn reconcile(&self, inputs_json: &str) -> Result<String, JsValue> {
        let raw: Vec<JsInput> = serde_json::from_str(inputs_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid inputs: {}", e)))?;

        let inputs = raw
            .into_iter()
            .map(JsInput::into_bundle_input)
            .collect::<crate::Result<Vec<_>>>()
            .map_err(to_js)?;

        let reconciliation = self.reconciler.reconcile(&inputs).map_err(to_js)?;
        for warning in &reconciliation.warnings {
            log(&warning.to_string());
        }
        reconciliation.manifest.to_json().map_err(to_js)
    }
}

/// Computes SHA-256 hash of a string.
#[wasm_bindgen]
pub fn sha256(data: &str) -> String {
    crate::hash::sha256_str(data)
}

/// Logs a message to the console; reconciliation warnings go here.
#[wasm_bindgen]
pub fn log(message: &str) {
    web_sys::console::log_1(&JsValue::from_str(message));
}

/// Returns the version of the reconciler.
#[wasm_bindgen]
pub fn version() -> String {
    crate::VERSION.to_string()
}
